//! Core types for inserting a fixed cover page into PDF and EPUB documents.
//!
//! A [`pipeline::Pipeline`] owns the validated [`asset::CoverAsset`] and a set
//! of format-specific [`plugin::CoverInserter`]s; [`dispatch`] moves a run
//! onto a blocking worker under a deadline.

pub mod asset;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod plugin;
