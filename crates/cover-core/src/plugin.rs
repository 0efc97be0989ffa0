//! Inserter trait implemented once per container format.

use crate::asset::CoverAsset;
use crate::document::DocumentFormat;
use crate::error::Result;
use crate::pipeline::StageTracker;

/// Format-specific cover insertion: source bytes in, transformed bytes out.
///
/// Implementations must be re-entrant: the pipeline may call `insert` from
/// several worker threads at once with the same shared cover.
pub trait CoverInserter: Send + Sync {
    /// Human-readable name of this inserter.
    fn name(&self) -> &str;

    /// The container format this inserter handles.
    fn format(&self) -> DocumentFormat;

    /// Prepend `cover` to the document in `source`.
    ///
    /// Either returns the complete transformed document or an error; never
    /// partial output. Stage transitions are reported through `stages`.
    fn insert(
        &self,
        source: &[u8],
        cover: &CoverAsset,
        stages: &mut StageTracker<'_>,
    ) -> Result<Vec<u8>>;
}
