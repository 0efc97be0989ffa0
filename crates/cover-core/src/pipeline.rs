//! Pipeline orchestrator: runs one cover insertion end to end.
//!
//! Every run walks the same state machine:
//!   Idle → ValidatingAsset → ParsingSource → BuildingCover → Splicing
//!        → Serializing → Done
//! Any stage may move to Failed instead. Done and Failed are terminal.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::asset::CoverAsset;
use crate::document::{suggested_file_name, DocumentFormat, SourceDocument, TransformedDocument};
use crate::error::{CoverError, Result};
use crate::plugin::CoverInserter;

/// Progress reporter callback type.
pub type ProgressReporter = Box<dyn Fn(f64, &str) + Send + Sync>;

/// One step of a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    ValidatingAsset,
    ParsingSource,
    BuildingCover,
    Splicing,
    Serializing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    fn progress(&self) -> f64 {
        match self {
            Stage::Idle => 0.0,
            Stage::ValidatingAsset => 0.05,
            Stage::ParsingSource => 0.15,
            Stage::BuildingCover => 0.40,
            Stage::Splicing => 0.65,
            Stage::Serializing => 0.80,
            Stage::Done | Stage::Failed => 1.0,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::ValidatingAsset => "validating asset",
            Stage::ParsingSource => "parsing source",
            Stage::BuildingCover => "building cover",
            Stage::Splicing => "splicing",
            Stage::Serializing => "serializing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Records the stages a single run has passed through.
pub struct StageTracker<'a> {
    current: Stage,
    history: Vec<Stage>,
    reporter: Option<&'a ProgressReporter>,
}

impl<'a> StageTracker<'a> {
    pub fn new() -> Self {
        Self {
            current: Stage::Idle,
            history: vec![Stage::Idle],
            reporter: None,
        }
    }

    pub fn with_reporter(reporter: Option<&'a ProgressReporter>) -> Self {
        Self {
            reporter,
            ..Self::new()
        }
    }

    /// Move to `stage`. Re-entering the current stage is a no-op, and a
    /// terminal tracker never moves again.
    pub fn enter(&mut self, stage: Stage) {
        if self.current == stage {
            return;
        }
        if self.current.is_terminal() {
            warn!("Ignoring transition {} -> {} after terminal state", self.current, stage);
            return;
        }
        debug!("Stage: {} -> {}", self.current, stage);
        self.current = stage;
        self.history.push(stage);
        if let Some(reporter) = self.reporter {
            reporter(stage.progress(), &stage.to_string());
        }
    }

    /// Mark the run failed with `err` and hand the error back.
    pub fn fail(&mut self, err: CoverError) -> CoverError {
        debug!("Failed while {}: {}", self.current, err);
        self.enter(Stage::Failed);
        err
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }
}

impl Default for StageTracker<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// The cover insertion pipeline: one shared cover, one inserter per format.
pub struct Pipeline {
    cover: Arc<CoverAsset>,
    inserters: Vec<Box<dyn CoverInserter>>,
    progress_reporter: Option<ProgressReporter>,
    output_prefix: String,
}

impl Pipeline {
    pub fn new(cover: Arc<CoverAsset>) -> Self {
        Self {
            cover,
            inserters: Vec::new(),
            progress_reporter: None,
            output_prefix: "modified_".to_string(),
        }
    }

    /// Register an inserter. A later registration for the same format wins.
    pub fn add_inserter(&mut self, inserter: Box<dyn CoverInserter>) {
        self.inserters.retain(|i| i.format() != inserter.format());
        self.inserters.push(inserter);
    }

    /// Set a progress reporter callback.
    pub fn set_progress_reporter(&mut self, reporter: ProgressReporter) {
        self.progress_reporter = Some(reporter);
    }

    pub fn set_output_prefix(&mut self, prefix: impl Into<String>) {
        self.output_prefix = prefix.into();
    }

    /// Parse `format_tag` and run. An unknown tag is rejected before any
    /// document bytes are looked at.
    pub fn transform(
        &self,
        format_tag: &str,
        bytes: Vec<u8>,
        file_name: Option<&str>,
    ) -> Result<TransformedDocument> {
        let format: DocumentFormat = format_tag.parse()?;
        let mut source = SourceDocument::new(bytes, format);
        if let Some(name) = file_name {
            source = source.with_file_name(name);
        }
        self.run(&source)
    }

    /// Insert the cover into `source`.
    pub fn run(&self, source: &SourceDocument) -> Result<TransformedDocument> {
        let mut stages = StageTracker::with_reporter(self.progress_reporter.as_ref());
        let result = self.run_stages(source, &mut stages);
        match result {
            Ok(doc) => {
                stages.enter(Stage::Done);
                info!(
                    "{} cover inserted: {} -> {} bytes",
                    doc.format,
                    source.bytes().len(),
                    doc.bytes.len()
                );
                Ok(doc)
            }
            Err(e) => Err(stages.fail(e)),
        }
    }

    fn run_stages(
        &self,
        source: &SourceDocument,
        stages: &mut StageTracker<'_>,
    ) -> Result<TransformedDocument> {
        let format = source.format();
        let inserter = self.inserter_for(format).ok_or_else(|| {
            CoverError::UnsupportedInputFormat(format!("no inserter registered for {}", format))
        })?;

        // A CoverAsset only exists once decoded, so this stage is a checkpoint
        // rather than a second decode.
        stages.enter(Stage::ValidatingAsset);
        debug!(
            "Using {} cover {}x{}",
            self.cover.format(),
            self.cover.width(),
            self.cover.height()
        );

        stages.enter(Stage::ParsingSource);
        source.verify_signature()?;

        info!("Running {}...", inserter.name());
        let bytes = inserter.insert(source.bytes(), &self.cover, stages)?;
        if bytes.is_empty() {
            return Err(CoverError::Internal(format!(
                "{} produced no output",
                inserter.name()
            )));
        }

        Ok(TransformedDocument {
            bytes,
            format,
            file_name: suggested_file_name(source.file_name(), &self.output_prefix, format),
        })
    }

    fn inserter_for(&self, format: DocumentFormat) -> Option<&dyn CoverInserter> {
        self.inserters
            .iter()
            .find(|i| i.format() == format)
            .map(|i| i.as_ref())
    }
}

/// Builder for constructing a pipeline, loading the cover eagerly if given a path.
pub struct PipelineBuilder {
    cover: Option<Arc<CoverAsset>>,
    cover_path: Option<PathBuf>,
    inserters: Vec<Box<dyn CoverInserter>>,
    progress_reporter: Option<ProgressReporter>,
    output_prefix: Option<String>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            cover: None,
            cover_path: None,
            inserters: Vec::new(),
            progress_reporter: None,
            output_prefix: None,
        }
    }

    pub fn cover(mut self, cover: Arc<CoverAsset>) -> Self {
        self.cover = Some(cover);
        self
    }

    /// Load and validate the cover from disk at build time.
    pub fn cover_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cover_path = Some(path.into());
        self
    }

    pub fn inserter(mut self, inserter: Box<dyn CoverInserter>) -> Self {
        self.inserters.push(inserter);
        self
    }

    pub fn progress_reporter(mut self, reporter: ProgressReporter) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let cover = match (self.cover, self.cover_path) {
            (Some(cover), _) => cover,
            (None, Some(path)) => Arc::new(CoverAsset::load(&path)?),
            (None, None) => {
                return Err(CoverError::AssetNotFound(
                    "no cover asset configured".to_string(),
                ))
            }
        };

        let mut pipeline = Pipeline::new(cover);
        for inserter in self.inserters {
            pipeline.add_inserter(inserter);
        }
        if let Some(reporter) = self.progress_reporter {
            pipeline.set_progress_reporter(reporter);
        }
        if let Some(prefix) = self.output_prefix {
            pipeline.set_output_prefix(prefix);
        }
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
