// src/batch/mod.rs
//! Batch resume generation over a selection of JD records

pub mod modules;
pub mod pipeline;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::app_log;
use crate::board::BatchSelection;
use crate::types::{
    ExperienceRecord, GeneratePdfRequest, JdAnalysis, JdRecord, OptimizedExperience, PdfConfig,
};
use crate::utils::write_bytes_safe;

pub use modules::{build_module, extract_bullets, module_title};
pub use pipeline::{run_item, PipelineStep, RenderedResume};

pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(3000);

/// Remote calls made by the per-item pipeline.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    async fn analyze_jd(&self, jd_id: &str, user_id: &str) -> Result<JdAnalysis>;
    async fn fetch_experiences(&self, user_id: &str) -> Result<Vec<ExperienceRecord>>;
    async fn optimize_experience(
        &self,
        experience_id: &str,
        jd_keywords: &str,
        user_id: &str,
    ) -> Result<OptimizedExperience>;
    async fn generate_pdf(&self, request: &GeneratePdfRequest) -> Result<Vec<u8>>;
}

/// Receives each rendered PDF.
pub trait PdfSink: Send {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes PDFs into a directory.
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl PdfSink for DirectorySink {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.dir.join(filename);
        write_bytes_safe(&path, bytes)?;
        app_log!(info, "Saved {} ({} bytes)", path.display(), bytes.len());
        self.written.push(path);
        Ok(())
    }
}

impl PdfSink for Vec<(String, Vec<u8>)> {
    fn deliver(&mut self, filename: &str, bytes: &[u8]) -> Result<()> {
        self.push((filename.to_string(), bytes.to_vec()));
        Ok(())
    }
}

/// Observer of batch state changes.
pub trait ProgressSink: Send {
    fn publish(&mut self, state: &BatchState);
}

impl<F> ProgressSink for F
where
    F: FnMut(&BatchState) + Send,
{
    fn publish(&mut self, state: &BatchState) {
        self(state)
    }
}

/// Logs progress through `tracing`.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn publish(&mut self, state: &BatchState) {
        match state.phase {
            BatchPhase::Running => app_log!(
                info,
                "[{}/{}] {}% {}",
                state.current_index + 1,
                state.total,
                state.progress,
                state.current_step
            ),
            phase => app_log!(info, "Batch {:?}", phase),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum BatchPhase {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ItemStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchItem {
    pub jd_id: String,
    pub title: String,
    pub company: String,
    pub status: ItemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchState {
    pub phase: BatchPhase,
    pub total: usize,
    pub current_index: usize,
    pub items: Vec<BatchItem>,
    pub current_step: String,
    /// 0 to 100, never decreasing within a run.
    pub progress: u8,
}

impl BatchState {
    fn set_progress(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }
}

/// Outcome of a run, captured before the state resets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub phase: BatchPhase,
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.status)).count()
    }

    pub fn completed(&self) -> usize {
        self.count(|status| *status == ItemStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, ItemStatus::Failed(_)))
    }

    pub fn pending(&self) -> usize {
        self.count(|status| *status == ItemStatus::Pending)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("{0}")]
    Validation(String),
}

/// Inputs of one run. Records are processed in the given order.
#[derive(Debug, Clone)]
pub struct BatchRequest<'a> {
    pub user_id: &'a str,
    pub records: Vec<JdRecord>,
    pub config: Option<PdfConfig>,
    pub starred: HashSet<String>,
}

pub struct BatchOrchestrator<B> {
    backend: B,
    state: BatchState,
    reset_delay: Duration,
}

impl<B: PipelineBackend> BatchOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: BatchState::default(),
            reset_delay: DEFAULT_RESET_DELAY,
        }
    }

    pub fn with_reset_delay(mut self, delay: Duration) -> Self {
        self.reset_delay = delay;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    fn validate(request: &BatchRequest<'_>) -> Result<PdfConfig, BatchError> {
        if request.records.is_empty() {
            return Err(BatchError::Validation(
                "Please select at least one JD".to_string(),
            ));
        }
        let Some(config) = request.config.clone() else {
            return Err(BatchError::Validation(
                "Please configure PDF settings first".to_string(),
            ));
        };
        if request.starred.is_empty() {
            return Err(BatchError::Validation(
                "No starred experiences found. Please star some experiences first.".to_string(),
            ));
        }
        Ok(config)
    }

    /// Run the pipeline for every record. A failing item is recorded and the
    /// loop moves on; `cancel` is checked before each item starts.
    pub async fn run(
        &mut self,
        request: BatchRequest<'_>,
        selection: &mut BatchSelection,
        cancel: &CancellationToken,
        pdf_sink: &mut dyn PdfSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<BatchSummary, BatchError> {
        let config = Self::validate(&request)?;
        let total = request.records.len();

        self.state = BatchState {
            phase: BatchPhase::Running,
            total,
            current_index: 0,
            items: request
                .records
                .iter()
                .map(|record| BatchItem {
                    jd_id: record.id.clone(),
                    title: record.title.clone(),
                    company: record.company.clone(),
                    status: ItemStatus::Pending,
                })
                .collect(),
            current_step: String::new(),
            progress: 0,
        };
        app_log!(info, "Starting batch of {} JDs", total);
        progress.publish(&self.state);

        for (index, record) in request.records.iter().enumerate() {
            if cancel.is_cancelled() {
                app_log!(warn, "Batch cancelled before item {} of {}", index + 1, total);
                self.state.phase = BatchPhase::Cancelled;
                break;
            }

            self.state.current_index = index;
            self.state.items[index].status = ItemStatus::Running;
            self.state.set_progress((index * 100 / total) as u8);
            progress.publish(&self.state);

            let state = &mut self.state;
            let mut on_step = |step: PipelineStep| {
                state.current_step = step.label().to_string();
                progress.publish(state);
            };

            let result = run_item(
                &self.backend,
                request.user_id,
                record,
                &config,
                &request.starred,
                &mut on_step,
            )
            .await
            .and_then(|resume| pdf_sink.deliver(&resume.filename, &resume.bytes));

            self.state.items[index].status = match result {
                Ok(()) => ItemStatus::Completed,
                Err(e) => {
                    app_log!(error, "Batch item {} ({}) failed: {:#}", index + 1, record.id, e);
                    ItemStatus::Failed(format!("{:#}", e))
                }
            };
            progress.publish(&self.state);
        }

        if self.state.phase == BatchPhase::Running {
            self.state.phase = BatchPhase::Completed;
            self.state.set_progress(100);
            self.state.current_step = "Completed".to_string();
        }
        progress.publish(&self.state);

        let summary = BatchSummary {
            phase: self.state.phase,
            items: self.state.items.clone(),
        };
        app_log!(
            info,
            "Batch {:?}: {} completed, {} failed, {} pending",
            summary.phase,
            summary.completed(),
            summary.failed(),
            summary.pending()
        );

        tokio::time::sleep(self.reset_delay).await;
        self.state = BatchState::default();
        selection.clear();
        progress.publish(&self.state);

        Ok(summary)
    }
}
