// src/batch/pipeline.rs
//! The five sequential steps run for one JD record

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fmt;

use crate::app_log;
use crate::batch::modules::build_module;
use crate::batch::PipelineBackend;
use crate::types::{select_starred, GeneratePdfRequest, JdRecord, PdfConfig};
use crate::utils::resume_filename;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStep {
    Analyze,
    Import,
    Optimize,
    Assemble,
    Render,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 5] = [
        PipelineStep::Analyze,
        PipelineStep::Import,
        PipelineStep::Optimize,
        PipelineStep::Assemble,
        PipelineStep::Render,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStep::Analyze => "Analyzing JD...",
            PipelineStep::Import => "Importing starred experiences...",
            PipelineStep::Optimize => "Optimizing experiences...",
            PipelineStep::Assemble => "Assembling modules...",
            PipelineStep::Render => "Generating PDF...",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A rendered resume ready for the sink.
#[derive(Debug, Clone)]
pub struct RenderedResume {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Run every step for `record`. The first failing step ends the item.
pub async fn run_item<B>(
    backend: &B,
    user_id: &str,
    record: &JdRecord,
    config: &PdfConfig,
    starred: &HashSet<String>,
    on_step: &mut (dyn FnMut(PipelineStep) + Send),
) -> Result<RenderedResume>
where
    B: PipelineBackend + ?Sized,
{
    on_step(PipelineStep::Analyze);
    let analysis = backend
        .analyze_jd(&record.id, user_id)
        .await
        .with_context(|| format!("Analyze failed for {}", record.id))?;

    on_step(PipelineStep::Import);
    let experiences = backend
        .fetch_experiences(user_id)
        .await
        .context("Import of experiences failed")?;
    let experiences = select_starred(experiences, starred);
    if experiences.is_empty() {
        anyhow::bail!("No starred experiences found");
    }
    app_log!(debug, "Imported {} starred experiences", experiences.len());

    on_step(PipelineStep::Optimize);
    let mut optimized = Vec::with_capacity(experiences.len());
    for experience in &experiences {
        let result = backend
            .optimize_experience(&experience.id, &analysis.keywords, user_id)
            .await
            .with_context(|| format!("Optimize failed for experience {}", experience.id))?;
        optimized.push(result.optimized_content);
    }

    on_step(PipelineStep::Assemble);
    let stamp = Utc::now().timestamp_millis();
    let modules = experiences
        .iter()
        .zip(&optimized)
        .map(|(experience, text)| build_module(experience, text, stamp))
        .collect();

    on_step(PipelineStep::Render);
    let request = GeneratePdfRequest {
        config: config.clone(),
        experience_modules: modules,
    };
    let bytes = backend
        .generate_pdf(&request)
        .await
        .context("PDF generation failed")?;

    Ok(RenderedResume {
        filename: resume_filename(&config.personal_info.full_name, &record.company, &record.title),
        bytes,
    })
}
