// src/batch/modules.rs
//! Turning optimized experience text into CV modules

use crate::types::{ExperienceModule, ExperienceRecord, SourceIds};

const BULLET_GLYPHS: [char; 4] = ['•', '·', '-', '*'];

/// `"{company} · {title} · {time}"`
pub fn module_title(experience: &ExperienceRecord) -> String {
    format!(
        "{} · {} · {}",
        experience.company,
        experience.title,
        experience.time.as_deref().unwrap_or_default()
    )
}

/// One bullet per non-blank line, leading bullet glyphs removed.
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches(&BULLET_GLYPHS[..]).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Module for one optimized experience; `stamp` keeps ids unique per run.
pub fn build_module(experience: &ExperienceRecord, optimized: &str, stamp: i64) -> ExperienceModule {
    ExperienceModule {
        id: format!("{}-optimized-{}", experience.id, stamp),
        title: module_title(experience),
        company: experience.company.clone(),
        items: extract_bullets(optimized),
        source_type: "optimized".to_string(),
        source_ids: Some(SourceIds {
            experience_id: experience.id.clone(),
            optimization_id: format!("{}-opt", experience.id),
        }),
    }
}
