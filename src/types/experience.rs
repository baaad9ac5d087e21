// src/types/experience.rs
//! Experience records and the end-year ordering used by the CV import step

use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub jd_id: Option<String>,
    pub company: String,
    pub title: String,
    pub experience: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub role_group: Option<String>,
    #[serde(default)]
    pub work_or_project: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExperienceRequest {
    pub user_id: String,
    pub company: String,
    pub title: String,
    pub experience: String,
    #[serde(default)]
    pub jd_id: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub role_group: Option<String>,
    #[serde(default)]
    pub work_or_project: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// End year of a free-text time range, relative to the current calendar year.
pub fn get_end_year(time: &str) -> i32 {
    end_year_at(time, Utc::now().year())
}

/// End year of a time range: "present"/"current" map to `current_year`,
/// otherwise the last 4-digit run, otherwise 0.
pub fn end_year_at(time: &str, current_year: i32) -> i32 {
    if time.is_empty() {
        return 0;
    }
    let lower = time.to_lowercase();
    if lower.contains("present") || lower.contains("current") {
        return current_year;
    }
    YEAR_RE
        .find_iter(time)
        .last()
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

impl ExperienceRecord {
    pub fn end_year(&self) -> i32 {
        self.time.as_deref().map(get_end_year).unwrap_or(0)
    }
}

/// Most recent first; records with equal end years keep their input order.
pub fn sort_by_end_year_desc(experiences: &mut [ExperienceRecord]) {
    let current_year = Utc::now().year();
    experiences.sort_by_key(|exp| {
        std::cmp::Reverse(end_year_at(exp.time.as_deref().unwrap_or(""), current_year))
    });
}

/// Keep starred experiences only, most recent first.
pub fn select_starred(
    all: Vec<ExperienceRecord>,
    starred_ids: &HashSet<String>,
) -> Vec<ExperienceRecord> {
    let mut starred: Vec<ExperienceRecord> = all
        .into_iter()
        .filter(|exp| starred_ids.contains(&exp.id))
        .collect();
    sort_by_end_year_desc(&mut starred);
    starred
}
