// src/board/filter.rs
//! Board filters and sort orders

use chrono::{DateTime, Duration, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::types::JdRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageFilter {
    #[default]
    All,
    /// Records without an application stage.
    NoStage,
    Stage(String),
}

impl StageFilter {
    fn matches(&self, record: &JdRecord) -> bool {
        match self {
            StageFilter::All => true,
            StageFilter::NoStage => record.application_stage.trim().is_empty(),
            StageFilter::Stage(stage) => record.application_stage == *stage,
        }
    }
}

impl FromStr for StageFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        Ok(match s {
            "" | "all" => StageFilter::All,
            "null" | "none" => StageFilter::NoStage,
            stage => StageFilter::Stage(stage.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFilter {
    #[default]
    All,
    /// Created on the previous calendar day.
    Yesterday,
    Past3Days,
    Past7Days,
    Past30Days,
}

impl TimeFilter {
    fn matches<Tz: TimeZone>(&self, record: &JdRecord, now: &DateTime<Tz>) -> bool {
        let created = record.created_at.with_timezone(&now.timezone());
        let window = |days: i64| created >= now.clone() - Duration::days(days);
        match self {
            TimeFilter::All => true,
            TimeFilter::Yesterday => {
                now.date_naive()
                    .pred_opt()
                    .map_or(false, |yesterday| created.date_naive() == yesterday)
            }
            TimeFilter::Past3Days => window(3),
            TimeFilter::Past7Days => window(7),
            TimeFilter::Past30Days => window(30),
        }
    }
}

impl FromStr for TimeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "" | "all" => Ok(TimeFilter::All),
            "yesterday" => Ok(TimeFilter::Yesterday),
            "past3days" => Ok(TimeFilter::Past3Days),
            "past7days" => Ok(TimeFilter::Past7Days),
            "past30days" => Ok(TimeFilter::Past30Days),
            other => anyhow::bail!("Unknown time filter: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    ScoreHighToLow,
    ScoreLowToHigh,
}

impl SortOrder {
    fn compare(&self, a: &JdRecord, b: &JdRecord) -> Ordering {
        // Unscored records sort last in both score orders.
        let score = |record: &JdRecord, high_first: bool| match record.match_score {
            Some(s) if high_first => -s,
            Some(s) => s,
            None => f64::INFINITY,
        };
        match self {
            SortOrder::Newest => b.created_at.cmp(&a.created_at),
            SortOrder::Oldest => a.created_at.cmp(&b.created_at),
            SortOrder::ScoreHighToLow => score(a, true).total_cmp(&score(b, true)),
            SortOrder::ScoreLowToHigh => score(a, false).total_cmp(&score(b, false)),
        }
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "" | "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            "score-desc" | "score_high" => Ok(SortOrder::ScoreHighToLow),
            "score-asc" | "score_low" => Ok(SortOrder::ScoreLowToHigh),
            other => anyhow::bail!("Unknown sort order: {}", other),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JdFilters {
    pub stage: StageFilter,
    pub time: TimeFilter,
    /// Case-insensitive match against comment or company.
    pub search: String,
    pub sort: SortOrder,
}

impl JdFilters {
    pub fn matches<Tz: TimeZone>(&self, record: &JdRecord, now: &DateTime<Tz>) -> bool {
        self.stage.matches(record) && self.matches_search(record) && self.time.matches(record, now)
    }

    fn matches_search(&self, record: &JdRecord) -> bool {
        let term = self.search.trim().to_lowercase();
        term.is_empty()
            || record.comment.to_lowercase().contains(&term)
            || record.company.to_lowercase().contains(&term)
    }

    /// Filtered then sorted view; sorting is stable.
    pub fn apply<'a, Tz: TimeZone>(
        &self,
        records: &'a [JdRecord],
        now: &DateTime<Tz>,
    ) -> Vec<&'a JdRecord> {
        let mut visible: Vec<&JdRecord> = records
            .iter()
            .filter(|record| self.matches(record, now))
            .collect();
        visible.sort_by(|a, b| self.sort.compare(a, b));
        visible
    }
}
