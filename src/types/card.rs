// src/types/card.rs
//! Reading cards: analysis records tied to an article and a character range

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Half-open `[start, end)` range of character (Unicode scalar) indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    /// Build a range checked against a content length in characters.
    pub fn new(start: usize, end: usize, content_len: usize) -> Result<Self> {
        if start >= end {
            anyhow::bail!("Invalid offset range: start {} must be before end {}", start, end);
        }
        if end > content_len {
            anyhow::bail!(
                "Invalid offset range: end {} exceeds content length {}",
                end,
                content_len
            );
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True when `other` lies entirely inside this range.
    pub fn contains(&self, other: &OffsetRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &OffsetRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Substring covered by this range, `None` when out of bounds.
    pub fn slice<'a>(&self, content: &'a str) -> Option<&'a str> {
        let start = crate::utils::char_to_byte(content, self.start)?;
        let end = crate::utils::char_to_byte(content, self.end)?;
        content.get(start..end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardKind {
    Word,
    Sentence,
    Grammar,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Word => "word",
            CardKind::Sentence => "sentence",
            CardKind::Grammar => "grammar",
        }
    }
}

impl FromStr for CardKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "word" => Ok(CardKind::Word),
            "sentence" => Ok(CardKind::Sentence),
            "grammar" => Ok(CardKind::Grammar),
            other => anyhow::bail!("Unknown card kind: {}", other),
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisMode {
    #[default]
    Simple,
    Deep,
    Grammar,
    AskAi,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Simple => "simple",
            AnalysisMode::Deep => "deep",
            AnalysisMode::Grammar => "grammar",
            AnalysisMode::AskAi => "ask-ai",
        }
    }
}

impl FromStr for AnalysisMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(AnalysisMode::Simple),
            "deep" => Ok(AnalysisMode::Deep),
            "grammar" => Ok(AnalysisMode::Grammar),
            "ask-ai" => Ok(AnalysisMode::AskAi),
            other => anyhow::bail!("Invalid analysis mode: {}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    #[default]
    AiQuery,
    ManualMark,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::AiQuery => "ai_query",
            QueryType::ManualMark => "manual_mark",
        }
    }
}

impl FromStr for QueryType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ai_query" => Ok(QueryType::AiQuery),
            "manual_mark" => Ok(QueryType::ManualMark),
            other => anyhow::bail!("Unknown query type: {}", other),
        }
    }
}

/// A persisted analysis of a selection inside an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub article_id: i64,
    pub kind: CardKind,
    pub selected_text: String,
    #[serde(default)]
    pub context_sentence: String,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub user_notes: String,
    #[serde(default)]
    pub ai_notes: String,
    pub created_at: DateTime<Utc>,
}

impl Card {
    pub fn range(&self) -> OffsetRange {
        OffsetRange {
            start: self.start_offset,
            end: self.end_offset,
        }
    }
}

/// Payload for creating a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCard {
    pub article_id: i64,
    #[serde(default = "default_kind")]
    pub kind: CardKind,
    pub selected_text: String,
    #[serde(default)]
    pub context_sentence: String,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub analysis_mode: AnalysisMode,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub user_notes: String,
    #[serde(default)]
    pub ai_notes: String,
}

fn default_kind() -> CardKind {
    CardKind::Word
}

/// Body of a smart-analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartAnalysisRequest {
    pub mode: AnalysisMode,
    pub selected_text: String,
    #[serde(default)]
    pub context_sentence: String,
    pub language: String,
    pub native_language: String,
    #[serde(default)]
    pub article_id: Option<i64>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

impl SmartAnalysisRequest {
    pub fn validate(&self) -> Result<()> {
        if self.selected_text.trim().is_empty()
            || self.language.trim().is_empty()
            || self.native_language.trim().is_empty()
        {
            anyhow::bail!("Missing required fields");
        }
        if self.mode == AnalysisMode::AskAi
            && self.user_prompt.as_deref().map_or(true, |p| p.trim().is_empty())
        {
            anyhow::bail!("userPrompt is required for ask-ai mode");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub language_pair: String,
    pub created_at: DateTime<Utc>,
}

impl Article {
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_range_bounds() {
        assert!(OffsetRange::new(0, 5, 5).is_ok());
        assert!(OffsetRange::new(5, 5, 10).is_err());
        assert!(OffsetRange::new(6, 5, 10).is_err());
        assert!(OffsetRange::new(3, 11, 10).is_err());
    }

    #[test]
    fn test_slice_counts_characters() {
        let content = "Ça va très bien";
        let range = OffsetRange::new(6, 10, content.chars().count()).unwrap();
        assert_eq!(range.slice(content), Some("très"));
        assert_eq!(OffsetRange { start: 10, end: 40 }.slice(content), None);
    }

    #[test]
    fn test_containment() {
        let card = OffsetRange { start: 5, end: 15 };
        assert!(card.contains(&OffsetRange { start: 5, end: 15 }));
        assert!(card.contains(&OffsetRange { start: 7, end: 9 }));
        assert!(!card.contains(&OffsetRange { start: 4, end: 9 }));
        assert!(card.overlaps(&OffsetRange { start: 14, end: 20 }));
        assert!(!card.overlaps(&OffsetRange { start: 15, end: 20 }));
    }

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&AnalysisMode::AskAi).unwrap(),
            "\"ask-ai\""
        );
        assert_eq!("deep".parse::<AnalysisMode>().unwrap(), AnalysisMode::Deep);
        assert_eq!(
            serde_json::to_string(&QueryType::ManualMark).unwrap(),
            "\"manual_mark\""
        );
    }
}
