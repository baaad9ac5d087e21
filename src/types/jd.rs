// src/types/jd.rs
//! Job description records and their field-by-field update model

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct JdRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub full_job_description: String,
    #[serde(default)]
    pub jd_key_sentences: String,
    #[serde(default)]
    pub keywords_from_sentences: String,
    #[serde(default)]
    pub application_stage: String,
    #[serde(default)]
    pub role_group: String,
    #[serde(default)]
    pub firm_type: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub match_score: Option<f64>,
    #[serde(default)]
    pub cv_pdf_url: Option<String>,
    #[serde(default)]
    pub cv_pdf_filename: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJdRequest {
    pub user_id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub full_job_description: String,
    #[serde(default)]
    pub application_stage: Option<String>,
    #[serde(default)]
    pub role_group: Option<String>,
    #[serde(default)]
    pub firm_type: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub match_score: Option<f64>,
}

impl CreateJdRequest {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            anyhow::bail!("User ID is required");
        }
        if self.title.trim().is_empty() || self.company.trim().is_empty() {
            anyhow::bail!("Title and company are required");
        }
        if let Some(score) = self.match_score {
            validate_match_score(score)?;
        }
        Ok(())
    }
}

/// Fields of a JD record that can be edited inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JdField {
    Title,
    Company,
    FullJobDescription,
    ApplicationStage,
    RoleGroup,
    FirmType,
    Comment,
    MatchScore,
    CvPdfUrl,
    CvPdfFilename,
}

impl JdField {
    pub const ALL: [JdField; 10] = [
        JdField::Title,
        JdField::Company,
        JdField::FullJobDescription,
        JdField::ApplicationStage,
        JdField::RoleGroup,
        JdField::FirmType,
        JdField::Comment,
        JdField::MatchScore,
        JdField::CvPdfUrl,
        JdField::CvPdfFilename,
    ];

    /// Column name, identical to the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JdField::Title => "title",
            JdField::Company => "company",
            JdField::FullJobDescription => "full_job_description",
            JdField::ApplicationStage => "application_stage",
            JdField::RoleGroup => "role_group",
            JdField::FirmType => "firm_type",
            JdField::Comment => "comment",
            JdField::MatchScore => "match_score",
            JdField::CvPdfUrl => "cv_pdf_url",
            JdField::CvPdfFilename => "cv_pdf_filename",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, JdField::MatchScore)
    }

    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            JdField::MatchScore | JdField::CvPdfUrl | JdField::CvPdfFilename
        )
    }

    /// Convert a raw JSON value into a typed value for this field.
    pub fn parse_value(&self, raw: &serde_json::Value) -> Result<FieldValue> {
        if self.is_numeric() {
            let score = match raw {
                serde_json::Value::Null => return Ok(FieldValue::Empty),
                serde_json::Value::Number(n) => n
                    .as_f64()
                    .ok_or_else(|| anyhow::anyhow!("Invalid number for {}", self))?,
                serde_json::Value::String(s) if s.trim().is_empty() => {
                    return Ok(FieldValue::Empty)
                }
                serde_json::Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| anyhow::anyhow!("Invalid number for {}: {}", self, s))?,
                other => anyhow::bail!("Invalid value for {}: {}", self, other),
            };
            validate_match_score(score)?;
            return Ok(FieldValue::Number(score));
        }

        match raw {
            serde_json::Value::String(s) => {
                if s.is_empty() && self.is_nullable() {
                    Ok(FieldValue::Empty)
                } else {
                    Ok(FieldValue::Text(s.clone()))
                }
            }
            serde_json::Value::Null if self.is_nullable() => Ok(FieldValue::Empty),
            serde_json::Value::Null => Ok(FieldValue::Text(String::new())),
            serde_json::Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
            other => anyhow::bail!("Invalid value for {}: {}", self, other),
        }
    }
}

impl fmt::Display for JdField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JdField {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        JdField::ALL
            .iter()
            .copied()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown JD field: {}", s))
    }
}

/// Typed value for a single field update.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Empty,
}

impl FieldValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) => serde_json::Value::String(s.clone()),
            FieldValue::Number(n) => serde_json::json!(n),
            FieldValue::Empty => serde_json::Value::Null,
        }
    }
}

/// Match score is 1 to 5 in steps of 0.5.
pub fn validate_match_score(score: f64) -> Result<()> {
    if !(1.0..=5.0).contains(&score) || (score * 2.0).fract() != 0.0 {
        anyhow::bail!("Match score must be between 1 and 5 in steps of 0.5, got {}", score);
    }
    Ok(())
}

impl JdRecord {
    /// Apply a field update in memory.
    pub fn apply(&mut self, field: JdField, value: &FieldValue) {
        let text = match value {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Empty => String::new(),
        };
        let optional = match value {
            FieldValue::Empty => None,
            _ => Some(text.clone()),
        };

        match field {
            JdField::Title => self.title = text,
            JdField::Company => self.company = text,
            JdField::FullJobDescription => self.full_job_description = text,
            JdField::ApplicationStage => self.application_stage = text,
            JdField::RoleGroup => self.role_group = text,
            JdField::FirmType => self.firm_type = text,
            JdField::Comment => self.comment = text,
            JdField::MatchScore => {
                self.match_score = match value {
                    FieldValue::Number(n) => Some(*n),
                    _ => None,
                }
            }
            JdField::CvPdfUrl => self.cv_pdf_url = optional,
            JdField::CvPdfFilename => self.cv_pdf_filename = optional,
        }
    }

    /// Current value of a field as display text.
    pub fn field_text(&self, field: JdField) -> String {
        match field {
            JdField::Title => self.title.clone(),
            JdField::Company => self.company.clone(),
            JdField::FullJobDescription => self.full_job_description.clone(),
            JdField::ApplicationStage => self.application_stage.clone(),
            JdField::RoleGroup => self.role_group.clone(),
            JdField::FirmType => self.firm_type.clone(),
            JdField::Comment => self.comment.clone(),
            JdField::MatchScore => self.match_score.map(|s| s.to_string()).unwrap_or_default(),
            JdField::CvPdfUrl => self.cv_pdf_url.clone().unwrap_or_default(),
            JdField::CvPdfFilename => self.cv_pdf_filename.clone().unwrap_or_default(),
        }
    }
}
