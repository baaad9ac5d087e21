// src/types/personal_info.rs
//! Personal information and PDF configuration kept in the local store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub linkedin: String,
    pub website: String,
    pub summary: Vec<String>,
    pub technical_skills: Vec<String>,
    pub languages: Vec<String>,
    pub education: Vec<Education>,
    pub certificates: Vec<String>,
    pub custom_modules: Vec<CustomModule>,
    pub format: Option<PageFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: String,
    pub gpa: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomModule {
    pub id: String,
    pub title: String,
    pub content: Vec<String>,
}

impl PersonalInfo {
    /// Name and email are the minimum needed for a CV header.
    pub fn has_basics(&self) -> bool {
        !self.full_name.trim().is_empty() && !self.email.trim().is_empty()
    }

    fn non_blank(items: &[String]) -> Vec<String> {
        items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn valid_summary(&self) -> Vec<String> {
        Self::non_blank(&self.summary)
    }

    pub fn valid_skills(&self) -> Vec<String> {
        Self::non_blank(&self.technical_skills)
    }

    pub fn valid_languages(&self) -> Vec<String> {
        Self::non_blank(&self.languages)
    }

    pub fn valid_certificates(&self) -> Vec<String> {
        Self::non_blank(&self.certificates)
    }

    pub fn valid_education(&self) -> Vec<&Education> {
        self.education
            .iter()
            .filter(|edu| !edu.degree.trim().is_empty() || !edu.institution.trim().is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
}

impl PageFormat {
    /// Paper name understood by Typst.
    pub fn typst_paper(&self) -> &'static str {
        match self {
            PageFormat::A4 => "a4",
            PageFormat::Letter => "us-letter",
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageFormat::A4 => f.write_str("A4"),
            PageFormat::Letter => f.write_str("Letter"),
        }
    }
}

impl FromStr for PageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "a4" => Ok(PageFormat::A4),
            "letter" | "us-letter" => Ok(PageFormat::Letter),
            other => anyhow::bail!("Unsupported page format: {}", other),
        }
    }
}

/// Configuration sent to the PDF endpoint together with experience modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfConfig {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub format: PageFormat,
    #[serde(default = "yes")]
    pub include_summary: bool,
    #[serde(default = "yes")]
    pub include_skills: bool,
    #[serde(default = "yes")]
    pub include_education: bool,
    #[serde(default = "yes")]
    pub include_certificates: bool,
    #[serde(default = "yes")]
    pub include_experiences: bool,
}

fn yes() -> bool {
    true
}

impl PdfConfig {
    pub fn new(personal_info: PersonalInfo) -> Self {
        let format = personal_info.format.unwrap_or_default();
        Self {
            personal_info,
            format,
            include_summary: true,
            include_skills: true,
            include_education: true,
            include_certificates: true,
            include_experiences: true,
        }
    }
}
