// src/types/module.rs
//! Experience modules and the request bodies of the PDF / cover letter routes

use serde::{Deserialize, Serialize};

use crate::types::{PageFormat, PdfConfig, PersonalInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIds {
    pub experience_id: String,
    pub optimization_id: String,
}

/// One titled block of bullet points on the CV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceModule {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default = "optimized")]
    pub source_type: String,
    #[serde(default)]
    pub source_ids: Option<SourceIds>,
}

fn optimized() -> String {
    "optimized".to_string()
}

impl ExperienceModule {
    pub fn has_content(&self) -> bool {
        self.items.iter().any(|item| !item.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfRequest {
    pub config: PdfConfig,
    #[serde(default)]
    pub experience_modules: Vec<ExperienceModule>,
}

/// Resume built from free-form AI experience text instead of modules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeV2Request {
    pub personal_info: PersonalInfo,
    pub ai_generated_experience: String,
    #[serde(default)]
    pub format: PageFormat,
    #[serde(default)]
    pub job_title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JdInfo {
    pub title: String,
    pub company: String,
    pub description: String,
}

impl JdInfo {
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.company.trim().is_empty()
            && !self.description.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterRequest {
    pub personal_info: PersonalInfo,
    pub jd_info: JdInfo,
    pub tailored_experience: String,
    #[serde(default)]
    pub user_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterPdfRequest {
    pub personal_info: PersonalInfo,
    pub jd_info: JdInfo,
    pub cover_letter: String,
    #[serde(default)]
    pub format: PageFormat,
}
