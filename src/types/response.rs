// src/types/response.rs
//! Wire shapes returned by the JD2CV and reading API routes

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::JdRecord;

/// Generic `{success, data|error}` envelope as seen by API clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Unwrap `data` when `success` is set, otherwise turn `error` into an error.
    pub fn into_result(self) -> Result<T> {
        if !self.success {
            anyhow::bail!(
                "{}",
                self.error
                    .or(self.message)
                    .unwrap_or_else(|| "Request failed".to_string())
            );
        }
        self.data
            .ok_or_else(|| anyhow::anyhow!("Response marked success but carried no data"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOptionsResponse {
    pub success: bool,
    #[serde(default)]
    pub stage_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JdAnalysis {
    pub key_sentences: String,
    pub keywords: String,
    pub jd_record: JdRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedExperience {
    pub optimized_content: String,
    #[serde(default)]
    pub jd_keywords: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetter {
    pub cover_letter: String,
}
