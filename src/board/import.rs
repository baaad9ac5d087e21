// src/board/import.rs
//! Bulk JD import from CSV exports of job boards or spreadsheets

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;

use crate::app_log;
use crate::types::CreateJdRequest;

#[derive(Debug, Deserialize)]
struct JdCsvRow {
    #[serde(alias = "Title", alias = "job_title")]
    title: String,
    #[serde(alias = "Company")]
    company: String,
    #[serde(default, alias = "description", alias = "Description")]
    full_job_description: String,
    #[serde(default, alias = "stage")]
    application_stage: String,
    #[serde(default)]
    role_group: String,
    #[serde(default)]
    firm_type: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    match_score: Option<f64>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse CSV rows into create requests for `user_id`.
///
/// Needs a header row with at least `title` and `company`. Rows failing
/// validation are skipped with a warning; a malformed CSV is an error.
pub fn read_jd_csv<R: Read>(reader: R, user_id: &str) -> Result<Vec<CreateJdRequest>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut requests = Vec::new();
    for (index, row) in csv_reader.deserialize::<JdCsvRow>().enumerate() {
        let line = index + 2;
        let row = row.with_context(|| format!("Invalid CSV row at line {}", line))?;

        let request = CreateJdRequest {
            user_id: user_id.to_string(),
            title: row.title,
            company: row.company,
            full_job_description: row.full_job_description,
            application_stage: non_empty(row.application_stage),
            role_group: non_empty(row.role_group),
            firm_type: non_empty(row.firm_type),
            comment: non_empty(row.comment),
            match_score: row.match_score,
        };

        match request.validate() {
            Ok(()) => requests.push(request),
            Err(e) => app_log!(warn, "Skipping CSV line {}: {}", line, e),
        }
    }

    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_rows_with_aliases() {
        let data = "\
Title,Company,description,stage,match_score
Rust Engineer,Acme,\"Build things, fast\",applied,4.5
Data Analyst,Globex,,,
";
        let requests = read_jd_csv(data.as_bytes(), "u1").unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].title, "Rust Engineer");
        assert_eq!(requests[0].full_job_description, "Build things, fast");
        assert_eq!(requests[0].application_stage.as_deref(), Some("applied"));
        assert_eq!(requests[0].match_score, Some(4.5));
        assert_eq!(requests[1].application_stage, None);
        assert!(requests.iter().all(|r| r.user_id == "u1"));
    }

    #[test]
    fn test_skips_invalid_rows() {
        let data = "title,company,match_score\n,Acme,\nEngineer,Initech,7\nEngineer,Initech,3\n";
        let requests = read_jd_csv(data.as_bytes(), "u1").unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].match_score, Some(3.0));
    }

    #[test]
    fn test_missing_required_column_is_an_error() {
        let data = "title\nEngineer\n";
        assert!(read_jd_csv(data.as_bytes(), "u1").is_err());
    }
}
