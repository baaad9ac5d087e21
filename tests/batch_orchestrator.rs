use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use jd2cv::batch::{
    BatchError, BatchOrchestrator, BatchPhase, BatchRequest, BatchState, ItemStatus,
    PipelineBackend,
};
use jd2cv::board::BatchSelection;
use jd2cv::types::{
    ExperienceRecord, GeneratePdfRequest, JdAnalysis, JdRecord, OptimizedExperience, PdfConfig,
    PersonalInfo,
};

fn jd(id: &str, company: &str) -> JdRecord {
    JdRecord {
        id: id.to_string(),
        user_id: "u1".to_string(),
        title: "Backend Engineer".to_string(),
        company: company.to_string(),
        full_job_description: "Rust, SQL".to_string(),
        jd_key_sentences: String::new(),
        keywords_from_sentences: String::new(),
        application_stage: String::new(),
        role_group: String::new(),
        firm_type: String::new(),
        comment: String::new(),
        match_score: None,
        cv_pdf_url: None,
        cv_pdf_filename: None,
        created_at: Utc::now(),
    }
}

fn experience(id: &str, time: &str) -> ExperienceRecord {
    ExperienceRecord {
        id: id.to_string(),
        user_id: "u1".to_string(),
        jd_id: None,
        company: format!("Company {}", id),
        title: "Engineer".to_string(),
        experience: "Built services".to_string(),
        keywords: Vec::new(),
        role_group: None,
        work_or_project: None,
        time: Some(time.to_string()),
        comment: None,
        created_at: Utc::now(),
    }
}

fn config() -> PdfConfig {
    PdfConfig::new(PersonalInfo {
        full_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        ..Default::default()
    })
}

/// Records every call; analysis of `fail_on` errors.
#[derive(Clone, Default)]
struct FakeBackend {
    calls: Arc<Mutex<Vec<String>>>,
    fail_on: Option<String>,
    cancel_after_render: Option<(usize, CancellationToken)>,
}

impl FakeBackend {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PipelineBackend for FakeBackend {
    async fn analyze_jd(&self, jd_id: &str, _user_id: &str) -> Result<JdAnalysis> {
        self.log(format!("analyze {}", jd_id));
        if self.fail_on.as_deref() == Some(jd_id) {
            anyhow::bail!("HTTP 502 error: AI service failed");
        }
        Ok(JdAnalysis {
            key_sentences: "Builds APIs".to_string(),
            keywords: "rust, sql".to_string(),
            jd_record: jd(jd_id, "Acme"),
        })
    }

    async fn fetch_experiences(&self, _user_id: &str) -> Result<Vec<ExperienceRecord>> {
        self.log("experiences".to_string());
        Ok(vec![
            experience("e1", "2015-2018"),
            experience("e2", "Jan 2020 - Present"),
            experience("e3", "2012"),
        ])
    }

    async fn optimize_experience(
        &self,
        experience_id: &str,
        jd_keywords: &str,
        _user_id: &str,
    ) -> Result<OptimizedExperience> {
        self.log(format!("optimize {}", experience_id));
        Ok(OptimizedExperience {
            optimized_content: "• Shipped Rust services\n\n- Tuned SQL".to_string(),
            jd_keywords: jd_keywords.to_string(),
        })
    }

    async fn generate_pdf(&self, request: &GeneratePdfRequest) -> Result<Vec<u8>> {
        self.log(format!("render {}", request.experience_modules.len()));
        let renders = self.calls().iter().filter(|c| c.starts_with("render")).count();
        if let Some((after, token)) = &self.cancel_after_render {
            if renders == *after {
                token.cancel();
            }
        }
        Ok(b"%PDF-1.7".to_vec())
    }
}

fn selection_of(records: &[JdRecord]) -> BatchSelection {
    let mut selection = BatchSelection::new();
    selection.select_all(records.iter().map(|r| r.id.as_str()));
    selection
}

fn starred() -> HashSet<String> {
    ["e1", "e2"].iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn failing_item_is_recorded_and_later_items_still_run() {
    let backend = FakeBackend {
        fail_on: Some("jd2".to_string()),
        ..Default::default()
    };
    let records = vec![jd("jd1", "Acme"), jd("jd2", "Globex"), jd("jd3", "Initech")];
    let mut selection = selection_of(&records);
    let mut pdfs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut snapshots: Vec<BatchState> = Vec::new();
    let mut progress = |state: &BatchState| snapshots.push(state.clone());

    let mut orchestrator =
        BatchOrchestrator::new(backend.clone()).with_reset_delay(Duration::from_millis(1));
    let summary = orchestrator
        .run(
            BatchRequest {
                user_id: "u1",
                records,
                config: Some(config()),
                starred: starred(),
            },
            &mut selection,
            &CancellationToken::new(),
            &mut pdfs,
            &mut progress,
        )
        .await
        .unwrap();

    assert_eq!(summary.phase, BatchPhase::Completed);
    assert_eq!(summary.items[0].status, ItemStatus::Completed);
    assert!(matches!(&summary.items[1].status, ItemStatus::Failed(msg) if msg.contains("502")));
    assert_eq!(summary.items[2].status, ItemStatus::Completed);
    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.failed(), 1);

    let names: Vec<&str> = pdfs.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Ada_Lovelace_Acme_Backend_Engineer_Resume.pdf",
            "Ada_Lovelace_Initech_Backend_Engineer_Resume.pdf",
        ]
    );

    // Starred experiences only, most recent first, optimized one at a time.
    let calls = backend.calls();
    assert_eq!(
        &calls[..5],
        &[
            "analyze jd1",
            "experiences",
            "optimize e2",
            "optimize e1",
            "render 2",
        ]
    );
    assert!(!calls.contains(&"optimize e3".to_string()));

    // Progress never decreases during the run and the state resets afterwards.
    let running: Vec<u8> = snapshots
        .iter()
        .filter(|s| s.phase != BatchPhase::Idle)
        .map(|s| s.progress)
        .collect();
    assert!(running.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(running.last(), Some(&100));
    assert_eq!(snapshots.last().unwrap(), &BatchState::default());
    assert_eq!(orchestrator.state(), &BatchState::default());
    assert!(selection.is_empty());
}

#[tokio::test]
async fn cancellation_after_second_item_leaves_rest_pending() {
    let cancel = CancellationToken::new();
    let backend = FakeBackend {
        cancel_after_render: Some((2, cancel.clone())),
        ..Default::default()
    };
    let records: Vec<JdRecord> = (1..=5)
        .map(|i| jd(&format!("jd{}", i), "Acme"))
        .collect();
    let mut selection = selection_of(&records);
    let mut pdfs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut progress = |_: &BatchState| {};

    let mut orchestrator =
        BatchOrchestrator::new(backend.clone()).with_reset_delay(Duration::from_millis(1));
    let summary = orchestrator
        .run(
            BatchRequest {
                user_id: "u1",
                records,
                config: Some(config()),
                starred: starred(),
            },
            &mut selection,
            &cancel,
            &mut pdfs,
            &mut progress,
        )
        .await
        .unwrap();

    assert_eq!(summary.phase, BatchPhase::Cancelled);
    assert_eq!(summary.completed(), 2);
    assert_eq!(summary.pending(), 3);
    assert_eq!(pdfs.len(), 2);

    let analyzed: Vec<String> = backend
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("analyze"))
        .collect();
    assert_eq!(analyzed, vec!["analyze jd1", "analyze jd2"]);
}

#[tokio::test]
async fn validation_errors_stop_before_any_call() {
    let backend = FakeBackend::default();
    let mut orchestrator = BatchOrchestrator::new(backend.clone());
    let mut pdfs: Vec<(String, Vec<u8>)> = Vec::new();
    let mut progress = |_: &BatchState| {};
    let records = vec![jd("jd1", "Acme")];
    let mut selection = selection_of(&records);

    let missing_config = orchestrator
        .run(
            BatchRequest {
                user_id: "u1",
                records: records.clone(),
                config: None,
                starred: starred(),
            },
            &mut selection,
            &CancellationToken::new(),
            &mut pdfs,
            &mut progress,
        )
        .await;
    assert_eq!(
        missing_config.unwrap_err(),
        BatchError::Validation("Please configure PDF settings first".to_string())
    );

    let no_starred = orchestrator
        .run(
            BatchRequest {
                user_id: "u1",
                records,
                config: Some(config()),
                starred: HashSet::new(),
            },
            &mut selection,
            &CancellationToken::new(),
            &mut pdfs,
            &mut progress,
        )
        .await;
    assert!(matches!(no_starred, Err(BatchError::Validation(_))));

    assert!(backend.calls().is_empty());
    assert_eq!(selection.len(), 1);
}
