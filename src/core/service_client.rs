// src/core/service_client.rs
//! HTTP client for the JD2CV API: JD board, batch pipeline and reading routes

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::app_log;
use crate::batch::PipelineBackend;
use crate::board::JdStore;
use crate::reading::sse::{SseDecoder, SseEvent};
use crate::reading::ReadingBackend;
use crate::types::{
    ApiResponse, Article, Card, CreateExperienceRequest, CreateJdRequest, ExperienceRecord,
    FieldValue, GeneratePdfRequest, JdAnalysis, JdField, JdRecord, NewCard, OptimizedExperience,
    SmartAnalysisRequest, StageOptionsResponse,
};

const JDS_ENDPOINT: &str = "/api/jds";
const EXPERIENCE_ENDPOINT: &str = "/api/experience";
const ANALYZE_JD_ENDPOINT: &str = "/api/jd2cv/analyze-jd";
const OPTIMIZE_CV_ENDPOINT: &str = "/api/jd2cv/optimize-cv";
const GENERATE_PDF_ENDPOINT: &str = "/api/jd2cv/generate-pdf";
const SMART_ANALYSIS_ENDPOINT: &str = "/api/master-language/smart-analysis";
const ANALYSIS_RECORDS_ENDPOINT: &str = "/api/master-language/analysis-records";
const ARTICLES_ENDPOINT: &str = "/api/master-language/articles";

pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Create new service client with configuration
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    // ===== JD records =====

    pub async fn list_jds(&self, user_id: &str) -> Result<Vec<JdRecord>> {
        let response: ApiResponse<Vec<JdRecord>> = self
            .get_with_query(JDS_ENDPOINT, &[("user_id", user_id)])
            .await?;
        response.into_result()
    }

    pub async fn stage_options(&self, user_id: &str) -> Result<Vec<String>> {
        let response: StageOptionsResponse = self
            .get_with_query(
                JDS_ENDPOINT,
                &[("user_id", user_id), ("get_stage_options", "true")],
            )
            .await?;
        if !response.success {
            anyhow::bail!("Failed to load stage options");
        }
        Ok(response.stage_options)
    }

    pub async fn create_jd(&self, request: &CreateJdRequest) -> Result<JdRecord> {
        let response: ApiResponse<JdRecord> = self.post_json(JDS_ENDPOINT, request).await?;
        response.into_result()
    }

    pub async fn update_jd_field(
        &self,
        id: &str,
        user_id: &str,
        field: JdField,
        value: &FieldValue,
    ) -> Result<JdRecord> {
        let payload = serde_json::json!({
            "user_id": user_id,
            "field": field.as_str(),
            "value": value.to_json(),
        });
        let response: ApiResponse<JdRecord> = self
            .put_json(&format!("{}/{}", JDS_ENDPOINT, id), &payload)
            .await?;
        response.into_result()
    }

    pub async fn delete_jd(&self, id: &str, user_id: &str) -> Result<()> {
        let url = self.url(&format!("{}/{}", JDS_ENDPOINT, id));
        let response = self
            .client
            .delete(&url)
            .query(&[("user_id", user_id)])
            .send()
            .await
            .with_context(|| format!("Failed to DELETE {}", url))?;

        let body: ApiResponse<serde_json::Value> = Self::read_json(response).await?;
        if !body.success {
            anyhow::bail!(
                "{}",
                body.error.unwrap_or_else(|| "Failed to delete JD".to_string())
            );
        }
        Ok(())
    }

    // ===== Experiences and the CV pipeline =====

    pub async fn list_experiences(&self, user_id: &str) -> Result<Vec<ExperienceRecord>> {
        let response: ApiResponse<Vec<ExperienceRecord>> = self
            .get_with_query(EXPERIENCE_ENDPOINT, &[("user_id", user_id)])
            .await?;
        response.into_result()
    }

    pub async fn create_experience(
        &self,
        request: &CreateExperienceRequest,
    ) -> Result<ExperienceRecord> {
        let response: ApiResponse<ExperienceRecord> =
            self.post_json(EXPERIENCE_ENDPOINT, request).await?;
        response.into_result()
    }

    pub async fn analyze_jd(&self, jd_id: &str, user_id: &str) -> Result<JdAnalysis> {
        app_log!(trace, "Calling JD analysis for {}", jd_id);
        let payload = serde_json::json!({ "jdId": jd_id, "userId": user_id });
        let response: ApiResponse<JdAnalysis> =
            self.post_json(ANALYZE_JD_ENDPOINT, &payload).await?;
        response.into_result()
    }

    pub async fn optimize_experience(
        &self,
        experience_id: &str,
        jd_keywords: &str,
        user_id: &str,
    ) -> Result<OptimizedExperience> {
        let payload = serde_json::json!({
            "experienceId": experience_id,
            "jdKeywords": jd_keywords,
            "userId": user_id,
        });
        let response: ApiResponse<OptimizedExperience> =
            self.post_json(OPTIMIZE_CV_ENDPOINT, &payload).await?;
        response.into_result()
    }

    /// Render a CV and return the PDF bytes
    pub async fn generate_pdf(&self, request: &GeneratePdfRequest) -> Result<Vec<u8>> {
        let url = self.url(GENERATE_PDF_ENDPOINT);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to POST to {}", url))?;

        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await.context("Failed to read PDF body")?;
            Ok(bytes.to_vec())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("HTTP {} error: {}", status, error_message(&error_text))
        }
    }

    // ===== Reading tool =====

    pub async fn list_articles(&self) -> Result<Vec<Article>> {
        let response: ApiResponse<Vec<Article>> = self.get(ARTICLES_ENDPOINT).await?;
        response.into_result()
    }

    pub async fn get_article(&self, id: i64) -> Result<Article> {
        let response: ApiResponse<Article> = self
            .get(&format!("{}/{}", ARTICLES_ENDPOINT, id))
            .await?;
        response.into_result()
    }

    pub async fn list_cards(&self, article_id: i64) -> Result<Vec<Card>> {
        let article_id = article_id.to_string();
        let response: ApiResponse<Vec<Card>> = self
            .get_with_query(ANALYSIS_RECORDS_ENDPOINT, &[("articleId", article_id.as_str())])
            .await?;
        response.into_result()
    }

    pub async fn create_card(&self, card: &NewCard) -> Result<Card> {
        let response: ApiResponse<Card> = self.post_json(ANALYSIS_RECORDS_ENDPOINT, card).await?;
        response.into_result()
    }

    /// Request an analysis; the answer is either an SSE stream or one JSON body.
    pub async fn smart_analysis(
        &self,
        request: &SmartAnalysisRequest,
        cancel: &CancellationToken,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Option<String>> {
        let url = self.url(SMART_ANALYSIS_ENDPOINT);
        let send = self.client.post(&url).json(request).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            response = send => response.with_context(|| format!("Failed to POST to {}", url))?,
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("HTTP {} error: {}", status, error_message(&error_text));
        }

        let is_stream = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("text/event-stream"))
            .unwrap_or(false);

        if !is_stream {
            let body: serde_json::Value = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                body = response.json::<serde_json::Value>() => body.context("Failed to parse analysis response")?,
            };
            return analysis_from_json(&body).map(Some);
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut text = String::new();

        'read: loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                next = stream.next() => next,
            };
            let ended = next.is_none();
            let events = match next {
                Some(chunk) => decoder.feed(&chunk.context("Analysis stream interrupted")?),
                None => decoder.finish(),
            };

            for event in events {
                match event {
                    SseEvent::Token(token) => {
                        on_token(&token);
                        text.push_str(&token);
                    }
                    SseEvent::Error(message) => anyhow::bail!("Analysis failed: {}", message),
                    SseEvent::Done => break 'read,
                }
            }

            if ended {
                break;
            }
        }

        Ok(Some(text))
    }

    // ===== Generic helpers =====

    async fn read_json<R>(response: reqwest::Response) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        if status.is_success() {
            response
                .json::<R>()
                .await
                .context("Failed to parse JSON response")
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("HTTP {} error: {}", status, error_message(&error_text))
        }
    }

    /// Generic POST request with JSON
    pub async fn post_json<T, R>(&self, endpoint: &str, payload: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to POST to {}", url))?;

        Self::read_json(response).await
    }

    pub async fn put_json<T, R>(&self, endpoint: &str, payload: &T) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let response = self
            .client
            .put(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("Failed to PUT to {}", url))?;

        Self::read_json(response).await
    }

    /// Generic GET request
    pub async fn get<R>(&self, endpoint: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.get_with_query(endpoint, &[]).await
    }

    pub async fn get_with_query<R>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to GET from {}", url))?;

        Self::read_json(response).await
    }
}

/// `error` field of a JSON error body, or the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Text of a non-streamed analysis answer.
fn analysis_from_json(body: &serde_json::Value) -> Result<String> {
    let source = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    for key in ["definition", "analysis", "content"] {
        if let Some(text) = source.get(key).and_then(|v| v.as_str()) {
            return Ok(text.to_string());
        }
    }
    if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
        anyhow::bail!("Analysis failed: {}", error);
    }
    anyhow::bail!("Analysis response carried no text")
}

#[async_trait]
impl JdStore for ServiceClient {
    async fn list(&self, user_id: &str) -> Result<Vec<JdRecord>> {
        self.list_jds(user_id).await
    }

    async fn stage_options(&self, user_id: &str) -> Result<Vec<String>> {
        ServiceClient::stage_options(self, user_id).await
    }

    async fn create(&self, request: &CreateJdRequest) -> Result<JdRecord> {
        self.create_jd(request).await
    }

    async fn update_field(
        &self,
        id: &str,
        user_id: &str,
        field: JdField,
        value: &FieldValue,
    ) -> Result<JdRecord> {
        self.update_jd_field(id, user_id, field, value).await
    }

    async fn delete(&self, id: &str, user_id: &str) -> Result<()> {
        self.delete_jd(id, user_id).await
    }
}

#[async_trait]
impl PipelineBackend for ServiceClient {
    async fn analyze_jd(&self, jd_id: &str, user_id: &str) -> Result<JdAnalysis> {
        ServiceClient::analyze_jd(self, jd_id, user_id).await
    }

    async fn fetch_experiences(&self, user_id: &str) -> Result<Vec<ExperienceRecord>> {
        self.list_experiences(user_id).await
    }

    async fn optimize_experience(
        &self,
        experience_id: &str,
        jd_keywords: &str,
        user_id: &str,
    ) -> Result<OptimizedExperience> {
        ServiceClient::optimize_experience(self, experience_id, jd_keywords, user_id).await
    }

    async fn generate_pdf(&self, request: &GeneratePdfRequest) -> Result<Vec<u8>> {
        ServiceClient::generate_pdf(self, request).await
    }
}

#[async_trait]
impl ReadingBackend for ServiceClient {
    async fn fetch_cards(&self, article_id: i64) -> Result<Vec<Card>> {
        self.list_cards(article_id).await
    }

    async fn save_card(&self, card: &NewCard) -> Result<Card> {
        self.create_card(card).await
    }

    async fn analyze(
        &self,
        request: &SmartAnalysisRequest,
        cancel: &CancellationToken,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Option<String>> {
        self.smart_analysis(request, cancel, on_token).await
    }
}
