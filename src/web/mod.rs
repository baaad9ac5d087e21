// src/web/mod.rs
//! Rocket API: JD board, CV pipeline and reading-tool routes under `/api`

pub mod handlers;
pub mod types;

pub use types::{PdfResponse, ServerConfig};

use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::response::stream::EventStream;
use rocket::serde::json::Json;
use rocket::{
    catchers, delete, get, options, post, put, routes, Build, FromForm, Request, Response, Rocket,
    State,
};

use crate::app_log;
use crate::config::ConfigManager;
use crate::core::{AiClient, Database, PdfRenderer};
use crate::types::{
    Article, Card, CoverLetter, CoverLetterPdfRequest, CoverLetterRequest, CreateExperienceRequest,
    CreateJdRequest, ExperienceRecord, GeneratePdfRequest, JdAnalysis, JdRecord, NewCard,
    OptimizedExperience, ResumeV2Request, SmartAnalysisRequest,
};
use types::*;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PUT, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

#[derive(Debug, FromForm)]
pub struct ArticleQuery {
    #[field(name = "articleId")]
    pub article_id: i64,
}

#[derive(Debug, FromForm)]
pub struct RecordQuery {
    #[field(name = "articleId")]
    pub article_id: i64,
    pub id: String,
}

#[derive(Debug, FromForm)]
pub struct SentenceQuery {
    #[field(name = "articleId")]
    pub article_id: i64,
    #[field(name = "sentenceId")]
    pub sentence_id: String,
}

// ===== JD board =====

#[get("/jds?<user_id>&<get_stage_options>")]
pub async fn list_jds(
    db: &State<Database>,
    user_id: String,
    get_stage_options: Option<bool>,
) -> Result<handlers::JdListResponse, ApiError> {
    handlers::list_jds_handler(db, user_id, get_stage_options.unwrap_or(false)).await
}

#[post("/jds", data = "<request>")]
pub async fn create_jd(db: &State<Database>, request: Json<CreateJdRequest>) -> ApiResult<JdRecord> {
    handlers::create_jd_handler(db, request).await
}

#[put("/jds/<id>", data = "<request>")]
pub async fn update_jd(
    db: &State<Database>,
    id: &str,
    request: Json<UpdateFieldRequest>,
) -> ApiResult<JdRecord> {
    handlers::update_jd_handler(db, id, request).await
}

#[delete("/jds/<id>?<user_id>")]
pub async fn delete_jd(
    db: &State<Database>,
    id: &str,
    user_id: String,
) -> Result<Json<TextResponse>, ApiError> {
    handlers::delete_jd_handler(db, id, user_id).await
}

#[get("/experience?<user_id>")]
pub async fn list_experiences(
    db: &State<Database>,
    user_id: String,
) -> ApiResult<Vec<ExperienceRecord>> {
    handlers::list_experiences_handler(db, user_id).await
}

#[post("/experience", data = "<request>")]
pub async fn create_experience(
    db: &State<Database>,
    request: Json<CreateExperienceRequest>,
) -> ApiResult<ExperienceRecord> {
    handlers::create_experience_handler(db, request).await
}

// ===== CV pipeline =====

#[post("/jd2cv/analyze-jd", data = "<request>")]
pub async fn analyze_jd(
    db: &State<Database>,
    ai: &State<AiClient>,
    request: Json<AnalyzeJdRequest>,
) -> ApiResult<JdAnalysis> {
    handlers::analyze_jd_handler(db, ai, request).await
}

#[post("/jd2cv/optimize-cv", data = "<request>")]
pub async fn optimize_cv(
    db: &State<Database>,
    ai: &State<AiClient>,
    request: Json<OptimizeCvRequest>,
) -> ApiResult<OptimizedExperience> {
    handlers::optimize_cv_handler(db, ai, request).await
}

#[post("/jd2cv/generate-pdf", data = "<request>")]
pub async fn generate_pdf(
    pdf: &State<PdfRenderer>,
    request: Json<GeneratePdfRequest>,
) -> Result<PdfResponse, ApiError> {
    handlers::generate_pdf_handler(pdf, request).await
}

#[post("/jd2cv/v2/generate-pdf", data = "<request>")]
pub async fn generate_pdf_v2(
    pdf: &State<PdfRenderer>,
    request: Json<ResumeV2Request>,
) -> Result<PdfResponse, ApiError> {
    handlers::generate_pdf_v2_handler(pdf, request).await
}

#[post("/jd2cv/v2/generate-cover-letter", data = "<request>")]
pub async fn generate_cover_letter(
    ai: &State<AiClient>,
    request: Json<CoverLetterRequest>,
) -> ApiResult<CoverLetter> {
    handlers::generate_cover_letter_handler(ai, request).await
}

#[post("/jd2cv/v2/generate-cover-letter-pdf", data = "<request>")]
pub async fn generate_cover_letter_pdf(
    pdf: &State<PdfRenderer>,
    request: Json<CoverLetterPdfRequest>,
) -> Result<PdfResponse, ApiError> {
    handlers::generate_cover_letter_pdf_handler(pdf, request).await
}

// ===== Reading tool =====

#[post("/master-language/smart-analysis", data = "<request>")]
pub async fn smart_analysis(
    ai: &State<AiClient>,
    request: Json<SmartAnalysisRequest>,
) -> Result<EventStream![], ApiError> {
    handlers::smart_analysis_handler(ai, request).await
}

#[get("/master-language/analysis-records?<query..>")]
pub async fn list_cards(db: &State<Database>, query: ArticleQuery) -> ApiResult<Vec<Card>> {
    handlers::list_cards_handler(db, query.article_id).await
}

#[post("/master-language/analysis-records", data = "<request>")]
pub async fn create_card(db: &State<Database>, request: Json<NewCard>) -> ApiResult<Card> {
    handlers::create_card_handler(db, request).await
}

#[delete("/master-language/analysis-records?<query..>")]
pub async fn delete_card(
    db: &State<Database>,
    query: RecordQuery,
) -> Result<Json<TextResponse>, ApiError> {
    handlers::delete_card_handler(db, query.article_id, query.id).await
}

#[get("/master-language/ai-notes?<query..>")]
pub async fn ai_notes(db: &State<Database>, query: ArticleQuery) -> ApiResult<Vec<Card>> {
    handlers::ai_notes_handler(db, query.article_id).await
}

#[get("/master-language/sentence-queries?<query..>")]
pub async fn list_sentence_queries(
    db: &State<Database>,
    query: ArticleQuery,
) -> ApiResult<Vec<Card>> {
    handlers::list_sentence_queries_handler(db, query.article_id).await
}

#[post("/master-language/sentence-queries", data = "<request>")]
pub async fn mark_sentence(
    db: &State<Database>,
    request: Json<SentenceMarkRequest>,
) -> ApiResult<Card> {
    handlers::mark_sentence_handler(db, request).await
}

#[put("/master-language/sentence-queries", data = "<request>")]
pub async fn update_sentence_notes(
    db: &State<Database>,
    request: Json<UpdateNotesRequest>,
) -> ApiResult<Card> {
    handlers::update_sentence_notes_handler(db, request).await
}

#[delete("/master-language/sentence-queries?<query..>")]
pub async fn delete_sentence_query(
    db: &State<Database>,
    query: SentenceQuery,
) -> Result<Json<TextResponse>, ApiError> {
    handlers::delete_sentence_query_handler(db, query.article_id, query.sentence_id).await
}

#[get("/master-language/articles")]
pub async fn list_articles(db: &State<Database>) -> ApiResult<Vec<Article>> {
    handlers::list_articles_handler(db).await
}

#[post("/master-language/articles", data = "<request>")]
pub async fn create_article(
    db: &State<Database>,
    request: Json<CreateArticleRequest>,
) -> ApiResult<Article> {
    handlers::create_article_handler(db, request).await
}

#[get("/master-language/articles/<id>")]
pub async fn get_article(db: &State<Database>, id: i64) -> ApiResult<Article> {
    handlers::get_article_handler(db, id).await
}

#[get("/health")]
pub async fn health(
    config: &State<ServerConfig>,
    db: &State<Database>,
    ai: &State<AiClient>,
) -> Result<Json<DataResponse<handlers::HealthStatus>>, ApiError> {
    handlers::health_handler(config, db, ai).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

// Error catchers
fn caught(error: &str, code: &str, suggestions: &[&str]) -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        error.to_string(),
        code.to_string(),
        suggestions.iter().map(|s| s.to_string()).collect(),
    ))
}

#[rocket::catch(400)]
pub fn bad_request_catcher() -> Json<StandardErrorResponse> {
    caught(
        "Invalid request format",
        "BAD_REQUEST",
        &[
            "Check your request JSON format",
            "Verify all required fields are present",
        ],
    )
}

#[rocket::catch(404)]
pub fn not_found_catcher(request: &Request<'_>) -> Json<StandardErrorResponse> {
    caught(
        &format!("No route for {} {}", request.method(), request.uri()),
        "NOT_FOUND",
        &["Check the endpoint path and its query parameters"],
    )
}

#[rocket::catch(422)]
pub fn unprocessable_catcher() -> Json<StandardErrorResponse> {
    caught(
        "Request body or query could not be parsed",
        "VALIDATION_ERROR",
        &["Verify field names and value types"],
    )
}

#[rocket::catch(500)]
pub fn internal_error_catcher() -> Json<StandardErrorResponse> {
    caught(
        "Internal server error",
        "INTERNAL_ERROR",
        &[
            "Try again in a few moments",
            "Contact support if the problem persists",
        ],
    )
}

/// Assemble the server with its managed state; `start_web_server` launches it.
pub fn build_rocket(
    server_config: ServerConfig,
    database: Database,
    ai: AiClient,
    pdf: PdfRenderer,
) -> Rocket<Build> {
    rocket::build()
        .attach(Cors)
        .manage(server_config)
        .manage(database)
        .manage(ai)
        .manage(pdf)
        .register(
            "/api",
            catchers![
                bad_request_catcher,
                not_found_catcher,
                unprocessable_catcher,
                internal_error_catcher
            ],
        )
        .mount(
            "/api",
            routes![
                list_jds,
                create_jd,
                update_jd,
                delete_jd,
                list_experiences,
                create_experience,
                analyze_jd,
                optimize_cv,
                generate_pdf,
                generate_pdf_v2,
                generate_cover_letter,
                generate_cover_letter_pdf,
                smart_analysis,
                list_cards,
                create_card,
                delete_card,
                ai_notes,
                list_sentence_queries,
                mark_sentence,
                update_sentence_notes,
                delete_sentence_query,
                list_articles,
                create_article,
                get_article,
                health,
                options,
            ],
        )
}

// Main server start function
pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    config.ensure_directories().await?;

    let database = match Database::new(&config.environment.database_path).await {
        Ok(db) => db,
        Err(e) => {
            app_log!(error, "Failed to initialize database: {:#}", e);
            return Err(e);
        }
    };

    if config.service.ai_api_key.is_empty() {
        app_log!(warn, "AI_API_KEY is not set; AI routes will fail");
    }
    let ai = AiClient::from_config(&config.service)?;
    let pdf = PdfRenderer::new(config.service.typst_bin.clone());

    let server_config = ServerConfig {
        data_dir: config.environment.data_path.clone(),
        environment: ConfigManager::environment_name(),
    };

    app_log!(info, "Starting JD2CV API server on port {}", config.port);
    app_log!(info, "Database: {}", config.environment.database_path.display());
    app_log!(info, "AI model: {}", ai.model());

    let figment = rocket::Config::figment().merge(("port", config.port));
    build_rocket(server_config, database, ai, pdf)
        .configure(figment)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed: {}", e))?;

    Ok(())
}
