use pretty_assertions::assert_eq;
use rocket::http::Status;
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jd2cv::build_rocket;
use jd2cv::core::{AiClient, Database, PdfRenderer};
use jd2cv::web::ServerConfig;

struct TestApp {
    client: Client,
    _dir: tempfile::TempDir,
}

async fn app(ai_url: &str) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::new(&dir.path().join("api.db")).await.unwrap();
    let ai = AiClient::new(ai_url, "test-key", "test-model", 5).unwrap();
    let pdf = PdfRenderer::new("typst-not-installed");
    let server_config = ServerConfig {
        data_dir: dir.path().to_path_buf(),
        environment: "test".to_string(),
    };

    let rocket = build_rocket(server_config, database, ai, pdf);
    let client = Client::tracked(rocket).await.unwrap();
    TestApp { client, _dir: dir }
}

async fn json_body(response: rocket::local::asynchronous::LocalResponse<'_>) -> Value {
    response.into_json::<Value>().await.unwrap()
}

async fn create_jd(app: &TestApp, title: &str, stage: &str) -> Value {
    let response = app
        .client
        .post("/api/jds")
        .json(&json!({
            "user_id": "u1",
            "title": title,
            "company": "Acme",
            "full_job_description": "We need Rust and SQL.",
            "application_stage": stage,
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    json_body(response).await["data"].clone()
}

async fn create_article(app: &TestApp, content: &str) -> i64 {
    let response = app
        .client
        .post("/api/master-language/articles")
        .json(&json!({"title": "Le chat", "content": content, "languagePair": "fr-en"}))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    json_body(response).await["data"]["id"].as_i64().unwrap()
}

#[rocket::async_test]
async fn jd_crud_round() {
    let app = app("http://127.0.0.1:9").await;
    let first = create_jd(&app, "Backend Engineer", "applied").await;
    create_jd(&app, "Data Engineer", "").await;
    let id = first["id"].as_str().unwrap().to_string();

    let list = json_body(app.client.get("/api/jds?user_id=u1").dispatch().await).await;
    assert_eq!(list["success"], true);
    assert_eq!(list["data"].as_array().unwrap().len(), 2);

    let stages = json_body(
        app.client
            .get("/api/jds?user_id=u1&get_stage_options=true")
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(stages["stage_options"], json!(["applied"]));

    let updated = app
        .client
        .put(format!("/api/jds/{}", id))
        .json(&json!({"user_id": "u1", "field": "match_score", "value": 4.5}))
        .dispatch()
        .await;
    assert_eq!(updated.status(), Status::Ok);
    assert_eq!(json_body(updated).await["data"]["match_score"], 4.5);

    let bad_score = app
        .client
        .put(format!("/api/jds/{}", id))
        .json(&json!({"user_id": "u1", "field": "match_score", "value": 4.2}))
        .dispatch()
        .await;
    assert_eq!(bad_score.status(), Status::BadRequest);
    assert_eq!(json_body(bad_score).await["error_code"], "VALIDATION_ERROR");

    let unknown_field = app
        .client
        .put(format!("/api/jds/{}", id))
        .json(&json!({"user_id": "u1", "field": "salary", "value": "lots"}))
        .dispatch()
        .await;
    assert_eq!(unknown_field.status(), Status::BadRequest);

    let deleted = app
        .client
        .delete(format!("/api/jds/{}?user_id=u1", id))
        .dispatch()
        .await;
    assert_eq!(deleted.status(), Status::Ok);
    let again = app
        .client
        .delete(format!("/api/jds/{}?user_id=u1", id))
        .dispatch()
        .await;
    assert_eq!(again.status(), Status::NotFound);
}

#[rocket::async_test]
async fn create_jd_requires_title_and_company() {
    let app = app("http://127.0.0.1:9").await;
    let response = app
        .client
        .post("/api/jds")
        .json(&json!({"user_id": "u1", "title": "", "company": "Acme"}))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["type"], "error");
}

#[rocket::async_test]
async fn analyze_jd_stores_key_sentences_and_keywords() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "{\"output\": \"Rust services; SQL\"}"}}]
        })))
        .mount(&ai)
        .await;

    let app = app(&ai.uri()).await;
    let record = create_jd(&app, "Backend Engineer", "").await;

    let response = app
        .client
        .post("/api/jd2cv/analyze-jd")
        .json(&json!({"jdId": record["id"], "userId": "u1"}))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let data = json_body(response).await["data"].clone();
    assert_eq!(data["keySentences"], "Rust services; SQL");
    assert_eq!(data["keywords"], "Rust services; SQL");
    assert_eq!(data["jdRecord"]["keywords_from_sentences"], "Rust services; SQL");

    let missing = app
        .client
        .post("/api/jd2cv/analyze-jd")
        .json(&json!({"jdId": "nope", "userId": "u1"}))
        .dispatch()
        .await;
    assert_eq!(missing.status(), Status::NotFound);
}

#[rocket::async_test]
async fn ai_failure_maps_to_bad_gateway() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&ai)
        .await;

    let app = app(&ai.uri()).await;
    let record = create_jd(&app, "Backend Engineer", "").await;
    let response = app
        .client
        .post("/api/jd2cv/analyze-jd")
        .json(&json!({"jdId": record["id"], "userId": "u1"}))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadGateway);
    assert_eq!(json_body(response).await["error_code"], "AI_SERVICE_ERROR");
}

#[rocket::async_test]
async fn pdf_routes_validate_before_rendering() {
    let app = app("http://127.0.0.1:9").await;

    let no_name = app
        .client
        .post("/api/jd2cv/generate-pdf")
        .json(&json!({"config": {"personalInfo": {"fullName": " "}}, "experienceModules": []}))
        .dispatch()
        .await;
    assert_eq!(no_name.status(), Status::BadRequest);

    let no_experience = app
        .client
        .post("/api/jd2cv/v2/generate-pdf")
        .json(&json!({
            "personalInfo": {"fullName": "Ada", "email": "ada@example.com"},
            "aiGeneratedExperience": ""
        }))
        .dispatch()
        .await;
    assert_eq!(no_experience.status(), Status::BadRequest);

    let incomplete_jd = app
        .client
        .post("/api/jd2cv/v2/generate-cover-letter")
        .json(&json!({
            "personalInfo": {"fullName": "Ada", "email": "ada@example.com"},
            "jdInfo": {"title": "Engineer", "company": "Acme"},
            "tailoredExperience": "Built things"
        }))
        .dispatch()
        .await;
    assert_eq!(incomplete_jd.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn cards_respect_article_offsets() {
    let app = app("http://127.0.0.1:9").await;
    let article_id = create_article(&app, "Le chat dort. Il rêve.").await;

    let card = app
        .client
        .post("/api/master-language/analysis-records")
        .json(&json!({
            "articleId": article_id,
            "kind": "word",
            "selectedText": "chat",
            "contextSentence": "Le chat dort.",
            "startOffset": 3,
            "endOffset": 7,
            "analysis": "cat (noun)",
            "aiNotes": "masculine"
        }))
        .dispatch()
        .await;
    assert_eq!(card.status(), Status::Ok);

    let out_of_range = app
        .client
        .post("/api/master-language/analysis-records")
        .json(&json!({
            "articleId": article_id,
            "selectedText": "rêve",
            "startOffset": 17,
            "endOffset": 40
        }))
        .dispatch()
        .await;
    assert_eq!(out_of_range.status(), Status::BadRequest);

    let unknown_article = app
        .client
        .post("/api/master-language/analysis-records")
        .json(&json!({
            "articleId": article_id + 100,
            "selectedText": "chat",
            "startOffset": 3,
            "endOffset": 7
        }))
        .dispatch()
        .await;
    assert_eq!(unknown_article.status(), Status::NotFound);

    let cards = json_body(
        app.client
            .get(format!("/api/master-language/analysis-records?articleId={}", article_id))
            .dispatch()
            .await,
    )
    .await;
    let cards = cards["data"].as_array().unwrap().clone();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["start_offset"], 3);
    assert_eq!(cards[0]["end_offset"], 7);

    let notes = json_body(
        app.client
            .get(format!("/api/master-language/ai-notes?articleId={}", article_id))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(notes["data"][0]["ai_notes"], "masculine");

    let card_id = cards[0]["id"].as_str().unwrap();
    let deleted = app
        .client
        .delete(format!(
            "/api/master-language/analysis-records?articleId={}&id={}",
            article_id, card_id
        ))
        .dispatch()
        .await;
    assert_eq!(deleted.status(), Status::Ok);
}

#[rocket::async_test]
async fn sentence_queries_lifecycle() {
    let app = app("http://127.0.0.1:9").await;
    let article_id = create_article(&app, "Le chat dort. Il rêve.").await;

    let marked = app
        .client
        .post("/api/master-language/sentence-queries")
        .json(&json!({
            "articleId": article_id,
            "sentenceText": "Il rêve.",
            "startOffset": 14,
            "endOffset": 22
        }))
        .dispatch()
        .await;
    assert_eq!(marked.status(), Status::Ok);
    let marked = json_body(marked).await["data"].clone();
    assert_eq!(marked["kind"], "sentence");
    assert_eq!(marked["query_type"], "manual_mark");

    let updated = app
        .client
        .put("/api/master-language/sentence-queries")
        .json(&json!({"id": marked["id"], "userNotes": "dreams"}))
        .dispatch()
        .await;
    assert_eq!(updated.status(), Status::Ok);
    assert_eq!(json_body(updated).await["data"]["user_notes"], "dreams");

    let listed = json_body(
        app.client
            .get(format!("/api/master-language/sentence-queries?articleId={}", article_id))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);

    let deleted = app
        .client
        .delete(format!(
            "/api/master-language/sentence-queries?articleId={}&sentenceId={}",
            article_id,
            marked["id"].as_str().unwrap()
        ))
        .dispatch()
        .await;
    assert_eq!(deleted.status(), Status::Ok);
}

#[rocket::async_test]
async fn sentence_queries_ignore_marked_words() {
    let app = app("http://127.0.0.1:9").await;
    let article_id = create_article(&app, "Le chat dort. Il rêve.").await;

    let word = app
        .client
        .post("/api/master-language/analysis-records")
        .json(&json!({
            "articleId": article_id,
            "kind": "word",
            "selectedText": "chat",
            "startOffset": 3,
            "endOffset": 7,
            "queryType": "manual_mark"
        }))
        .dispatch()
        .await;
    assert_eq!(word.status(), Status::Ok);
    let word = json_body(word).await["data"].clone();
    assert_eq!(word["query_type"], "manual_mark");

    let listed = json_body(
        app.client
            .get(format!("/api/master-language/sentence-queries?articleId={}", article_id))
            .dispatch()
            .await,
    )
    .await;
    assert!(listed["data"].as_array().unwrap().is_empty());

    let refused = app
        .client
        .delete(format!(
            "/api/master-language/sentence-queries?articleId={}&sentenceId={}",
            article_id,
            word["id"].as_str().unwrap()
        ))
        .dispatch()
        .await;
    assert_eq!(refused.status(), Status::NotFound);

    let records = json_body(
        app.client
            .get(format!("/api/master-language/analysis-records?articleId={}", article_id))
            .dispatch()
            .await,
    )
    .await;
    assert_eq!(records["data"].as_array().unwrap().len(), 1);
}

#[rocket::async_test]
async fn smart_analysis_relays_stream_and_failures() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"cat \"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"(noun)\"}}]}\n\n",
                "data: [DONE]\n\n",
            ),
            "text/event-stream",
        ))
        .mount(&ai)
        .await;

    let app = app(&ai.uri()).await;
    let request = json!({
        "mode": "simple",
        "selectedText": "chat",
        "contextSentence": "Le chat dort.",
        "language": "fr",
        "nativeLanguage": "en"
    });

    let response = app
        .client
        .post("/api/master-language/smart-analysis")
        .json(&request)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_string().await.unwrap();
    let cat = body.find("cat ").unwrap();
    let noun = body.find("(noun)").unwrap();
    let done = body.find("[DONE]").unwrap();
    assert!(cat < noun && noun < done);

    let ask_without_prompt = app
        .client
        .post("/api/master-language/smart-analysis")
        .json(&json!({
            "mode": "ask-ai",
            "selectedText": "chat",
            "language": "fr",
            "nativeLanguage": "en"
        }))
        .dispatch()
        .await;
    assert_eq!(ask_without_prompt.status(), Status::BadRequest);
}

#[rocket::async_test]
async fn smart_analysis_upstream_error_becomes_error_frame() {
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ai)
        .await;

    let app = app(&ai.uri()).await;
    let response = app
        .client
        .post("/api/master-language/smart-analysis")
        .json(&json!({
            "mode": "deep",
            "selectedText": "chat",
            "language": "fr",
            "nativeLanguage": "en"
        }))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body = response.into_string().await.unwrap();
    assert!(body.contains("\"error\":true"));
    assert!(body.contains("[DONE]"));
}

#[rocket::async_test]
async fn health_and_unknown_routes() {
    let app = app("http://127.0.0.1:9").await;

    let health = app.client.get("/api/health").dispatch().await;
    assert_eq!(health.status(), Status::Ok);
    let body = json_body(health).await;
    assert_eq!(body["data"]["environment"], "test");
    assert_eq!(body["data"]["ai_model"], "test-model");

    let missing = app.client.get("/api/nowhere").dispatch().await;
    assert_eq!(missing.status(), Status::NotFound);
    assert_eq!(json_body(missing).await["error_code"], "NOT_FOUND");
}
