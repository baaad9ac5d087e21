// src/web/handlers/reading_handlers.rs
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::core::prompts;
use crate::core::{AiClient, ArticleRepository, CardRepository, ChatMessage, Database};
use crate::reading::sse::{ContentFrame, DONE_MARKER};
use crate::types::{
    Article, Card, CardKind, NewCard, OffsetRange, QueryType, SmartAnalysisRequest,
};
use crate::web::types::*;

const ANALYSIS_FAILED: &str = "Analysis failed, please try again.";

async fn load_article(db: &Database, article_id: i64) -> Result<Article, ApiError> {
    ArticleRepository::new(db.pool())
        .find(article_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| not_found(format!("Article not found: {}", article_id)))
}

async fn save_card(db: &Database, new_card: &NewCard) -> Result<Card, ApiError> {
    let article = load_article(db, new_card.article_id).await?;
    if new_card.selected_text.trim().is_empty() {
        return Err(bad_request("Selected text is required"));
    }
    OffsetRange::new(new_card.start_offset, new_card.end_offset, article.char_len())
        .map_err(|e| bad_request(e.to_string()))?;

    CardRepository::new(db.pool())
        .create(&article, new_card)
        .await
        .map_err(database_error)
}

async fn cards_where(
    db: &Database,
    article_id: i64,
    keep: impl Fn(&Card) -> bool,
) -> Result<Vec<Card>, ApiError> {
    let cards = CardRepository::new(db.pool())
        .list_for_article(article_id)
        .await
        .map_err(database_error)?;
    Ok(cards.into_iter().filter(|card| keep(card)).collect())
}

/// Relay the AI answer as `data: {"content": ..}` frames closed by `[DONE]`.
pub async fn smart_analysis_handler(
    ai: &State<AiClient>,
    request: Json<SmartAnalysisRequest>,
) -> Result<EventStream![], ApiError> {
    request.validate().map_err(|e| bad_request(e.to_string()))?;

    let ai = ai.inner().clone();
    let messages = vec![ChatMessage::user(prompts::analysis_prompt(&request))];
    app_log!(
        info,
        "Smart analysis ({}) of {} chars",
        request.mode.as_str(),
        request.selected_text.chars().count()
    );

    Ok(EventStream! {
        match ai.stream(&messages, prompts::ANALYSIS_TEMPERATURE).await {
            Ok(mut deltas) => {
                while let Some(delta) = deltas.next_delta().await {
                    match delta {
                        Ok(token) => yield Event::json(&ContentFrame::token(token)),
                        Err(e) => {
                            app_log!(error, "Analysis stream failed: {:#}", e);
                            yield Event::json(&ContentFrame::failure(ANALYSIS_FAILED));
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                app_log!(error, "Analysis request failed: {:#}", e);
                yield Event::json(&ContentFrame::failure(ANALYSIS_FAILED));
            }
        }
        yield Event::data(DONE_MARKER);
    })
}

// ===== Analysis records =====

pub async fn list_cards_handler(db: &State<Database>, article_id: i64) -> ApiResult<Vec<Card>> {
    let cards = cards_where(db, article_id, |_| true).await?;
    Ok(Json(DataResponse::success(format!("{} records", cards.len()), cards)))
}

pub async fn create_card_handler(
    db: &State<Database>,
    request: Json<NewCard>,
) -> ApiResult<Card> {
    let card = save_card(db, &request).await?;
    Ok(Json(DataResponse::success("Analysis record saved", card)))
}

pub async fn delete_card_handler(
    db: &State<Database>,
    article_id: i64,
    id: String,
) -> Result<Json<TextResponse>, ApiError> {
    let deleted = CardRepository::new(db.pool())
        .delete(article_id, &id)
        .await
        .map_err(database_error)?;
    if !deleted {
        return Err(not_found(format!("Analysis record not found: {}", id)));
    }
    Ok(Json(TextResponse::success(format!("Deleted analysis record {}", id))))
}

pub async fn ai_notes_handler(db: &State<Database>, article_id: i64) -> ApiResult<Vec<Card>> {
    let cards = cards_where(db, article_id, |card| !card.ai_notes.trim().is_empty()).await?;
    Ok(Json(DataResponse::success(format!("{} notes", cards.len()), cards)))
}

// ===== Sentence queries =====

fn is_sentence_query(card: &Card) -> bool {
    card.kind == CardKind::Sentence
}

pub async fn list_sentence_queries_handler(
    db: &State<Database>,
    article_id: i64,
) -> ApiResult<Vec<Card>> {
    let cards = cards_where(db, article_id, is_sentence_query).await?;
    Ok(Json(DataResponse::success(format!("{} sentences", cards.len()), cards)))
}

pub async fn mark_sentence_handler(
    db: &State<Database>,
    request: Json<SentenceMarkRequest>,
) -> ApiResult<Card> {
    let new_card = NewCard {
        article_id: request.article_id,
        kind: CardKind::Sentence,
        selected_text: request.sentence_text.clone(),
        context_sentence: request.sentence_text.clone(),
        start_offset: request.start_offset,
        end_offset: request.end_offset,
        analysis: String::new(),
        analysis_mode: Default::default(),
        query_type: QueryType::ManualMark,
        user_notes: String::new(),
        ai_notes: String::new(),
    };
    let card = save_card(db, &new_card).await?;
    Ok(Json(DataResponse::success("Sentence marked", card)))
}

/// Delete a sentence card; cards of other kinds are left alone.
pub async fn delete_sentence_query_handler(
    db: &State<Database>,
    article_id: i64,
    sentence_id: String,
) -> Result<Json<TextResponse>, ApiError> {
    let sentences = cards_where(db, article_id, is_sentence_query).await?;
    if !sentences.iter().any(|card| card.id == sentence_id) {
        return Err(not_found(format!("Sentence record not found: {}", sentence_id)));
    }
    delete_card_handler(db, article_id, sentence_id).await
}

pub async fn update_sentence_notes_handler(
    db: &State<Database>,
    request: Json<UpdateNotesRequest>,
) -> ApiResult<Card> {
    if request.id.trim().is_empty() {
        return Err(bad_request("Record ID is required"));
    }
    if request.user_notes.is_none() && request.ai_notes.is_none() {
        return Err(bad_request("Nothing to update"));
    }

    let card = CardRepository::new(db.pool())
        .update_notes(
            &request.id,
            request.user_notes.as_deref(),
            request.ai_notes.as_deref(),
        )
        .await
        .map_err(database_error)?
        .ok_or_else(|| not_found(format!("Sentence record not found: {}", request.id)))?;

    Ok(Json(DataResponse::success("Notes updated", card)))
}

// ===== Articles =====

pub async fn list_articles_handler(db: &State<Database>) -> ApiResult<Vec<Article>> {
    let articles = ArticleRepository::new(db.pool())
        .list()
        .await
        .map_err(database_error)?;
    Ok(Json(DataResponse::success(
        format!("{} articles", articles.len()),
        articles,
    )))
}

pub async fn get_article_handler(db: &State<Database>, id: i64) -> ApiResult<Article> {
    let article = load_article(db, id).await?;
    Ok(Json(DataResponse::success("Article loaded", article)))
}

pub async fn create_article_handler(
    db: &State<Database>,
    request: Json<CreateArticleRequest>,
) -> ApiResult<Article> {
    if request.title.trim().is_empty() || request.content.trim().is_empty() {
        return Err(bad_request("Title and content are required"));
    }

    let article = ArticleRepository::new(db.pool())
        .create(&request.title, &request.content, &request.language_pair)
        .await
        .map_err(database_error)?;
    Ok(Json(DataResponse::success("Article created", article)))
}
