// src/web/handlers/jd2cv_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;

use crate::app_log;
use crate::core::prompts;
use crate::core::{AiClient, ChatMessage, Database, ExperienceRepository, JdRepository};
use crate::core::{PdfRenderer, RenderError};
use crate::types::{
    CoverLetter, CoverLetterPdfRequest, CoverLetterRequest, GeneratePdfRequest, JdAnalysis,
    OptimizedExperience, ResumeV2Request,
};
use crate::utils::{cover_letter_filename, sanitize_filename_part, unwrap_ai_response};
use crate::web::types::*;

fn render_error(e: RenderError) -> ApiError {
    match e {
        RenderError::TooLarge(size) => api_error(
            Status::PayloadTooLarge,
            format!("Generated PDF is too large ({} bytes)", size),
            "PDF_TOO_LARGE",
            &["Shorten the content or drop optional sections"],
        ),
        RenderError::Other(e) => {
            app_log!(error, "PDF generation failed: {:#}", e);
            api_error(
                Status::InternalServerError,
                format!("PDF generation failed: {}", e),
                "PDF_GENERATION_ERROR",
                &["Check that typst is installed", "Try again in a few moments"],
            )
        }
    }
}

pub async fn analyze_jd_handler(
    db: &State<Database>,
    ai: &State<AiClient>,
    request: Json<AnalyzeJdRequest>,
) -> ApiResult<JdAnalysis> {
    if request.jd_id.trim().is_empty() || request.user_id.trim().is_empty() {
        return Err(bad_request("JD ID and User ID are required"));
    }

    let repo = JdRepository::new(db.pool());
    let record = repo
        .find(&request.jd_id, &request.user_id)
        .await
        .map_err(database_error)?
        .ok_or_else(|| not_found(format!("JD record not found: {}", request.jd_id)))?;

    if record.full_job_description.trim().is_empty() {
        return Err(bad_request("JD has no job description to analyze"));
    }

    app_log!(info, "Analyzing JD {} ({} at {})", record.id, record.title, record.company);

    let key_sentences = ai
        .complete_prompt(
            &prompts::key_sentences_prompt(&record.title, &record.full_job_description),
            prompts::KEY_SENTENCES_TEMPERATURE,
        )
        .await
        .map(|raw| unwrap_ai_response(&raw))
        .map_err(ai_error)?;

    let keywords = ai
        .complete_prompt(
            &prompts::keywords_prompt(&record.title, &key_sentences),
            prompts::KEYWORDS_TEMPERATURE,
        )
        .await
        .map(|raw| unwrap_ai_response(&raw))
        .map_err(ai_error)?;

    repo.set_analysis(&record.id, &key_sentences, &keywords)
        .await
        .map_err(database_error)?;

    let jd_record = repo
        .find(&record.id, &request.user_id)
        .await
        .map_err(database_error)?
        .unwrap_or(record);

    Ok(Json(DataResponse::success(
        "JD analyzed",
        JdAnalysis {
            key_sentences,
            keywords,
            jd_record,
        },
    )))
}

pub async fn optimize_cv_handler(
    db: &State<Database>,
    ai: &State<AiClient>,
    request: Json<OptimizeCvRequest>,
) -> ApiResult<OptimizedExperience> {
    if request.experience_id.trim().is_empty()
        || request.jd_keywords.trim().is_empty()
        || request.user_id.trim().is_empty()
    {
        return Err(bad_request(
            "Experience ID, JD keywords, and User ID are required",
        ));
    }

    let experience = ExperienceRepository::new(db.pool())
        .find(&request.experience_id)
        .await
        .map_err(database_error)?
        .filter(|exp| exp.user_id == request.user_id)
        .ok_or_else(|| not_found("Experience record not found"))?;

    let optimized_content = ai
        .complete_prompt(
            &prompts::optimize_prompt(&request.jd_keywords, &experience.experience),
            prompts::OPTIMIZE_TEMPERATURE,
        )
        .await
        .map(|raw| unwrap_ai_response(&raw))
        .map_err(ai_error)?;

    Ok(Json(DataResponse::success(
        "Experience optimized",
        OptimizedExperience {
            optimized_content,
            jd_keywords: request.jd_keywords.clone(),
        },
    )))
}

pub async fn generate_pdf_handler(
    pdf: &State<PdfRenderer>,
    request: Json<GeneratePdfRequest>,
) -> Result<PdfResponse, ApiError> {
    let name = &request.config.personal_info.full_name;
    if name.trim().is_empty() {
        return Err(bad_request("Personal information (name) is required"));
    }

    let bytes = pdf.render_resume(&request).await.map_err(render_error)?;
    let filename = format!("{}_Resume.pdf", sanitize_filename_part(name));
    app_log!(info, "Generated {} ({} bytes)", filename, bytes.len());
    Ok(PdfResponse::with_filename(bytes, filename))
}

pub async fn generate_pdf_v2_handler(
    pdf: &State<PdfRenderer>,
    request: Json<ResumeV2Request>,
) -> Result<PdfResponse, ApiError> {
    if !request.personal_info.has_basics() {
        return Err(bad_request("Personal information (name and email) is required"));
    }
    if request.ai_generated_experience.trim().is_empty() {
        return Err(bad_request("AI generated experience is required"));
    }

    let bytes = pdf.render_resume_v2(&request).await.map_err(render_error)?;
    let job_title = if request.job_title.trim().is_empty() {
        "Resume"
    } else {
        request.job_title.as_str()
    };
    let filename = format!(
        "{}_{}_Resume.pdf",
        sanitize_filename_part(&request.personal_info.full_name),
        sanitize_filename_part(job_title)
    );
    Ok(PdfResponse::with_filename(bytes, filename))
}

pub async fn generate_cover_letter_handler(
    ai: &State<AiClient>,
    request: Json<CoverLetterRequest>,
) -> ApiResult<CoverLetter> {
    if !request.personal_info.has_basics() {
        return Err(bad_request("Personal information (name and email) is required"));
    }
    if !request.jd_info.is_complete() {
        return Err(bad_request(
            "Job information (title, company, description) is required",
        ));
    }
    if request.tailored_experience.trim().is_empty() {
        return Err(bad_request("Tailored experience content is required"));
    }

    let prompt = prompts::cover_letter_prompt(
        &request.user_prompt,
        &request.personal_info,
        &request.jd_info,
        &request.tailored_experience,
    );
    let messages = [
        ChatMessage::system(prompts::COVER_LETTER_SYSTEM),
        ChatMessage::user(prompt),
    ];

    let cover_letter = ai
        .complete(
            &messages,
            prompts::COVER_LETTER_TEMPERATURE,
            Some(prompts::COVER_LETTER_MAX_TOKENS),
        )
        .await
        .map_err(ai_error)?;

    app_log!(
        info,
        "Generated cover letter for {} at {}",
        request.jd_info.title,
        request.jd_info.company
    );
    Ok(Json(DataResponse::success(
        "Cover letter generated",
        CoverLetter { cover_letter },
    )))
}

pub async fn generate_cover_letter_pdf_handler(
    pdf: &State<PdfRenderer>,
    request: Json<CoverLetterPdfRequest>,
) -> Result<PdfResponse, ApiError> {
    if !request.personal_info.has_basics() {
        return Err(bad_request("Personal information (name and email) is required"));
    }
    if request.cover_letter.trim().is_empty() {
        return Err(bad_request("Cover letter content is required"));
    }

    let bytes = pdf.render_cover_letter(&request).await.map_err(render_error)?;
    let filename = cover_letter_filename(
        &request.personal_info.full_name,
        &request.jd_info.company,
        &request.jd_info.title,
    );
    Ok(PdfResponse::with_filename(bytes, filename))
}
