// src/core/prompts.rs
//! Prompt templates for JD analysis, experience rewriting, cover letters and
//! reading analysis

use crate::types::{AnalysisMode, JdInfo, PersonalInfo, SmartAnalysisRequest};

pub const KEY_SENTENCES_TEMPERATURE: f32 = 0.3;
pub const KEYWORDS_TEMPERATURE: f32 = 0.3;
pub const OPTIMIZE_TEMPERATURE: f32 = 0.7;
pub const COVER_LETTER_TEMPERATURE: f32 = 0.7;
pub const COVER_LETTER_MAX_TOKENS: u32 = 800;
pub const ANALYSIS_TEMPERATURE: f32 = 0.7;

pub const KEY_SENTENCES_PROMPT: &str = "Analyze the following job description and extract the 10 most important sentences that define the core responsibilities, requirements, and expectations for this role.

Focus on:
- Key technical skills and qualifications
- Primary job responsibilities
- Important experience requirements
- Critical performance expectations
- Essential competencies

Job Title: {title}

Job Description:
{full_job_description}

Please provide exactly 10 sentences from the original job description text, ranked by importance (1 being most important). Format as a simple numbered list using plain text only:

1. [First sentence]
2. [Second sentence]
3. [Third sentence]
...

Do not use JSON, markdown formatting, or any special characters. Use only plain text with simple numbering.";

pub const KEYWORDS_PROMPT: &str = "Based on the following 10 key sentences extracted from a job description and the job title, identify the most important 3 groups of keywords (3 keywords per group) that represent the core competencies and requirements for this role.

Job Title: {title}

Key Sentences:
{key_sentences}

Please provide exactly 3 groups of keywords, with each group containing exactly 3 related keywords. Format as plain text only:

Group 1: [Theme Name]
1. Keyword 1
2. Keyword 2
3. Keyword 3

Group 2: [Theme Name]
1. Keyword 1
2. Keyword 2
3. Keyword 3

Group 3: [Theme Name]
1. Keyword 1
2. Keyword 2
3. Keyword 3

Focus on the most critical skills, technologies, and competencies mentioned in the key sentences. Use only plain text formatting without markdown symbols, asterisks, or dashes.";

pub const OPTIMIZE_PROMPT: &str = "Here is my work experience. Evaluate which group from {jd_keywords} best matches this experience (no need to explain the evaluation). Then rewrite the experience targeting that group as 3 concise, resume-ready bullet points. Each bullet must start with a strong action verb, include specific numbers, and reflect the chosen group's focus. Output plain text resume bullets only, as numbered points. Do not use any markdown formatting including asterisks (*), dashes (-), bold or italics. Do not include any introductory text or labels, only return the 3 numbered bullet points.

Work Experience:
{experience}

Keywords Groups:
{jd_keywords}";

pub const COVER_LETTER_SYSTEM: &str = "You are a professional resume and cover letter writer. Generate high-quality, personalized cover letters that effectively match candidates with job requirements.";

pub const COVER_LETTER_PROMPT: &str = "### Requirements
1. Structure the cover letter in 3 to 4 short paragraphs:
   - Opening: express interest in the position and introduce yourself.
   - Body (1 to 2 paragraphs): match the applicant's skills and experiences with the job's key requirements. Use measurable achievements where possible.
   - Closing: reaffirm enthusiasm, mention availability for interview.
2. Keep the tone professional, confident and concise (approx. 250 to 350 words).
3. Do not repeat the resume word for word; highlight the most relevant skills and achievements.
4. Directly address the company (use the company name).
5. Output only the main body content. Do not include a salutation (Dear...) or a closing signature (Sincerely...).

### Job Information
{jd_info}

### Personal Information
{personal_info}

### Tailored Experience (Resume Content)
{tailored_experience}

Based on the above information, generate a professional cover letter for this position.";

pub fn key_sentences_prompt(title: &str, full_job_description: &str) -> String {
    KEY_SENTENCES_PROMPT
        .replace("{title}", title)
        .replace("{full_job_description}", full_job_description)
}

pub fn keywords_prompt(title: &str, key_sentences: &str) -> String {
    KEYWORDS_PROMPT
        .replace("{title}", title)
        .replace("{key_sentences}", key_sentences)
}

pub fn optimize_prompt(jd_keywords: &str, experience: &str) -> String {
    OPTIMIZE_PROMPT
        .replace("{jd_keywords}", jd_keywords)
        .replace("{experience}", experience)
}

/// Fill a cover letter template; a blank `template` falls back to the default.
pub fn cover_letter_prompt(
    template: &str,
    personal_info: &PersonalInfo,
    jd_info: &JdInfo,
    tailored_experience: &str,
) -> String {
    let template = if template.trim().is_empty() {
        COVER_LETTER_PROMPT
    } else {
        template
    };

    let jd_text = format!(
        "Position: {}\nCompany: {}\nJob Description: {}",
        jd_info.title, jd_info.company, jd_info.description
    );

    let personal_text = [
        ("Name", &personal_info.full_name),
        ("Email", &personal_info.email),
        ("Phone", &personal_info.phone),
        ("Location", &personal_info.location),
        ("LinkedIn", &personal_info.linkedin),
        ("Website", &personal_info.website),
    ]
    .iter()
    .filter(|(_, value)| !value.trim().is_empty())
    .map(|(label, value)| format!("{}: {}", label, value))
    .collect::<Vec<_>>()
    .join("\n");

    template
        .replace("{jd_info}", &jd_text)
        .replace("{personal_info}", &personal_text)
        .replace("{tailored_experience}", tailored_experience)
}

/// Prompt for one reading analysis request.
pub fn analysis_prompt(request: &SmartAnalysisRequest) -> String {
    let context = if request.context_sentence.trim().is_empty() {
        request.selected_text.as_str()
    } else {
        request.context_sentence.as_str()
    };

    match request.mode {
        AnalysisMode::AskAi => {
            let mut prompt = format!("About the selected text:\nText: {}\n", request.selected_text);
            if context != request.selected_text {
                prompt.push_str(&format!("Sentence: {}\n", context));
            }
            prompt.push_str(&format!(
                "\nQuestion: {}\n\nAnswer in {} so a learner can follow.",
                request.user_prompt.as_deref().unwrap_or_default(),
                request.native_language
            ));
            prompt
        }
        AnalysisMode::Simple => format!(
            "You are a {lang} teacher for learners whose native language is {native}.\n\
             Explain \"{text}\" as used in: \"{context}\".\n\
             Give its meaning in {native}, the part of speech and one short example sentence in {lang}.\n\
             Keep it under 80 words. Answer in {native}, plain text.",
            lang = request.language,
            native = request.native_language,
            text = request.selected_text,
            context = context,
        ),
        AnalysisMode::Deep => format!(
            "You are a {lang} teacher for learners whose native language is {native}.\n\
             Analyze \"{text}\" in the sentence: \"{context}\".\n\
             Cover the meaning in this context, nuance and register, common collocations, \
             near synonyms with their differences, and two example sentences in {lang} with translations.\n\
             Answer in {native}, plain text.",
            lang = request.language,
            native = request.native_language,
            text = request.selected_text,
            context = context,
        ),
        AnalysisMode::Grammar => format!(
            "You are a {lang} grammar teacher for learners whose native language is {native}.\n\
             Explain the grammar of \"{text}\" in the sentence: \"{context}\".\n\
             Identify the structures used, why they apply here, and common mistakes to avoid.\n\
             Answer in {native}, plain text.",
            lang = request.language,
            native = request.native_language,
            text = request.selected_text,
            context = context,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: AnalysisMode) -> SmartAnalysisRequest {
        SmartAnalysisRequest {
            mode,
            selected_text: "flâner".to_string(),
            context_sentence: "J'aime flâner le long de la Seine.".to_string(),
            language: "French".to_string(),
            native_language: "English".to_string(),
            article_id: Some(1),
            user_prompt: Some("Is this formal?".to_string()),
        }
    }

    #[test]
    fn test_placeholders_are_filled() {
        let prompt = key_sentences_prompt("Engineer", "Build things.");
        assert!(prompt.contains("Job Title: Engineer"));
        assert!(prompt.contains("Build things."));
        assert!(!prompt.contains("{title}"));

        let prompt = optimize_prompt("Group 1: Rust", "Wrote a compiler");
        assert!(!prompt.contains("{jd_keywords}"));
        assert_eq!(prompt.matches("Group 1: Rust").count(), 2);
    }

    #[test]
    fn test_cover_letter_skips_blank_contact_fields() {
        let personal = PersonalInfo {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        let jd = JdInfo {
            title: "Analyst".to_string(),
            company: "Engines Ltd".to_string(),
            description: "Compute tables".to_string(),
        };

        let prompt = cover_letter_prompt("", &personal, &jd, "1. Did things");
        assert!(prompt.contains("Name: Ada Lovelace\nEmail: ada@example.com\n"));
        assert!(!prompt.contains("Phone:"));
        assert!(prompt.contains("Company: Engines Ltd"));

        let custom = cover_letter_prompt("{jd_info} / {tailored_experience}", &personal, &jd, "x");
        assert!(custom.ends_with("/ x"));
    }

    #[test]
    fn test_ask_ai_prompt_carries_question() {
        let prompt = analysis_prompt(&request(AnalysisMode::AskAi));
        assert!(prompt.contains("Question: Is this formal?"));
        assert!(prompt.contains("Sentence: J'aime"));

        let prompt = analysis_prompt(&request(AnalysisMode::Grammar));
        assert!(prompt.contains("grammar teacher"));
    }
}
