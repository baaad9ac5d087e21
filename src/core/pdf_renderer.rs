// src/core/pdf_renderer.rs
//! Typst document builders and the `typst compile` runner

use anyhow::Context;
use chrono::Local;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

use crate::app_log;
use crate::types::{
    CoverLetterPdfRequest, ExperienceModule, GeneratePdfRequest, PageFormat, PersonalInfo,
    ResumeV2Request,
};

pub const MAX_PDF_BYTES: usize = 2 * 1024 * 1024;

const BULLET_GLYPHS: [char; 4] = ['•', '·', '-', '*'];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Generated PDF is {0} bytes, the limit is {MAX_PDF_BYTES} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct PdfRenderer {
    typst_bin: String,
}

impl PdfRenderer {
    pub fn new(typst_bin: impl Into<String>) -> Self {
        Self {
            typst_bin: typst_bin.into(),
        }
    }

    pub async fn render_resume(&self, request: &GeneratePdfRequest) -> Result<Vec<u8>, RenderError> {
        self.compile(&resume_source(request)).await
    }

    pub async fn render_resume_v2(&self, request: &ResumeV2Request) -> Result<Vec<u8>, RenderError> {
        self.compile(&resume_v2_source(request)).await
    }

    pub async fn render_cover_letter(
        &self,
        request: &CoverLetterPdfRequest,
    ) -> Result<Vec<u8>, RenderError> {
        self.compile(&cover_letter_source(request)).await
    }

    /// Compile Typst source in a scratch directory and return the PDF bytes.
    pub async fn compile(&self, source: &str) -> Result<Vec<u8>, RenderError> {
        let workspace = tempfile::tempdir().context("Failed to create temporary workspace")?;
        let input = workspace.path().join("main.typ");
        let output = workspace.path().join("main.pdf");

        tokio::fs::write(&input, source)
            .await
            .context("Failed to write Typst source")?;

        self.run_typst(workspace.path(), &input, &output).await?;

        let pdf = tokio::fs::read(&output)
            .await
            .context("Failed to read generated PDF")?;

        if pdf.len() > MAX_PDF_BYTES {
            app_log!(warn, "Rejecting generated PDF of {} bytes", pdf.len());
            return Err(RenderError::TooLarge(pdf.len()));
        }

        app_log!(debug, "Compiled PDF of {} bytes", pdf.len());
        Ok(pdf)
    }

    async fn run_typst(&self, root: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
        let result = Command::new(&self.typst_bin)
            .arg("compile")
            .arg("--root")
            .arg(root)
            .arg(input)
            .arg(output)
            .output()
            .await
            .with_context(|| format!("Failed to execute {} command", self.typst_bin))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stdout = String::from_utf8_lossy(&result.stdout);
            anyhow::bail!(
                "Typst compilation failed: stderr={}, stdout={}",
                stderr,
                stdout
            );
        }
        Ok(())
    }
}

/// Escape text for Typst markup mode.
pub fn escape_typst(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '#' | '*' | '_' | '`' | '$' | '<' | '>' | '@' | '[' | ']' | '=' | '-' | '+'
            | '/' | '~' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' | '\r' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    let without_glyph = line.trim_start_matches(&BULLET_GLYPHS[..]).trim_start();
    if without_glyph.len() != line.len() {
        return without_glyph;
    }
    // "1. text" / "2) text"
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim_start();
        }
    }
    line
}

fn is_list_line(line: &str) -> bool {
    strip_bullet(line).len() != line.trim().len()
}

fn preamble(out: &mut String, format: PageFormat) {
    out.push_str(&format!(
        "#set page(paper: \"{}\", margin: (x: 1.6cm, y: 1.4cm))\n",
        format.typst_paper()
    ));
    out.push_str("#set text(size: 10pt)\n");
    out.push_str("#set par(justify: true)\n");
    out.push_str("#show heading.where(level: 2): it => block(below: 0.6em)[#text(size: 12pt, weight: \"bold\")[#it.body] #line(length: 100%, stroke: 0.5pt)]\n\n");
}

fn header(out: &mut String, info: &PersonalInfo) {
    out.push_str(&format!(
        "#align(center)[#text(size: 18pt, weight: \"bold\")[{}]]\n",
        escape_typst(&info.full_name)
    ));

    let contacts: Vec<String> = [
        &info.email,
        &info.phone,
        &info.location,
        &info.linkedin,
        &info.website,
    ]
    .iter()
    .map(|value| value.trim())
    .filter(|value| !value.is_empty())
    .map(escape_typst)
    .collect();

    if !contacts.is_empty() {
        out.push_str(&format!("#align(center)[{}]\n", contacts.join(" | ")));
    }
    out.push('\n');
}

fn list_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("== {}\n", escape_typst(title)));
    for item in items {
        out.push_str(&format!("- {}\n", escape_typst(strip_bullet(item))));
    }
    out.push('\n');
}

fn education_section(out: &mut String, info: &PersonalInfo) {
    let entries = info.valid_education();
    if entries.is_empty() {
        return;
    }
    out.push_str("== Education\n");
    for edu in entries {
        let mut line = format!("*{}*", escape_typst(&edu.degree));
        if !edu.institution.trim().is_empty() {
            line.push_str(&format!(", {}", escape_typst(&edu.institution)));
        }
        if let Some(gpa) = edu.gpa.as_deref().filter(|g| !g.trim().is_empty()) {
            line.push_str(&format!(" (GPA {})", escape_typst(gpa)));
        }
        if !edu.year.trim().is_empty() {
            line.push_str(&format!(" #h(1fr) {}", escape_typst(&edu.year)));
        }
        out.push_str(&line);
        out.push_str("\n\n");
    }
}

fn module_block(out: &mut String, module: &ExperienceModule) {
    out.push_str(&format!("=== {}\n", escape_typst(&module.title)));
    for item in module.items.iter().filter(|item| !item.trim().is_empty()) {
        out.push_str(&format!("- {}\n", escape_typst(strip_bullet(item))));
    }
    out.push('\n');
}

/// Resume from the stored PDF configuration plus optimized modules.
pub fn resume_source(request: &GeneratePdfRequest) -> String {
    let config = &request.config;
    let info = &config.personal_info;
    let mut out = String::new();

    preamble(&mut out, config.format);
    header(&mut out, info);

    if config.include_summary {
        list_section(&mut out, "Summary", &info.valid_summary());
    }

    let modules: Vec<&ExperienceModule> = request
        .experience_modules
        .iter()
        .filter(|module| module.has_content())
        .collect();
    if config.include_experiences && !modules.is_empty() {
        out.push_str("== Experience\n");
        for module in modules {
            module_block(&mut out, module);
        }
    }

    for custom in &info.custom_modules {
        list_section(&mut out, &custom.title, &custom.content);
    }

    if config.include_skills {
        list_section(&mut out, "Skills", &info.valid_skills());
        list_section(&mut out, "Languages", &info.valid_languages());
    }
    if config.include_education {
        education_section(&mut out, info);
    }
    if config.include_certificates {
        list_section(&mut out, "Certificates", &info.valid_certificates());
    }

    out
}

/// Resume from free-form AI experience text; list-looking lines become bullets.
pub fn resume_v2_source(request: &ResumeV2Request) -> String {
    let info = &request.personal_info;
    let mut out = String::new();

    preamble(&mut out, request.format);
    header(&mut out, info);
    list_section(&mut out, "Summary", &info.valid_summary());

    out.push_str("== Experience\n");
    for line in request
        .ai_generated_experience
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
    {
        if is_list_line(line) {
            out.push_str(&format!("- {}\n", escape_typst(strip_bullet(line))));
        } else {
            out.push_str(&format!("\n*{}*\n", escape_typst(line)));
        }
    }
    out.push('\n');

    list_section(&mut out, "Skills", &info.valid_skills());
    list_section(&mut out, "Languages", &info.valid_languages());
    education_section(&mut out, info);
    list_section(&mut out, "Certificates", &info.valid_certificates());

    out
}

/// Cover letter: header, date, salutation, body paragraphs and sign-off.
pub fn cover_letter_source(request: &CoverLetterPdfRequest) -> String {
    let info = &request.personal_info;
    let mut out = String::new();

    preamble(&mut out, request.format);
    header(&mut out, info);

    out.push_str(&format!("{}\n\n", Local::now().format("%B %-d, %Y")));
    if !request.jd_info.company.trim().is_empty() {
        out.push_str(&format!("{}\n\n", escape_typst(&request.jd_info.company)));
    }
    out.push_str("Dear Hiring Manager,\n\n");

    let mut paragraph: Vec<&str> = Vec::new();
    for line in request.cover_letter.lines().map(str::trim) {
        if line.is_empty() {
            if !paragraph.is_empty() {
                out.push_str(&format!("{}\n\n", escape_typst(&paragraph.join(" "))));
                paragraph.clear();
            }
        } else {
            paragraph.push(line);
        }
    }
    if !paragraph.is_empty() {
        out.push_str(&format!("{}\n\n", escape_typst(&paragraph.join(" "))));
    }

    out.push_str(&format!("Sincerely,\\\n{}\n", escape_typst(&info.full_name)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JdInfo, PdfConfig};

    fn info() -> PersonalInfo {
        PersonalInfo {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            summary: vec!["Analyst #1".to_string()],
            technical_skills: vec!["Rust".to_string()],
            certificates: vec!["Difference Engine".to_string()],
            ..Default::default()
        }
    }

    fn module(items: &[&str]) -> ExperienceModule {
        ExperienceModule {
            id: "e1-optimized-1".to_string(),
            title: "Engines Ltd · Analyst · 1842-1843".to_string(),
            company: "Engines Ltd".to_string(),
            items: items.iter().map(|s| s.to_string()).collect(),
            source_type: "optimized".to_string(),
            source_ids: None,
        }
    }

    #[test]
    fn test_escape_typst_specials() {
        assert_eq!(escape_typst("C# & $5 <a@b>"), "C\\# & \\$5 \\<a\\@b\\>");
        assert_eq!(escape_typst("line\nbreak"), "line break");
    }

    #[test]
    fn test_strip_bullet_forms() {
        assert_eq!(strip_bullet("• Led team"), "Led team");
        assert_eq!(strip_bullet("2. Shipped"), "Shipped");
        assert_eq!(strip_bullet("2023 revenue"), "2023 revenue");
        assert!(!is_list_line("Engines Ltd"));
    }

    #[test]
    fn test_resume_source_respects_flags() {
        let mut config = PdfConfig::new(info());
        config.include_certificates = false;
        let request = GeneratePdfRequest {
            config,
            experience_modules: vec![module(&["1. Built tables", ""]), module(&["  "])],
        };

        let source = resume_source(&request);
        assert!(source.contains("paper: \"a4\""));
        assert!(source.contains("Analyst \\#1"));
        assert!(source.contains("- Built tables"));
        assert_eq!(source.matches("=== ").count(), 1);
        assert!(!source.contains("Certificates"));
        assert!(source.contains("== Skills"));
    }

    #[test]
    fn test_cover_letter_paragraphs() {
        let request = CoverLetterPdfRequest {
            personal_info: info(),
            jd_info: JdInfo {
                title: "Analyst".to_string(),
                company: "Engines Ltd".to_string(),
                description: String::new(),
            },
            cover_letter: "First line\ncontinues.\n\nSecond paragraph.".to_string(),
            format: PageFormat::Letter,
        };

        let source = cover_letter_source(&request);
        assert!(source.contains("us-letter"));
        assert!(source.contains("First line continues.\n\nSecond paragraph.\n\n"));
        assert!(source.ends_with("Ada Lovelace\n"));
    }
}
