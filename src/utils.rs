// src/utils.rs
use anyhow::{Context, Result};
use std::path::Path;

/// Replace every character that is not an ASCII letter or digit with `_`.
pub fn sanitize_filename_part(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Download name for a generated resume.
pub fn resume_filename(full_name: &str, company: &str, title: &str) -> String {
    format!(
        "{}_{}_{}_Resume.pdf",
        sanitize_filename_part(full_name),
        sanitize_filename_part(company),
        sanitize_filename_part(title)
    )
}

/// Download name for a generated cover letter.
pub fn cover_letter_filename(full_name: &str, company: &str, title: &str) -> String {
    format!(
        "{}_{}_{}_CoverLetter.pdf",
        sanitize_filename_part(full_name),
        sanitize_filename_part(company),
        sanitize_filename_part(title)
    )
}

/// Byte offset of the `char_index`-th character; `Some(len)` for the end position.
pub fn char_to_byte(s: &str, char_index: usize) -> Option<usize> {
    if char_index == 0 {
        return Some(0);
    }
    match s.char_indices().nth(char_index) {
        Some((byte, _)) => Some(byte),
        None if s.chars().count() == char_index => Some(s.len()),
        None => None,
    }
}

/// Character index of a byte offset that lies on a char boundary.
pub fn byte_to_char(s: &str, byte_index: usize) -> usize {
    s[..byte_index.min(s.len())].chars().count()
}

/// Pull readable text out of an AI answer that may be raw text, JSON, or JSON
/// whose `output` field holds JSON again.
pub fn unwrap_ai_response(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }
    let first: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return raw.to_string(),
    };

    match first.get("output") {
        Some(serde_json::Value::String(output)) => {
            match serde_json::from_str::<serde_json::Value>(output) {
                Ok(second) => match second.get("output") {
                    Some(serde_json::Value::String(inner)) => inner.clone(),
                    Some(inner) => inner.to_string(),
                    None => output.clone(),
                },
                Err(_) => output.clone(),
            }
        }
        Some(other) => other.to_string(),
        None => match first {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        },
    }
}

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Write bytes, creating parent directories first
pub fn write_bytes_safe(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    std::fs::write(path, bytes).with_context(|| format!("Failed to write file: {}", path.display()))
}
