// src/local_store.rs
//! File-backed key/value store holding client-local JSON values

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::app_log;
use crate::types::{PdfConfig, PersonalInfo};
use crate::utils::write_bytes_safe;

pub const PERSONAL_INFO_KEY: &str = "jd2cv-v2-personal-info";
pub const STARRED_EXPERIENCES_KEY: &str = "starred-experiences";
pub const LAST_VIEWED_ARTICLE_KEY: &str = "last-viewed-article";
pub const PDF_CONFIG_KEY: &str = "jd2cv-pdf-config";

pub fn pdf_config_key(scope: &str) -> String {
    format!("{}-{}", PDF_CONFIG_KEY, scope)
}

pub fn ai_content_key(jd_id: &str) -> String {
    format!("jd2cv-v2-ai-content-{}", jd_id)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastViewedArticle {
    pub id: i64,
    pub title: String,
    pub content: String,
}

/// String keys to string values, each value a JSON document.
///
/// Every mutation rewrites the whole file. Last write wins.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    entries: IndexMap<String, String>,
}

impl LocalStore {
    /// Open the store, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read local store: {}", path.display()))?;
            if raw.trim().is_empty() {
                IndexMap::new()
            } else {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt local store: {}", path.display()))?
            }
        } else {
            IndexMap::new()
        };

        app_log!(debug, "Opened local store {} ({} keys)", path.display(), entries.len());
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.entries.insert(key.into(), value.into());
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<String>> {
        let removed = self.entries.shift_remove(key);
        if removed.is_some() {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Parsed value; a value that fails to parse reads as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key)?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                app_log!(warn, "Ignoring unreadable value under {}: {}", key, e);
                None
            }
        }
    }

    pub fn set_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).context("Failed to serialize local value")?;
        self.set(key, raw)
    }

    fn flush(&self) -> Result<()> {
        let raw =
            serde_json::to_vec_pretty(&self.entries).context("Failed to serialize local store")?;
        write_bytes_safe(&self.path, &raw)
    }

    // ===== Typed helpers =====

    pub fn personal_info(&self) -> Option<PersonalInfo> {
        self.get_json(PERSONAL_INFO_KEY)
    }

    pub fn set_personal_info(&mut self, info: &PersonalInfo) -> Result<()> {
        self.set_json(PERSONAL_INFO_KEY, info)
    }

    /// Ids whose starred flag is `true`.
    pub fn starred_ids(&self) -> HashSet<String> {
        self.get_json::<IndexMap<String, bool>>(STARRED_EXPERIENCES_KEY)
            .map(|flags| {
                flags
                    .into_iter()
                    .filter(|(_, starred)| *starred)
                    .map(|(id, _)| id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_starred(&mut self, experience_id: &str, starred: bool) -> Result<()> {
        let mut flags: IndexMap<String, bool> =
            self.get_json(STARRED_EXPERIENCES_KEY).unwrap_or_default();
        flags.insert(experience_id.to_string(), starred);
        self.set_json(STARRED_EXPERIENCES_KEY, &flags)
    }

    /// Scoped configuration when present, else the shared one.
    pub fn pdf_config(&self, scope: Option<&str>) -> Option<PdfConfig> {
        scope
            .and_then(|scope| self.get_json(&pdf_config_key(scope)))
            .or_else(|| self.get_json(PDF_CONFIG_KEY))
    }

    pub fn set_pdf_config(&mut self, scope: Option<&str>, config: &PdfConfig) -> Result<()> {
        match scope {
            Some(scope) => self.set_json(pdf_config_key(scope), config),
            None => self.set_json(PDF_CONFIG_KEY, config),
        }
    }

    pub fn last_viewed_article(&self) -> Option<LastViewedArticle> {
        self.get_json(LAST_VIEWED_ARTICLE_KEY)
    }

    pub fn set_last_viewed_article(&mut self, article: &LastViewedArticle) -> Result<()> {
        self.set_json(LAST_VIEWED_ARTICLE_KEY, article)
    }

    pub fn ai_content(&self, jd_id: &str) -> Option<String> {
        self.get_json(&ai_content_key(jd_id))
    }

    pub fn set_ai_content(&mut self, jd_id: &str, content: &str) -> Result<()> {
        self.set_json(ai_content_key(jd_id), &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = LocalStore::open(&path).unwrap();
        let info = PersonalInfo {
            full_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        store.set_personal_info(&info).unwrap();
        store.set_starred("e1", true).unwrap();
        store.set_starred("e2", false).unwrap();
        store.set_ai_content("jd-9", "1. Built engines").unwrap();

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.personal_info(), Some(info));
        assert_eq!(
            reopened.starred_ids(),
            HashSet::from(["e1".to_string()])
        );
        assert_eq!(reopened.ai_content("jd-9").as_deref(), Some("1. Built engines"));
    }

    #[test]
    fn test_browser_shaped_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"starred-experiences": "{\"a\":true,\"b\":true}", "jd2cv-pdf-config": "not json"}"#,
        )
        .unwrap();

        let mut store = LocalStore::open(&path).unwrap();
        assert_eq!(store.starred_ids().len(), 2);
        assert_eq!(store.pdf_config(None), None);

        let config = PdfConfig::new(PersonalInfo::default());
        store.set_pdf_config(Some("batch"), &config).unwrap();
        assert_eq!(store.pdf_config(Some("batch")), Some(config));
        assert_eq!(store.pdf_config(Some("other")), None);
        assert_eq!(store.remove("jd2cv-pdf-config").unwrap().as_deref(), Some("not json"));
    }
}
