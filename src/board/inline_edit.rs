// src/board/inline_edit.rs
//! Click-to-edit field state: draft, commit once on change, rollback on escape

use anyhow::Result;
use std::future::Future;
use thiserror::Error;

use crate::app_log;
use crate::types::{FieldValue, JdField};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Commits on change; Enter does nothing.
    Select,
    /// Draft must parse as a number before saving.
    Number,
    /// Multi-line; Enter inserts a newline and only blur commits.
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter,
    Escape,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("Not a number: {0}")]
    NotANumber(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Save failed: {0}")]
    SaveFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Draft equals the value; nothing was saved.
    Unchanged,
    Saved,
    Failed(EditError),
    /// Not editing, or the event does not commit for this field kind.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct InlineEditField {
    field: JdField,
    kind: FieldKind,
    value: String,
    draft: Option<String>,
    error: Option<EditError>,
    flash: bool,
}

impl InlineEditField {
    pub fn new(field: JdField, kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            field,
            kind,
            value: value.into(),
            draft: None,
            error: None,
            flash: false,
        }
    }

    pub fn field(&self) -> JdField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn error(&self) -> Option<&EditError> {
        self.error.as_ref()
    }

    /// Success marker, cleared once read.
    pub fn take_flash(&mut self) -> bool {
        std::mem::take(&mut self.flash)
    }

    pub fn activate(&mut self) {
        if self.draft.is_none() {
            self.draft = Some(self.value.clone());
            self.error = None;
        }
    }

    pub fn input(&mut self, text: impl Into<String>) {
        if let Some(draft) = self.draft.as_mut() {
            *draft = text.into();
        }
    }

    /// Discard the draft.
    pub fn cancel(&mut self) {
        self.draft = None;
        self.error = None;
    }

    pub async fn on_blur<F, Fut>(&mut self, save: F) -> CommitOutcome
    where
        F: FnOnce(FieldValue) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.commit(save).await
    }

    pub async fn on_key<F, Fut>(&mut self, key: EditKey, save: F) -> CommitOutcome
    where
        F: FnOnce(FieldValue) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match (key, self.kind) {
            (EditKey::Escape, _) => {
                self.cancel();
                CommitOutcome::Ignored
            }
            (EditKey::Enter, FieldKind::Comment) => {
                if let Some(draft) = self.draft.as_mut() {
                    draft.push('\n');
                }
                CommitOutcome::Ignored
            }
            (EditKey::Enter, FieldKind::Select) => CommitOutcome::Ignored,
            (EditKey::Enter, _) => self.commit(save).await,
        }
    }

    /// Select fields commit as soon as an option is picked.
    pub async fn on_select<F, Fut>(&mut self, option: impl Into<String>, save: F) -> CommitOutcome
    where
        F: FnOnce(FieldValue) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.kind != FieldKind::Select {
            return CommitOutcome::Ignored;
        }
        self.activate();
        self.input(option);
        self.commit(save).await
    }

    async fn commit<F, Fut>(&mut self, save: F) -> CommitOutcome
    where
        F: FnOnce(FieldValue) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let Some(draft) = self.draft.clone() else {
            return CommitOutcome::Ignored;
        };
        if draft == self.value {
            self.cancel();
            return CommitOutcome::Unchanged;
        }

        let value = match self.parse_draft(&draft) {
            Ok(value) => value,
            Err(e) => return self.fail(e),
        };

        match save(value).await {
            Ok(()) => {
                self.flash = self.field == JdField::ApplicationStage && !draft.trim().is_empty();
                self.value = draft;
                self.draft = None;
                self.error = None;
                CommitOutcome::Saved
            }
            Err(e) => {
                app_log!(warn, "Saving {} failed: {}", self.field, e);
                self.fail(EditError::SaveFailed(e.to_string()))
            }
        }
    }

    fn parse_draft(&self, draft: &str) -> Result<FieldValue, EditError> {
        if self.kind == FieldKind::Number
            && !draft.trim().is_empty()
            && draft.trim().parse::<f64>().is_err()
        {
            return Err(EditError::NotANumber(draft.to_string()));
        }
        self.field
            .parse_value(&serde_json::Value::String(draft.to_string()))
            .map_err(|e| EditError::Invalid(e.to_string()))
    }

    /// Keep the edit open with an inline error.
    fn fail(&mut self, error: EditError) -> CommitOutcome {
        self.error = Some(error.clone());
        CommitOutcome::Failed(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[tokio::test]
    async fn test_changed_draft_saves_once() {
        let calls = RefCell::new(Vec::new());
        let mut edit = InlineEditField::new(JdField::Comment, FieldKind::Text, "foo");

        edit.activate();
        edit.input("bar");
        let outcome = edit
            .on_blur(|value| {
                calls.borrow_mut().push(value);
                async { Ok(()) }
            })
            .await;

        assert_eq!(outcome, CommitOutcome::Saved);
        assert_eq!(*calls.borrow(), vec![FieldValue::Text("bar".to_string())]);
        assert_eq!(edit.value(), "bar");
        assert!(!edit.is_editing());
    }

    #[tokio::test]
    async fn test_unchanged_blur_never_saves() {
        let mut edit = InlineEditField::new(JdField::Company, FieldKind::Text, "foo");
        edit.activate();
        let outcome = edit
            .on_blur(|_| async { Err(anyhow::anyhow!("save must not run")) })
            .await;
        assert_eq!(outcome, CommitOutcome::Unchanged);
        assert!(!edit.is_editing());
    }

    #[tokio::test]
    async fn test_failure_keeps_edit_open() {
        let mut edit = InlineEditField::new(JdField::Title, FieldKind::Text, "old");
        edit.activate();
        edit.input("new");
        let outcome = edit
            .on_key(EditKey::Enter, |_| async { Err(anyhow::anyhow!("HTTP 500")) })
            .await;

        assert!(matches!(outcome, CommitOutcome::Failed(EditError::SaveFailed(_))));
        assert!(edit.is_editing());
        assert_eq!(edit.value(), "old");
        assert_eq!(edit.draft(), Some("new"));

        edit.on_key(EditKey::Escape, |_| async { Ok(()) }).await;
        assert!(!edit.is_editing());
        assert!(edit.error().is_none());
    }

    #[tokio::test]
    async fn test_number_draft_must_parse() {
        let mut edit = InlineEditField::new(JdField::MatchScore, FieldKind::Number, "3");
        edit.activate();
        edit.input("four");
        let outcome = edit
            .on_key(EditKey::Enter, |_| async { Err(anyhow::anyhow!("save must not run")) })
            .await;
        assert_eq!(
            outcome,
            CommitOutcome::Failed(EditError::NotANumber("four".to_string()))
        );

        edit.input("4.5");
        let outcome = edit
            .on_key(EditKey::Enter, |value| async move {
                assert_eq!(value, FieldValue::Number(4.5));
                Ok(())
            })
            .await;
        assert_eq!(outcome, CommitOutcome::Saved);
    }

    #[tokio::test]
    async fn test_comment_enter_inserts_newline() {
        let mut edit = InlineEditField::new(JdField::Comment, FieldKind::Comment, "");
        edit.activate();
        edit.input("line one");
        let outcome = edit
            .on_key(EditKey::Enter, |_| async { Err(anyhow::anyhow!("save must not run")) })
            .await;
        assert_eq!(outcome, CommitOutcome::Ignored);
        assert_eq!(edit.draft(), Some("line one\n"));
    }

    #[tokio::test]
    async fn test_stage_select_flashes_on_success() {
        let mut edit = InlineEditField::new(JdField::ApplicationStage, FieldKind::Select, "");
        assert_eq!(
            edit.on_key(EditKey::Enter, |_| async { Ok(()) }).await,
            CommitOutcome::Ignored
        );

        let outcome = edit.on_select("Applied", |_| async { Ok(()) }).await;
        assert_eq!(outcome, CommitOutcome::Saved);
        assert!(edit.take_flash());
        assert!(!edit.take_flash());
    }
}
