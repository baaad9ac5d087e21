// src/reading/analysis.rs
//! One analysis request: its cancellation token and the streamed text buffer

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use crate::app_log;
use crate::reading::ReadingBackend;
use crate::types::{AnalysisMode, CardKind, NewCard, OffsetRange, QueryType, SmartAnalysisRequest};

/// An in-flight analysis of one selection.
///
/// Issued by [`crate::reading::ReadingView::begin_analysis`]; starting a newer
/// one cancels this ticket's token.
#[derive(Debug)]
pub struct AnalysisTicket {
    pub(crate) generation: u64,
    pub token: CancellationToken,
    pub article_id: i64,
    pub range: OffsetRange,
    pub kind: CardKind,
    pub request: SmartAnalysisRequest,
    /// Text received so far.
    pub buffer: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(String),
    Superseded,
}

impl AnalysisTicket {
    pub fn mode(&self) -> AnalysisMode {
        self.request.mode
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Run the request, appending streamed tokens to the buffer and echoing
    /// them to `on_token`.
    pub async fn run<B, F>(&mut self, backend: &B, mut on_token: F) -> Result<AnalysisOutcome>
    where
        B: ReadingBackend + ?Sized,
        F: FnMut(&str) + Send,
    {
        let buffer = &mut self.buffer;
        let mut sink = |token: &str| {
            buffer.push_str(token);
            on_token(token);
        };

        let result = backend
            .analyze(&self.request, &self.token, &mut sink)
            .await?;

        match result {
            Some(text) if !self.token.is_cancelled() => {
                // JSON answers arrive whole; streamed ones were accumulated already.
                if self.buffer.is_empty() {
                    self.buffer = text;
                }
                Ok(AnalysisOutcome::Completed(self.buffer.clone()))
            }
            _ => {
                app_log!(
                    debug,
                    "Analysis of [{}..{}) superseded",
                    self.range.start,
                    self.range.end
                );
                Ok(AnalysisOutcome::Superseded)
            }
        }
    }

    /// Card payload for a completed analysis.
    pub fn to_new_card(&self, analysis: String) -> NewCard {
        NewCard {
            article_id: self.article_id,
            kind: self.kind,
            selected_text: self.request.selected_text.clone(),
            context_sentence: self.request.context_sentence.clone(),
            start_offset: self.range.start,
            end_offset: self.range.end,
            analysis,
            analysis_mode: self.request.mode,
            query_type: QueryType::AiQuery,
            user_notes: String::new(),
            ai_notes: String::new(),
        }
    }
}
