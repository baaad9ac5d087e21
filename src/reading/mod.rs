// src/reading/mod.rs
//! Reading tool: selections inside an article become analysed cards

pub mod analysis;
pub mod cards;
pub mod highlight;
pub mod offsets;
pub mod sse;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::app_log;
use crate::types::{
    AnalysisMode, Article, Card, CardKind, NewCard, OffsetRange, QueryType, SmartAnalysisRequest,
};

pub use analysis::{AnalysisOutcome, AnalysisTicket};
pub use cards::CardStore;
pub use highlight::{merge_ranges, render_markup, HighlightRange, MergedSpan};
pub use offsets::{context_sentence, resolve_selection, TextNodeMap};
pub use sse::{SseDecoder, SseEvent};

/// Remote side of the reading tool.
#[async_trait]
pub trait ReadingBackend: Send + Sync {
    async fn fetch_cards(&self, article_id: i64) -> Result<Vec<Card>>;

    async fn save_card(&self, card: &NewCard) -> Result<Card>;

    /// Run an analysis, calling `on_token` for every streamed fragment.
    /// Returns `None` when `cancel` fired before the answer was complete.
    async fn analyze(
        &self,
        request: &SmartAnalysisRequest,
        cancel: &CancellationToken,
        on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
    ) -> Result<Option<String>>;
}

/// Screen position of the analysis menu.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MenuPosition {
    pub x: f64,
    pub y: f64,
}

/// The analysis menu opened for a selection.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisMenu {
    pub range: OffsetRange,
    pub selected_text: String,
    pub context_sentence: String,
    pub position: MenuPosition,
}

/// Where a selection starts in the rendered markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionAnchor {
    pub node_index: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// The selection lies inside this card.
    ScrollToCard(String),
    OpenMenu(AnalysisMenu),
    /// The selection could not be located in the article.
    Ignored,
}

/// State of the reading screen for one article.
pub struct ReadingView {
    article: Article,
    cards: CardStore,
    menu: Option<AnalysisMenu>,
    language: String,
    native_language: String,
    generation: u64,
    current: Option<(u64, CancellationToken)>,
    pending: Option<(OffsetRange, CardKind)>,
}

impl ReadingView {
    /// Open an article and fetch its cards.
    pub async fn open<B>(backend: &B, article: Article, native_language: &str) -> Result<Self>
    where
        B: ReadingBackend + ?Sized,
    {
        let language = learning_language(&article.language_pair, native_language);
        let mut cards = CardStore::new();
        cards.load(backend, article.id).await?;

        Ok(Self {
            article,
            cards,
            menu: None,
            language,
            native_language: native_language.to_string(),
            generation: 0,
            current: None,
            pending: None,
        })
    }

    /// Switch to another article; cached cards are replaced. On a failed
    /// fetch the view stays on the current article with its cards.
    pub async fn switch_article<B>(&mut self, backend: &B, article: Article) -> Result<()>
    where
        B: ReadingBackend + ?Sized,
    {
        let mut cards = CardStore::new();
        cards.load(backend, article.id).await?;

        self.cancel_current();
        self.menu = None;
        self.language = learning_language(&article.language_pair, &self.native_language);
        self.cards = cards;
        self.article = article;
        Ok(())
    }

    pub fn article(&self) -> &Article {
        &self.article
    }

    pub fn cards(&self) -> &CardStore {
        &self.cards
    }

    pub fn menu(&self) -> Option<&AnalysisMenu> {
        self.menu.as_ref()
    }

    /// Handle a text selection in the rendered article.
    pub fn on_selection(
        &mut self,
        selected: &str,
        anchor: Option<SelectionAnchor>,
        rendered_html: &str,
        position: MenuPosition,
    ) -> SelectionOutcome {
        let approx = anchor.and_then(|anchor| {
            TextNodeMap::from_html(rendered_html).flat_index(anchor.node_index, anchor.offset)
        });

        let Some(range) = resolve_selection(&self.article.content, selected, approx) else {
            app_log!(debug, "Selection {:?} not found in article", selected.trim());
            return SelectionOutcome::Ignored;
        };

        if let Some(card) = self.cards.find_containing(&range) {
            return SelectionOutcome::ScrollToCard(card.id.clone());
        }

        let menu = AnalysisMenu {
            range,
            selected_text: selected.trim().to_string(),
            context_sentence: context_sentence(&self.article.content, &range),
            position,
        };
        self.menu = Some(menu.clone());
        SelectionOutcome::OpenMenu(menu)
    }

    /// Move the menu by a drag delta.
    pub fn drag_menu(&mut self, dx: f64, dy: f64) {
        if let Some(menu) = self.menu.as_mut() {
            menu.position.x += dx;
            menu.position.y += dy;
        }
    }

    pub fn close_menu(&mut self) {
        self.menu = None;
    }

    fn cancel_current(&mut self) {
        if let Some((_, token)) = self.current.take() {
            token.cancel();
        }
        self.pending = None;
    }

    /// Start analysing the open menu's selection as a `kind` card; any older
    /// request is cancelled.
    pub fn begin_analysis(
        &mut self,
        kind: CardKind,
        mode: AnalysisMode,
        user_prompt: Option<String>,
    ) -> Result<AnalysisTicket> {
        let menu = self
            .menu
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No selection to analyse"))?;

        let request = SmartAnalysisRequest {
            mode,
            selected_text: menu.selected_text.clone(),
            context_sentence: menu.context_sentence.clone(),
            language: self.language.clone(),
            native_language: self.native_language.clone(),
            article_id: Some(self.article.id),
            user_prompt,
        };
        request.validate()?;

        self.menu = None;
        self.cancel_current();
        self.generation += 1;
        let token = CancellationToken::new();
        self.current = Some((self.generation, token.clone()));
        self.pending = Some((menu.range, kind));

        Ok(AnalysisTicket {
            generation: self.generation,
            token,
            article_id: self.article.id,
            range: menu.range,
            kind,
            request,
            buffer: String::new(),
        })
    }

    /// Persist a completed analysis and append the card. Superseded tickets
    /// save nothing.
    pub async fn finish_analysis<B>(
        &mut self,
        backend: &B,
        ticket: AnalysisTicket,
        outcome: AnalysisOutcome,
    ) -> Result<Option<Card>>
    where
        B: ReadingBackend + ?Sized,
    {
        let is_current = matches!(&self.current, Some((generation, _)) if *generation == ticket.generation);
        let analysis = match outcome {
            AnalysisOutcome::Completed(text) if is_current => text,
            _ => return Ok(None),
        };

        self.current = None;
        self.pending = None;

        let card = backend.save_card(&ticket.to_new_card(analysis)).await?;
        self.cards.append(card.clone());
        Ok(Some(card))
    }

    /// Run a full analysis of the open menu's selection.
    pub async fn analyze<B, F>(
        &mut self,
        backend: &B,
        kind: CardKind,
        mode: AnalysisMode,
        user_prompt: Option<String>,
        on_token: F,
    ) -> Result<Option<Card>>
    where
        B: ReadingBackend + ?Sized,
        F: FnMut(&str) + Send,
    {
        let mut ticket = self.begin_analysis(kind, mode, user_prompt)?;
        let outcome = match ticket.run(backend, on_token).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.cancel_current();
                return Err(e);
            }
        };
        self.finish_analysis(backend, ticket, outcome).await
    }

    /// Save the open menu's selection as a `kind` card without asking the AI.
    pub async fn mark_only<B>(&mut self, backend: &B, kind: CardKind) -> Result<Card>
    where
        B: ReadingBackend + ?Sized,
    {
        let menu = self
            .menu
            .take()
            .ok_or_else(|| anyhow::anyhow!("No selection to mark"))?;

        let new_card = NewCard {
            article_id: self.article.id,
            kind,
            selected_text: menu.selected_text,
            context_sentence: menu.context_sentence,
            start_offset: menu.range.start,
            end_offset: menu.range.end,
            analysis: String::new(),
            analysis_mode: AnalysisMode::default(),
            query_type: QueryType::ManualMark,
            user_notes: String::new(),
            ai_notes: String::new(),
        };

        let card = backend.save_card(&new_card).await?;
        app_log!(debug, "Marked {} card {} in article {}", kind.as_str(), card.id, card.article_id);
        self.cards.append(card.clone());
        Ok(card)
    }

    /// Article markup with card highlights and the pending selection.
    pub fn markup(&self) -> String {
        let mut ranges = self.cards.highlight_ranges();
        if let Some((range, kind)) = self.pending {
            ranges.push(HighlightRange::pending(range.start, range.end, kind));
        }
        render_markup(&self.article.content, &ranges)
    }
}

/// Language being learned for a pair such as `chinese-french`.
fn learning_language(language_pair: &str, native_language: &str) -> String {
    language_pair
        .split('-')
        .find(|part| !part.eq_ignore_ascii_case(native_language))
        .unwrap_or(language_pair)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// In-memory backend; `analyze` answers with the given tokens.
    struct FakeBackend {
        cards: Mutex<Vec<Card>>,
        tokens: Vec<&'static str>,
        fetches: Mutex<u32>,
        unreachable_article: Option<i64>,
    }

    impl FakeBackend {
        fn new(cards: Vec<Card>, tokens: Vec<&'static str>) -> Self {
            Self {
                cards: Mutex::new(cards),
                tokens,
                fetches: Mutex::new(0),
                unreachable_article: None,
            }
        }
    }

    #[async_trait]
    impl ReadingBackend for FakeBackend {
        async fn fetch_cards(&self, article_id: i64) -> Result<Vec<Card>> {
            *self.fetches.lock().unwrap() += 1;
            if self.unreachable_article == Some(article_id) {
                anyhow::bail!("HTTP 500 error: cards unavailable");
            }
            Ok(self
                .cards
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.article_id == article_id)
                .cloned()
                .collect())
        }

        async fn save_card(&self, card: &NewCard) -> Result<Card> {
            let saved = Card {
                id: format!("card-{}", self.cards.lock().unwrap().len() + 1),
                article_id: card.article_id,
                kind: card.kind,
                selected_text: card.selected_text.clone(),
                context_sentence: card.context_sentence.clone(),
                start_offset: card.start_offset,
                end_offset: card.end_offset,
                analysis: card.analysis.clone(),
                analysis_mode: card.analysis_mode,
                query_type: card.query_type,
                user_notes: String::new(),
                ai_notes: String::new(),
                created_at: Utc::now(),
            };
            self.cards.lock().unwrap().push(saved.clone());
            Ok(saved)
        }

        async fn analyze(
            &self,
            _request: &SmartAnalysisRequest,
            cancel: &CancellationToken,
            on_token: &mut (dyn for<'t> FnMut(&'t str) + Send),
        ) -> Result<Option<String>> {
            let mut text = String::new();
            for token in self.tokens.iter().copied() {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                on_token(token);
                text.push_str(token);
            }
            Ok(Some(text))
        }
    }

    fn article() -> Article {
        Article {
            id: 1,
            title: "Demo".to_string(),
            content: "Le chat dort. Le chien aboie.".to_string(),
            language_pair: "chinese-french".to_string(),
            created_at: Utc::now(),
        }
    }

    fn card(id: &str, start: usize, end: usize) -> Card {
        Card {
            id: id.to_string(),
            article_id: 1,
            kind: CardKind::Word,
            selected_text: String::new(),
            context_sentence: String::new(),
            start_offset: start,
            end_offset: end,
            analysis: String::new(),
            analysis_mode: AnalysisMode::Simple,
            query_type: Default::default(),
            user_notes: String::new(),
            ai_notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_selection_inside_card_scrolls() {
        let backend = FakeBackend::new(vec![card("c1", 14, 29)], vec![]);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        let outcome = view.on_selection("chien", None, "", MenuPosition::default());
        assert_eq!(outcome, SelectionOutcome::ScrollToCard("c1".to_string()));
        assert!(view.menu().is_none());

        assert_eq!(
            view.on_selection("oiseau", None, "", MenuPosition::default()),
            SelectionOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn test_analysis_streams_saves_and_appends() {
        let backend = FakeBackend::new(vec![], vec!["le ", "chat", " = cat"]);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        let outcome = view.on_selection(" chat ", None, "", MenuPosition { x: 10.0, y: 20.0 });
        let SelectionOutcome::OpenMenu(menu) = outcome else {
            panic!("expected menu");
        };
        assert_eq!(menu.range, OffsetRange { start: 3, end: 7 });
        assert_eq!(menu.context_sentence, "Le chat dort.");

        view.drag_menu(5.0, -4.0);
        assert_eq!(view.menu().unwrap().position, MenuPosition { x: 15.0, y: 16.0 });

        let mut streamed = Vec::new();
        let saved = view
            .analyze(&backend, CardKind::Word, AnalysisMode::Simple, None, |t| {
                streamed.push(t.to_string())
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(streamed, vec!["le ", "chat", " = cat"]);
        assert_eq!(saved.analysis, "le chat = cat");
        assert_eq!(saved.range(), OffsetRange { start: 3, end: 7 });
        assert_eq!(view.cards().cards().len(), 1);
        assert!(view.markup().contains("data-card-ids=\"card-1\">chat</span>"));
    }

    #[tokio::test]
    async fn test_newer_request_supersedes_older() {
        let backend = FakeBackend::new(vec![], vec!["answer"]);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        view.on_selection("chat", None, "", MenuPosition::default());
        let first = view.begin_analysis(CardKind::Word, AnalysisMode::Simple, None).unwrap();

        view.on_selection("chien", None, "", MenuPosition::default());
        let mut second = view.begin_analysis(CardKind::Word, AnalysisMode::Deep, None).unwrap();
        assert!(first.is_superseded());

        let outcome = second.run(&backend, |_| {}).await.unwrap();
        let saved = view.finish_analysis(&backend, second, outcome).await.unwrap();
        assert!(saved.is_some());

        let stale = view
            .finish_analysis(&backend, first, AnalysisOutcome::Completed("old".into()))
            .await
            .unwrap();
        assert!(stale.is_none());
        assert_eq!(view.cards().cards().len(), 1);
    }

    #[tokio::test]
    async fn test_sentence_analysis_keeps_chosen_kind() {
        let backend = FakeBackend::new(vec![], vec!["The cat sleeps."]);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        view.on_selection("Le chat dort.", None, "", MenuPosition::default());
        let saved = view
            .analyze(&backend, CardKind::Sentence, AnalysisMode::Deep, None, |_| {})
            .await
            .unwrap()
            .unwrap();

        assert_eq!(saved.kind, CardKind::Sentence);
        assert_eq!(saved.analysis_mode, AnalysisMode::Deep);
        assert_eq!(saved.query_type, QueryType::AiQuery);
        assert_eq!(saved.range(), OffsetRange { start: 0, end: 13 });
        assert_eq!(view.cards().by_kind(CardKind::Sentence).count(), 1);
    }

    #[tokio::test]
    async fn test_mark_only_saves_without_analysis() {
        let backend = FakeBackend::new(vec![], vec!["never used"]);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        assert!(view.mark_only(&backend, CardKind::Word).await.is_err());

        view.on_selection("chien", None, "", MenuPosition::default());
        let marked = view.mark_only(&backend, CardKind::Word).await.unwrap();

        assert_eq!(marked.query_type, QueryType::ManualMark);
        assert_eq!(marked.kind, CardKind::Word);
        assert_eq!(marked.analysis, "");
        assert_eq!(marked.range(), OffsetRange { start: 17, end: 22 });
        assert!(view.menu().is_none());
        assert_eq!(view.cards().cards().len(), 1);

        let again = view.on_selection("chien", None, "", MenuPosition::default());
        assert_eq!(again, SelectionOutcome::ScrollToCard(marked.id));
    }

    #[tokio::test]
    async fn test_failed_switch_keeps_current_article() {
        let mut backend = FakeBackend::new(vec![card("c1", 14, 29)], vec!["cat"]);
        backend.unreachable_article = Some(2);
        let mut view = ReadingView::open(&backend, article(), "chinese").await.unwrap();

        let other = Article {
            id: 2,
            ..article()
        };
        assert!(view.switch_article(&backend, other).await.is_err());
        assert_eq!(view.article().id, 1);
        assert_eq!(view.cards().article_id(), Some(1));

        assert_eq!(
            view.on_selection("chien", None, "", MenuPosition::default()),
            SelectionOutcome::ScrollToCard("c1".to_string())
        );

        view.on_selection("chat", None, "", MenuPosition::default());
        let saved = view
            .analyze(&backend, CardKind::Word, AnalysisMode::Simple, None, |_| {})
            .await
            .unwrap()
            .unwrap();
        assert_eq!(saved.article_id, 1);
        assert_eq!(view.cards().cards().len(), 2);
    }

    #[tokio::test]
    async fn test_cards_refetched_only_on_article_change() {
        let backend = FakeBackend::new(vec![card("c1", 0, 2)], vec![]);
        let mut store = CardStore::new();
        store.load(&backend, 1).await.unwrap();
        store.load(&backend, 1).await.unwrap();
        assert_eq!(*backend.fetches.lock().unwrap(), 1);

        store.load(&backend, 2).await.unwrap();
        assert!(store.cards().is_empty());
        assert_eq!(*backend.fetches.lock().unwrap(), 2);
        assert!(!store.append(card("c9", 0, 1)));
    }

    #[test]
    fn test_learning_language() {
        assert_eq!(learning_language("chinese-french", "chinese"), "french");
        assert_eq!(learning_language("chinese-english", "Chinese"), "english");
    }
}
