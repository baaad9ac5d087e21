// src/reading/cards.rs
//! Per-article in-memory cache of fetched cards

use anyhow::Result;

use crate::app_log;
use crate::reading::highlight::HighlightRange;
use crate::reading::ReadingBackend;
use crate::types::{Card, CardKind, OffsetRange};

#[derive(Debug, Default)]
pub struct CardStore {
    article_id: Option<i64>,
    cards: Vec<Card>,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn article_id(&self) -> Option<i64> {
        self.article_id
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn by_kind(&self, kind: CardKind) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(move |card| card.kind == kind)
    }

    /// Cards of `article_id`, fetched only when the article changed. A failed
    /// fetch leaves the cached article untouched.
    pub async fn load<B>(&mut self, backend: &B, article_id: i64) -> Result<&[Card]>
    where
        B: ReadingBackend + ?Sized,
    {
        if self.article_id != Some(article_id) {
            let cards = backend.fetch_cards(article_id).await?;
            app_log!(debug, "Loaded {} cards for article {}", cards.len(), article_id);
            self.cards = cards;
            self.article_id = Some(article_id);
        }
        Ok(&self.cards)
    }

    /// Drop cached cards so the next `load` refetches.
    pub fn invalidate(&mut self) {
        self.article_id = None;
        self.cards.clear();
    }

    /// Append a freshly saved card; cards of another article are ignored.
    pub fn append(&mut self, card: Card) -> bool {
        if self.article_id != Some(card.article_id) {
            app_log!(
                warn,
                "Ignoring card {} for article {}, store holds {:?}",
                card.id,
                card.article_id,
                self.article_id
            );
            return false;
        }
        self.cards.push(card);
        true
    }

    pub fn remove(&mut self, card_id: &str) -> Option<Card> {
        let index = self.cards.iter().position(|card| card.id == card_id)?;
        Some(self.cards.remove(index))
    }

    /// First card whose range fully contains `range`.
    pub fn find_containing(&self, range: &OffsetRange) -> Option<&Card> {
        self.cards.iter().find(|card| card.range().contains(range))
    }

    pub fn highlight_ranges(&self) -> Vec<HighlightRange> {
        self.cards.iter().map(HighlightRange::from_card).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisMode, QueryType};
    use chrono::Utc;

    fn card(id: &str, article_id: i64, start: usize, end: usize) -> Card {
        Card {
            id: id.to_string(),
            article_id,
            kind: CardKind::Word,
            selected_text: String::new(),
            context_sentence: String::new(),
            start_offset: start,
            end_offset: end,
            analysis: String::new(),
            analysis_mode: AnalysisMode::Simple,
            query_type: QueryType::AiQuery,
            user_notes: String::new(),
            ai_notes: String::new(),
            created_at: Utc::now(),
        }
    }

    fn store_for(article_id: i64, cards: Vec<Card>) -> CardStore {
        CardStore {
            article_id: Some(article_id),
            cards,
        }
    }

    #[test]
    fn test_append_rejects_other_articles() {
        let mut store = store_for(1, vec![]);
        assert!(store.append(card("a", 1, 0, 3)));
        assert!(!store.append(card("b", 2, 0, 3)));
        assert_eq!(store.cards().len(), 1);

        store.invalidate();
        assert_eq!(store.article_id(), None);
        assert!(!store.append(card("c", 1, 0, 3)));
    }

    #[test]
    fn test_find_containing_needs_full_cover() {
        let store = store_for(1, vec![card("a", 1, 5, 10), card("b", 1, 8, 15)]);
        let inside = OffsetRange { start: 9, end: 12 };
        assert_eq!(store.find_containing(&inside).map(|c| c.id.as_str()), Some("b"));

        let straddling = OffsetRange { start: 4, end: 9 };
        assert!(store.find_containing(&straddling).is_none());
    }

    #[test]
    fn test_remove_by_id() {
        let mut store = store_for(1, vec![card("a", 1, 0, 2), card("b", 1, 3, 4)]);
        assert_eq!(store.remove("a").map(|c| c.id), Some("a".to_string()));
        assert!(store.remove("a").is_none());
        assert_eq!(store.by_kind(CardKind::Word).count(), 1);
    }
}
