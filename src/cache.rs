use crate::models::{CardSize, Item, ItemId, ItemKind};
use crate::render::{CardInfo, RenderFactory};
use std::collections::HashMap;

/// Entries are only dropped through `remove`, `invalidate` or `clear`; callers
/// that change an item elsewhere must evict it here.
#[derive(Debug, Default)]
pub struct CardCache {
    cards: HashMap<ItemId, CardInfo>,
    sizes: HashMap<ItemKind, CardSize>,
}

impl CardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_card(&mut self, item: &Item, factory: &RenderFactory) -> CardInfo {
        if let Some(cached) = self.cards.get(&item.id) {
            return cached.clone();
        }

        let mut card = factory.create_card_info(item);
        card.size = self.get_card_size(item.kind);
        self.cards.insert(item.id, card.clone());
        card
    }

    pub fn get_card_size(&mut self, kind: ItemKind) -> CardSize {
        *self.sizes.entry(kind).or_insert_with(|| CardSize::for_kind(kind))
    }

    pub fn remove(&mut self, id: ItemId) -> Option<CardInfo> {
        self.cards.remove(&id)
    }

    pub fn invalidate(&mut self, id: ItemId) -> bool {
        self.remove(id).is_some()
    }

    pub fn clear(&mut self) {
        self.cards.clear();
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.cards.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}
