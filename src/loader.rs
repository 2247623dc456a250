use crate::errors::AppResult;
use crate::models::{FilterOptions, Item, ItemId};
use crate::sorter::sort_items;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub trait ItemStore: Send + Sync {
    /// Direct children of `parent_id`; `None` lists the root.
    fn items_by_parent(&self, parent_id: Option<ItemId>) -> AppResult<Vec<Item>>;
    fn search_items(&self, query: &str) -> AppResult<Vec<Item>>;
}

pub trait FilterOptionsSource: Send + Sync {
    fn current_options(&self) -> FilterOptions;
}

#[derive(Debug, Clone, Default)]
pub struct StaticOptions(pub FilterOptions);

impl FilterOptionsSource for StaticOptions {
    fn current_options(&self) -> FilterOptions {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    Parent(Option<ItemId>),
    Search(String),
}

#[derive(Debug)]
struct LoaderMemory {
    parent: Option<ItemId>,
    query: Option<String>,
}

/// Fetches items from the store and remembers where the last successful load
/// came from so the view can be refreshed later.
pub struct ItemLoader {
    store: Arc<dyn ItemStore>,
    memory: Mutex<LoaderMemory>,
}

impl ItemLoader {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            memory: Mutex::new(LoaderMemory {
                parent: None,
                query: None,
            }),
        }
    }

    pub fn load_by_parent(&self, parent_id: Option<ItemId>) -> AppResult<Vec<Item>> {
        let items = self.store.items_by_parent(parent_id)?;
        {
            let mut memory = self.memory();
            memory.parent = parent_id;
            memory.query = None;
        }
        tracing::info!(parent_id = ?parent_id, count = items.len(), "loaded items by parent");
        Ok(items)
    }

    pub fn load_by_parent_with_sort(&self, parent_id: Option<ItemId>, options: &FilterOptions) -> AppResult<Vec<Item>> {
        let items = self.load_by_parent(parent_id)?;
        Ok(sort_items(&items, options))
    }

    /// A blank query reloads the current parent instead of searching.
    pub fn load_by_search(&self, query: &str) -> AppResult<Vec<Item>> {
        let query = query.trim();
        if query.is_empty() {
            return self.load_by_parent(self.current_parent());
        }
        let items = self.store.search_items(query)?;
        self.memory().query = Some(query.to_string());
        tracing::info!(query = %query, count = items.len(), "loaded items by search");
        Ok(items)
    }

    pub fn load_by_search_with_sort(&self, query: &str, options: &FilterOptions) -> AppResult<Vec<Item>> {
        let items = self.load_by_search(query)?;
        Ok(sort_items(&items, options))
    }

    pub fn refresh(&self, options: Option<&FilterOptions>) -> AppResult<Vec<Item>> {
        let items = match self.current_source() {
            LoadSource::Parent(parent_id) => self.load_by_parent(parent_id)?,
            LoadSource::Search(query) => self.load_by_search(&query)?,
        };
        Ok(match options {
            Some(options) => sort_items(&items, options),
            None => items,
        })
    }

    /// Forgets the active search and returns the parent to fall back to.
    pub fn clear_search(&self) -> Option<ItemId> {
        let mut memory = self.memory();
        memory.query = None;
        memory.parent
    }

    pub fn current_parent(&self) -> Option<ItemId> {
        self.memory().parent
    }

    pub fn current_query(&self) -> Option<String> {
        self.memory().query.clone()
    }

    pub fn current_source(&self) -> LoadSource {
        let memory = self.memory();
        match &memory.query {
            Some(query) => LoadSource::Search(query.clone()),
            None => LoadSource::Parent(memory.parent),
        }
    }

    fn memory(&self) -> MutexGuard<'_, LoaderMemory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
