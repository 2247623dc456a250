use crate::cache::CardCache;
use crate::config::GridSettings;
use crate::errors::AppResult;
use crate::layout::LayoutEngine;
use crate::loader::{FilterOptionsSource, ItemLoader, ItemStore};
use crate::models::{
    FilterOptions, GridSnapshot, Item, ItemId, PlacedCard, Position, ViewportEvent, ViewportState,
};
use crate::render::{CardInfo, CardOptions, FolderNavigator, RenderFactory};
use crate::scheduler::{Debouncer, Throttler};
use crate::sizing::SizeManager;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct GridState {
    cards: Vec<CardInfo>,
    cache: CardCache,
    layout: LayoutEngine,
    viewport: ViewportState,
    columns: usize,
    content_width: f64,
    content_height: f64,
    initial_layout_done: bool,
    pass: u64,
}

#[derive(Clone)]
struct LayoutPass {
    state: Arc<Mutex<GridState>>,
    sizes: SizeManager,
    preload_buffer: f64,
    publisher: Arc<watch::Sender<GridSnapshot>>,
}

impl LayoutPass {
    fn run(&self) {
        let mut state = lock(&self.state);
        let columns = self.sizes.calculate_column_count(state.viewport.width);

        let GridState { cards, layout, .. } = &mut *state;
        let positions = layout.calculate_positions(cards, columns);
        for (card, position) in cards.iter_mut().zip(positions) {
            card.position = Some(Position {
                column: position.x,
                y_offset: position.y,
            });
            card.bounds = Some(self.sizes.card_rect(position.x, position.y, card.actual_height));
        }
        let (content_width, content_height) = self.sizes.calculate_max_dimensions(cards);

        state.columns = columns;
        state.content_width = content_width;
        state.content_height = content_height;
        state.pass += 1;

        tracing::debug!(
            pass = state.pass,
            columns,
            cards = state.cards.len(),
            content_height,
            "grid layout pass"
        );
        self.publisher.send_replace(snapshot_of(&state, self.preload_buffer));
    }
}

/// Mutations return immediately; layout runs later through
/// `debounce(throttle(layout))`, except for the first request after
/// construction which lays out synchronously. Without a tokio runtime every
/// pass runs synchronously.
#[derive(Clone)]
pub struct GridManager {
    state: Arc<Mutex<GridState>>,
    loader: Arc<ItemLoader>,
    factory: Arc<RenderFactory>,
    options_source: Arc<dyn FilterOptionsSource>,
    sort_override: Arc<RwLock<Option<FilterOptions>>>,
    debouncer: Debouncer,
    throttler: Throttler,
    pass: LayoutPass,
}

impl GridManager {
    pub fn new(
        store: Arc<dyn ItemStore>,
        options_source: Arc<dyn FilterOptionsSource>,
        navigator: Option<Arc<dyn FolderNavigator>>,
        settings: GridSettings,
    ) -> Self {
        let settings = settings.sanitized();
        let sizes = SizeManager::new(&settings);
        let state = Arc::new(Mutex::new(GridState {
            cards: Vec::new(),
            cache: CardCache::new(),
            layout: LayoutEngine::new(&settings),
            viewport: ViewportState::default(),
            columns: sizes.default_columns(),
            content_width: 0.0,
            content_height: 0.0,
            initial_layout_done: false,
            pass: 0,
        }));
        let (publisher, _) = watch::channel(GridSnapshot::default());

        Self {
            pass: LayoutPass {
                state: state.clone(),
                sizes,
                preload_buffer: settings.preload_buffer,
                publisher: Arc::new(publisher),
            },
            state,
            loader: Arc::new(ItemLoader::new(store)),
            factory: Arc::new(RenderFactory::new(settings, CardOptions { navigator })),
            options_source,
            sort_override: Arc::new(RwLock::new(None)),
            debouncer: Debouncer::new(settings.debounce_delay()),
            throttler: Throttler::new(settings.throttle_interval()),
        }
    }

    pub fn add_item(&self, item: Item) {
        {
            let mut state = lock(&self.state);
            if state.cards.iter().any(|card| card.id() == item.id) {
                tracing::debug!(item_id = item.id, "item already on the grid, ignoring add");
                return;
            }
            let card = state.cache.get_or_create_card(&item, &self.factory);
            state.cards.push(card);
        }
        self.request_layout();
    }

    pub fn remove_item(&self, id: ItemId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            state.cache.remove(id);
            let before = state.cards.len();
            state.cards.retain(|card| card.id() != id);
            state.cards.len() != before
        };
        if removed {
            self.request_layout();
        }
        removed
    }

    /// Rebuilds the card of an item whose content changed elsewhere. Returns
    /// false when the item is not on the grid.
    pub fn invalidate_item(&self, item: Item) -> bool {
        let replaced = {
            let mut state = lock(&self.state);
            state.cache.invalidate(item.id);
            let GridState { cards, cache, .. } = &mut *state;
            match cards.iter_mut().find(|card| card.id() == item.id) {
                Some(card) => {
                    *card = cache.get_or_create_card(&item, &self.factory);
                    true
                }
                None => false,
            }
        };
        if replaced {
            self.request_layout();
        }
        replaced
    }

    /// Replaces the whole card list. Repeated ids keep their first occurrence.
    pub fn load_items(&self, items: Vec<Item>) {
        {
            let mut state = lock(&self.state);
            let GridState { cards, cache, .. } = &mut *state;
            cache.clear();
            let mut seen = HashSet::with_capacity(items.len());
            *cards = items
                .iter()
                .filter(|item| seen.insert(item.id))
                .map(|item| cache.get_or_create_card(item, &self.factory))
                .collect();
            tracing::info!(cards = cards.len(), "grid card list replaced");
        }
        self.request_layout();
    }

    pub fn load_items_by_parent(&self, parent_id: Option<ItemId>) -> AppResult<()> {
        let items = self.loader.load_by_parent(parent_id)?;
        self.load_items(items);
        Ok(())
    }

    pub fn load_items_by_parent_with_sort(&self, parent_id: Option<ItemId>) -> AppResult<()> {
        let items = self.loader.load_by_parent_with_sort(parent_id, &self.sort_options())?;
        self.load_items(items);
        Ok(())
    }

    pub fn load_items_by_search(&self, query: &str) -> AppResult<()> {
        let items = self.loader.load_by_search(query)?;
        self.load_items(items);
        Ok(())
    }

    pub fn load_items_by_search_with_sort(&self, query: &str) -> AppResult<()> {
        let items = self.loader.load_by_search_with_sort(query, &self.sort_options())?;
        self.load_items(items);
        Ok(())
    }

    pub fn refresh(&self) -> AppResult<()> {
        let items = self.loader.refresh(Some(&self.sort_options()))?;
        self.load_items(items);
        Ok(())
    }

    pub fn clear_search(&self) -> AppResult<()> {
        let parent_id = self.loader.clear_search();
        self.load_items_by_parent_with_sort(parent_id)
    }

    /// Empties the card list, cache and container in one step and publishes
    /// the empty view right away.
    pub fn clear(&self) {
        {
            let mut state = lock(&self.state);
            state.cards.clear();
            state.cache.clear();
            state.content_width = 0.0;
            state.content_height = 0.0;
            state.pass += 1;
            self.pass
                .publisher
                .send_replace(snapshot_of(&state, self.pass.preload_buffer));
        }
        self.request_layout();
    }

    pub fn set_sort_options(&self, options: FilterOptions) {
        *self
            .sort_override
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(options);
    }

    pub fn sort_options(&self) -> FilterOptions {
        let current = self
            .sort_override
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        current.unwrap_or_else(|| self.options_source.current_options())
    }

    pub fn update_layout(&self) {
        self.request_layout();
    }

    pub fn notify_viewport(&self, event: ViewportEvent) {
        {
            let mut state = lock(&self.state);
            match event {
                ViewportEvent::Resized { width, height } => {
                    state.viewport.width = width;
                    state.viewport.height = height;
                }
                ViewportEvent::Scrolled { offset } => {
                    state.viewport.scroll_offset = offset.max(0.0);
                }
            }
        }
        self.request_layout();
    }

    pub fn attach_viewport(&self, mut events: mpsc::Receiver<ViewportEvent>) -> JoinHandle<()> {
        let grid = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                grid.notify_viewport(event);
            }
            tracing::debug!("viewport event stream closed");
        })
    }

    pub fn activate_card(&self, id: ItemId) -> bool {
        let node = {
            let state = lock(&self.state);
            state.cards.iter().find(|card| card.id() == id).map(|card| card.node.clone())
        };
        // The navigator may call back into the grid, so the lock is released first.
        match node {
            Some(node) => node.activate(),
            None => false,
        }
    }

    pub fn current_parent(&self) -> Option<ItemId> {
        self.loader.current_parent()
    }

    pub fn current_query(&self) -> Option<String> {
        self.loader.current_query()
    }

    pub fn card_count(&self) -> usize {
        lock(&self.state).cards.len()
    }

    pub fn card_ids(&self) -> Vec<ItemId> {
        lock(&self.state).cards.iter().map(CardInfo::id).collect()
    }

    pub fn viewport(&self) -> ViewportState {
        lock(&self.state).viewport
    }

    pub fn snapshot(&self) -> GridSnapshot {
        snapshot_of(&lock(&self.state), self.pass.preload_buffer)
    }

    pub fn subscribe(&self) -> watch::Receiver<GridSnapshot> {
        self.pass.publisher.subscribe()
    }

    fn request_layout(&self) {
        let first = {
            let mut state = lock(&self.state);
            !std::mem::replace(&mut state.initial_layout_done, true)
        };
        if first {
            self.pass.run();
            return;
        }
        if Handle::try_current().is_err() {
            tracing::warn!("no tokio runtime for deferred layout, running the pass inline");
            self.pass.run();
            return;
        }

        let pass = self.pass.clone();
        let throttler = self.throttler.clone();
        self.debouncer.call(move || {
            throttler.call(move || pass.run());
        });
    }
}

fn snapshot_of(state: &GridState, preload_buffer: f64) -> GridSnapshot {
    let viewport = state.viewport;
    let window_top = viewport.scroll_offset - preload_buffer;
    let window_bottom = viewport.scroll_offset + viewport.height + preload_buffer;

    let cards = state
        .cards
        .iter()
        .filter_map(|card| {
            let position = card.position?;
            let bounds = card.bounds?;
            let visible = viewport.height <= 0.0 || (bounds.bottom() >= window_top && bounds.y <= window_bottom);
            Some(PlacedCard {
                item_id: card.id(),
                kind: card.item.kind,
                column: position.column,
                x: bounds.x,
                y: bounds.y,
                width: bounds.width,
                height: bounds.height,
                visible,
            })
        })
        .collect();

    GridSnapshot {
        pass: state.pass,
        columns: state.columns,
        content_width: state.content_width,
        content_height: state.content_height,
        scroll_offset: viewport.scroll_offset,
        cards,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
