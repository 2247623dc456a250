use crate::config::GridSettings;
use crate::models::{CardSize, ContentBlock, Item, ItemId, ItemKind, PixelRect, Position};
use crate::sizing::{Measurable, SizeManager};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const HEADER_HEIGHT: f64 = 36.0;
const BODY_PADDING: f64 = 16.0;
const LINE_HEIGHT: f64 = 18.0;
const AVERAGE_GLYPH_WIDTH: f64 = 7.0;
const ROW_HEIGHT: f64 = 40.0;
const IMAGE_PLACEHOLDER_HEIGHT: f64 = 160.0;
const FOLDER_HEIGHT: f64 = 96.0;
const EXCERPT_CHARS: usize = 280;

/// Opens a folder when its card is activated (double click in the host UI).
pub trait FolderNavigator: Send + Sync {
    fn navigate_to_folder(&self, folder_id: ItemId) -> bool;
}

#[derive(Clone, Default)]
pub struct CardOptions {
    pub navigator: Option<Arc<dyn FolderNavigator>>,
}

impl fmt::Debug for CardOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardOptions")
            .field("navigator", &self.navigator.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockVisual {
    Text { excerpt: String, lines: usize },
    Image { path: String, reported_height: Option<f64> },
    File { name: String, size: Option<u64> },
    Link { url: String, label: String },
}

impl BlockVisual {
    fn natural_height(&self) -> f64 {
        match self {
            Self::Text { lines, .. } => *lines as f64 * LINE_HEIGHT,
            // Images report their raw pixel height, which may be far larger than
            // anything sensible for a card; the size clamp deals with that.
            Self::Image { reported_height, .. } => reported_height
                .filter(|height| *height > 0.0)
                .unwrap_or(IMAGE_PLACEHOLDER_HEIGHT),
            Self::File { .. } | Self::Link { .. } => ROW_HEIGHT,
        }
    }
}

pub enum NodeBody {
    Folder {
        navigator: Option<Arc<dyn FolderNavigator>>,
    },
    Composite {
        blocks: Vec<BlockVisual>,
    },
}

pub struct VisualNode {
    pub handle: Uuid,
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub title: String,
    pub body: NodeBody,
}

impl VisualNode {
    pub fn activate(&self) -> bool {
        match &self.body {
            NodeBody::Folder {
                navigator: Some(navigator),
            } => navigator.navigate_to_folder(self.item_id),
            NodeBody::Folder { navigator: None } => {
                tracing::debug!(item_id = self.item_id, "folder activated without a navigator");
                false
            }
            NodeBody::Composite { .. } => false,
        }
    }

    pub fn blocks(&self) -> &[BlockVisual] {
        match &self.body {
            NodeBody::Composite { blocks } => blocks,
            NodeBody::Folder { .. } => &[],
        }
    }
}

impl Measurable for VisualNode {
    fn natural_height(&self) -> f64 {
        match &self.body {
            NodeBody::Folder { .. } => FOLDER_HEIGHT,
            NodeBody::Composite { blocks } => {
                HEADER_HEIGHT + BODY_PADDING + blocks.iter().map(BlockVisual::natural_height).sum::<f64>()
            }
        }
    }
}

impl fmt::Debug for VisualNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("VisualNode");
        debug
            .field("handle", &self.handle)
            .field("item_id", &self.item_id)
            .field("kind", &self.kind)
            .field("title", &self.title);
        match &self.body {
            NodeBody::Folder { navigator } => debug.field("navigable", &navigator.is_some()),
            NodeBody::Composite { blocks } => debug.field("blocks", blocks),
        };
        debug.finish()
    }
}

#[derive(Debug, Clone)]
pub struct CardInfo {
    pub item: Item,
    pub node: Arc<VisualNode>,
    pub position: Option<Position>,
    pub size: CardSize,
    pub actual_height: f64,
    pub bounds: Option<PixelRect>,
}

impl CardInfo {
    pub fn id(&self) -> ItemId {
        self.item.id
    }
}

#[derive(Debug, Clone)]
pub struct RenderFactory {
    sizes: SizeManager,
    text_columns: usize,
    options: CardOptions,
}

impl RenderFactory {
    pub fn new(settings: GridSettings, options: CardOptions) -> Self {
        let sizes = SizeManager::new(&settings);
        let text_columns = ((sizes.card_width() - BODY_PADDING) / AVERAGE_GLYPH_WIDTH).floor().max(1.0) as usize;
        Self {
            sizes,
            text_columns,
            options,
        }
    }

    pub fn create_card(&self, item: &Item, options: &CardOptions) -> VisualNode {
        let body = match item.kind {
            ItemKind::Folder => NodeBody::Folder {
                navigator: options.navigator.clone(),
            },
            ItemKind::Composite => NodeBody::Composite {
                blocks: item
                    .content_blocks()
                    .into_iter()
                    .map(|block| self.block_visual(block))
                    .collect(),
            },
        };
        if item.kind == ItemKind::Composite && item.content_len() > 0 && body_is_empty(&body) {
            tracing::warn!(item_id = item.id, "composite item content could not be rendered");
        }

        VisualNode {
            handle: Uuid::new_v4(),
            item_id: item.id,
            kind: item.kind,
            title: item.title.clone(),
            body,
        }
    }

    pub fn create_card_info(&self, item: &Item) -> CardInfo {
        let node = self.create_card(item, &self.options);
        let natural = node.natural_height();
        let (_, height) = self.sizes.calculate_actual_pixel_size(&node);
        if natural > height {
            tracing::warn!(
                item_id = item.id,
                natural_height = natural,
                clamped_height = height,
                "card reported an anomalous height"
            );
        }

        CardInfo {
            item: item.clone(),
            node: Arc::new(node),
            position: None,
            size: CardSize::for_kind(item.kind),
            actual_height: height,
            bounds: None,
        }
    }

    fn block_visual(&self, block: ContentBlock) -> BlockVisual {
        match block {
            ContentBlock::Text { text } => {
                let lines = wrapped_line_count(&text, self.text_columns);
                let excerpt = text.chars().take(EXCERPT_CHARS).collect();
                BlockVisual::Text { excerpt, lines }
            }
            ContentBlock::Image { path, height, .. } => BlockVisual::Image {
                path,
                reported_height: height,
            },
            ContentBlock::File { name, size } => BlockVisual::File { name, size },
            ContentBlock::Link { url, title } => {
                let label = title.filter(|title| !title.trim().is_empty()).unwrap_or_else(|| url.clone());
                BlockVisual::Link { url, label }
            }
        }
    }
}

fn body_is_empty(body: &NodeBody) -> bool {
    matches!(body, NodeBody::Composite { blocks } if blocks.is_empty())
}

fn wrapped_line_count(text: &str, columns: usize) -> usize {
    let columns = columns.max(1);
    text.lines()
        .map(|line| line.chars().count().div_ceil(columns).max(1))
        .sum::<usize>()
        .max(1)
}
