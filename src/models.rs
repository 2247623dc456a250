use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub type ItemId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Folder,
    Composite,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Composite => "composite",
        }
    }
}

/// A stored item as the grid sees it. Owned by the item store; the grid never
/// writes back to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub parent_id: Option<ItemId>,
    pub kind: ItemKind,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Item {
    pub fn is_folder(&self) -> bool {
        self.kind == ItemKind::Folder
    }

    pub fn content_len(&self) -> usize {
        self.content.as_deref().map(str::len).unwrap_or(0)
    }

    /// Decodes the content blocks of a composite item. Folders and items with
    /// missing or unreadable content yield no blocks.
    pub fn content_blocks(&self) -> Vec<ContentBlock> {
        let Some(raw) = self.content.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ContentBlock>>(raw) {
            Ok(blocks) => blocks,
            Err(error) => {
                tracing::debug!(item_id = self.id, error = %error, "item content is not a block list");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        path: String,
        #[serde(default)]
        width: Option<f64>,
        #[serde(default)]
        height: Option<f64>,
    },
    File {
        name: String,
        #[serde(default)]
        size: Option<u64>,
    },
    Link {
        url: String,
        #[serde(default)]
        title: Option<String>,
    },
}

impl ContentBlock {
    pub fn category(&self) -> ItemCategory {
        match self {
            Self::Text { .. } => ItemCategory::Text,
            Self::Image { .. } => ItemCategory::Images,
            Self::File { .. } => ItemCategory::Files,
            Self::Link { .. } => ItemCategory::Links,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub parent_id: Option<ItemId>,
    pub kind: ItemKind,
    pub title: String,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemCategory {
    All,
    Folders,
    Cards,
    Text,
    Images,
    Files,
    Links,
    Unrecognized(String),
}

impl ItemCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Self::All,
            "folder" | "folders" => Self::Folders,
            "card" | "cards" | "items" => Self::Cards,
            "text" => Self::Text,
            "image" | "images" => Self::Images,
            "file" | "files" => Self::Files,
            "link" | "links" => Self::Links,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Folders => "folders",
            Self::Cards => "cards",
            Self::Text => "text",
            Self::Images => "images",
            Self::Files => "files",
            Self::Links => "links",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            Self::All => true,
            Self::Folders => item.is_folder(),
            Self::Cards => !item.is_folder(),
            Self::Text | Self::Images | Self::Files | Self::Links => {
                !item.is_folder() && item.content_blocks().iter().any(|block| block.category() == *self)
            }
            Self::Unrecognized(_) => false,
        }
    }
}

impl From<String> for ItemCategory {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ItemCategory> for String {
    fn from(value: ItemCategory) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortKey {
    Name,
    CreatedAt,
    ModifiedAt,
    ContentSize,
}

impl SortKey {
    /// Unknown keys sort by name.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" | "created_at" | "createdat" | "created_time" => Self::CreatedAt,
            "modified" | "modified_at" | "modifiedat" | "modified_time" | "updated" => Self::ModifiedAt,
            "size" | "content_size" | "content_length" | "length" => Self::ContentSize,
            _ => Self::Name,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::CreatedAt => "created",
            Self::ModifiedAt => "modified",
            Self::ContentSize => "size",
        }
    }
}

impl From<String> for SortKey {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SortKey> for String {
    fn from(value: SortKey) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "desc" | "descending" => Self::Descending,
            _ => Self::Ascending,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

impl From<String> for SortOrder {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SortOrder> for String {
    fn from(value: SortOrder) -> Self {
        value.as_str().to_string()
    }
}

/// Filter and sort request. Treated as an immutable value: changing options
/// means building a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    #[serde(default = "default_category")]
    pub category: ItemCategory,
    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: Option<ItemCategory>,
    #[serde(default = "default_sort_key")]
    pub sort_by: SortKey,
    #[serde(default = "default_sort_order")]
    pub order: SortOrder,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            category: ItemCategory::All,
            priority: None,
            sort_by: SortKey::Name,
            order: SortOrder::Ascending,
        }
    }
}

impl FilterOptions {
    pub fn from_parts(category: &str, priority: &str, sort_by: &str, order: &str) -> Self {
        Self {
            category: ItemCategory::parse(category),
            priority: parse_priority(priority),
            sort_by: SortKey::parse(sort_by),
            order: SortOrder::parse(order),
        }
    }

    pub fn with_category(&self, category: ItemCategory) -> Self {
        Self {
            category,
            ..self.clone()
        }
    }

    pub fn with_sort(&self, sort_by: SortKey, order: SortOrder) -> Self {
        Self {
            sort_by,
            order,
            ..self.clone()
        }
    }
}

/// `"none"` disables prioritisation; `"folders_first"` and `"folders"` both
/// float folders to the front.
pub fn parse_priority(raw: &str) -> Option<ItemCategory> {
    let normalized = raw.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "none" {
        return None;
    }
    let category = normalized.strip_suffix("_first").unwrap_or(&normalized);
    Some(ItemCategory::parse(category))
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<Option<ItemCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_priority))
}

fn default_category() -> ItemCategory {
    ItemCategory::All
}

fn default_sort_key() -> SortKey {
    SortKey::Name
}

fn default_sort_order() -> SortOrder {
    SortOrder::Ascending
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSize {
    pub width: u32,
    pub height: u32,
}

impl CardSize {
    pub fn for_kind(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Folder => Self { width: 2, height: 1 },
            ItemKind::Composite => Self { width: 1, height: 1 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub column: usize,
    pub y_offset: f64,
}

/// Layout output: `x` is a column index, `y` a pixel offset within it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellPosition {
    pub x: usize,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewportEvent {
    Resized { width: f64, height: f64 },
    Scrolled { offset: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportState {
    pub width: f64,
    pub height: f64,
    pub scroll_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedCard {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub column: usize,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSnapshot {
    pub pass: u64,
    pub columns: usize,
    pub content_width: f64,
    pub content_height: f64,
    pub scroll_offset: f64,
    pub cards: Vec<PlacedCard>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn composite(content: &str) -> Item {
        Item {
            id: 1,
            parent_id: None,
            kind: ItemKind::Composite,
            title: "note".to_string(),
            content: Some(content.to_string()),
            created_at: Utc::now(),
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn lenient_option_parsing() {
        let options = FilterOptions::from_parts("Folders", "folders_first", "bogus", "DESC");
        assert_eq!(options.category, ItemCategory::Folders);
        assert_eq!(options.priority, Some(ItemCategory::Folders));
        assert_eq!(options.sort_by, SortKey::Name);
        assert_eq!(options.order, SortOrder::Descending);

        assert_eq!(parse_priority("none"), None);
        assert_eq!(
            ItemCategory::parse("videos"),
            ItemCategory::Unrecognized("videos".to_string())
        );
    }

    #[test]
    fn filter_options_deserialize_from_strings() {
        let options: FilterOptions = serde_json::from_value(serde_json::json!({
            "category": "images",
            "priority": "folders_first",
            "sortBy": "modified",
            "order": "asc"
        }))
        .expect("options");
        assert_eq!(options.category, ItemCategory::Images);
        assert_eq!(options.priority, Some(ItemCategory::Folders));
        assert_eq!(options.sort_by, SortKey::ModifiedAt);

        let defaults: FilterOptions = serde_json::from_str("{}").expect("defaults");
        assert_eq!(defaults, FilterOptions::default());
    }

    #[test]
    fn block_categories_match_composite_items() {
        let item = composite(r#"[{"type":"text","text":"hi"},{"type":"image","path":"a.png","height":900}]"#);
        assert!(ItemCategory::Images.matches(&item));
        assert!(ItemCategory::Text.matches(&item));
        assert!(!ItemCategory::Links.matches(&item));
        assert!(!ItemCategory::Unrecognized("x".to_string()).matches(&item));

        let broken = composite("not json");
        assert!(broken.content_blocks().is_empty());
        assert!(ItemCategory::Cards.matches(&broken));
    }
}
