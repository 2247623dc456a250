use crate::errors::{AppError, AppResult};
use crate::loader::ItemStore;
use crate::models::{Item, ItemId, ItemKind, NewItem};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const ITEM_COLUMNS: &str = "id, parent_id, kind, title, content, created_at, modified_at";

#[derive(Debug)]
pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

impl SqliteItemStore {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn insert_item(&self, payload: NewItem) -> AppResult<Item> {
        let now = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO items (parent_id, kind, title, content, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                payload.parent_id,
                payload.kind.as_str(),
                payload.title,
                payload.content,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Item {
            id: conn.last_insert_rowid(),
            parent_id: payload.parent_id,
            kind: payload.kind,
            title: payload.title,
            content: payload.content,
            created_at: now,
            modified_at: now,
        })
    }

    pub fn get_item(&self, id: ItemId) -> AppResult<Option<Item>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                [id],
                parse_item_row,
            )
            .optional()?;
        Ok(item)
    }

    pub fn update_item_content(&self, id: ItemId, title: &str, content: Option<&str>) -> AppResult<Option<Item>> {
        {
            let conn = self.conn()?;
            let changed = conn.execute(
                "UPDATE items SET title = ?1, content = ?2, modified_at = ?3 WHERE id = ?4",
                params![title, content, Utc::now().to_rfc3339(), id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
        }
        self.get_item(id)
    }

    pub fn delete_item(&self, id: ItemId) -> AppResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }
}

impl ItemStore for SqliteItemStore {
    fn items_by_parent(&self, parent_id: Option<ItemId>) -> AppResult<Vec<Item>> {
        let conn = self.conn()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE parent_id IS ?1 ORDER BY id"
        ))?;
        let rows = statement.query_map([parent_id], parse_item_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn search_items(&self, query: &str) -> AppResult<Vec<Item>> {
        let pattern = format!("%{}%", escape_like(&query.trim().to_lowercase()));
        let conn = self.conn()?;
        let mut statement = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items
             WHERE lower(title) LIKE ?1 ESCAPE '\\' OR lower(coalesce(content, '')) LIKE ?1 ESCAPE '\\'
             ORDER BY id"
        ))?;
        let rows = statement.query_map([pattern], parse_item_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

fn parse_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        kind: parse_kind(&row.get::<_, String>(2)?)?,
        title: row.get(3)?,
        content: row.get(4)?,
        created_at: parse_time(&row.get::<_, String>(5)?)?,
        modified_at: parse_time(&row.get::<_, String>(6)?)?,
    })
}

fn parse_kind(raw: &str) -> rusqlite::Result<ItemKind> {
    match raw {
        "folder" => Ok(ItemKind::Folder),
        "composite" => Ok(ItemKind::Composite),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Unknown item kind '{}'", other),
            )),
        )),
    }
}

fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::SqliteItemStore;
    use crate::loader::ItemStore;
    use crate::models::{ItemKind, NewItem};

    fn store() -> (tempfile::TempDir, SqliteItemStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteItemStore::new(&dir.path().join("data").join("items.db")).expect("store");
        (dir, store)
    }

    fn new_item(parent_id: Option<i64>, kind: ItemKind, title: &str, content: Option<&str>) -> NewItem {
        NewItem {
            parent_id,
            kind,
            title: title.to_string(),
            content: content.map(ToString::to_string),
        }
    }

    #[test]
    fn lists_children_by_parent() {
        let (_dir, store) = store();
        let folder = store
            .insert_item(new_item(None, ItemKind::Folder, "Projects", None))
            .expect("folder");
        store
            .insert_item(new_item(Some(folder.id), ItemKind::Composite, "Plan", Some("[]")))
            .expect("child");
        store
            .insert_item(new_item(None, ItemKind::Composite, "Loose note", None))
            .expect("root note");

        let root = store.items_by_parent(None).expect("root");
        assert_eq!(root.len(), 2);
        assert_eq!(root[0].kind, ItemKind::Folder);

        let children = store.items_by_parent(Some(folder.id)).expect("children");
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].title, "Plan");
        assert_eq!(children[0].parent_id, Some(folder.id));
    }

    #[test]
    fn search_matches_title_and_content_case_insensitively() {
        let (_dir, store) = store();
        store
            .insert_item(new_item(None, ItemKind::Composite, "Grocery LIST", None))
            .expect("first");
        store
            .insert_item(new_item(
                None,
                ItemKind::Composite,
                "Weekend",
                Some(r#"[{"type":"text","text":"buy a new list of 100% cotton"}]"#),
            ))
            .expect("second");
        store
            .insert_item(new_item(None, ItemKind::Composite, "Unrelated", None))
            .expect("third");

        let hits = store.search_items("list").expect("search");
        assert_eq!(hits.len(), 2);
        let percent = store.search_items("100%").expect("escaped search");
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].title, "Weekend");
    }

    #[test]
    fn update_and_delete_round_trip() {
        let (_dir, store) = store();
        let created = store
            .insert_item(new_item(None, ItemKind::Composite, "Draft", None))
            .expect("insert");

        let updated = store
            .update_item_content(created.id, "Final", Some(r#"[{"type":"text","text":"done"}]"#))
            .expect("update")
            .expect("item exists");
        assert_eq!(updated.title, "Final");
        assert!(updated.modified_at >= created.modified_at);
        assert!(store.update_item_content(999, "x", None).expect("missing").is_none());

        assert!(store.delete_item(created.id).expect("delete"));
        assert!(store.get_item(created.id).expect("get").is_none());
        assert!(!store.delete_item(created.id).expect("second delete"));
    }
}
