//! Inventory management - items keyed by their unique code

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::database::Database;
use super::{contains_ci, finish_csv, is_unique_violation, StoreError};
use crate::validation::{parse_price, parse_quantity, Field, FormInput, ValidationError, Validator};

const ENTITY: &str = "Item";

/// Categories offered by the item form; any other text is accepted too
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Elektronik",
    "Peralatan",
    "Bahan",
    "Alat Kantor",
    "Furniture",
    "Lainnya",
];

/// Export header, in column order
pub const CSV_HEADER: [&str; 6] = ["Kode", "Nama", "Jumlah", "Harga", "Kategori", "Catatan"];

const SELECT_ITEMS: &str = "
    SELECT code, name, quantity, price, category, notes, created_at, updated_at
    FROM items";

/// Stored inventory item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub code: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub category: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item fields supplied by the caller; also the full replacement on update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewItem {
    /// Build an item from raw form fields (`code`, `name`, `quantity`,
    /// `price`, `category`, `notes`)
    pub fn from_form(form: &FormInput, validator: &Validator) -> Result<Self, ValidationError> {
        validator.check_item_form(form)?;
        let quantity = parse_quantity(form.get("quantity"))
            .ok_or_else(|| ValidationError::new(Field::ItemQuantity))?;
        let price = parse_price(form.get("price"))
            .ok_or_else(|| ValidationError::new(Field::ItemPrice))?;

        Ok(Self {
            code: form.trimmed("code"),
            name: form.trimmed("name"),
            quantity,
            price,
            category: form.trimmed("category"),
            notes: non_empty(form.trimmed("notes")),
        })
    }

    /// Rules enforced at the store boundary
    pub fn validate(&self, validator: &Validator) -> Result<(), ValidationError> {
        validator.validate(Field::ItemCode, &self.code)?;
        validator.validate(Field::ItemName, &self.name)?;
        if self.quantity < 0 {
            return Err(ValidationError::new(Field::ItemQuantity));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::new(Field::ItemPrice));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.code = self.code.trim().to_string();
        self.name = self.name.trim().to_string();
        self.category = self.category.trim().to_string();
        self.notes = self.notes.and_then(|n| non_empty(n.trim().to_string()));
        self
    }
}

/// Field a search term is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemSearchScope {
    #[default]
    #[serde(rename = "Semua")]
    All,
    #[serde(rename = "Kode")]
    Code,
    #[serde(rename = "Nama")]
    Name,
    #[serde(rename = "Kategori")]
    Category,
    #[serde(rename = "Catatan")]
    Notes,
}

impl ItemSearchScope {
    fn matches(&self, item: &InventoryItem, needle: &str) -> bool {
        let notes = item.notes.as_deref().unwrap_or("");
        match self {
            ItemSearchScope::All => [item.code.as_str(), &item.name, &item.category, notes]
                .iter()
                .any(|text| contains_ci(text, needle)),
            ItemSearchScope::Code => contains_ci(&item.code, needle),
            ItemSearchScope::Name => contains_ci(&item.name, needle),
            ItemSearchScope::Category => contains_ci(&item.category, needle),
            ItemSearchScope::Notes => contains_ci(notes, needle),
        }
    }
}

impl fmt::Display for ItemSearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemSearchScope::All => "Semua",
            ItemSearchScope::Code => "Kode",
            ItemSearchScope::Name => "Nama",
            ItemSearchScope::Category => "Kategori",
            ItemSearchScope::Notes => "Catatan",
        };
        f.write_str(label)
    }
}

impl FromStr for ItemSearchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "semua" | "all" => Ok(Self::All),
            "kode" | "code" => Ok(Self::Code),
            "nama" | "name" => Ok(Self::Name),
            "kategori" | "category" => Ok(Self::Category),
            "catatan" | "notes" => Ok(Self::Notes),
            other => Err(format!("Unknown search field: {other}")),
        }
    }
}

/// Derived totals over the current items
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InventorySummary {
    pub total_items: u64,
    pub total_quantity: i64,
    pub total_value: f64,
}

/// Inventory store operations
#[derive(Clone)]
pub struct InventoryStore {
    db: Database,
    validator: Validator,
}

impl InventoryStore {
    pub fn new(db: Database, validator: Validator) -> Self {
        Self { db, validator }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Insert a new item; its code must not exist yet
    pub fn insert(&self, item: NewItem) -> Result<InventoryItem, StoreError> {
        let item = item.normalized();
        item.validate(&self.validator)?;
        let now = Utc::now();

        self.db.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO items (code, name, quantity, price, category, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    item.code,
                    item.name,
                    item.quantity,
                    item.price,
                    item.category,
                    item.notes,
                    now
                ],
            );

            match inserted {
                Ok(_) => {
                    info!(code = %item.code, "Item inserted");
                    Ok(InventoryItem {
                        code: item.code,
                        name: item.name,
                        quantity: item.quantity,
                        price: item.price,
                        category: item.category,
                        notes: item.notes,
                        created_at: now,
                        updated_at: now,
                    })
                }
                Err(e) if is_unique_violation(&e) => {
                    warn!(code = %item.code, "Item code already exists");
                    Err(StoreError::duplicate(ENTITY, item.code))
                }
                Err(e) => {
                    error!(code = %item.code, error = %e, "Item insert failed");
                    Err(e.into())
                }
            }
        })
    }

    /// Replace every field of the item with `code` except the code itself
    pub fn update(&self, code: &str, changes: NewItem) -> Result<InventoryItem, StoreError> {
        let code = code.trim();
        let mut changes = changes.normalized();
        changes.code = code.to_string();
        changes.validate(&self.validator)?;

        self.db.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE items
                 SET name = ?1, quantity = ?2, price = ?3, category = ?4, notes = ?5, updated_at = ?6
                 WHERE code = ?7",
                params![
                    changes.name,
                    changes.quantity,
                    changes.price,
                    changes.category,
                    changes.notes,
                    Utc::now(),
                    code
                ],
            )?;
            if updated == 0 {
                warn!(code = %code, "Item to update not found");
                return Err(StoreError::not_found(ENTITY, code));
            }

            info!(code = %code, "Item updated");
            find_by_code(conn, code)?.ok_or_else(|| StoreError::not_found(ENTITY, code))
        })
    }

    /// Remove the item permanently
    pub fn delete(&self, code: &str) -> Result<(), StoreError> {
        let code = code.trim();
        self.db.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM items WHERE code = ?1", [code])?;
            if deleted == 0 {
                warn!(code = %code, "Item to delete not found");
                return Err(StoreError::not_found(ENTITY, code));
            }
            info!(code = %code, "Item deleted");
            Ok(())
        })
    }

    pub fn get(&self, code: &str) -> Result<Option<InventoryItem>, StoreError> {
        self.db.with_conn(|conn| find_by_code(conn, code.trim()))
    }

    /// All items ordered by name, then code
    pub fn fetch_all(&self) -> Result<Vec<InventoryItem>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{SELECT_ITEMS} ORDER BY name, code"))?;
            let items = stmt
                .query_map([], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    /// Case-insensitive substring search; a blank term returns everything
    pub fn search(
        &self,
        term: &str,
        scope: ItemSearchScope,
    ) -> Result<Vec<InventoryItem>, StoreError> {
        let needle = term.trim().to_lowercase();
        let items = self.fetch_all()?;
        if needle.is_empty() {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .filter(|item| scope.matches(item, &needle))
            .collect())
    }

    /// Count, total stock and total stock value, computed on every call
    pub fn aggregate(&self) -> Result<InventorySummary, StoreError> {
        self.db.with_conn(|conn| {
            let summary = conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(quantity), 0),
                        COALESCE(SUM(quantity * price), 0.0)
                 FROM items",
                [],
                |row| {
                    Ok(InventorySummary {
                        total_items: row.get::<_, i64>(0)?.max(0) as u64,
                        total_quantity: row.get(1)?,
                        total_value: row.get(2)?,
                    })
                },
            )?;
            Ok(summary)
        })
    }

    /// Distinct non-empty categories currently in use
    pub fn categories(&self) -> Result<Vec<String>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT category FROM items
                 WHERE category IS NOT NULL AND category <> ''
                 ORDER BY category",
            )?;
            let categories = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(categories)
        })
    }

    /// Every item as CSV, in `fetch_all` order
    pub fn export_csv(&self) -> Result<String, StoreError> {
        let items = self.fetch_all()?;
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for item in &items {
            writer.write_record([
                item.code.clone(),
                item.name.clone(),
                item.quantity.to_string(),
                item.price.to_string(),
                item.category.clone(),
                item.notes.clone().unwrap_or_default(),
            ])?;
        }
        info!(count = items.len(), "Items exported");
        finish_csv(writer)
    }

    /// Upsert rows from CSV by item code
    ///
    /// Malformed numbers become zero. Rows that are short, fail validation or
    /// fail to persist are skipped; the return value counts the rows applied.
    pub fn import_csv(&self, data: &str) -> Result<usize, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!(line = line + 2, error = %e, "Skipping unreadable item row");
                    continue;
                }
            };
            if record.len() < 5 {
                warn!(line = line + 2, "Skipping short item row");
                continue;
            }

            let field = |i: usize| record.get(i).unwrap_or("").trim().to_string();
            let item = NewItem {
                code: field(0),
                name: field(1),
                quantity: field(2).parse().unwrap_or(0),
                price: field(3)
                    .parse::<f64>()
                    .ok()
                    .filter(|p| p.is_finite())
                    .unwrap_or(0.0),
                category: field(4),
                notes: non_empty(field(5)),
            };
            match item.validate(&self.validator) {
                Ok(()) => rows.push(item),
                Err(e) => warn!(line = line + 2, reason = e.reason, "Skipping invalid item row"),
            }
        }

        let imported = self.db.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = Utc::now();
            let mut imported = 0usize;
            for item in &rows {
                match upsert_item(&tx, item, now) {
                    Ok(()) => imported += 1,
                    Err(e) => warn!(code = %item.code, error = %e, "Skipping item row"),
                }
            }
            tx.commit()?;
            Ok(imported)
        })?;

        info!(imported, total = rows.len(), "Items imported");
        Ok(imported)
    }
}

fn upsert_item(conn: &Connection, item: &NewItem, now: DateTime<Utc>) -> rusqlite::Result<()> {
    // Rows whose values already match keep their `updated_at`
    conn.execute(
        "UPDATE items
         SET name = ?1, quantity = ?2, price = ?3, category = ?4, notes = ?5, updated_at = ?6
         WHERE code = ?7
           AND (name IS NOT ?1 OR quantity IS NOT ?2 OR price IS NOT ?3
                OR category IS NOT ?4 OR notes IS NOT ?5)",
        params![
            item.name,
            item.quantity,
            item.price,
            item.category,
            item.notes,
            now,
            item.code
        ],
    )?;
    conn.execute(
        "INSERT INTO items (code, name, quantity, price, category, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(code) DO NOTHING",
        params![
            item.code,
            item.name,
            item.quantity,
            item.price,
            item.category,
            item.notes,
            now
        ],
    )?;
    Ok(())
}

fn find_by_code(conn: &Connection, code: &str) -> Result<Option<InventoryItem>, StoreError> {
    let item = conn
        .query_row(
            &format!("{SELECT_ITEMS} WHERE code = ?1"),
            [code],
            item_from_row,
        )
        .optional()?;
    Ok(item)
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        code: row.get("code")?,
        name: row.get("name")?,
        quantity: row.get::<_, Option<i64>>("quantity")?.unwrap_or(0),
        price: row.get::<_, Option<f64>>("price")?.unwrap_or(0.0),
        category: row.get::<_, Option<String>>("category")?.unwrap_or_default(),
        notes: row.get::<_, Option<String>>("notes")?.and_then(non_empty),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
