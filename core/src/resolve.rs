use std::collections::HashMap;

use anyhow::{Result, bail};
use serde::Serialize;

use crate::db::Database;
use crate::models::{CustomUserIngredient, IngredientKind, IngredientLink};

/// How a free-text name was resolved: against the shared catalog, against a
/// custom entry that already existed, or by inventing a new custom entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    MatchedCatalog,
    ExistingCustom,
    NewCustom,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolvedIngredient {
    pub ingredient_id: i64,
    /// Canonical catalog name for matches, the custom entry's name otherwise.
    pub display_name: String,
    pub classification: Classification,
}

struct SnapshotEntry {
    id: i64,
    name: String,
    new_this_batch: bool,
}

/// In-memory snapshot of one user's custom ingredients, loaded once per
/// batch and appended to as the batch invents new entries. Lookups within
/// the batch never go back to the database. Scoped to a single call, never
/// cached across requests.
pub struct CustomSnapshot {
    by_name: HashMap<String, SnapshotEntry>,
}

impl CustomSnapshot {
    pub fn load(db: &Database, user_id: i64) -> Result<Self> {
        let mut by_name = HashMap::new();
        for entry in db.list_custom_ingredients(user_id)? {
            by_name.insert(
                entry.name.to_lowercase(),
                SnapshotEntry {
                    id: entry.id,
                    name: entry.name,
                    new_this_batch: false,
                },
            );
        }
        Ok(Self { by_name })
    }

    fn get(&self, name: &str) -> Option<&SnapshotEntry> {
        self.by_name.get(&name.to_lowercase())
    }

    fn insert_new(&mut self, entry: &CustomUserIngredient) {
        self.by_name.insert(
            entry.name.to_lowercase(),
            SnapshotEntry {
                id: entry.id,
                name: entry.name.clone(),
                new_this_batch: true,
            },
        );
    }
}

/// Map a free-text ingredient name to the user's stable ingredient id,
/// reusing existing rows where possible and creating the minimum necessary
/// new ones otherwise.
///
/// The catalog takes precedence: a case-insensitive catalog match links to
/// the shared entry and never invents a custom one. Otherwise the batch
/// snapshot is consulted, and only a name unseen anywhere creates a new
/// `CustomUserIngredient`. Every creation path is find-or-create, so
/// resolving the same `(user, name)` twice never duplicates a row.
pub fn resolve_name(
    db: &Database,
    user_id: i64,
    raw_name: &str,
    snapshot: &mut CustomSnapshot,
) -> Result<ResolvedIngredient> {
    let name = raw_name.trim();
    if name.is_empty() {
        bail!("Ingredient name must not be empty");
    }

    if let Some(shop) = db.get_shop_ingredient_by_name(name)? {
        let ingredient_id = db.find_or_create_ingredient(user_id, IngredientLink::Catalog(shop.id))?;
        return Ok(ResolvedIngredient {
            ingredient_id,
            display_name: shop.name,
            classification: Classification::MatchedCatalog,
        });
    }

    if let Some(entry) = snapshot.get(name) {
        let classification = if entry.new_this_batch {
            Classification::NewCustom
        } else {
            Classification::ExistingCustom
        };
        let display_name = entry.name.clone();
        let ingredient_id = db.find_or_create_ingredient(user_id, IngredientLink::Custom(entry.id))?;
        return Ok(ResolvedIngredient {
            ingredient_id,
            display_name,
            classification,
        });
    }

    let custom = db.insert_custom_ingredient(user_id, name, IngredientKind::Food)?;
    snapshot.insert_new(&custom);
    let ingredient_id = db.find_or_create_ingredient(user_id, IngredientLink::Custom(custom.id))?;
    Ok(ResolvedIngredient {
        ingredient_id,
        display_name: custom.name,
        classification: Classification::NewCustom,
    })
}

/// Resolve a single name outside a batch (shopping-list and storage flows).
/// Loads a fresh snapshot for the one lookup.
pub fn resolve_one(db: &Database, user_id: i64, raw_name: &str) -> Result<ResolvedIngredient> {
    let mut snapshot = CustomSnapshot::load(db, user_id)?;
    resolve_name(db, user_id, raw_name, &mut snapshot)
}
