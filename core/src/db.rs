use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Local;
use rusqlite::{Connection, params};

use crate::models::{
    CustomUserIngredient, Ingredient, IngredientKind, IngredientLink, IngredientView,
    NewRecipeLine, NewShopIngredient, Recipe, RecipeDetail, RecipeIngredient, ShopIngredient,
    ShoppingList, ShoppingListDetail, ShoppingListItem, StorageDetail, StorageKind,
    StorageLocation, StoredItem, Unit, validate_location_kind, validate_name,
};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS shop_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL COLLATE NOCASE UNIQUE,
                    kind TEXT NOT NULL,
                    storage TEXT NOT NULL DEFAULT 'none',
                    category TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS custom_user_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    name TEXT NOT NULL COLLATE NOCASE,
                    kind TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    shop_ingredient_id INTEGER REFERENCES shop_ingredients(id),
                    custom_user_ingredient_id INTEGER REFERENCES custom_user_ingredients(id),
                    created_at TEXT NOT NULL,
                    CHECK ((shop_ingredient_id IS NULL) != (custom_user_ingredient_id IS NULL))
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    original_url TEXT,
                    image TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS recipe_ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS storage_locations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    kind TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS stored_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    location_id INTEGER NOT NULL REFERENCES storage_locations(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS shopping_lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list_id INTEGER NOT NULL REFERENCES shopping_lists(id) ON DELETE CASCADE,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
                    quantity REAL NOT NULL,
                    unit TEXT NOT NULL,
                    checked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_custom_ingredients_user ON custom_user_ingredients(user_id);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_ingredients_catalog
                    ON ingredients(user_id, shop_ingredient_id) WHERE shop_ingredient_id IS NOT NULL;
                CREATE UNIQUE INDEX IF NOT EXISTS idx_ingredients_custom
                    ON ingredients(user_id, custom_user_ingredient_id) WHERE custom_user_ingredient_id IS NOT NULL;
                CREATE INDEX IF NOT EXISTS idx_recipes_user ON recipes(user_id);
                CREATE INDEX IF NOT EXISTS idx_recipe_ingredients_recipe ON recipe_ingredients(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_stored_items_location ON stored_items(location_id);
                CREATE INDEX IF NOT EXISTS idx_list_items_list ON shopping_list_items(list_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn parse_text_col<T>(idx: usize, value: &str) -> rusqlite::Result<T>
    where
        T: FromStr<Err = anyhow::Error>,
    {
        value.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
        })
    }

    fn shop_ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShopIngredient> {
        let kind: String = row.get(2)?;
        let storage: String = row.get(3)?;
        Ok(ShopIngredient {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: Self::parse_text_col(2, &kind)?,
            storage: Self::parse_text_col(3, &storage)?,
            category: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn custom_ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<CustomUserIngredient> {
        let kind: String = row.get(3)?;
        Ok(CustomUserIngredient {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: Self::parse_text_col(3, &kind)?,
            created_at: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: id, 1: recipe_id, 2: ingredient_id, 3: quantity, 4: unit, 5: joined name
    fn recipe_ingredient_from_row(row: &rusqlite::Row) -> rusqlite::Result<RecipeIngredient> {
        let unit: String = row.get(4)?;
        Ok(RecipeIngredient {
            id: row.get(0)?,
            recipe_id: row.get(1)?,
            ingredient_id: row.get(2)?,
            quantity: row.get(3)?,
            unit: Self::parse_text_col(4, &unit)?,
            name: row.get(5)?,
        })
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            original_url: row.get(3)?,
            image: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn shopping_list_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingList> {
        Ok(ShoppingList {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: id, 1: list_id, 2: ingredient_id, 3: quantity, 4: unit, 5: checked, 6: joined name
    fn list_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShoppingListItem> {
        let unit: String = row.get(4)?;
        let checked: i64 = row.get(5)?;
        Ok(ShoppingListItem {
            id: row.get(0)?,
            list_id: row.get(1)?,
            ingredient_id: row.get(2)?,
            quantity: row.get(3)?,
            unit: Self::parse_text_col(4, &unit)?,
            checked: checked != 0,
            name: row.get(6)?,
        })
    }

    fn location_from_row(row: &rusqlite::Row) -> rusqlite::Result<StorageLocation> {
        let kind: String = row.get(3)?;
        Ok(StorageLocation {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            kind: Self::parse_text_col(3, &kind)?,
            created_at: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: id, 1: location_id, 2: ingredient_id, 3: quantity, 4: unit,
    // 5: joined name, 6: created_at, 7: updated_at
    fn stored_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<StoredItem> {
        let unit: String = row.get(4)?;
        Ok(StoredItem {
            id: row.get(0)?,
            location_id: row.get(1)?,
            ingredient_id: row.get(2)?,
            quantity: row.get(3)?,
            unit: Self::parse_text_col(4, &unit)?,
            name: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // --- Catalog (shared, user-independent) ---

    pub fn insert_shop_ingredient(&self, entry: &NewShopIngredient) -> Result<ShopIngredient> {
        let name = validate_name(&entry.name, "Catalog ingredient")?;
        if let Some(existing) = self.get_shop_ingredient_by_name(&name)? {
            bail!(
                "A catalog ingredient named '{}' already exists",
                existing.name
            );
        }
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO shop_ingredients (name, kind, storage, category, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                name,
                entry.kind.as_str(),
                entry.storage.as_str(),
                entry.category,
                now,
                now,
            ],
        )?;
        self.get_shop_ingredient(self.conn.last_insert_rowid())
    }

    /// Edit a catalog entry in place. Renames keep the id, so every user
    /// ingredient linking to it follows the new name.
    pub fn update_shop_ingredient(
        &self,
        id: i64,
        entry: &NewShopIngredient,
    ) -> Result<ShopIngredient> {
        let name = validate_name(&entry.name, "Catalog ingredient")?;
        if let Some(existing) = self.get_shop_ingredient_by_name(&name)? {
            if existing.id != id {
                bail!(
                    "A catalog ingredient named '{}' already exists",
                    existing.name
                );
            }
        }
        self.get_shop_ingredient(id)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE shop_ingredients SET name = ?1, kind = ?2, storage = ?3, category = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                name,
                entry.kind.as_str(),
                entry.storage.as_str(),
                entry.category,
                now,
                id,
            ],
        )?;
        self.get_shop_ingredient(id)
    }

    pub fn get_shop_ingredient(&self, id: i64) -> Result<ShopIngredient> {
        self.conn
            .query_row(
                "SELECT id, name, kind, storage, category, created_at, updated_at
                 FROM shop_ingredients WHERE id = ?1",
                params![id],
                Self::shop_ingredient_from_row,
            )
            .context("Catalog ingredient not found")
    }

    pub fn get_shop_ingredient_by_name(&self, name: &str) -> Result<Option<ShopIngredient>> {
        // The name column is COLLATE NOCASE, so equality is case-insensitive.
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, storage, category, created_at, updated_at
             FROM shop_ingredients WHERE name = ?1",
        )?;
        let mut rows = stmt.query(params![name.trim()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::shop_ingredient_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn list_shop_ingredients(&self, search: Option<&str>) -> Result<Vec<ShopIngredient>> {
        if let Some(query) = search {
            let escaped = query
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let pattern = format!("%{escaped}%");
            let mut stmt = self.conn.prepare(
                "SELECT id, name, kind, storage, category, created_at, updated_at
                 FROM shop_ingredients WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name LIMIT 50",
            )?;
            let entries = stmt
                .query_map(params![pattern], Self::shop_ingredient_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(entries);
        }
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, storage, category, created_at, updated_at
             FROM shop_ingredients ORDER BY name LIMIT 200",
        )?;
        let entries = stmt
            .query_map([], Self::shop_ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- Custom user ingredients ---

    pub fn insert_custom_ingredient(
        &self,
        user_id: i64,
        name: &str,
        kind: IngredientKind,
    ) -> Result<CustomUserIngredient> {
        let name = validate_name(name, "Ingredient")?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO custom_user_ingredients (user_id, name, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, kind.as_str(), now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.conn
            .query_row(
                "SELECT id, user_id, name, kind, created_at FROM custom_user_ingredients WHERE id = ?1",
                params![id],
                Self::custom_ingredient_from_row,
            )
            .context("Custom ingredient not found after insert")
    }

    pub fn list_custom_ingredients(&self, user_id: i64) -> Result<Vec<CustomUserIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, kind, created_at
             FROM custom_user_ingredients WHERE user_id = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![user_id], Self::custom_ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- User ingredient links ---

    pub fn find_ingredient(&self, user_id: i64, link: IngredientLink) -> Result<Option<i64>> {
        let (sql, key) = match link {
            IngredientLink::Catalog(id) => (
                "SELECT id FROM ingredients WHERE user_id = ?1 AND shop_ingredient_id = ?2",
                id,
            ),
            IngredientLink::Custom(id) => (
                "SELECT id FROM ingredients WHERE user_id = ?1 AND custom_user_ingredient_id = ?2",
                id,
            ),
        };
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params![user_id, key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    /// Find the user's link row for this catalog/custom entry, creating it on
    /// first use. Never creates a second row for the same `(user, link)` pair.
    pub fn find_or_create_ingredient(&self, user_id: i64, link: IngredientLink) -> Result<i64> {
        if let Some(id) = self.find_ingredient(user_id, link)? {
            return Ok(id);
        }
        let (catalog, custom) = link.columns();
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ingredients (user_id, shop_ingredient_id, custom_user_ingredient_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, catalog, custom, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_ingredient(&self, user_id: i64, id: i64) -> Result<Ingredient> {
        let (id, user_id, catalog, custom, created_at) = self
            .conn
            .query_row(
                "SELECT id, user_id, shop_ingredient_id, custom_user_ingredient_id, created_at
                 FROM ingredients WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .context("Ingredient not found")?;
        Ok(Ingredient {
            id,
            user_id,
            link: IngredientLink::from_columns(catalog, custom)?,
            created_at,
        })
    }

    /// All of a user's ingredients with display names resolved in one query.
    pub fn list_ingredients(&self, user_id: i64) -> Result<Vec<IngredientView>> {
        let mut stmt = self.conn.prepare(
            "SELECT i.id, COALESCE(s.name, c.name), COALESCE(s.kind, c.kind),
                    s.storage, i.custom_user_ingredient_id IS NOT NULL
             FROM ingredients i
             LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
             LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
             WHERE i.user_id = ?1
             ORDER BY COALESCE(s.name, c.name)",
        )?;
        let views = stmt
            .query_map(params![user_id], |row| {
                let kind: String = row.get(2)?;
                let storage: Option<String> = row.get(3)?;
                let storage = match storage {
                    Some(s) => Some(Self::parse_text_col::<StorageKind>(3, &s)?),
                    None => None,
                };
                Ok(IngredientView {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    kind: Self::parse_text_col(2, &kind)?,
                    storage,
                    custom: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    // --- Recipes ---

    pub fn create_recipe(
        &self,
        user_id: i64,
        name: &str,
        original_url: Option<&str>,
        image: Option<&str>,
        lines: &[NewRecipeLine],
    ) -> Result<RecipeDetail> {
        let name = validate_name(name, "Recipe")?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO recipes (user_id, name, original_url, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![user_id, name, original_url, image, now, now],
        )?;
        let recipe_id = self.conn.last_insert_rowid();
        for line in lines {
            self.conn.execute(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, quantity, unit)
                 VALUES (?1, ?2, ?3, ?4)",
                params![recipe_id, line.ingredient_id, line.quantity, line.unit.as_str()],
            )?;
        }
        self.get_recipe_detail(user_id, recipe_id)
    }

    pub fn get_recipe(&self, user_id: i64, id: i64) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, original_url, image, created_at, updated_at
                 FROM recipes WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::recipe_from_row,
            )
            .context("Recipe not found")
    }

    pub fn get_recipe_by_name(&self, user_id: i64, name: &str) -> Result<Recipe> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, original_url, image, created_at, updated_at
                 FROM recipes WHERE user_id = ?1 AND LOWER(name) = LOWER(?2)",
                params![user_id, name],
                Self::recipe_from_row,
            )
            .context(format!("Recipe '{name}' not found"))
    }

    fn recipe_lines(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let mut stmt = self.conn.prepare(
            "SELECT ri.id, ri.recipe_id, ri.ingredient_id, ri.quantity, ri.unit,
                    COALESCE(s.name, c.name)
             FROM recipe_ingredients ri
             JOIN ingredients i ON ri.ingredient_id = i.id
             LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
             LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
             WHERE ri.recipe_id = ?1
             ORDER BY ri.id",
        )?;
        let lines = stmt
            .query_map(params![recipe_id], Self::recipe_ingredient_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    pub fn get_recipe_detail(&self, user_id: i64, id: i64) -> Result<RecipeDetail> {
        let recipe = self.get_recipe(user_id, id)?;
        let ingredients = self.recipe_lines(id)?;
        Ok(RecipeDetail {
            id: recipe.id,
            name: recipe.name,
            original_url: recipe.original_url,
            image: recipe.image,
            ingredients,
            created_at: recipe.created_at,
        })
    }

    pub fn list_recipes(&self, user_id: i64) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, original_url, image, created_at, updated_at
             FROM recipes WHERE user_id = ?1 ORDER BY name",
        )?;
        let recipes = stmt
            .query_map(params![user_id], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    pub fn delete_recipe(&self, user_id: i64, id: i64) -> Result<()> {
        self.get_recipe(user_id, id)?;
        // Delete lines first (CASCADE should handle this, but be explicit)
        self.conn.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(())
    }

    // --- Shopping lists ---

    pub fn create_shopping_list(&self, user_id: i64, name: &str) -> Result<ShoppingList> {
        let name = validate_name(name, "Shopping list")?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO shopping_lists (user_id, name, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, now, now],
        )?;
        self.get_shopping_list(user_id, self.conn.last_insert_rowid())
    }

    pub fn get_shopping_list(&self, user_id: i64, id: i64) -> Result<ShoppingList> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, created_at, updated_at
                 FROM shopping_lists WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::shopping_list_from_row,
            )
            .context("Shopping list not found")
    }

    pub fn get_shopping_list_by_name(&self, user_id: i64, name: &str) -> Result<ShoppingList> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, created_at, updated_at
                 FROM shopping_lists WHERE user_id = ?1 AND LOWER(name) = LOWER(?2)",
                params![user_id, name],
                Self::shopping_list_from_row,
            )
            .context(format!("Shopping list '{name}' not found"))
    }

    pub fn list_shopping_lists(&self, user_id: i64) -> Result<Vec<ShoppingList>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, created_at, updated_at
             FROM shopping_lists WHERE user_id = ?1 ORDER BY name",
        )?;
        let lists = stmt
            .query_map(params![user_id], Self::shopping_list_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lists)
    }

    pub fn get_shopping_list_detail(&self, user_id: i64, id: i64) -> Result<ShoppingListDetail> {
        let list = self.get_shopping_list(user_id, id)?;
        let mut stmt = self.conn.prepare(
            "SELECT li.id, li.list_id, li.ingredient_id, li.quantity, li.unit, li.checked,
                    COALESCE(s.name, c.name)
             FROM shopping_list_items li
             JOIN ingredients i ON li.ingredient_id = i.id
             LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
             LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
             WHERE li.list_id = ?1
             ORDER BY li.id",
        )?;
        let items = stmt
            .query_map(params![id], Self::list_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ShoppingListDetail {
            id: list.id,
            name: list.name,
            items,
            created_at: list.created_at,
        })
    }

    pub fn delete_shopping_list(&self, user_id: i64, id: i64) -> Result<()> {
        self.get_shopping_list(user_id, id)?;
        self.conn.execute(
            "DELETE FROM shopping_list_items WHERE list_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM shopping_lists WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn insert_list_item(
        &self,
        user_id: i64,
        list_id: i64,
        ingredient_id: i64,
        quantity: f64,
        unit: Unit,
    ) -> Result<ShoppingListItem> {
        self.get_shopping_list(user_id, list_id)?;
        self.get_ingredient(user_id, ingredient_id)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO shopping_list_items (list_id, ingredient_id, quantity, unit, checked, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![list_id, ingredient_id, quantity, unit.as_str(), now],
        )?;
        self.get_list_item(self.conn.last_insert_rowid())
    }

    fn get_list_item(&self, item_id: i64) -> Result<ShoppingListItem> {
        self.conn
            .query_row(
                "SELECT li.id, li.list_id, li.ingredient_id, li.quantity, li.unit, li.checked,
                        COALESCE(s.name, c.name)
                 FROM shopping_list_items li
                 JOIN ingredients i ON li.ingredient_id = i.id
                 LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
                 LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
                 WHERE li.id = ?1",
                params![item_id],
                Self::list_item_from_row,
            )
            .context("Shopping list item not found")
    }

    /// An unchecked item on this list for the same ingredient and unit, if
    /// any. Used to merge instead of appending a duplicate row.
    pub fn find_unchecked_list_item(
        &self,
        list_id: i64,
        ingredient_id: i64,
        unit: Unit,
    ) -> Result<Option<ShoppingListItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT li.id, li.list_id, li.ingredient_id, li.quantity, li.unit, li.checked,
                    COALESCE(s.name, c.name)
             FROM shopping_list_items li
             JOIN ingredients i ON li.ingredient_id = i.id
             LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
             LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
             WHERE li.list_id = ?1 AND li.ingredient_id = ?2 AND li.unit = ?3 AND li.checked = 0",
        )?;
        let mut rows = stmt.query(params![list_id, ingredient_id, unit.as_str()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::list_item_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn add_quantity_to_list_item(&self, item_id: i64, delta: f64) -> Result<ShoppingListItem> {
        self.conn.execute(
            "UPDATE shopping_list_items SET quantity = quantity + ?1 WHERE id = ?2",
            params![delta, item_id],
        )?;
        self.get_list_item(item_id)
    }

    pub fn set_list_item_checked(&self, user_id: i64, item_id: i64, checked: bool) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE shopping_list_items SET checked = ?1
             WHERE id = ?2 AND list_id IN (SELECT id FROM shopping_lists WHERE user_id = ?3)",
            params![i64::from(checked), item_id, user_id],
        )?;
        Ok(rows > 0)
    }

    pub fn delete_list_item(&self, user_id: i64, item_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM shopping_list_items
             WHERE id = ?1 AND list_id IN (SELECT id FROM shopping_lists WHERE user_id = ?2)",
            params![item_id, user_id],
        )?;
        Ok(rows > 0)
    }

    // --- Storage locations ---

    pub fn create_storage_location(
        &self,
        user_id: i64,
        name: &str,
        kind: StorageKind,
    ) -> Result<StorageLocation> {
        let name = validate_name(name, "Storage location")?;
        let kind = validate_location_kind(kind)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO storage_locations (user_id, name, kind, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, name, kind.as_str(), now],
        )?;
        self.get_storage_location(user_id, self.conn.last_insert_rowid())
    }

    pub fn get_storage_location(&self, user_id: i64, id: i64) -> Result<StorageLocation> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, kind, created_at
                 FROM storage_locations WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                Self::location_from_row,
            )
            .context("Storage location not found")
    }

    pub fn get_storage_location_by_name(&self, user_id: i64, name: &str) -> Result<StorageLocation> {
        self.conn
            .query_row(
                "SELECT id, user_id, name, kind, created_at
                 FROM storage_locations WHERE user_id = ?1 AND LOWER(name) = LOWER(?2)",
                params![user_id, name],
                Self::location_from_row,
            )
            .context(format!("Storage location '{name}' not found"))
    }

    pub fn list_storage_locations(&self, user_id: i64) -> Result<Vec<StorageLocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, name, kind, created_at
             FROM storage_locations WHERE user_id = ?1 ORDER BY name",
        )?;
        let locations = stmt
            .query_map(params![user_id], Self::location_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    pub fn get_storage_detail(&self, user_id: i64, id: i64) -> Result<StorageDetail> {
        let location = self.get_storage_location(user_id, id)?;
        let mut stmt = self.conn.prepare(
            "SELECT it.id, it.location_id, it.ingredient_id, it.quantity, it.unit,
                    COALESCE(s.name, c.name), it.created_at, it.updated_at
             FROM stored_items it
             JOIN ingredients i ON it.ingredient_id = i.id
             LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
             LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
             WHERE it.location_id = ?1
             ORDER BY it.id",
        )?;
        let items = stmt
            .query_map(params![id], Self::stored_item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StorageDetail {
            id: location.id,
            name: location.name,
            kind: location.kind,
            items,
        })
    }

    pub fn delete_storage_location(&self, user_id: i64, id: i64) -> Result<()> {
        self.get_storage_location(user_id, id)?;
        self.conn.execute(
            "DELETE FROM stored_items WHERE location_id = ?1",
            params![id],
        )?;
        self.conn
            .execute("DELETE FROM storage_locations WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn insert_stored_item(
        &self,
        user_id: i64,
        location_id: i64,
        ingredient_id: i64,
        quantity: f64,
        unit: Unit,
    ) -> Result<StoredItem> {
        self.get_storage_location(user_id, location_id)?;
        self.get_ingredient(user_id, ingredient_id)?;
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO stored_items (location_id, ingredient_id, quantity, unit, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![location_id, ingredient_id, quantity, unit.as_str(), now, now],
        )?;
        self.get_stored_item(self.conn.last_insert_rowid())
    }

    fn get_stored_item(&self, item_id: i64) -> Result<StoredItem> {
        self.conn
            .query_row(
                "SELECT it.id, it.location_id, it.ingredient_id, it.quantity, it.unit,
                        COALESCE(s.name, c.name), it.created_at, it.updated_at
                 FROM stored_items it
                 JOIN ingredients i ON it.ingredient_id = i.id
                 LEFT JOIN shop_ingredients s ON i.shop_ingredient_id = s.id
                 LEFT JOIN custom_user_ingredients c ON i.custom_user_ingredient_id = c.id
                 WHERE it.id = ?1",
                params![item_id],
                Self::stored_item_from_row,
            )
            .context("Stored item not found")
    }

    /// Move an item to another of the same user's locations. Both the item's
    /// current location and the destination must belong to the caller.
    pub fn move_stored_item(
        &self,
        user_id: i64,
        item_id: i64,
        dest_location_id: i64,
    ) -> Result<StoredItem> {
        self.get_storage_location(user_id, dest_location_id)?;
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE stored_items SET location_id = ?1, updated_at = ?2
             WHERE id = ?3 AND location_id IN (SELECT id FROM storage_locations WHERE user_id = ?4)",
            params![dest_location_id, now, item_id, user_id],
        )?;
        if rows == 0 {
            bail!("Stored item not found");
        }
        self.get_stored_item(item_id)
    }

    pub fn set_stored_item_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: f64,
    ) -> Result<StoredItem> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE stored_items SET quantity = ?1, updated_at = ?2
             WHERE id = ?3 AND location_id IN (SELECT id FROM storage_locations WHERE user_id = ?4)",
            params![quantity, now, item_id, user_id],
        )?;
        if rows == 0 {
            bail!("Stored item not found");
        }
        self.get_stored_item(item_id)
    }

    pub fn delete_stored_item(&self, user_id: i64, item_id: i64) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM stored_items
             WHERE id = ?1 AND location_id IN (SELECT id FROM storage_locations WHERE user_id = ?2)",
            params![item_id, user_id],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn flour() -> NewShopIngredient {
        NewShopIngredient {
            name: "Plain flour".to_string(),
            kind: IngredientKind::Food,
            storage: StorageKind::Pantry,
            category: Some("baking".to_string()),
        }
    }

    #[test]
    fn test_insert_and_get_shop_ingredient() {
        let db = test_db();
        let created = db.insert_shop_ingredient(&flour()).unwrap();
        assert_eq!(created.name, "Plain flour");
        assert_eq!(created.kind, IngredientKind::Food);
        assert_eq!(created.storage, StorageKind::Pantry);

        let fetched = db.get_shop_ingredient(created.id).unwrap();
        assert_eq!(fetched.id, created.id);
    }

    #[test]
    fn test_shop_ingredient_name_lookup_case_insensitive() {
        let db = test_db();
        let created = db.insert_shop_ingredient(&flour()).unwrap();

        for query in ["plain flour", "PLAIN FLOUR", "Plain Flour"] {
            let found = db.get_shop_ingredient_by_name(query).unwrap().unwrap();
            assert_eq!(found.id, created.id);
        }
        assert!(db.get_shop_ingredient_by_name("rye flour").unwrap().is_none());
    }

    #[test]
    fn test_shop_ingredient_duplicate_name_rejected() {
        let db = test_db();
        db.insert_shop_ingredient(&flour()).unwrap();

        let mut dup = flour();
        dup.name = "PLAIN FLOUR".to_string();
        assert!(db.insert_shop_ingredient(&dup).is_err());
    }

    #[test]
    fn test_update_shop_ingredient_keeps_id() {
        let db = test_db();
        let created = db.insert_shop_ingredient(&flour()).unwrap();

        let mut edited = flour();
        edited.name = "Wheat flour".to_string();
        let updated = db.update_shop_ingredient(created.id, &edited).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Wheat flour");
        assert!(db.get_shop_ingredient_by_name("Plain flour").unwrap().is_none());
    }

    #[test]
    fn test_find_or_create_ingredient_idempotent() {
        let db = test_db();
        let shop = db.insert_shop_ingredient(&flour()).unwrap();

        let first = db
            .find_or_create_ingredient(1, IngredientLink::Catalog(shop.id))
            .unwrap();
        let second = db
            .find_or_create_ingredient(1, IngredientLink::Catalog(shop.id))
            .unwrap();
        assert_eq!(first, second);

        // A different user gets a distinct link row
        let other = db
            .find_or_create_ingredient(2, IngredientLink::Catalog(shop.id))
            .unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_catalog_and_custom_links_are_distinct() {
        let db = test_db();
        let shop = db.insert_shop_ingredient(&flour()).unwrap();
        let custom = db
            .insert_custom_ingredient(1, "Unicorn Dust", IngredientKind::Food)
            .unwrap();

        let a = db
            .find_or_create_ingredient(1, IngredientLink::Catalog(shop.id))
            .unwrap();
        let b = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        assert_ne!(a, b);

        let ing = db.get_ingredient(1, b).unwrap();
        assert_eq!(ing.link, IngredientLink::Custom(custom.id));
    }

    #[test]
    fn test_get_ingredient_scoped_to_owner() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Unicorn Dust", IngredientKind::Food)
            .unwrap();
        let id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();

        assert!(db.get_ingredient(1, id).is_ok());
        assert!(db.get_ingredient(2, id).is_err());
    }

    #[test]
    fn test_list_ingredients_joins_names() {
        let db = test_db();
        let shop = db.insert_shop_ingredient(&flour()).unwrap();
        let custom = db
            .insert_custom_ingredient(1, "Unicorn Dust", IngredientKind::Food)
            .unwrap();
        db.find_or_create_ingredient(1, IngredientLink::Catalog(shop.id))
            .unwrap();
        db.find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();

        let views = db.list_ingredients(1).unwrap();
        assert_eq!(views.len(), 2);
        let catalog = views.iter().find(|v| !v.custom).unwrap();
        assert_eq!(catalog.name, "Plain flour");
        assert_eq!(catalog.storage, Some(StorageKind::Pantry));
        let custom_view = views.iter().find(|v| v.custom).unwrap();
        assert_eq!(custom_view.name, "Unicorn Dust");
        assert!(custom_view.storage.is_none());
    }

    #[test]
    fn test_create_recipe_with_lines_and_detail() {
        let db = test_db();
        let shop = db.insert_shop_ingredient(&flour()).unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Catalog(shop.id))
            .unwrap();

        let detail = db
            .create_recipe(
                1,
                "Bread",
                Some("https://example.com/bread"),
                Some("/images/bread.jpg"),
                &[NewRecipeLine {
                    ingredient_id,
                    quantity: 500.0,
                    unit: Unit::G,
                }],
            )
            .unwrap();
        assert_eq!(detail.name, "Bread");
        assert_eq!(detail.ingredients.len(), 1);
        assert_eq!(detail.ingredients[0].name.as_deref(), Some("Plain flour"));
        assert_eq!(detail.ingredients[0].unit, Unit::G);
    }

    #[test]
    fn test_recipe_ownership() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Salt", IngredientKind::Condiment)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let detail = db
            .create_recipe(
                1,
                "Brine",
                None,
                None,
                &[NewRecipeLine {
                    ingredient_id,
                    quantity: 30.0,
                    unit: Unit::G,
                }],
            )
            .unwrap();

        assert!(db.get_recipe_detail(1, detail.id).is_ok());
        assert!(db.get_recipe_detail(2, detail.id).is_err());
        assert!(db.delete_recipe(2, detail.id).is_err());
        db.delete_recipe(1, detail.id).unwrap();
        assert!(db.get_recipe(1, detail.id).is_err());
    }

    #[test]
    fn test_shopping_list_items_and_check() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Milk", IngredientKind::Drink)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let list = db.create_shopping_list(1, "Weekly").unwrap();

        let item = db
            .insert_list_item(1, list.id, ingredient_id, 1.0, Unit::L)
            .unwrap();
        assert_eq!(item.name.as_deref(), Some("Milk"));
        assert!(!item.checked);

        assert!(db.set_list_item_checked(1, item.id, true).unwrap());
        let detail = db.get_shopping_list_detail(1, list.id).unwrap();
        assert!(detail.items[0].checked);

        // Another user cannot touch the item
        assert!(!db.set_list_item_checked(2, item.id, false).unwrap());
        assert!(!db.delete_list_item(2, item.id).unwrap());
        assert!(db.delete_list_item(1, item.id).unwrap());
    }

    #[test]
    fn test_find_unchecked_list_item_respects_unit() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Milk", IngredientKind::Drink)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let list = db.create_shopping_list(1, "Weekly").unwrap();
        db.insert_list_item(1, list.id, ingredient_id, 500.0, Unit::Ml)
            .unwrap();

        assert!(db
            .find_unchecked_list_item(list.id, ingredient_id, Unit::Ml)
            .unwrap()
            .is_some());
        assert!(db
            .find_unchecked_list_item(list.id, ingredient_id, Unit::Piece)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_delete_shopping_list_removes_items() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Milk", IngredientKind::Drink)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let list = db.create_shopping_list(1, "Weekly").unwrap();
        let item = db
            .insert_list_item(1, list.id, ingredient_id, 1.0, Unit::L)
            .unwrap();

        db.delete_shopping_list(1, list.id).unwrap();
        assert!(db.get_shopping_list(1, list.id).is_err());
        assert!(!db.delete_list_item(1, item.id).unwrap());
    }

    #[test]
    fn test_storage_location_kind_validated() {
        let db = test_db();
        assert!(db.create_storage_location(1, "Shelf", StorageKind::None).is_err());
        let loc = db
            .create_storage_location(1, "Kitchen fridge", StorageKind::Fridge)
            .unwrap();
        assert_eq!(loc.kind, StorageKind::Fridge);
    }

    #[test]
    fn test_store_and_move_item() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Peas", IngredientKind::Food)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let fridge = db
            .create_storage_location(1, "Fridge", StorageKind::Fridge)
            .unwrap();
        let freezer = db
            .create_storage_location(1, "Freezer", StorageKind::Freezer)
            .unwrap();

        let item = db
            .insert_stored_item(1, fridge.id, ingredient_id, 400.0, Unit::G)
            .unwrap();
        assert_eq!(item.name.as_deref(), Some("Peas"));

        let moved = db.move_stored_item(1, item.id, freezer.id).unwrap();
        assert_eq!(moved.location_id, freezer.id);

        // Destination owned by someone else is rejected
        let other_loc = db
            .create_storage_location(2, "Their pantry", StorageKind::Pantry)
            .unwrap();
        assert!(db.move_stored_item(1, item.id, other_loc.id).is_err());
        // Wrong caller cannot move the item at all
        assert!(db.move_stored_item(2, item.id, other_loc.id).is_err());
    }

    #[test]
    fn test_stored_item_quantity_update_and_delete() {
        let db = test_db();
        let custom = db
            .insert_custom_ingredient(1, "Peas", IngredientKind::Food)
            .unwrap();
        let ingredient_id = db
            .find_or_create_ingredient(1, IngredientLink::Custom(custom.id))
            .unwrap();
        let fridge = db
            .create_storage_location(1, "Fridge", StorageKind::Fridge)
            .unwrap();
        let item = db
            .insert_stored_item(1, fridge.id, ingredient_id, 400.0, Unit::G)
            .unwrap();

        let updated = db.set_stored_item_quantity(1, item.id, 250.0).unwrap();
        assert!((updated.quantity - 250.0).abs() < f64::EPSILON);

        assert!(!db.delete_stored_item(2, item.id).unwrap());
        assert!(db.delete_stored_item(1, item.id).unwrap());
    }

    #[test]
    fn test_list_shop_ingredients_search_escapes_wildcards() {
        let db = test_db();
        db.insert_shop_ingredient(&flour()).unwrap();
        let mut odd = flour();
        odd.name = "100% cocoa".to_string();
        db.insert_shop_ingredient(&odd).unwrap();

        let hits = db.list_shop_ingredients(Some("100%")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "100% cocoa");
    }

    #[test]
    fn test_custom_ingredients_scoped_per_user() {
        let db = test_db();
        db.insert_custom_ingredient(1, "Unicorn Dust", IngredientKind::Food)
            .unwrap();
        db.insert_custom_ingredient(2, "Unicorn Dust", IngredientKind::Food)
            .unwrap();

        assert_eq!(db.list_custom_ingredients(1).unwrap().len(), 1);
        assert_eq!(db.list_custom_ingredients(2).unwrap().len(), 1);
        assert!(db.list_custom_ingredients(3).unwrap().is_empty());
    }
}
