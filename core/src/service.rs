use std::path::Path;

use anyhow::Result;

use crate::db::Database;
use crate::extract::{PageScraper, RecipeExtractor};
use crate::import::{self, RecipeImport};
use crate::models::{
    ExtractedLine, ExtractedRecipe, IngredientView, NewShopIngredient, Recipe, RecipeDetail,
    ShopIngredient, ShoppingList, ShoppingListDetail, ShoppingListItem, StorageDetail,
    StorageKind, StorageLocation, StoredItem, Unit,
};
use crate::resolve::{self, ResolvedIngredient};

/// Facade over the database and the import pipeline. One instance per
/// process, constructed with its database path; callers inject it rather
/// than reaching for a global.
pub struct LarderService {
    db: Database,
}

impl LarderService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // --- Catalog ---

    pub fn add_catalog_ingredient(&self, entry: &NewShopIngredient) -> Result<ShopIngredient> {
        self.db.insert_shop_ingredient(entry)
    }

    pub fn update_catalog_ingredient(
        &self,
        id: i64,
        entry: &NewShopIngredient,
    ) -> Result<ShopIngredient> {
        self.db.update_shop_ingredient(id, entry)
    }

    pub fn search_catalog(&self, query: Option<&str>) -> Result<Vec<ShopIngredient>> {
        self.db.list_shop_ingredients(query)
    }

    // --- Ingredients ---

    pub fn resolve_ingredient(&self, user_id: i64, name: &str) -> Result<ResolvedIngredient> {
        resolve::resolve_one(&self.db, user_id, name)
    }

    pub fn list_ingredients(&self, user_id: i64) -> Result<Vec<IngredientView>> {
        self.db.list_ingredients(user_id)
    }

    // --- Recipes ---

    /// Manual recipe creation goes through the same resolution and
    /// aggregation as a URL import, just without a source URL.
    pub fn create_recipe(
        &self,
        user_id: i64,
        name: &str,
        lines: &[ExtractedLine],
        image: Option<&str>,
    ) -> Result<RecipeImport> {
        import::import_recipe(&self.db, user_id, name, None, lines, image)
    }

    pub fn preview_recipe(
        &self,
        scraper: &dyn PageScraper,
        extractor: &dyn RecipeExtractor,
        url: &str,
    ) -> Result<ExtractedRecipe> {
        import::preview_recipe(scraper, extractor, url)
    }

    pub fn import_recipe_from_url(
        &self,
        scraper: &dyn PageScraper,
        extractor: &dyn RecipeExtractor,
        user_id: i64,
        url: &str,
    ) -> Result<RecipeImport> {
        import::import_recipe_from_url(&self.db, scraper, extractor, user_id, url)
    }

    pub fn list_recipes(&self, user_id: i64) -> Result<Vec<Recipe>> {
        self.db.list_recipes(user_id)
    }

    pub fn get_recipe_detail(&self, user_id: i64, id: i64) -> Result<RecipeDetail> {
        self.db.get_recipe_detail(user_id, id)
    }

    pub fn get_recipe_by_name(&self, user_id: i64, name: &str) -> Result<Recipe> {
        self.db.get_recipe_by_name(user_id, name)
    }

    pub fn delete_recipe(&self, user_id: i64, id: i64) -> Result<()> {
        self.db.delete_recipe(user_id, id)
    }

    // --- Shopping lists ---

    pub fn create_shopping_list(&self, user_id: i64, name: &str) -> Result<ShoppingList> {
        self.db.create_shopping_list(user_id, name)
    }

    pub fn list_shopping_lists(&self, user_id: i64) -> Result<Vec<ShoppingList>> {
        self.db.list_shopping_lists(user_id)
    }

    pub fn get_shopping_list_detail(&self, user_id: i64, id: i64) -> Result<ShoppingListDetail> {
        self.db.get_shopping_list_detail(user_id, id)
    }

    pub fn get_shopping_list_by_name(&self, user_id: i64, name: &str) -> Result<ShoppingList> {
        self.db.get_shopping_list_by_name(user_id, name)
    }

    pub fn delete_shopping_list(&self, user_id: i64, id: i64) -> Result<()> {
        self.db.delete_shopping_list(user_id, id)
    }

    /// Add an item by free-text name. The name goes through the resolver, and
    /// an existing unchecked item with the same ingredient and unit absorbs
    /// the quantity instead of duplicating the row.
    pub fn add_list_item(
        &self,
        user_id: i64,
        list_id: i64,
        name: &str,
        quantity: f64,
        unit: Unit,
    ) -> Result<ShoppingListItem> {
        self.db.get_shopping_list(user_id, list_id)?;
        let resolved = resolve::resolve_one(&self.db, user_id, name)?;
        if let Some(existing) =
            self.db
                .find_unchecked_list_item(list_id, resolved.ingredient_id, unit)?
        {
            return self.db.add_quantity_to_list_item(existing.id, quantity);
        }
        self.db
            .insert_list_item(user_id, list_id, resolved.ingredient_id, quantity, unit)
    }

    /// Merge a recipe's lines into a shopping list: ingredient+unit matches
    /// add to the existing unchecked item, everything else becomes a new item.
    pub fn add_recipe_to_list(
        &self,
        user_id: i64,
        list_id: i64,
        recipe_id: i64,
    ) -> Result<ShoppingListDetail> {
        self.db.get_shopping_list(user_id, list_id)?;
        let recipe = self.db.get_recipe_detail(user_id, recipe_id)?;
        for ri in &recipe.ingredients {
            if let Some(existing) =
                self.db
                    .find_unchecked_list_item(list_id, ri.ingredient_id, ri.unit)?
            {
                self.db.add_quantity_to_list_item(existing.id, ri.quantity)?;
            } else {
                self.db
                    .insert_list_item(user_id, list_id, ri.ingredient_id, ri.quantity, ri.unit)?;
            }
        }
        self.db.get_shopping_list_detail(user_id, list_id)
    }

    pub fn set_list_item_checked(&self, user_id: i64, item_id: i64, checked: bool) -> Result<bool> {
        self.db.set_list_item_checked(user_id, item_id, checked)
    }

    pub fn delete_list_item(&self, user_id: i64, item_id: i64) -> Result<bool> {
        self.db.delete_list_item(user_id, item_id)
    }

    // --- Storage ---

    pub fn create_storage_location(
        &self,
        user_id: i64,
        name: &str,
        kind: StorageKind,
    ) -> Result<StorageLocation> {
        self.db.create_storage_location(user_id, name, kind)
    }

    pub fn list_storage_locations(&self, user_id: i64) -> Result<Vec<StorageLocation>> {
        self.db.list_storage_locations(user_id)
    }

    pub fn get_storage_detail(&self, user_id: i64, id: i64) -> Result<StorageDetail> {
        self.db.get_storage_detail(user_id, id)
    }

    pub fn get_storage_location_by_name(&self, user_id: i64, name: &str) -> Result<StorageLocation> {
        self.db.get_storage_location_by_name(user_id, name)
    }

    pub fn delete_storage_location(&self, user_id: i64, id: i64) -> Result<()> {
        self.db.delete_storage_location(user_id, id)
    }

    /// Store an item by free-text name in one of the user's locations.
    pub fn store_item(
        &self,
        user_id: i64,
        location_id: i64,
        name: &str,
        quantity: f64,
        unit: Unit,
    ) -> Result<StoredItem> {
        self.db.get_storage_location(user_id, location_id)?;
        let resolved = resolve::resolve_one(&self.db, user_id, name)?;
        self.db
            .insert_stored_item(user_id, location_id, resolved.ingredient_id, quantity, unit)
    }

    pub fn move_stored_item(
        &self,
        user_id: i64,
        item_id: i64,
        dest_location_id: i64,
    ) -> Result<StoredItem> {
        self.db.move_stored_item(user_id, item_id, dest_location_id)
    }

    pub fn set_stored_item_quantity(
        &self,
        user_id: i64,
        item_id: i64,
        quantity: f64,
    ) -> Result<StoredItem> {
        self.db.set_stored_item_quantity(user_id, item_id, quantity)
    }

    pub fn delete_stored_item(&self, user_id: i64, item_id: i64) -> Result<bool> {
        self.db.delete_stored_item(user_id, item_id)
    }
}
