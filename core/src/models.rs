use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// What a catalog or custom ingredient is, at the coarsest level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientKind {
    Food,
    Drink,
    Condiment,
    Cleaning,
    Household,
}

impl IngredientKind {
    pub const ALL: &'static [&'static str] =
        &["food", "drink", "condiment", "cleaning", "household"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Drink => "drink",
            Self::Condiment => "condiment",
            Self::Cleaning => "cleaning",
            Self::Household => "household",
        }
    }
}

impl std::str::FromStr for IngredientKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "food" => Ok(Self::Food),
            "drink" => Ok(Self::Drink),
            "condiment" => Ok(Self::Condiment),
            "cleaning" => Ok(Self::Cleaning),
            "household" => Ok(Self::Household),
            _ => bail!(
                "Invalid ingredient kind '{s}'. Must be one of: {}",
                Self::ALL.join(", ")
            ),
        }
    }
}

impl std::fmt::Display for IngredientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an ingredient is kept. `None` marks catalog entries with no
/// meaningful storage (e.g. household goods).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Pantry,
    Fridge,
    Freezer,
    None,
}

impl StorageKind {
    pub const ALL: &'static [&'static str] = &["pantry", "fridge", "freezer", "none"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pantry => "pantry",
            Self::Fridge => "fridge",
            Self::Freezer => "freezer",
            Self::None => "none",
        }
    }
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pantry" => Ok(Self::Pantry),
            "fridge" => Ok(Self::Fridge),
            "freezer" => Ok(Self::Freezer),
            "none" => Ok(Self::None),
            _ => bail!(
                "Invalid storage kind '{s}'. Must be one of: {}",
                Self::ALL.join(", ")
            ),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of units carried on recipe lines, shopping-list items, and
/// stored items. No conversion between units is performed anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    G,
    Kg,
    Ml,
    L,
    Tbsp,
    Tsp,
    Piece,
}

impl Unit {
    pub const ALL: &'static [&'static str] = &["g", "kg", "ml", "l", "tbsp", "tsp", "piece"];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::G => "g",
            Self::Kg => "kg",
            Self::Ml => "ml",
            Self::L => "l",
            Self::Tbsp => "tbsp",
            Self::Tsp => "tsp",
            Self::Piece => "piece",
        }
    }
}

impl std::str::FromStr for Unit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "g" => Ok(Self::G),
            "kg" => Ok(Self::Kg),
            "ml" => Ok(Self::Ml),
            "l" => Ok(Self::L),
            "tbsp" => Ok(Self::Tbsp),
            "tsp" => Ok(Self::Tsp),
            "piece" | "pieces" | "pc" => Ok(Self::Piece),
            _ => bail!("Invalid unit '{s}'. Must be one of: {}", Self::ALL.join(", ")),
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared catalog entry. Never owned by a single user; the name is the
/// case-insensitive match key and renames keep the id.
#[derive(Debug, Clone, Serialize)]
pub struct ShopIngredient {
    pub id: i64,
    pub name: String,
    pub kind: IngredientKind,
    pub storage: StorageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewShopIngredient {
    pub name: String,
    pub kind: IngredientKind,
    pub storage: StorageKind,
    pub category: Option<String>,
}

/// Per-user fallback entry created when no catalog match exists. Distinct
/// users may each hold an entry with the same name.
#[derive(Debug, Clone, Serialize)]
pub struct CustomUserIngredient {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: IngredientKind,
    pub created_at: String,
}

/// Which backing entry a user's ingredient points at: exactly one of the
/// shared catalog or the user's own custom entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "id", rename_all = "lowercase")]
pub enum IngredientLink {
    Catalog(i64),
    Custom(i64),
}

impl IngredientLink {
    /// Rebuild a link from the two nullable foreign-key columns. A row with
    /// both or neither set violates the schema CHECK and is rejected.
    pub fn from_columns(catalog: Option<i64>, custom: Option<i64>) -> Result<Self> {
        match (catalog, custom) {
            (Some(id), None) => Ok(Self::Catalog(id)),
            (None, Some(id)) => Ok(Self::Custom(id)),
            (Some(_), Some(_)) => bail!("Ingredient links both a catalog and a custom entry"),
            (None, None) => bail!("Ingredient links neither a catalog nor a custom entry"),
        }
    }

    /// The `(shop_ingredient_id, custom_user_ingredient_id)` column pair.
    #[must_use]
    pub fn columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            Self::Catalog(id) => (Some(id), None),
            Self::Custom(id) => (None, Some(id)),
        }
    }
}

/// The user's pointer to a catalog or custom entry. This is the id that
/// recipes, shopping lists, and storage reference.
#[derive(Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub link: IngredientLink,
    pub created_at: String,
}

/// Joined listing row for a user's ingredients.
#[derive(Debug, Clone, Serialize)]
pub struct IngredientView {
    pub id: i64,
    pub name: String,
    pub kind: IngredientKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageKind>,
    pub custom: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub id: i64,
    pub recipe_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: Unit,
    // Joined field for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewRecipeLine {
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: Unit,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub ingredients: Vec<RecipeIngredient>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingList {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListItem {
    pub id: i64,
    pub list_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: Unit,
    pub checked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShoppingListDetail {
    pub id: i64,
    pub name: String,
    pub items: Vec<ShoppingListItem>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageLocation {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: StorageKind,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    pub id: i64,
    pub location_id: i64,
    pub ingredient_id: i64,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageDetail {
    pub id: i64,
    pub name: String,
    pub kind: StorageKind,
    pub items: Vec<StoredItem>,
}

// --- Extraction collaborator types ---

/// Raw page content as returned by a scrape: visible text plus candidate
/// image URLs found on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedPage {
    pub text: String,
    pub images: Vec<String>,
}

/// One ingredient line as extracted from free text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLine {
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
}

/// Best-effort structured recipe produced by the extraction collaborator.
/// An empty name or empty ingredient list means extraction failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecipe {
    pub name: String,
    pub ingredients: Vec<ExtractedLine>,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Validate a storage-location kind: locations are physical places, so the
/// catalog-only `none` marker is rejected.
pub fn validate_location_kind(kind: StorageKind) -> Result<StorageKind> {
    if kind == StorageKind::None {
        bail!("Storage location kind must be pantry, fridge, or freezer");
    }
    Ok(kind)
}

/// Validate a user-facing entity name: non-empty after trimming.
pub fn validate_name(name: &str, what: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("{what} name must not be empty");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_unit_parse_all() {
        for s in Unit::ALL {
            let unit = Unit::from_str(s).unwrap();
            assert_eq!(unit.as_str(), *s);
        }
    }

    #[test]
    fn test_unit_parse_case_insensitive() {
        assert_eq!(Unit::from_str("TBSP").unwrap(), Unit::Tbsp);
        assert_eq!(Unit::from_str("Kg").unwrap(), Unit::Kg);
    }

    #[test]
    fn test_unit_parse_piece_aliases() {
        assert_eq!(Unit::from_str("pieces").unwrap(), Unit::Piece);
        assert_eq!(Unit::from_str("pc").unwrap(), Unit::Piece);
    }

    #[test]
    fn test_unit_parse_invalid() {
        assert!(Unit::from_str("cup").is_err());
        assert!(Unit::from_str("").is_err());
    }

    #[test]
    fn test_ingredient_kind_parse() {
        assert_eq!(
            IngredientKind::from_str("Condiment").unwrap(),
            IngredientKind::Condiment
        );
        assert!(IngredientKind::from_str("gadget").is_err());
    }

    #[test]
    fn test_storage_kind_parse() {
        assert_eq!(StorageKind::from_str("fridge").unwrap(), StorageKind::Fridge);
        assert!(StorageKind::from_str("attic").is_err());
    }

    #[test]
    fn test_link_from_columns_catalog() {
        let link = IngredientLink::from_columns(Some(7), None).unwrap();
        assert_eq!(link, IngredientLink::Catalog(7));
        assert_eq!(link.columns(), (Some(7), None));
    }

    #[test]
    fn test_link_from_columns_custom() {
        let link = IngredientLink::from_columns(None, Some(3)).unwrap();
        assert_eq!(link, IngredientLink::Custom(3));
        assert_eq!(link.columns(), (None, Some(3)));
    }

    #[test]
    fn test_link_from_columns_rejects_both_and_neither() {
        assert!(IngredientLink::from_columns(Some(1), Some(2)).is_err());
        assert!(IngredientLink::from_columns(None, None).is_err());
    }

    #[test]
    fn test_validate_location_kind() {
        assert!(validate_location_kind(StorageKind::Fridge).is_ok());
        assert!(validate_location_kind(StorageKind::None).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name("  Soup ", "Recipe").unwrap(), "Soup");
        let err = validate_name("   ", "Recipe").unwrap_err();
        assert!(err.to_string().contains("Recipe name"));
    }

    #[test]
    fn test_unit_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Unit::Tbsp).unwrap(), "\"tbsp\"");
        let unit: Unit = serde_json::from_str("\"ml\"").unwrap();
        assert_eq!(unit, Unit::Ml);
    }
}
