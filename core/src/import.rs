use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use crate::db::Database;
use crate::extract::{PageScraper, RecipeExtractor};
use crate::models::{ExtractedLine, ExtractedRecipe, NewRecipeLine, RecipeDetail, Unit};
use crate::resolve::{self, Classification, CustomSnapshot};

/// Image applied to imported recipes when the page yielded no candidate.
pub const RECIPE_IMAGE_PLACEHOLDER: &str = "/images/recipe-placeholder.png";

/// A persisted recipe plus the per-name outcome of resolution, so the caller
/// can tell the user which names were recognized and which were invented.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeImport {
    pub recipe: RecipeDetail,
    pub matched_names: Vec<String>,
    pub existing_custom_names: Vec<String>,
    pub new_custom_names: Vec<String>,
}

/// Turn extracted ingredient lines into a persisted recipe with
/// deduplicated, quantity-merged lines.
///
/// Lines are resolved strictly in input order against one custom-ingredient
/// snapshot. Lines resolving to the same ingredient merge their quantities
/// when the unit matches; a later line with a different unit contributes
/// nothing. The recipe row is only created once every line has resolved, so
/// a failure mid-way persists no recipe, only find-or-create ingredient
/// rows, which are harmless on retry.
pub fn import_recipe(
    db: &Database,
    user_id: i64,
    name: &str,
    original_url: Option<&str>,
    lines: &[ExtractedLine],
    image: Option<&str>,
) -> Result<RecipeImport> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Recipe name must not be empty");
    }
    if lines.is_empty() {
        bail!("Recipe must have at least one ingredient");
    }

    let mut snapshot = CustomSnapshot::load(db, user_id)?;

    let mut order: Vec<i64> = Vec::new();
    let mut merged: HashMap<i64, (f64, Unit)> = HashMap::new();
    let mut matched_names: Vec<String> = Vec::new();
    let mut existing_custom_names: Vec<String> = Vec::new();
    let mut new_custom_names: Vec<String> = Vec::new();

    for line in lines {
        let resolved = resolve::resolve_name(db, user_id, &line.name, &mut snapshot)?;

        match merged.entry(resolved.ingredient_id) {
            std::collections::hash_map::Entry::Occupied(mut entry) => {
                let (quantity, unit) = entry.get_mut();
                if *unit == line.unit {
                    *quantity += line.quantity;
                }
                // Mismatched unit: the line is dropped, the first entry stands.
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert((line.quantity, line.unit));
                order.push(resolved.ingredient_id);
            }
        }

        let bucket = match resolved.classification {
            Classification::MatchedCatalog => &mut matched_names,
            Classification::ExistingCustom => &mut existing_custom_names,
            Classification::NewCustom => &mut new_custom_names,
        };
        if !bucket.contains(&resolved.display_name) {
            bucket.push(resolved.display_name);
        }
    }

    let recipe_lines: Vec<NewRecipeLine> = order
        .iter()
        .map(|id| {
            let (quantity, unit) = merged[id];
            NewRecipeLine {
                ingredient_id: *id,
                quantity,
                unit,
            }
        })
        .collect();

    let image = match image.map(str::trim).filter(|s| !s.is_empty()) {
        Some(url) => url,
        None => RECIPE_IMAGE_PLACEHOLDER,
    };

    let recipe = db.create_recipe(user_id, name, original_url, Some(image), &recipe_lines)?;

    Ok(RecipeImport {
        recipe,
        matched_names,
        existing_custom_names,
        new_custom_names,
    })
}

/// An extraction yielding no name or no ingredients is a failure, never a
/// degenerate persisted recipe.
pub fn validate_extracted(extracted: &ExtractedRecipe, url: &str) -> Result<()> {
    if extracted.name.trim().is_empty() || extracted.ingredients.is_empty() {
        bail!("Could not extract a recipe name or ingredients from {url}");
    }
    Ok(())
}

/// Scrape a URL and run structured extraction, without persisting anything.
pub fn preview_recipe(
    scraper: &dyn PageScraper,
    extractor: &dyn RecipeExtractor,
    url: &str,
) -> Result<ExtractedRecipe> {
    let page = scraper.scrape(url).context("Failed to preview recipe")?;
    let extracted = extractor
        .extract(&page.text, &page.images)
        .context("Failed to preview recipe")?;
    validate_extracted(&extracted, url)?;
    Ok(extracted)
}

/// Full URL import: preview, then persist with the source URL and the first
/// candidate image.
pub fn import_recipe_from_url(
    db: &Database,
    scraper: &dyn PageScraper,
    extractor: &dyn RecipeExtractor,
    user_id: i64,
    url: &str,
) -> Result<RecipeImport> {
    let extracted = preview_recipe(scraper, extractor, url)?;
    let image = extracted.images.first().map(String::as_str);
    import_recipe(
        db,
        user_id,
        &extracted.name,
        Some(url),
        &extracted.ingredients,
        image,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        IngredientKind, NewShopIngredient, ScrapedPage, StorageKind,
    };
    use anyhow::anyhow;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.insert_shop_ingredient(&NewShopIngredient {
            name: "Plain flour".to_string(),
            kind: IngredientKind::Food,
            storage: StorageKind::Pantry,
            category: None,
        })
        .unwrap();
        db
    }

    fn line(name: &str, quantity: f64, unit: Unit) -> ExtractedLine {
        ExtractedLine {
            name: name.to_string(),
            quantity,
            unit,
        }
    }

    #[test]
    fn test_quantities_merge_on_matching_unit() {
        let db = test_db();
        let lines = vec![line("Sugar", 100.0, Unit::G), line("Sugar", 50.0, Unit::G)];
        let import = import_recipe(&db, 1, "Syrup", None, &lines, None).unwrap();

        assert_eq!(import.recipe.ingredients.len(), 1);
        let merged = &import.recipe.ingredients[0];
        assert!((merged.quantity - 150.0).abs() < f64::EPSILON);
        assert_eq!(merged.unit, Unit::G);
    }

    #[test]
    fn test_mismatched_unit_is_dropped() {
        let db = test_db();
        let lines = vec![line("Milk", 200.0, Unit::Ml), line("Milk", 1.0, Unit::Piece)];
        let import = import_recipe(&db, 1, "Porridge", None, &lines, None).unwrap();

        assert_eq!(import.recipe.ingredients.len(), 1);
        let kept = &import.recipe.ingredients[0];
        assert!((kept.quantity - 200.0).abs() < f64::EPSILON);
        assert_eq!(kept.unit, Unit::Ml);
    }

    #[test]
    fn test_empty_lines_fail_closed() {
        let db = test_db();
        assert!(import_recipe(&db, 1, "Nothing", None, &[], None).is_err());
        assert!(db.list_recipes(1).unwrap().is_empty());
    }

    #[test]
    fn test_empty_name_fails_closed() {
        let db = test_db();
        let lines = vec![line("Sugar", 100.0, Unit::G)];
        assert!(import_recipe(&db, 1, "  ", None, &lines, None).is_err());
        assert!(db.list_recipes(1).unwrap().is_empty());
    }

    #[test]
    fn test_placeholder_image_applied() {
        let db = test_db();
        let lines = vec![line("Sugar", 100.0, Unit::G)];
        let import = import_recipe(&db, 1, "Syrup", None, &lines, None).unwrap();
        assert_eq!(import.recipe.image.as_deref(), Some(RECIPE_IMAGE_PLACEHOLDER));

        let with_image =
            import_recipe(&db, 1, "Syrup 2", None, &lines, Some("https://x/y.jpg")).unwrap();
        assert_eq!(with_image.recipe.image.as_deref(), Some("https://x/y.jpg"));
    }

    #[test]
    fn test_classification_lists_deduplicated() {
        let db = test_db();
        let lines = vec![
            line("Plain flour", 200.0, Unit::G),
            line("plain FLOUR", 50.0, Unit::G),
            line("Unicorn Dust", 1.0, Unit::Tsp),
            line("unicorn dust", 2.0, Unit::Tsp),
        ];
        let import = import_recipe(&db, 1, "Odd cake", None, &lines, None).unwrap();

        assert_eq!(import.matched_names, vec!["Plain flour"]);
        assert_eq!(import.new_custom_names, vec!["Unicorn Dust"]);
        assert!(import.existing_custom_names.is_empty());
    }

    #[test]
    fn test_every_name_lands_in_exactly_one_list() {
        let db = test_db();
        db.insert_custom_ingredient(1, "Truffle Oil", IngredientKind::Food)
            .unwrap();
        let lines = vec![
            line("Plain flour", 200.0, Unit::G),
            line("Truffle Oil", 1.0, Unit::Tbsp),
            line("Unicorn Dust", 1.0, Unit::Tsp),
        ];
        let import = import_recipe(&db, 1, "Everything", None, &lines, None).unwrap();

        let total = import.matched_names.len()
            + import.existing_custom_names.len()
            + import.new_custom_names.len();
        assert_eq!(total, 3);
        assert_eq!(import.matched_names, vec!["Plain flour"]);
        assert_eq!(import.existing_custom_names, vec!["Truffle Oil"]);
        assert_eq!(import.new_custom_names, vec!["Unicorn Dust"]);
    }

    #[test]
    fn test_end_to_end_flour_and_unicorn_dust() {
        let db = test_db();
        let lines = vec![
            line("Plain flour", 200.0, Unit::G),
            line("Unicorn Dust", 1.0, Unit::Tsp),
            line("plain FLOUR", 50.0, Unit::G),
        ];
        let import = import_recipe(&db, 1, "Fairy bread", None, &lines, None).unwrap();

        assert_eq!(import.recipe.ingredients.len(), 2);
        let flour = import
            .recipe
            .ingredients
            .iter()
            .find(|i| i.name.as_deref() == Some("Plain flour"))
            .unwrap();
        assert!((flour.quantity - 250.0).abs() < f64::EPSILON);
        assert_eq!(flour.unit, Unit::G);

        let dust = import
            .recipe
            .ingredients
            .iter()
            .find(|i| i.name.as_deref() == Some("Unicorn Dust"))
            .unwrap();
        assert!((dust.quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(dust.unit, Unit::Tsp);

        assert_eq!(import.matched_names, vec!["Plain flour"]);
        assert_eq!(import.new_custom_names, vec!["Unicorn Dust"]);
        assert!(import.existing_custom_names.is_empty());
    }

    #[test]
    fn test_reimport_reuses_rows() {
        let db = test_db();
        let lines = vec![
            line("Plain flour", 200.0, Unit::G),
            line("Unicorn Dust", 1.0, Unit::Tsp),
        ];
        let first = import_recipe(&db, 1, "Fairy bread", None, &lines, None).unwrap();
        let second = import_recipe(&db, 1, "Fairy bread again", None, &lines, None).unwrap();

        // Two recipes, but the same underlying ingredient rows
        let first_ids: Vec<i64> = first.recipe.ingredients.iter().map(|i| i.ingredient_id).collect();
        let second_ids: Vec<i64> = second.recipe.ingredients.iter().map(|i| i.ingredient_id).collect();
        assert_eq!(first_ids, second_ids);
        assert_eq!(db.list_custom_ingredients(1).unwrap().len(), 1);

        // The second import sees the custom entry as pre-existing
        assert_eq!(second.existing_custom_names, vec!["Unicorn Dust"]);
        assert!(second.new_custom_names.is_empty());
    }

    // --- URL preview / import ---

    struct FixtureScraper {
        fail: bool,
    }

    impl PageScraper for FixtureScraper {
        fn scrape(&self, _url: &str) -> Result<ScrapedPage> {
            if self.fail {
                return Err(anyhow!("connection refused"));
            }
            Ok(ScrapedPage {
                text: "Fairy bread. 200 g plain flour, 1 tsp unicorn dust.".to_string(),
                images: vec!["https://example.com/fairy.jpg".to_string()],
            })
        }
    }

    struct FixtureExtractor {
        recipe: ExtractedRecipe,
    }

    impl RecipeExtractor for FixtureExtractor {
        fn extract(&self, _text: &str, _images: &[String]) -> Result<ExtractedRecipe> {
            Ok(self.recipe.clone())
        }
    }

    fn fixture_extractor() -> FixtureExtractor {
        FixtureExtractor {
            recipe: ExtractedRecipe {
                name: "Fairy bread".to_string(),
                ingredients: vec![
                    line("Plain flour", 200.0, Unit::G),
                    line("Unicorn Dust", 1.0, Unit::Tsp),
                ],
                images: vec![],
            },
        }
    }

    #[test]
    fn test_import_from_url_records_source() {
        let db = test_db();
        let scraper = FixtureScraper { fail: false };
        let extractor = fixture_extractor();

        let import =
            import_recipe_from_url(&db, &scraper, &extractor, 1, "https://example.com/fairy")
                .unwrap();
        assert_eq!(
            import.recipe.original_url.as_deref(),
            Some("https://example.com/fairy")
        );
        assert_eq!(import.recipe.name, "Fairy bread");
        assert_eq!(import.recipe.ingredients.len(), 2);
    }

    #[test]
    fn test_preview_failure_persists_nothing() {
        let db = test_db();
        let scraper = FixtureScraper { fail: true };
        let extractor = fixture_extractor();

        let err = import_recipe_from_url(&db, &scraper, &extractor, 1, "https://example.com/x")
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to preview recipe"));
        assert!(db.list_recipes(1).unwrap().is_empty());
        assert!(db.list_custom_ingredients(1).unwrap().is_empty());
    }

    #[test]
    fn test_empty_extraction_fails_closed() {
        let db = test_db();
        let scraper = FixtureScraper { fail: false };

        let nameless = FixtureExtractor {
            recipe: ExtractedRecipe {
                name: String::new(),
                ingredients: vec![line("Plain flour", 200.0, Unit::G)],
                images: vec![],
            },
        };
        assert!(
            import_recipe_from_url(&db, &scraper, &nameless, 1, "https://example.com/x").is_err()
        );

        let ingredientless = FixtureExtractor {
            recipe: ExtractedRecipe {
                name: "Fairy bread".to_string(),
                ingredients: vec![],
                images: vec![],
            },
        };
        assert!(
            import_recipe_from_url(&db, &scraper, &ingredientless, 1, "https://example.com/x")
                .is_err()
        );
        assert!(db.list_recipes(1).unwrap().is_empty());
    }

    #[test]
    fn test_first_candidate_image_used() {
        let db = test_db();
        let scraper = FixtureScraper { fail: false };
        let mut extractor = fixture_extractor();
        extractor.recipe.images = vec![
            "https://example.com/better.jpg".to_string(),
            "https://example.com/worse.jpg".to_string(),
        ];

        let import =
            import_recipe_from_url(&db, &scraper, &extractor, 1, "https://example.com/fairy")
                .unwrap();
        assert_eq!(
            import.recipe.image.as_deref(),
            Some("https://example.com/better.jpg")
        );
    }

    #[test]
    fn test_no_candidate_image_falls_back_to_placeholder() {
        let db = test_db();
        let scraper = FixtureScraper { fail: false };
        let extractor = fixture_extractor();

        let import =
            import_recipe_from_url(&db, &scraper, &extractor, 1, "https://example.com/fairy")
                .unwrap();
        assert_eq!(import.recipe.image.as_deref(), Some(RECIPE_IMAGE_PLACEHOLDER));
    }
}
