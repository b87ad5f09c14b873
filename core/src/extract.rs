use anyhow::Result;
use serde::Deserialize;

use crate::models::{ExtractedLine, ExtractedRecipe, ScrapedPage, Unit};

/// Page scraping provider.
///
/// The CLI implements this with reqwest; tests use fixtures. Called
/// synchronously from the core — async callers should invoke it from a
/// blocking context.
pub trait PageScraper: Send + Sync {
    fn scrape(&self, url: &str) -> Result<ScrapedPage>;
}

/// Structured recipe extraction provider (an extraction service, a rule
/// engine, or a fixture in tests). Returns best-effort data; the import
/// pipeline decides whether the result is usable.
pub trait RecipeExtractor: Send + Sync {
    fn extract(&self, text: &str, images: &[String]) -> Result<ExtractedRecipe>;
}

// --- Extraction service wire types ---

#[derive(Debug, Deserialize)]
pub struct ExtractResponse {
    pub name: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<ExtractedLineData>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractedLineData {
    pub name: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<Unit>,
}

/// Shape a raw extraction response into an `ExtractedRecipe`. Lines without
/// a usable name are dropped; missing quantities default to one piece. The
/// result may still be empty; the pipeline fails closed on that.
#[must_use]
pub fn response_to_recipe(resp: ExtractResponse) -> ExtractedRecipe {
    let ingredients = resp
        .ingredients
        .into_iter()
        .filter_map(line_to_extracted)
        .collect();
    ExtractedRecipe {
        name: resp.name.map(|n| n.trim().to_string()).unwrap_or_default(),
        ingredients,
        images: resp.images,
    }
}

fn line_to_extracted(line: ExtractedLineData) -> Option<ExtractedLine> {
    let name = line.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
    Some(ExtractedLine {
        name,
        quantity: line.quantity.unwrap_or(1.0),
        unit: line.unit.unwrap_or(Unit::Piece),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_response() -> ExtractResponse {
        ExtractResponse {
            name: Some("Pancakes".to_string()),
            ingredients: vec![
                ExtractedLineData {
                    name: Some("Flour".to_string()),
                    quantity: Some(200.0),
                    unit: Some(Unit::G),
                },
                ExtractedLineData {
                    name: Some("Egg".to_string()),
                    quantity: Some(2.0),
                    unit: Some(Unit::Piece),
                },
            ],
            images: vec!["https://example.com/pancakes.jpg".to_string()],
        }
    }

    #[test]
    fn test_response_to_recipe_complete() {
        let recipe = response_to_recipe(full_response());
        assert_eq!(recipe.name, "Pancakes");
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].name, "Flour");
        assert_eq!(recipe.ingredients[0].unit, Unit::G);
        assert_eq!(recipe.images.len(), 1);
    }

    #[test]
    fn test_response_to_recipe_drops_nameless_lines() {
        let mut resp = full_response();
        resp.ingredients.push(ExtractedLineData {
            name: None,
            quantity: Some(1.0),
            unit: Some(Unit::G),
        });
        resp.ingredients.push(ExtractedLineData {
            name: Some("   ".to_string()),
            quantity: Some(1.0),
            unit: Some(Unit::G),
        });
        let recipe = response_to_recipe(resp);
        assert_eq!(recipe.ingredients.len(), 2);
    }

    #[test]
    fn test_response_to_recipe_defaults() {
        let resp = ExtractResponse {
            name: None,
            ingredients: vec![ExtractedLineData {
                name: Some("Lemon".to_string()),
                quantity: None,
                unit: None,
            }],
            images: vec![],
        };
        let recipe = response_to_recipe(resp);
        assert!(recipe.name.is_empty());
        assert!((recipe.ingredients[0].quantity - 1.0).abs() < f64::EPSILON);
        assert_eq!(recipe.ingredients[0].unit, Unit::Piece);
    }

    #[test]
    fn test_response_deserializes_from_json() {
        let json = r#"{
            "name": "Soup",
            "ingredients": [
                {"name": "Carrot", "quantity": 3, "unit": "piece"},
                {"name": "Stock", "quantity": 1.5, "unit": "l"}
            ]
        }"#;
        let resp: ExtractResponse = serde_json::from_str(json).unwrap();
        let recipe = response_to_recipe(resp);
        assert_eq!(recipe.name, "Soup");
        assert_eq!(recipe.ingredients[1].unit, Unit::L);
        assert!(recipe.images.is_empty());
    }
}
