use anyhow::{Context, Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::import::RecipeImport;
use larder_core::models::ExtractedLine;
use larder_core::service::LarderService;

use crate::extraction::{ExtractServiceClient, PageFetchClient};

use super::helpers::{format_quantity, parse_ingredient_spec, truncate};

pub(crate) fn cmd_recipe_create(
    svc: &LarderService,
    user: i64,
    name: &str,
    ingredient_specs: &[String],
    json: bool,
) -> Result<()> {
    if ingredient_specs.is_empty() {
        bail!("Provide at least one --ingredient (e.g. --ingredient \"Plain flour=200g\")");
    }
    let mut lines = Vec::with_capacity(ingredient_specs.len());
    for spec in ingredient_specs {
        let (name, quantity, unit) = parse_ingredient_spec(spec)?;
        lines.push(ExtractedLine {
            name,
            quantity,
            unit,
        });
    }

    let import = svc.create_recipe(user, name, &lines, None)?;
    print_import(&import, json)
}

pub(crate) async fn cmd_recipe_import(
    svc: &LarderService,
    scraper: &PageFetchClient,
    extractor: &ExtractServiceClient,
    user: i64,
    url: &str,
    preview: bool,
    json: bool,
) -> Result<()> {
    let page = scraper
        .scrape_async(url)
        .await
        .context("Failed to preview recipe")?;
    let extracted = extractor
        .extract_async(&page.text, &page.images)
        .await
        .context("Failed to preview recipe")?;
    larder_core::import::validate_extracted(&extracted, url)?;

    if preview {
        if json {
            println!("{}", serde_json::to_string_pretty(&extracted)?);
        } else {
            let name = &extracted.name;
            println!("Preview of {name} ({url}):");
            for line in &extracted.ingredients {
                let qty = format_quantity(line.quantity, line.unit);
                let lname = &line.name;
                println!("  {qty} {lname}");
            }
        }
        return Ok(());
    }

    let image = extracted.images.first().map(String::as_str);
    let import = larder_core::import::import_recipe(
        svc.db(),
        user,
        &extracted.name,
        Some(url),
        &extracted.ingredients,
        image,
    )?;
    print_import(&import, json)
}

fn print_import(import: &RecipeImport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(import)?);
        return Ok(());
    }

    let name = &import.recipe.name;
    let count = import.recipe.ingredients.len();
    let id = import.recipe.id;
    println!("Saved recipe: {name} ({count} ingredients, id: {id})");
    if !import.matched_names.is_empty() {
        println!("  Recognized from catalog: {}", import.matched_names.join(", "));
    }
    if !import.existing_custom_names.is_empty() {
        println!(
            "  Reused your ingredients: {}",
            import.existing_custom_names.join(", ")
        );
    }
    if !import.new_custom_names.is_empty() {
        println!("  New ingredients created: {}", import.new_custom_names.join(", "));
    }
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &LarderService, user: i64, name: &str, json: bool) -> Result<()> {
    let recipe = svc.get_recipe_by_name(user, name)?;
    let detail = svc.get_recipe_detail(user, recipe.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let rname = &detail.name;
    println!("=== {rname} ===");
    if let Some(url) = &detail.original_url {
        println!("  Source: {url}");
    }
    println!("  INGREDIENTS:");
    for line in &detail.ingredients {
        let lname = line.name.as_deref().unwrap_or("?");
        let qty = format_quantity(line.quantity, line.unit);
        println!("    {qty} {lname}");
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &LarderService, user: i64, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let recipes = svc.list_recipes(user)?;
    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 35),
            source: r
                .original_url
                .as_deref()
                .map(|u| truncate(u, 40))
                .unwrap_or_else(|| "manual".into()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..1)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_recipe_delete(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let recipe = svc.get_recipe_by_name(user, name)?;
    svc.delete_recipe(user, recipe.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": recipe.name }));
    } else {
        let rname = &recipe.name;
        println!("Deleted recipe: {rname}");
    }
    Ok(())
}
