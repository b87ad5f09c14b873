use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::resolve::Classification;
use larder_core::service::LarderService;

use super::helpers::truncate;

pub(crate) fn cmd_ingredient_list(svc: &LarderService, user: i64, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Stored")]
        storage: String,
        #[tabled(rename = "Source")]
        source: String,
    }

    let views = svc.list_ingredients(user)?;
    if views.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No ingredients yet. Import a recipe or add items to a list.");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    let rows: Vec<IngredientRow> = views
        .iter()
        .map(|v| IngredientRow {
            id: v.id,
            name: truncate(&v.name, 35),
            kind: v.kind.to_string(),
            storage: v.storage.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            source: if v.custom { "custom".into() } else { "catalog".into() },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..1)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_ingredient_resolve(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let resolved = svc.resolve_ingredient(user, name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }
    let display = &resolved.display_name;
    let id = resolved.ingredient_id;
    match resolved.classification {
        Classification::MatchedCatalog => {
            println!("Matched catalog entry '{display}' (ingredient id: {id})");
        }
        Classification::ExistingCustom => {
            println!("Reused your custom ingredient '{display}' (ingredient id: {id})");
        }
        Classification::NewCustom => {
            println!("Created custom ingredient '{display}' (ingredient id: {id})");
        }
    }
    Ok(())
}
