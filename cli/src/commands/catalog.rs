use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::{IngredientKind, NewShopIngredient, StorageKind};
use larder_core::service::LarderService;

use super::helpers::truncate;

pub(crate) fn cmd_catalog_add(
    svc: &LarderService,
    name: &str,
    kind: IngredientKind,
    storage: StorageKind,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let entry = svc.add_catalog_ingredient(&NewShopIngredient {
        name: name.to_string(),
        kind,
        storage,
        category,
    })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let id = entry.id;
        let name = &entry.name;
        println!("Added catalog ingredient: {name} (id: {id}, {kind}, stored: {storage})");
    }
    Ok(())
}

pub(crate) fn cmd_catalog_update(
    svc: &LarderService,
    id: i64,
    name: &str,
    kind: IngredientKind,
    storage: StorageKind,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let entry = svc.update_catalog_ingredient(
        id,
        &NewShopIngredient {
            name: name.to_string(),
            kind,
            storage,
            category,
        },
    )?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let name = &entry.name;
        println!("Updated catalog ingredient {id}: {name}");
    }
    Ok(())
}

pub(crate) fn cmd_catalog_list(
    svc: &LarderService,
    search: Option<&str>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct CatalogRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Kind")]
        kind: String,
        #[tabled(rename = "Stored")]
        storage: String,
        #[tabled(rename = "Category")]
        category: String,
    }

    let entries = svc.search_catalog(search)?;
    if entries.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No catalog ingredients found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let rows: Vec<CatalogRow> = entries
        .iter()
        .map(|e| CatalogRow {
            id: e.id,
            name: truncate(&e.name, 35),
            kind: e.kind.to_string(),
            storage: e.storage.to_string(),
            category: e.category.as_deref().map(|c| truncate(c, 20)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(0..1)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
