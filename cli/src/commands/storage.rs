use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::models::StorageKind;
use larder_core::service::LarderService;

use super::helpers::{format_quantity, json_error, parse_ingredient_spec, truncate};

pub(crate) fn cmd_storage_create(
    svc: &LarderService,
    user: i64,
    name: &str,
    kind: StorageKind,
    json: bool,
) -> Result<()> {
    let location = svc.create_storage_location(user, name, kind)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&location)?);
    } else {
        let lname = &location.name;
        let id = location.id;
        println!("Created storage location: {lname} ({kind}, id: {id})");
    }
    Ok(())
}

pub(crate) fn cmd_storage_list(svc: &LarderService, user: i64, json: bool) -> Result<()> {
    let locations = svc.list_storage_locations(user)?;
    if locations.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No storage locations found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&locations)?);
        return Ok(());
    }

    for location in &locations {
        let detail = svc.get_storage_detail(user, location.id)?;
        let name = &location.name;
        let kind = location.kind;
        let id = location.id;
        let count = detail.items.len();
        println!("{name} ({kind}, id: {id}) — {count} items");
    }
    Ok(())
}

pub(crate) fn cmd_storage_show(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct StoredRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
    }

    let location = svc.get_storage_location_by_name(user, name)?;
    let detail = svc.get_storage_detail(user, location.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let lname = &detail.name;
    let kind = detail.kind;
    println!("=== {lname} ({kind}) ===");
    if detail.items.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    let rows: Vec<StoredRow> = detail
        .items
        .iter()
        .map(|i| StoredRow {
            id: i.id,
            name: i.name.as_deref().map(|n| truncate(n, 35)).unwrap_or_default(),
            quantity: format_quantity(i.quantity, i.unit),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_storage_store(
    svc: &LarderService,
    user: i64,
    location_name: &str,
    item_spec: &str,
    json: bool,
) -> Result<()> {
    let location = svc.get_storage_location_by_name(user, location_name)?;
    let (name, quantity, unit) = parse_ingredient_spec(item_spec)?;
    let item = svc.store_item(user, location.id, &name, quantity, unit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let iname = item.name.as_deref().unwrap_or(&name);
        let qty = format_quantity(item.quantity, item.unit);
        println!("Stored {qty} {iname} in {location_name} (item id: {})", item.id);
    }
    Ok(())
}

pub(crate) fn cmd_storage_move(
    svc: &LarderService,
    user: i64,
    item_id: i64,
    dest_name: &str,
    json: bool,
) -> Result<()> {
    let dest = svc.get_storage_location_by_name(user, dest_name)?;
    let item = svc.move_stored_item(user, item_id, dest.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let iname = item.name.as_deref().unwrap_or("item");
        println!("Moved {iname} to {dest_name}");
    }
    Ok(())
}

pub(crate) fn cmd_storage_set_quantity(
    svc: &LarderService,
    user: i64,
    item_id: i64,
    quantity: f64,
    json: bool,
) -> Result<()> {
    if quantity <= 0.0 {
        anyhow::bail!("Quantity must be greater than 0");
    }
    // The unit stays as stored; only the amount changes
    let current = svc.set_stored_item_quantity(user, item_id, quantity)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&current)?);
    } else {
        let iname = current.name.as_deref().unwrap_or("item");
        let qty = format_quantity(current.quantity, current.unit);
        println!("{iname} now at {qty}");
    }
    Ok(())
}

pub(crate) fn cmd_storage_remove(
    svc: &LarderService,
    user: i64,
    item_id: i64,
    json: bool,
) -> Result<()> {
    if svc.delete_stored_item(user, item_id)? {
        if json {
            println!("{}", serde_json::json!({ "removed": item_id }));
        } else {
            println!("Removed stored item {item_id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Stored item {item_id} not found")));
        } else {
            eprintln!("Stored item {item_id} not found");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_storage_delete(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let location = svc.get_storage_location_by_name(user, name)?;
    svc.delete_storage_location(user, location.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": location.name }));
    } else {
        let lname = &location.name;
        println!("Deleted storage location: {lname}");
    }
    Ok(())
}
