use anyhow::Result;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use larder_core::service::LarderService;

use super::helpers::{format_quantity, json_error, parse_ingredient_spec, truncate};

pub(crate) fn cmd_shopping_create(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let list = svc.create_shopping_list(user, name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        let lname = &list.name;
        let id = list.id;
        println!("Created shopping list: {lname} (id: {id})");
        println!("Add items with: larder shopping add \"{lname}\" \"Milk=1l\"");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_list(svc: &LarderService, user: i64, json: bool) -> Result<()> {
    let lists = svc.list_shopping_lists(user)?;
    if lists.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No shopping lists found");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
        return Ok(());
    }

    for list in &lists {
        let detail = svc.get_shopping_list_detail(user, list.id)?;
        let open = detail.items.iter().filter(|i| !i.checked).count();
        let total = detail.items.len();
        let name = &list.name;
        let id = list.id;
        println!("{name} (id: {id}) — {open}/{total} items open");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_show(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = " ")]
        checked: String,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
    }

    let list = svc.get_shopping_list_by_name(user, name)?;
    let detail = svc.get_shopping_list_detail(user, list.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    let lname = &detail.name;
    println!("=== {lname} ===");
    if detail.items.is_empty() {
        println!("  (empty)");
        return Ok(());
    }

    let rows: Vec<ItemRow> = detail
        .items
        .iter()
        .map(|i| ItemRow {
            id: i.id,
            checked: if i.checked { "x".into() } else { " ".into() },
            name: i.name.as_deref().map(|n| truncate(n, 35)).unwrap_or_default(),
            quantity: format_quantity(i.quantity, i.unit),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_shopping_add(
    svc: &LarderService,
    user: i64,
    list_name: &str,
    item_spec: &str,
    json: bool,
) -> Result<()> {
    let list = svc.get_shopping_list_by_name(user, list_name)?;
    let (name, quantity, unit) = parse_ingredient_spec(item_spec)?;
    let item = svc.add_list_item(user, list.id, &name, quantity, unit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let iname = item.name.as_deref().unwrap_or(&name);
        let qty = format_quantity(item.quantity, item.unit);
        println!("{list_name}: {iname} now at {qty}");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_add_recipe(
    svc: &LarderService,
    user: i64,
    list_name: &str,
    recipe_name: &str,
    json: bool,
) -> Result<()> {
    let list = svc.get_shopping_list_by_name(user, list_name)?;
    let recipe = svc.get_recipe_by_name(user, recipe_name)?;
    let detail = svc.add_recipe_to_list(user, list.id, recipe.id)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else {
        let rname = &recipe.name;
        let count = detail.items.len();
        println!("Added {rname} to {list_name} ({count} items on the list)");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_check(
    svc: &LarderService,
    user: i64,
    item_id: i64,
    checked: bool,
    json: bool,
) -> Result<()> {
    if svc.set_list_item_checked(user, item_id, checked)? {
        let verb = if checked { "Checked" } else { "Unchecked" };
        if json {
            println!("{}", serde_json::json!({ "item_id": item_id, "checked": checked }));
        } else {
            println!("{verb} item {item_id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Item {item_id} not found")));
        } else {
            eprintln!("Item {item_id} not found");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_shopping_remove(
    svc: &LarderService,
    user: i64,
    item_id: i64,
    json: bool,
) -> Result<()> {
    if svc.delete_list_item(user, item_id)? {
        if json {
            println!("{}", serde_json::json!({ "removed": item_id }));
        } else {
            println!("Removed item {item_id}");
        }
    } else {
        if json {
            println!("{}", json_error(&format!("Item {item_id} not found")));
        } else {
            eprintln!("Item {item_id} not found");
        }
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_shopping_delete(
    svc: &LarderService,
    user: i64,
    name: &str,
    json: bool,
) -> Result<()> {
    let list = svc.get_shopping_list_by_name(user, name)?;
    svc.delete_shopping_list(user, list.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": list.name }));
    } else {
        let lname = &list.name;
        println!("Deleted shopping list: {lname}");
    }
    Ok(())
}
