mod commands;
mod config;
mod extraction;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_catalog_add, cmd_catalog_list, cmd_catalog_update, cmd_ingredient_list,
    cmd_ingredient_resolve, cmd_recipe_create, cmd_recipe_delete, cmd_recipe_import,
    cmd_recipe_list, cmd_recipe_show, cmd_shopping_add, cmd_shopping_add_recipe,
    cmd_shopping_check, cmd_shopping_create, cmd_shopping_delete, cmd_shopping_list,
    cmd_shopping_remove, cmd_shopping_show, cmd_storage_create, cmd_storage_delete,
    cmd_storage_list, cmd_storage_move, cmd_storage_remove, cmd_storage_set_quantity,
    cmd_storage_show, cmd_storage_store,
};
use crate::config::Config;
use crate::extraction::{ExtractServiceClient, PageFetchClient};
use larder_core::models::{IngredientKind, StorageKind};
use larder_core::service::LarderService;

#[derive(Parser)]
#[command(
    name = "larder",
    version,
    about = "A kitchen manager CLI",
    long_about = "\n\n  ██╗      █████╗ ██████╗ ██████╗ ███████╗██████╗
  ██║     ██╔══██╗██╔══██╗██╔══██╗██╔════╝██╔══██╗
  ██║     ███████║██████╔╝██║  ██║█████╗  ██████╔╝
  ██║     ██╔══██║██╔══██╗██║  ██║██╔══╝  ██╔══██╗
  ███████╗██║  ██║██║  ██║██████╔╝███████╗██║  ██║
  ╚══════╝╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝ ╚══════╝╚═╝  ╚═╝
        recipes, pantry, and shopping lists.
"
)]
struct Cli {
    /// Profile to act as (the server is the multi-user surface; the CLI
    /// defaults to profile 1)
    #[arg(long, global = true, default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the shared ingredient catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
    /// Inspect and resolve your ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage shopping lists
    Shopping {
        #[command(subcommand)]
        command: ShoppingCommands,
    },
    /// Manage storage locations (pantry, fridge, freezer)
    Storage {
        #[command(subcommand)]
        command: StorageCommands,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Add a shared catalog ingredient
    Add {
        /// Ingredient name (unique, case-insensitive)
        name: String,
        /// Kind: food, drink, condiment, cleaning, household
        #[arg(short, long, default_value = "food")]
        kind: IngredientKind,
        /// Storage: pantry, fridge, freezer, none
        #[arg(short, long, default_value = "none")]
        storage: StorageKind,
        /// Optional category label
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a catalog ingredient in place (renames keep the id)
    Update {
        /// Catalog ingredient id
        id: i64,
        /// New name
        name: String,
        /// Kind: food, drink, condiment, cleaning, household
        #[arg(short, long, default_value = "food")]
        kind: IngredientKind,
        /// Storage: pantry, fridge, freezer, none
        #[arg(short, long, default_value = "none")]
        storage: StorageKind,
        /// Optional category label
        #[arg(long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search the catalog
    List {
        /// Search query to filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// List your ingredients (catalog links and custom entries)
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a free-text name to one of your ingredients
    Resolve {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a recipe from ingredient specs
    Create {
        /// Recipe name
        name: String,
        /// Ingredient spec, repeatable (e.g. --ingredient "Plain flour=200g")
        #[arg(short, long = "ingredient")]
        ingredients: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a recipe from a URL via the extraction service
    Import {
        /// Recipe page URL
        url: String,
        /// Show the extracted recipe without saving it
        #[arg(long)]
        preview: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe's ingredients
    Show {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShoppingCommands {
    /// Create a shopping list
    Create {
        /// List name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show all shopping lists
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a shopping list's items
    Show {
        /// List name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item (e.g. "Milk=1l"); same ingredient and unit merge
    Add {
        /// List name
        list: String,
        /// Item spec: "Name=quantity" (bare name means one piece)
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add all of a recipe's ingredients to a list
    AddRecipe {
        /// List name
        list: String,
        /// Recipe name
        recipe: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check off an item
    Check {
        /// Item id (see `larder shopping show`)
        item_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Uncheck an item
    Uncheck {
        /// Item id
        item_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item id
        item_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a shopping list
    Delete {
        /// List name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum StorageCommands {
    /// Create a storage location
    Create {
        /// Location name
        name: String,
        /// Kind: pantry, fridge, freezer
        #[arg(short, long)]
        kind: StorageKind,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List storage locations
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a location's contents
    Show {
        /// Location name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Store an item (e.g. "Peas=400g")
    Store {
        /// Location name
        location: String,
        /// Item spec: "Name=quantity" (bare name means one piece)
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a stored item to another location
    Move {
        /// Stored item id (see `larder storage show`)
        item_id: i64,
        /// Destination location name
        to: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update a stored item's quantity
    SetQuantity {
        /// Stored item id
        item_id: i64,
        /// New quantity (same unit as stored)
        quantity: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a stored item
    Remove {
        /// Stored item id
        item_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a storage location and its contents
    Delete {
        /// Location name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = LarderService::new(&config.db_path)?;
    let user = cli.user;

    match cli.command {
        Commands::Catalog { command } => match command {
            CatalogCommands::Add {
                name,
                kind,
                storage,
                category,
                json,
            } => cmd_catalog_add(&svc, &name, kind, storage, category, json),
            CatalogCommands::Update {
                id,
                name,
                kind,
                storage,
                category,
                json,
            } => cmd_catalog_update(&svc, id, &name, kind, storage, category, json),
            CatalogCommands::List { search, json } => {
                cmd_catalog_list(&svc, search.as_deref(), json)
            }
        },
        Commands::Ingredient { command } => match command {
            IngredientCommands::List { json } => cmd_ingredient_list(&svc, user, json),
            IngredientCommands::Resolve { name, json } => {
                cmd_ingredient_resolve(&svc, user, &name, json)
            }
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Create {
                name,
                ingredients,
                json,
            } => cmd_recipe_create(&svc, user, &name, &ingredients, json),
            RecipeCommands::Import { url, preview, json } => {
                let scraper = PageFetchClient::new();
                let extractor = ExtractServiceClient::new(config.extract_url.clone());
                cmd_recipe_import(&svc, &scraper, &extractor, user, &url, preview, json).await
            }
            RecipeCommands::Show { name, json } => cmd_recipe_show(&svc, user, &name, json),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, user, json),
            RecipeCommands::Delete { name, json } => cmd_recipe_delete(&svc, user, &name, json),
        },
        Commands::Shopping { command } => match command {
            ShoppingCommands::Create { name, json } => cmd_shopping_create(&svc, user, &name, json),
            ShoppingCommands::List { json } => cmd_shopping_list(&svc, user, json),
            ShoppingCommands::Show { name, json } => cmd_shopping_show(&svc, user, &name, json),
            ShoppingCommands::Add { list, item, json } => {
                cmd_shopping_add(&svc, user, &list, &item, json)
            }
            ShoppingCommands::AddRecipe { list, recipe, json } => {
                cmd_shopping_add_recipe(&svc, user, &list, &recipe, json)
            }
            ShoppingCommands::Check { item_id, json } => {
                cmd_shopping_check(&svc, user, item_id, true, json)
            }
            ShoppingCommands::Uncheck { item_id, json } => {
                cmd_shopping_check(&svc, user, item_id, false, json)
            }
            ShoppingCommands::Remove { item_id, json } => {
                cmd_shopping_remove(&svc, user, item_id, json)
            }
            ShoppingCommands::Delete { name, json } => cmd_shopping_delete(&svc, user, &name, json),
        },
        Commands::Storage { command } => match command {
            StorageCommands::Create { name, kind, json } => {
                cmd_storage_create(&svc, user, &name, kind, json)
            }
            StorageCommands::List { json } => cmd_storage_list(&svc, user, json),
            StorageCommands::Show { name, json } => cmd_storage_show(&svc, user, &name, json),
            StorageCommands::Store {
                location,
                item,
                json,
            } => cmd_storage_store(&svc, user, &location, &item, json),
            StorageCommands::Move { item_id, to, json } => {
                cmd_storage_move(&svc, user, item_id, &to, json)
            }
            StorageCommands::SetQuantity {
                item_id,
                quantity,
                json,
            } => cmd_storage_set_quantity(&svc, user, item_id, quantity, json),
            StorageCommands::Remove { item_id, json } => {
                cmd_storage_remove(&svc, user, item_id, json)
            }
            StorageCommands::Delete { name, json } => cmd_storage_delete(&svc, user, &name, json),
        },
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            server::start_server(svc, &config.extract_url, port, &bind, api_key).await
        }
    }
}
