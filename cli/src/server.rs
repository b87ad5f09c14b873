use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::extraction::{ExtractServiceClient, PageFetchClient};
use larder_core::import::{self, RecipeImport};
use larder_core::models::{
    ExtractedLine, ExtractedRecipe, IngredientKind, NewShopIngredient, StorageKind, Unit,
};
use larder_core::service::LarderService;

const BODY_LIMIT: usize = 2 * 1024 * 1024; // 2 MB

#[derive(Clone)]
struct AppState {
    svc: Arc<Mutex<LarderService>>,
    scraper: Arc<PageFetchClient>,
    extractor: Arc<ExtractServiceClient>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct UserQuery {
    user_id: i64,
}

#[derive(Deserialize)]
struct CatalogQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct PreviewRequest {
    url: String,
}

#[derive(Deserialize)]
struct ImportRecipeRequest {
    user_id: i64,
    url: String,
}

#[derive(Deserialize)]
struct LineRequest {
    name: String,
    quantity: f64,
    unit: Unit,
}

#[derive(Deserialize)]
struct CreateRecipeRequest {
    user_id: i64,
    name: String,
    image: Option<String>,
    ingredients: Vec<LineRequest>,
}

#[derive(Deserialize)]
struct ResolveRequest {
    user_id: i64,
    name: String,
}

fn default_storage() -> StorageKind {
    StorageKind::None
}

#[derive(Deserialize)]
struct CreateCatalogRequest {
    name: String,
    kind: IngredientKind,
    #[serde(default = "default_storage")]
    storage: StorageKind,
    category: Option<String>,
}

#[derive(Deserialize)]
struct CreateListRequest {
    user_id: i64,
    name: String,
}

#[derive(Deserialize)]
struct AddListItemRequest {
    user_id: i64,
    name: String,
    quantity: f64,
    unit: Unit,
}

#[derive(Deserialize)]
struct UpdateListItemRequest {
    user_id: i64,
    checked: bool,
}

#[derive(Deserialize)]
struct AddRecipeToListRequest {
    user_id: i64,
    recipe_id: i64,
}

#[derive(Deserialize)]
struct CreateLocationRequest {
    user_id: i64,
    name: String,
    kind: StorageKind,
}

#[derive(Deserialize)]
struct AddStoredItemRequest {
    user_id: i64,
    name: String,
    quantity: f64,
    unit: Unit,
}

#[derive(Deserialize)]
struct UpdateStoredItemRequest {
    user_id: i64,
    location_id: Option<i64>,
    quantity: Option<f64>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                eprintln!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Import handlers ---

/// Scrape and extract, mapping collaborator failures to 502 and an unusable
/// extraction to 400. Shared by preview and import.
async fn fetch_extracted(state: &AppState, url: &str) -> Result<ExtractedRecipe, ApiError> {
    let page = state
        .scraper
        .scrape_async(url)
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to preview recipe: {e:#}")))?;
    let extracted = state
        .extractor
        .extract_async(&page.text, &page.images)
        .await
        .map_err(|e| ApiError::Upstream(format!("Failed to preview recipe: {e:#}")))?;
    import::validate_extracted(&extracted, url)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    Ok(extracted)
}

async fn preview_recipe(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<ExtractedRecipe>, ApiError> {
    let extracted = fetch_extracted(&state, &req.url).await?;
    Ok(Json(extracted))
}

async fn import_recipe(
    State(state): State<AppState>,
    Json(req): Json<ImportRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeImport>), ApiError> {
    let extracted = fetch_extracted(&state, &req.url).await?;
    let image = extracted.images.first().map(String::as_str);

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let result = import::import_recipe(
        svc.db(),
        req.user_id,
        &extracted.name,
        Some(&req.url),
        &extracted.ingredients,
        image,
    )
    .context("failed to import recipe")?;
    Ok((StatusCode::CREATED, Json(result)))
}

// --- Recipe handlers ---

async fn create_recipe(
    State(state): State<AppState>,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeImport>), ApiError> {
    if req.ingredients.is_empty() {
        return Err(ApiError::BadRequest(
            "ingredients must not be empty".to_string(),
        ));
    }
    for line in &req.ingredients {
        if line.quantity <= 0.0 {
            return Err(ApiError::BadRequest(
                "ingredient quantity must be greater than 0".to_string(),
            ));
        }
    }
    let lines: Vec<ExtractedLine> = req
        .ingredients
        .iter()
        .map(|l| ExtractedLine {
            name: l.name.clone(),
            quantity: l.quantity,
            unit: l.unit,
        })
        .collect();

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let result = svc
        .create_recipe(req.user_id, &req.name, &lines, req.image.as_deref())
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let recipes = svc.list_recipes(params.user_id).context("database error")?;
    let value = serde_json::to_value(recipes).context("failed to serialize recipes")?;
    Ok(Json(value))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let detail = svc
        .get_recipe_detail(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    let value = serde_json::to_value(detail).context("failed to serialize recipe")?;
    Ok(Json(value))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_recipe(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Recipe {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Catalog handlers ---

async fn list_catalog(
    State(state): State<AppState>,
    Query(params): Query<CatalogQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entries = svc
        .search_catalog(params.q.as_deref())
        .context("database error")?;
    let value = serde_json::to_value(entries).context("failed to serialize catalog")?;
    Ok(Json(value))
}

async fn create_catalog_entry(
    State(state): State<AppState>,
    Json(req): Json<CreateCatalogRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = svc
        .add_catalog_ingredient(&NewShopIngredient {
            name: req.name,
            kind: req.kind,
            storage: req.storage,
            category: req.category,
        })
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(entry).context("failed to serialize catalog entry")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn update_catalog_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CreateCatalogRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = svc
        .update_catalog_ingredient(
            id,
            &NewShopIngredient {
                name: req.name,
                kind: req.kind,
                storage: req.storage,
                category: req.category,
            },
        )
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(entry).context("failed to serialize catalog entry")?;
    Ok(Json(value))
}

// --- Ingredient handlers ---

async fn list_ingredients(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let views = svc
        .list_ingredients(params.user_id)
        .context("database error")?;
    let value = serde_json::to_value(views).context("failed to serialize ingredients")?;
    Ok(Json(value))
}

async fn resolve_ingredient(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let resolved = svc
        .resolve_ingredient(req.user_id, &req.name)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(resolved).context("failed to serialize resolution")?;
    Ok(Json(value))
}

// --- Shopping list handlers ---

async fn create_list(
    State(state): State<AppState>,
    Json(req): Json<CreateListRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let list = svc
        .create_shopping_list(req.user_id, &req.name)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(list).context("failed to serialize list")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_lists(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let lists = svc
        .list_shopping_lists(params.user_id)
        .context("database error")?;
    let value = serde_json::to_value(lists).context("failed to serialize lists")?;
    Ok(Json(value))
}

async fn get_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let detail = svc
        .get_shopping_list_detail(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Shopping list {id} not found")))?;
    let value = serde_json::to_value(detail).context("failed to serialize list")?;
    Ok(Json(value))
}

async fn delete_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_shopping_list(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Shopping list {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_list_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddListItemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.quantity <= 0.0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_shopping_list_detail(req.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Shopping list {id} not found")))?;
    let item = svc
        .add_list_item(req.user_id, id, &req.name, req.quantity, req.unit)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(item).context("failed to serialize item")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn update_list_item(
    State(state): State<AppState>,
    Path((_list_id, item_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateListItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if svc
        .set_list_item_checked(req.user_id, item_id, req.checked)
        .context("database error")?
    {
        Ok(Json(
            serde_json::json!({ "item_id": item_id, "checked": req.checked }),
        ))
    } else {
        Err(ApiError::NotFound(format!(
            "Shopping list item {item_id} not found"
        )))
    }
}

async fn delete_list_item(
    State(state): State<AppState>,
    Path((_list_id, item_id)): Path<(i64, i64)>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if svc
        .delete_list_item(params.user_id, item_id)
        .context("database error")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Shopping list item {item_id} not found"
        )))
    }
}

async fn add_recipe_to_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddRecipeToListRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let detail = svc
        .add_recipe_to_list(req.user_id, id, req.recipe_id)
        .map_err(|e| ApiError::NotFound(format!("{e}")))?;
    let value = serde_json::to_value(detail).context("failed to serialize list")?;
    Ok(Json(value))
}

// --- Storage handlers ---

async fn create_location(
    State(state): State<AppState>,
    Json(req): Json<CreateLocationRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let location = svc
        .create_storage_location(req.user_id, &req.name, req.kind)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(location).context("failed to serialize location")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn list_locations(
    State(state): State<AppState>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let locations = svc
        .list_storage_locations(params.user_id)
        .context("database error")?;
    let value = serde_json::to_value(locations).context("failed to serialize locations")?;
    Ok(Json(value))
}

async fn get_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let detail = svc
        .get_storage_detail(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Storage location {id} not found")))?;
    let value = serde_json::to_value(detail).context("failed to serialize location")?;
    Ok(Json(value))
}

async fn delete_location(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.delete_storage_location(params.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Storage location {id} not found")))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_stored_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddStoredItemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    if req.quantity <= 0.0 {
        return Err(ApiError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    svc.get_storage_detail(req.user_id, id)
        .map_err(|_| ApiError::NotFound(format!("Storage location {id} not found")))?;
    let item = svc
        .store_item(req.user_id, id, &req.name, req.quantity, req.unit)
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;
    let value = serde_json::to_value(item).context("failed to serialize item")?;
    Ok((StatusCode::CREATED, Json(value)))
}

async fn update_stored_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateStoredItemRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if req.location_id.is_none() && req.quantity.is_none() {
        return Err(ApiError::BadRequest(
            "At least one of location_id or quantity must be provided".to_string(),
        ));
    }
    if let Some(quantity) = req.quantity {
        if quantity <= 0.0 {
            return Err(ApiError::BadRequest(
                "quantity must be greater than 0".to_string(),
            ));
        }
    }

    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut item = None;
    if let Some(dest) = req.location_id {
        item = Some(
            svc.move_stored_item(req.user_id, item_id, dest)
                .map_err(|_| ApiError::NotFound(format!("Stored item {item_id} not found")))?,
        );
    }
    if let Some(quantity) = req.quantity {
        item = Some(
            svc.set_stored_item_quantity(req.user_id, item_id, quantity)
                .map_err(|_| ApiError::NotFound(format!("Stored item {item_id} not found")))?,
        );
    }
    let value = serde_json::to_value(item).context("failed to serialize item")?;
    Ok(Json(value))
}

async fn delete_stored_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Query(params): Query<UserQuery>,
) -> Result<StatusCode, ApiError> {
    let svc = state
        .svc
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    if svc
        .delete_stored_item(params.user_id, item_id)
        .context("database error")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!(
            "Stored item {item_id} not found"
        )))
    }
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes/preview", post(preview_recipe))
        .route("/api/recipes/import", post(import_recipe))
        .route("/api/recipes", post(create_recipe).get(list_recipes))
        .route("/api/recipes/{id}", get(get_recipe).delete(delete_recipe))
        .route("/api/catalog", get(list_catalog).post(create_catalog_entry))
        .route("/api/catalog/{id}", put(update_catalog_entry))
        .route("/api/ingredients", get(list_ingredients))
        .route("/api/ingredients/resolve", post(resolve_ingredient))
        .route("/api/lists", post(create_list).get(list_lists))
        .route("/api/lists/{id}", get(get_list).delete(delete_list))
        .route("/api/lists/{id}/items", post(add_list_item))
        .route(
            "/api/lists/{id}/items/{item_id}",
            put(update_list_item).delete(delete_list_item),
        )
        .route("/api/lists/{id}/recipes", post(add_recipe_to_list))
        .route("/api/storage", post(create_location).get(list_locations))
        .route(
            "/api/storage/{id}",
            get(get_location).delete(delete_location),
        )
        .route("/api/storage/{id}/items", post(add_stored_item))
        .route(
            "/api/storage/items/{item_id}",
            put(update_stored_item).delete(delete_stored_item),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(
    svc: LarderService,
    extract_url: &str,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        svc: Arc::new(Mutex::new(svc)),
        scraper: Arc::new(PageFetchClient::new()),
        extractor: Arc::new(ExtractServiceClient::new(extract_url)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {}...{} (see api_key file in data directory)",
            &key[..4],
            &key[key.len() - 4..],
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
