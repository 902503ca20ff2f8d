//! VoltStore - HTTP surface over the storefront core

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{header, StatusCode}, response::{IntoResponse, Response}, routing::{get, post, put}, Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voltstore::admin::{AdminError, MemoryProductSink, ProductDraft, ProductSink};
use voltstore::cart::{FileStore, KeyValueStore};
use voltstore::catalog::{CatalogResolver, CatalogSource, CategoryFilter, StaticCsvSource};
use voltstore::checkout::{CheckoutError, CheckoutForm, MemoryOrderSink, OrderSink, SinkError};
use voltstore::config::Config;
use voltstore::domain::aggregates::OrderStatus;
use voltstore::domain::value_objects::OrderNumber;
use voltstore::infrastructure::PgStore;
use voltstore::recommend::KitPreferences;
use voltstore::session::UserRole;
use voltstore::{StoreError, Storefront};

const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)] pub struct AppState { pub store: Arc<Storefront> }

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let mut sources: Vec<Box<dyn CatalogSource>> = vec![];
    let (orders, products): (Arc<dyn OrderSink>, Arc<dyn ProductSink>) = match &config.database_url {
        Some(url) => match PgStore::connect_lazy(url, config.database_max_connections, DB_ACQUIRE_TIMEOUT) {
            Ok(db) => {
                if let Err(e) = db.migrate().await {
                    warn!(error = %e, "Database migrations not applied; remote catalog is skipped while the database is unavailable");
                }
                sources.push(Box::new(db.clone()));
                (Arc::new(db.clone()), Arc::new(db))
            }
            Err(e) => {
                warn!(error = %e, "Invalid DATABASE_URL; remote catalog disabled, orders and product edits kept in memory");
                (Arc::new(MemoryOrderSink::new()), Arc::new(MemoryProductSink::new()))
            }
        },
        None => {
            warn!("DATABASE_URL not set; remote catalog disabled, orders and product edits kept in memory");
            (Arc::new(MemoryOrderSink::new()), Arc::new(MemoryProductSink::new()))
        }
    };
    sources.push(Box::new(StaticCsvSource::new(config.catalog_csv.clone())));
    let mut resolver = CatalogResolver::new(sources);
    if let Some(kits) = &config.kits_csv { resolver = resolver.with_supplement(StaticCsvSource::kits(kits.clone())); }

    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&config.storage_dir));
    let store = Storefront::open(resolver, storage, orders, products, &config.order_prefix).await;
    let state = AppState { store: Arc::new(store) };

    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "voltstore"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/catalog/reload", post(reload_catalog))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/items", post(add_cart_item))
        .route("/api/v1/cart/items/:id", put(set_cart_quantity).delete(remove_cart_item))
        .route("/api/v1/checkout", get(checkout_state).post(checkout))
        .route("/api/v1/checkout/new", post(new_order))
        .route("/api/v1/recommendation", get(recommendation))
        .route("/api/v1/recommendation/kit", post(add_custom_kit))
        .route("/api/v1/session", get(get_session).post(login).delete(logout))
        .route("/api/v1/admin/orders", get(admin_orders))
        .route("/api/v1/admin/orders/:number/status", put(admin_set_order_status))
        .route("/api/v1/admin/products", post(admin_save_product))
        .route("/api/v1/admin/products/:id", axum::routing::delete(admin_delete_product))
        .route("/api/v1/admin/products/export", get(admin_export_products))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state);

    let addr = config.socket_addr();
    tracing::info!("⚡ VoltStore listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

// =============================================================================
// Errors
// =============================================================================

pub enum ApiError { Store(StoreError), BadRequest(String) }

impl From<StoreError> for ApiError { fn from(e: StoreError) -> Self { Self::Store(e) } }

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = match self {
            Self::BadRequest(message) => return (StatusCode::BAD_REQUEST, Json(json!({"error": message}))).into_response(),
            Self::Store(e) => e,
        };
        let status = match &e {
            StoreError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::Checkout(CheckoutError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Checkout(CheckoutError::EmptyCart) => StatusCode::BAD_REQUEST,
            StoreError::Checkout(CheckoutError::InFlight | CheckoutError::AlreadyCompleted) => StatusCode::CONFLICT,
            StoreError::Checkout(CheckoutError::Submission(_)) => StatusCode::BAD_GATEWAY,
            StoreError::Admin(AdminError::Forbidden) => StatusCode::FORBIDDEN,
            StoreError::Admin(AdminError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Admin(AdminError::Sink(SinkError::Rejected(_))) => StatusCode::CONFLICT,
            StoreError::Admin(AdminError::Sink(SinkError::NotFound(_))) => StatusCode::NOT_FOUND,
            StoreError::Admin(AdminError::Sink(SinkError::Unavailable(_))) => StatusCode::BAD_GATEWAY,
        };
        // Sink details stay in the logs.
        let body = match &e {
            StoreError::Checkout(CheckoutError::Validation(fields)) => json!({"error": "validation", "fields": fields}),
            StoreError::Admin(AdminError::Invalid(errors)) => json!({"error": "validation", "fields": errors}),
            StoreError::Admin(AdminError::Sink(SinkError::Unavailable(_))) => {
                tracing::error!(error = %e, "Admin sink unavailable");
                json!({"error": "External service error"})
            }
            _ => json!({"error": e.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)] pub struct ListParams { pub category: Option<String>, pub search: Option<String> }

async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> ApiResult<impl IntoResponse> {
    let category: CategoryFilter = p.category.as_deref().unwrap_or_default().parse().map_err(ApiError::BadRequest)?;
    Ok(Json(s.store.products(category, p.search.as_deref().unwrap_or_default())))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let product = s.store.product(&id)?;
    let specs: Vec<_> = product.spec_pairs().into_iter().map(|(k, v)| json!({"key": k, "value": v})).collect();
    Ok(Json(json!({"product": product, "specPairs": specs, "discount": product.discount()})))
}

async fn reload_catalog(State(s): State<AppState>) -> impl IntoResponse {
    let resolved = s.store.reload_catalog().await;
    Json(json!({"source": resolved.source, "products": resolved.products.len()}))
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct AddToCartRequest { pub product_id: String }
#[derive(Debug, Deserialize)] pub struct SetQuantityRequest { pub quantity: i64 }

fn cart_body(cart: &voltstore::domain::aggregates::Cart) -> serde_json::Value {
    json!({"lines": cart.lines(), "totalItems": cart.total_items(), "totalAmount": cart.total_amount()})
}

async fn get_cart(State(s): State<AppState>) -> impl IntoResponse { Json(cart_body(&s.store.cart())) }

async fn add_cart_item(State(s): State<AppState>, Json(r): Json<AddToCartRequest>) -> ApiResult<impl IntoResponse> {
    Ok(Json(cart_body(&s.store.add_to_cart(&r.product_id)?)))
}

async fn set_cart_quantity(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<SetQuantityRequest>) -> ApiResult<impl IntoResponse> {
    Ok(Json(cart_body(&s.store.set_quantity(&id, r.quantity)?)))
}

async fn remove_cart_item(State(s): State<AppState>, Path(id): Path<String>) -> impl IntoResponse { Json(cart_body(&s.store.remove_from_cart(&id))) }

async fn clear_cart(State(s): State<AppState>) -> impl IntoResponse { Json(cart_body(&s.store.clear_cart())) }

// =============================================================================
// Checkout
// =============================================================================

async fn checkout_state(State(s): State<AppState>) -> impl IntoResponse { Json(s.store.checkout_state()) }

async fn checkout(State(s): State<AppState>, Json(form): Json<CheckoutForm>) -> ApiResult<impl IntoResponse> {
    let order_number = s.store.place_order(&form).await?;
    Ok((StatusCode::CREATED, Json(json!({"orderNumber": order_number}))))
}

async fn new_order(State(s): State<AppState>) -> impl IntoResponse {
    s.store.new_order();
    Json(s.store.checkout_state())
}

// =============================================================================
// Recommendation
// =============================================================================

#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct RecommendationParams { pub daily_consumption: f64, pub backup_hours: f64 }
#[derive(Debug, Deserialize)] #[serde(rename_all = "camelCase")] pub struct CustomKitRequest { pub daily_consumption: f64, pub backup_hours: f64, #[serde(default)] pub preferences: KitPreferences }

async fn recommendation(State(s): State<AppState>, Query(p): Query<RecommendationParams>) -> impl IntoResponse {
    Json(s.store.recommend(p.daily_consumption, p.backup_hours))
}

async fn add_custom_kit(State(s): State<AppState>, Json(r): Json<CustomKitRequest>) -> impl IntoResponse {
    let recommendation = s.store.recommend(r.daily_consumption, r.backup_hours);
    let (kit, cart) = s.store.add_custom_kit(&recommendation, &r.preferences);
    (StatusCode::CREATED, Json(json!({"kit": kit, "cart": cart_body(&cart)})))
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Deserialize)] pub struct LoginRequest { pub email: String, pub role: UserRole }

async fn get_session(State(s): State<AppState>) -> impl IntoResponse {
    Json(json!({"user": s.store.user(), "isAdmin": s.store.is_admin()}))
}

async fn login(State(s): State<AppState>, Json(r): Json<LoginRequest>) -> ApiResult<impl IntoResponse> {
    if r.email.trim().is_empty() { return Err(ApiError::BadRequest("email is required".into())); }
    let user = s.store.login(&r.email, r.role);
    Ok(Json(json!({"user": user, "isAdmin": s.store.is_admin()})))
}

async fn logout(State(s): State<AppState>) -> impl IntoResponse {
    s.store.logout();
    StatusCode::NO_CONTENT
}

// =============================================================================
// Admin
// =============================================================================

#[derive(Debug, Deserialize)] pub struct StatusRequest { pub status: OrderStatus }

async fn admin_orders(State(s): State<AppState>) -> ApiResult<impl IntoResponse> { Ok(Json(s.store.admin_orders().await?)) }

async fn admin_set_order_status(State(s): State<AppState>, Path(number): Path<String>, Json(r): Json<StatusRequest>) -> ApiResult<impl IntoResponse> {
    let number = OrderNumber::parse(number).ok_or_else(|| ApiError::BadRequest("order number is required".into()))?;
    Ok(Json(s.store.admin_set_order_status(&number, r.status).await?))
}

async fn admin_save_product(State(s): State<AppState>, Json(draft): Json<ProductDraft>) -> ApiResult<impl IntoResponse> {
    Ok(Json(s.store.admin_save_product(draft).await?))
}

async fn admin_delete_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    s.store.admin_delete_product(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_export_products(State(s): State<AppState>) -> ApiResult<impl IntoResponse> {
    let csv = s.store.admin_export_csv()?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8"), (header::CONTENT_DISPOSITION, "attachment; filename=\"products.csv\"")], csv))
}
