//! The storefront context: one value, built at startup, that owns the
//! catalog, the cart, the session and the checkout pipeline and is passed to
//! every handler.
//!
//! Locks are never held across an await. Checkout works on a cart snapshot
//! and, once the sink has accepted the order, takes exactly that snapshot out
//! of the live cart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{info, instrument};
use crate::admin::{AdminConsole, AdminError, ProductDraft, ProductSink};
use crate::cart::{CartStore, KeyValueStore};
use crate::catalog::{self, csv, CatalogResolver, CategoryFilter, ResolvedCatalog};
use crate::checkout::{CheckoutForm, CheckoutPipeline, CheckoutState, OrderSink};
use crate::domain::aggregates::{Cart, Order, OrderStatus, Product};
use crate::domain::events::{CatalogEvent, DomainEvent};
use crate::domain::value_objects::{OrderNumber, ProductId};
use crate::recommend::{self, KitPreferences, Recommendation};
use crate::session::{Session, User, UserRole};
use crate::{Result, StoreError};

pub struct Storefront {
    resolver: CatalogResolver,
    catalog: RwLock<ResolvedCatalog>,
    cart: Mutex<CartStore>,
    session: Mutex<Session>,
    checkout: CheckoutPipeline,
    admin: AdminConsole,
}

fn publish(event: DomainEvent) {
    info!(event = ?event, "Domain event");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

impl Storefront {
    /// Hydrates the cart and session from `storage` and resolves the catalog.
    pub async fn open(
        resolver: CatalogResolver,
        storage: Arc<dyn KeyValueStore>,
        orders: Arc<dyn OrderSink>,
        products: Arc<dyn ProductSink>,
        order_prefix: &str,
    ) -> Self {
        let catalog = resolver.resolve().await;
        publish(DomainEvent::Catalog(CatalogEvent::Resolved { source: catalog.source.clone(), products: catalog.products.len() }));
        Self {
            resolver,
            catalog: RwLock::new(catalog),
            cart: Mutex::new(CartStore::hydrate(storage.clone())),
            session: Mutex::new(Session::hydrate(storage)),
            checkout: CheckoutPipeline::new(orders.clone(), order_prefix),
            admin: AdminConsole::new(orders, products),
        }
    }

    // ----- Catalog -----

    pub fn catalog(&self) -> Vec<Product> { self.catalog.read().unwrap_or_else(PoisonError::into_inner).products.clone() }

    pub fn catalog_source(&self) -> String { self.catalog.read().unwrap_or_else(PoisonError::into_inner).source.clone() }

    /// Re-runs source resolution and swaps the catalog in one step.
    #[instrument(skip(self))]
    pub async fn reload_catalog(&self) -> ResolvedCatalog {
        let resolved = self.resolver.resolve().await;
        publish(DomainEvent::Catalog(CatalogEvent::Resolved { source: resolved.source.clone(), products: resolved.products.len() }));
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = resolved.clone();
        resolved
    }

    pub fn products(&self, category: CategoryFilter, query: &str) -> Vec<Product> {
        let current = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog::filter(&current.products, category, query).into_iter().cloned().collect()
    }

    pub fn product(&self, id: &str) -> Result<Product> {
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        catalog
            .products
            .iter()
            .find(|p| p.id.as_str() == id.trim())
            .cloned()
            .ok_or_else(|| StoreError::ProductNotFound(id.to_string()))
    }

    // ----- Cart -----

    pub fn cart(&self) -> Cart { lock(&self.cart).cart().clone() }

    /// Adds the catalog's current snapshot of `id`.
    pub fn add_to_cart(&self, id: &str) -> Result<Cart> {
        let product = self.product(id)?;
        Ok(lock(&self.cart).add_item(product).clone())
    }

    /// Adds a product that is not part of the catalog, such as a custom kit.
    pub fn add_product_to_cart(&self, product: Product) -> Cart { lock(&self.cart).add_item(product).clone() }

    /// A quantity of zero or less removes the line.
    pub fn set_quantity(&self, id: &str, quantity: i64) -> Result<Cart> {
        let id = ProductId::new(id).map_err(|_| StoreError::ProductNotFound(id.to_string()))?;
        Ok(lock(&self.cart).set_quantity(id, quantity).clone())
    }

    pub fn remove_from_cart(&self, id: &str) -> Cart {
        let mut cart = lock(&self.cart);
        match ProductId::new(id) {
            Ok(id) => cart.remove_item(id).clone(),
            Err(_) => cart.cart().clone(),
        }
    }

    pub fn clear_cart(&self) -> Cart { lock(&self.cart).clear().clone() }

    // ----- Checkout -----

    pub fn checkout_state(&self) -> CheckoutState { self.checkout.state() }

    /// Submits the current cart. Only when the sink accepts the order are the
    /// ordered lines removed; cart edits made during submission are kept.
    #[instrument(skip_all)]
    pub async fn place_order(&self, form: &CheckoutForm) -> Result<OrderNumber> {
        let snapshot = self.cart();
        let order_number = self.checkout.submit(form, &snapshot).await?;
        lock(&self.cart).settle(snapshot);
        Ok(order_number)
    }

    pub fn new_order(&self) { self.checkout.new_order(); }

    // ----- Recommendation -----

    pub fn recommend(&self, daily_consumption_kwh: f64, backup_hours: f64) -> Recommendation {
        recommend::recommend(daily_consumption_kwh, backup_hours)
    }

    /// Builds a kit for `recommendation` and puts it in the cart.
    pub fn add_custom_kit(&self, recommendation: &Recommendation, preferences: &KitPreferences) -> (Product, Cart) {
        let kit = recommend::build_custom_kit(recommendation, preferences);
        let cart = self.add_product_to_cart(kit.clone());
        (kit, cart)
    }

    // ----- Session -----

    pub fn user(&self) -> Option<User> { lock(&self.session).user().cloned() }

    pub fn login(&self, email: &str, role: UserRole) -> User { lock(&self.session).login(email, role).clone() }

    pub fn logout(&self) { lock(&self.session).logout(); }

    pub fn is_admin(&self) -> bool { lock(&self.session).is_admin() }

    // ----- Admin -----

    fn require_admin(&self) -> std::result::Result<(), AdminError> {
        if self.is_admin() { Ok(()) } else { Err(AdminError::Forbidden) }
    }

    pub async fn admin_orders(&self) -> Result<Vec<Order>> {
        self.require_admin()?;
        Ok(self.admin.orders().await?)
    }

    pub async fn admin_set_order_status(&self, order_number: &OrderNumber, status: OrderStatus) -> Result<Order> {
        self.require_admin()?;
        Ok(self.admin.set_order_status(order_number, status).await?)
    }

    /// Creates the product when its id is not in the catalog, updates it otherwise,
    /// and mirrors the result into the catalog.
    pub async fn admin_save_product(&self, draft: ProductDraft) -> Result<Product> {
        self.require_admin()?;
        let is_new = self.product(&draft.id).is_err();
        let product = self.admin.save_product(draft, is_new).await?;
        {
            let mut catalog = self.catalog.write().unwrap_or_else(PoisonError::into_inner);
            match catalog.products.iter_mut().find(|p| p.id == product.id) {
                Some(existing) => *existing = product.clone(),
                None => catalog.products.push(product.clone()),
            }
        }
        publish(DomainEvent::Catalog(CatalogEvent::ProductSaved { product_id: product.id.clone(), created: is_new }));
        Ok(product)
    }

    pub async fn admin_delete_product(&self, id: &str) -> Result<()> {
        self.require_admin()?;
        let product_id = ProductId::new(id).map_err(|_| StoreError::ProductNotFound(id.to_string()))?;
        self.admin.delete_product(&product_id).await?;
        self.catalog.write().unwrap_or_else(PoisonError::into_inner).products.retain(|p| p.id != product_id);
        publish(DomainEvent::Catalog(CatalogEvent::ProductDeleted { product_id }));
        Ok(())
    }

    pub fn admin_export_csv(&self) -> Result<String> {
        self.require_admin()?;
        let catalog = self.catalog.read().unwrap_or_else(PoisonError::into_inner);
        Ok(csv::encode(&catalog.products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::MemoryProductSink;
    use crate::cart::MemoryStore;
    use crate::catalog::{builtin_catalog, FixedSource};
    use crate::checkout::{MemoryOrderSink, SinkError};
    use crate::domain::aggregates::Category;

    async fn storefront() -> Storefront {
        Storefront::open(
            CatalogResolver::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryOrderSink::new()),
            Arc::new(MemoryProductSink::new()),
            "ORD-",
        )
        .await
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let store = storefront().await;
        assert!(matches!(store.add_to_cart("nope"), Err(StoreError::ProductNotFound(_))));
        assert!(store.cart().is_empty());
    }

    #[tokio::test]
    async fn test_admin_operations_require_role() {
        let store = storefront().await;
        assert!(matches!(store.admin_orders().await, Err(StoreError::Admin(AdminError::Forbidden))));
        assert!(matches!(store.admin_export_csv(), Err(StoreError::Admin(AdminError::Forbidden))));

        store.login("buyer@example.com", UserRole::Client);
        assert!(matches!(store.admin_delete_product("1").await, Err(StoreError::Admin(AdminError::Forbidden))));
        assert_eq!(store.catalog().len(), builtin_catalog().len());
    }

    #[tokio::test]
    async fn test_admin_writes_mirror_into_catalog() {
        let store = storefront().await;
        store.login("admin@voltstore.ua", UserRole::Admin);
        let draft = ProductDraft {
            id: "new_1".into(),
            name: "Deye SUN-12K".into(),
            price: Some(crate::domain::value_objects::Money::from_units(98000)),
            description: "Трифазний".into(),
            image: "https://cdn/deye12.jpg".into(),
            ..Default::default()
        };
        store.admin_save_product(draft).await.unwrap();
        assert_eq!(store.product("new_1").unwrap().name, "Deye SUN-12K");

        store.admin_delete_product("new_1").await.unwrap();
        assert!(store.product("new_1").is_err());

        let exported = store.admin_export_csv().unwrap();
        assert_eq!(csv::decode(&exported).unwrap().len(), builtin_catalog().len());
    }

    struct SlowSink(MemoryOrderSink);

    #[async_trait::async_trait]
    impl OrderSink for SlowSink {
        async fn submit(&self, order: &Order) -> std::result::Result<(), SinkError> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.submit(order).await
        }
        async fn list(&self) -> std::result::Result<Vec<Order>, SinkError> { self.0.list().await }
        async fn update_status(&self, n: &OrderNumber, s: OrderStatus) -> std::result::Result<Order, SinkError> {
            self.0.update_status(n, s).await
        }
    }

    #[tokio::test]
    async fn test_cart_edits_during_submission_survive() {
        let products = ["1", "2"].map(|id| Product::new(ProductId::new(id).unwrap(), id, Category::Battery));
        let sink = Arc::new(SlowSink(MemoryOrderSink::new()));
        let store = Storefront::open(
            CatalogResolver::new(vec![Box::new(FixedSource::new("remote", products.to_vec()))]),
            Arc::new(MemoryStore::new()),
            sink.clone(),
            Arc::new(MemoryProductSink::new()),
            "ORD-",
        )
        .await;
        store.add_to_cart("1").unwrap();
        let form = CheckoutForm {
            full_name: "Петро Шевчук".into(),
            phone: "+380931234567".into(),
            email: "petro@example.com".into(),
            city: "Львів".into(),
            department: "12".into(),
            ..Default::default()
        };

        let (placed, _) = tokio::join!(store.place_order(&form), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            store.add_to_cart("2").unwrap();
            store.add_to_cart("1").unwrap();
        });
        placed.unwrap();

        let ordered = sink.0.list().await.unwrap();
        assert_eq!(ordered[0].items().len(), 1);
        let left = store.cart();
        assert_eq!(left.lines().len(), 2);
        assert_eq!(left.total_items(), 2);
    }

    #[tokio::test]
    async fn test_reload_swaps_catalog() {
        let only = Product::new(ProductId::new("x").unwrap(), "Solis", Category::Inverter);
        let store = Storefront::open(
            CatalogResolver::new(vec![Box::new(FixedSource::new("remote", vec![only]))]),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryOrderSink::new()),
            Arc::new(MemoryProductSink::new()),
            "ORD-",
        )
        .await;
        assert_eq!(store.catalog_source(), "remote");
        assert_eq!(store.reload_catalog().await.products.len(), 1);
        assert_eq!(store.products(CategoryFilter::Only(Category::Battery), "").len(), 0);
    }
}
