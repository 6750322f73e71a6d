//! # Back-Office Service
//!
//! Composes the pool, the cache and the transaction policy into the
//! operations the admin handlers call.
//!
//! ## Composition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Backoffice                                   │
//! │                                                                         │
//! │  writes ──► execute_transaction_with_retry ──► repository fn(conn)     │
//! │                   │                                                     │
//! │                   └── Ok → invalidate_pattern("report:" | "products:") │
//! │                                                                         │
//! │  reports ─► cache.get_or_insert_with(key, report ttl)                  │
//! │                   └── miss → ReportRepository loads → tienda_core      │
//! │                              builds the report                         │
//! │                                                                         │
//! │  Arc<TtlCache<CachedValue>>  injected, shared with whoever else needs  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Invalidation happens after commit. A failed write leaves the cache alone.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::SqliteConnection;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TtlCache;
use crate::config::TiendaConfig;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::cart::{replace_cart_items, CartWithItems};
use crate::repository::inventory::{
    create_or_update_inventory, record_movement, release_stock, reserve_stock, MovementOutcome,
};
use crate::repository::order::{create_order_with_items, OrderWithItems};
use crate::repository::payment_profile::{activate_payment_profile, PaymentProfileWithMethods};
use crate::repository::product::{
    adjust_product_stock, create_product_with_images, delete_product_completely,
    ProductDeletion, ProductWithImages,
};
use crate::repository::user::create_user_with_cart;
use crate::transaction::{execute_transaction_with_retry, RetryPolicy, TransactionConfig, TxFuture};
use tienda_core::inventory::{Inventory, InventoryFields, InventoryFilter, InventoryReport, MovementType};
use tienda_core::report::{
    build_financial_report, build_sales_report, build_user_report, FinancialReport, ReportPeriod,
    SalesGrouping, SalesReport, UserReport,
};
use tienda_core::validation::{normalize_pagination, validate_date_range};
use tienda_core::{
    Cart, NewCartItem, NewOrder, NewOrderItem, NewPaymentProfile, NewProduct, NewProductImage,
    NewUser, Page, Product, User, DEFAULT_MARGIN_SETTING,
};

/// Cache key prefix of every report.
const REPORT_PREFIX: &str = "report:";

/// Cache key prefix of product listings.
const PRODUCTS_PREFIX: &str = "products:";

/// What the back-office cache stores.
///
/// Values are reference counted so a hit costs a pointer copy.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Financial(Arc<FinancialReport>),
    Sales(Arc<SalesReport>),
    Users(Arc<UserReport>),
    Products(Arc<Page<Product>>),
}

impl CachedValue {
    fn kind(&self) -> &'static str {
        match self {
            CachedValue::Financial(_) => "financial",
            CachedValue::Sales(_) => "sales",
            CachedValue::Users(_) => "users",
            CachedValue::Products(_) => "products",
        }
    }
}

/// A key held something other than what its prefix promises.
fn wrong_kind(key: &str, found: &CachedValue) -> DbError {
    DbError::Internal(format!("cache key {key} holds a {} value", found.kind()))
}

// =============================================================================
// Service
// =============================================================================

/// Entry point of the back-office core.
pub struct Backoffice {
    db: Database,
    cache: Arc<TtlCache<CachedValue>>,
    tx_config: TransactionConfig,
    retry: RetryPolicy,
    report_tz: FixedOffset,
    report_ttl: Duration,
    sweeper: Option<JoinHandle<()>>,
}

impl Backoffice {
    /// Builds the service over an open database and an existing cache.
    ///
    /// No sweeper is started; the owner of `cache` decides that.
    pub fn new(db: Database, cache: Arc<TtlCache<CachedValue>>, config: &TiendaConfig) -> Self {
        Backoffice {
            db,
            cache,
            tx_config: config.transaction_config(),
            retry: config.retry_policy(),
            report_tz: config.report_offset(),
            report_ttl: config.report_ttl(),
            sweeper: None,
        }
    }

    /// Opens the database, creates the cache and starts its sweeper.
    pub async fn connect(config: &TiendaConfig) -> DbResult<Self> {
        config.validate()?;

        let db = Database::new(config.db_config()).await?;
        let cache = Arc::new(TtlCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.default_ttl_secs),
        ));
        let sweeper = cache.spawn_sweeper(Duration::from_secs(config.cache.sweep_interval_secs));

        info!(
            capacity = config.cache.capacity,
            sweep_interval_secs = config.cache.sweep_interval_secs,
            "Back-office ready"
        );

        let mut office = Self::new(db, cache, config);
        office.sweeper = Some(sweeper);
        Ok(office)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Arc<TtlCache<CachedValue>> {
        &self.cache
    }

    /// Stops the sweeper and closes the pool.
    pub async fn shutdown(mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
        self.db.close().await;
        info!("Back-office stopped");
    }

    async fn write<T, F>(&self, op: F) -> DbResult<T>
    where
        F: for<'t> Fn(&'t mut SqliteConnection) -> TxFuture<'t, T>,
    {
        execute_transaction_with_retry(self.db.pool(), &self.tx_config, &self.retry, op).await
    }

    fn invalidate(&self, prefixes: &[&str]) {
        for prefix in prefixes {
            let removed = self.cache.invalidate_pattern(prefix);
            if removed > 0 {
                debug!(prefix, removed, "Invalidated cache entries");
            }
        }
    }

    // =========================================================================
    // Catalog & Orders
    // =========================================================================

    /// Places an order, decrementing stock for every line.
    pub async fn create_order_with_items(
        &self,
        order: NewOrder,
        items: Vec<NewOrderItem>,
    ) -> DbResult<OrderWithItems> {
        let created = self
            .write(move |conn| {
                let (order, items) = (order.clone(), items.clone());
                Box::pin(async move { create_order_with_items(conn, order, items).await })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX, PRODUCTS_PREFIX]);
        Ok(created)
    }

    pub async fn create_product_with_images(
        &self,
        product: NewProduct,
        images: Vec<NewProductImage>,
    ) -> DbResult<ProductWithImages> {
        let created = self
            .write(move |conn| {
                let (product, images) = (product.clone(), images.clone());
                Box::pin(async move { create_product_with_images(conn, product, images).await })
            })
            .await?;

        self.invalidate(&[PRODUCTS_PREFIX]);
        Ok(created)
    }

    pub async fn delete_product_completely(&self, product_id: &str) -> DbResult<ProductDeletion> {
        let product_id = product_id.to_string();
        let deleted = self
            .write(move |conn| {
                let product_id = product_id.clone();
                Box::pin(async move { delete_product_completely(conn, &product_id).await })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX, PRODUCTS_PREFIX]);
        Ok(deleted)
    }

    pub async fn adjust_product_stock(&self, product_id: &str, delta: i64) -> DbResult<Product> {
        let product_id = product_id.to_string();
        let product = self
            .write(move |conn| {
                let product_id = product_id.clone();
                Box::pin(async move { adjust_product_stock(conn, &product_id, delta).await })
            })
            .await?;

        self.invalidate(&[PRODUCTS_PREFIX]);
        Ok(product)
    }

    /// Active products newest first, cached per page.
    pub async fn list_products(&self, page: u32, limit: u32) -> DbResult<Arc<Page<Product>>> {
        let (page, limit) = normalize_pagination(page, limit);
        let key = format!("{PRODUCTS_PREFIX}{page}:{limit}");

        let value = self
            .cache
            .get_or_insert_with(&key, self.cache.default_ttl(), || async {
                let listed = self.db.products().list(page, limit).await?;
                Ok::<_, DbError>(CachedValue::Products(Arc::new(listed)))
            })
            .await?;

        match value {
            CachedValue::Products(listed) => Ok(listed),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    // =========================================================================
    // Users, Carts & Payment
    // =========================================================================

    pub async fn create_user_with_cart(&self, user: NewUser) -> DbResult<(User, Cart)> {
        let created = self
            .write(move |conn| {
                let user = user.clone();
                Box::pin(async move { create_user_with_cart(conn, user).await })
            })
            .await?;

        self.invalidate(&["report:users"]);
        Ok(created)
    }

    /// Replaces the user's cart contents.
    pub async fn replace_cart(
        &self,
        user_id: &str,
        items: Vec<NewCartItem>,
    ) -> DbResult<CartWithItems> {
        let user_id = user_id.to_string();
        self.write(move |conn| {
            let (user_id, items) = (user_id.clone(), items.clone());
            Box::pin(async move { replace_cart_items(conn, &user_id, items).await })
        })
        .await
    }

    pub async fn activate_payment_profile(
        &self,
        profile: NewPaymentProfile,
    ) -> DbResult<PaymentProfileWithMethods> {
        self.write(move |conn| {
            let profile = profile.clone();
            Box::pin(async move { activate_payment_profile(conn, profile).await })
        })
        .await
    }

    // =========================================================================
    // Inventory
    // =========================================================================
    // Inventory cost is the first cost tier, so every ledger write drops the
    // cached reports.

    pub async fn record_movement(
        &self,
        inventory_id: &str,
        movement_type: MovementType,
        qty: i64,
        reason: Option<String>,
        reference: Option<String>,
    ) -> DbResult<MovementOutcome> {
        let inventory_id = inventory_id.to_string();
        let outcome = self
            .write(move |conn| {
                let (inventory_id, reason, reference) =
                    (inventory_id.clone(), reason.clone(), reference.clone());
                Box::pin(async move {
                    record_movement(conn, &inventory_id, movement_type, qty, reason, reference)
                        .await
                })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX]);
        Ok(outcome)
    }

    pub async fn reserve_stock(
        &self,
        inventory_id: &str,
        qty: i64,
        order_id: &str,
    ) -> DbResult<MovementOutcome> {
        let (inventory_id, order_id) = (inventory_id.to_string(), order_id.to_string());
        let outcome = self
            .write(move |conn| {
                let (inventory_id, order_id) = (inventory_id.clone(), order_id.clone());
                Box::pin(async move { reserve_stock(conn, &inventory_id, qty, &order_id).await })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX]);
        Ok(outcome)
    }

    pub async fn release_stock(
        &self,
        inventory_id: &str,
        qty: i64,
        order_id: &str,
    ) -> DbResult<MovementOutcome> {
        let (inventory_id, order_id) = (inventory_id.to_string(), order_id.to_string());
        let outcome = self
            .write(move |conn| {
                let (inventory_id, order_id) = (inventory_id.clone(), order_id.clone());
                Box::pin(async move { release_stock(conn, &inventory_id, qty, &order_id).await })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX]);
        Ok(outcome)
    }

    pub async fn create_or_update_inventory(
        &self,
        product_id: &str,
        fields: InventoryFields,
    ) -> DbResult<Inventory> {
        let product_id = product_id.to_string();
        let inventory = self
            .write(move |conn| {
                let (product_id, fields) = (product_id.clone(), fields.clone());
                Box::pin(async move { create_or_update_inventory(conn, &product_id, fields).await })
            })
            .await?;

        self.invalidate(&[REPORT_PREFIX]);
        Ok(inventory)
    }

    /// Filtered inventory page with ledger stats. Not cached.
    pub async fn inventory_report(&self, filter: &InventoryFilter) -> DbResult<InventoryReport> {
        self.db.inventory().inventory_report(filter).await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Saves a setting. Changing the default margin drops cached reports,
    /// since it prices lines that have no other cost source.
    pub async fn update_setting(&self, key: &str, value: &str) -> DbResult<()> {
        self.db.settings().set(key, value).await?;

        if key == DEFAULT_MARGIN_SETTING {
            self.invalidate(&[REPORT_PREFIX]);
        }
        Ok(())
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Revenue, attributed cost and profit over orders paid in `[start, end]`.
    ///
    /// The default margin setting is read on every uncached run.
    pub async fn generate_financial_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Arc<FinancialReport>> {
        validate_date_range(start, end)?;
        let period = ReportPeriod::new(start, end);
        let key = format!(
            "{REPORT_PREFIX}financial:{}:{}",
            start.to_rfc3339(),
            end.to_rfc3339()
        );

        let value = self
            .cache
            .get_or_insert_with(&key, self.report_ttl, || async {
                let default_margin = self.db.settings().default_margin().await?;
                let orders = self.db.reports().paid_orders(period).await?;
                let report =
                    build_financial_report(period, &orders, default_margin, self.report_tz);

                info!(
                    orders = report.order_count,
                    revenue = report.total_revenue.cents(),
                    no_cost_lines = report.cost_coverage.no_cost,
                    "Financial report generated"
                );
                Ok::<_, DbError>(CachedValue::Financial(Arc::new(report)))
            })
            .await?;

        match value {
            CachedValue::Financial(report) => Ok(report),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    pub async fn generate_sales_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        group_by: SalesGrouping,
    ) -> DbResult<Arc<SalesReport>> {
        validate_date_range(start, end)?;
        let period = ReportPeriod::new(start, end);
        let key = format!(
            "{REPORT_PREFIX}sales:{}:{}:{}",
            group_by.as_str(),
            start.to_rfc3339(),
            end.to_rfc3339()
        );

        let value = self
            .cache
            .get_or_insert_with(&key, self.report_ttl, || async {
                let orders = self.db.reports().completed_orders(period).await?;
                let report = build_sales_report(period, &orders, group_by, self.report_tz);

                info!(
                    orders = report.order_count,
                    group_by = group_by.as_str(),
                    "Sales report generated"
                );
                Ok::<_, DbError>(CachedValue::Sales(Arc::new(report)))
            })
            .await?;

        match value {
            CachedValue::Sales(report) => Ok(report),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    /// Signups, activity and top customers.
    ///
    /// The period applies only when both bounds are given; otherwise every
    /// user counts as new.
    pub async fn generate_user_report(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> DbResult<Arc<UserReport>> {
        let period = match (start, end) {
            (Some(start), Some(end)) => {
                validate_date_range(start, end)?;
                Some(ReportPeriod::new(start, end))
            }
            _ => None,
        };
        let key = match period {
            Some(p) => format!(
                "{REPORT_PREFIX}users:{}:{}",
                p.start.to_rfc3339(),
                p.end.to_rfc3339()
            ),
            None => format!("{REPORT_PREFIX}users:all"),
        };

        let value = self
            .cache
            .get_or_insert_with(&key, self.report_ttl, || async {
                let reports = self.db.reports();
                let users = reports.users().await?;
                let orders = reports.completed_order_headers().await?;
                let report = build_user_report(period, &users, &orders, self.report_tz);

                info!(
                    users = users.len(),
                    new_users = report.new_users,
                    "User report generated"
                );
                Ok::<_, DbError>(CachedValue::Users(Arc::new(report)))
            })
            .await?;

        match value {
            CachedValue::Users(report) => Ok(report),
            other => Err(wrong_kind(&key, &other)),
        }
    }
}

impl Drop for Backoffice {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Duration as ChronoDuration;
    use tienda_core::{CoreError, Money, OrderStatus, PaymentStatus, Rate, UserRole};

    async fn backoffice() -> Backoffice {
        Backoffice::connect(&TiendaConfig::in_memory()).await.unwrap()
    }

    fn today() -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - ChronoDuration::hours(1), now + ChronoDuration::hours(1))
    }

    async fn widget(office: &Backoffice, stock: i64) -> Product {
        office
            .create_product_with_images(
                NewProduct {
                    name: "Widget".to_string(),
                    price: Money::from_cents(50_000),
                    stock,
                    categories: "Tools, Garden".to_string(),
                    ..Default::default()
                },
                Vec::new(),
            )
            .await
            .unwrap()
            .product
    }

    fn paid_order(product: &Product, quantity: i64) -> (NewOrder, Vec<NewOrderItem>) {
        let order = NewOrder {
            customer_name: "Luis Cliente".to_string(),
            customer_email: "luis@example.com".to_string(),
            total: product.price * quantity,
            status: OrderStatus::Completed,
            payment_status: PaymentStatus::Paid,
            payment_method: Some("card".to_string()),
            ..Default::default()
        };
        let items = vec![NewOrderItem {
            product_id: product.id.clone(),
            quantity,
            price: product.price,
        }];
        (order, items)
    }

    #[tokio::test]
    async fn test_example_margin_scenario() {
        let office = backoffice().await;
        let product = widget(&office, 10).await;
        office
            .create_or_update_inventory(
                &product.id,
                InventoryFields {
                    cost: Some(Money::from_cents(30_000)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let (order, items) = paid_order(&product, 2);
        office.create_order_with_items(order, items).await.unwrap();

        let (start, end) = today();
        let report = office.generate_financial_report(start, end).await.unwrap();
        assert_eq!(report.total_revenue, Money::from_cents(100_000));
        assert_eq!(report.total_costs, Money::from_cents(60_000));
        assert_eq!(report.gross_profit, Money::from_cents(40_000));
        assert!((report.profit_margin - 40.0).abs() < 1e-9);

        // Drop the inventory cost, fall back to the supplier price
        sqlx::query("UPDATE inventory SET cost = NULL")
            .execute(office.database().pool())
            .await
            .unwrap();
        sqlx::query("UPDATE products SET supplier_price = 35000")
            .execute(office.database().pool())
            .await
            .unwrap();
        office.cache().invalidate_pattern(REPORT_PREFIX);

        let report = office.generate_financial_report(start, end).await.unwrap();
        assert_eq!(report.total_costs, Money::from_cents(70_000));
        assert_eq!(report.gross_profit, Money::from_cents(30_000));
        assert!((report.profit_margin - 30.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = TiendaConfig::default();
        config.database.path = dir.path().join("tienda.db");
        config.database.max_connections = 10;
        config.transactions.max_retries = 10;
        config.transactions.backoff_base_ms = 1;

        let office = Arc::new(Backoffice::connect(&config).await.unwrap());
        let product = widget(&office, 5).await;

        let mut checkouts = tokio::task::JoinSet::new();
        for _ in 0..10 {
            let office = Arc::clone(&office);
            let (order, items) = paid_order(&product, 1);
            checkouts.spawn(async move { office.create_order_with_items(order, items).await });
        }

        let mut placed = 0;
        while let Some(joined) = checkouts.join_next().await {
            match joined.unwrap() {
                Ok(_) => placed += 1,
                Err(DbError::Validation(CoreError::InsufficientStock {
                    product_id,
                    available,
                    requested,
                })) => {
                    assert_eq!(product_id, product.id);
                    assert_eq!(available, 0);
                    assert_eq!(requested, 1);
                }
                Err(other) => panic!("expected InsufficientStock, got {other:?}"),
            }
        }

        let remaining = office
            .database()
            .products()
            .get_by_id(&product.id)
            .await
            .unwrap()
            .unwrap()
            .stock;
        assert!(remaining >= 0);
        assert_eq!(placed + remaining, 5);
        assert_eq!(placed, 5);

        let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(office.database().pool())
            .await
            .unwrap();
        assert_eq!(orders, 5);
    }

    #[tokio::test]
    async fn test_reports_are_cached_until_an_order_lands() {
        let office = backoffice().await;
        let product = widget(&office, 10).await;
        let (start, end) = today();

        let first = office.generate_financial_report(start, end).await.unwrap();
        let again = office.generate_financial_report(start, end).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.order_count, 0);

        let (order, items) = paid_order(&product, 1);
        office.create_order_with_items(order, items).await.unwrap();

        let fresh = office.generate_financial_report(start, end).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.order_count, 1);
    }

    #[tokio::test]
    async fn test_default_margin_setting_prices_uncosted_lines() {
        let office = backoffice().await;
        let product = widget(&office, 10).await;
        office
            .update_setting(DEFAULT_MARGIN_SETTING, "25")
            .await
            .unwrap();

        let (order, items) = paid_order(&product, 1);
        office.create_order_with_items(order, items).await.unwrap();

        let (start, end) = today();
        let report = office.generate_financial_report(start, end).await.unwrap();
        assert_eq!(report.total_costs, Money::from_cents(37_500));
        assert_eq!(report.cost_coverage.default_margin, 1);

        // A new margin reprices the cached report
        office
            .update_setting(DEFAULT_MARGIN_SETTING, "40")
            .await
            .unwrap();
        let repriced = office.generate_financial_report(start, end).await.unwrap();
        assert!(!Arc::ptr_eq(&report, &repriced));
        assert_eq!(repriced.total_costs, Money::from_cents(30_000));

        // Unrelated settings leave it cached
        office.update_setting("store_name", "Tienda").await.unwrap();
        let cached = office.generate_financial_report(start, end).await.unwrap();
        assert!(Arc::ptr_eq(&repriced, &cached));
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let office = backoffice().await;
        let (start, end) = today();

        let err = office.generate_sales_report(end, start, SalesGrouping::Day).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(office.cache().is_empty());
    }

    #[tokio::test]
    async fn test_sales_and_user_reports() {
        let office = backoffice().await;
        let (buyer, _) = office
            .create_user_with_cart(NewUser {
                name: "Marta".to_string(),
                email: "marta@example.com".to_string(),
                role: UserRole::Customer,
                commission: None,
            })
            .await
            .unwrap();
        let product = widget(&office, 10).await;

        let (mut order, items) = paid_order(&product, 3);
        order.user_id = Some(buyer.id.clone());
        office.create_order_with_items(order, items).await.unwrap();

        let (start, end) = today();
        let sales = office
            .generate_sales_report(start, end, SalesGrouping::Month)
            .await
            .unwrap();
        assert_eq!(sales.order_count, 1);
        assert_eq!(sales.total_sales, Money::from_cents(150_000));

        let users = office.generate_user_report(Some(start), Some(end)).await.unwrap();
        assert_eq!(users.new_users, 1);
        assert_eq!(users.active_users, 1);
        assert_eq!(users.top_customers[0].user_id, buyer.id);

        let everyone = office.generate_user_report(None, Some(end)).await.unwrap();
        assert_eq!(everyone.new_users, 1);
    }

    #[tokio::test]
    async fn test_new_user_drops_only_user_reports() {
        let office = backoffice().await;
        let (start, end) = today();
        office.generate_financial_report(start, end).await.unwrap();
        office.generate_user_report(None, None).await.unwrap();
        assert_eq!(office.cache().len(), 2);

        office
            .create_user_with_cart(NewUser {
                name: "Pablo".to_string(),
                email: "pablo@example.com".to_string(),
                role: UserRole::Seller,
                commission: Some(Rate::from_percentage(10.0)),
            })
            .await
            .unwrap();

        assert_eq!(office.cache().len(), 1);
        let users = office.generate_user_report(None, None).await.unwrap();
        assert_eq!(users.new_users, 1);
    }

    #[tokio::test]
    async fn test_product_listing_invalidated_by_product_writes() {
        let office = backoffice().await;
        let product = widget(&office, 5).await;

        let listed = office.list_products(1, 10).await.unwrap();
        assert_eq!(listed.items.len(), 1);
        assert!(office.cache().get("products:1:10").is_some());

        office.adjust_product_stock(&product.id, -2).await.unwrap();
        assert!(office.cache().get("products:1:10").is_none());

        let listed = office.list_products(1, 10).await.unwrap();
        assert_eq!(listed.items[0].stock, 3);

        office.delete_product_completely(&product.id).await.unwrap();
        assert!(office.list_products(1, 10).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache() {
        let office = backoffice().await;
        let product = widget(&office, 1).await;
        let (start, end) = today();
        office.generate_financial_report(start, end).await.unwrap();

        let (order, items) = paid_order(&product, 2);
        let err = office.create_order_with_items(order, items).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Validation(CoreError::InsufficientStock {
                available: 1,
                requested: 2,
                ..
            })
        ));
        assert_eq!(office.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_reserve_release_round_trip() {
        let office = backoffice().await;
        let product = widget(&office, 0).await;
        let inventory = office
            .create_or_update_inventory(
                &product.id,
                InventoryFields {
                    quantity: Some(20),
                    min_stock: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let before = inventory.levels();

        let reserved = office.reserve_stock(&inventory.id, 5, "order-1").await.unwrap();
        assert_eq!(reserved.inventory.reserved, 5);
        assert_eq!(reserved.inventory.available, 15);

        let released = office.release_stock(&inventory.id, 5, "order-1").await.unwrap();
        assert_eq!(released.inventory.levels(), before);

        let movements = office.database().inventory().list_movements(&inventory.id).await.unwrap();
        let deltas: Vec<i64> = movements.iter().map(|m| m.quantity).collect();
        assert_eq!(deltas, vec![20, -5, 5]);

        let report = office.inventory_report(&InventoryFilter::default()).await.unwrap();
        assert_eq!(report.stats.total_products, 1);
        assert_eq!(report.stats.total_movements, 3);
    }

    #[tokio::test]
    async fn test_record_movement_rejects_negative_stock() {
        let office = backoffice().await;
        let product = widget(&office, 0).await;
        let inventory = office
            .create_or_update_inventory(
                &product.id,
                InventoryFields {
                    quantity: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = office
            .record_movement(&inventory.id, MovementType::Out, 4, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let stored = office.database().inventory().get_by_id(&inventory.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, 3);
    }

    #[tokio::test]
    async fn test_cart_and_payment_profile() {
        let office = backoffice().await;
        let product = widget(&office, 5).await;
        let (user, _) = office
            .create_user_with_cart(NewUser {
                name: "Marta".to_string(),
                email: "marta@example.com".to_string(),
                role: UserRole::Customer,
                commission: None,
            })
            .await
            .unwrap();

        let cart = office
            .replace_cart(
                &user.id,
                vec![NewCartItem {
                    product_id: product.id.clone(),
                    quantity: 2,
                }],
            )
            .await
            .unwrap();
        assert_eq!(cart.items.len(), 1);

        let profile = office
            .activate_payment_profile(NewPaymentProfile {
                name: "Default".to_string(),
                methods: Vec::new(),
            })
            .await
            .unwrap();
        assert!(profile.profile.is_active);
    }

    #[tokio::test]
    async fn test_injected_cache_is_shared() {
        let config = TiendaConfig::in_memory();
        let db = Database::new(config.db_config()).await.unwrap();
        let cache = Arc::new(TtlCache::new(8, Duration::from_secs(60)));
        let office = Backoffice::new(db, cache.clone(), &config);

        office.list_products(1, 10).await.unwrap();
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(office.cache().is_empty());
    }
}
