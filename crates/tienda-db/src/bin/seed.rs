//! # Seed Data Generator
//!
//! Populates the database with a small shop for development: users,
//! products priced through every cost tier, inventory, a payment profile
//! and a month of orders.
//!
//! ## Usage
//! ```bash
//! # Seed the database named in the config (default: ./tienda.db)
//! cargo run -p tienda-db --bin seed
//!
//! # Specify database path
//! cargo run -p tienda-db --bin seed -- --db ./data/tienda.db
//!
//! # Use a specific config file
//! cargo run -p tienda-db --bin seed -- --config ./tienda.toml
//!
//! # Also dump the financial report as the dashboard receives it
//! cargo run -p tienda-db --bin seed -- --json
//! ```
//!
//! ## Generated Products
//! Each catalog entry exercises one cost tier in the financial report:
//! - inventory cost (tier 1)
//! - supplier price (tier 2)
//! - product margin (tier 3)
//! - nothing, priced by the `default_product_margin` setting (tier 4)

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use tienda_core::inventory::{InventoryFields, InventoryFilter};
use tienda_core::report::SalesGrouping;
use tienda_core::{
    Money, NewOrder, NewOrderItem, NewPaymentMethod, NewPaymentProfile, NewProduct,
    NewProductImage, NewUser, OrderStatus, PaymentStatus, Product, Rate, UserRole,
    DEFAULT_MARGIN_SETTING,
};
use tienda_db::{Backoffice, TiendaConfig};

/// Where a catalog entry's cost comes from.
#[derive(Clone, Copy)]
enum CostTier {
    Inventory(i64),
    Supplier(i64),
    Margin(f64),
    DefaultMargin,
}

/// (name, categories, price in cents, stock, cost tier)
const CATALOG: &[(&str, &str, i64, i64, CostTier)] = &[
    ("Ceramic Mug", "Kitchen, Gifts", 1_450, 120, CostTier::Inventory(520)),
    ("Linen Apron", "Kitchen", 3_200, 40, CostTier::Supplier(1_700)),
    ("Olive Wood Board", "Kitchen, Gifts", 5_900, 25, CostTier::Margin(45.0)),
    ("Beeswax Candle", "Home, Gifts", 1_800, 80, CostTier::Inventory(610)),
    ("Wool Throw", "Home", 8_900, 30, CostTier::Supplier(4_800)),
    ("Herb Planter", "Garden, Home", 2_600, 60, CostTier::Margin(38.5)),
    ("Seed Collection", "Garden", 1_200, 200, CostTier::DefaultMargin),
    ("Pruning Shears", "Garden, Tools", 3_900, 35, CostTier::Inventory(2_100)),
    ("Notebook Set", "Stationery, Gifts", 1_600, 150, CostTier::DefaultMargin),
    ("Fountain Pen", "Stationery", 7_500, 20, CostTier::Supplier(3_300)),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Lucía Romero", "lucia@example.com"),
    ("Mateo Vidal", "mateo@example.com"),
    ("Carmen Ortiz", "carmen@example.com"),
    ("Hugo Navarro", "hugo@example.com"),
    ("Elena Castro", "elena@example.com"),
];

const PAYMENT_METHODS: &[&str] = &["card", "transfer", "cash"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut dump_json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--json" | "-j" => dump_json = true,
            "--help" | "-h" => {
                println!("Tienda Back-Office Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -d, --db <PATH>      Database file path (overrides config)");
                println!("  -j, --json           Print the financial report as JSON");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            other => warn!(argument = other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = TiendaConfig::load(config_path)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    println!("🌱 Tienda Back-Office Seed Data Generator");
    println!("=========================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let office = Backoffice::connect(&config).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Check existing products
    let existing = office.database().products().list(1, 1).await?.pagination.total;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        office.shutdown().await;
        return Ok(());
    }

    let start = std::time::Instant::now();

    // Settings & payment
    office.update_setting(DEFAULT_MARGIN_SETTING, "30").await?;
    office
        .activate_payment_profile(NewPaymentProfile {
            name: "Default".to_string(),
            methods: vec![
                NewPaymentMethod {
                    method: "card".to_string(),
                    label: "Credit or debit card".to_string(),
                    instructions: None,
                },
                NewPaymentMethod {
                    method: "transfer".to_string(),
                    label: "Bank transfer".to_string(),
                    instructions: Some("Use the order number as reference".to_string()),
                },
            ],
        })
        .await?;
    println!("✓ Settings and payment profile");

    // Users
    office
        .create_user_with_cart(NewUser {
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
            role: UserRole::Admin,
            commission: None,
        })
        .await?;
    let (seller, _) = office
        .create_user_with_cart(NewUser {
            name: "Ana Vendedora".to_string(),
            email: "ana@example.com".to_string(),
            role: UserRole::Seller,
            commission: Some(Rate::from_percentage(12.5)),
        })
        .await?;

    let mut customers = Vec::with_capacity(CUSTOMERS.len());
    for (name, email) in CUSTOMERS {
        let (user, _) = office
            .create_user_with_cart(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                role: UserRole::Customer,
                commission: None,
            })
            .await?;
        customers.push(user);
    }
    println!("✓ Generated {} users", customers.len() + 2);

    // Products & inventory
    let mut products: Vec<Product> = Vec::with_capacity(CATALOG.len());
    for (index, (name, categories, price, stock, tier)) in CATALOG.iter().enumerate() {
        let (supplier_price, margin) = match tier {
            CostTier::Supplier(cents) => (Some(Money::from_cents(*cents)), None),
            CostTier::Margin(pct) => (None, Some(Rate::from_percentage(*pct))),
            CostTier::Inventory(_) | CostTier::DefaultMargin => (None, None),
        };

        let created = office
            .create_product_with_images(
                NewProduct {
                    user_id: (index % 2 == 0).then(|| seller.id.clone()),
                    name: name.to_string(),
                    description: None,
                    price: Money::from_cents(*price),
                    stock: *stock,
                    categories: categories.to_string(),
                    supplier_price,
                    margin,
                },
                vec![NewProductImage {
                    url: format!("https://cdn.example.com/products/{index}.jpg"),
                    alt: Some(name.to_string()),
                    position: None,
                }],
            )
            .await?;

        let cost = match tier {
            CostTier::Inventory(cents) => Some(Money::from_cents(*cents)),
            _ => None,
        };
        office
            .create_or_update_inventory(
                &created.product.id,
                InventoryFields {
                    quantity: Some(*stock),
                    min_stock: Some(10),
                    reorder_point: Some(20),
                    cost,
                    location: Some(format!("A-{:02}", index + 1)),
                    ..Default::default()
                },
            )
            .await?;

        products.push(created.product);
    }
    println!("✓ Generated {} products with inventory", products.len());

    // Orders: two a day for the last 30 days, rotating customers and products.
    // Checkout stamps the current time, so older dates are backfilled below.
    let mut placed = 0usize;
    for day in 0..30i64 {
        for slot in 0..2usize {
            let seq = day as usize * 2 + slot;
            let customer = &customers[seq % customers.len()];
            let first = &products[seq % products.len()];
            let second = &products[(seq * 7 + 3) % products.len()];

            let mut items = vec![NewOrderItem {
                product_id: first.id.clone(),
                quantity: 1 + (seq % 3) as i64,
                price: first.price,
            }];
            if second.id != first.id {
                items.push(NewOrderItem {
                    product_id: second.id.clone(),
                    quantity: 1,
                    price: second.price,
                });
            }
            let total = items.iter().map(|item| item.price * item.quantity).sum();

            let (status, payment_status) = match seq % 5 {
                0 => (OrderStatus::Pending, PaymentStatus::Pending),
                1 => (OrderStatus::Confirmed, PaymentStatus::Paid),
                _ => (OrderStatus::Completed, PaymentStatus::Paid),
            };

            let created = office
                .create_order_with_items(
                    NewOrder {
                        user_id: Some(customer.id.clone()),
                        customer_name: customer.name.clone(),
                        customer_email: customer.email.clone(),
                        total,
                        status,
                        payment_status,
                        payment_method: Some(PAYMENT_METHODS[seq % PAYMENT_METHODS.len()].to_string()),
                        ..Default::default()
                    },
                    items,
                )
                .await?;

            let placed_at = Utc::now() - Duration::days(day) - Duration::hours(slot as i64 * 5);
            sqlx::query("UPDATE orders SET created_at = ? WHERE id = ?")
                .bind(placed_at)
                .bind(&created.order.id)
                .execute(office.database().pool())
                .await?;

            placed += 1;
        }
    }
    office.cache().clear();
    println!("✓ Generated {} orders", placed);

    let elapsed = start.elapsed();
    println!();
    println!("✓ Seeded in {:?}", elapsed);

    // Summaries
    println!();
    println!("Verifying reports...");
    let end = Utc::now();
    let month_ago = end - Duration::days(31);

    let financial = office.generate_financial_report(month_ago, end).await?;
    println!(
        "  Financial: {} orders, revenue {}, profit {} ({:.1}%)",
        financial.order_count,
        financial.total_revenue,
        financial.gross_profit,
        financial.profit_margin
    );
    println!(
        "  Cost tiers: inventory {}, supplier {}, margin {}, default {}, none {}",
        financial.cost_coverage.inventory_cost,
        financial.cost_coverage.supplier_price,
        financial.cost_coverage.product_margin,
        financial.cost_coverage.default_margin,
        financial.cost_coverage.no_cost
    );

    if dump_json {
        println!("{}", serde_json::to_string_pretty(&*financial)?);
    }

    let sales = office
        .generate_sales_report(month_ago, end, SalesGrouping::Week)
        .await?;
    println!(
        "  Sales: {} completed orders across {} weeks",
        sales.order_count,
        sales.sales_by_period.len()
    );

    let users = office.generate_user_report(None, None).await?;
    println!(
        "  Users: {} total, {} active",
        users.total_users, users.active_users
    );

    let inventory = office.inventory_report(&InventoryFilter::default()).await?;
    println!(
        "  Inventory: {} rows, {} units, {} movements",
        inventory.stats.total_products, inventory.stats.total_quantity, inventory.stats.total_movements
    );

    info!(cache = ?office.cache().stats(), "Seed finished");
    office.shutdown().await;

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tienda_db=trace` - Show trace for the database crate only
/// - Default: INFO, DEBUG for tienda crates
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tienda=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
