//! # Seed Data Generator
//!
//! Populates the database with development categories and products.
//!
//! ## Usage
//! ```bash
//! # Default database path (./tinysales.db) and product count
//! cargo run -p tinysales-db --bin seed
//!
//! # Custom amount / path
//! cargo run -p tinysales-db --bin seed -- --count 500 --db ./data/dev.db
//! ```
//!
//! Each product gets a deterministic pseudo-random price ($0.99-$9.99)
//! and opening stock (0-100) derived from its index, so reseeding a
//! fresh database produces identical data.

use chrono::Utc;
use std::env;
use tinysales_core::{Category, Product};
use tinysales_db::repository::category::generate_category_id;
use tinysales_db::repository::product::generate_product_id;
use tinysales_db::{Database, DbConfig};

/// Categories with sample product names.
const CATALOG: &[(&str, &[&str])] = &[
    (
        "Beverages",
        &[
            "Cola", "Lemonade", "Orange Juice", "Apple Juice", "Sparkling Water", "Iced Tea",
            "Cold Brew Coffee", "Ginger Beer",
        ],
    ),
    (
        "Snacks",
        &[
            "Potato Chips", "Pretzels", "Trail Mix", "Granola Bar", "Dark Chocolate", "Popcorn",
            "Rice Crackers",
        ],
    ),
    (
        "Pantry",
        &[
            "Spaghetti", "Basmati Rice", "Olive Oil", "Tomato Passata", "Chickpeas", "Honey",
            "Peanut Butter",
        ],
    ),
    (
        "Household",
        &["Dish Soap", "Paper Towels", "Sponges", "Laundry Detergent", "Trash Bags"],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./tinysales.db".to_string());
    let count: usize = arg_value(&args, "--count")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    println!("Seeding {} products into {}", count, db_path);

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let start = std::time::Instant::now();
    let now = Utc::now();

    // Categories first so products can reference them.
    let mut category_ids = Vec::new();
    for (name, _) in CATALOG {
        let category = Category {
            id: generate_category_id(),
            name: (*name).to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        db.categories().insert(&category).await?;
        category_ids.push(category.id);
    }

    let mut generated = 0usize;
    'outer: loop {
        for (cat_index, (_, names)) in CATALOG.iter().enumerate() {
            for name in *names {
                if generated >= count {
                    break 'outer;
                }

                let product = generate_product(name, &category_ids[cat_index], generated, now);
                db.products().insert(&product).await?;
                generated += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    let total = db.products().count().await?;
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!("  Active products in database: {}", total);
    println!("✓ Seed complete!");

    Ok(())
}

/// Returns the value following `flag` in the argument list, if any.
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// Generates a single product with deterministic pseudo-random data.
fn generate_product(
    name: &str,
    category_id: &str,
    seed: usize,
    now: chrono::DateTime<Utc>,
) -> Product {
    // Price: $0.99 - $9.99
    let price_cents = 99 + ((seed * 17) % 900) as i64;

    // Opening stock: 0 - 100
    let available_quantity = (seed % 101) as i64;

    // Vary names across rounds so reseeding larger counts stays unique
    let full_name = if seed < CATALOG.iter().map(|(_, n)| n.len()).sum() {
        name.to_string()
    } else {
        format!("{} #{}", name, seed)
    };

    Product {
        id: generate_product_id(),
        name: full_name,
        category_id: Some(category_id.to_string()),
        price_cents,
        available_quantity,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
