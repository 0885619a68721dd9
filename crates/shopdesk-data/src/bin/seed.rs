//! # Seed Data Generator
//!
//! Populates a SQLite store with permission profiles, an administrator
//! profile and a repair-shop catalogue for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./shopdesk_dev.db with the default catalogue
//! cargo run -p shopdesk-data --bin seed
//!
//! # Custom path and product count
//! cargo run -p shopdesk-data --bin seed -- --db ./data/shopdesk.db --count 200
//!
//! # More logging
//! RUST_LOG=shopdesk_data=debug cargo run -p shopdesk-data --bin seed
//! ```

use std::collections::BTreeSet;
use std::env;
use std::path::PathBuf;

use shopdesk_core::{Actor, Permission, UserProfile};
use shopdesk_data::{DataConfig, DataLayer, NewPermissionProfile, NewProduct, ProductFilter};
use shopdesk_store::{casing, resources, Insert, RemoteStore, SqliteConfig, SqliteStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (SKU prefix, category, names)
const CATALOGUE: &[(&str, &str, &[&str])] = &[
    (
        "SCR",
        "Screens",
        &["iPhone 11 Screen", "iPhone 12 Screen", "Galaxy S21 Screen", "Moto G8 Screen", "Redmi Note 9 Screen"],
    ),
    (
        "BAT",
        "Batteries",
        &["iPhone 11 Battery", "iPhone X Battery", "Galaxy A52 Battery", "Moto E7 Battery"],
    ),
    (
        "CHG",
        "Chargers",
        &["USB-C Cable 1m", "Lightning Cable 1m", "20W Wall Charger", "Car Charger Dual USB"],
    ),
    (
        "ACC",
        "Accessories",
        &["Tempered Glass", "Silicone Case", "Phone Stand", "Earbuds", "Memory Card 64GB"],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut count: usize = usize::MAX;
    let mut db_path = PathBuf::from("./shopdesk_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(usize::MAX);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("ShopDesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Maximum number of products (default: all)");
                println!("  -d, --db <PATH>    Database file path (default: ./shopdesk_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let store = Arc::new(SqliteStore::connect(SqliteConfig::new(db_path.clone())).await?);
    info!(path = %db_path.display(), "Connected");

    let mut config = DataConfig::load_or_default(None);
    config.remote.database_path = Some(db_path);
    let layer = DataLayer::builder(config).store(store.clone()).build()?;

    let existing = layer.products().list(&ProductFilter::default()).await?;
    if !existing.is_empty() {
        warn!(existing = existing.len(), "Store already has products, skipping seed");
        return Ok(());
    }

    // Bootstrap actor: the admin profile does not exist yet.
    let admin = Actor {
        user_id: "seed-admin".into(),
        user_name: "Administrator".into(),
        is_admin: true,
        permissions: BTreeSet::new(),
    };

    let admin_profile = layer
        .permission_profiles()
        .create(
            &admin,
            NewPermissionProfile {
                name: "Administrator".into(),
                is_admin: true,
                permissions: BTreeSet::new(),
            },
        )
        .await?;
    layer
        .permission_profiles()
        .create(
            &admin,
            NewPermissionProfile {
                name: "Cashier".into(),
                is_admin: false,
                permissions: [Permission::ManageCash].into_iter().collect(),
            },
        )
        .await?;
    layer
        .permission_profiles()
        .create(
            &admin,
            NewPermissionProfile {
                name: "Technician".into(),
                is_admin: false,
                permissions: [Permission::ManageInventory, Permission::ViewReports]
                    .into_iter()
                    .collect(),
            },
        )
        .await?;
    info!("Permission profiles created");

    let profile = UserProfile {
        id: admin.user_id.clone(),
        name: admin.user_name.clone(),
        email: "admin@shopdesk.local".into(),
        permission_profile_id: Some(admin_profile.id),
        active: true,
        created_at: Some(chrono::Utc::now()),
    };
    store
        .insert(Insert::new(resources::USERS, casing::encode(&profile)?))
        .await?;
    info!(email = %profile.email, "Administrator profile created");

    let mut generated = 0usize;
    'catalogue: for (category_idx, (prefix, category, names)) in CATALOGUE.iter().enumerate() {
        for (idx, name) in names.iter().enumerate() {
            if generated >= count {
                break 'catalogue;
            }
            let seed = category_idx * 100 + idx;
            let price_cents = 1_990 + ((seed * 1_731) % 30_000) as i64;
            let input = NewProduct {
                sku: format!("{prefix}-{:03}", idx + 1),
                name: name.to_string(),
                category: Some(category.to_string()),
                price_cents,
                cost_cents: Some(price_cents * (55 + (seed % 20) as i64) / 100),
                stock: (seed % 25) as i64,
            };
            match layer.products().create(&admin, input).await {
                Ok(_) => generated += 1,
                Err(e) => warn!(name, error = %e, "Failed to insert product"),
            }
        }
    }
    info!(generated, "Products created");

    layer.shutdown().await;
    info!("Seed complete");
    Ok(())
}
