use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

use claimdrop::clock::SystemClock;
use claimdrop::config::Config;
use claimdrop::db::{AppState, create_pool, init_db, queries};
use claimdrop::models::{ActorType, AuditAction, CreateAdmin, CreateOrder, CreateProduct};
use claimdrop::util::AuditLogBuilder;

#[derive(Parser, Debug)]
#[command(name = "claimdrop")]
#[command(about = "Order claims for digital downloads")]
struct Cli {
    /// Seed the database with dev data (admin, products, orders)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

fn bootstrap_first_admin(state: &AppState, username: &str) {
    let conn = state.db.get().expect("Failed to get db connection for bootstrap");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Admins already exist, skipping bootstrap");
        return;
    }

    let input = CreateAdmin {
        username: username.to_string(),
    };
    input.validate().expect("BOOTSTRAP_ADMIN_USERNAME is not a valid username");

    let (admin, api_key) =
        queries::create_admin(&conn, &input, state.now()).expect("Failed to create bootstrap admin");

    AuditLogBuilder::system(&conn, state.audit_log_enabled, state.now())
        .actor(ActorType::System, None)
        .action(AuditAction::BootstrapAdmin)
        .resource("admin", &admin.id.to_string())
        .details(&serde_json::json!({ "username": admin.username }))
        .save()
        .expect("Failed to create audit log for bootstrap");

    tracing::info!("============================================");
    tracing::info!("BOOTSTRAP ADMIN CREATED");
    tracing::info!("Username: {}", admin.username);
    tracing::info!("API Key: {}", api_key);
    tracing::info!("============================================");
    tracing::info!("SAVE THIS API KEY - IT WILL NOT BE SHOWN AGAIN");
    tracing::info!("============================================");
}

/// Seeds the database with dev data: an admin, two products, a one-time
/// order and a multi-use order. Only runs in dev mode on an empty database.
fn seed_dev_data(state: &AppState) {
    let mut conn = state.db.get().expect("Failed to get db connection for seeding");

    let count = queries::count_admins(&conn).expect("Failed to count admins");
    if count > 0 {
        tracing::info!("Database already has data, skipping seed");
        return;
    }

    tracing::info!("============================================");
    tracing::info!("SEEDING DEV DATA");
    tracing::info!("============================================");

    let now = state.now();

    let (admin, admin_api_key) = queries::create_admin(
        &conn,
        &CreateAdmin {
            username: "dev".to_string(),
        },
        now,
    )
    .expect("Failed to create dev admin");

    let ebook = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Field Guide (PDF)".to_string(),
            description: Some("The complete guide, DRM-free".to_string()),
            download_link: "https://downloads.example.com/field-guide.pdf".to_string(),
            image_url: None,
        },
        now,
    )
    .expect("Failed to create dev product");

    let bundle = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Sample Pack".to_string(),
            description: None,
            download_link: "https://downloads.example.com/sample-pack.zip".to_string(),
            image_url: Some("https://downloads.example.com/sample-pack.png".to_string()),
        },
        now,
    )
    .expect("Failed to create dev product");

    let one_time = queries::create_order(
        &mut conn,
        &CreateOrder {
            order_id: "DEV-ONCE".to_string(),
            product_ids: vec![ebook.id, bundle.id],
            expiration_days: Some(7),
            one_time_use: Some(true),
        },
        now,
    )
    .expect("Failed to create dev order");

    let multi_use = queries::create_order(
        &mut conn,
        &CreateOrder {
            order_id: "DEV-MULTI".to_string(),
            product_ids: vec![bundle.id],
            expiration_days: None,
            one_time_use: Some(false),
        },
        now,
    )
    .expect("Failed to create dev order");

    AuditLogBuilder::system(&conn, state.audit_log_enabled, now)
        .action(AuditAction::SeedData)
        .resource("seed", "dev")
        .details(&serde_json::json!({
            "admin": admin.username,
            "products": [ebook.id, bundle.id],
            "orders": [one_time.order_id, multi_use.order_id],
        }))
        .save()
        .expect("Failed to create audit log");

    tracing::info!("Admin: {} (id: {})", admin.username, admin.id);
    tracing::info!("Products: {} ({}), {} ({})", ebook.name, ebook.id, bundle.name, bundle.id);
    tracing::info!("One-time order: {}", one_time.order_id);
    tracing::info!("Multi-use order: {}", multi_use.order_id);
    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED SUCCESSFULLY");
    tracing::info!("============================================");

    // Copy-paste friendly output
    println!();
    println!("--- COPY FROM HERE ---");
    println!("  admin_api_key: {}", admin_api_key);
    println!("  one_time_order: {}", one_time.order_id);
    println!("  multi_use_order: {}", multi_use.order_id);
    println!("--- END COPY ---");
    println!();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimdrop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        clock: Arc::new(SystemClock),
        audit_log_enabled: config.audit_log_enabled,
        reset_claims_on_one_time_flip: config.reset_claims_on_one_time_flip,
    };

    if !config.reset_claims_on_one_time_flip {
        tracing::info!("Claim counts are kept when an order is switched to one-time use");
    }

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set CLAIMDROP_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    if let Some(ref username) = config.bootstrap_admin_username {
        bootstrap_first_admin(&state, username);
    }

    let app = claimdrop::build_app(state, Some(config.rate_limit));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();

    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral flag ignored: not in dev mode (set CLAIMDROP_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Claimdrop server listening on {}", addr);

    // Connect info is required by the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
        tracing::info!("Ephemeral cleanup complete");
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
