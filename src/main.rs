use std::process;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::{error, info};

use todo_auth::auth::{LogNotifier, QueuedNotifier};
use todo_auth::config::Config;
use todo_auth::routes::{self, health};
use todo_auth::services::AppServices;
use todo_auth::store::{self, postgres, PgCredentialStore, PgRefreshTokenStore, RefreshTokenStore};

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    error!("{}: {}", context, err);
    process::exit(1);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().unwrap_or_else(|e| fail("Invalid configuration", e));

    let pool = postgres::connect(&config.database_url, config.store_timeout)
        .await
        .unwrap_or_else(|e| fail("Failed to connect to database", e));
    if let Err(e) = postgres::run_migrations(&pool).await {
        fail("Failed to run migrations", e);
    }

    let refresh_tokens: Arc<dyn RefreshTokenStore> =
        Arc::new(PgRefreshTokenStore::new(pool.clone()));
    let users = Arc::new(PgCredentialStore::new(pool));

    let notifier = Arc::new(QueuedNotifier::spawn(Arc::new(LogNotifier), 256));
    let services = AppServices::build(&config, users, refresh_tokens.clone(), notifier)
        .unwrap_or_else(|e| fail("Failed to initialise services", e));
    if let Err(e) = services.seed_admin(config.admin.as_ref()).await {
        fail("Failed to seed administrator account", e);
    }

    if let Some(every) = config.sweep_interval {
        store::spawn_expiry_sweeper(refresh_tokens, every);
        info!("Expired refresh tokens are swept every {:?}", every);
    }

    info!("Starting server at {}", config.server_url());
    HttpServer::new(move || {
        App::new()
            .configure(|cfg| services.configure(cfg))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(services.auth_middleware())
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
