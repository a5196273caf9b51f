use migration::{Migrator, MigratorTrait};
use sea_orm::ConnectOptions;
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "points_ledger={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let server = settings.server;
    let db = parse_database(&server.database).await?;
    let engine = engine::Engine::builder().database(db).build().await?;

    let addr = format!("{}:{}", server.bind, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tokio::select! {
        result = server::run_with_listener(engine, listener) => {
            if let Err(err) = result {
                tracing::error!("server failed: {err}");
                return Err(err.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let mut options = ConnectOptions::new(config.url());
    if *config == Database::Memory {
        // Every pooled connection would otherwise open its own empty database.
        options.max_connections(1);
    }

    let database = sea_orm::Database::connect(options).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready at {}", config.url());
    Ok(database)
}
