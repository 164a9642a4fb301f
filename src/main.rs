use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quillpost::config::{Cli, Command, Config};
use quillpost::db;
use quillpost::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(AppState::new(pool, config)).await,
        Command::CreateGroup {
            slug,
            title,
            description,
        } => {
            let conn = pool.get()?;
            let group = db::groups::create(&conn, &title, &slug, &description)?;
            tracing::info!("Created group {} ({})", group.title, group.slug);
            Ok(())
        }
        Command::CreateUser { username, password } => {
            let hash = quillpost::auth::password::hash_password(&password)?;
            let conn = pool.get()?;
            let user = db::users::create(&conn, &username, Some(&hash))?;
            tracing::info!("Created user {}", user.username);
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr =
        format!("{}:{}", state.config.server.host, state.config.server.port).parse()?;
    let app = quillpost::routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
