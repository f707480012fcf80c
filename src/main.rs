use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use homokapoi_graph::api::{AppState, router};
use homokapoi_graph::config::AppConfig;
use homokapoi_graph::db::{PgStore, create_graph_tables};
use homokapoi_graph::identity::{IdentityVerifier, NoIdentityVerifier, SupabaseIdentityVerifier};
use homokapoi_graph::memory::InMemoryStore;
use homokapoi_graph::store::SharedStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;

    let store: SharedStore = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(database_url)
                .await
                .context("failed to connect to postgres")?;

            if !config.skip_migrations {
                create_graph_tables(&pool)
                    .await
                    .context("failed to run graph migrations")?;
            }
            Arc::new(PgStore::new(Arc::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; graphs are kept in memory and lost on exit");
            Arc::new(InMemoryStore::new())
        }
    };

    let identity: Arc<dyn IdentityVerifier> = match &config.supabase {
        Some(supabase) => Arc::new(SupabaseIdentityVerifier::new(
            &supabase.url,
            supabase.api_key.clone(),
        )),
        None => {
            tracing::warn!("SUPABASE_URL or key not set; every caller is anonymous");
            Arc::new(NoIdentityVerifier)
        }
    };

    let app = router(AppState::new(store, identity));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.bind_addr))?;
    tracing::info!("graph api listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("graph api server failed")
}
