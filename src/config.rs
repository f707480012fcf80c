//! Runtime configuration, read from the environment at startup.

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub skip_migrations: bool,
    /// `None` leaves every caller anonymous.
    pub supabase: Option<SupabaseConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind = value("GRAPH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid GRAPH_BIND '{}'", bind))?;

        let max_connections = match value("GRAPH_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid GRAPH_DB_MAX_CONNECTIONS '{}'", raw))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let supabase = match (
            value("SUPABASE_URL"),
            value("SUPABASE_SERVICE_KEY").or_else(|| value("SUPABASE_KEY")),
        ) {
            (Some(url), Some(api_key)) => Some(SupabaseConfig { url, api_key }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_url: value("DATABASE_URL"),
            max_connections,
            skip_migrations: value("GRAPH_SKIP_MIGRATIONS").is_some_and(|raw| is_truthy(&raw)),
            supabase,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}
