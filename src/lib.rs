#[cfg(feature = "api")]
pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod edges;
pub mod error;
pub mod graphs;
pub mod identity;
pub mod memory;
pub mod models;
pub mod nodes;
pub mod operations;
pub mod permissions;
pub mod store;
#[cfg(test)]
mod testing;

pub mod prelude {
    #[cfg(feature = "api")]
    pub use crate::api::{AppState, GraphApp, HasIdentity, HasStore, router, routes};
    pub use crate::config::AppConfig;
    #[cfg(feature = "sqlx")]
    pub use crate::db::{PgStore, create_graph_tables};
    pub use crate::error::{ErrorKind, LibError, Result};
    #[cfg(feature = "api")]
    pub use crate::identity::SupabaseIdentityVerifier;
    pub use crate::identity::{
        Caller, IdentityVerifier, NoIdentityVerifier, StaticIdentityVerifier, UserId,
    };
    pub use crate::memory::InMemoryStore;
    pub use crate::models::{
        CreateEdgePayload, CreateGraphPayload, CreateNodePayload, Edge, EdgeId, EdgePatch, Graph,
        GraphDetail, GraphId, GraphPatch, Node, NodeId, NodePatch,
    };
    pub use crate::operations::{GraphOperation, GraphOperationResult, GraphOperations};
    pub use crate::permissions::Access;
    pub use crate::store::{EntityStore, SharedStore};
}
