use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::identity::UserId;
use crate::models::{
    Edge, EdgeId, EdgePatch, Graph, GraphId, GraphPatch, NewEdge, NewGraph, NewNode, Node,
    NodeId, NodePatch,
};
use crate::store::EntityStore;

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_graph_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

const GRAPH_COLUMNS: &str = "id, owner_id, name, description, created_at, updated_at";
const NODE_COLUMNS: &str =
    "id, graph_id, type AS node_type, label, value, x_position, y_position, created_at, updated_at";
const EDGE_COLUMNS: &str = "id, graph_id, source_node_id, target_node_id, type AS edge_type, \
     weight, description, created_at";

#[derive(Debug, Clone, FromRow)]
struct GraphRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct NodeRow {
    id: Uuid,
    graph_id: Uuid,
    node_type: Option<String>,
    label: String,
    value: Option<serde_json::Value>,
    x_position: f64,
    y_position: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct EdgeRow {
    id: Uuid,
    graph_id: Uuid,
    source_node_id: Uuid,
    target_node_id: Uuid,
    edge_type: String,
    weight: Option<f64>,
    description: String,
    created_at: DateTime<Utc>,
}

impl From<GraphRow> for Graph {
    fn from(value: GraphRow) -> Self {
        Self {
            id: GraphId(value.id),
            owner_id: UserId(value.owner_id),
            name: value.name,
            description: value.description,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<NodeRow> for Node {
    fn from(value: NodeRow) -> Self {
        Self {
            id: NodeId(value.id),
            graph_id: GraphId(value.graph_id),
            node_type: value.node_type,
            label: value.label,
            value: value.value,
            x_position: value.x_position,
            y_position: value.y_position,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<EdgeRow> for Edge {
    fn from(value: EdgeRow) -> Self {
        Self {
            id: EdgeId(value.id),
            graph_id: GraphId(value.graph_id),
            source_node_id: NodeId(value.source_node_id),
            target_node_id: NodeId(value.target_node_id),
            edge_type: value.edge_type,
            weight: value.weight,
            description: value.description,
            created_at: value.created_at,
        }
    }
}

/// Foreign-key violations are the caller's fault; everything else is ours.
fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_foreign_key_violation() {
            return LibError::invalid_with_code(
                "foreign_key_violation",
                "Referenced record does not exist",
                anyhow!(err),
            );
        }
    }
    LibError::database(public, anyhow!(err))
}

#[derive(Clone)]
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn list_graphs(&self, owner_id: UserId) -> Result<Vec<Graph>> {
        let rows = sqlx::query_as::<_, GraphRow>(&format!(
            "SELECT {GRAPH_COLUMNS} FROM graphs WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to list graphs", err))?;

        Ok(rows.into_iter().map(Graph::from).collect())
    }

    async fn insert_graph(&self, graph: NewGraph) -> Result<Graph> {
        let row = sqlx::query_as::<_, GraphRow>(&format!(
            r#"
            INSERT INTO graphs (id, owner_id, name, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {GRAPH_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(graph.owner_id.0)
        .bind(&graph.name)
        .bind(&graph.description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to create graph", err))?;

        Ok(row.into())
    }

    async fn find_graph(&self, graph_id: GraphId) -> Result<Option<Graph>> {
        let row = sqlx::query_as::<_, GraphRow>(&format!(
            "SELECT {GRAPH_COLUMNS} FROM graphs WHERE id = $1"
        ))
        .bind(graph_id.0)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query graph", err))?;

        Ok(row.map(Graph::from))
    }

    async fn update_graph(
        &self,
        owner_id: UserId,
        graph_id: GraphId,
        patch: &GraphPatch,
    ) -> Result<Option<Graph>> {
        let row = sqlx::query_as::<_, GraphRow>(&format!(
            r#"
            UPDATE graphs
            SET name = COALESCE($3, name),
                description = COALESCE($4, description),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
              AND owner_id = $2
            RETURNING {GRAPH_COLUMNS}
            "#
        ))
        .bind(graph_id.0)
        .bind(owner_id.0)
        .bind(patch.name.as_deref())
        .bind(patch.description.as_deref())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to update graph", err))?;

        Ok(row.map(Graph::from))
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        sqlx::query("DELETE FROM graphs WHERE id = $1")
            .bind(graph_id.0)
            .execute(&*self.pool)
            .await
            .map_err(|err| db_err("Failed to delete graph", err))?;
        Ok(())
    }

    async fn list_nodes(&self, graph_id: GraphId) -> Result<Vec<Node>> {
        let rows = sqlx::query_as::<_, NodeRow>(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE graph_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(graph_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query graph nodes", err))?;

        Ok(rows.into_iter().map(Node::from).collect())
    }

    async fn node_exists(&self, node_id: NodeId) -> Result<bool> {
        let exists: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM nodes WHERE id = $1)")
                .bind(node_id.0)
                .fetch_one(&*self.pool)
                .await
                .map_err(|err| db_err("Failed to query node", err))?;

        Ok(exists.0)
    }

    async fn insert_node(&self, node: NewNode) -> Result<Node> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            INSERT INTO nodes (id, graph_id, type, label, value, x_position, y_position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(node.graph_id.0)
        .bind(&node.node_type)
        .bind(&node.label)
        .bind(&node.value)
        .bind(node.x_position)
        .bind(node.y_position)
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to create node", err))?;

        Ok(row.into())
    }

    async fn update_node(&self, node_id: NodeId, patch: &NodePatch) -> Result<Option<Node>> {
        let row = sqlx::query_as::<_, NodeRow>(&format!(
            r#"
            UPDATE nodes
            SET label = COALESCE($2, label),
                value = CASE WHEN $3 THEN $4::jsonb ELSE value END,
                x_position = COALESCE($5, x_position),
                y_position = COALESCE($6, y_position),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING {NODE_COLUMNS}
            "#
        ))
        .bind(node_id.0)
        .bind(patch.label.as_deref())
        .bind(patch.value.is_some())
        .bind(patch.value.clone().flatten())
        .bind(patch.x_position)
        .bind(patch.y_position)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to update node", err))?;

        Ok(row.map(Node::from))
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<()> {
        sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(node_id.0)
            .execute(&*self.pool)
            .await
            .map_err(|err| db_err("Failed to delete node", err))?;
        Ok(())
    }

    async fn list_edges(&self, graph_id: GraphId) -> Result<Vec<Edge>> {
        let rows = sqlx::query_as::<_, EdgeRow>(&format!(
            "SELECT {EDGE_COLUMNS} FROM edges WHERE graph_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(graph_id.0)
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query graph edges", err))?;

        Ok(rows.into_iter().map(Edge::from).collect())
    }

    async fn insert_edge(&self, edge: NewEdge) -> Result<Edge> {
        let row = sqlx::query_as::<_, EdgeRow>(&format!(
            r#"
            INSERT INTO edges (
                id,
                graph_id,
                source_node_id,
                target_node_id,
                type,
                weight,
                description
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EDGE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(edge.graph_id.0)
        .bind(edge.source_node_id.0)
        .bind(edge.target_node_id.0)
        .bind(&edge.edge_type)
        .bind(edge.weight)
        .bind(&edge.description)
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to create edge", err))?;

        Ok(row.into())
    }

    async fn update_edge(&self, edge_id: EdgeId, patch: &EdgePatch) -> Result<Option<Edge>> {
        let row = sqlx::query_as::<_, EdgeRow>(&format!(
            r#"
            UPDATE edges
            SET weight = CASE WHEN $2 THEN $3::double precision ELSE weight END,
                description = COALESCE($4, description)
            WHERE id = $1
            RETURNING {EDGE_COLUMNS}
            "#
        ))
        .bind(edge_id.0)
        .bind(patch.weight.is_some())
        .bind(patch.weight.flatten())
        .bind(patch.description.as_deref())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to update edge", err))?;

        Ok(row.map(Edge::from))
    }

    async fn delete_edge(&self, edge_id: EdgeId) -> Result<()> {
        sqlx::query("DELETE FROM edges WHERE id = $1")
            .bind(edge_id.0)
            .execute(&*self.pool)
            .await
            .map_err(|err| db_err("Failed to delete edge", err))?;
        Ok(())
    }
}
