//! In-process [`EntityStore`] used by tests and for running without a database.
//!
//! Mirrors the PostgreSQL schema: foreign keys are checked on insert and deletes
//! cascade the same way `ON DELETE CASCADE` does.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::identity::UserId;
use crate::models::{
    Edge, EdgeId, EdgePatch, Graph, GraphId, GraphPatch, NewEdge, NewGraph, NewNode, Node,
    NodeId, NodePatch,
};
use crate::store::EntityStore;

#[derive(Debug, Default)]
struct Tables {
    graphs: HashMap<GraphId, Graph>,
    nodes: HashMap<NodeId, Node>,
    edges: HashMap<EdgeId, Edge>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn foreign_key_violation(public: &'static str, source: anyhow::Error) -> LibError {
    LibError::invalid_with_code("foreign_key_violation", public, source)
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn list_graphs(&self, owner_id: UserId) -> Result<Vec<Graph>> {
        let tables = self.tables.read().await;
        let mut graphs: Vec<Graph> = tables
            .graphs
            .values()
            .filter(|graph| graph.owner_id == owner_id)
            .cloned()
            .collect();
        graphs.sort_by_key(|graph| (graph.created_at, graph.id.0));
        Ok(graphs)
    }

    async fn insert_graph(&self, graph: NewGraph) -> Result<Graph> {
        let now = Utc::now();
        let record = Graph {
            id: GraphId(Uuid::new_v4()),
            owner_id: graph.owner_id,
            name: graph.name,
            description: graph.description,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .graphs
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_graph(&self, graph_id: GraphId) -> Result<Option<Graph>> {
        Ok(self.tables.read().await.graphs.get(&graph_id).cloned())
    }

    async fn update_graph(
        &self,
        owner_id: UserId,
        graph_id: GraphId,
        patch: &GraphPatch,
    ) -> Result<Option<Graph>> {
        let mut tables = self.tables.write().await;
        let Some(graph) = tables
            .graphs
            .get_mut(&graph_id)
            .filter(|graph| graph.owner_id == owner_id)
        else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            graph.name = name.clone();
        }
        if let Some(description) = &patch.description {
            graph.description = description.clone();
        }
        graph.updated_at = Utc::now();
        Ok(Some(graph.clone()))
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.graphs.remove(&graph_id);
        tables.nodes.retain(|_, node| node.graph_id != graph_id);
        tables.edges.retain(|_, edge| edge.graph_id != graph_id);
        Ok(())
    }

    async fn list_nodes(&self, graph_id: GraphId) -> Result<Vec<Node>> {
        let tables = self.tables.read().await;
        let mut nodes: Vec<Node> = tables
            .nodes
            .values()
            .filter(|node| node.graph_id == graph_id)
            .cloned()
            .collect();
        nodes.sort_by_key(|node| (node.created_at, node.id.0));
        Ok(nodes)
    }

    async fn node_exists(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.tables.read().await.nodes.contains_key(&node_id))
    }

    async fn insert_node(&self, node: NewNode) -> Result<Node> {
        let mut tables = self.tables.write().await;
        if !tables.graphs.contains_key(&node.graph_id) {
            return Err(foreign_key_violation(
                "Node references a graph that does not exist",
                anyhow!("graph {} not found for node insert", node.graph_id),
            ));
        }

        let now = Utc::now();
        let record = Node {
            id: NodeId(Uuid::new_v4()),
            graph_id: node.graph_id,
            node_type: node.node_type,
            label: node.label,
            value: node.value,
            x_position: node.x_position,
            y_position: node.y_position,
            created_at: now,
            updated_at: now,
        };
        tables.nodes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_node(&self, node_id: NodeId, patch: &NodePatch) -> Result<Option<Node>> {
        let mut tables = self.tables.write().await;
        let Some(node) = tables.nodes.get_mut(&node_id) else {
            return Ok(None);
        };

        if let Some(label) = &patch.label {
            node.label = label.clone();
        }
        if let Some(value) = &patch.value {
            node.value = value.clone();
        }
        if let Some(x_position) = patch.x_position {
            node.x_position = x_position;
        }
        if let Some(y_position) = patch.y_position {
            node.y_position = y_position;
        }
        node.updated_at = Utc::now();
        Ok(Some(node.clone()))
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.nodes.remove(&node_id);
        tables
            .edges
            .retain(|_, edge| edge.source_node_id != node_id && edge.target_node_id != node_id);
        Ok(())
    }

    async fn list_edges(&self, graph_id: GraphId) -> Result<Vec<Edge>> {
        let tables = self.tables.read().await;
        let mut edges: Vec<Edge> = tables
            .edges
            .values()
            .filter(|edge| edge.graph_id == graph_id)
            .cloned()
            .collect();
        edges.sort_by_key(|edge| (edge.created_at, edge.id.0));
        Ok(edges)
    }

    async fn insert_edge(&self, edge: NewEdge) -> Result<Edge> {
        let mut tables = self.tables.write().await;
        if !tables.graphs.contains_key(&edge.graph_id) {
            return Err(foreign_key_violation(
                "Edge references a graph that does not exist",
                anyhow!("graph {} not found for edge insert", edge.graph_id),
            ));
        }
        for node_id in [edge.source_node_id, edge.target_node_id] {
            if !tables.nodes.contains_key(&node_id) {
                return Err(foreign_key_violation(
                    "Edge references a node that does not exist",
                    anyhow!("node {} not found for edge insert", node_id),
                ));
            }
        }

        let record = Edge {
            id: EdgeId(Uuid::new_v4()),
            graph_id: edge.graph_id,
            source_node_id: edge.source_node_id,
            target_node_id: edge.target_node_id,
            edge_type: edge.edge_type,
            weight: edge.weight,
            description: edge.description,
            created_at: Utc::now(),
        };
        tables.edges.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_edge(&self, edge_id: EdgeId, patch: &EdgePatch) -> Result<Option<Edge>> {
        let mut tables = self.tables.write().await;
        let Some(edge) = tables.edges.get_mut(&edge_id) else {
            return Ok(None);
        };

        if let Some(weight) = patch.weight {
            edge.weight = weight;
        }
        if let Some(description) = &patch.description {
            edge.description = description.clone();
        }
        Ok(Some(edge.clone()))
    }

    async fn delete_edge(&self, edge_id: EdgeId) -> Result<()> {
        self.tables.write().await.edges.remove(&edge_id);
        Ok(())
    }
}
