//! The entity store seam.
//!
//! Services only ever talk to an `Arc<dyn EntityStore>`. Implementations own
//! durability, id assignment, foreign keys and the owner-scoped write policy on
//! graphs. Deleting a graph removes its nodes and edges; deleting a node removes
//! the edges that touch it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::UserId;
use crate::models::{
    Edge, EdgeId, EdgePatch, Graph, GraphId, GraphPatch, NewEdge, NewGraph, NewNode, Node,
    NodeId, NodePatch,
};

pub type SharedStore = Arc<dyn EntityStore>;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list_graphs(&self, owner_id: UserId) -> Result<Vec<Graph>>;

    async fn insert_graph(&self, graph: NewGraph) -> Result<Graph>;

    async fn find_graph(&self, graph_id: GraphId) -> Result<Option<Graph>>;

    /// Applies the patch to the graph only when `owner_id` owns it. `None` means
    /// no row matched.
    async fn update_graph(
        &self,
        owner_id: UserId,
        graph_id: GraphId,
        patch: &GraphPatch,
    ) -> Result<Option<Graph>>;

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()>;

    async fn list_nodes(&self, graph_id: GraphId) -> Result<Vec<Node>>;

    async fn node_exists(&self, node_id: NodeId) -> Result<bool>;

    async fn insert_node(&self, node: NewNode) -> Result<Node>;

    async fn update_node(&self, node_id: NodeId, patch: &NodePatch) -> Result<Option<Node>>;

    async fn delete_node(&self, node_id: NodeId) -> Result<()>;

    async fn list_edges(&self, graph_id: GraphId) -> Result<Vec<Edge>>;

    async fn insert_edge(&self, edge: NewEdge) -> Result<Edge>;

    async fn update_edge(&self, edge_id: EdgeId, patch: &EdgePatch) -> Result<Option<Edge>>;

    async fn delete_edge(&self, edge_id: EdgeId) -> Result<()>;
}
