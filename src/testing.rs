//! Test doubles.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::identity::UserId;
use crate::memory::InMemoryStore;
use crate::models::{
    Edge, EdgeId, EdgePatch, Graph, GraphId, GraphPatch, NewEdge, NewGraph, NewNode, Node,
    NodeId, NodePatch,
};
use crate::store::EntityStore;

/// Records every store call, then delegates to an [`InMemoryStore`].
#[derive(Debug, Default)]
pub struct SpyStore {
    inner: InMemoryStore,
    calls: Mutex<Vec<&'static str>>,
    node_lookups: Mutex<Vec<NodeId>>,
}

impl SpyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: &'static str) {
        self.calls
            .lock()
            .expect("spy call log poisoned")
            .push(call);
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .expect("spy call log poisoned")
            .iter()
            .filter(|recorded| **recorded == call)
            .count()
    }

    pub fn node_lookups(&self) -> Vec<NodeId> {
        self.node_lookups
            .lock()
            .expect("spy lookup log poisoned")
            .clone()
    }
}

#[async_trait]
impl EntityStore for SpyStore {
    async fn list_graphs(&self, owner_id: UserId) -> Result<Vec<Graph>> {
        self.record("list_graphs");
        self.inner.list_graphs(owner_id).await
    }

    async fn insert_graph(&self, graph: NewGraph) -> Result<Graph> {
        self.record("insert_graph");
        self.inner.insert_graph(graph).await
    }

    async fn find_graph(&self, graph_id: GraphId) -> Result<Option<Graph>> {
        self.record("find_graph");
        self.inner.find_graph(graph_id).await
    }

    async fn update_graph(
        &self,
        owner_id: UserId,
        graph_id: GraphId,
        patch: &GraphPatch,
    ) -> Result<Option<Graph>> {
        self.record("update_graph");
        self.inner.update_graph(owner_id, graph_id, patch).await
    }

    async fn delete_graph(&self, graph_id: GraphId) -> Result<()> {
        self.record("delete_graph");
        self.inner.delete_graph(graph_id).await
    }

    async fn list_nodes(&self, graph_id: GraphId) -> Result<Vec<Node>> {
        self.record("list_nodes");
        self.inner.list_nodes(graph_id).await
    }

    async fn node_exists(&self, node_id: NodeId) -> Result<bool> {
        self.record("node_exists");
        self.node_lookups
            .lock()
            .expect("spy lookup log poisoned")
            .push(node_id);
        self.inner.node_exists(node_id).await
    }

    async fn insert_node(&self, node: NewNode) -> Result<Node> {
        self.record("insert_node");
        self.inner.insert_node(node).await
    }

    async fn update_node(&self, node_id: NodeId, patch: &NodePatch) -> Result<Option<Node>> {
        self.record("update_node");
        self.inner.update_node(node_id, patch).await
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<()> {
        self.record("delete_node");
        self.inner.delete_node(node_id).await
    }

    async fn list_edges(&self, graph_id: GraphId) -> Result<Vec<Edge>> {
        self.record("list_edges");
        self.inner.list_edges(graph_id).await
    }

    async fn insert_edge(&self, edge: NewEdge) -> Result<Edge> {
        self.record("insert_edge");
        self.inner.insert_edge(edge).await
    }

    async fn update_edge(&self, edge_id: EdgeId, patch: &EdgePatch) -> Result<Option<Edge>> {
        self.record("update_edge");
        self.inner.update_edge(edge_id, patch).await
    }

    async fn delete_edge(&self, edge_id: EdgeId) -> Result<()> {
        self.record("delete_edge");
        self.inner.delete_edge(edge_id).await
    }
}
