use serde::{Deserialize, Serialize};

use crate::edges;
use crate::error::Result;
use crate::graphs;
use crate::identity::Caller;
use crate::models::{
    CreateEdgePayload, CreateGraphPayload, CreateNodePayload, Edge, EdgeId, EdgePatch, Graph,
    GraphDetail, GraphId, GraphPatch, Node, NodeId, NodePatch,
};
use crate::nodes;
use crate::permissions::{Access, Grant};
use crate::store::SharedStore;

/// Every graph, node and edge action the service exposes.
///
/// Each variant declares its [`Access`] level and [`GraphOperations::execute`]
/// enforces it before dispatching. The caller must come from verified request
/// state, never from the operation payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GraphOperation {
    ListGraphs,
    CreateGraph {
        payload: CreateGraphPayload,
    },
    GetGraph {
        graph_id: GraphId,
    },
    UpdateGraph {
        graph_id: GraphId,
        patch: GraphPatch,
    },
    DeleteGraph {
        graph_id: GraphId,
    },
    CreateNode {
        payload: CreateNodePayload,
    },
    UpdateNode {
        node_id: NodeId,
        patch: NodePatch,
    },
    DeleteNode {
        node_id: NodeId,
    },
    CreateEdge {
        payload: CreateEdgePayload,
    },
    UpdateEdge {
        edge_id: EdgeId,
        patch: EdgePatch,
    },
    DeleteEdge {
        edge_id: EdgeId,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GraphOperationResult {
    Graphs { graphs: Vec<Graph> },
    GraphCreated { graph: Graph },
    Graph { graph: Graph },
    GraphDetail { detail: GraphDetail },
    NodeCreated { node: Node },
    Node { node: Node },
    EdgeCreated { edge: Edge },
    Edge { edge: Edge },
    Deleted,
}

impl GraphOperation {
    pub const fn name(&self) -> &'static str {
        match self {
            GraphOperation::ListGraphs => "list_graphs",
            GraphOperation::CreateGraph { .. } => "create_graph",
            GraphOperation::GetGraph { .. } => "get_graph",
            GraphOperation::UpdateGraph { .. } => "update_graph",
            GraphOperation::DeleteGraph { .. } => "delete_graph",
            GraphOperation::CreateNode { .. } => "create_node",
            GraphOperation::UpdateNode { .. } => "update_node",
            GraphOperation::DeleteNode { .. } => "delete_node",
            GraphOperation::CreateEdge { .. } => "create_edge",
            GraphOperation::UpdateEdge { .. } => "update_edge",
            GraphOperation::DeleteEdge { .. } => "delete_edge",
        }
    }

    /// Nodes and edges carry no owner of their own; reads and deletes by id are
    /// left to the store's row policy.
    pub const fn access(&self) -> Access {
        match self {
            GraphOperation::CreateGraph { .. } => Access::Authenticated,
            GraphOperation::UpdateGraph { .. } => Access::Owner,
            GraphOperation::ListGraphs
            | GraphOperation::GetGraph { .. }
            | GraphOperation::DeleteGraph { .. }
            | GraphOperation::CreateNode { .. }
            | GraphOperation::UpdateNode { .. }
            | GraphOperation::DeleteNode { .. }
            | GraphOperation::CreateEdge { .. }
            | GraphOperation::UpdateEdge { .. }
            | GraphOperation::DeleteEdge { .. } => Access::Public,
        }
    }
}

#[derive(Clone)]
pub struct GraphOperations {
    store: SharedStore,
}

impl GraphOperations {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> SharedStore {
        SharedStore::clone(&self.store)
    }

    pub async fn execute(
        &self,
        caller: Caller,
        operation: GraphOperation,
    ) -> Result<GraphOperationResult> {
        let name = operation.name();
        let payload = format!("{operation:?}");
        tracing::info!(operation = name, payload = %payload, "Running graph operation");

        let result = match operation.access().authorize(caller) {
            Ok(grant) => self.dispatch(grant, operation).await,
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => tracing::info!(operation = name, "Graph operation succeeded"),
            Err(err) => {
                let detail = format!("{:#}", err.source);
                tracing::error!(
                    operation = name,
                    payload = %payload,
                    kind = ?err.kind,
                    code = err.code,
                    error = %detail,
                    "Graph operation failed"
                );
            }
        }
        result
    }

    async fn dispatch(
        &self,
        grant: Grant,
        operation: GraphOperation,
    ) -> Result<GraphOperationResult> {
        let store = self.store.as_ref();
        match operation {
            GraphOperation::ListGraphs => {
                let graphs = graphs::list(store, grant.user_id()).await?;
                Ok(GraphOperationResult::Graphs { graphs })
            }
            GraphOperation::CreateGraph { payload } => {
                let graph = graphs::create(store, grant.require_user()?, payload).await?;
                Ok(GraphOperationResult::GraphCreated { graph })
            }
            GraphOperation::GetGraph { graph_id } => {
                let detail = graphs::get(store, graph_id).await?;
                Ok(GraphOperationResult::GraphDetail { detail })
            }
            GraphOperation::UpdateGraph { graph_id, patch } => {
                let graph = graphs::update(store, grant.require_user()?, graph_id, patch).await?;
                Ok(GraphOperationResult::Graph { graph })
            }
            GraphOperation::DeleteGraph { graph_id } => {
                graphs::delete(store, graph_id).await?;
                Ok(GraphOperationResult::Deleted)
            }
            GraphOperation::CreateNode { payload } => {
                let node = nodes::create(store, payload).await?;
                Ok(GraphOperationResult::NodeCreated { node })
            }
            GraphOperation::UpdateNode { node_id, patch } => {
                let node = nodes::update(store, node_id, patch).await?;
                Ok(GraphOperationResult::Node { node })
            }
            GraphOperation::DeleteNode { node_id } => {
                nodes::delete(store, node_id).await?;
                Ok(GraphOperationResult::Deleted)
            }
            GraphOperation::CreateEdge { payload } => {
                let edge = edges::create(store, payload).await?;
                Ok(GraphOperationResult::EdgeCreated { edge })
            }
            GraphOperation::UpdateEdge { edge_id, patch } => {
                let edge = edges::update(store, edge_id, patch).await?;
                Ok(GraphOperationResult::Edge { edge })
            }
            GraphOperation::DeleteEdge { edge_id } => {
                edges::delete(store, edge_id).await?;
                Ok(GraphOperationResult::Deleted)
            }
        }
    }
}
