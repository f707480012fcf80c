//! Graph aggregate: owner-scoped create, list, fetch, update and delete.

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::identity::UserId;
use crate::models::{CreateGraphPayload, Graph, GraphDetail, GraphId, GraphPatch};
use crate::store::EntityStore;

/// Graphs owned by `caller`. Anonymous callers see nothing.
pub async fn list(store: &dyn EntityStore, caller: Option<UserId>) -> Result<Vec<Graph>> {
    let Some(owner_id) = caller else {
        tracing::info!("No authenticated user, returning empty graph list");
        return Ok(Vec::new());
    };

    let graphs = store.list_graphs(owner_id).await?;
    tracing::info!(count = graphs.len(), user_id = %owner_id, "Fetched graphs");
    Ok(graphs)
}

pub async fn create(
    store: &dyn EntityStore,
    owner_id: UserId,
    payload: CreateGraphPayload,
) -> Result<Graph> {
    let graph = store.insert_graph(payload.normalize(owner_id)).await?;
    tracing::info!(graph_id = %graph.id, user_id = %owner_id, "Graph created");
    Ok(graph)
}

pub async fn get(store: &dyn EntityStore, graph_id: GraphId) -> Result<GraphDetail> {
    let Some(graph) = store.find_graph(graph_id).await? else {
        return Err(LibError::not_found(
            "Graph not found",
            anyhow!("graph {} not found", graph_id),
        ));
    };

    let nodes = store.list_nodes(graph_id).await?;
    let edges = store.list_edges(graph_id).await?;
    tracing::info!(
        graph_id = %graph_id,
        nodes = nodes.len(),
        edges = edges.len(),
        "Fetched graph"
    );

    Ok(GraphDetail {
        graph,
        nodes,
        edges,
    })
}

pub async fn update(
    store: &dyn EntityStore,
    owner_id: UserId,
    graph_id: GraphId,
    patch: GraphPatch,
) -> Result<Graph> {
    if patch.is_empty() {
        return Err(LibError::invalid_with_code(
            "no_fields_to_update",
            "No fields to update",
            anyhow!("graph {} update carried no recognized fields", graph_id),
        ));
    }

    // Zero rows covers both a missing graph and one owned by someone else.
    let Some(graph) = store.update_graph(owner_id, graph_id, &patch).await? else {
        return Err(LibError::not_found(
            "Graph not found",
            anyhow!("graph {} not updatable by user {}", graph_id, owner_id),
        ));
    };

    tracing::info!(graph_id = %graph_id, "Graph updated");
    Ok(graph)
}

pub async fn delete(store: &dyn EntityStore, graph_id: GraphId) -> Result<()> {
    store.delete_graph(graph_id).await?;
    tracing::info!(graph_id = %graph_id, "Graph deleted");
    Ok(())
}
