//! Node aggregate. Nodes belong to a graph; the store's foreign key is the only
//! check on `graph_id`.

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{CreateNodePayload, Node, NodeId, NodePatch};
use crate::store::EntityStore;

pub async fn create(store: &dyn EntityStore, payload: CreateNodePayload) -> Result<Node> {
    let node = store.insert_node(payload.normalize()).await?;
    tracing::info!(node_id = %node.id, graph_id = %node.graph_id, "Node created");
    Ok(node)
}

pub async fn update(store: &dyn EntityStore, node_id: NodeId, patch: NodePatch) -> Result<Node> {
    if patch.is_empty() {
        return Err(LibError::invalid_with_code(
            "no_fields_to_update",
            "No fields to update",
            anyhow!("node {} update carried no recognized fields", node_id),
        ));
    }

    let Some(node) = store.update_node(node_id, &patch).await? else {
        return Err(LibError::invalid_with_code(
            "node_not_found",
            "Node update matched no rows",
            anyhow!("node {} not found for update", node_id),
        ));
    };

    tracing::info!(node_id = %node_id, "Node updated");
    Ok(node)
}

pub async fn delete(store: &dyn EntityStore, node_id: NodeId) -> Result<()> {
    store.delete_node(node_id).await?;
    tracing::info!(node_id = %node_id, "Node deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::UserId;
    use crate::memory::InMemoryStore;
    use crate::models::{Graph, GraphId, NewGraph};

    async fn graph(store: &InMemoryStore) -> Graph {
        store
            .insert_graph(NewGraph {
                owner_id: UserId(Uuid::new_v4()),
                name: "Market".to_string(),
                description: String::new(),
            })
            .await
            .expect("graph")
    }

    fn payload(graph_id: GraphId) -> CreateNodePayload {
        serde_json::from_value(json!({
            "graph_id": graph_id.to_string(),
            "type": "segment",
        }))
        .expect("payload")
    }

    #[tokio::test]
    async fn create_with_only_graph_and_type_uses_defaults() {
        let store = InMemoryStore::new();
        let graph = graph(&store).await;

        let node = create(&store, payload(graph.id)).await.expect("create");
        assert_eq!(node.graph_id, graph.id);
        assert_eq!(node.node_type.as_deref(), Some("segment"));
        assert_eq!(node.label, "Untitled");
        assert_eq!(node.x_position, 0.0);
        assert_eq!(node.y_position, 0.0);
        assert_eq!(node.value, None);
    }

    #[tokio::test]
    async fn create_for_missing_graph_is_bad_request() {
        let store = InMemoryStore::new();
        let err = create(&store, payload(GraphId(Uuid::new_v4())))
            .await
            .expect_err("dangling graph");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn update_applies_only_supplied_fields() {
        let store = InMemoryStore::new();
        let graph = graph(&store).await;
        let node = create(&store, payload(graph.id)).await.expect("create");

        let updated = update(
            &store,
            node.id,
            NodePatch {
                value: Some(Some(json!(42000))),
                x_position: Some(120.5),
                ..NodePatch::default()
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.value, Some(json!(42000)));
        assert_eq!(updated.x_position, 120.5);
        assert_eq!(updated.y_position, 0.0);
        assert_eq!(updated.label, "Untitled");
    }

    #[tokio::test]
    async fn update_of_missing_node_is_bad_request() {
        let store = InMemoryStore::new();
        let err = update(
            &store,
            NodeId(Uuid::new_v4()),
            NodePatch {
                label: Some("TAM".to_string()),
                ..NodePatch::default()
            },
        )
        .await
        .expect_err("missing node");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.code, "node_not_found");
    }

    #[tokio::test]
    async fn empty_update_is_bad_request() {
        let store = InMemoryStore::new();
        let err = update(&store, NodeId(Uuid::new_v4()), NodePatch::default())
            .await
            .expect_err("empty patch");
        assert_eq!(err.code, "no_fields_to_update");
    }

    #[tokio::test]
    async fn delete_is_unconditional() {
        let store = InMemoryStore::new();
        delete(&store, NodeId(Uuid::new_v4()))
            .await
            .expect("delete of unknown node");
    }
}
