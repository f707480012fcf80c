//! Edge aggregate.
//!
//! Creation is a guarded pipeline. Required fields are checked first and every
//! missing one is reported together. Then the source node is looked up, then the
//! target node, and only then is the edge inserted. The target is never looked up
//! when the source is missing. Self-loops and parallel edges are allowed.
//!
//! A required field counts as missing only when it is absent or the empty
//! string. Whitespace is kept and echoed back as sent, so `"  "` is present and
//! then fails the node lookup like any other id that names no node.

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{CreateEdgePayload, Edge, EdgeId, EdgePatch, GraphId, NewEdge, NodeId};
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredEdgeFields<'a> {
    graph_id: &'a str,
    source_node_id: &'a str,
    target_node_id: &'a str,
    edge_type: &'a str,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn required_fields(payload: &CreateEdgePayload) -> Result<RequiredEdgeFields<'_>> {
    let graph_id = present(&payload.graph_id);
    let source_node_id = present(&payload.source_node_id);
    let target_node_id = present(&payload.target_node_id);
    let edge_type = present(&payload.edge_type);

    match (graph_id, source_node_id, target_node_id, edge_type) {
        (Some(graph_id), Some(source_node_id), Some(target_node_id), Some(edge_type)) => {
            Ok(RequiredEdgeFields {
                graph_id,
                source_node_id,
                target_node_id,
                edge_type,
            })
        }
        _ => {
            let missing: Vec<&str> = [
                ("graph_id", graph_id),
                ("source_node_id", source_node_id),
                ("target_node_id", target_node_id),
                ("type", edge_type),
            ]
            .into_iter()
            .filter_map(|(name, value)| value.is_none().then_some(name))
            .collect();
            let missing = missing.join(", ");

            Err(LibError::invalid_with_code(
                "missing_required_fields",
                format!("Missing required fields: {missing}"),
                anyhow!("edge payload missing {missing}"),
            ))
        }
    }
}

/// Resolves a node id, treating ids that cannot name a node as absent.
async fn existing_node(store: &dyn EntityStore, raw: &str) -> Result<Option<NodeId>> {
    let Ok(node_id) = raw.parse::<NodeId>() else {
        return Ok(None);
    };
    Ok(store.node_exists(node_id).await?.then_some(node_id))
}

pub async fn create(store: &dyn EntityStore, payload: CreateEdgePayload) -> Result<Edge> {
    let fields = required_fields(&payload)?;

    tracing::info!(source_node_id = fields.source_node_id, "Verifying source node exists");
    let Some(source_node_id) = existing_node(store, fields.source_node_id).await? else {
        return Err(LibError::invalid_with_code(
            "source_node_not_found",
            format!("Source node {} does not exist", fields.source_node_id),
            anyhow!("source node {} not found", fields.source_node_id),
        ));
    };

    tracing::info!(target_node_id = fields.target_node_id, "Verifying target node exists");
    let Some(target_node_id) = existing_node(store, fields.target_node_id).await? else {
        return Err(LibError::invalid_with_code(
            "target_node_not_found",
            format!("Target node {} does not exist", fields.target_node_id),
            anyhow!("target node {} not found", fields.target_node_id),
        ));
    };

    let graph_id: GraphId = fields.graph_id.parse().map_err(|err| {
        LibError::invalid_with_code(
            "invalid_graph_id",
            format!("Invalid graph_id {}", fields.graph_id),
            anyhow!("unparseable graph id {}: {}", fields.graph_id, err),
        )
    })?;

    let edge = store
        .insert_edge(NewEdge {
            graph_id,
            source_node_id,
            target_node_id,
            edge_type: fields.edge_type.to_string(),
            weight: payload.weight,
            description: payload.description.clone().unwrap_or_default(),
        })
        .await?;

    tracing::info!(edge_id = %edge.id, graph_id = %graph_id, "Edge created");
    Ok(edge)
}

pub async fn update(store: &dyn EntityStore, edge_id: EdgeId, patch: EdgePatch) -> Result<Edge> {
    if patch.is_empty() {
        return Err(LibError::invalid_with_code(
            "no_fields_to_update",
            "No fields to update",
            anyhow!("edge {} update carried no recognized fields", edge_id),
        ));
    }

    let Some(edge) = store.update_edge(edge_id, &patch).await? else {
        return Err(LibError::invalid_with_code(
            "edge_not_found",
            "Edge update matched no rows",
            anyhow!("edge {} not found for update", edge_id),
        ));
    };

    tracing::info!(edge_id = %edge_id, "Edge updated");
    Ok(edge)
}

pub async fn delete(store: &dyn EntityStore, edge_id: EdgeId) -> Result<()> {
    store.delete_edge(edge_id).await?;
    tracing::info!(edge_id = %edge_id, "Edge deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::error::ErrorKind;
    use crate::identity::UserId;
    use crate::models::{Graph, NewGraph, NewNode, Node};
    use crate::testing::SpyStore;

    async fn seeded() -> (SpyStore, Graph, Node, Node) {
        let store = SpyStore::new();
        let graph = store
            .insert_graph(NewGraph {
                owner_id: UserId(Uuid::new_v4()),
                name: "Market".to_string(),
                description: String::new(),
            })
            .await
            .expect("graph");
        let mut nodes = Vec::new();
        for label in ["TAM", "SAM"] {
            nodes.push(
                store
                    .insert_node(NewNode {
                        graph_id: graph.id,
                        node_type: Some("segment".to_string()),
                        label: label.to_string(),
                        value: None,
                        x_position: 0.0,
                        y_position: 0.0,
                    })
                    .await
                    .expect("node"),
            );
        }
        let target = nodes.pop().expect("two nodes");
        let source = nodes.pop().expect("two nodes");
        (store, graph, source, target)
    }

    fn payload(graph: &Graph, source: &str, target: &str) -> CreateEdgePayload {
        CreateEdgePayload {
            graph_id: Some(graph.id.to_string()),
            source_node_id: Some(source.to_string()),
            target_node_id: Some(target.to_string()),
            edge_type: Some("contains".to_string()),
            weight: None,
            description: None,
        }
    }

    #[tokio::test]
    async fn missing_fields_are_all_reported_in_order() {
        let store = SpyStore::new();
        let err = create(
            &store,
            CreateEdgePayload {
                source_node_id: Some(Uuid::new_v4().to_string()),
                edge_type: Some(String::new()),
                ..CreateEdgePayload::default()
            },
        )
        .await
        .expect_err("missing fields");

        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(
            err.public,
            "Missing required fields: graph_id, target_node_id, type"
        );
        assert_eq!(store.call_count("node_exists"), 0);
    }

    #[tokio::test]
    async fn every_field_missing_lists_all_four() {
        let store = SpyStore::new();
        let err = create(&store, CreateEdgePayload::default())
            .await
            .expect_err("missing fields");
        assert_eq!(
            err.public,
            "Missing required fields: graph_id, source_node_id, target_node_id, type"
        );
    }

    #[tokio::test]
    async fn missing_source_fails_before_target_lookup() {
        let (store, graph, _, target) = seeded().await;
        let missing = Uuid::new_v4().to_string();

        let err = create(&store, payload(&graph, &missing, &target.id.to_string()))
            .await
            .expect_err("missing source");

        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.public, format!("Source node {missing} does not exist"));
        let lookups = store.node_lookups();
        assert_eq!(lookups.len(), 1);
        assert_ne!(lookups[0], target.id);
        assert_eq!(store.call_count("insert_edge"), 0);
    }

    #[tokio::test]
    async fn node_checks_run_before_graph_id_is_parsed() {
        let (store, _, _, target) = seeded().await;
        let missing = Uuid::new_v4().to_string();

        let err = create(
            &store,
            CreateEdgePayload {
                graph_id: Some("g1".to_string()),
                source_node_id: Some(missing.clone()),
                target_node_id: Some(target.id.to_string()),
                edge_type: Some("contains".to_string()),
                weight: None,
                description: None,
            },
        )
        .await
        .expect_err("missing source");

        assert_eq!(err.code, "source_node_not_found");
        assert_eq!(err.public, format!("Source node {missing} does not exist"));
    }

    #[tokio::test]
    async fn malformed_graph_id_is_reported_after_nodes_resolve() {
        let (store, _, source, target) = seeded().await;

        let err = create(
            &store,
            CreateEdgePayload {
                graph_id: Some("g1".to_string()),
                source_node_id: Some(source.id.to_string()),
                target_node_id: Some(target.id.to_string()),
                edge_type: Some("contains".to_string()),
                weight: None,
                description: None,
            },
        )
        .await
        .expect_err("malformed graph id");

        assert_eq!(err.code, "invalid_graph_id");
        assert_eq!(store.node_lookups(), vec![source.id, target.id]);
        assert_eq!(store.call_count("insert_edge"), 0);
    }

    #[tokio::test]
    async fn whitespace_field_is_present_and_echoed_as_sent() {
        let (store, graph, _, target) = seeded().await;

        let err = create(&store, payload(&graph, "  ", &target.id.to_string()))
            .await
            .expect_err("blank source");

        assert_eq!(err.code, "source_node_not_found");
        assert_eq!(err.public, "Source node    does not exist");
        assert_eq!(store.call_count("node_exists"), 0);
    }

    #[tokio::test]
    async fn missing_target_is_reported_by_id() {
        let (store, graph, source, _) = seeded().await;
        let missing = Uuid::new_v4().to_string();

        let err = create(&store, payload(&graph, &source.id.to_string(), &missing))
            .await
            .expect_err("missing target");

        assert_eq!(err.code, "target_node_not_found");
        assert_eq!(err.public, format!("Target node {missing} does not exist"));
        assert_eq!(store.node_lookups(), vec![source.id, missing.parse().expect("id")]);
        assert_eq!(store.call_count("insert_edge"), 0);
    }

    #[tokio::test]
    async fn malformed_source_id_counts_as_missing() {
        let (store, graph, _, target) = seeded().await;

        let err = create(&store, payload(&graph, "not-a-node", &target.id.to_string()))
            .await
            .expect_err("malformed source");

        assert_eq!(err.public, "Source node not-a-node does not exist");
        assert!(store.node_lookups().is_empty());
    }

    #[tokio::test]
    async fn create_with_existing_endpoints_applies_defaults() {
        let (store, graph, source, target) = seeded().await;

        let edge = create(
            &store,
            payload(&graph, &source.id.to_string(), &target.id.to_string()),
        )
        .await
        .expect("create");

        assert_eq!(edge.graph_id, graph.id);
        assert_eq!(edge.source_node_id, source.id);
        assert_eq!(edge.target_node_id, target.id);
        assert_eq!(edge.edge_type, "contains");
        assert_eq!(edge.weight, None);
        assert_eq!(edge.description, "");
    }

    #[tokio::test]
    async fn self_loops_and_duplicates_are_allowed() {
        let (store, graph, source, _) = seeded().await;
        let id = source.id.to_string();

        let first = create(&store, payload(&graph, &id, &id))
            .await
            .expect("self loop");
        let second = create(&store, payload(&graph, &id, &id))
            .await
            .expect("duplicate");
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn update_changes_weight_and_keeps_description() {
        let (store, graph, source, target) = seeded().await;
        let mut request = payload(&graph, &source.id.to_string(), &target.id.to_string());
        request.description = Some("share of wallet".to_string());
        let edge = create(&store, request).await.expect("create");

        let updated = update(
            &store,
            edge.id,
            EdgePatch {
                weight: Some(Some(0.35)),
                description: None,
            },
        )
        .await
        .expect("update");

        assert_eq!(updated.weight, Some(0.35));
        assert_eq!(updated.description, "share of wallet");
    }

    #[tokio::test]
    async fn update_of_missing_edge_is_bad_request() {
        let store = SpyStore::new();
        let err = update(
            &store,
            EdgeId(Uuid::new_v4()),
            EdgePatch {
                weight: Some(None),
                description: None,
            },
        )
        .await
        .expect_err("missing edge");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.code, "edge_not_found");
    }
}
