use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::identity::UserId;

pub const DEFAULT_GRAPH_NAME: &str = "NAME YOUR GRAPH";
pub const DEFAULT_NODE_LABEL: &str = "Untitled";

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::from_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

uuid_id!(GraphId);
uuid_id!(NodeId);
uuid_id!(EdgeId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub graph_id: GraphId,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub label: String,
    pub value: Option<Value>,
    pub x_position: f64,
    pub y_position: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub graph_id: GraphId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    #[serde(rename = "type")]
    pub edge_type: String,
    pub weight: Option<f64>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A graph together with every node and edge that belongs to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDetail {
    pub graph: Graph,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateGraphPayload {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Partial graph update. Fields left out of the request body keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodePayload {
    pub graph_id: GraphId,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub label: Option<String>,
    pub value: Option<Value>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NodePatch {
    pub label: Option<String>,
    /// `Some(None)` clears the stored value; `None` leaves it alone.
    #[serde(default, deserialize_with = "present_or_null")]
    pub value: Option<Option<Value>>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
}

/// Raw edge creation request. Required fields stay optional here so that every
/// missing one can be reported at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEdgePayload {
    pub graph_id: Option<String>,
    pub source_node_id: Option<String>,
    pub target_node_id: Option<String>,
    #[serde(rename = "type")]
    pub edge_type: Option<String>,
    pub weight: Option<f64>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EdgePatch {
    #[serde(default, deserialize_with = "present_or_null")]
    pub weight: Option<Option<f64>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGraph {
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub graph_id: GraphId,
    pub node_type: Option<String>,
    pub label: String,
    pub value: Option<Value>,
    pub x_position: f64,
    pub y_position: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub graph_id: GraphId,
    pub source_node_id: NodeId,
    pub target_node_id: NodeId,
    pub edge_type: String,
    pub weight: Option<f64>,
    pub description: String,
}

impl CreateGraphPayload {
    pub fn normalize(self, owner_id: UserId) -> NewGraph {
        NewGraph {
            owner_id,
            name: self.name.unwrap_or_else(|| DEFAULT_GRAPH_NAME.to_string()),
            description: self.description.unwrap_or_default(),
        }
    }
}

impl GraphPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}

impl CreateNodePayload {
    pub fn normalize(self) -> NewNode {
        NewNode {
            graph_id: self.graph_id,
            node_type: self.node_type,
            label: self.label.unwrap_or_else(|| DEFAULT_NODE_LABEL.to_string()),
            value: self.value.filter(|value| !value.is_null()),
            x_position: self.x_position.unwrap_or(0.0),
            y_position: self.y_position.unwrap_or(0.0),
        }
    }
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self.label.is_none()
            && self.value.is_none()
            && self.x_position.is_none()
            && self.y_position.is_none()
    }
}

impl EdgePatch {
    pub fn is_empty(&self) -> bool {
        self.weight.is_none() && self.description.is_none()
    }
}

fn present_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
