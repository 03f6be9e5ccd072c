use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn fresh() -> Self {
        ConversationId(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate `as_str()` and `from_str()` for a wire-named enum.
macro_rules! str_enum {
    ($T:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $T {
            pub fn as_str(&self) -> &str {
                match self { $( $T::$variant => $s, )+ }
            }
            pub fn from_str(s: &str) -> Option<$T> {
                match s { $( $s => Some($T::$variant), )+ _ => None }
            }
        }
        impl std::fmt::Display for $T {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use str_enum;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    pub label: String,
}

impl Link {
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub color_palette_id: String,
    #[serde(default)]
    pub show_node_relationships: BTreeMap<NodeId, bool>,
}

impl Settings {
    pub fn new(color_palette_id: &str) -> Self {
        Settings {
            color_palette_id: color_palette_id.to_string(),
            show_node_relationships: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub settings: Settings,
}

impl KnowledgeGraph {
    /// The canonical empty graph: no nodes, no links, the given palette.
    pub fn empty(color_palette_id: &str) -> Self {
        KnowledgeGraph {
            nodes: Vec::new(),
            links: Vec::new(),
            settings: Settings::new(color_palette_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    pub fn links_touching(&self, id: &NodeId) -> Vec<Link> {
        self.links.iter().filter(|l| l.touches(id)).cloned().collect()
    }

    pub fn has_link(&self, source: &NodeId, target: &NodeId) -> bool {
        self.links
            .iter()
            .any(|l| &l.source == source && &l.target == target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

str_enum!(Role {
    User => "user",
    Assistant => "assistant",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub graph_data: Option<KnowledgeGraph>,
}

impl Conversation {
    pub fn new(title: &str) -> Self {
        Conversation {
            id: ConversationId::fresh(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            graph_data: None,
        }
    }
}
