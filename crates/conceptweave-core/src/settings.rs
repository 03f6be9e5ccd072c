use crate::error::GraphError;
use crate::model::{KnowledgeGraph, NodeId, Settings};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const FALLBACK_PALETTE_ID: &str = "default";
const FALLBACK_COLOR: &str = "#9ca3af";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    pub id: String,
    pub name: String,
    pub colors: Vec<String>,
}

impl ColorPalette {
    fn new(id: &str, name: &str, colors: &[&str]) -> Self {
        ColorPalette {
            id: id.to_string(),
            name: name.to_string(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
        }
    }
}

pub fn builtin_palettes() -> Vec<ColorPalette> {
    vec![
        ColorPalette::new(
            FALLBACK_PALETTE_ID,
            "Default",
            &["#4f46e5", "#0891b2", "#16a34a", "#ca8a04", "#dc2626", "#9333ea", "#db2777"],
        ),
        ColorPalette::new(
            "pastel",
            "Pastel",
            &["#a5b4fc", "#99f6e4", "#bbf7d0", "#fde68a", "#fecaca", "#e9d5ff"],
        ),
        ColorPalette::new(
            "ocean",
            "Ocean",
            &["#0c4a6e", "#0369a1", "#0ea5e9", "#38bdf8", "#7dd3fc"],
        ),
        ColorPalette::new(
            "earth",
            "Earth",
            &["#78350f", "#a16207", "#4d7c0f", "#65a30d", "#b45309", "#57534e"],
        ),
    ]
}

// ---- showNodeRelationships bookkeeping ----

pub fn register_node(settings: &mut Settings, id: &NodeId) {
    settings
        .show_node_relationships
        .entry(id.clone())
        .or_insert(false);
}

pub fn remove_node(settings: &mut Settings, id: &NodeId) {
    settings.show_node_relationships.remove(id);
}

/// Make the `showNodeRelationships` key set equal the node-id set: missing
/// entries are added as `false`, stale ones dropped. Returns whether
/// anything changed.
pub fn reconcile(graph: &mut KnowledgeGraph) -> bool {
    let live: HashSet<&NodeId> = graph.nodes.iter().map(|n| &n.id).collect();
    let before = graph.settings.show_node_relationships.len();
    graph
        .settings
        .show_node_relationships
        .retain(|id, _| live.contains(id));
    let removed = before - graph.settings.show_node_relationships.len();

    let mut added = 0;
    for node in &graph.nodes {
        if !graph.settings.show_node_relationships.contains_key(&node.id) {
            graph
                .settings
                .show_node_relationships
                .insert(node.id.clone(), false);
            added += 1;
        }
    }

    if removed + added > 0 {
        debug!(added, removed, "settings reconciled");
    }
    removed + added > 0
}

pub fn is_congruent(graph: &KnowledgeGraph) -> bool {
    graph.settings.show_node_relationships.len() == graph.nodes.len()
        && graph
            .nodes
            .iter()
            .all(|n| graph.settings.show_node_relationships.contains_key(&n.id))
}

pub fn set_relationship_visibility(
    graph: &mut KnowledgeGraph,
    id: &NodeId,
    show: bool,
) -> Result<(), GraphError> {
    if !graph.contains_node(id) {
        return Err(GraphError::NodeNotFound(id.0.clone()));
    }
    graph
        .settings
        .show_node_relationships
        .insert(id.clone(), show);
    Ok(())
}

pub fn toggle_relationships(graph: &mut KnowledgeGraph, id: &NodeId) -> Result<bool, GraphError> {
    let current = graph
        .settings
        .show_node_relationships
        .get(id)
        .copied()
        .unwrap_or(false);
    set_relationship_visibility(graph, id, !current)?;
    Ok(!current)
}

// ---- Transient color assignment ----

/// Node -> color cache for one render session. Colors are handed out in the
/// order nodes are first asked for, cycling through the palette; an
/// assignment never changes until the palette does.
#[derive(Debug, Clone, Default)]
pub struct ColorAssigner {
    palette_id: Option<String>,
    assigned: HashMap<NodeId, String>,
    count: usize,
}

impl ColorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
        self.count = 0;
    }

    fn sync_palette(&mut self, palette: &ColorPalette) {
        if self.palette_id.as_deref() != Some(palette.id.as_str()) {
            if self.palette_id.is_some() {
                debug!(palette = %palette.id, "palette changed, clearing color cache");
            }
            self.clear();
            self.palette_id = Some(palette.id.clone());
        }
    }

    pub fn color_for(&mut self, palette: &ColorPalette, id: &NodeId) -> String {
        self.sync_palette(palette);
        if let Some(color) = self.assigned.get(id) {
            return color.clone();
        }
        let color = if palette.colors.is_empty() {
            FALLBACK_COLOR.to_string()
        } else {
            palette.colors[self.count % palette.colors.len()].clone()
        };
        self.count += 1;
        self.assigned.insert(id.clone(), color.clone());
        color
    }

    /// Colors for every node of `graph`, assigned in node insertion order.
    pub fn colors(&mut self, graph: &KnowledgeGraph, palette: &ColorPalette) -> Vec<(NodeId, String)> {
        graph
            .nodes
            .iter()
            .map(|n| (n.id.clone(), self.color_for(palette, &n.id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}
