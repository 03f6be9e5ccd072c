use crate::adapter::{self, Difficulty, GenerationRequest, QuizRequest, RenderLink, WireLink};
use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::history::HistoryManager;
use crate::identity::IdentityResolver;
use crate::merge::{Fragment, MergeEngine, MergeReport};
use crate::model::*;
use crate::settings::{self, ColorAssigner, ColorPalette};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// The edited node is the link's source.
    Outgoing,
    /// The edited node is the link's target.
    Incoming,
}

/// An edge declared from a manual add/edit form, relative to the node being
/// added or edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeDraft {
    pub other: NodeId,
    pub direction: EdgeDirection,
    pub label: String,
}

impl EdgeDraft {
    pub fn outgoing(other: &NodeId, label: &str) -> Self {
        EdgeDraft {
            other: other.clone(),
            direction: EdgeDirection::Outgoing,
            label: label.to_string(),
        }
    }

    pub fn incoming(other: &NodeId, label: &str) -> Self {
        EdgeDraft {
            other: other.clone(),
            direction: EdgeDirection::Incoming,
            label: label.to_string(),
        }
    }

    fn to_link(&self, node: &NodeId) -> Link {
        let (source, target) = match self.direction {
            EdgeDirection::Outgoing => (node.clone(), self.other.clone()),
            EdgeDirection::Incoming => (self.other.clone(), node.clone()),
        };
        Link {
            source,
            target,
            label: self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDraft {
    pub name: String,
    pub info: String,
    pub edges: Vec<EdgeDraft>,
}

/// Changes to an existing node. `edges`, when present, replaces every link
/// incident to the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeEdit {
    pub name: Option<String>,
    pub info: Option<String>,
    pub edges: Option<Vec<EdgeDraft>>,
}

/// The canonical graph of one conversation together with its undo/redo
/// history. Every mutating action records exactly one checkpoint, after it
/// has been validated and before the new state is installed.
pub struct GraphStore {
    conversation: Conversation,
    history: HistoryManager,
    engine: MergeEngine,
    palettes: Vec<ColorPalette>,
    colors: ColorAssigner,
}

impl GraphStore {
    pub fn new(mut conversation: Conversation, config: &EngineConfig) -> Self {
        if let Some(graph) = conversation.graph_data.as_mut() {
            settings::reconcile(graph);
        }
        let default_palette = config.default_palette_id();
        GraphStore {
            conversation,
            history: HistoryManager::new(config.history_capacity, default_palette),
            engine: MergeEngine::new(IdentityResolver::new(config.name_matching), default_palette),
            palettes: config.palettes.clone(),
            colors: ColorAssigner::new(),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.conversation.id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn graph(&self) -> Option<&KnowledgeGraph> {
        self.conversation.graph_data.as_ref()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn reset_history(&mut self) {
        self.history.reset();
    }

    fn resolver(&self) -> &IdentityResolver {
        self.engine.resolver()
    }

    fn default_palette(&self) -> &str {
        self.palettes
            .first()
            .map(|p| p.id.as_str())
            .unwrap_or(settings::FALLBACK_PALETTE_ID)
    }

    fn checkpoint(&mut self) {
        self.history.record_checkpoint(self.conversation.graph_data.as_ref());
    }

    /// Checkpoint, then return the live graph for in-place mutation,
    /// creating an empty one if the conversation has none.
    fn begin_mutation(&mut self) -> &mut KnowledgeGraph {
        self.checkpoint();
        let palette = self.default_palette().to_string();
        self.conversation
            .graph_data
            .get_or_insert_with(|| KnowledgeGraph::empty(&palette))
    }

    fn get_node(&self, id: &NodeId) -> Result<&Node, GraphError> {
        self.graph()
            .and_then(|g| g.node(id))
            .ok_or_else(|| GraphError::NodeNotFound(id.0.clone()))
    }

    /// Reject empty names and names already used by a node other than
    /// `except`.
    fn check_name(&self, name: &str, except: Option<&NodeId>) -> Result<(), GraphError> {
        if name.trim().is_empty() {
            return Err(GraphError::EmptyName);
        }
        let nodes = self.graph().map(|g| g.nodes.as_slice()).unwrap_or(&[]);
        match self.resolver().find_id(nodes, name) {
            Some(existing) if Some(existing) != except => Err(GraphError::DuplicateName(name.to_string())),
            _ => Ok(()),
        }
    }

    /// Turn edge drafts into links for `node`, checking every other endpoint
    /// exists. `node` itself is allowed as an endpoint only when it already
    /// exists. Repeated (source, target) pairs keep the first draft.
    fn links_for(&self, node: &NodeId, edges: &[EdgeDraft]) -> Result<Vec<Link>, GraphError> {
        let mut seen = HashSet::new();
        let mut links = Vec::with_capacity(edges.len());
        for edge in edges {
            self.get_node(&edge.other)?;
            let link = edge.to_link(node);
            if seen.insert((link.source.clone(), link.target.clone())) {
                links.push(link);
            }
        }
        Ok(links)
    }

    // ---- Generated fragments ----

    /// Merge a generation-service fragment as one undoable action. On
    /// failure neither the graph nor the history changes.
    pub fn merge_fragment(&mut self, fragment: &Fragment) -> Result<MergeReport, GraphError> {
        let outcome = self.engine.merge(self.graph(), fragment)?;
        self.checkpoint();
        self.conversation.graph_data = Some(outcome.graph);
        Ok(outcome.report)
    }

    /// Give the conversation an empty graph if it has none. Not undoable.
    pub fn cold_start(&mut self) -> bool {
        if self.conversation.graph_data.is_some() {
            return false;
        }
        let palette = self.default_palette().to_string();
        self.conversation.graph_data = Some(KnowledgeGraph::empty(&palette));
        info!(conversation = %self.conversation.id, "graph cold-started");
        true
    }

    // ---- Manual edits ----

    pub fn add_node(&mut self, draft: NodeDraft) -> Result<Node, GraphError> {
        debug!(name = %draft.name, edges = draft.edges.len(), "add_node");
        self.check_name(&draft.name, None)?;
        let node = Node {
            id: NodeId::fresh(),
            name: draft.name,
            info: draft.info,
        };
        let links = self.links_for(&node.id, &draft.edges)?;

        let graph = self.begin_mutation();
        settings::register_node(&mut graph.settings, &node.id);
        graph.nodes.push(node.clone());
        for link in links {
            if !graph.has_link(&link.source, &link.target) {
                graph.links.push(link);
            }
        }
        Ok(node)
    }

    pub fn edit_node(&mut self, id: &NodeId, edit: NodeEdit) -> Result<Node, GraphError> {
        debug!(node_id = %id, "edit_node");
        self.get_node(id)?;
        if let Some(name) = &edit.name {
            self.check_name(name, Some(id))?;
        }
        let links = match &edit.edges {
            Some(edges) => Some(self.links_for(id, edges)?),
            None => None,
        };

        let graph = self.begin_mutation();
        let Some(node) = graph.nodes.iter_mut().find(|n| &n.id == id) else {
            return Err(GraphError::NodeNotFound(id.0.clone()));
        };
        if let Some(name) = edit.name {
            node.name = name;
        }
        if let Some(info) = edit.info {
            node.info = info;
        }
        let updated = node.clone();

        if let Some(links) = links {
            graph.links.retain(|l| !l.touches(id));
            for link in links {
                if !graph.has_link(&link.source, &link.target) {
                    graph.links.push(link);
                }
            }
        }
        Ok(updated)
    }

    /// Remove a node, every link incident to it, and its settings entry.
    pub fn delete_node(&mut self, id: &NodeId) -> Result<Node, GraphError> {
        self.get_node(id)?;

        let graph = self.begin_mutation();
        let Some(pos) = graph.nodes.iter().position(|n| &n.id == id) else {
            return Err(GraphError::NodeNotFound(id.0.clone()));
        };
        let removed = graph.nodes.remove(pos);
        let before = graph.links.len();
        graph.links.retain(|l| !l.touches(id));
        settings::remove_node(&mut graph.settings, id);
        debug!(node_id = %id, links_removed = before - graph.links.len(), "delete_node");
        Ok(removed)
    }

    // ---- History ----

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo(self.conversation.graph_data.as_ref()) else {
            return false;
        };
        self.install(previous);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo(self.conversation.graph_data.as_ref()) else {
            return false;
        };
        self.install(next);
        true
    }

    fn install(&mut self, mut graph: KnowledgeGraph) {
        settings::reconcile(&mut graph);
        self.conversation.graph_data = Some(graph);
    }

    // ---- Display settings (not recorded in history) ----

    pub fn set_relationship_visibility(&mut self, id: &NodeId, show: bool) -> Result<(), GraphError> {
        let graph = self
            .conversation
            .graph_data
            .as_mut()
            .ok_or_else(|| GraphError::NodeNotFound(id.0.clone()))?;
        settings::set_relationship_visibility(graph, id, show)
    }

    pub fn toggle_relationships(&mut self, id: &NodeId) -> Result<bool, GraphError> {
        let graph = self
            .conversation
            .graph_data
            .as_mut()
            .ok_or_else(|| GraphError::NodeNotFound(id.0.clone()))?;
        settings::toggle_relationships(graph, id)
    }

    pub fn set_palette(&mut self, palette_id: &str) -> Result<(), GraphError> {
        if !self.palettes.iter().any(|p| p.id == palette_id) {
            return Err(GraphError::UnknownPalette(palette_id.to_string()));
        }
        self.cold_start();
        if let Some(graph) = self.conversation.graph_data.as_mut() {
            graph.settings.color_palette_id = palette_id.to_string();
        }
        Ok(())
    }

    fn active_palette(&self) -> Option<&ColorPalette> {
        let id = self.graph().map(|g| g.settings.color_palette_id.as_str());
        id.and_then(|id| self.palettes.iter().find(|p| p.id == id))
            .or_else(|| self.palettes.first())
    }

    /// Render colors for the current nodes, stable across calls until the
    /// palette changes.
    pub fn node_colors(&mut self) -> Vec<(NodeId, String)> {
        let (Some(graph), Some(palette)) = (self.conversation.graph_data.as_ref(), self.active_palette()) else {
            return Vec::new();
        };
        let palette = palette.clone();
        self.colors.colors(graph, &palette)
    }

    // ---- Conversation ----

    pub fn push_message(&mut self, role: Role, content: &str) {
        self.conversation.messages.push(Message {
            role,
            content: content.to_string(),
        });
    }

    pub fn rename(&mut self, title: &str) {
        self.conversation.title = title.to_string();
    }

    // ---- Outbound payloads ----

    pub fn generation_request(&self, assistant_message: &str) -> GenerationRequest {
        adapter::generation_request(assistant_message, self.graph())
    }

    pub fn quiz_request(&self, difficulty: Difficulty, num_questions: u32) -> Option<QuizRequest> {
        self.graph()
            .filter(|g| !g.is_empty())
            .map(|g| adapter::quiz_request(g, difficulty, num_questions))
    }

    // ---- Inbound links ----

    /// Name-addressed links (as sent to the services) mapped back to the
    /// ids of this conversation's nodes.
    pub fn links_from_wire(&self, links: &[WireLink]) -> Vec<Link> {
        match self.graph() {
            Some(graph) => adapter::resolve_links(self.resolver(), graph, links),
            None => Vec::new(),
        }
    }

    /// Renderer links with their endpoints flattened to ids.
    pub fn links_from_render(&self, links: &[RenderLink]) -> Vec<Link> {
        match self.graph() {
            Some(graph) => adapter::links_from_render(graph, links),
            None => Vec::new(),
        }
    }
}
