//! Translation between the canonical id-addressed graph and the
//! name-addressed payloads exchanged with the generation and quiz services,
//! plus the renderer's link shape.

use crate::error::GraphError;
use crate::identity::IdentityResolver;
use crate::merge::Fragment;
use crate::model::{str_enum, KnowledgeGraph, Link, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ---- Wire shapes ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

/// Names only; sent with quiz requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizGraph {
    pub nodes: Vec<String>,
    pub links: Vec<WireLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextNode {
    pub name: String,
    pub info: String,
}

/// Names with their bodies; sent as prior context with generation requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextGraph {
    pub nodes: Vec<ContextNode>,
    pub links: Vec<WireLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub assistant_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_graph: Option<ContextGraph>,
}

pub type GenerationResponse = Fragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

str_enum!(Difficulty {
    Easy => "easy",
    Medium => "medium",
    Hard => "hard",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizRequest {
    pub graph_data: QuizGraph,
    pub difficulty: Difficulty,
    pub num_questions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub question: String,
    pub hint: String,
    pub example_answer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerCheckRequest {
    pub question: String,
    pub user_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Evaluation {
    Correct,
    PartiallyCorrect,
    Incorrect,
}

str_enum!(Evaluation {
    Correct => "correct",
    PartiallyCorrect => "partiallyCorrect",
    Incorrect => "incorrect",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerCheckResponse {
    pub evaluation: Evaluation,
    pub explanation: String,
}

// ---- Outbound ----

fn wire_links(graph: &KnowledgeGraph) -> Vec<WireLink> {
    let names: HashMap<&NodeId, &str> = graph
        .nodes
        .iter()
        .map(|n| (&n.id, n.name.as_str()))
        .collect();
    let mut omitted = 0usize;
    let links = graph
        .links
        .iter()
        .filter_map(|link| {
            let resolved = names.get(&link.source).zip(names.get(&link.target));
            if resolved.is_none() {
                omitted += 1;
            }
            let (source, target) = resolved?;
            Some(WireLink {
                source: source.to_string(),
                target: target.to_string(),
                label: link.label.clone(),
            })
        })
        .collect();
    if omitted > 0 {
        debug!(omitted, "links with unknown endpoints left out of payload");
    }
    links
}

pub fn to_quiz_graph(graph: &KnowledgeGraph) -> QuizGraph {
    QuizGraph {
        nodes: graph.nodes.iter().map(|n| n.name.clone()).collect(),
        links: wire_links(graph),
    }
}

pub fn to_generation_context(graph: &KnowledgeGraph) -> ContextGraph {
    ContextGraph {
        nodes: graph
            .nodes
            .iter()
            .map(|n| ContextNode {
                name: n.name.clone(),
                info: n.info.clone(),
            })
            .collect(),
        links: wire_links(graph),
    }
}

/// An empty or missing graph is sent without `existingGraph`.
pub fn generation_request(assistant_message: &str, graph: Option<&KnowledgeGraph>) -> GenerationRequest {
    GenerationRequest {
        assistant_message: assistant_message.to_string(),
        existing_graph: graph.filter(|g| !g.is_empty()).map(to_generation_context),
    }
}

pub fn quiz_request(graph: &KnowledgeGraph, difficulty: Difficulty, num_questions: u32) -> QuizRequest {
    QuizRequest {
        graph_data: to_quiz_graph(graph),
        difficulty,
        num_questions,
    }
}

// ---- Inbound ----

/// Parse a generation-service response body. Anything that is not the
/// expected shape is a validation failure.
pub fn parse_fragment(body: &str) -> Result<Fragment, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Validation(e.to_string()))
}

pub fn parse_quiz_response(body: &str) -> Result<QuizResponse, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Validation(e.to_string()))
}

pub fn parse_answer_check(body: &str) -> Result<AnswerCheckResponse, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Validation(e.to_string()))
}

/// Map name-addressed links back to ids. Links naming an unknown node are
/// skipped.
pub fn resolve_links(resolver: &IdentityResolver, graph: &KnowledgeGraph, links: &[WireLink]) -> Vec<Link> {
    let index = resolver.name_index(&graph.nodes);
    links
        .iter()
        .filter_map(|l| {
            let source = index.get(&resolver.key(&l.source))?;
            let target = index.get(&resolver.key(&l.target))?;
            Some(Link {
                source: source.clone(),
                target: target.clone(),
                label: l.label.clone(),
            })
        })
        .collect()
}

// ---- Renderer boundary ----

/// A link endpoint as the renderer hands it back: either the bare id it was
/// given, or the node object the layout engine substituted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkEndpoint {
    Id(String),
    Node { id: String },
}

impl LinkEndpoint {
    pub fn id(&self) -> NodeId {
        match self {
            LinkEndpoint::Id(id) | LinkEndpoint::Node { id } => NodeId(id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLink {
    pub source: LinkEndpoint,
    pub target: LinkEndpoint,
    pub label: String,
}

pub fn parse_render_links(body: &str) -> Result<Vec<RenderLink>, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Validation(e.to_string()))
}

pub fn parse_wire_links(body: &str) -> Result<Vec<WireLink>, GraphError> {
    serde_json::from_str(body).map_err(|e| GraphError::Validation(e.to_string()))
}

/// Resolve renderer links to canonical links, dropping any whose endpoint
/// is not a node of `graph`.
pub fn links_from_render(graph: &KnowledgeGraph, links: &[RenderLink]) -> Vec<Link> {
    links
        .iter()
        .map(|l| Link {
            source: l.source.id(),
            target: l.target.id(),
            label: l.label.clone(),
        })
        .filter(|l| graph.contains_node(&l.source) && graph.contains_node(&l.target))
        .collect()
}
