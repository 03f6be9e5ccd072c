use crate::merge::MergeReport;
use crate::model;
use crate::napi_dto::*;
use crate::store::{EdgeDirection, EdgeDraft, NodeDraft, NodeEdit};
use crate::workspace::{RequestKind, RequestTicket};

pub fn convert_vec<'a, T, U>(items: &'a [T]) -> Vec<U>
where
    U: From<&'a T>,
{
    items.iter().map(U::from).collect()
}

// ---- From impls: domain -> JS ----

impl From<&model::Node> for JsNode {
    fn from(node: &model::Node) -> Self {
        JsNode {
            id: node.id.0.clone(),
            name: node.name.clone(),
            info: node.info.clone(),
        }
    }
}

impl From<&model::Link> for JsLink {
    fn from(link: &model::Link) -> Self {
        JsLink {
            source: link.source.0.clone(),
            target: link.target.0.clone(),
            label: link.label.clone(),
        }
    }
}

impl From<&model::KnowledgeGraph> for JsGraph {
    fn from(graph: &model::KnowledgeGraph) -> Self {
        JsGraph {
            nodes: convert_vec(&graph.nodes),
            links: convert_vec(&graph.links),
            color_palette_id: graph.settings.color_palette_id.clone(),
            show_node_relationships: graph
                .settings
                .show_node_relationships
                .iter()
                .map(|(id, show)| (id.0.clone(), *show))
                .collect(),
        }
    }
}

impl From<&model::Conversation> for JsConversationSummary {
    fn from(c: &model::Conversation) -> Self {
        JsConversationSummary {
            id: c.id.0.clone(),
            title: c.title.clone(),
            created_at: c.created_at.to_rfc3339(),
            message_count: c.messages.len() as u32,
            has_graph: c.graph_data.is_some(),
        }
    }
}

impl From<&MergeReport> for JsMergeReport {
    fn from(r: &MergeReport) -> Self {
        JsMergeReport {
            added_nodes: r.added_nodes.iter().map(|id| id.0.clone()).collect(),
            duplicate_nodes: r.duplicate_nodes as u32,
            blank_nodes: r.blank_nodes as u32,
            added_links: r.added_links as u32,
            unresolved_links: r.unresolved_links as u32,
            duplicate_links: r.duplicate_links as u32,
        }
    }
}

impl From<&RequestTicket> for JsRequestTicket {
    fn from(t: &RequestTicket) -> Self {
        JsRequestTicket {
            conversation_id: t.conversation_id.0.clone(),
            kind: t.kind.as_str().to_string(),
        }
    }
}

// ---- JS -> domain ----

fn invalid(msg: String) -> napi::Error {
    napi::Error::from_reason(msg)
}

pub fn js_ticket_to_model(t: &JsRequestTicket) -> napi::Result<RequestTicket> {
    let kind = RequestKind::from_str(&t.kind)
        .ok_or_else(|| invalid(format!("Unknown request kind: {}", t.kind)))?;
    Ok(RequestTicket {
        conversation_id: model::ConversationId(t.conversation_id.clone()),
        kind,
    })
}

fn js_edges_to_model(edges: Option<Vec<JsEdgeDraft>>) -> napi::Result<Vec<EdgeDraft>> {
    edges
        .unwrap_or_default()
        .into_iter()
        .map(|e| {
            let direction = match e.direction.as_str() {
                "outgoing" => EdgeDirection::Outgoing,
                "incoming" => EdgeDirection::Incoming,
                other => return Err(invalid(format!("Unknown edge direction: {other}"))),
            };
            Ok(EdgeDraft {
                other: model::NodeId(e.other),
                direction,
                label: e.label,
            })
        })
        .collect()
}

pub fn js_draft_to_model(d: JsNodeDraft) -> napi::Result<NodeDraft> {
    Ok(NodeDraft {
        name: d.name,
        info: d.info,
        edges: js_edges_to_model(d.edges)?,
    })
}

pub fn js_edit_to_model(e: JsNodeEdit) -> napi::Result<(model::NodeId, NodeEdit)> {
    let edges = match e.edges {
        Some(edges) => Some(js_edges_to_model(Some(edges))?),
        None => None,
    };
    Ok((
        model::NodeId(e.node_id),
        NodeEdit {
            name: e.name,
            info: e.info,
            edges,
        },
    ))
}

pub fn js_role_to_model(role: &str) -> napi::Result<model::Role> {
    model::Role::from_str(role).ok_or_else(|| invalid(format!("Unknown role: {role}")))
}
