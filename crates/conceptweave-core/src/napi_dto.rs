use std::collections::HashMap;

// ---- Graph DTO structs ----

#[napi(object)]
pub struct JsNode {
    pub id: String,
    pub name: String,
    pub info: String,
}

#[napi(object)]
pub struct JsLink {
    pub source: String,
    pub target: String,
    pub label: String,
}

#[napi(object)]
pub struct JsGraph {
    pub nodes: Vec<JsNode>,
    pub links: Vec<JsLink>,
    pub color_palette_id: String,
    pub show_node_relationships: HashMap<String, bool>,
}

#[napi(object)]
pub struct JsConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub message_count: u32,
    pub has_graph: bool,
}

#[napi(object)]
pub struct JsNodeColor {
    pub node_id: String,
    pub color: String,
}

#[napi(object)]
pub struct JsHistoryState {
    pub undo: u32,
    pub redo: u32,
}

#[napi(object)]
pub struct JsMergeReport {
    pub added_nodes: Vec<String>,
    pub duplicate_nodes: u32,
    pub blank_nodes: u32,
    pub added_links: u32,
    pub unresolved_links: u32,
    pub duplicate_links: u32,
}

// ---- Edit input structs ----

#[napi(object)]
pub struct JsEdgeDraft {
    pub other: String,
    pub direction: String, // "outgoing" | "incoming"
    pub label: String,
}

#[napi(object)]
pub struct JsNodeDraft {
    pub name: String,
    pub info: String,
    pub edges: Option<Vec<JsEdgeDraft>>,
}

#[napi(object)]
pub struct JsNodeEdit {
    pub node_id: String,
    pub name: Option<String>,
    pub info: Option<String>,
    pub edges: Option<Vec<JsEdgeDraft>>,
}

// ---- Service round trips ----

#[napi(object)]
pub struct JsRequestTicket {
    pub conversation_id: String,
    pub kind: String,
}

/// A started request: the ticket to hand back with the response, and the
/// JSON body to send to the service.
#[napi(object)]
pub struct JsPendingRequest {
    pub ticket: JsRequestTicket,
    pub body: String,
}
