use crate::adapter::{self, Difficulty};
use crate::config::EngineConfig;
use crate::model::{ConversationId, NodeId};
use crate::napi_convert::*;
use crate::napi_dto::*;
use crate::workspace::Workspace;
use std::path::Path;
use tracing::{debug, info};

fn to_json<T: serde::Serialize>(value: &T) -> napi::Result<String> {
    serde_json::to_string(value).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[napi]
pub struct JsWorkspace {
    inner: Workspace,
}

#[napi]
impl JsWorkspace {
    #[napi(factory)]
    pub fn open(state_path: String, config_path: Option<String>) -> napi::Result<Self> {
        crate::init_tracing();
        let config = match config_path {
            Some(p) => EngineConfig::load(Path::new(&p))?,
            None => EngineConfig::default(),
        };
        let inner = Workspace::open(Path::new(&state_path), config)?;
        info!("Workspace opened");
        Ok(JsWorkspace { inner })
    }

    // ---- Conversations ----

    #[napi]
    pub fn list_conversations(&self) -> Vec<JsConversationSummary> {
        self.inner
            .conversations()
            .into_iter()
            .map(JsConversationSummary::from)
            .collect()
    }

    #[napi]
    pub fn current_conversation_id(&self) -> Option<String> {
        self.inner.current_id().map(|id| id.0.clone())
    }

    #[napi]
    pub fn create_conversation(&mut self, title: String) -> napi::Result<String> {
        Ok(self.inner.create_conversation(&title)?.0)
    }

    #[napi]
    pub fn switch_conversation(&mut self, id: String) -> napi::Result<()> {
        debug!(conversation = %id, "switch_conversation");
        Ok(self.inner.switch_conversation(&ConversationId(id))?)
    }

    #[napi]
    pub fn rename_conversation(&mut self, id: String, title: String) -> napi::Result<()> {
        Ok(self.inner.rename_conversation(&ConversationId(id), &title)?)
    }

    #[napi]
    pub fn delete_conversation(&mut self, id: String) -> napi::Result<()> {
        Ok(self.inner.delete_conversation(&ConversationId(id))?)
    }

    #[napi]
    pub fn push_message(&mut self, role: String, content: String) -> napi::Result<()> {
        let role = js_role_to_model(&role)?;
        Ok(self.inner.push_message(role, &content)?)
    }

    // ---- Graph ----

    #[napi]
    pub fn current_graph(&self) -> Option<JsGraph> {
        self.inner
            .current()
            .and_then(|s| s.graph())
            .map(JsGraph::from)
    }

    #[napi]
    pub fn cold_start(&mut self) -> napi::Result<bool> {
        Ok(self.inner.cold_start()?)
    }

    #[napi]
    pub fn add_node(&mut self, input: JsNodeDraft) -> napi::Result<JsNode> {
        let draft = js_draft_to_model(input)?;
        let node = self.inner.apply(|s| s.add_node(draft))?;
        Ok(JsNode::from(&node))
    }

    #[napi]
    pub fn edit_node(&mut self, input: JsNodeEdit) -> napi::Result<JsNode> {
        let (id, edit) = js_edit_to_model(input)?;
        let node = self.inner.apply(|s| s.edit_node(&id, edit))?;
        Ok(JsNode::from(&node))
    }

    #[napi]
    pub fn delete_node(&mut self, node_id: String) -> napi::Result<JsNode> {
        let id = NodeId(node_id);
        let node = self.inner.apply(|s| s.delete_node(&id))?;
        Ok(JsNode::from(&node))
    }

    #[napi]
    pub fn undo(&mut self) -> napi::Result<bool> {
        Ok(self.inner.undo()?)
    }

    #[napi]
    pub fn redo(&mut self) -> napi::Result<bool> {
        Ok(self.inner.redo()?)
    }

    #[napi]
    pub fn history(&self) -> JsHistoryState {
        let (undo, redo) = self
            .inner
            .current()
            .map(|s| (s.history().undo_len(), s.history().redo_len()))
            .unwrap_or((0, 0));
        JsHistoryState {
            undo: undo as u32,
            redo: redo as u32,
        }
    }

    // ---- Display settings ----

    #[napi]
    pub fn set_relationship_visibility(&mut self, node_id: String, show: bool) -> napi::Result<()> {
        let id = NodeId(node_id);
        Ok(self.inner.apply(|s| s.set_relationship_visibility(&id, show))?)
    }

    #[napi]
    pub fn toggle_relationships(&mut self, node_id: String) -> napi::Result<bool> {
        let id = NodeId(node_id);
        Ok(self.inner.apply(|s| s.toggle_relationships(&id))?)
    }

    #[napi]
    pub fn set_palette(&mut self, palette_id: String) -> napi::Result<()> {
        Ok(self.inner.apply(|s| s.set_palette(&palette_id))?)
    }

    #[napi]
    pub fn node_colors(&mut self) -> napi::Result<Vec<JsNodeColor>> {
        let colors = self.inner.node_colors()?;
        Ok(colors
            .into_iter()
            .map(|(id, color)| JsNodeColor { node_id: id.0, color })
            .collect())
    }

    /// Canonical links for a JSON array of renderer links, whose endpoints
    /// may be ids or node objects.
    #[napi]
    pub fn resolve_render_links(&self, body: String) -> napi::Result<Vec<JsLink>> {
        let links = adapter::parse_render_links(&body).map_err(|e| napi::Error::from_reason(e.to_string()))?;
        Ok(self
            .inner
            .current()
            .map(|s| convert_vec(&s.links_from_render(&links)))
            .unwrap_or_default())
    }

    /// Canonical links for a JSON array of name-addressed links.
    #[napi]
    pub fn resolve_wire_links(&self, body: String) -> napi::Result<Vec<JsLink>> {
        let links = adapter::parse_wire_links(&body).map_err(|e| napi::Error::from_reason(e.to_string()))?;
        Ok(self
            .inner
            .current()
            .map(|s| convert_vec(&s.links_from_wire(&links)))
            .unwrap_or_default())
    }

    // ---- Service round trips ----

    #[napi]
    pub fn begin_generation(&self, assistant_message: String) -> napi::Result<JsPendingRequest> {
        let (ticket, request) = self.inner.begin_generation(&assistant_message)?;
        Ok(JsPendingRequest {
            ticket: JsRequestTicket::from(&ticket),
            body: to_json(&request)?,
        })
    }

    #[napi]
    pub fn complete_generation(&mut self, ticket: JsRequestTicket, body: String) -> napi::Result<JsMergeReport> {
        let ticket = js_ticket_to_model(&ticket)?;
        let fragment = adapter::parse_fragment(&body)?;
        let report = self.inner.complete_generation(&ticket, &fragment)?;
        Ok(JsMergeReport::from(&report))
    }

    #[napi]
    pub fn begin_quiz(&self, difficulty: String, num_questions: u32) -> napi::Result<Option<JsPendingRequest>> {
        let difficulty = Difficulty::from_str(&difficulty)
            .ok_or_else(|| napi::Error::from_reason(format!("Unknown difficulty: {difficulty}")))?;
        match self.inner.begin_quiz(difficulty, num_questions)? {
            Some((ticket, request)) => Ok(Some(JsPendingRequest {
                ticket: JsRequestTicket::from(&ticket),
                body: to_json(&request)?,
            })),
            None => Ok(None),
        }
    }

    /// Returns the validated response re-serialized as JSON.
    #[napi]
    pub fn complete_quiz(&self, ticket: JsRequestTicket, body: String) -> napi::Result<String> {
        let ticket = js_ticket_to_model(&ticket)?;
        let response = adapter::parse_quiz_response(&body)?;
        to_json(&self.inner.complete_quiz(&ticket, response)?)
    }

    #[napi]
    pub fn begin_answer_check(&self, question: String, user_answer: String) -> napi::Result<JsPendingRequest> {
        let (ticket, request) = self.inner.begin_answer_check(&question, &user_answer)?;
        Ok(JsPendingRequest {
            ticket: JsRequestTicket::from(&ticket),
            body: to_json(&request)?,
        })
    }

    #[napi]
    pub fn complete_answer_check(&self, ticket: JsRequestTicket, body: String) -> napi::Result<String> {
        let ticket = js_ticket_to_model(&ticket)?;
        let response = adapter::parse_answer_check(&body)?;
        to_json(&self.inner.complete_answer_check(&ticket, response)?)
    }
}
