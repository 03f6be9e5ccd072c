use crate::adapter::{
    AnswerCheckRequest, AnswerCheckResponse, Difficulty, GenerationRequest, QuizRequest, QuizResponse,
};
use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::merge::{Fragment, MergeReport};
use crate::model::{str_enum, Conversation, ConversationId, NodeId, Role};
use crate::storage;
use crate::store::GraphStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Generation,
    Quiz,
    AnswerCheck,
}

str_enum!(RequestKind {
    Generation => "generation",
    Quiz => "quiz",
    AnswerCheck => "answer_check",
});

/// Issued when an outbound service request starts. The response is only
/// accepted if the conversation it was issued for is still the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub conversation_id: ConversationId,
    pub kind: RequestKind,
}

/// Every conversation's store, keyed by conversation id, plus the id of the
/// one the user is looking at. All state changes go through here so each
/// one is followed by a whole-state save.
pub struct Workspace {
    config: EngineConfig,
    path: Option<PathBuf>,
    stores: BTreeMap<ConversationId, GraphStore>,
    current: Option<ConversationId>,
    last_digest: Option<String>,
}

impl Workspace {
    /// Open the state file at `path`, creating an empty workspace if it does
    /// not exist yet.
    pub fn open(path: &Path, config: EngineConfig) -> Result<Self, GraphError> {
        let conversations = if path.exists() {
            storage::load_state(path)?
        } else {
            storage::ConversationMap::new()
        };
        let mut workspace = Self::with_conversations(conversations, config);
        workspace.path = Some(path.to_path_buf());
        info!(
            path = %path.display(),
            conversations = workspace.stores.len(),
            "workspace opened"
        );
        Ok(workspace)
    }

    /// A workspace that is never written to disk.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_conversations(storage::ConversationMap::new(), config)
    }

    fn with_conversations(conversations: storage::ConversationMap, config: EngineConfig) -> Self {
        let stores = conversations
            .into_iter()
            .map(|(id, conversation)| (id, GraphStore::new(conversation, &config)))
            .collect();
        Workspace {
            config,
            path: None,
            stores,
            current: None,
            last_digest: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Persistence ----

    /// Re-serialize every conversation and write the document, unless it is
    /// byte-identical to the last one written.
    pub fn persist(&mut self) -> Result<(), GraphError> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let state: BTreeMap<&ConversationId, &Conversation> = self
            .stores
            .iter()
            .map(|(id, store)| (id, store.conversation()))
            .collect();
        let written = storage::save_state(path, &state, self.config.compress_state, self.last_digest.as_deref())?;
        if let Some(digest) = written {
            self.last_digest = Some(digest);
        }
        Ok(())
    }

    fn persist_logged(&mut self) -> Result<(), GraphError> {
        self.persist().inspect_err(|e| warn!(error = %e, "failed to persist state"))
    }

    // ---- Conversations ----

    pub fn conversations(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.stores.values().map(|s| s.conversation()).collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn current_id(&self) -> Option<&ConversationId> {
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&GraphStore> {
        self.current.as_ref().and_then(|id| self.stores.get(id))
    }

    pub fn store(&self, id: &ConversationId) -> Option<&GraphStore> {
        self.stores.get(id)
    }

    fn current_mut(&mut self) -> Result<&mut GraphStore, GraphError> {
        let id = self.current.as_ref().ok_or(GraphError::NoActiveConversation)?;
        self.stores
            .get_mut(id)
            .ok_or_else(|| GraphError::ConversationNotFound(id.0.clone()))
    }

    /// Start a new conversation and make it current.
    pub fn create_conversation(&mut self, title: &str) -> Result<ConversationId, GraphError> {
        let conversation = Conversation::new(title);
        let id = conversation.id.clone();
        self.stores
            .insert(id.clone(), GraphStore::new(conversation, &self.config));
        info!(conversation = %id, "conversation created");
        self.switch_conversation(&id)?;
        Ok(id)
    }

    /// Make `id` current. History never carries over: the stacks of the
    /// conversation being left and the one being entered are cleared.
    pub fn switch_conversation(&mut self, id: &ConversationId) -> Result<(), GraphError> {
        if !self.stores.contains_key(id) {
            return Err(GraphError::ConversationNotFound(id.0.clone()));
        }
        if let Some(previous) = self.current.take() {
            if let Some(store) = self.stores.get_mut(&previous) {
                store.reset_history();
            }
        }
        if let Some(store) = self.stores.get_mut(id) {
            store.reset_history();
        }
        debug!(conversation = %id, "switched conversation");
        self.current = Some(id.clone());
        self.persist_logged()
    }

    pub fn rename_conversation(&mut self, id: &ConversationId, title: &str) -> Result<(), GraphError> {
        self.stores
            .get_mut(id)
            .ok_or_else(|| GraphError::ConversationNotFound(id.0.clone()))?
            .rename(title);
        self.persist_logged()
    }

    pub fn delete_conversation(&mut self, id: &ConversationId) -> Result<(), GraphError> {
        self.stores
            .remove(id)
            .ok_or_else(|| GraphError::ConversationNotFound(id.0.clone()))?;
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        info!(conversation = %id, "conversation deleted");
        self.persist_logged()
    }

    /// Run one action against the current conversation and persist if it
    /// succeeded.
    pub fn apply<T>(
        &mut self,
        action: impl FnOnce(&mut GraphStore) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let result = action(self.current_mut()?)?;
        self.persist_logged()?;
        Ok(result)
    }

    pub fn push_message(&mut self, role: Role, content: &str) -> Result<(), GraphError> {
        self.apply(|store| {
            store.push_message(role, content);
            Ok(())
        })
    }

    pub fn cold_start(&mut self) -> Result<bool, GraphError> {
        self.apply(|store| Ok(store.cold_start()))
    }

    /// Render colors for the current conversation. Colors are transient,
    /// so nothing is persisted.
    pub fn node_colors(&mut self) -> Result<Vec<(NodeId, String)>, GraphError> {
        Ok(self.current_mut()?.node_colors())
    }

    pub fn undo(&mut self) -> Result<bool, GraphError> {
        let moved = self.current_mut()?.undo();
        if moved {
            self.persist_logged()?;
        }
        Ok(moved)
    }

    pub fn redo(&mut self) -> Result<bool, GraphError> {
        let moved = self.current_mut()?.redo();
        if moved {
            self.persist_logged()?;
        }
        Ok(moved)
    }

    // ---- Service round trips ----

    fn issue(&self, kind: RequestKind) -> Result<RequestTicket, GraphError> {
        let conversation_id = self.current.clone().ok_or(GraphError::NoActiveConversation)?;
        debug!(conversation = %conversation_id, kind = %kind, "request issued");
        Ok(RequestTicket { conversation_id, kind })
    }

    /// Check a returning ticket against the current conversation.
    pub fn validate_ticket(&self, ticket: &RequestTicket, kind: RequestKind) -> Result<(), GraphError> {
        if ticket.kind != kind {
            return Err(GraphError::TicketMismatch {
                expected: ticket.kind.to_string(),
                actual: kind.to_string(),
            });
        }
        match &self.current {
            Some(current) if current == &ticket.conversation_id => Ok(()),
            current => {
                let current = current.as_ref().map(|c| c.0.clone()).unwrap_or_default();
                warn!(
                    requested = %ticket.conversation_id,
                    current = %current,
                    kind = %kind,
                    "discarding stale response"
                );
                Err(GraphError::StaleResponse {
                    requested: ticket.conversation_id.0.clone(),
                    current,
                })
            }
        }
    }

    pub fn begin_generation(
        &self,
        assistant_message: &str,
    ) -> Result<(RequestTicket, GenerationRequest), GraphError> {
        let ticket = self.issue(RequestKind::Generation)?;
        let request = self
            .current()
            .ok_or(GraphError::NoActiveConversation)?
            .generation_request(assistant_message);
        Ok((ticket, request))
    }

    /// Merge a generation response into the conversation that asked for it,
    /// as one undoable action.
    pub fn complete_generation(
        &mut self,
        ticket: &RequestTicket,
        response: &Fragment,
    ) -> Result<MergeReport, GraphError> {
        self.validate_ticket(ticket, RequestKind::Generation)?;
        self.apply(|store| store.merge_fragment(response))
    }

    /// `None` when the conversation has no concepts to quiz on.
    pub fn begin_quiz(
        &self,
        difficulty: Difficulty,
        num_questions: u32,
    ) -> Result<Option<(RequestTicket, QuizRequest)>, GraphError> {
        let ticket = self.issue(RequestKind::Quiz)?;
        let request = self
            .current()
            .ok_or(GraphError::NoActiveConversation)?
            .quiz_request(difficulty, num_questions);
        Ok(request.map(|r| (ticket, r)))
    }

    pub fn complete_quiz(&self, ticket: &RequestTicket, response: QuizResponse) -> Result<QuizResponse, GraphError> {
        self.validate_ticket(ticket, RequestKind::Quiz)?;
        Ok(response)
    }

    pub fn begin_answer_check(
        &self,
        question: &str,
        user_answer: &str,
    ) -> Result<(RequestTicket, AnswerCheckRequest), GraphError> {
        let ticket = self.issue(RequestKind::AnswerCheck)?;
        Ok((
            ticket,
            AnswerCheckRequest {
                question: question.to_string(),
                user_answer: user_answer.to_string(),
            },
        ))
    }

    pub fn complete_answer_check(
        &self,
        ticket: &RequestTicket,
        response: AnswerCheckResponse,
    ) -> Result<AnswerCheckResponse, GraphError> {
        self.validate_ticket(ticket, RequestKind::AnswerCheck)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::FragmentNode;
    use crate::settings::is_congruent;
    use crate::store::NodeDraft;
    use tempfile::TempDir;

    fn fragment(names: &[&str]) -> Fragment {
        Fragment {
            nodes: names.iter().map(|n| FragmentNode::new(n, "info")).collect(),
            links: vec![],
        }
    }

    #[test]
    fn test_generation_round_trip() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        ws.create_conversation("Chat").unwrap();
        ws.push_message(Role::Assistant, "Recursion is...").unwrap();

        let (ticket, request) = ws.begin_generation("Recursion is...").unwrap();
        assert!(request.existing_graph.is_none());
        let report = ws.complete_generation(&ticket, &fragment(&["Recursion"])).unwrap();
        assert_eq!(report.added_nodes.len(), 1);

        let (_, request) = ws.begin_generation("More").unwrap();
        assert_eq!(request.existing_graph.unwrap().nodes[0].name, "Recursion");
    }

    #[test]
    fn test_stale_generation_is_discarded() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        let first = ws.create_conversation("First").unwrap();
        let (ticket, _) = ws.begin_generation("text").unwrap();

        let second = ws.create_conversation("Second").unwrap();
        let result = ws.complete_generation(&ticket, &fragment(&["Late"]));
        assert!(matches!(result, Err(GraphError::StaleResponse { .. })));
        assert!(ws.store(&first).unwrap().graph().is_none());
        assert!(ws.store(&second).unwrap().graph().is_none());

        // Switching back makes a fresh request valid again.
        ws.switch_conversation(&first).unwrap();
        let (ticket, _) = ws.begin_generation("text").unwrap();
        assert!(ws.complete_generation(&ticket, &fragment(&["OnTime"])).is_ok());
    }

    #[test]
    fn test_ticket_kind_must_match() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        ws.create_conversation("Chat").unwrap();
        let (ticket, _) = ws.begin_answer_check("Q?", "A").unwrap();
        let result = ws.complete_generation(&ticket, &fragment(&["X"]));
        assert!(matches!(result, Err(GraphError::TicketMismatch { .. })));
    }

    #[test]
    fn test_quiz_needs_a_graph() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        ws.create_conversation("Chat").unwrap();
        assert!(ws.begin_quiz(Difficulty::Medium, 3).unwrap().is_none());

        let (ticket, _) = ws.begin_generation("x").unwrap();
        ws.complete_generation(&ticket, &fragment(&["A", "B"])).unwrap();
        let (ticket, request) = ws.begin_quiz(Difficulty::Medium, 3).unwrap().unwrap();
        assert_eq!(request.graph_data.nodes, vec!["A", "B"]);
        assert!(ws.complete_quiz(&ticket, QuizResponse::default()).is_ok());
    }

    #[test]
    fn test_switch_resets_history() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        let first = ws.create_conversation("First").unwrap();
        ws.apply(|s| s.add_node(NodeDraft { name: "A".into(), ..NodeDraft::default() }))
            .unwrap();
        assert_eq!(ws.current().unwrap().history().undo_len(), 1);

        ws.create_conversation("Second").unwrap();
        ws.switch_conversation(&first).unwrap();
        assert_eq!(ws.current().unwrap().history().undo_len(), 0);
        assert!(!ws.undo().unwrap());
        assert_eq!(ws.current().unwrap().graph().unwrap().nodes.len(), 1);
    }

    #[test]
    fn test_no_active_conversation() {
        let mut ws = Workspace::in_memory(EngineConfig::default());
        assert!(matches!(ws.undo(), Err(GraphError::NoActiveConversation)));
        assert!(matches!(ws.begin_generation("x"), Err(GraphError::NoActiveConversation)));
        let missing = ConversationId("nope".into());
        assert!(matches!(
            ws.switch_conversation(&missing),
            Err(GraphError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let id = {
            let mut ws = Workspace::open(&path, EngineConfig::default()).unwrap();
            let id = ws.create_conversation("Saved").unwrap();
            let (ticket, _) = ws.begin_generation("x").unwrap();
            ws.complete_generation(&ticket, &fragment(&["A", "B"])).unwrap();
            let a = ws.current().unwrap().graph().unwrap().nodes[0].id.clone();
            ws.apply(|s| s.delete_node(&a)).unwrap();
            id
        };

        let mut ws = Workspace::open(&path, EngineConfig::default()).unwrap();
        let store = ws.store(&id).unwrap();
        let graph = store.graph().unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].name, "B");
        assert!(is_congruent(graph));
        assert_eq!(store.history().undo_len(), 0, "history is not persisted");

        ws.switch_conversation(&id).unwrap();
        ws.rename_conversation(&id, "Renamed").unwrap();
        ws.delete_conversation(&id).unwrap();
        assert!(ws.current_id().is_none());
        let reopened = Workspace::open(&path, EngineConfig::default()).unwrap();
        assert!(reopened.conversations().is_empty());
    }

    #[test]
    fn test_unchanged_state_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut ws = Workspace::open(&path, EngineConfig::default()).unwrap();
        ws.create_conversation("Chat").unwrap();
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        ws.persist().unwrap();
        assert!(!path.exists(), "identical state should not be rewritten");

        ws.push_message(Role::User, "hello").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_node_colors_do_not_touch_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let mut ws = Workspace::open(&path, EngineConfig::default()).unwrap();
        assert!(matches!(ws.node_colors(), Err(GraphError::NoActiveConversation)));

        ws.create_conversation("Chat").unwrap();
        let (ticket, _) = ws.begin_generation("x").unwrap();
        ws.complete_generation(&ticket, &fragment(&["A", "B"])).unwrap();
        std::fs::remove_file(&path).unwrap();

        let colors = ws.node_colors().unwrap();
        assert_eq!(colors.len(), 2);
        assert_eq!(ws.node_colors().unwrap(), colors);
        assert!(!path.exists());
    }

    #[test]
    fn test_compressed_state_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let config = EngineConfig {
            compress_state: true,
            ..EngineConfig::default()
        };
        let id = {
            let mut ws = Workspace::open(&path, config.clone()).unwrap();
            let id = ws.create_conversation("Packed").unwrap();
            ws.cold_start().unwrap();
            id
        };
        let ws = Workspace::open(&path, config).unwrap();
        assert!(ws.store(&id).unwrap().graph().unwrap().is_empty());
    }
}
