use crate::model::KnowledgeGraph;
use std::collections::VecDeque;
use tracing::debug;

/// Bounded undo/redo stacks of whole-graph snapshots for one conversation.
///
/// Each entry is an owned deep copy, so later edits to the live graph never
/// reach a pushed snapshot. When a stack exceeds its capacity the oldest
/// entry is dropped.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    undo_stack: VecDeque<KnowledgeGraph>,
    redo_stack: VecDeque<KnowledgeGraph>,
    capacity: usize,
    empty_palette_id: String,
}

impl HistoryManager {
    /// `empty_palette_id` is the palette of the sentinel snapshot recorded
    /// when a conversation has no graph yet.
    pub fn new(capacity: usize, empty_palette_id: &str) -> Self {
        HistoryManager {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            capacity: capacity.max(1),
            empty_palette_id: empty_palette_id.to_string(),
        }
    }

    fn snapshot(&self, graph: Option<&KnowledgeGraph>) -> KnowledgeGraph {
        graph
            .cloned()
            .unwrap_or_else(|| KnowledgeGraph::empty(&self.empty_palette_id))
    }

    fn push_bounded(stack: &mut VecDeque<KnowledgeGraph>, entry: KnowledgeGraph, capacity: usize) {
        stack.push_back(entry);
        while stack.len() > capacity {
            stack.pop_front();
        }
    }

    /// Snapshot `current` before a mutating action replaces it. Clears redo.
    pub fn record_checkpoint(&mut self, current: Option<&KnowledgeGraph>) {
        let entry = self.snapshot(current);
        Self::push_bounded(&mut self.undo_stack, entry, self.capacity);
        self.redo_stack.clear();
        debug!(undo = self.undo_stack.len(), "checkpoint recorded");
    }

    /// Returns the graph to install, or `None` when there is nothing to undo.
    pub fn undo(&mut self, current: Option<&KnowledgeGraph>) -> Option<KnowledgeGraph> {
        let previous = self.undo_stack.pop_back()?;
        let entry = self.snapshot(current);
        Self::push_bounded(&mut self.redo_stack, entry, self.capacity);
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "undo");
        Some(previous)
    }

    /// Returns the graph to install, or `None` when there is nothing to redo.
    pub fn redo(&mut self, current: Option<&KnowledgeGraph>) -> Option<KnowledgeGraph> {
        let next = self.redo_stack.pop_back()?;
        let entry = self.snapshot(current);
        Self::push_bounded(&mut self.undo_stack, entry, self.capacity);
        debug!(undo = self.undo_stack.len(), redo = self.redo_stack.len(), "redo");
        Some(next)
    }

    pub fn reset(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeId};

    fn graph_of(n: usize) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::empty("default");
        for i in 0..n {
            graph.nodes.push(Node {
                id: NodeId(format!("id{i}")),
                name: format!("N{i}"),
                info: String::new(),
            });
        }
        graph
    }

    #[test]
    fn test_checkpoint_pushes_and_clears_redo() {
        let mut history = HistoryManager::new(3, "default");
        history.record_checkpoint(Some(&graph_of(1)));
        assert_eq!(history.undo_len(), 1);

        let restored = history.undo(Some(&graph_of(2))).unwrap();
        assert_eq!(restored, graph_of(1));
        assert_eq!(history.redo_len(), 1);

        history.record_checkpoint(Some(&graph_of(1)));
        assert_eq!(history.redo_len(), 0, "new action should clear redo");
    }

    #[test]
    fn test_bounded_to_capacity() {
        let mut history = HistoryManager::new(3, "default");
        for i in 0..5 {
            history.record_checkpoint(Some(&graph_of(i)));
        }
        assert_eq!(history.undo_len(), 3);

        let mut current = graph_of(5);
        let mut undone = 0;
        while let Some(previous) = history.undo(Some(&current)) {
            current = previous;
            undone += 1;
        }
        assert_eq!(undone, 3);
        // The two oldest checkpoints (0 and 1 nodes) were evicted.
        assert_eq!(current, graph_of(2));
        assert_eq!(history.redo_len(), 3);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let mut history = HistoryManager::new(3, "default");
        let g0 = graph_of(1);
        let g1 = graph_of(2);

        history.record_checkpoint(Some(&g0));
        let back = history.undo(Some(&g1)).unwrap();
        assert_eq!(back, g0);
        let forward = history.redo(Some(&back)).unwrap();
        assert_eq!(forward, g1);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.redo_len(), 0);
    }

    #[test]
    fn test_underflow_is_noop() {
        let mut history = HistoryManager::new(3, "default");
        assert!(history.undo(Some(&graph_of(1))).is_none());
        assert!(history.redo(None).is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_missing_graph_recorded_as_empty_sentinel() {
        let mut history = HistoryManager::new(3, "pastel");
        history.record_checkpoint(None);
        let restored = history.undo(Some(&graph_of(1))).unwrap();
        assert_eq!(restored, KnowledgeGraph::empty("pastel"));
    }

    #[test]
    fn test_snapshots_are_independent() {
        let mut history = HistoryManager::new(3, "default");
        let mut live = graph_of(1);
        history.record_checkpoint(Some(&live));
        live.nodes[0].name = "changed".to_string();

        let restored = history.undo(Some(&live)).unwrap();
        assert_eq!(restored.nodes[0].name, "N0");
    }

    #[test]
    fn test_huge_capacity_does_not_preallocate() {
        for capacity in [1usize << 60, usize::MAX] {
            let mut history = HistoryManager::new(capacity, "default");
            assert_eq!(history.capacity(), capacity);
            history.record_checkpoint(Some(&graph_of(1)));
            assert_eq!(history.undo(None), Some(graph_of(1)));
            assert_eq!(history.redo_len(), 1);
        }
    }

    #[test]
    fn test_reset_clears_both_stacks() {
        let mut history = HistoryManager::new(3, "default");
        history.record_checkpoint(Some(&graph_of(1)));
        history.record_checkpoint(Some(&graph_of(2)));
        history.undo(Some(&graph_of(3)));
        history.reset();
        assert_eq!(history.undo_len(), 0);
        assert_eq!(history.redo_len(), 0);
    }
}
