use crate::model::{Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How concept names are compared when deciding whether a concept is
/// already known.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatching {
    /// Byte-for-byte comparison. "Recursion" and "recursion " are distinct.
    #[default]
    Exact,
    /// Trim surrounding whitespace and lowercase before comparing.
    Normalized,
}

impl NameMatching {
    pub fn key(&self, name: &str) -> String {
        match self {
            NameMatching::Exact => name.to_string(),
            NameMatching::Normalized => name.trim().to_lowercase(),
        }
    }
}

/// Name <-> id lookup over a node set.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    matching: NameMatching,
}

impl IdentityResolver {
    pub fn new(matching: NameMatching) -> Self {
        IdentityResolver { matching }
    }

    pub fn matching(&self) -> NameMatching {
        self.matching
    }

    pub fn key(&self, name: &str) -> String {
        self.matching.key(name)
    }

    pub fn find_id<'a>(&self, nodes: &'a [Node], name: &str) -> Option<&'a NodeId> {
        let key = self.key(name);
        nodes
            .iter()
            .find(|n| self.key(&n.name) == key)
            .map(|n| &n.id)
    }

    pub fn find_name<'a>(nodes: &'a [Node], id: &NodeId) -> Option<&'a str> {
        nodes.iter().find(|n| &n.id == id).map(|n| n.name.as_str())
    }

    /// Matching key -> id for every node. If two nodes share a key the
    /// earlier one wins.
    pub fn name_index(&self, nodes: &[Node]) -> HashMap<String, NodeId> {
        let mut index = HashMap::with_capacity(nodes.len());
        for node in nodes {
            index
                .entry(self.key(&node.name))
                .or_insert_with(|| node.id.clone());
        }
        index
    }

    /// Extend the index of `nodes` with a fresh id for every name in
    /// `new_names` that is not already known. The returned map is keyed by
    /// matching key and covers both existing and newly assigned nodes.
    pub fn assign_ids<S: AsRef<str>>(
        &self,
        nodes: &[Node],
        new_names: &[S],
    ) -> HashMap<String, NodeId> {
        let mut index = self.name_index(nodes);
        for name in new_names {
            index
                .entry(self.key(name.as_ref()))
                .or_insert_with(NodeId::fresh);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, name: &str) -> Node {
        Node {
            id: NodeId(id.to_string()),
            name: name.to_string(),
            info: String::new(),
        }
    }

    #[test]
    fn test_find_id_exact_is_case_sensitive() {
        let nodes = vec![node("id1", "Recursion")];
        let resolver = IdentityResolver::default();

        assert_eq!(resolver.find_id(&nodes, "Recursion"), Some(&NodeId("id1".into())));
        assert_eq!(resolver.find_id(&nodes, "recursion"), None);
        assert_eq!(resolver.find_id(&nodes, "Recursion "), None);
    }

    #[test]
    fn test_find_id_normalized_folds_case_and_whitespace() {
        let nodes = vec![node("id1", "Recursion")];
        let resolver = IdentityResolver::new(NameMatching::Normalized);

        assert_eq!(resolver.find_id(&nodes, "  recursion "), Some(&NodeId("id1".into())));
    }

    #[test]
    fn test_find_name() {
        let nodes = vec![node("id1", "A"), node("id2", "B")];
        assert_eq!(IdentityResolver::find_name(&nodes, &NodeId("id2".into())), Some("B"));
        assert_eq!(IdentityResolver::find_name(&nodes, &NodeId("nope".into())), None);
    }

    #[test]
    fn test_assign_ids_covers_existing_and_new() {
        let nodes = vec![node("id1", "A")];
        let resolver = IdentityResolver::default();

        let map = resolver.assign_ids(&nodes, &["A", "B", "C", "B"]);
        assert_eq!(map.len(), 3);
        assert_eq!(map["A"], NodeId("id1".into()));
        assert_ne!(map["B"], map["C"]);
        assert_ne!(map["B"].0, "id1");
    }

    #[test]
    fn test_name_round_trip() {
        let nodes = vec![node("id1", "A"), node("id2", "B"), node("id3", "C")];
        let resolver = IdentityResolver::default();

        for n in &nodes {
            let name = IdentityResolver::find_name(&nodes, &n.id).unwrap();
            assert_eq!(resolver.find_id(&nodes, name), Some(&n.id));
        }
    }
}
