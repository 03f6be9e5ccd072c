use crate::error::GraphError;
use crate::identity::IdentityResolver;
use crate::model::{KnowledgeGraph, Link, Node, NodeId};
use crate::settings;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// A name-addressed fragment as produced by the generation service. Fields
/// are optional on the wire; `MergeEngine::merge` rejects the whole fragment
/// if any required one is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub nodes: Vec<FragmentNode>,
    pub links: Vec<FragmentLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentNode {
    pub name: Option<String>,
    pub info: Option<String>,
}

impl FragmentNode {
    pub fn new(name: &str, info: &str) -> Self {
        FragmentNode {
            name: Some(name.to_string()),
            info: Some(info.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLink {
    pub source: Option<String>,
    pub target: Option<String>,
    pub label: Option<String>,
}

impl FragmentLink {
    pub fn new(source: &str, target: &str, label: &str) -> Self {
        FragmentLink {
            source: Some(source.to_string()),
            target: Some(target.to_string()),
            label: Some(label.to_string()),
        }
    }
}

struct CheckedNode<'a> {
    name: &'a str,
    info: &'a str,
}

struct CheckedLink<'a> {
    source: &'a str,
    target: &'a str,
    label: &'a str,
}

fn required<'a>(value: &'a Option<String>, what: &str, idx: usize, field: &str) -> Result<&'a str, GraphError> {
    value
        .as_deref()
        .ok_or_else(|| GraphError::Validation(format!("{what} {idx} is missing '{field}'")))
}

fn check(fragment: &Fragment) -> Result<(Vec<CheckedNode<'_>>, Vec<CheckedLink<'_>>), GraphError> {
    let mut nodes = Vec::with_capacity(fragment.nodes.len());
    for (idx, node) in fragment.nodes.iter().enumerate() {
        let name = required(&node.name, "node", idx, "name")?;
        let info = required(&node.info, "node", idx, "info")?;
        nodes.push(CheckedNode { name, info });
    }

    let mut links = Vec::with_capacity(fragment.links.len());
    for (idx, link) in fragment.links.iter().enumerate() {
        links.push(CheckedLink {
            source: required(&link.source, "link", idx, "source")?,
            target: required(&link.target, "link", idx, "target")?,
            label: required(&link.label, "link", idx, "label")?,
        });
    }
    Ok((nodes, links))
}

/// What a merge did, for logging and for telling the renderer what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub added_nodes: Vec<NodeId>,
    pub duplicate_nodes: usize,
    /// Nodes skipped because their name was blank.
    pub blank_nodes: usize,
    pub added_links: usize,
    pub unresolved_links: usize,
    pub duplicate_links: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        self.added_nodes.is_empty() && self.added_links == 0
    }
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub graph: KnowledgeGraph,
    pub report: MergeReport,
}

/// Combines a canonical graph with a name-addressed fragment.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    resolver: IdentityResolver,
    default_palette_id: String,
}

impl MergeEngine {
    pub fn new(resolver: IdentityResolver, default_palette_id: &str) -> Self {
        MergeEngine {
            resolver,
            default_palette_id: default_palette_id.to_string(),
        }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Merge `fragment` into `existing`, returning a new graph. Neither input
    /// is modified. Nodes whose name is already known are discarded (the
    /// first write for a name wins); links with an endpoint that resolves to
    /// no node, or that repeat an existing (source, target) pair, are dropped.
    pub fn merge(
        &self,
        existing: Option<&KnowledgeGraph>,
        fragment: &Fragment,
    ) -> Result<MergeOutcome, GraphError> {
        let (fragment_nodes, fragment_links) = check(fragment)?;

        let mut graph = match existing {
            Some(g) if !g.is_empty() => g.clone(),
            _ => KnowledgeGraph::empty(&self.default_palette_id),
        };
        let mut report = MergeReport::default();

        let known = self.resolver.name_index(&graph.nodes);
        let mut seen: HashSet<String> = HashSet::new();
        let mut fresh: Vec<&CheckedNode<'_>> = Vec::new();
        for node in &fragment_nodes {
            if node.name.trim().is_empty() {
                report.blank_nodes += 1;
                continue;
            }
            let key = self.resolver.key(node.name);
            if known.contains_key(&key) || !seen.insert(key) {
                report.duplicate_nodes += 1;
                continue;
            }
            fresh.push(node);
        }

        let fresh_names: Vec<&str> = fresh.iter().map(|n| n.name).collect();
        let name_to_id = self.resolver.assign_ids(&graph.nodes, &fresh_names);

        for node in fresh {
            let id = name_to_id[&self.resolver.key(node.name)].clone();
            settings::register_node(&mut graph.settings, &id);
            report.added_nodes.push(id.clone());
            graph.nodes.push(Node {
                id,
                name: node.name.to_string(),
                info: node.info.to_string(),
            });
        }

        let mut accepted: HashSet<(NodeId, NodeId)> = graph
            .links
            .iter()
            .map(|l| (l.source.clone(), l.target.clone()))
            .collect();
        for link in &fragment_links {
            let source = name_to_id.get(&self.resolver.key(link.source));
            let target = name_to_id.get(&self.resolver.key(link.target));
            let (Some(source), Some(target)) = (source, target) else {
                debug!(source = %link.source, target = %link.target, "dropping link with unknown endpoint");
                report.unresolved_links += 1;
                continue;
            };
            if !accepted.insert((source.clone(), target.clone())) {
                report.duplicate_links += 1;
                continue;
            }
            graph.links.push(Link {
                source: source.clone(),
                target: target.clone(),
                label: link.label.to_string(),
            });
            report.added_links += 1;
        }

        info!(
            added_nodes = report.added_nodes.len(),
            duplicate_nodes = report.duplicate_nodes,
            blank_nodes = report.blank_nodes,
            added_links = report.added_links,
            unresolved_links = report.unresolved_links,
            duplicate_links = report.duplicate_links,
            "fragment merged"
        );
        Ok(MergeOutcome { graph, report })
    }
}
