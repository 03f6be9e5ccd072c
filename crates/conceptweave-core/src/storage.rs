use crate::error::GraphError;
use crate::model::{Conversation, ConversationId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// The whole persisted state: every conversation keyed by id.
pub type ConversationMap = BTreeMap<ConversationId, Conversation>;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const ZSTD_LEVEL: i32 = 3;

pub fn wants_compression(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "zst")
}

pub fn load_state(path: &Path) -> Result<ConversationMap, GraphError> {
    debug!(path = %path.display(), "loading state");
    let raw = fs::read(path)?;
    let json = if raw.starts_with(&ZSTD_MAGIC) {
        let mut decoder = zstd::Decoder::new(raw.as_slice())?;
        let mut json = Vec::new();
        decoder.read_to_end(&mut json)?;
        json
    } else {
        raw
    };
    let state: ConversationMap = serde_json::from_slice(&json)?;
    info!(conversations = state.len(), "state loaded");
    Ok(state)
}

/// Serialize the full state, optionally zstd-compressed.
pub fn encode_state<S: Serialize>(state: &S, compress: bool) -> Result<Vec<u8>, GraphError> {
    let json = serde_json::to_vec_pretty(state)?;
    if compress {
        Ok(zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?)
    } else {
        Ok(json)
    }
}

pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write already-encoded state through a temporary sibling file so a
/// crash mid-write never leaves a truncated document behind.
pub fn write_state(path: &Path, bytes: &[u8]) -> Result<(), GraphError> {
    debug!(path = %path.display(), bytes = bytes.len(), "saving state");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Encode and write `state`, returning the digest of what was written.
/// Returns `None` without touching the file when the encoding matches
/// `previous`.
pub fn save_state<S: Serialize>(
    path: &Path,
    state: &S,
    compress: bool,
    previous: Option<&str>,
) -> Result<Option<String>, GraphError> {
    let bytes = encode_state(state, compress || wants_compression(path))?;
    let digest = digest(&bytes);
    if previous == Some(digest.as_str()) {
        debug!(path = %path.display(), "state unchanged, skipping write");
        return Ok(None);
    }
    write_state(path, &bytes)?;
    Ok(Some(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KnowledgeGraph, Link, Node, NodeId, Role, Message};
    use tempfile::TempDir;

    fn sample_state() -> ConversationMap {
        let mut conversation = Conversation::new("Recursion");
        conversation.messages.push(Message {
            role: Role::User,
            content: "What is recursion?".into(),
        });
        let mut graph = KnowledgeGraph::empty("default");
        for id in ["id1", "id2"] {
            graph.nodes.push(Node {
                id: NodeId(id.into()),
                name: id.to_uppercase(),
                info: "$f(n) = f(n-1)$".into(),
            });
            graph.settings.show_node_relationships.insert(NodeId(id.into()), false);
        }
        graph.links.push(Link {
            source: NodeId("id1".into()),
            target: NodeId("id2".into()),
            label: "calls".into(),
        });
        conversation.graph_data = Some(graph);

        let empty = Conversation::new("Empty");
        let mut state = ConversationMap::new();
        state.insert(conversation.id.clone(), conversation);
        state.insert(empty.id.clone(), empty);
        state
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let state = sample_state();

        save_state(&path, &state, false, None).unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_state(&path).unwrap(), state);
    }

    #[test]
    fn test_compressed_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json.zst");
        let state = sample_state();

        save_state(&path, &state, false, None).unwrap();
        let raw = fs::read(&path).unwrap();
        assert!(raw.starts_with(&ZSTD_MAGIC));
        assert_eq!(load_state(&path).unwrap(), state);
    }

    #[test]
    fn test_persisted_layout_uses_wire_keys() {
        let state = sample_state();
        let value: serde_json::Value = serde_json::from_slice(&encode_state(&state, false).unwrap()).unwrap();
        let with_graph = value
            .as_object()
            .unwrap()
            .values()
            .find(|c| !c["graphData"].is_null())
            .unwrap();

        assert!(with_graph.get("createdAt").is_some());
        assert_eq!(with_graph["messages"][0]["role"], "user");
        let settings = &with_graph["graphData"]["settings"];
        assert_eq!(settings["colorPaletteId"], "default");
        assert_eq!(settings["showNodeRelationships"]["id1"], false);
        assert_eq!(with_graph["graphData"]["links"][0]["source"], "id1");
    }

    #[test]
    fn test_digest_tracks_content() {
        let state = sample_state();
        let a = encode_state(&state, false).unwrap();
        let b = encode_state(&state, false).unwrap();
        assert_eq!(digest(&a), digest(&b));

        let mut changed = state.clone();
        changed.values_mut().next().unwrap().title = "Renamed".into();
        let c = encode_state(&changed, false).unwrap();
        assert_ne!(digest(&a), digest(&c));
    }

    #[test]
    fn test_save_skips_matching_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let state = sample_state();

        let written = save_state(&path, &state, false, None).unwrap().unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(save_state(&path, &state, false, Some(&written)).unwrap(), None);
        assert!(!path.exists());

        let again = save_state(&path, &state, false, Some("stale")).unwrap();
        assert_eq!(again, Some(written));
        assert!(path.exists());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let result = load_state(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(GraphError::Io(_))));
    }
}
