#[cfg(feature = "napi")]
#[macro_use]
extern crate napi_derive;

pub mod adapter;
pub mod config;
pub mod error;
pub mod history;
pub mod identity;
pub mod merge;
pub mod model;
pub mod settings;
pub mod storage;
pub mod store;
pub mod workspace;

#[cfg(feature = "napi")]
mod napi_convert;
#[cfg(feature = "napi")]
mod napi_dto;
#[cfg(feature = "napi")]
mod napi_exports;

pub use config::EngineConfig;
pub use error::GraphError;
pub use merge::{Fragment, MergeEngine, MergeReport};
pub use model::{Conversation, ConversationId, KnowledgeGraph, Link, Node, NodeId};
pub use store::GraphStore;
pub use workspace::{RequestKind, RequestTicket, Workspace};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Install the stderr subscriber once per process. `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("conceptweave_core=info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    });
}
