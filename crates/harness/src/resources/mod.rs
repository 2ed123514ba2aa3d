//! Asset resolution. A resolver turns an asset key into a [`SceneGraph`]:
//! the list of renderable nodes a scene object wraps into its mesh.
//!
//! Resolution is the only asynchronous step in an object's lifecycle. It
//! never touches the physics world, the render scene or the registry.

mod keys;
mod xml;

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::render::MeshNode;

pub use keys::AssetKeyError;
pub(crate) use keys::validate_asset_key;
pub use xml::XmlModelResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneGraph {
    pub key: String,
    pub digest_sha256_hex: String,
    pub nodes: Vec<MeshNode>,
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid asset key '{key}': {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: AssetKeyError,
    },
    #[error("asset '{key}' not found at {path}")]
    NotFound { key: String, path: PathBuf },
    #[error("failed to read asset '{key}' at {path}: {source}")]
    Io {
        key: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed model '{key}' (line={line}, column={column}): {message}")]
    Malformed {
        key: String,
        line: u32,
        column: u32,
        message: String,
    },
    #[error("invalid model '{key}': {message}")]
    InvalidModel { key: String, message: String },
    #[error("asset '{key}' is not registered with the resolver")]
    Unregistered { key: String },
}

impl ResourceError {
    pub fn key(&self) -> &str {
        match self {
            Self::InvalidKey { key, .. }
            | Self::NotFound { key, .. }
            | Self::Io { key, .. }
            | Self::Malformed { key, .. }
            | Self::InvalidModel { key, .. }
            | Self::Unregistered { key } => key,
        }
    }
}

pub trait ResourceResolver {
    fn resolve(&self, key: &str) -> impl Future<Output = Result<SceneGraph, ResourceError>>;
}

/// Resolver backed by an in-memory table, for tests and scripted sessions
/// that do not ship asset files.
#[derive(Debug, Default, Clone)]
pub struct MemoryResolver {
    models: HashMap<String, Vec<MeshNode>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, node_names: &[&str]) {
        let nodes = node_names
            .iter()
            .map(|name| MeshNode {
                name: (*name).to_string(),
                primitive: "mesh".to_string(),
                cast_shadow: false,
                receive_shadow: false,
            })
            .collect();
        self.models.insert(key.into(), nodes);
    }

    pub fn with_model(mut self, key: impl Into<String>, node_names: &[&str]) -> Self {
        self.register(key, node_names);
        self
    }
}

impl ResourceResolver for MemoryResolver {
    async fn resolve(&self, key: &str) -> Result<SceneGraph, ResourceError> {
        validate_asset_key(key).map_err(|source| ResourceError::InvalidKey {
            key: key.to_string(),
            source,
        })?;
        let nodes = self
            .models
            .get(key)
            .cloned()
            .ok_or_else(|| ResourceError::Unregistered {
                key: key.to_string(),
            })?;
        let mut hasher = Sha256::new();
        for node in &nodes {
            hasher.update(node.name.as_bytes());
            hasher.update([0u8]);
        }
        Ok(SceneGraph {
            key: key.to_string(),
            digest_sha256_hex: to_hex_lower(&hasher.finalize()),
            nodes,
        })
    }
}

pub(crate) fn sha256_hex(bytes: &[u8]) -> String {
    to_hex_lower(&Sha256::digest(bytes))
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_resolver_returns_registered_nodes() {
        let resolver = MemoryResolver::new().with_model("models/target.xml", &["ring", "stand"]);
        let graph =
            pollster::block_on(resolver.resolve("models/target.xml")).expect("registered model");
        assert_eq!(graph.key, "models/target.xml");
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.digest_sha256_hex.len(), 64);
    }

    #[test]
    fn memory_resolver_rejects_unknown_and_invalid_keys() {
        let resolver = MemoryResolver::new();
        let err = pollster::block_on(resolver.resolve("models/missing.xml"))
            .expect_err("unregistered");
        assert!(matches!(err, ResourceError::Unregistered { .. }));
        assert_eq!(err.key(), "models/missing.xml");

        let err = pollster::block_on(resolver.resolve("../escape.xml")).expect_err("invalid key");
        assert!(matches!(
            err,
            ResourceError::InvalidKey {
                source: AssetKeyError::ParentTraversal,
                ..
            }
        ));
    }

    #[test]
    fn sha256_hex_is_lowercase_and_stable() {
        let a = sha256_hex(b"<Model/>");
        let b = sha256_hex(b"<Model/>");
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(a, sha256_hex(b"<Model></Model>"));
    }
}
