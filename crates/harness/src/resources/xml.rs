use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::debug;

use super::{sha256_hex, validate_asset_key, ResourceError, ResourceResolver, SceneGraph};
use crate::render::MeshNode;

const DEFAULT_PRIMITIVE: &str = "mesh";

/// Resolves asset keys to XML model descriptors under an asset root:
///
/// ```xml
/// <Model>
///   <Node name="ring" primitive="torus"/>
/// </Model>
/// ```
///
/// Parsed models are cached per key and reparsed when the file digest changes.
#[derive(Debug)]
pub struct XmlModelResolver {
    root: PathBuf,
    cache: RefCell<HashMap<String, SceneGraph>>,
}

impl XmlModelResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cached_count(&self) -> usize {
        self.cache.borrow().len()
    }

    fn resolve_now(&self, key: &str) -> Result<SceneGraph, ResourceError> {
        validate_asset_key(key).map_err(|source| ResourceError::InvalidKey {
            key: key.to_string(),
            source,
        })?;
        let path = self.root.join(key);
        let bytes = fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ResourceError::NotFound {
                key: key.to_string(),
                path: path.clone(),
            },
            _ => ResourceError::Io {
                key: key.to_string(),
                path: path.clone(),
                source,
            },
        })?;
        let digest = sha256_hex(&bytes);

        if let Some(cached) = self.cache.borrow().get(key) {
            if cached.digest_sha256_hex == digest {
                debug!(key, "asset_cache_hit");
                return Ok(cached.clone());
            }
        }

        let raw = String::from_utf8(bytes).map_err(|_| ResourceError::InvalidModel {
            key: key.to_string(),
            message: "model file is not valid UTF-8".to_string(),
        })?;
        let nodes = parse_model_document(key, &raw)?;
        let graph = SceneGraph {
            key: key.to_string(),
            digest_sha256_hex: digest,
            nodes,
        };
        debug!(
            key,
            node_count = graph.nodes.len(),
            digest = %graph.digest_sha256_hex,
            "asset_parsed"
        );
        self.cache
            .borrow_mut()
            .insert(key.to_string(), graph.clone());
        Ok(graph)
    }
}

impl ResourceResolver for XmlModelResolver {
    async fn resolve(&self, key: &str) -> Result<SceneGraph, ResourceError> {
        self.resolve_now(key)
    }
}

fn parse_model_document(key: &str, raw: &str) -> Result<Vec<MeshNode>, ResourceError> {
    let doc = Document::parse(raw).map_err(|error| ResourceError::Malformed {
        key: key.to_string(),
        line: error.pos().row,
        column: error.pos().col,
        message: format!("malformed XML: {error}"),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Model" {
        return Err(error_at_node(
            key,
            &doc,
            root,
            "root element must be <Model>".to_string(),
        ));
    }

    let mut seen_names = HashSet::<String>::new();
    let mut nodes = Vec::new();
    for child in root.children().filter(|node| node.is_element()) {
        if child.tag_name().name() != "Node" {
            return Err(error_at_node(
                key,
                &doc,
                child,
                format!(
                    "unsupported element <{}>; models contain only <Node>",
                    child.tag_name().name()
                ),
            ));
        }
        let name = child
            .attribute("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                error_at_node(
                    key,
                    &doc,
                    child,
                    "<Node> requires a non-empty name attribute".to_string(),
                )
            })?;
        if !seen_names.insert(name.to_string()) {
            return Err(error_at_node(
                key,
                &doc,
                child,
                format!("duplicate node name '{name}'"),
            ));
        }
        nodes.push(MeshNode {
            name: name.to_string(),
            primitive: child
                .attribute("primitive")
                .unwrap_or(DEFAULT_PRIMITIVE)
                .to_string(),
            cast_shadow: false,
            receive_shadow: false,
        });
    }

    if nodes.is_empty() {
        return Err(ResourceError::InvalidModel {
            key: key.to_string(),
            message: "model declares no <Node> elements".to_string(),
        });
    }
    Ok(nodes)
}

fn error_at_node(
    key: &str,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    message: String,
) -> ResourceError {
    let pos = doc.text_pos_at(node.range().start);
    ResourceError::Malformed {
        key: key.to_string(),
        line: pos.row,
        column: pos.col,
        message,
    }
}
