//! Output generators for the static site.
//!
//! - [`generate_search_json`] / [`generate_graph_json`]: client-side data files
//! - [`generate_manifest`]: build manifest with artifact checksums
//! - [`HtmlTemplates`]: the bundled [`PageTemplates`](roamweb_shared::PageTemplates)
//! - [`STATIC_ASSETS`]: stylesheet and script shipped with every site

mod html;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use roamweb_shared::{
    ArtifactMeta, CURRENT_SCHEMA_VERSION, Graph, Result, RoamWebError, SearchIndex, SiteManifest,
};

pub use html::HtmlTemplates;

/// `(relative path, contents)` of files copied into `assets/`.
pub const STATIC_ASSETS: &[(&str, &str)] = &[
    ("style.css", include_str!("../assets/style.css")),
    ("site.js", include_str!("../assets/site.js")),
];

/// Serialize `search.json`.
pub fn generate_search_json(index: &SearchIndex) -> Result<String> {
    to_pretty_json(index)
}

/// Serialize `graph.json`.
pub fn generate_graph_json(graph: &Graph) -> Result<String> {
    to_pretty_json(graph)
}

/// Counts recorded in the manifest.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestCounts {
    pub node_count: usize,
    pub edge_count: usize,
    pub tag_count: usize,
}

/// Serialize `manifest.json` for the given artifacts.
pub fn generate_manifest(
    tool_version: &str,
    counts: ManifestCounts,
    artifacts: Vec<ArtifactMeta>,
) -> Result<String> {
    let manifest = SiteManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        tool_version: tool_version.to_string(),
        built_at: Utc::now(),
        node_count: counts.node_count,
        edge_count: counts.edge_count,
        tag_count: counts.tag_count,
        artifacts,
    };
    to_pretty_json(&manifest)
}

/// Checksum record for an artifact's contents.
pub fn artifact_meta(filename: &str, content: &str) -> ArtifactMeta {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    ArtifactMeta {
        filename: filename.to_string(),
        sha256: format!("{:x}", hasher.finalize()),
        size_bytes: content.len(),
    }
}

fn to_pretty_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| RoamWebError::Render(format!("JSON serialization failed: {e}")))
}
