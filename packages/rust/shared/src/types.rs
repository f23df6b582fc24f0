//! Core domain types: notes, links, graphs and the emitted JSON artifacts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current schema version of `manifest.json`.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Node ID → tag list, as loaded (unfiltered).
pub type TagMap = HashMap<String, Vec<String>>;

/// Node ID → title, built from the published corpus only.
pub type TitleMap = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Node / Link
// ---------------------------------------------------------------------------

/// A top-level note from the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Stable unique identifier.
    pub id: String,
    /// Source file the note lives in.
    pub file: PathBuf,
    /// Display title (may contain markup such as LaTeX).
    pub title: String,
    /// Raw property drawer contents.
    pub properties: BTreeMap<String, String>,
}

impl Node {
    /// Create a node without properties.
    pub fn new(id: impl Into<String>, file: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file: file.into(),
            title: title.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Base name of the source file, if it has one.
    pub fn file_name(&self) -> Option<&str> {
        self.file.file_name().and_then(|n| n.to_str())
    }
}

/// Discriminates how a link was written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// `id:` reference to another note. The only kind that builds relationships.
    Id,
    /// Anything else (`https`, `file`, `fuzzy`, ...).
    Other(String),
}

impl LinkKind {
    /// Parse the unquoted link type column.
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "id" => Self::Id,
            other => Self::Other(other.to_string()),
        }
    }
}

/// A directed link between two notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub kind: LinkKind,
}

impl Link {
    /// Create an `id:` link.
    pub fn id(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: LinkKind::Id,
        }
    }

    /// Whether this link participates in graph and backlink computation.
    pub fn is_id_reference(&self) -> bool {
        self.kind == LinkKind::Id
    }
}

/// Everything the corpus loader returns, before exclusion filtering.
#[derive(Debug, Clone, Default)]
pub struct RawCorpus {
    /// Candidate notes, ordered by source file descending.
    pub nodes: Vec<Node>,
    /// Tags per node ID, including tags of nodes that will be excluded.
    pub tags: TagMap,
    /// Links between nodes.
    pub links: Vec<Link>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// A node in a graph projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
    /// Qualifying edges touching this node within its graph (self-loops count twice).
    pub link_count: usize,
}

/// A directed edge in a graph projection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
}

/// A global or local graph, serialized as `graph.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphEdge>,
}

impl Graph {
    /// Sort nodes by ID and edges by `(source, target)`.
    ///
    /// Emission order carries no meaning; this gives every artifact a single
    /// byte-stable form.
    pub fn canonicalize(&mut self) {
        self.nodes.sort_by(|a, b| a.id.cmp(&b.id));
        self.links.sort();
    }

    /// Look up a node by ID.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Whether the graph has anything worth drawing.
    pub fn is_visualizable(&self) -> bool {
        self.nodes.len() > 1
    }
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

/// A single searchable note in `search.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub id: String,
    pub title: String,
    pub tags: Vec<String>,
}

/// Root structure for `search.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchIndex {
    pub entries: Vec<SearchEntry>,
}

// ---------------------------------------------------------------------------
// Rendered markup
// ---------------------------------------------------------------------------

/// A heading in a note's table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Heading depth, 1 for top-level headings.
    pub level: usize,
    /// Heading text (plain, unescaped).
    pub title: String,
    /// Anchor ID of the rendered heading.
    pub anchor: String,
}

/// Output of the markup collaborator for one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedNote {
    /// Title declared in the source, if any.
    pub title: Option<String>,
    /// Rendered body HTML.
    pub html: String,
    /// Table of contents in document order.
    pub toc: Vec<TocEntry>,
    /// Target IDs of every `id:` link in the body, in document order.
    pub links: Vec<String>,
}

// ---------------------------------------------------------------------------
// Build manifest
// ---------------------------------------------------------------------------

/// Checksum record for one emitted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// The `manifest.json` written at the root of the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Tool version that built the site.
    pub tool_version: String,
    /// When the build finished.
    pub built_at: chrono::DateTime<chrono::Utc>,
    /// Published notes.
    pub node_count: usize,
    /// Edges in the global graph.
    pub edge_count: usize,
    /// Generated tag pages.
    pub tag_count: usize,
    /// JSON artifacts with their checksums.
    pub artifacts: Vec<ArtifactMeta>,
}

/// File-name-safe form of a tag, used for `tags/<slug>.html`.
pub fn tag_slug(tag: &str) -> String {
    let slug: String = tag
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();

    if slug.is_empty() { "-".to_string() } else { slug }
}

/// Page slugs for a set of tags, unique across the set.
///
/// Tags whose [`tag_slug`] coincide, ignoring case, get `-2`, `-3`, ... in
/// the order they are assigned.
#[derive(Debug, Clone, Default)]
pub struct TagSlugs {
    slugs: HashMap<String, String>,
    taken: HashSet<String>,
}

impl TagSlugs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slug for `tag`, assigning a fresh one on first sight.
    pub fn assign(&mut self, tag: &str) -> &str {
        if !self.slugs.contains_key(tag) {
            let base = tag_slug(tag);
            let mut slug = base.clone();
            let mut n = 1;
            while !self.taken.insert(slug.to_lowercase()) {
                n += 1;
                slug = format!("{base}-{n}");
            }
            self.slugs.insert(tag.to_string(), slug);
        }
        &self.slugs[tag]
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.slugs.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_node_serializes_camel_case() {
        let node = GraphNode {
            id: "a".into(),
            title: "A".into(),
            tags: vec![],
            link_count: 3,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["linkCount"], 3);
        assert!(json["tags"].as_array().unwrap().is_empty());
    }

    #[test]
    fn graph_json_shape() {
        let graph = Graph {
            nodes: vec![],
            links: vec![GraphEdge {
                source: "a".into(),
                target: "b".into(),
            }],
        };
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["links"][0]["source"], "a");
        assert_eq!(json["links"][0]["target"], "b");
        assert!(json["nodes"].is_array());
    }

    #[test]
    fn canonicalize_sorts_nodes_and_edges() {
        let node = |id: &str| GraphNode {
            id: id.into(),
            title: id.into(),
            tags: vec![],
            link_count: 0,
        };
        let edge = |s: &str, t: &str| GraphEdge {
            source: s.into(),
            target: t.into(),
        };
        let mut graph = Graph {
            nodes: vec![node("c"), node("a"), node("b")],
            links: vec![edge("b", "a"), edge("a", "c"), edge("a", "b")],
        };
        graph.canonicalize();

        let ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(graph.links[0], edge("a", "b"));
        assert_eq!(graph.links[2], edge("b", "a"));
    }

    #[test]
    fn link_kind_parsing() {
        assert_eq!(LinkKind::from_type("id"), LinkKind::Id);
        assert_eq!(
            LinkKind::from_type("https"),
            LinkKind::Other("https".into())
        );
        assert!(!Link {
            source: "a".into(),
            target: "b".into(),
            kind: LinkKind::from_type("fuzzy"),
        }
        .is_id_reference());
    }

    #[test]
    fn tag_slug_replaces_path_characters() {
        assert_eq!(tag_slug("rust"), "rust");
        assert_eq!(tag_slug("machine learning"), "machine-learning");
        assert_eq!(tag_slug("a/b"), "a-b");
        assert_eq!(tag_slug(""), "-");
    }

    #[test]
    fn colliding_tags_get_distinct_slugs() {
        let mut slugs = TagSlugs::new();
        assert_eq!(slugs.assign("a/b"), "a-b");
        assert_eq!(slugs.assign("a b"), "a-b-2");
        assert_eq!(slugs.assign("A-B"), "A-B-3");
        assert_eq!(slugs.assign("a-b-2"), "a-b-2-2");
        assert_eq!(slugs.assign("a b"), "a-b-2");
        assert_eq!(slugs.get("a/b"), Some("a-b"));
        assert_eq!(slugs.get("missing"), None);
        assert_eq!(slugs.len(), 4);
    }
}
