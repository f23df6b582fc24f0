//! Exclusion filtering and the published corpus.
//!
//! [`Corpus`] is the only place that answers "is this note visible?". Every
//! consumer that dereferences a node ID goes through [`Corpus::is_published`].

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use roamweb_shared::{ExcludeConfig, Link, Node, RawCorpus, Result, RoamWebError, TagMap, TitleMap};

// ---------------------------------------------------------------------------
// Exclusion rules
// ---------------------------------------------------------------------------

/// Compiled form of the `[exclude]` configuration.
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    tags: HashSet<String>,
    ids: HashSet<String>,
    files: Vec<Regex>,
}

impl ExclusionRules {
    /// Compile glob patterns. An invalid pattern is a config error.
    pub fn compile(config: &ExcludeConfig) -> Result<Self> {
        let files = config
            .files
            .iter()
            .map(|p| {
                glob_to_regex(p).ok_or_else(|| {
                    RoamWebError::config(format!("invalid exclude file pattern: {p:?}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tags: config.tags.iter().cloned().collect(),
            ids: config.ids.iter().cloned().collect(),
            files,
        })
    }

    /// Why `node` is excluded, or `None` when it is published.
    pub fn exclusion_reason(&self, node: &Node, tags: &[String]) -> Option<&'static str> {
        if self.ids.contains(&node.id) {
            return Some("id");
        }
        if tags.iter().any(|t| self.tags.contains(t)) {
            return Some("tag");
        }
        if let Some(name) = node.file_name() {
            if self.files.iter().any(|re| re.is_match(name)) {
                return Some("file");
            }
        }
        None
    }
}

/// Convert a simple glob (`*`, `?`, `[...]`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    class.push(c);
                }
                if !closed || class.is_empty() {
                    return None;
                }
                let class = match class.strip_prefix('!') {
                    Some(rest) => format!("^{}", rest.replace('\\', r"\\")),
                    None => class.replace('\\', r"\\"),
                };
                out.push('[');
                out.push_str(&class);
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push('$');
    Regex::new(&out).ok()
}

// ---------------------------------------------------------------------------
// Corpus
// ---------------------------------------------------------------------------

/// Nodes that survived exclusion, plus the full tag map and `id:` link set.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    nodes: Vec<Node>,
    tags: TagMap,
    links: Vec<Link>,
    titles: TitleMap,
}

impl Corpus {
    /// Single stable pass over `raw`, keeping loader order.
    ///
    /// Tags and links are kept unfiltered; exclusion reaches them only through
    /// [`Corpus::is_published`].
    #[instrument(skip_all, fields(candidates = raw.nodes.len()))]
    pub fn filter(raw: RawCorpus, rules: &ExclusionRules) -> Self {
        let RawCorpus { nodes, tags, links } = raw;
        let mut seen = HashSet::new();
        let mut published = Vec::with_capacity(nodes.len());
        let mut excluded = 0usize;

        for node in nodes {
            if node.id.is_empty() {
                warn!(file = %node.file.display(), "dropping node with empty id");
                continue;
            }
            if seen.contains(&node.id) {
                warn!(id = %node.id, file = %node.file.display(), "dropping duplicate node id");
                continue;
            }
            seen.insert(node.id.clone());

            let node_tags = tags.get(&node.id).map(Vec::as_slice).unwrap_or_default();
            if let Some(reason) = rules.exclusion_reason(&node, node_tags) {
                debug!(id = %node.id, reason, "excluding node");
                excluded += 1;
                continue;
            }
            published.push(node);
        }

        let titles = published
            .iter()
            .map(|n| (n.id.clone(), n.title.clone()))
            .collect();

        let links: Vec<Link> = links.into_iter().filter(Link::is_id_reference).collect();

        info!(
            published = published.len(),
            excluded,
            links = links.len(),
            "corpus filtered"
        );

        Self {
            nodes: published,
            tags,
            links,
            titles,
        }
    }

    /// Published nodes in loader order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every `id:` link, including ones touching excluded or unknown nodes.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// ID → title of published nodes.
    pub fn titles(&self) -> &TitleMap {
        &self.titles
    }

    pub fn is_published(&self, id: &str) -> bool {
        self.titles.contains_key(id)
    }

    /// Title of a published node.
    pub fn title(&self, id: &str) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }

    /// Tags of a node, empty when it has none.
    pub fn tags_for(&self, id: &str) -> &[String] {
        self.tags.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawCorpus {
        RawCorpus {
            nodes: vec![
                Node::new("c", "/roam/20240301000000-gamma.org", "Gamma"),
                Node::new("b", "/roam/20240201000000-beta.org", "Beta"),
                Node::new("a", "/roam/20240101000000-alpha.org", "Alpha"),
                Node::new("p", "/roam/journal.private.org", "Journal"),
            ],
            tags: TagMap::from([
                ("b".to_string(), vec!["draft".to_string()]),
                ("a".to_string(), vec!["rust".to_string(), "draft".to_string()]),
                ("c".to_string(), vec!["rust".to_string()]),
            ]),
            links: vec![
                Link::id("a", "b"),
                Link::id("c", "a"),
                Link {
                    source: "a".into(),
                    target: "https://example.com".into(),
                    kind: roamweb_shared::LinkKind::Other("https".into()),
                },
            ],
        }
    }

    fn rules(tags: &[&str], files: &[&str], ids: &[&str]) -> ExclusionRules {
        let to_vec = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        ExclusionRules::compile(&ExcludeConfig {
            tags: to_vec(tags),
            files: to_vec(files),
            ids: to_vec(ids),
        })
        .unwrap()
    }

    fn ids(corpus: &Corpus) -> Vec<&str> {
        corpus.nodes().iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn no_rules_publish_everything_in_order() {
        let corpus = Corpus::filter(raw(), &ExclusionRules::default());
        assert_eq!(ids(&corpus), ["c", "b", "a", "p"]);
        assert_eq!(corpus.title("a"), Some("Alpha"));
    }

    #[test]
    fn excluded_tag_removes_every_carrier() {
        let corpus = Corpus::filter(raw(), &rules(&["draft"], &[], &[]));
        assert_eq!(ids(&corpus), ["c", "p"]);
        assert!(!corpus.is_published("a"));
        assert!(!corpus.is_published("b"));
        // The tag map itself is left intact.
        assert_eq!(corpus.tags_for("a"), ["rust", "draft"]);
    }

    #[test]
    fn excluded_id_and_file_glob() {
        let corpus = Corpus::filter(raw(), &rules(&[], &["*.private.org"], &["b"]));
        assert_eq!(ids(&corpus), ["c", "a"]);
    }

    #[test]
    fn glob_matches_base_name_only() {
        let corpus = Corpus::filter(raw(), &rules(&[], &["roam*"], &[]));
        assert_eq!(corpus.len(), 4);
    }

    #[test]
    fn non_id_links_are_dropped() {
        let corpus = Corpus::filter(raw(), &ExclusionRules::default());
        assert_eq!(corpus.links().len(), 2);
        assert!(corpus.links().iter().all(Link::is_id_reference));
    }

    #[test]
    fn links_to_excluded_nodes_are_kept() {
        let corpus = Corpus::filter(raw(), &rules(&["draft"], &[], &[]));
        assert!(corpus.links().contains(&Link::id("a", "b")));
    }

    #[test]
    fn empty_and_duplicate_ids_are_dropped() {
        let raw = RawCorpus {
            nodes: vec![
                Node::new("", "/roam/blank.org", "Blank"),
                Node::new("x", "/roam/first.org", "First"),
                Node::new("x", "/roam/second.org", "Second"),
            ],
            ..Default::default()
        };
        let corpus = Corpus::filter(raw, &ExclusionRules::default());
        assert_eq!(ids(&corpus), ["x"]);
        assert_eq!(corpus.title("x"), Some("First"));
    }

    #[test]
    fn untagged_node_has_empty_tags() {
        let corpus = Corpus::filter(raw(), &ExclusionRules::default());
        assert!(corpus.tags_for("p").is_empty());
        assert!(corpus.tags_for("missing").is_empty());
    }

    #[test]
    fn glob_translation() {
        let re = glob_to_regex("2023??-*.org").unwrap();
        assert!(re.is_match("202301-notes.org"));
        assert!(!re.is_match("2023-notes.org"));

        let re = glob_to_regex("[!a]*.org").unwrap();
        assert!(re.is_match("beta.org"));
        assert!(!re.is_match("alpha.org"));

        let re = glob_to_regex("a.b").unwrap();
        assert!(!re.is_match("axb"));

        assert!(glob_to_regex("[abc").is_none());
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = ExclusionRules::compile(&ExcludeConfig {
            tags: vec![],
            files: vec!["[".into()],
            ids: vec![],
        })
        .unwrap_err();
        assert!(matches!(err, RoamWebError::Config { .. }));
    }
}
