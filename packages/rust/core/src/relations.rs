//! Forward links and backlinks, resolved against the published corpus.

use std::collections::HashMap;

use roamweb_shared::{Link, LinkRef};

use crate::corpus::Corpus;

/// Target → sources multimap over the complete link set.
#[derive(Debug, Clone, Default)]
pub struct RelationshipIndex {
    backlinks: HashMap<String, Vec<String>>,
}

impl RelationshipIndex {
    /// Record every link in iteration order. Duplicates are kept.
    pub fn build(links: &[Link]) -> Self {
        let mut backlinks: HashMap<String, Vec<String>> = HashMap::new();
        for link in links {
            backlinks
                .entry(link.target.clone())
                .or_default()
                .push(link.source.clone());
        }
        Self { backlinks }
    }

    /// Published notes linking to `id`, in link order.
    pub fn backlinks(&self, id: &str, corpus: &Corpus) -> Vec<LinkRef> {
        self.backlinks
            .get(id)
            .map(|sources| resolve_links(sources, corpus))
            .unwrap_or_default()
    }
}

/// Keep the published IDs of `ids`, paired with their titles.
///
/// Unknown and excluded IDs are dropped silently.
pub fn resolve_links(ids: &[String], corpus: &Corpus) -> Vec<LinkRef> {
    ids.iter()
        .filter_map(|id| {
            corpus.title(id).map(|title| LinkRef {
                id: id.clone(),
                title: title.to_string(),
            })
        })
        .collect()
}
