//! Global graph projection and bounded ego-graph traversal.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use roamweb_shared::{Graph, GraphEdge, GraphNode, Link};

use crate::corpus::Corpus;

/// Every published node, and every link whose endpoints are both published.
pub fn global_graph(corpus: &Corpus) -> Graph {
    project(corpus, |id| corpus.is_published(id))
}

/// Undirected neighbor lists over the complete link set.
///
/// Endpoints need not be published or even exist; traversal may pass through
/// them.
#[derive(Debug, Clone, Default)]
pub struct Adjacency<'a> {
    neighbors: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    pub fn from_links(links: &'a [Link]) -> Self {
        let mut neighbors: HashMap<&str, Vec<&str>> = HashMap::new();
        for link in links {
            neighbors
                .entry(link.source.as_str())
                .or_default()
                .push(link.target.as_str());
            neighbors
                .entry(link.target.as_str())
                .or_default()
                .push(link.source.as_str());
        }
        Self { neighbors }
    }

    /// IDs within `depth` hops of `focus`, including `focus` itself.
    ///
    /// Nodes at exactly `depth` hops are visited but not expanded.
    pub fn visit(&self, focus: &str, depth: usize) -> BTreeSet<String> {
        let mut visited: HashSet<&str> = HashSet::from([focus]);
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(focus, 0)]);

        while let Some((id, dist)) = frontier.pop_front() {
            if dist == depth {
                continue;
            }
            for &next in self.neighbors.get(id).into_iter().flatten() {
                if visited.insert(next) {
                    frontier.push_back((next, dist + 1));
                }
            }
        }

        visited.into_iter().map(str::to_string).collect()
    }
}

/// Ego graph of `focus`: visited IDs that are published, and the links
/// between them.
///
/// `link_count` is the degree within this subgraph.
pub fn local_graph(corpus: &Corpus, adjacency: &Adjacency<'_>, focus: &str, depth: usize) -> Graph {
    let visited = adjacency.visit(focus, depth);
    project(corpus, |id| visited.contains(id) && corpus.is_published(id))
}

/// Project the nodes of `corpus` accepted by `include`, with the links whose
/// endpoints are both accepted. The result is canonicalized.
fn project(corpus: &Corpus, include: impl Fn(&str) -> bool) -> Graph {
    let links: Vec<GraphEdge> = corpus
        .links()
        .iter()
        .filter(|l| include(&l.source) && include(&l.target))
        .map(|l| GraphEdge {
            source: l.source.clone(),
            target: l.target.clone(),
        })
        .collect();

    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &links {
        *degree.entry(edge.source.as_str()).or_default() += 1;
        *degree.entry(edge.target.as_str()).or_default() += 1;
    }

    let nodes = corpus
        .nodes()
        .iter()
        .filter(|n| include(&n.id))
        .map(|n| GraphNode {
            id: n.id.clone(),
            title: n.title.clone(),
            tags: corpus.tags_for(&n.id).to_vec(),
            link_count: degree.get(n.id.as_str()).copied().unwrap_or(0),
        })
        .collect();

    let mut graph = Graph { nodes, links };
    graph.canonicalize();
    graph
}
