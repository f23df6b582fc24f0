//! Site assembly: view models for every page, plus the search index and
//! global graph.
//!
//! Everything here is synchronous and works on an already-filtered
//! [`Corpus`], so it can be driven without a database.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use roamweb_shared::{
    Graph, GraphView, HomeView, MarkupRenderer, NotePreview, NoteView, Page, SearchEntry,
    SearchIndex, SiteInfo, TagRef, TagSlugs, TagView, tag_slug,
};

use crate::corpus::Corpus;
use crate::dates::effective_date;
use crate::graph::{Adjacency, global_graph, local_graph};
use crate::pipeline::ProgressReporter;
use crate::relations::{RelationshipIndex, resolve_links};

/// Maximum number of entries in the graph page's "top tags" list.
pub const TOP_TAGS_LIMIT: usize = 10;

/// Knobs that shape the generated pages.
#[derive(Debug, Clone)]
pub struct SiteOptions {
    pub site: SiteInfo,
    /// Notes listed on the home page.
    pub recent_count: usize,
    /// Hop distance of each note's local graph.
    pub local_graph_depth: usize,
}

/// A page and where it goes, relative to the output directory.
#[derive(Debug, Clone)]
pub struct SitePage {
    pub path: String,
    pub page: Page,
}

/// Everything the assembler writes.
#[derive(Debug, Clone)]
pub struct SiteModel {
    pub pages: Vec<SitePage>,
    pub search: SearchIndex,
    pub graph: Graph,
    /// Note pages rendered.
    pub notes_written: usize,
    /// Notes whose markup failed to render.
    pub notes_skipped: usize,
    pub tag_pages: usize,
}

/// Build every page of the site from `corpus`.
///
/// A note whose markup fails to render is logged and skipped; it still
/// appears in the search index and graphs.
#[instrument(skip_all, fields(notes = corpus.len()))]
pub fn assemble_site(
    corpus: &Corpus,
    markup: &dyn MarkupRenderer,
    opts: &SiteOptions,
    progress: &dyn ProgressReporter,
) -> SiteModel {
    let relations = RelationshipIndex::build(corpus.links());
    let adjacency = Adjacency::from_links(corpus.links());
    let dates: HashMap<&str, Option<DateTime<Utc>>> = corpus
        .nodes()
        .iter()
        .map(|n| (n.id.as_str(), effective_date(&n.file)))
        .collect();
    let date_of = |id: &str| dates.get(id).copied().flatten();
    let slugs = tag_slugs(corpus);

    let mut pages = Vec::with_capacity(corpus.len() + 2);

    pages.push(SitePage {
        path: "index.html".to_string(),
        page: Page::Home(home_view(corpus, opts, &slugs, &date_of)),
    });

    let total = corpus.len();
    let mut notes_written = 0;
    let mut notes_skipped = 0;
    for (i, node) in corpus.nodes().iter().enumerate() {
        let rendered = match markup.render_note(node, corpus.titles()) {
            Ok(r) => r,
            Err(e) => {
                warn!(id = %node.id, file = %node.file.display(), error = %e, "markup failed, skipping note");
                notes_skipped += 1;
                continue;
            }
        };

        let local_graph = local_graph(corpus, &adjacency, &node.id, opts.local_graph_depth);
        let title = rendered
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| node.title.clone());

        let view = NoteView {
            site: opts.site.clone(),
            id: node.id.clone(),
            title,
            tags: tag_refs(corpus.tags_for(&node.id), &slugs),
            content_html: rendered.html,
            links: resolve_links(&rendered.links, corpus),
            backlinks: relations.backlinks(&node.id, corpus),
            has_graph: local_graph.is_visualizable(),
            local_graph,
            toc: rendered.toc,
            date: date_of(&node.id),
        };

        debug!(id = %node.id, links = view.links.len(), backlinks = view.backlinks.len(), "note view built");
        pages.push(SitePage {
            path: format!("notes/{}.html", node.id),
            page: Page::Note(Box::new(view)),
        });
        notes_written += 1;
        progress.note_rendered(&node.id, i + 1, total);
    }

    let graph = global_graph(corpus);
    pages.push(SitePage {
        path: "graph.html".to_string(),
        page: Page::Graph(GraphView {
            site: opts.site.clone(),
            graph: graph.clone(),
            all_tags: all_tags(corpus),
            top_tags: top_tags(corpus, TOP_TAGS_LIMIT),
        }),
    });

    let tag_views = tag_views(corpus, opts, &slugs, &date_of);
    let tag_pages = tag_views.len();
    pages.extend(tag_views);

    info!(
        notes_written,
        notes_skipped,
        tag_pages,
        edges = graph.links.len(),
        "site model assembled"
    );

    SiteModel {
        pages,
        search: search_index(corpus),
        graph,
        notes_written,
        notes_skipped,
        tag_pages,
    }
}

/// One entry per published note, in corpus order.
pub fn search_index(corpus: &Corpus) -> SearchIndex {
    SearchIndex {
        entries: corpus
            .nodes()
            .iter()
            .map(|n| SearchEntry {
                id: n.id.clone(),
                title: n.title.clone(),
                tags: corpus.tags_for(&n.id).to_vec(),
            })
            .collect(),
    }
}

/// Distinct tags of published notes, lexicographically sorted.
pub fn all_tags(corpus: &Corpus) -> Vec<String> {
    corpus
        .nodes()
        .iter()
        .flat_map(|n| corpus.tags_for(&n.id))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The `limit` most used tags, most frequent first.
///
/// Ties keep the order in which tags were first seen walking the corpus.
pub fn top_tags(corpus: &Corpus, limit: usize) -> Vec<String> {
    let mut counts = tag_counts(corpus);
    // Stable, so first-seen order survives among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(tag, _)| tag).collect()
}

/// `(tag, count)` in first-seen order.
fn tag_counts(corpus: &Corpus) -> Vec<(String, usize)> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for node in corpus.nodes() {
        for tag in corpus.tags_for(&node.id) {
            match position.get(tag.as_str()) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    position.insert(tag, counts.len());
                    counts.push((tag.clone(), 1));
                }
            }
        }
    }
    counts
}

/// Unique page slug for every published tag, assigned in first-seen order.
fn tag_slugs(corpus: &Corpus) -> TagSlugs {
    let mut slugs = TagSlugs::new();
    for (tag, _) in tag_counts(corpus) {
        let slug = slugs.assign(&tag);
        if slug != tag_slug(&tag) {
            debug!(tag = %tag, slug, "tag page name taken, using suffixed slug");
        }
    }
    slugs
}

fn tag_refs(tags: &[String], slugs: &TagSlugs) -> Vec<TagRef> {
    tags.iter()
        .map(|tag| TagRef {
            name: tag.clone(),
            slug: slugs.get(tag).map_or_else(|| tag_slug(tag), str::to_string),
        })
        .collect()
}

fn preview(
    corpus: &Corpus,
    slugs: &TagSlugs,
    id: &str,
    title: &str,
    date: Option<DateTime<Utc>>,
) -> NotePreview {
    NotePreview {
        id: id.to_string(),
        title: title.to_string(),
        tags: tag_refs(corpus.tags_for(id), slugs),
        date,
    }
}

/// Newest `recent_count` notes. Undated notes sort last; ties keep corpus order.
fn home_view(
    corpus: &Corpus,
    opts: &SiteOptions,
    slugs: &TagSlugs,
    date_of: &dyn Fn(&str) -> Option<DateTime<Utc>>,
) -> HomeView {
    let mut notes: Vec<NotePreview> = corpus
        .nodes()
        .iter()
        .map(|n| preview(corpus, slugs, &n.id, &n.title, date_of(&n.id)))
        .collect();
    // `None < Some(_)`, so descending order puts undated notes at the end.
    notes.sort_by(|a, b| b.date.cmp(&a.date));
    notes.truncate(opts.recent_count);

    HomeView {
        site: opts.site.clone(),
        recent_notes: notes,
    }
}

/// One page per tag carried by a published note, notes in corpus order.
fn tag_views(
    corpus: &Corpus,
    opts: &SiteOptions,
    slugs: &TagSlugs,
    date_of: &dyn Fn(&str) -> Option<DateTime<Utc>>,
) -> Vec<SitePage> {
    let mut pages = Vec::with_capacity(slugs.len());

    for (tag, _) in tag_counts(corpus) {
        let slug = slugs.get(&tag).map_or_else(|| tag_slug(&tag), str::to_string);
        let notes = corpus
            .nodes()
            .iter()
            .filter(|n| corpus.tags_for(&n.id).contains(&tag))
            .map(|n| preview(corpus, slugs, &n.id, &n.title, date_of(&n.id)))
            .collect();

        pages.push(SitePage {
            path: format!("tags/{slug}.html"),
            page: Page::Tag(TagView {
                site: opts.site.clone(),
                tag,
                notes,
            }),
        });
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::ExclusionRules;
    use crate::pipeline::SilentProgress;
    use roamweb_shared::{
        ExcludeConfig, Link, Node, RawCorpus, RenderedNote, Result, RoamWebError, TagMap,
        TitleMap,
    };

    /// Renders a note's ID as its body and reports links from its properties.
    struct StubMarkup;

    impl MarkupRenderer for StubMarkup {
        fn render_note(&self, node: &Node, _titles: &TitleMap) -> Result<RenderedNote> {
            if node.id == "broken" {
                return Err(RoamWebError::parse("unterminated block"));
            }
            let links = node
                .properties
                .get("LINKS")
                .map(|s| s.split(',').map(str::to_string).collect())
                .unwrap_or_default();
            Ok(RenderedNote {
                title: node.properties.get("TITLE").cloned(),
                html: format!("<p>{}</p>", node.id),
                toc: vec![],
                links,
            })
        }
    }

    fn node(id: &str, file: &str) -> Node {
        Node::new(id, file, id.to_uppercase())
    }

    fn with_links(mut node: Node, links: &str) -> Node {
        node.properties.insert("LINKS".into(), links.into());
        node
    }

    fn opts(recent_count: usize) -> SiteOptions {
        SiteOptions {
            site: SiteInfo {
                title: "Notes".into(),
                base_url: String::new(),
            },
            recent_count,
            local_graph_depth: 1,
        }
    }

    fn build(raw: RawCorpus, recent_count: usize) -> SiteModel {
        let rules = ExclusionRules::compile(&ExcludeConfig::default()).unwrap();
        let corpus = Corpus::filter(raw, &rules);
        assemble_site(&corpus, &StubMarkup, &opts(recent_count), &SilentProgress)
    }

    fn tags(pairs: &[(&str, &[&str])]) -> TagMap {
        pairs
            .iter()
            .map(|(id, ts)| (id.to_string(), ts.iter().map(|t| t.to_string()).collect()))
            .collect()
    }

    fn find<'a>(model: &'a SiteModel, path: &str) -> Option<&'a Page> {
        model.pages.iter().find(|p| p.path == path).map(|p| &p.page)
    }

    fn note<'a>(model: &'a SiteModel, id: &str) -> &'a NoteView {
        match find(model, &format!("notes/{id}.html")) {
            Some(Page::Note(v)) => v,
            other => panic!("expected note page for {id}, got {other:?}"),
        }
    }

    fn home_ids(model: &SiteModel) -> Vec<String> {
        match find(model, "index.html") {
            Some(Page::Home(v)) => v.recent_notes.iter().map(|n| n.id.clone()).collect(),
            other => panic!("expected home page, got {other:?}"),
        }
    }

    #[test]
    fn home_orders_by_file_date() {
        let raw = RawCorpus {
            nodes: vec![
                node("a", "/nope/20230101000000-a.org"),
                node("b", "/nope/20240101000000-b.org"),
            ],
            ..Default::default()
        };
        assert_eq!(home_ids(&build(raw, 20)), ["b", "a"]);
    }

    #[test]
    fn home_truncates_and_keeps_undated_last() {
        let raw = RawCorpus {
            nodes: vec![
                node("u1", "/nope/undated.org"),
                node("old", "/nope/20200101000000-old.org"),
                node("u2", "/nope/other.org"),
                node("new", "/nope/20220101000000-new.org"),
            ],
            ..Default::default()
        };
        assert_eq!(home_ids(&build(raw.clone(), 10)), ["new", "old", "u1", "u2"]);
        assert_eq!(home_ids(&build(raw, 1)), ["new"]);
    }

    #[test]
    fn note_links_and_backlinks_hide_excluded_notes() {
        let raw = RawCorpus {
            nodes: vec![
                with_links(node("a", "a.org"), "b,d,ghost"),
                node("b", "b.org"),
                with_links(node("d", "d.org"), "a"),
            ],
            tags: tags(&[("d", &["draft"])]),
            links: vec![Link::id("a", "b"), Link::id("a", "d"), Link::id("d", "a")],
        };
        let model = build(raw, 20);

        let a = note(&model, "a");
        assert_eq!(a.links.len(), 1);
        assert_eq!(a.links[0].id, "b");
        assert!(a.backlinks.is_empty());

        let b = note(&model, "b");
        assert_eq!(b.backlinks[0].title, "A");
        assert!(b.has_graph);

        assert!(find(&model, "notes/d.html").is_none());
        assert!(model.search.entries.iter().all(|e| e.id != "d"));
    }

    #[test]
    fn isolated_note_has_no_graph() {
        let raw = RawCorpus {
            nodes: vec![node("solo", "solo.org")],
            ..Default::default()
        };
        let model = build(raw, 20);
        let solo = note(&model, "solo");
        assert!(!solo.has_graph);
        assert_eq!(solo.local_graph.nodes.len(), 1);
    }

    #[test]
    fn markup_failure_skips_page_only() {
        let raw = RawCorpus {
            nodes: vec![node("broken", "broken.org"), node("ok", "ok.org")],
            ..Default::default()
        };
        let model = build(raw, 20);
        assert_eq!(model.notes_written, 1);
        assert_eq!(model.notes_skipped, 1);
        assert!(find(&model, "notes/broken.html").is_none());
        assert_eq!(model.search.entries.len(), 2);
        assert!(model.graph.node("broken").is_some());
    }

    #[test]
    fn tag_pages_cover_published_tags_only() {
        let raw = RawCorpus {
            nodes: vec![node("a", "a.org"), node("b", "b.org"), node("c", "c.org")],
            tags: tags(&[
                ("a", &["rust", "web dev"]),
                ("b", &["rust"]),
                ("c", &["secret", "draft"]),
            ]),
            links: vec![],
        };
        let model = build(raw, 20);
        assert_eq!(model.tag_pages, 2);

        match find(&model, "tags/rust.html") {
            Some(Page::Tag(v)) => {
                let ids: Vec<_> = v.notes.iter().map(|n| n.id.as_str()).collect();
                assert_eq!(ids, ["a", "b"]);
            }
            other => panic!("expected tag page, got {other:?}"),
        }
        assert!(find(&model, "tags/web-dev.html").is_some());
        assert!(find(&model, "tags/draft.html").is_none());
        assert!(find(&model, "tags/secret.html").is_none());
    }

    #[test]
    fn colliding_tag_slugs_get_separate_pages() {
        let raw = RawCorpus {
            nodes: vec![node("a", "a.org"), node("b", "b.org")],
            tags: tags(&[("a", &["a/b"]), ("b", &["a b", "a/b"])]),
            links: vec![],
        };
        let model = build(raw, 20);
        assert_eq!(model.tag_pages, 2);

        let tag_page = |path: &str| match find(&model, path) {
            Some(Page::Tag(v)) => (
                v.tag.clone(),
                v.notes.iter().map(|n| n.id.clone()).collect::<Vec<_>>(),
            ),
            other => panic!("expected tag page at {path}, got {other:?}"),
        };
        assert_eq!(tag_page("tags/a-b.html"), ("a/b".to_string(), vec!["a".into(), "b".into()]));
        assert_eq!(tag_page("tags/a-b-2.html"), ("a b".to_string(), vec!["b".into()]));

        let paths: BTreeSet<_> = model.pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths.len(), model.pages.len());

        let b = note(&model, "b");
        let refs: Vec<_> = b.tags.iter().map(|t| (t.name.as_str(), t.slug.as_str())).collect();
        assert_eq!(refs, [("a b", "a-b-2"), ("a/b", "a-b")]);
    }

    #[test]
    fn parsed_title_wins_over_database_title() {
        let mut titled = node("a", "a.org");
        titled.properties.insert("TITLE".into(), "From the file".into());
        let raw = RawCorpus {
            nodes: vec![titled, node("b", "b.org")],
            ..Default::default()
        };
        let model = build(raw, 20);
        assert_eq!(note(&model, "a").title, "From the file");
        assert_eq!(note(&model, "b").title, "B");
    }

    #[test]
    fn top_tags_rank_by_count_then_first_seen() {
        let raw = RawCorpus {
            nodes: vec![node("a", "a.org"), node("b", "b.org"), node("c", "c.org")],
            tags: tags(&[
                ("a", &["zeta", "alpha"]),
                ("b", &["alpha", "mid"]),
                ("c", &["mid", "zeta", "last"]),
            ]),
            links: vec![],
        };
        let rules = ExclusionRules::compile(&ExcludeConfig::default()).unwrap();
        let corpus = Corpus::filter(raw, &rules);
        assert_eq!(top_tags(&corpus, 10), ["zeta", "alpha", "mid", "last"]);
        assert_eq!(top_tags(&corpus, 2), ["zeta", "alpha"]);
        assert_eq!(all_tags(&corpus), ["alpha", "last", "mid", "zeta"]);
    }

    #[test]
    fn search_and_graph_cover_the_same_ids() {
        let raw = RawCorpus {
            nodes: vec![node("x", "x.org"), node("y", "y.org"), node("z", "z.org")],
            tags: tags(&[("y", &["private"])]),
            links: vec![Link::id("x", "y"), Link::id("z", "x")],
        };
        let model = build(raw, 20);
        let search: BTreeSet<_> = model.search.entries.iter().map(|e| e.id.clone()).collect();
        let graph: BTreeSet<_> = model.graph.nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(search, graph);
        assert_eq!(search.len(), 2);
    }
}
