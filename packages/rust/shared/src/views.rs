//! Page view models handed to the templating collaborator.

use chrono::{DateTime, Utc};

use crate::types::{Graph, TocEntry};

/// Site-wide information shown on every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    pub title: String,
    pub base_url: String,
}

/// A resolved reference to another published note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub id: String,
    pub title: String,
}

/// A tag together with the slug of its page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRef {
    pub name: String,
    pub slug: String,
}

/// Short listing entry for a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePreview {
    pub id: String,
    pub title: String,
    pub tags: Vec<TagRef>,
    /// Effective date, when one could be derived.
    pub date: Option<DateTime<Utc>>,
}

/// `index.html`
#[derive(Debug, Clone)]
pub struct HomeView {
    pub site: SiteInfo,
    pub recent_notes: Vec<NotePreview>,
}

/// `notes/<id>.html`
#[derive(Debug, Clone)]
pub struct NoteView {
    pub site: SiteInfo,
    pub id: String,
    pub title: String,
    pub tags: Vec<TagRef>,
    pub content_html: String,
    /// Outbound links to published notes, in body order.
    pub links: Vec<LinkRef>,
    /// Published notes linking here, in link-table order.
    pub backlinks: Vec<LinkRef>,
    pub local_graph: Graph,
    /// False when the local graph is just the note itself.
    pub has_graph: bool,
    pub toc: Vec<TocEntry>,
    pub date: Option<DateTime<Utc>>,
}

/// `graph.html`
#[derive(Debug, Clone)]
pub struct GraphView {
    pub site: SiteInfo,
    pub graph: Graph,
    /// Every distinct tag, lexicographically sorted.
    pub all_tags: Vec<String>,
    /// Most frequent tags, at most ten.
    pub top_tags: Vec<String>,
}

/// `tags/<slug>.html`
#[derive(Debug, Clone)]
pub struct TagView {
    pub site: SiteInfo,
    pub tag: String,
    pub notes: Vec<NotePreview>,
}

/// The four page kinds the site is made of.
#[derive(Debug, Clone)]
pub enum Page {
    Home(HomeView),
    Note(Box<NoteView>),
    Graph(GraphView),
    Tag(TagView),
}

impl Page {
    /// Template name for this page kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Page::Home(_) => "home",
            Page::Note(_) => "note",
            Page::Graph(_) => "graph",
            Page::Tag(_) => "tag",
        }
    }

    /// Site information common to every page.
    pub fn site(&self) -> &SiteInfo {
        match self {
            Page::Home(v) => &v.site,
            Page::Note(v) => &v.site,
            Page::Graph(v) => &v.site,
            Page::Tag(v) => &v.site,
        }
    }
}
