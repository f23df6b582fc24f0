//! Shared types, error model, and configuration for roamweb.
//!
//! This crate is the foundation depended on by all other roamweb crates.
//! It provides:
//! - [`RoamWebError`], the unified error type
//! - Domain types ([`Node`], [`Link`], [`Graph`], [`SearchIndex`])
//! - Page view models ([`Page`] and friends)
//! - Collaborator traits ([`MarkupRenderer`], [`PageTemplates`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod contracts;
pub mod error;
pub mod text;
pub mod types;
pub mod views;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DisplayConfig, ExcludeConfig, PathsConfig, SiteConfig,
    expand_path, init_config, load_config_from,
};
pub use contracts::{MarkupRenderer, PageTemplates};
pub use error::{Result, RoamWebError};
pub use types::{
    ArtifactMeta, CURRENT_SCHEMA_VERSION, Graph, GraphEdge, GraphNode, Link, LinkKind, Node,
    RawCorpus, RenderedNote, SearchEntry, SearchIndex, SiteManifest, TagMap, TagSlugs, TitleMap,
    TocEntry, tag_slug,
};
pub use views::{
    GraphView, HomeView, LinkRef, NotePreview, NoteView, Page, SiteInfo, TagRef, TagView,
};
