//! Core build pipeline and domain logic for roamweb.
//!
//! This crate ties together corpus loading, exclusion filtering, the link
//! graph, page assembly and output writing into end-to-end workflows
//! (e.g., [`pipeline::build_site`]).

pub mod assembler;
pub mod corpus;
pub mod dates;
pub mod graph;
pub mod pipeline;
pub mod relations;
pub mod site;
pub mod watch;

pub use corpus::{Corpus, ExclusionRules};
pub use graph::{Adjacency, global_graph, local_graph};
pub use pipeline::{
    BuildConfig, BuildResult, ProgressReporter, SilentProgress, build_from_corpus, build_site,
};
pub use relations::RelationshipIndex;
pub use site::{SiteModel, SiteOptions, assemble_site};
