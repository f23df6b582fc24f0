//! End-to-end `build` pipeline: database → corpus → pages → output directory.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use roamweb_artifacts::HtmlTemplates;
use roamweb_markup::{OrgRenderer, RenderOptions};
use roamweb_shared::{
    AppConfig, ExcludeConfig, MarkupRenderer, PageTemplates, RawCorpus, Result, RoamWebError,
    SiteInfo,
};

use crate::assembler::{self, WriteConfig};
use crate::corpus::{Corpus, ExclusionRules};
use crate::site::{self, SiteOptions};

/// Configuration for [`build_site`].
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub site: SiteInfo,
    /// Directory holding the org files (and `img/`).
    pub roam_dir: PathBuf,
    /// org-roam SQLite database.
    pub db_path: PathBuf,
    /// Where the site is written.
    pub output_dir: PathBuf,
    pub exclude: ExcludeConfig,
    pub recent_count: usize,
    pub local_graph_depth: usize,
    /// Tool version recorded in `manifest.json`.
    pub tool_version: String,
}

impl BuildConfig {
    /// Take everything from a loaded (and path-resolved) [`AppConfig`].
    pub fn from_app_config(config: &AppConfig, tool_version: impl Into<String>) -> Self {
        Self {
            site: SiteInfo {
                title: config.site.title.clone(),
                base_url: config.site.base_url.trim_end_matches('/').to_string(),
            },
            roam_dir: config.paths.roam_dir.clone(),
            db_path: config.paths.db_path.clone(),
            output_dir: config.paths.output_dir.clone(),
            exclude: config.exclude.clone(),
            recent_count: config.display.recent_count,
            local_graph_depth: config.display.local_graph_depth,
            tool_version: tool_version.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.output_dir == self.roam_dir {
            return Err(RoamWebError::config(
                "output_dir must not be the notes directory",
            ));
        }
        Ok(())
    }
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub output_dir: PathBuf,
    /// Published notes.
    pub note_count: usize,
    pub notes_written: usize,
    /// Notes whose markup could not be rendered.
    pub notes_skipped: usize,
    pub tag_pages: usize,
    pub elapsed: Duration,
}

/// Callback trait for reporting build progress to the UI layer.
pub trait ProgressReporter: Send + Sync {
    /// A new build phase started.
    fn phase(&self, name: &str);
    /// A note page was rendered.
    fn note_rendered(&self, id: &str, current: usize, total: usize);
    /// The build finished.
    fn done(&self, result: &BuildResult);
}

/// No-op progress reporter for tests and non-interactive use.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn note_rendered(&self, _id: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &BuildResult) {}
}

/// Run the full build.
///
/// 1. Load nodes, tags and links from the org-roam database
/// 2. Apply exclusion rules
/// 3. Build page view models and render note markup
/// 4. Render templates and write the output directory
///
/// A database failure aborts before anything is written.
#[instrument(skip_all, fields(db = %config.db_path.display(), output = %config.output_dir.display()))]
pub async fn build_site(
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    config.validate()?;

    progress.phase("Loading notes database");
    let raw = roamweb_storage::load_corpus(&config.db_path).await?;

    let markup = OrgRenderer::new(RenderOptions {
        base_url: config.site.base_url.clone(),
    });
    let mut result = build_from_corpus(raw, config, &markup, &HtmlTemplates::new(), progress)?;
    result.elapsed = start.elapsed();
    Ok(result)
}

/// Build from an already-loaded corpus with the given collaborators.
pub fn build_from_corpus(
    raw: RawCorpus,
    config: &BuildConfig,
    markup: &dyn MarkupRenderer,
    templates: &dyn PageTemplates,
    progress: &dyn ProgressReporter,
) -> Result<BuildResult> {
    let start = Instant::now();
    config.validate()?;

    progress.phase("Filtering notes");
    let rules = ExclusionRules::compile(&config.exclude)?;
    let corpus = Corpus::filter(raw, &rules);

    progress.phase("Rendering notes");
    let opts = SiteOptions {
        site: config.site.clone(),
        recent_count: config.recent_count,
        local_graph_depth: config.local_graph_depth,
    };
    let model = site::assemble_site(&corpus, markup, &opts, progress);

    progress.phase("Writing site");
    let write_config = WriteConfig {
        output_dir: config.output_dir.clone(),
        image_dir: Some(config.roam_dir.join("img")),
        tool_version: config.tool_version.clone(),
    };
    assembler::write_site(&write_config, &model, templates)?;

    let result = BuildResult {
        output_dir: config.output_dir.clone(),
        note_count: corpus.len(),
        notes_written: model.notes_written,
        notes_skipped: model.notes_skipped,
        tag_pages: model.tag_pages,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        notes = result.note_count,
        written = result.notes_written,
        skipped = result.notes_skipped,
        tag_pages = result.tag_pages,
        elapsed_ms = result.elapsed.as_millis(),
        "build complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    fn config(root: &Path) -> BuildConfig {
        let mut app = AppConfig::default();
        app.site.base_url = "/notes/".into();
        app.paths.roam_dir = root.join("roam");
        app.paths.db_path = root.join("roam/org-roam.db");
        app.paths.output_dir = root.join("site");
        BuildConfig::from_app_config(&app, "0.0.0-test")
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.phases.lock().unwrap().push(name.to_string());
        }
        fn note_rendered(&self, _id: &str, _current: usize, _total: usize) {}
        fn done(&self, _result: &BuildResult) {}
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let cfg = config(Path::new("/tmp/x"));
        assert_eq!(cfg.site.base_url, "/notes");
        assert_eq!(cfg.recent_count, 20);
    }

    #[test]
    fn output_inside_notes_dir_is_rejected() {
        let mut cfg = config(Path::new("/tmp/x"));
        cfg.output_dir = cfg.roam_dir.clone();
        let err = build_from_corpus(
            RawCorpus::default(),
            &cfg,
            &OrgRenderer::default(),
            &HtmlTemplates,
            &SilentProgress,
        )
        .unwrap_err();
        assert!(matches!(err, RoamWebError::Config { .. }));
    }

    #[tokio::test]
    async fn missing_database_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let err = build_site(&cfg, &SilentProgress).await.unwrap_err();
        assert!(matches!(err, RoamWebError::Storage(_)));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn empty_corpus_still_builds_a_site() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let progress = RecordingProgress::default();
        let result = build_from_corpus(
            RawCorpus::default(),
            &cfg,
            &OrgRenderer::default(),
            &HtmlTemplates,
            &progress,
        )
        .unwrap();

        assert_eq!(result.note_count, 0);
        assert!(cfg.output_dir.join("index.html").is_file());
        assert!(cfg.output_dir.join("graph.html").is_file());
        assert_eq!(
            *progress.phases.lock().unwrap(),
            ["Filtering notes", "Rendering notes", "Writing site"]
        );
    }
}
