//! Output directory assembler.
//!
//! Takes an assembled [`SiteModel`], renders its pages and writes the final
//! site to disk.

use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use roamweb_artifacts::{
    ManifestCounts, STATIC_ASSETS, artifact_meta, generate_graph_json, generate_manifest,
    generate_search_json,
};
use roamweb_shared::{ArtifactMeta, PageTemplates, Result, RoamWebError};

use crate::site::SiteModel;

/// Configuration for [`write_site`].
#[derive(Debug, Clone)]
pub struct WriteConfig {
    /// Root of the generated site.
    pub output_dir: PathBuf,
    /// Images copied to `img/`, when the directory exists.
    pub image_dir: Option<PathBuf>,
    /// Tool version string.
    pub tool_version: String,
}

/// Write a complete site.
///
/// Creates the following layout:
/// ```text
/// <output_dir>/
/// ├── index.html
/// ├── graph.html
/// ├── notes/<id>.html      (regenerated every build)
/// ├── tags/<slug>.html     (regenerated every build)
/// ├── assets/{style.css,site.js}
/// ├── img/**
/// ├── search.json
/// ├── graph.json
/// └── manifest.json
/// ```
#[instrument(skip_all, fields(output = %config.output_dir.display(), pages = model.pages.len()))]
pub fn write_site(
    config: &WriteConfig,
    model: &SiteModel,
    templates: &dyn PageTemplates,
) -> Result<Vec<ArtifactMeta>> {
    let out = &config.output_dir;
    info!(path = %out.display(), "writing site");

    create_dirs(out)?;

    let mut written = 0usize;
    for page in &model.pages {
        let Some(target) = site_path(out, &page.path) else {
            warn!(path = %page.path, "refusing to write outside the output directory");
            continue;
        };
        let html = templates.render(&page.page)?;
        write_file(&target, &html)?;
        written += 1;
    }
    debug!(count = written, "pages written");

    let assets_dir = out.join("assets");
    for (name, content) in STATIC_ASSETS {
        write_file(&assets_dir.join(name), content)?;
    }

    if let Some(image_dir) = &config.image_dir {
        if image_dir.is_dir() {
            let target = out.join("img");
            reset_dir(&target)?;
            let copied = copy_tree(image_dir, &target)?;
            debug!(count = copied, "images copied");
        }
    }

    let search = generate_search_json(&model.search)?;
    let graph = generate_graph_json(&model.graph)?;
    let artifacts = assemble_artifacts(
        out,
        &[("search.json", search.as_str()), ("graph.json", graph.as_str())],
    )?;

    let counts = ManifestCounts {
        node_count: model.search.entries.len(),
        edge_count: model.graph.links.len(),
        tag_count: model.tag_pages,
    };
    let manifest = generate_manifest(&config.tool_version, counts, artifacts.clone())?;
    write_atomic(out, "manifest.json", &manifest)?;

    info!(pages = written, path = %out.display(), "site written");
    Ok(artifacts)
}

/// Write JSON artifacts atomically and return their checksums.
fn assemble_artifacts(out: &Path, artifacts: &[(&str, &str)]) -> Result<Vec<ArtifactMeta>> {
    let mut metas = Vec::with_capacity(artifacts.len());
    for (filename, content) in artifacts {
        write_atomic(out, filename, content)?;
        debug!(file = %filename, size = content.len(), "wrote artifact");
        metas.push(artifact_meta(filename, content));
    }
    Ok(metas)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Create the output root and wipe the per-note and per-tag directories.
fn create_dirs(out: &Path) -> Result<()> {
    for dir in [out.to_path_buf(), out.join("assets")] {
        std::fs::create_dir_all(&dir).map_err(|e| RoamWebError::io(&dir, e))?;
    }
    reset_dir(&out.join("notes"))?;
    reset_dir(&out.join("tags"))?;
    debug!(path = %out.display(), "directory structure created");
    Ok(())
}

fn reset_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir).map_err(|e| RoamWebError::io(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| RoamWebError::io(dir, e))
}

/// Join a page path onto `out`, rejecting anything but plain components.
fn site_path(out: &Path, relative: &str) -> Option<PathBuf> {
    let rel = Path::new(relative);
    rel.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| out.join(rel))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RoamWebError::io(parent, e))?;
    }
    std::fs::write(path, content).map_err(|e| RoamWebError::io(path, e))
}

/// Write to a temp file first, then rename over the target.
fn write_atomic(dir: &Path, filename: &str, content: &str) -> Result<()> {
    let target = dir.join(filename);
    let temp = dir.join(format!(".{filename}.tmp"));
    std::fs::write(&temp, content).map_err(|e| RoamWebError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| RoamWebError::io(&target, e))
}

/// Recursively copy `from` into `to`. Returns the number of files copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    std::fs::create_dir_all(to).map_err(|e| RoamWebError::io(to, e))?;
    let mut copied = 0;
    for entry in std::fs::read_dir(from).map_err(|e| RoamWebError::io(from, e))? {
        let entry = entry.map_err(|e| RoamWebError::io(from, e))?;
        let src = entry.path();
        let dst = to.join(entry.file_name());
        if src.is_dir() {
            copied += copy_tree(&src, &dst)?;
        } else {
            std::fs::copy(&src, &dst).map_err(|e| RoamWebError::io(&src, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
