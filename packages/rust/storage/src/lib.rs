//! Corpus loader over the org-roam SQLite database (libSQL, local file).
//!
//! [`RoamDatabase`] reads the three tables the site is built from:
//! - `nodes`: top-level (level 0) notes, newest source file first
//! - `tags`: node → tag associations
//! - `links`: `id:` links between notes
//!
//! org-roam stores every string as an elisp literal, so IDs, paths and tags come
//! back wrapped in double quotes; the loader strips them.
//!
//! The database is owned by Emacs. This crate never writes to it.

mod elisp;

use std::path::{Path, PathBuf};

use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument};

use roamweb_shared::{Link, LinkKind, Node, RawCorpus, Result, RoamWebError, TagMap};

pub use elisp::{clean_title, parse_elisp_props, trim_quotes};

/// Read handle on an org-roam database.
pub struct RoamDatabase {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl RoamDatabase {
    /// Open an existing database at `path`.
    ///
    /// Fails instead of creating an empty database when the file is missing.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RoamWebError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| RoamWebError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| RoamWebError::Storage(e.to_string()))?;

        // Cheap round trip so an unreadable file fails here, not mid-load.
        conn.query("SELECT 1", params![])
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to connect to database: {e}")))?;

        Ok(Self { db, conn })
    }

    /// Load nodes, tags and links in one go.
    #[instrument(skip_all)]
    pub async fn load_corpus(&self) -> Result<RawCorpus> {
        let nodes = self.load_nodes().await?;
        let tags = self.load_tags().await?;
        let links = self.load_links().await?;

        info!(
            nodes = nodes.len(),
            tagged_nodes = tags.len(),
            links = links.len(),
            "corpus loaded"
        );

        Ok(RawCorpus { nodes, tags, links })
    }

    /// Load all file-level nodes, ordered by source file descending.
    pub async fn load_nodes(&self) -> Result<Vec<Node>> {
        let mut rows = self
            .conn
            .query(
                "SELECT n.id, n.file, n.title, n.properties
                 FROM nodes n
                 WHERE n.level = 0
                 ORDER BY n.file DESC",
                params![],
            )
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to query nodes: {e}")))?;

        let mut nodes = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to read node row: {e}")))?
        {
            let id: String = row
                .get(0)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan node: {e}")))?;
            let file: String = row
                .get(1)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan node: {e}")))?;
            let title = row.get::<String>(2).ok().map(|t| clean_title(&t));
            let properties = row
                .get::<String>(3)
                .ok()
                .map(|p| parse_elisp_props(&p))
                .unwrap_or_default();

            nodes.push(Node {
                id: trim_quotes(&id).to_string(),
                file: PathBuf::from(trim_quotes(&file)),
                title: title.unwrap_or_default(),
                properties,
            });
        }

        debug!(count = nodes.len(), "loaded nodes");
        Ok(nodes)
    }

    /// Load every node → tag association.
    pub async fn load_tags(&self) -> Result<TagMap> {
        let mut rows = self
            .conn
            .query("SELECT node_id, tag FROM tags", params![])
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to query tags: {e}")))?;

        let mut tags = TagMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to read tag row: {e}")))?
        {
            let node_id: String = row
                .get(0)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan tag: {e}")))?;
            let tag: String = row
                .get(1)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan tag: {e}")))?;

            tags.entry(trim_quotes(&node_id).to_string())
                .or_default()
                .push(trim_quotes(&tag).to_string());
        }

        Ok(tags)
    }

    /// Load all `id:` links. Other link types never reach the site builder.
    pub async fn load_links(&self) -> Result<Vec<Link>> {
        let mut rows = self
            .conn
            .query(
                "SELECT source, dest, type FROM links WHERE type = '\"id\"'",
                params![],
            )
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to query links: {e}")))?;

        let mut links = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| RoamWebError::Storage(format!("failed to read link row: {e}")))?
        {
            let source: String = row
                .get(0)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan link: {e}")))?;
            let target: String = row
                .get(1)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan link: {e}")))?;
            let kind: String = row
                .get(2)
                .map_err(|e| RoamWebError::Storage(format!("failed to scan link: {e}")))?;

            links.push(Link {
                source: trim_quotes(&source).to_string(),
                target: trim_quotes(&target).to_string(),
                kind: LinkKind::from_type(trim_quotes(&kind)),
            });
        }

        Ok(links)
    }
}

/// Open the database at `path` and load the full corpus.
pub async fn load_corpus(path: &Path) -> Result<RawCorpus> {
    RoamDatabase::open(path).await?.load_corpus().await
}
