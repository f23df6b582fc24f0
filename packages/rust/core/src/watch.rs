//! Watch-and-rebuild loop.
//!
//! Three stages connected by channels:
//! 1. [`watch_notes`] subscribes to filesystem events under the notes
//!    directory and reports written `.org` files
//! 2. [`debounce`] turns a burst of changes into one trigger once the burst
//!    has been quiet for [`DEBOUNCE_WINDOW`]
//! 3. [`rebuild_worker`] runs one rebuild per trigger, never two at once
//!
//! The trigger channel has capacity 1: a trigger arriving while one is already
//! queued is dropped, since the queued rebuild will see the same files.

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument, warn};

use roamweb_shared::{Result, RoamWebError};

use crate::pipeline::{BuildConfig, BuildResult, ProgressReporter, build_site};

/// Quiet period after the last change before a rebuild fires.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

const WATCHED_EXTENSION: &str = "org";

// ---------------------------------------------------------------------------
// Filesystem events
// ---------------------------------------------------------------------------

/// Watch `dir` recursively and send every written note file to `events`.
///
/// Events stop when the returned watcher is dropped or `events` closes.
pub fn watch_notes(dir: &Path, events: mpsc::Sender<PathBuf>) -> Result<RecommendedWatcher> {
    let root = dir.to_path_buf();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in written_notes(&root, &event) {
                debug!(path = %path.display(), "file changed");
                // Runs on the watcher's own thread, outside the runtime.
                if events.blocking_send(path).is_err() {
                    return;
                }
            }
        }
        Err(e) => warn!(error = %e, "watcher error"),
    })
    .map_err(|e| RoamWebError::Watch(format!("cannot create watcher: {e}")))?;

    watcher
        .watch(dir, RecursiveMode::Recursive)
        .map_err(|e| RoamWebError::Watch(format!("cannot watch {}: {e}", dir.display())))?;
    Ok(watcher)
}

/// `.org` files under `root` that `event` reports as created or written.
///
/// Hidden files and anything inside hidden directories are ignored, which
/// covers editor lock files such as `.#note.org`.
pub fn written_notes(root: &Path, event: &Event) -> Vec<PathBuf> {
    let is_write = match event.kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    };
    if !is_write {
        return Vec::new();
    }

    event
        .paths
        .iter()
        .filter(|path| path.extension().is_some_and(|ext| ext == WATCHED_EXTENSION))
        .filter(|path| !is_hidden(root, path))
        .cloned()
        .collect()
}

fn is_hidden(root: &Path, path: &Path) -> bool {
    let relative = path
        .strip_prefix(root)
        .unwrap_or_else(|_| Path::new(path.file_name().unwrap_or_default()));
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Trailing-edge debounce: fire once `window` after the last event of a burst.
///
/// Every event resets the timer. Returns when `events` closes (a pending
/// burst is dropped) or `triggers` is closed.
pub async fn debounce(
    mut events: mpsc::Receiver<PathBuf>,
    window: Duration,
    triggers: mpsc::Sender<()>,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = sleep_until(deadline.unwrap_or_else(Instant::now));

        tokio::select! {
            event = events.recv() => match event {
                Some(path) => {
                    debug!(path = %path.display(), "change observed, resetting debounce timer");
                    deadline = Some(Instant::now() + window);
                }
                None => return,
            },
            () = timer, if deadline.is_some() => {
                deadline = None;
                match triggers.try_send(()) {
                    Ok(()) => debug!("rebuild triggered"),
                    Err(TrySendError::Full(())) => debug!("rebuild already queued, coalescing"),
                    Err(TrySendError::Closed(())) => return,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rebuild
// ---------------------------------------------------------------------------

/// Run `rebuild` once per trigger, one at a time.
///
/// A failed rebuild is logged; the worker keeps going. Returns when the
/// trigger channel closes.
pub async fn rebuild_worker<F, Fut>(mut triggers: mpsc::Receiver<()>, mut rebuild: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<BuildResult>>,
{
    while triggers.recv().await.is_some() {
        info!("rebuilding site");
        match rebuild().await {
            Ok(result) => info!(
                notes = result.note_count,
                elapsed_ms = result.elapsed.as_millis(),
                "rebuild complete"
            ),
            Err(e) => error!(error = %e, "rebuild failed"),
        }
    }
}

/// Watch `config.roam_dir` and rebuild the site after every settled burst of
/// changes. Runs until the task is dropped.
///
/// Fails only when the directory cannot be watched.
#[instrument(skip_all, fields(roam_dir = %config.roam_dir.display()))]
pub async fn watch_and_rebuild(
    config: BuildConfig,
    progress: Arc<dyn ProgressReporter>,
) -> Result<()> {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (trigger_tx, trigger_rx) = mpsc::channel(1);

    let _watcher = watch_notes(&config.roam_dir, event_tx)?;
    let debouncer = tokio::spawn(debounce(event_rx, DEBOUNCE_WINDOW, trigger_tx));

    info!("watching for changes");
    rebuild_worker(trigger_rx, || {
        let config = config.clone();
        let progress = Arc::clone(&progress);
        async move { build_site(&config, progress.as_ref()).await }
    })
    .await;

    debouncer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn result() -> BuildResult {
        BuildResult {
            output_dir: PathBuf::from("/tmp/site"),
            note_count: 1,
            notes_written: 1,
            notes_skipped: 0,
            tag_pages: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_yields_one_trigger_after_quiet_period() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let handle = tokio::spawn(debounce(event_rx, ms(500), trigger_tx));

        for _ in 0..5 {
            event_tx.send(PathBuf::from("a.org")).await.unwrap();
            sleep(ms(100)).await;
        }
        // Last event at t=400, so nothing fires before t=900.
        assert!(trigger_rx.try_recv().is_err());

        sleep(ms(450)).await;
        assert!(trigger_rx.try_recv().is_ok());
        assert!(trigger_rx.try_recv().is_err());

        drop(event_tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_trigger_separately() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        tokio::spawn(debounce(event_rx, ms(500), trigger_tx));

        event_tx.send(PathBuf::from("a.org")).await.unwrap();
        assert_eq!(trigger_rx.recv().await, Some(()));

        event_tx.send(PathBuf::from("b.org")).await.unwrap();
        assert_eq!(trigger_rx.recv().await, Some(()));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_trigger_absorbs_later_ones() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        tokio::spawn(debounce(event_rx, ms(500), trigger_tx));

        for _ in 0..3 {
            event_tx.send(PathBuf::from("a.org")).await.unwrap();
            sleep(ms(600)).await;
        }

        assert!(trigger_rx.try_recv().is_ok());
        assert!(trigger_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closing_events_drops_pending_burst() {
        let (event_tx, event_rx) = mpsc::channel(16);
        let (trigger_tx, mut trigger_rx) = mpsc::channel(1);
        let handle = tokio::spawn(debounce(event_rx, ms(500), trigger_tx));

        event_tx.send(PathBuf::from("a.org")).await.unwrap();
        assert_eq!(trigger_rx.recv().await, Some(()));

        drop(event_tx);
        handle.await.unwrap();
        assert_eq!(trigger_rx.recv().await, None);
    }

    #[tokio::test]
    async fn worker_survives_failed_rebuilds() {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let worker = tokio::spawn(rebuild_worker(trigger_rx, move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(RoamWebError::Storage("database locked".into()))
                } else {
                    Ok(result())
                }
            }
        }));

        trigger_tx.send(()).await.unwrap();
        trigger_tx.send(()).await.unwrap();
        trigger_tx.send(()).await.unwrap();
        drop(trigger_tx);
        worker.await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    fn event(kind: EventKind, paths: &[&Path]) -> Event {
        paths
            .iter()
            .fold(Event::new(kind), |e, p| e.add_path(p.to_path_buf()))
    }

    #[test]
    fn writes_to_org_files_are_reported() {
        let root = Path::new("/roam");
        let note = root.join("daily/2024.org");
        let text = root.join("notes.txt");

        let created = event(EventKind::Create(CreateKind::File), &[&note, &text]);
        assert_eq!(written_notes(root, &created), [note.clone()]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &[&note],
        );
        assert_eq!(written_notes(root, &written), [note.clone()]);

        // Editors that save through a temp file end with a rename onto the note.
        let renamed = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &[&note]);
        assert_eq!(written_notes(root, &renamed), [note]);
    }

    #[test]
    fn reads_removals_and_metadata_are_ignored() {
        let root = Path::new("/roam");
        let note = root.join("a.org");
        for kind in [
            EventKind::Access(AccessKind::Open(AccessMode::Read)),
            EventKind::Remove(RemoveKind::File),
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
        ] {
            assert!(written_notes(root, &event(kind, &[&note])).is_empty());
        }
    }

    #[test]
    fn hidden_files_and_directories_are_ignored() {
        let root = Path::new("/home/me/.roam");
        let created = || EventKind::Create(CreateKind::File);

        let lock = root.join(".#a.org");
        let git = root.join(".git/a.org");
        let visible = root.join("a.org");
        let changed = written_notes(root, &event(created(), &[&lock, &git, &visible]));
        assert_eq!(changed, [visible]);

        // Outside the root only the file name counts.
        let elsewhere = Path::new("/private/tmp/.b.org");
        assert!(written_notes(root, &event(created(), &[elsewhere])).is_empty());
    }

    #[tokio::test]
    async fn watcher_reports_new_note_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(16);
        let _watcher = watch_notes(dir.path(), tx).unwrap();

        std::fs::write(dir.path().join("new.org"), "* new").unwrap();
        let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no event within 5s")
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "new.org");
    }

    #[test]
    fn watching_missing_dir_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let err = watch_notes(Path::new("/nonexistent/roam"), tx).unwrap_err();
        assert!(matches!(err, RoamWebError::Watch(_)));
    }
}
