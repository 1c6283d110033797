//! Polling watcher that turns directory changes into descriptor events.

use std::path::{Path, PathBuf};
use std::time::Duration;

use drover_core::DescriptorEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::error::{WatchError, WatchResult};
use crate::scan::{Catalog, DirectoryScanner};

const EVENT_BUFFER: usize = 64;

/// Stream of descriptor events. A terminal error item is followed by end of stream.
pub type DescriptorStream = ReceiverStream<WatchResult<DescriptorEvent>>;

/// Handle that keeps a watcher alive; dropping it stops the watcher.
#[derive(Debug)]
pub struct WatchRegistration {
    dir: PathBuf,
    task: JoinHandle<()>,
}

impl WatchRegistration {
    /// Watched directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Drop for WatchRegistration {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Entry point for directory watching.
#[derive(Debug, Clone, Copy)]
pub struct DirWatcher;

impl DirWatcher {
    /// Scan `dir` once, then keep rescanning every `poll_interval`.
    ///
    /// The stream starts with an `Added` event per descriptor already present.
    ///
    /// # Errors
    ///
    /// Returns an error when `dir` is missing, is not a directory, or cannot be listed.
    pub fn spawn(
        dir: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> WatchResult<(WatchRegistration, DescriptorStream)> {
        let dir = dir.into();
        let metadata =
            std::fs::metadata(&dir).map_err(|source| WatchError::io("watch.metadata", &dir, source))?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory { path: dir });
        }
        let mut scanner = DirectoryScanner::new(dir.clone());
        let initial = scanner.scan()?;
        info!(
            dir = %dir.display(),
            descriptors = initial.len(),
            poll_ms = u64::try_from(poll_interval.as_millis()).unwrap_or(u64::MAX),
            "directory watcher started"
        );
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(watch_loop(scanner, initial, poll_interval, tx));
        Ok((WatchRegistration { dir, task }, ReceiverStream::new(rx)))
    }
}

async fn watch_loop(
    mut scanner: DirectoryScanner,
    initial: Catalog,
    poll_interval: Duration,
    tx: mpsc::Sender<WatchResult<DescriptorEvent>>,
) {
    let dir = scanner.dir().to_path_buf();
    if !emit(&tx, diff(&Catalog::new(), &initial)).await {
        return;
    }
    let mut known = initial;
    loop {
        sleep(poll_interval).await;
        let joined = tokio::task::spawn_blocking(move || {
            let result = scanner.scan();
            (scanner, result)
        })
        .await;
        let (returned, result) = match joined {
            Ok(pair) => pair,
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "directory scan task failed");
                let _ = tx
                    .send(Err(WatchError::Task {
                        path: dir,
                        detail: err.to_string(),
                    }))
                    .await;
                return;
            }
        };
        scanner = returned;
        match result {
            Ok(current) => {
                if !emit(&tx, diff(&known, &current)).await {
                    return;
                }
                known = current;
            }
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "directory watch failed");
                let _ = tx.send(Err(err)).await;
                return;
            }
        }
    }
}

async fn emit(
    tx: &mpsc::Sender<WatchResult<DescriptorEvent>>,
    events: Vec<DescriptorEvent>,
) -> bool {
    for event in events {
        debug!(kind = event.kind(), content_id = %event.id(), "descriptor event");
        if tx.send(Ok(event)).await.is_err() {
            debug!("descriptor stream receiver dropped; stopping watcher");
            return false;
        }
    }
    true
}

/// Events turning `previous` into `current`: removals first, then additions.
///
/// An identifier whose source upgrades from a magnet link to metainfo is re-announced as
/// added so the engine can complete its metadata.
pub(crate) fn diff(previous: &Catalog, current: &Catalog) -> Vec<DescriptorEvent> {
    let removed = previous
        .keys()
        .filter(|id| !current.contains_key(*id))
        .map(|id| DescriptorEvent::Removed { id: *id });
    let added = current
        .iter()
        .filter(|(id, source)| match previous.get(*id) {
            None => true,
            Some(before) => !before.has_metadata() && source.has_metadata(),
        })
        .map(|(id, source)| DescriptorEvent::Added {
            id: *id,
            source: source.clone(),
        });
    removed.chain(added).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::DescriptorSource;
    use drover_test_support::fixtures::{MetainfoFixture, content_id, magnet_uri};
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    const POLL: Duration = Duration::from_millis(20);
    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(stream: &mut DescriptorStream) -> anyhow::Result<DescriptorEvent> {
        let item = timeout(WAIT, stream.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("stream ended"))?;
        Ok(item?)
    }

    #[test]
    fn diff_orders_removals_before_additions() {
        let mut previous = Catalog::new();
        previous.insert(content_id(1), DescriptorSource::uri("magnet:?1"));
        previous.insert(content_id(2), DescriptorSource::uri("magnet:?2"));
        let mut current = Catalog::new();
        current.insert(content_id(2), DescriptorSource::file("/w/2.torrent"));
        current.insert(content_id(3), DescriptorSource::uri("magnet:?3"));

        let events = diff(&previous, &current);
        assert_eq!(
            events,
            vec![
                DescriptorEvent::Removed { id: content_id(1) },
                DescriptorEvent::Added {
                    id: content_id(2),
                    source: DescriptorSource::file("/w/2.torrent"),
                },
                DescriptorEvent::Added {
                    id: content_id(3),
                    source: DescriptorSource::uri("magnet:?3"),
                },
            ]
        );
        assert!(diff(&current, &current).is_empty());
    }

    #[tokio::test]
    async fn spawn_rejects_missing_and_non_directory_paths() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        assert!(matches!(
            DirWatcher::spawn(temp.path().join("missing"), POLL),
            Err(WatchError::Io { .. })
        ));
        let file = temp.path().join("file");
        std::fs::write(&file, b"x")?;
        assert!(matches!(
            DirWatcher::spawn(file, POLL),
            Err(WatchError::NotADirectory { .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn emits_initial_additions_then_changes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let first = MetainfoFixture::single("first.bin", vec![1_u8; 16]);
        first.write_descriptor(temp.path(), "first.torrent")?;

        let (_registration, mut stream) = DirWatcher::spawn(temp.path(), POLL)?;
        assert!(matches!(
            next_event(&mut stream).await?,
            DescriptorEvent::Added { id, .. } if id == first.content_id()
        ));

        let uri = magnet_uri(content_id(7), None);
        std::fs::write(temp.path().join("more.magnet"), &uri)?;
        assert_eq!(
            next_event(&mut stream).await?,
            DescriptorEvent::Added {
                id: content_id(7),
                source: DescriptorSource::uri(uri),
            }
        );

        std::fs::remove_file(temp.path().join("first.torrent"))?;
        assert_eq!(
            next_event(&mut stream).await?,
            DescriptorEvent::Removed {
                id: first.content_id()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn content_change_is_removal_then_addition() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let before = MetainfoFixture::single("v1.bin", vec![1_u8; 16]);
        before.write_descriptor(temp.path(), "item.torrent")?;
        let (_registration, mut stream) = DirWatcher::spawn(temp.path(), POLL)?;
        next_event(&mut stream).await?;

        let after = MetainfoFixture::single("v2.bin", vec![2_u8; 48]);
        after.write_descriptor(temp.path(), "item.torrent")?;
        assert_eq!(
            next_event(&mut stream).await?,
            DescriptorEvent::Removed {
                id: before.content_id()
            }
        );
        assert!(matches!(
            next_event(&mut stream).await?,
            DescriptorEvent::Added { id, .. } if id == after.content_id()
        ));
        Ok(())
    }

    #[tokio::test]
    async fn vanished_directory_ends_stream_with_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("watched");
        std::fs::create_dir(&dir)?;
        let (_registration, mut stream) = DirWatcher::spawn(&dir, POLL)?;
        std::fs::remove_dir(&dir)?;
        let item = timeout(WAIT, stream.next()).await?;
        assert!(matches!(item, Some(Err(WatchError::Walkdir { .. }))));
        assert!(timeout(WAIT, stream.next()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn dropping_registration_ends_stream() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let (registration, mut stream) = DirWatcher::spawn(temp.path(), POLL)?;
        assert_eq!(registration.dir(), temp.path());
        drop(registration);
        assert!(timeout(WAIT, stream.next()).await?.is_none());
        Ok(())
    }
}
