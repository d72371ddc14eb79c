use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, Instant, interval_at, sleep_until};
use tracing::{debug, warn};

use super::snapshot::{ClusterSnapshot, SnapshotFetcher};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRefreshTrigger {
    Startup,
    Interval,
    Requested,
}

impl SnapshotRefreshTrigger {
    pub fn label(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Interval => "interval",
            Self::Requested => "requested",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotUpdate {
    pub clusters: Vec<ClusterSnapshot>,
    pub revision: u64,
    pub trigger: SnapshotRefreshTrigger,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRefreshEvent {
    Updated(SnapshotUpdate),
    Failed {
        trigger: SnapshotRefreshTrigger,
        error: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotWatchConfig {
    pub poll_interval: Duration,
    pub debounce_interval: Duration,
}

impl Default for SnapshotWatchConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce_interval: DEFAULT_DEBOUNCE_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWatchHandle {
    command_tx: UnboundedSender<SnapshotWatchCommand>,
}

impl SnapshotWatchHandle {
    /// Asks for a refresh; requests inside the debounce window coalesce.
    pub fn request_refresh(&self) {
        let _ = self.command_tx.send(SnapshotWatchCommand::Refresh);
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(SnapshotWatchCommand::Shutdown);
    }
}

#[derive(Debug)]
enum SnapshotWatchCommand {
    Refresh,
    Shutdown,
}

pub fn spawn_snapshot_watch_worker(
    handle: &Handle,
    fetcher: SnapshotFetcher,
    config: SnapshotWatchConfig,
) -> (SnapshotWatchHandle, UnboundedReceiver<SnapshotRefreshEvent>) {
    let (command_tx, command_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();
    let watch_handle = SnapshotWatchHandle { command_tx };

    let _task = handle.spawn(run_snapshot_watch_loop(
        fetcher, config, command_rx, event_tx,
    ));

    (watch_handle, event_rx)
}

async fn run_snapshot_watch_loop(
    fetcher: SnapshotFetcher,
    config: SnapshotWatchConfig,
    mut command_rx: UnboundedReceiver<SnapshotWatchCommand>,
    event_tx: UnboundedSender<SnapshotRefreshEvent>,
) {
    let mut revision: u64 = 0;
    let mut ticker = interval_at(Instant::now() + config.poll_interval, config.poll_interval);
    let mut pending_trigger = Some(SnapshotRefreshTrigger::Startup);
    let mut refresh_deadline = Some(Instant::now());

    loop {
        tokio::select! {
            maybe_command = command_rx.recv() => {
                match maybe_command {
                    Some(SnapshotWatchCommand::Refresh) => {
                        pending_trigger = Some(merge_trigger(
                            pending_trigger,
                            SnapshotRefreshTrigger::Requested
                        ));
                        refresh_deadline = Some(Instant::now() + config.debounce_interval);
                    }
                    Some(SnapshotWatchCommand::Shutdown) | None => break,
                }
            }
            _ = ticker.tick() => {
                pending_trigger = Some(merge_trigger(
                    pending_trigger,
                    SnapshotRefreshTrigger::Interval
                ));
                refresh_deadline = refresh_deadline.or_else(|| Some(Instant::now()));
            }
            _ = sleep_until(refresh_deadline.unwrap_or_else(Instant::now)),
                if refresh_deadline.is_some() => {}
        }

        if let (Some(deadline), Some(trigger)) = (refresh_deadline, pending_trigger)
            && Instant::now() >= deadline
        {
            pending_trigger = None;
            refresh_deadline = None;

            let event = match fetcher.fetch().await {
                Ok(clusters) => {
                    revision = revision.saturating_add(1);
                    debug!(
                        source = %fetcher.source().describe(),
                        trigger = trigger.label(),
                        revision,
                        cluster_count = clusters.len(),
                        "snapshot refresh completed"
                    );
                    SnapshotRefreshEvent::Updated(SnapshotUpdate {
                        clusters,
                        revision,
                        trigger,
                    })
                }
                Err(error) => {
                    warn!(
                        source = %fetcher.source().describe(),
                        trigger = trigger.label(),
                        error = %error,
                        "snapshot refresh failed"
                    );
                    SnapshotRefreshEvent::Failed {
                        trigger,
                        error: error.to_string(),
                    }
                }
            };

            if event_tx.send(event).is_err() {
                break;
            }
        }
    }
}

fn merge_trigger(
    existing: Option<SnapshotRefreshTrigger>,
    incoming: SnapshotRefreshTrigger,
) -> SnapshotRefreshTrigger {
    match (existing, incoming) {
        (None, next) => next,
        (Some(SnapshotRefreshTrigger::Startup), SnapshotRefreshTrigger::Interval) => {
            SnapshotRefreshTrigger::Startup
        }
        (Some(_), SnapshotRefreshTrigger::Requested)
        | (Some(SnapshotRefreshTrigger::Requested), _) => SnapshotRefreshTrigger::Requested,
        (Some(current), _) => current,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tokio::runtime::Handle;
    use tokio::time::timeout;

    use crate::test_support::{remove_dir_if_exists, temp_path};
    use crate::topology::snapshot::{SnapshotFetcher, SnapshotSource};

    use super::{
        SnapshotRefreshEvent, SnapshotRefreshTrigger, SnapshotWatchConfig, merge_trigger,
        spawn_snapshot_watch_worker,
    };

    #[test]
    fn merge_trigger_prefers_explicit_requests() {
        assert_eq!(
            merge_trigger(
                Some(SnapshotRefreshTrigger::Interval),
                SnapshotRefreshTrigger::Requested
            ),
            SnapshotRefreshTrigger::Requested
        );
        assert_eq!(
            merge_trigger(
                Some(SnapshotRefreshTrigger::Requested),
                SnapshotRefreshTrigger::Interval
            ),
            SnapshotRefreshTrigger::Requested
        );
        assert_eq!(
            merge_trigger(
                Some(SnapshotRefreshTrigger::Startup),
                SnapshotRefreshTrigger::Interval
            ),
            SnapshotRefreshTrigger::Startup
        );
    }

    #[tokio::test]
    async fn watch_worker_emits_startup_and_requested_updates() {
        let root = temp_path("snapshot-watch");
        fs::create_dir_all(&root).expect("temp dir should be created");
        let path = root.join("snapshot.json");
        fs::write(&path, r#"{"id": "c1", "name": "demo", "status": "RUNNING"}"#)
            .expect("snapshot should be written");

        let (watch_handle, mut event_rx) = spawn_snapshot_watch_worker(
            &Handle::current(),
            SnapshotFetcher::new(SnapshotSource::File(path.clone()), 1_000, 0),
            SnapshotWatchConfig {
                poll_interval: Duration::from_secs(60),
                debounce_interval: Duration::from_millis(20),
            },
        );

        let startup = timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .expect("startup update should arrive")
            .expect("startup update should be present");
        let SnapshotRefreshEvent::Updated(startup) = startup else {
            panic!("startup refresh should succeed");
        };
        assert_eq!(startup.trigger, SnapshotRefreshTrigger::Startup);
        assert_eq!(startup.revision, 1);

        fs::write(&path, r#"{"id": "c1", "name": "demo", "status": "STOPPED"}"#)
            .expect("snapshot should be rewritten");
        watch_handle.request_refresh();
        watch_handle.request_refresh();

        let requested = timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .expect("requested update should arrive")
            .expect("requested update should be present");
        let SnapshotRefreshEvent::Updated(requested) = requested else {
            panic!("requested refresh should succeed");
        };
        assert_eq!(requested.trigger, SnapshotRefreshTrigger::Requested);
        assert_eq!(requested.revision, 2);
        assert_eq!(requested.clusters[0].status.as_deref(), Some("STOPPED"));

        watch_handle.shutdown();
        remove_dir_if_exists(&root);
    }

    #[tokio::test]
    async fn watch_worker_reports_fetch_failures() {
        let root = temp_path("snapshot-watch-missing");
        let (watch_handle, mut event_rx) = spawn_snapshot_watch_worker(
            &Handle::current(),
            SnapshotFetcher::new(SnapshotSource::File(root.join("missing.json")), 1_000, 0),
            SnapshotWatchConfig::default(),
        );

        let event = timeout(Duration::from_secs(2), event_rx.recv())
            .await
            .expect("failure event should arrive")
            .expect("failure event should be present");
        assert!(matches!(
            event,
            SnapshotRefreshEvent::Failed {
                trigger: SnapshotRefreshTrigger::Startup,
                ..
            }
        ));

        watch_handle.shutdown();
    }
}
