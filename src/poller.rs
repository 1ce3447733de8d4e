// src/poller.rs
// Keeps a single in-progress test view fresh: re-issues the detail read on
// a fixed interval until the test reaches a terminal status or the owner
// cancels. Fetch and tick are sequential, so two fetches for the same test
// are never in flight at once; a tick that would overlap is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::Client;
use crate::graphql::ops;
use crate::types::LoadTest;

pub struct StatusPoller {
    client: Arc<Client>,
}

/// Handle to a running poll loop. The owning scope must call [`stop`] when
/// the view that started the poll goes away; the loop also ends on its own
/// once the test is terminal, so a forgotten handle cannot leak requests
/// forever.
///
/// [`stop`]: PollHandle::stop
pub struct PollHandle {
    cancel: CancellationToken,
    updates: watch::Receiver<Option<LoadTest>>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Cancel the poll loop. Idempotent; an in-flight fetch finishes but its
    /// result is discarded by the loop exiting.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Latest fetched state of the test. Receivers see an error from
    /// `changed()` once the loop has ended.
    pub fn updates(&self) -> watch::Receiver<Option<LoadTest>> {
        self.updates.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to exit, whether by cancellation or by the test
    /// reaching a terminal status.
    pub async fn stopped(self) {
        let _ = self.task.await;
    }
}

impl StatusPoller {
    pub fn new(client: Arc<Client>) -> Self {
        StatusPoller { client }
    }

    /// Begin polling the detail read for `test_id` every `every`. The first
    /// fetch happens immediately.
    pub fn start(&self, test_id: impl Into<String>, every: Duration) -> PollHandle {
        let test_id = test_id.into();
        let client = self.client.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (tx, updates) = watch::channel(None);

        let task = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(test_id = %test_id, interval_ms = every.as_millis() as u64, "poll started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(test_id = %test_id, "poll cancelled");
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                let op = ops::load_test(&test_id);
                match client.refetch::<Option<LoadTest>>(&op).await {
                    Ok(Some(test)) => {
                        let terminal = test.status.is_terminal();
                        let _ = tx.send_replace(Some(test));
                        if terminal {
                            debug!(test_id = %test_id, "test reached terminal status, poll stopped");
                            break;
                        }
                    }
                    Ok(None) => {
                        warn!(test_id = %test_id, "test no longer exists, poll stopped");
                        break;
                    }
                    Err(e) if e.is_unauthorized() => {
                        warn!(test_id = %test_id, "session torn down, poll stopped");
                        break;
                    }
                    Err(e) => {
                        // no immediate retry: trying again is the next tick
                        warn!(test_id = %test_id, error = %e, "poll fetch failed");
                    }
                }
            }
        });

        PollHandle {
            cancel,
            updates,
            task,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::session::SessionStore;
    use crate::test_support::{ScriptedTransport, load_test_payload};
    use crate::transport::TransportLink;
    use crate::types::LoadTestStatus;
    use std::sync::atomic::Ordering;

    fn client_with(transport: Arc<ScriptedTransport>) -> Arc<Client> {
        let session = Arc::new(SessionStore::in_memory());
        let link = Arc::new(TransportLink::with_transport(
            transport,
            session.clone(),
            "ws://localhost:4000/graphql".to_string(),
        ));
        Arc::new(Client::with_parts(session, link))
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_terminal_status_then_stops_itself() {
        let transport = Arc::new(ScriptedTransport::script(vec![
            Ok(load_test_payload("t-1", "running")),
            Ok(load_test_payload("t-1", "running")),
            Ok(load_test_payload("t-1", "completed")),
        ]));
        let client = client_with(transport.clone());
        let poller = StatusPoller::new(client);

        let handle = poller.start("t-1", Duration::from_millis(3000));
        let updates = handle.updates();
        handle.stopped().await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
        let last = updates.borrow().clone().unwrap();
        assert_eq!(last.status, LoadTestStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_cancels_the_loop() {
        let transport = Arc::new(ScriptedTransport::always(load_test_payload(
            "t-1", "running",
        )));
        let client = client_with(transport.clone());
        let poller = StatusPoller::new(client);

        let handle = poller.start("t-1", Duration::from_millis(3000));
        let mut updates = handle.updates();
        updates.changed().await.unwrap();
        assert!(!handle.is_finished());

        handle.stop();
        handle.stopped().await;
        assert!(transport.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_retries_on_the_next_tick() {
        let transport = Arc::new(ScriptedTransport::script(vec![
            Err(ClientError::transport("connection refused")),
            Ok(load_test_payload("t-1", "running")),
            Ok(load_test_payload("t-1", "cancelled")),
        ]));
        let client = client_with(transport.clone());
        let poller = StatusPoller::new(client);

        let handle = poller.start("t-1", Duration::from_millis(3000));
        handle.stopped().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_test_stops_the_loop() {
        let transport = Arc::new(ScriptedTransport::always(
            serde_json::json!({"loadTest": null}),
        ));
        let client = client_with(transport.clone());
        let poller = StatusPoller::new(client);

        let handle = poller.start("gone", Duration::from_millis(3000));
        handle.stopped().await;
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
