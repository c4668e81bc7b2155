//! Timer-driven snapshot shipping.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use logship_delivery::{CooldownGate, DeliveryClient, DeliveryOutcome, DeliveryRequest};
use logship_tail::DeltaDetector;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::caption::build_caption;
use crate::config::ShipperConfig;

/// Performs one delivery. Implemented by the HTTP client and by test fakes.
pub trait Delivery: Send + Sync + 'static {
    fn deliver(&self, request: DeliveryRequest) -> impl Future<Output = DeliveryOutcome> + Send;
}

impl Delivery for DeliveryClient {
    fn deliver(&self, request: DeliveryRequest) -> impl Future<Output = DeliveryOutcome> + Send {
        async move { self.send(&request).await }
    }
}

/// Ships whole-file snapshots on a fixed interval when content changed.
///
/// All snapshot state lives on the timer task; deliveries run on spawned
/// tasks and report back over a channel, so a tick never blocks on the
/// network and at most one send is ever outstanding.
pub struct PeriodicShipper<D> {
    config: ShipperConfig,
    path: PathBuf,
    gate: Arc<CooldownGate>,
    delivery: Arc<D>,
}

impl<D: Delivery> PeriodicShipper<D> {
    pub fn new(
        config: ShipperConfig,
        path: impl Into<PathBuf>,
        gate: Arc<CooldownGate>,
        delivery: Arc<D>,
    ) -> Self {
        Self {
            config,
            path: path.into(),
            gate,
            delivery,
        }
    }

    /// Spawns the timer loop. Cancel the token to stop it.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    async fn run(self, cancel: CancellationToken) {
        let mut detector = DeltaDetector::new(&self.path);
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let (done_tx, mut done_rx) = mpsc::channel::<DeliveryOutcome>(1);
        let mut in_flight = false;
        let mut suspend_until: Option<Instant> = None;

        info!(
            file = %self.path.display(),
            interval_secs = self.config.interval_secs,
            "periodic shipper started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(outcome) = done_rx.recv() => {
                    // Cleared unconditionally so the next tick can proceed.
                    in_flight = false;
                    if outcome.ok {
                        info!(file = %self.path.display(), "log snapshot delivered");
                    } else {
                        if outcome.extra_wait > Duration::ZERO {
                            suspend_until = Some(Instant::now() + outcome.extra_wait);
                        }
                        warn!(
                            error = outcome.error.as_deref().unwrap_or("unknown"),
                            suspend_secs = outcome.extra_wait.as_secs(),
                            "snapshot delivery failed"
                        );
                    }
                }
                _ = ticker.tick() => {
                    self.on_tick(&mut detector, &mut in_flight, &mut suspend_until, &done_tx);
                }
            }
        }

        debug!(file = %self.path.display(), "periodic shipper stopped");
    }

    fn on_tick(
        &self,
        detector: &mut DeltaDetector,
        in_flight: &mut bool,
        suspend_until: &mut Option<Instant>,
        done_tx: &mpsc::Sender<DeliveryOutcome>,
    ) {
        if let Some(until) = *suspend_until {
            if Instant::now() < until {
                trace!("tick skipped: suspended");
                return;
            }
            *suspend_until = None;
        }
        if *in_flight {
            debug!("tick skipped: send in flight");
            return;
        }
        if self.gate.is_cooled_down() {
            trace!(
                remaining_secs = self.gate.remaining().as_secs(),
                "tick skipped: cooldown"
            );
            return;
        }

        let delta = match detector.observe() {
            Ok(delta) => delta,
            Err(e) => {
                debug!(error = %e, "tick skipped: cannot observe log file");
                return;
            }
        };
        if !delta.changed {
            trace!("tick skipped: no change");
            return;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let caption = build_caption(
            &self.config.install_id,
            &file_name,
            delta.added_count,
            &delta.added_lines,
        );
        let request =
            DeliveryRequest::document(self.config.chat(), self.path.clone()).with_caption(caption);

        debug!(added = delta.added_count, "shipping log snapshot");
        *in_flight = true;

        let delivery = Arc::clone(&self.delivery);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = delivery.deliver(request).await;
            let _ = done_tx.send(outcome).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logship_delivery::{FailureKind, Payload};
    use std::collections::VecDeque;
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct FakeDelivery {
        requests: Mutex<Vec<DeliveryRequest>>,
        outcomes: Mutex<VecDeque<DeliveryOutcome>>,
        block_on: Option<Arc<Notify>>,
    }

    impl FakeDelivery {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                outcomes: Mutex::new(VecDeque::new()),
                block_on: None,
            })
        }

        fn blocking(notify: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                outcomes: Mutex::new(VecDeque::new()),
                block_on: Some(notify),
            })
        }

        fn push_outcome(&self, outcome: DeliveryOutcome) {
            self.outcomes.lock().unwrap().push_back(outcome);
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_caption(&self) -> String {
            self.requests
                .lock()
                .unwrap()
                .last()
                .and_then(|r| r.caption.clone())
                .unwrap_or_default()
        }
    }

    impl Delivery for Arc<FakeDelivery> {
        fn deliver(
            &self,
            request: DeliveryRequest,
        ) -> impl Future<Output = DeliveryOutcome> + Send {
            let this = Arc::clone(self);
            async move {
                this.requests.lock().unwrap().push(request);
                if let Some(notify) = &this.block_on {
                    notify.notified().await;
                }
                this.outcomes
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(DeliveryOutcome::success)
            }
        }
    }

    fn test_config() -> ShipperConfig {
        let mut config = ShipperConfig::new(-1001);
        config.interval_secs = 3;
        config.install_id = "test-box".into();
        config
    }

    fn spawn_shipper(
        path: &Path,
        fake: Arc<FakeDelivery>,
    ) -> (CancellationToken, Arc<CooldownGate>) {
        let cancel = CancellationToken::new();
        let gate = Arc::new(CooldownGate::new());
        PeriodicShipper::new(test_config(), path, Arc::clone(&gate), Arc::new(fake))
            .spawn(cancel.clone());
        (cancel, gate)
    }

    fn append(path: &Path, data: &str) {
        let mut f = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(data.as_bytes()).unwrap();
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_baseline_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "existing\ncontent\n").unwrap();

        let fake = FakeDelivery::new();
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fake.request_count(), 0);
        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn ships_after_change_with_caption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let fake = FakeDelivery::new();
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));
        settle().await; // baseline tick

        append(&path, "two\nERROR: broke\n");
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(fake.request_count(), 1);
        let requests = fake.requests.lock().unwrap();
        let req = &requests[0];
        assert!(matches!(req.payload, Payload::Document(ref p) if p == &path));
        assert_eq!(req.chat.chat_id, -1001);
        drop(requests);

        let caption = fake.last_caption();
        assert!(caption.contains("test-box"));
        assert!(caption.contains("app.log"));
        assert!(caption.contains("+2 lines"));
        assert!(caption.contains("ERROR: broke"));

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_file_is_not_reshipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let fake = FakeDelivery::new();
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));
        settle().await;

        append(&path, "two\n");
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        // Nothing new: further ticks stay quiet.
        tokio::time::sleep(Duration::from_secs(9)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_send_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let notify = Arc::new(Notify::new());
        let fake = FakeDelivery::blocking(Arc::clone(&notify));
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));
        settle().await;

        append(&path, "two\n");
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        // More changes while the first send is stuck: ticks must skip.
        append(&path, "three\n");
        tokio::time::sleep(Duration::from_secs(6)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        // Release the stuck send; the next tick picks up the backlog.
        notify.notify_one();
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fake.request_count(), 2);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn failure_extra_wait_suspends_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let fake = FakeDelivery::new();
        fake.push_outcome(DeliveryOutcome::failure_with_wait(
            FailureKind::Http,
            "HTTP 500",
            Duration::from_secs(60),
        ));
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));
        settle().await;

        append(&path, "two\n");
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        // Still suspended: changed content does not go out.
        append(&path, "three\n");
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        // Suspension over: shipping resumes.
        tokio::time::sleep(Duration::from_secs(40)).await;
        settle().await;
        assert_eq!(fake.request_count(), 2);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn closed_gate_skips_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "one\n").unwrap();

        let fake = FakeDelivery::new();
        let (cancel, gate) = spawn_shipper(&path, Arc::clone(&fake));
        settle().await;

        gate.trigger(Duration::from_secs(120));
        append(&path, "two\n");
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(fake.request_count(), 0);

        tokio::time::sleep(Duration::from_secs(70)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_file_is_skipped_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.log");

        let fake = FakeDelivery::new();
        let (cancel, _gate) = spawn_shipper(&path, Arc::clone(&fake));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(fake.request_count(), 0);

        // The file appears: the first observation is the baseline, the
        // following change ships.
        std::fs::write(&path, "born\n").unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        append(&path, "grown\n");
        tokio::time::sleep(Duration::from_secs(3)).await;
        settle().await;
        assert_eq!(fake.request_count(), 1);

        cancel.cancel();
    }
}
