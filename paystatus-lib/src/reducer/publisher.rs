use super::PaymentStatusReducer;
use crate::config::ReducerConfig;
use crate::gate::DeliveryGate;
use crate::metrics::StatusMetrics;
use crate::status::{PaymentStatus, RawStatusEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Callback receiving each published status.
pub type StatusCallback = Arc<dyn Fn(PaymentStatus) + Send + Sync>;

/// Publishes reduced statuses after a settle window.
///
/// The first event opens a window of `settle_delay`; later events inside
/// the window only replace the candidate. When the window elapses the
/// latest candidate is published, even if it equals the previous status.
#[derive(Clone)]
pub struct StatusPublisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    reducer: PaymentStatusReducer,
    settle_delay: Duration,
    runtime: Handle,
    on_publish: StatusCallback,
    metrics: Arc<StatusMetrics>,
    gate: Arc<DeliveryGate>,
    cancelled: AtomicBool,
    window: Mutex<SettleWindow>,
}

#[derive(Default)]
struct SettleWindow {
    published: PaymentStatus,
    candidate: Option<PaymentStatus>,
    timer: Option<JoinHandle<()>>,
}

impl StatusPublisher {
    /// Create a publisher that spawns its settle timers on `runtime`.
    pub fn new(
        config: &ReducerConfig,
        runtime: Handle,
        metrics: Arc<StatusMetrics>,
        on_publish: StatusCallback,
    ) -> Self {
        Self::with_gate(
            config,
            runtime,
            metrics,
            on_publish,
            Arc::new(DeliveryGate::new()),
        )
    }

    /// Publisher whose callbacks are serialized with the channel feeding it.
    pub(crate) fn with_gate(
        config: &ReducerConfig,
        runtime: Handle,
        metrics: Arc<StatusMetrics>,
        on_publish: StatusCallback,
        gate: Arc<DeliveryGate>,
    ) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                reducer: PaymentStatusReducer::new(config),
                settle_delay: config.settle_delay(),
                runtime,
                on_publish,
                metrics,
                gate,
                cancelled: AtomicBool::new(false),
                window: Mutex::new(SettleWindow::default()),
            }),
        }
    }

    /// Reduce `event` and schedule its status for publication.
    ///
    /// Returns the derived status. Ignored once cancelled.
    pub fn submit(&self, event: &RawStatusEvent) -> PaymentStatus {
        let derived = self.inner.reducer.reduce(event);
        let inner = &self.inner;

        let mut window = inner.window.lock();
        if inner.cancelled.load(Ordering::Acquire) {
            return derived;
        }
        window.candidate = Some(derived);
        if window.timer.is_none() {
            debug!(status = %derived, "settle window opened");
            let task_inner = Arc::clone(inner);
            window.timer = Some(inner.runtime.spawn(async move {
                tokio::time::sleep(task_inner.settle_delay).await;
                task_inner.flush();
            }));
        }
        derived
    }

    /// Last published status; `Pending` until the first window elapses.
    pub fn status(&self) -> PaymentStatus {
        self.inner.window.lock().published
    }

    /// True while a settle window is open.
    pub fn is_updating(&self) -> bool {
        self.inner.window.lock().timer.is_some()
    }

    /// Stop publishing. No callback starts after this returns.
    pub fn cancel(&self) {
        // Under the gate so an in-flight callback on another thread finishes
        // first.
        self.inner
            .gate
            .exclusive(|| self.inner.cancelled.store(true, Ordering::Release));
        let mut window = self.inner.window.lock();
        window.candidate = None;
        if let Some(timer) = window.timer.take() {
            timer.abort();
        }
    }

    /// True once [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl PublisherInner {
    fn flush(&self) {
        let status = {
            let mut window = self.window.lock();
            window.timer = None;
            if self.cancelled.load(Ordering::Acquire) {
                return;
            }
            let Some(status) = window.candidate.take() else {
                return;
            };
            status
        };

        let delivered = self.gate.exclusive(|| {
            if self.cancelled.load(Ordering::Acquire) {
                return false;
            }
            self.window.lock().published = status;
            (self.on_publish)(status);
            true
        });
        if delivered {
            self.metrics.record_status_published();
            info!(%status, "payment status published");
        }
    }
}
