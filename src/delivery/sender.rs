use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::DeliveryQueue;
use crate::report::Report;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport not available: {0}")]
    Unavailable(String),

    #[error("HID write error: {0}")]
    WriteError(String),
}

/// Outbound side of the pipeline, e.g. a USB HID interrupt endpoint
pub trait ReportTransport: Send + 'static {
    fn send(&mut self, report: Report) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Outcome of handing one dequeued report to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Identical to the last transmitted report
    Suppressed,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub sent: u64,
    pub suppressed: u64,
    pub failed: u64,
}

/// Single consumer of the delivery queue
///
/// Keeps exactly one snapshot of the last report the transport accepted,
/// starting from all zeroes, and only writes when a report differs from it.
/// Outbound traffic is thereby bounded by real state changes, not by the poll
/// rate.
pub struct TransportSender<T: ReportTransport> {
    queue: Arc<DeliveryQueue>,
    transport: T,
    last_sent: Report,
    stats: SenderStats,
}

impl<T: ReportTransport> TransportSender<T> {
    pub fn new(queue: Arc<DeliveryQueue>, transport: T) -> Self {
        Self {
            queue,
            transport,
            last_sent: Report::default(),
            stats: SenderStats::default(),
        }
    }

    pub fn last_sent(&self) -> Report {
        self.last_sent
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    pub async fn deliver(&mut self, report: Report) -> Delivery {
        if report == self.last_sent {
            self.stats.suppressed += 1;
            return Delivery::Suppressed;
        }

        match self.transport.send(report).await {
            Ok(()) => {
                debug!("Sent report {:02x?}", report.to_bytes());
                self.last_sent = report;
                self.stats.sent += 1;
                Delivery::Sent
            }
            Err(e) => {
                // Snapshot untouched: the next differing report is still attempted
                error!("{}", e);
                self.stats.failed += 1;
                Delivery::Failed
            }
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting transport sender");

        let queue = self.queue.clone();
        let mut last_log_time = Local::now();
        let log_interval = chrono::Duration::seconds(10);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Transport sender shutting down");
                    break;
                }
                report = queue.dequeue() => {
                    self.deliver(report).await;
                }
            }

            let now = Local::now();
            if now - last_log_time > log_interval {
                info!(
                    "Transport sender stats: sent {}, suppressed {}, failed {}, queue purges {} ({} reports dropped)",
                    self.stats.sent,
                    self.stats.suppressed,
                    self.stats.failed,
                    queue.purges(),
                    queue.dropped()
                );
                last_log_time = now;
            }
        }
    }
}
