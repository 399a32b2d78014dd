use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use speckle_graphql::Subscription;
use sync_api::{ChangeNotification, ErrorKind, SyncError};
use tokio_util::sync::CancellationToken;

use crate::backup::BackupOutcome;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = BackupOutcome> + Send + 'a>>;

/// Per-notification step of the listen loop.
///
/// Implementations fold every failure into the returned outcome; the loop
/// itself only stops on connection-level errors or cancellation.
pub trait NotificationHandler: Send + Sync {
    fn handle<'a>(&'a self, notification: &'a ChangeNotification) -> HandlerFuture<'a>;
}

// ═══════════════════════════════════════════════════════════════
//  Exit + counters
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum ListenExit {
    /// Server completed the subscription or the socket closed cleanly.
    StreamEnded,
    Cancelled,
    ConnectionError(SyncError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenStats {
    pub received: u64,
    pub saved: u64,
    pub skipped: u64,
    pub empty: u64,
    pub failed: u64,
}

impl ListenStats {
    fn record(&mut self, outcome: &BackupOutcome) {
        match outcome {
            BackupOutcome::Skipped(_) => self.skipped += 1,
            BackupOutcome::NoData => self.empty += 1,
            BackupOutcome::Saved(_) => self.saved += 1,
            BackupOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &ListenStats) {
        self.received += other.received;
        self.saved += other.saved;
        self.skipped += other.skipped;
        self.empty += other.empty;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenReport {
    pub exit: ListenExit,
    pub stats: ListenStats,
}

// ═══════════════════════════════════════════════════════════════
//  Listen loop
// ═══════════════════════════════════════════════════════════════

/// Consume `subscription` one notification at a time until the stream ends,
/// a connection-level error arrives or `token` is cancelled.
///
/// The subscription is closed before returning, whichever way the loop ends.
pub async fn listen<H>(mut subscription: Subscription, token: &CancellationToken, handler: &H) -> ListenReport
where
    H: NotificationHandler + ?Sized,
{
    let mut stats = ListenStats::default();

    let exit = loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => break ListenExit::Cancelled,
            item = subscription.next() => item,
        };

        let notification = match item {
            None => break ListenExit::StreamEnded,
            Some(Err(e)) if e.is_connection_level() => {
                tracing::error!(error = %e, "subscription failed");
                break ListenExit::ConnectionError(e);
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "unusable notification, skipping");
                stats.failed += 1;
                continue;
            }
            Some(Ok(n)) => n,
        };

        stats.received += 1;
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => break ListenExit::Cancelled,
            outcome = handler.handle(&notification) => outcome,
        };
        stats.record(&outcome);
    };

    subscription.close().await;
    tracing::info!(
        exit = ?exit,
        received = stats.received,
        saved = stats.saved,
        skipped = stats.skipped,
        empty = stats.empty,
        failed = stats.failed,
        "listen loop finished"
    );
    ListenReport { exit, stats }
}

// ═══════════════════════════════════════════════════════════════
//  Reconnect
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 0 disables reconnection.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// Backoff before attempt `attempt` (1-based); `None` once exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.initial_delay.saturating_mul(factor).min(self.max_delay))
    }
}

/// Subscribe and listen, resubscribing after transport failures as long as
/// `policy` allows. Counters accumulate across connections; the attempt
/// counter resets once a connection delivers a notification.
pub async fn listen_with_reconnect<C, Fut, H>(
    mut connect: C,
    token: &CancellationToken,
    handler: &H,
    policy: ReconnectPolicy,
) -> ListenReport
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<Subscription, SyncError>>,
    H: NotificationHandler + ?Sized,
{
    let mut total = ListenStats::default();
    let mut attempt = 0u32;

    loop {
        let connected = tokio::select! {
            biased;
            _ = token.cancelled() => return ListenReport { exit: ListenExit::Cancelled, stats: total },
            res = connect() => res,
        };

        let error = match connected {
            Ok(subscription) => {
                let report = listen(subscription, token, handler).await;
                if report.stats.received > 0 {
                    attempt = 0;
                }
                total.merge(&report.stats);
                match report.exit {
                    ListenExit::ConnectionError(e) => e,
                    exit => return ListenReport { exit, stats: total },
                }
            }
            Err(e) => e,
        };

        let delay = if error.kind() == ErrorKind::Transport {
            attempt += 1;
            policy.delay(attempt)
        } else {
            None
        };
        let Some(delay) = delay else {
            return ListenReport {
                exit: ListenExit::ConnectionError(error),
                stats: total,
            };
        };

        tracing::warn!(
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "connection lost, reconnecting"
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return ListenReport { exit: ListenExit::Cancelled, stats: total },
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
