pub mod annotate;
pub mod backup;
pub mod export;
pub mod watch;

use std::future::Future;

use tokio_util::sync::CancellationToken;
use workflow::{ListenExit, ListenReport};

use crate::error::CliError;

/// Drive `work` to completion; on Ctrl+C cancel `token` and let `work`
/// wind down (close the subscription) before returning.
pub async fn until_ctrl_c<F: Future>(token: &CancellationToken, work: F) -> Result<F::Output, CliError> {
    tokio::pin!(work);
    tokio::select! {
        out = &mut work => Ok(out),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("interrupt received, shutting down...");
            token.cancel();
            Ok(work.await)
        }
    }
}

/// Map how the listen loop ended onto the process result.
pub fn finish(report: ListenReport) -> Result<(), CliError> {
    match report.exit {
        ListenExit::StreamEnded => {
            tracing::info!("subscription ended by server");
            Ok(())
        }
        ListenExit::Cancelled => {
            tracing::info!("shutdown complete");
            Ok(())
        }
        ListenExit::ConnectionError(e) => Err(e.into()),
    }
}
