use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Spawns a background loop parented to `token`.
///
/// The loop is dropped at its next suspension point once the token is
/// cancelled; nothing is flushed.
pub(crate) fn spawn_task<Fut>(
    name: String,
    token: CancellationToken,
    task: Fut,
) -> JoinHandle<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("background task {name} cancelled");
            }
            _ = task => {
                debug!("background task {name} exited");
            }
        }
    })
}

/// Sleeps for `duration` unless `token` fires first.
///
/// Returns `false` when the sleep was cut short by cancellation.
pub(crate) async fn sleep_or_cancelled(
    token: &CancellationToken,
    duration: Duration,
) -> bool {
    tokio::select! {
        biased;
        _ = token.cancelled() => false,
        _ = sleep(duration) => true,
    }
}
