use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

/// Drive a collaborator call while forwarding its progress messages.
///
/// Progress is forwarded in the order it was sent, and everything sent before
/// the call returned is forwarded before this function returns.
pub async fn relay<F, T>(
    call: F,
    mut progress: UnboundedReceiver<String>,
    mut forward: impl FnMut(String),
) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(call);
    loop {
        tokio::select! {
            biased;
            Some(message) = progress.recv() => forward(message),
            output = &mut call => {
                while let Ok(message) = progress.try_recv() {
                    forward(message);
                }
                return output;
            }
        }
    }
}

/// Run a collaborator call under a phase timeout.
/// Returns `None` when `cancel` fires first; the call is dropped in that case.
pub async fn bounded<F, T>(
    limit: Duration,
    cancel: &CancellationToken,
    call: F,
) -> Option<Result<T, ProviderError>>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        outcome = timeout(limit, call) => {
            Some(outcome.unwrap_or_else(|_| Err(ProviderError::Timeout(limit))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProgressSender;
    use std::time::Duration;

    #[tokio::test]
    async fn test_relay_preserves_order_and_drains() {
        let (progress, rx) = ProgressSender::channel();
        let call = async move {
            progress.send("first");
            tokio::time::sleep(Duration::from_millis(5)).await;
            progress.send("second");
            progress.send("third");
            42
        };

        let mut seen = Vec::new();
        let output = relay(call, rx, |m| seen.push(m)).await;

        assert_eq!(output, 42);
        assert_eq!(seen, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_relay_without_progress() {
        let (_progress, rx) = ProgressSender::channel();
        let mut seen = Vec::new();
        let output = relay(async { "done" }, rx, |m| seen.push(m)).await;
        assert_eq!(output, "done");
        assert!(seen.is_empty());
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let cancel = CancellationToken::new();
        let outcome = bounded(Duration::from_millis(20), &cancel, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, ProviderError>(())
        })
        .await;

        assert!(matches!(outcome, Some(Err(ProviderError::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_bounded_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = bounded(Duration::from_secs(30), &cancel, async { Ok::<_, ProviderError>(1) }).await;
        assert!(outcome.is_none());
    }
}
