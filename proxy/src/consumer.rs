//! Change notification loop.

use crate::notifier::BackendNotifier;
use evento_redpanda::{ConsumerError, Notificacion};
use futures::{Stream, StreamExt};

/// Forwards every notification of `stream` to the backend.
///
/// The payload is only logged. Receive and notification errors are logged
/// and the loop moves on; it ends when the stream does. The next message is
/// only pulled after the current one was handled, so its offset is committed
/// after the backend was notified.
pub async fn run<S>(stream: S, notifier: &BackendNotifier) -> usize
where
    S: Stream<Item = Result<Notificacion, ConsumerError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut atendidas = 0;

    while let Some(resultado) = stream.next().await {
        match resultado {
            Ok(notificacion) => {
                tracing::info!(
                    topic = %notificacion.topic,
                    partition = notificacion.partition,
                    offset = notificacion.offset,
                    payload = %notificacion.payload,
                    "Cátedra change notification"
                );
                // Failures are logged by the notifier; the message is not retried.
                let _ = notifier.notificar().await;
                atendidas += 1;
            },
            Err(e) => tracing::warn!(error = %e, "Notification receive failed"),
        }
    }

    tracing::info!(atendidas, "Notification stream ended");
    atendidas
}
