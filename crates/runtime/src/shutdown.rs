//! Process shutdown plumbing.

use tokio::sync::broadcast;
use tracing::debug;

/// Resolve once SIGINT or SIGTERM is delivered.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => debug!("received SIGINT"),
        _ = terminate => debug!("received SIGTERM"),
    }
}

/// Broadcast channel fed by [`shutdown_signal`].
///
/// The caller must keep the returned sender alive; every subscriber sees
/// one `()` when the process is asked to stop.
pub fn shutdown_channel() -> broadcast::Sender<()> {
    let (tx, _) = broadcast::channel(1);
    let notifier = tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = notifier.send(());
    });
    tx
}

#[cfg(test)]
mod tests {
    use super::shutdown_channel;

    #[tokio::test]
    async fn every_subscriber_observes_the_signal() {
        let tx = shutdown_channel();
        let mut first = tx.subscribe();
        let mut second = tx.subscribe();

        // stand in for the signal handler
        tx.send(()).unwrap();

        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }
}
