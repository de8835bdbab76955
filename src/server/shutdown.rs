//! Graceful shutdown
//!
//! One root [`CancellationToken`] is cancelled on Ctrl+C or SIGTERM. Live
//! sessions hold child tokens, so their streams stop with the server.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

/// Resolve once a signal arrives or the token is cancelled elsewhere;
/// the token is cancelled either way.
pub async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_shutdown_signal() => {}
        _ = token.cancelled() => {}
    }
    token.cancel();
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_on_cancel() {
        let token = CancellationToken::new();
        let child = token.child_token();
        let handle = tokio::spawn(shutdown_signal(token.clone()));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(child.is_cancelled());
    }
}
