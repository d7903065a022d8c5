use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Install a handler that cancels the returned token on SIGTERM or SIGINT.
///
/// If the unix handlers cannot be installed, falls back to `ctrl_c`.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                    _ = sigint.recv() => tracing::info!("received SIGINT, shutting down"),
                }
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::warn!(error = %err, "signal handlers unavailable, falling back to ctrl-c");
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "ctrl-c handler failed");
                }
                tracing::info!("received ctrl-c, shutting down");
            }
        }
        trigger.cancel();
    });

    token
}
