use tracing::error;

/// Resolves once the process is asked to terminate (Ctrl-C, or SIGTERM and
/// SIGQUIT on unix)
///
/// If a signal handler cannot be installed the error is logged and that
/// signal is simply never observed.
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let [terminate, quit] = unix_shutdown_signals().map(|(kind, name)| unix_signal(kind, name));

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    #[cfg(not(unix))]
    let quit = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = quit => {}
    }
}

/// Unix signals that stop the process gracefully
#[cfg(unix)]
fn unix_shutdown_signals() -> [(tokio::signal::unix::SignalKind, &'static str); 2] {
    use tokio::signal::unix::SignalKind;

    [(SignalKind::terminate(), "SIGTERM"), (SignalKind::quit(), "SIGQUIT")]
}

#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("failed to listen for {name}: {e}");
            std::future::pending::<()>().await;
        }
    }
}
