use std::fmt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Signals that stop the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// The handlers are registered before this returns, so a signal arriving
/// right after the call is not lost. The task ends after the first signal, or
/// when the token is cancelled by someone else, and yields the signal.
#[cfg(unix)]
pub fn install_signal_listener(
    token: CancellationToken,
) -> std::io::Result<JoinHandle<Option<TerminationSignal>>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = token.cancelled() => None,
            Some(()) = interrupt.recv() => Some(TerminationSignal::Interrupt),
            Some(()) = terminate.recv() => Some(TerminationSignal::Terminate),
            else => None,
        };
        notify(&token, received);
        received
    }))
}

/// Cancel `token` on Ctrl+C
#[cfg(not(unix))]
pub fn install_signal_listener(
    token: CancellationToken,
) -> std::io::Result<JoinHandle<Option<TerminationSignal>>> {
    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = token.cancelled() => None,
            result = tokio::signal::ctrl_c() => result.ok().map(|()| TerminationSignal::Interrupt),
        };
        notify(&token, received);
        received
    }))
}

fn notify(token: &CancellationToken, received: Option<TerminationSignal>) {
    if let Some(signal) = received {
        info!(signal = %signal, "Received {} signal, stopping the bot", signal);
        token.cancel();
    }
}
