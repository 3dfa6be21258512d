use super::{RegistryError, Result};

/// Whether a process with this PID exists.
///
/// A process owned by another user still counts as alive.
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Ask a process to shut down gracefully
#[cfg(unix)]
pub fn send_terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .ok_or_else(|| RegistryError::Signal {
            pid,
            reason: "not a valid process id".to_string(),
        })?;

    kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| RegistryError::Signal {
        pid,
        reason: e.to_string(),
    })
}

/// Liveness is unknown on this platform; assume the process runs
#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

/// Signals are unsupported on this platform
#[cfg(not(unix))]
pub fn send_terminate(pid: u32) -> Result<()> {
    Err(RegistryError::Signal {
        pid,
        reason: "signals are not supported on this platform".to_string(),
    })
}
