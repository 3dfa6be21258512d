use tokio::time::Instant;

/// Counts whole seconds without pushed traffic.
///
/// The count is measured, not incremented, so a loaded host may skip
/// values; it never goes backwards between resets.
#[derive(Debug, Clone)]
pub struct IdleCounter {
    idle_since: Instant,
    last_reported: u64,
}

impl IdleCounter {
    /// Start counting from now
    pub fn new() -> Self {
        Self {
            idle_since: Instant::now(),
            last_reported: 0,
        }
    }

    /// Traffic was observed; start over
    pub fn reset(&mut self) {
        self.idle_since = Instant::now();
        self.last_reported = 0;
    }

    /// Report the idle seconds for a tick that is about to be delivered
    pub fn advance(&mut self) -> u64 {
        let elapsed = self.idle_since.elapsed().as_secs();
        self.last_reported = elapsed.max(self.last_reported + 1);
        self.last_reported
    }
}

impl Default for IdleCounter {
    fn default() -> Self {
        Self::new()
    }
}
