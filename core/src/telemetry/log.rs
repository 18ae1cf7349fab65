use log::{info, warn};

/// Emits through the `log` facade and keeps the entries of the current run so
/// they can be handed back to the caller.
#[derive(Debug)]
pub struct LogManager {
    target: &'static str,
    entries: Vec<String>,
}

impl LogManager {
    pub fn new(target: &'static str) -> Self {
        Self {
            target,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, message: &str) {
        info!(target: self.target, "{}", message);
        self.entries.push(message.to_string());
    }

    pub fn warn(&mut self, message: &str) {
        warn!(target: self.target, "{}", message);
        self.entries.push(format!("WARN: {message}"));
    }

    /// Hands over the collected entries and starts a fresh run.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("galrotcore")
    }
}
