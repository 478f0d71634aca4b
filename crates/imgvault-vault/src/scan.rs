//! Scan supersession
//!
//! Long scans hold a [`ScanTicket`]. Starting a newer scan on the same
//! [`ScanGate`] supersedes every older ticket; a superseded scan must
//! discard its result instead of committing it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Generation counter shared by a component and its cancel handles
#[derive(Debug, Clone, Default)]
pub struct ScanGate {
    latest: Arc<AtomicU64>,
}

/// Token for one scan generation
#[derive(Debug, Clone)]
pub struct ScanTicket {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl ScanGate {
    /// Create a gate with no scans issued
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new scan, superseding all earlier tickets
    #[must_use]
    pub fn begin(&self) -> ScanTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        ScanTicket {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Supersede every outstanding ticket without starting a scan
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    /// Most recent generation issued
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

impl ScanTicket {
    /// Generation this ticket was issued for
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a newer scan has started since this one
    #[inline]
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        self.latest.load(Ordering::SeqCst) != self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_ticket_supersedes_older() {
        let gate = ScanGate::new();
        let first = gate.begin();
        assert!(!first.is_superseded());

        let second = gate.clone().begin();
        assert!(first.is_superseded());
        assert!(!second.is_superseded());
        assert_eq!(second.generation(), 2);
    }

    #[test]
    fn cancel_all_supersedes_without_new_ticket() {
        let gate = ScanGate::new();
        let ticket = gate.begin();
        gate.cancel_all();
        assert!(ticket.is_superseded());
        assert_eq!(gate.generation(), 2);
    }
}
