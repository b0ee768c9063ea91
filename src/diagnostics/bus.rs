//! Diagnostic bus (C10): de-duplicates, orders, and delivers findings with
//! bounded backpressure so a check running far ahead of the consumer can't
//! grow memory without bound (`spec.md` §4.6-4.7).

use std::collections::HashSet;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};

use tracing::warn;

use super::Diagnostic;

/// Default bound on the number of diagnostics buffered between producers
/// (checks/CTU) and the consumer (suppression engine / driver).
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Producer handle. Cloned once per worker; `publish` blocks the calling
/// worker once the bus is full, which is the backpressure mechanism — there
/// is no unbounded queue for a pathological check to fill.
#[derive(Clone)]
pub struct DiagnosticBusSender {
    tx: SyncSender<Diagnostic>,
}

impl DiagnosticBusSender {
    /// Send a diagnostic, blocking if the bus is at capacity.
    pub fn publish(&self, diagnostic: Diagnostic) -> Result<(), Diagnostic> {
        self.tx.send(diagnostic).map_err(|e| e.0)
    }

    /// Non-blocking publish used by cancellation-aware callers that would
    /// rather drop a diagnostic than stall past a deadline.
    pub fn try_publish(&self, diagnostic: Diagnostic) -> Result<(), Diagnostic> {
        match self.tx.try_send(diagnostic) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(d)) => Err(d),
            Err(TrySendError::Disconnected(d)) => Err(d),
        }
    }
}

/// Consumer side: drains raw diagnostics from every producer, de-duplicates
/// by [`Diagnostic::dedup_hash`], and returns them in the deterministic
/// order from [`Diagnostic::order_key`] — the same order regardless of how
/// many worker threads produced them or in what order they arrived.
pub struct DiagnosticBus {
    rx: Receiver<Diagnostic>,
    seen: HashSet<u64>,
}

impl DiagnosticBus {
    pub fn new(capacity: usize) -> (DiagnosticBusSender, Self) {
        let (tx, rx) = sync_channel(capacity.max(1));
        (
            DiagnosticBusSender { tx },
            DiagnosticBus {
                rx,
                seen: HashSet::new(),
            },
        )
    }

    /// Drain everything currently queued (producers must all have been
    /// dropped, or this blocks until they are), de-dup, and sort.
    pub fn drain_sorted(mut self) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        while let Ok(diag) = self.rx.recv() {
            let hash = diag.dedup_hash();
            if self.seen.insert(hash) {
                out.push(diag);
            } else {
                warn!(id = %diag.id, line = diag.line, "dropped duplicate diagnostic");
            }
        }
        out.sort_by(|a, b| {
            a.order_key()
                .0
                .cmp(&b.order_key().0)
                .then(a.order_key().1.cmp(&b.order_key().1))
                .then(a.order_key().2.cmp(&b.order_key().2))
                .then(a.order_key().3.cmp(b.order_key().3))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Certainty, Severity};
    use crate::ids::FileIndex;

    fn diag(id: &str, line: u32) -> Diagnostic {
        Diagnostic::new(id, Severity::Warning, Certainty::Definite, FileIndex::PRIMARY, line, 1, "msg")
    }

    #[test]
    fn deduplicates_identical_findings() {
        let (tx, bus) = DiagnosticBus::new(16);
        tx.publish(diag("nullPointer", 10)).unwrap();
        tx.publish(diag("nullPointer", 10)).unwrap();
        drop(tx);
        let out = bus.drain_sorted();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn orders_by_line_then_id() {
        let (tx, bus) = DiagnosticBus::new(16);
        tx.publish(diag("zerodiv", 20)).unwrap();
        tx.publish(diag("nullPointer", 10)).unwrap();
        tx.publish(diag("arrayIndexOutOfBounds", 10)).unwrap();
        drop(tx);
        let out = bus.drain_sorted();
        let ids: Vec<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["arrayIndexOutOfBounds", "nullPointer", "zerodiv"]);
    }

    #[test]
    fn backpressure_blocks_when_full() {
        let (tx, bus) = DiagnosticBus::new(1);
        tx.publish(diag("a", 1)).unwrap();
        // A second blocking publish would stall with no consumer; use
        // try_publish to observe backpressure without deadlocking the test.
        let overflow = tx.try_publish(diag("b", 2));
        assert!(overflow.is_err());
        drop(tx);
        let out = bus.drain_sorted();
        assert_eq!(out.len(), 1);
    }
}
