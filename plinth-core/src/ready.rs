//! Per-store readiness gate.
//!
//! Each store registers a one-shot readiness signal at startup. Requests
//! that arrive before the store's initializer has resolved park inside
//! [`ReadyGate::wait`]; the first `ready`/`failed` call fixes the outcome
//! for every concurrent and future waiter. The transitions are monotonic:
//! `Pending -> Ready` or `Pending -> Failed`, nothing else.

use std::collections::HashMap;

use tokio::sync::watch;

/// Identifies one of the backing stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Relational,
    Document,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Relational => write!(f, "relational"),
            StoreKind::Document => write!(f, "document"),
        }
    }
}

/// Lifecycle of a store, as observed through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Pending,
    Ready,
    Failed(String),
}

/// Resolving half of a store's readiness signal.
///
/// Resolves at most once: after the first `ready()` or `failed()` every
/// later call is a no-op, so the terminal state never regresses.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<ReadinessState>,
}

impl ReadySignal {
    pub fn ready(&self) {
        self.resolve(ReadinessState::Ready);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.resolve(ReadinessState::Failed(reason.into()));
    }

    fn resolve(&self, outcome: ReadinessState) {
        self.tx.send_if_modified(|state| {
            if *state == ReadinessState::Pending {
                *state = outcome;
                true
            } else {
                false
            }
        });
    }
}

/// The gate itself: one watch cell per registered store.
#[derive(Debug, Default)]
pub struct ReadyGate {
    cells: HashMap<StoreKind, watch::Receiver<ReadinessState>>,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store and hand back its one-shot signal. Called once per
    /// store during wiring, before the gate is shared.
    pub fn register(&mut self, kind: StoreKind) -> ReadySignal {
        let (tx, rx) = watch::channel(ReadinessState::Pending);
        self.cells.insert(kind, rx);
        ReadySignal { tx }
    }

    /// Current state without waiting.
    pub fn snapshot(&self, kind: StoreKind) -> ReadinessState {
        match self.cells.get(&kind) {
            Some(rx) => rx.borrow().clone(),
            // Unregistered stores gate nothing.
            None => ReadinessState::Ready,
        }
    }

    /// Suspend until the store's outcome is known.
    ///
    /// A store that was never registered resolves immediately with `Ok` -
    /// callers unaware of a given store are not gated by it. A `Failed`
    /// outcome (including an initializer that vanished while pending) is
    /// returned to every waiter; nobody is left hanging.
    pub async fn wait(&self, kind: StoreKind) -> Result<(), String> {
        let Some(cell) = self.cells.get(&kind) else {
            return Ok(());
        };
        let mut rx = cell.clone();
        loop {
            match &*rx.borrow() {
                ReadinessState::Ready => return Ok(()),
                ReadinessState::Failed(reason) => return Err(reason.clone()),
                ReadinessState::Pending => {}
            }
            if rx.changed().await.is_err() {
                return Err(format!("{kind} store initializer dropped while pending"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn unregistered_store_is_not_gated() {
        let gate = ReadyGate::new();
        assert_eq!(gate.wait(StoreKind::Relational).await, Ok(()));
    }

    #[tokio::test]
    async fn waiters_park_until_ready() {
        let mut gate = ReadyGate::new();
        let signal = gate.register(StoreKind::Relational);
        let gate = Arc::new(gate);

        let waiter = tokio::spawn({
            let gate = gate.clone();
            async move { gate.wait(StoreKind::Relational).await }
        });

        // Still pending: the waiter must not have resolved.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        signal.ready();
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn failure_propagates_to_all_waiters() {
        let mut gate = ReadyGate::new();
        let signal = gate.register(StoreKind::Document);
        let gate = Arc::new(gate);

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.wait(StoreKind::Document).await })
            })
            .collect();

        signal.failed("disk on fire");

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Err("disk on fire".to_string()));
        }
        // Late callers see the cached outcome too.
        assert_eq!(
            gate.wait(StoreKind::Document).await,
            Err("disk on fire".to_string())
        );
    }

    #[tokio::test]
    async fn first_resolution_wins() {
        let mut gate = ReadyGate::new();
        let signal = gate.register(StoreKind::Relational);

        signal.ready();
        signal.failed("too late");

        assert_eq!(gate.snapshot(StoreKind::Relational), ReadinessState::Ready);
        assert_eq!(gate.wait(StoreKind::Relational).await, Ok(()));
    }

    #[tokio::test]
    async fn dropped_signal_fails_waiters_instead_of_hanging() {
        let mut gate = ReadyGate::new();
        let signal = gate.register(StoreKind::Document);
        drop(signal);

        let err = gate.wait(StoreKind::Document).await.unwrap_err();
        assert!(err.contains("dropped while pending"), "got: {err}");
    }
}
