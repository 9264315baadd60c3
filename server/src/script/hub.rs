//! Routes mechanic resolutions to the scripts waiting on them.

use super::ScriptError;
use crate::mechanics::Resolution;
use log::debug;
use shared::MechanicId;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// How long an unclaimed resolution is kept for a late waiter.
pub const RESOLUTION_RETENTION_MS: u64 = 30_000;

type Waiter = oneshot::Sender<Result<Resolution, ScriptError>>;

enum Slot {
    Pending(Vec<Waiter>),
    Resolved { resolution: Resolution, at: u64 },
}

pub struct ResolutionHub {
    slots: HashMap<MechanicId, Slot>,
    retention_ms: u64,
}

impl Default for ResolutionHub {
    fn default() -> Self {
        Self::new(RESOLUTION_RETENTION_MS)
    }
}

impl ResolutionHub {
    pub fn new(retention_ms: u64) -> Self {
        Self {
            slots: HashMap::new(),
            retention_ms,
        }
    }

    /// Announces a mechanic so waiters registering before it resolves are held.
    pub fn track(&mut self, id: MechanicId) {
        self.slots.entry(id).or_insert_with(|| Slot::Pending(Vec::new()));
    }

    /// Registers a waiter. A resolution that already landed is handed out
    /// immediately and consumed; an id the hub has never seen is an error.
    pub fn wait(&mut self, id: MechanicId, reply: Waiter) {
        match self.slots.remove(&id) {
            Some(Slot::Pending(mut waiters)) => {
                waiters.push(reply);
                self.slots.insert(id, Slot::Pending(waiters));
            }
            Some(Slot::Resolved { resolution, .. }) => {
                let _ = reply.send(Ok(resolution));
            }
            None => {
                let _ = reply.send(Err(ScriptError::UnknownMechanic(id)));
            }
        }
    }

    /// Delivers a resolution to every current waiter, or keeps it for the
    /// retention window when nobody is waiting yet.
    pub fn resolved(&mut self, resolution: Resolution, now: u64) {
        let id = resolution.mechanic_id;
        match self.slots.remove(&id) {
            Some(Slot::Pending(waiters)) if !waiters.is_empty() => {
                debug!("Delivering resolution of {} to {} waiters", id, waiters.len());
                for waiter in waiters {
                    let _ = waiter.send(Ok(resolution.clone()));
                }
            }
            _ => {
                self.slots
                    .insert(id, Slot::Resolved { resolution, at: now });
            }
        }
    }

    /// Drops unclaimed resolutions older than the retention window.
    pub fn prune(&mut self, now: u64) {
        let retention = self.retention_ms;
        self.slots.retain(|_, slot| match slot {
            Slot::Pending(_) => true,
            Slot::Resolved { at, .. } => now.saturating_sub(*at) <= retention,
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanics::ResolutionOutcome;
    use shared::MechanicType;

    fn resolution(id: MechanicId) -> Resolution {
        Resolution {
            mechanic_id: id,
            mechanic_type: MechanicType::Chariot,
            resolved_at: 100,
            hits: vec![1],
            outcome: ResolutionOutcome::None,
        }
    }

    #[test]
    fn test_every_early_waiter_gets_it_once() {
        let mut hub = ResolutionHub::default();
        hub.track(1);
        let (tx_a, mut rx_a) = oneshot::channel();
        let (tx_b, mut rx_b) = oneshot::channel();
        hub.wait(1, tx_a);
        hub.wait(1, tx_b);

        hub.resolved(resolution(1), 100);
        assert_eq!(rx_a.try_recv().unwrap(), Ok(resolution(1)));
        assert_eq!(rx_b.try_recv().unwrap(), Ok(resolution(1)));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_late_waiter_is_served_from_retention() {
        let mut hub = ResolutionHub::default();
        hub.track(1);
        hub.resolved(resolution(1), 100);

        let (tx, mut rx) = oneshot::channel();
        hub.wait(1, tx);
        assert_eq!(rx.try_recv().unwrap(), Ok(resolution(1)));

        // Consumed by the first late waiter.
        let (tx, mut rx) = oneshot::channel();
        hub.wait(1, tx);
        assert_eq!(rx.try_recv().unwrap(), Err(ScriptError::UnknownMechanic(1)));
    }

    #[test]
    fn test_unknown_mechanic() {
        let mut hub = ResolutionHub::default();
        let (tx, mut rx) = oneshot::channel();
        hub.wait(77, tx);
        assert_eq!(rx.try_recv().unwrap(), Err(ScriptError::UnknownMechanic(77)));
    }

    #[test]
    fn test_prune_drops_only_stale_resolutions() {
        let mut hub = ResolutionHub::new(1_000);
        hub.track(1);
        hub.track(2);
        hub.resolved(resolution(1), 0);

        hub.prune(1_000);
        assert_eq!(hub.len(), 2);
        hub.prune(1_001);
        assert_eq!(hub.len(), 1);

        let (tx, mut rx) = oneshot::channel();
        hub.wait(1, tx);
        assert!(rx.try_recv().unwrap().is_err());
    }
}
