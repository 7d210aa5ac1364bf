//! Ready-quorum evaluation.

use tracing::warn;

use crate::{LobbyError, ParticipantRecord};

/// Why the gate is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateBlocker {
    NotEnoughPlayers { count: usize, min: usize },
    TooManyPlayers { count: usize, max: usize },
    NotAllReady { waiting: usize },
}

impl From<GateBlocker> for LobbyError {
    fn from(blocker: GateBlocker) -> Self {
        match blocker {
            GateBlocker::NotEnoughPlayers { count, min } => Self::NotEnoughPlayers { count, min },
            GateBlocker::TooManyPlayers { count, max } => Self::TooManyPlayers { count, max },
            GateBlocker::NotAllReady { waiting } => Self::NotAllReady { waiting },
        }
    }
}

/// Decides whether the session may start.
///
/// Open iff `min_players <= count <= max_players` and every record is
/// ready. An incremental ready counter is kept alongside as a cross-check
/// against the per-record scan; on disagreement the scan wins, the counter
/// is resynced and a warning is logged.
#[derive(Debug, Clone)]
pub struct ReadyGate {
    min_players: usize,
    max_players: usize,
    ready_count: usize,
    resyncs: u64,
}

impl ReadyGate {
    pub fn new(min_players: usize, max_players: usize) -> Self {
        Self {
            min_players,
            max_players,
            ready_count: 0,
            resyncs: 0,
        }
    }

    /// Record a ready flag flip.
    pub fn note_ready_changed(&mut self, ready: bool) {
        if ready {
            self.ready_count += 1;
        } else {
            self.ready_count = self.ready_count.saturating_sub(1);
        }
    }

    /// Record a participant leaving.
    pub fn note_removed(&mut self, was_ready: bool) {
        if was_ready {
            self.ready_count = self.ready_count.saturating_sub(1);
        }
    }

    /// Evaluates the gate against the authoritative records.
    pub fn check(&mut self, records: &[ParticipantRecord]) -> Result<(), GateBlocker> {
        let count = records.len();
        let scanned = records.iter().filter(|r| r.ready).count();
        if scanned != self.ready_count {
            warn!(
                counter = self.ready_count,
                scanned,
                participants = count,
                "ready counter out of sync with records, resyncing"
            );
            self.ready_count = scanned;
            self.resyncs += 1;
        }

        if count < self.min_players {
            return Err(GateBlocker::NotEnoughPlayers {
                count,
                min: self.min_players,
            });
        }
        if count > self.max_players {
            return Err(GateBlocker::TooManyPlayers {
                count,
                max: self.max_players,
            });
        }
        if scanned < count {
            return Err(GateBlocker::NotAllReady {
                waiting: count - scanned,
            });
        }
        Ok(())
    }

    pub fn all_ready(&mut self, records: &[ParticipantRecord]) -> bool {
        self.check(records).is_ok()
    }

    /// Incremental counter value (after the last resync).
    pub fn ready_count(&self) -> usize {
        self.ready_count
    }

    /// How many times a counter/scan mismatch forced a resync.
    pub fn resync_count(&self) -> u64 {
        self.resyncs
    }
}

#[cfg(test)]
mod tests {
    use paddock_protocol::ConnectionId;

    use super::*;

    fn records(ready: &[bool]) -> Vec<ParticipantRecord> {
        ready
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let mut record =
                    ParticipantRecord::new(ConnectionId::new(i as u64 + 1), format!("p{i}"), i);
                record.ready = *r;
                record
            })
            .collect()
    }

    fn gate_for(ready: &[bool]) -> ReadyGate {
        let mut gate = ReadyGate::new(2, 4);
        for r in ready.iter().filter(|r| **r) {
            gate.note_ready_changed(*r);
        }
        gate
    }

    #[test]
    fn test_open_when_all_ready_within_bounds() {
        let ready = [true, true, true];
        let mut gate = gate_for(&ready);
        assert!(gate.all_ready(&records(&ready)));
        assert_eq!(gate.resync_count(), 0);
    }

    #[test]
    fn test_blocked_by_unready_participant() {
        let ready = [true, false, true];
        let mut gate = gate_for(&ready);
        assert_eq!(
            gate.check(&records(&ready)),
            Err(GateBlocker::NotAllReady { waiting: 1 })
        );
    }

    #[test]
    fn test_blocked_by_bounds() {
        let one = [true];
        let mut gate = gate_for(&one);
        assert_eq!(
            gate.check(&records(&one)),
            Err(GateBlocker::NotEnoughPlayers { count: 1, min: 2 })
        );

        let five = [true; 5];
        let mut gate = gate_for(&five);
        assert_eq!(
            gate.check(&records(&five)),
            Err(GateBlocker::TooManyPlayers { count: 5, max: 4 })
        );
    }

    #[test]
    fn test_counter_drift_is_resynced_and_scan_wins() {
        let ready = [true, true];
        let mut gate = gate_for(&ready);
        // Simulate lost bookkeeping.
        gate.ready_count = 0;

        assert!(gate.all_ready(&records(&ready)));
        assert_eq!(gate.ready_count(), 2);
        assert_eq!(gate.resync_count(), 1);

        // Counter is consistent again: no further resync.
        assert!(gate.all_ready(&records(&ready)));
        assert_eq!(gate.resync_count(), 1);
    }

    #[test]
    fn test_overcounted_ready_does_not_open_gate() {
        let ready = [true, false];
        let mut gate = gate_for(&ready);
        gate.ready_count = 2;

        assert!(!gate.all_ready(&records(&ready)));
        assert_eq!(gate.ready_count(), 1);
        assert_eq!(gate.resync_count(), 1);
    }

    #[test]
    fn test_note_removed_keeps_counter_in_step() {
        let mut gate = gate_for(&[true, true, false]);
        gate.note_removed(true);
        gate.note_removed(false);
        assert_eq!(gate.ready_count(), 1);
    }

    #[test]
    fn test_blocker_maps_to_lobby_error() {
        let err: LobbyError = GateBlocker::NotAllReady { waiting: 2 }.into();
        assert_eq!(err, LobbyError::NotAllReady { waiting: 2 });
    }
}
