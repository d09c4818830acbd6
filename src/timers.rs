use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Timeout,
    Interval,
}

/// What a timer does when it fires. Handlers re-validate the ids carried here
/// against current state before mutating anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerAction {
    StartRound,
    RoundFailsafe { round_id: u64 },
    DismissProtestors { region_id: usize },
    CountdownTick,
    SpeedStep,
}

#[derive(Clone, Debug)]
struct TrackedTimer {
    kind: TimerKind,
    action: TimerAction,
    duration_ms: u64,
    remaining_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FiredTimer {
    pub id: TimerId,
    pub action: TimerAction,
}

/// Single owner of every scheduled callback in a session.
#[derive(Clone, Debug, Default)]
pub struct TimerLedger {
    timers: BTreeMap<TimerId, TrackedTimer>,
    next_id: u64,
}

impl TimerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, kind: TimerKind, action: TimerAction, duration_ms: u64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let duration_ms = match kind {
            TimerKind::Interval => duration_ms.max(1),
            TimerKind::Timeout => duration_ms,
        };
        self.timers.insert(
            id,
            TrackedTimer {
                kind,
                action,
                duration_ms,
                remaining_ms: duration_ms,
            },
        );
        id
    }

    pub fn timeout(&mut self, action: TimerAction, delay_ms: u64) -> TimerId {
        self.track(TimerKind::Timeout, action, delay_ms)
    }

    pub fn interval(&mut self, action: TimerAction, period_ms: u64) -> TimerId {
        self.track(TimerKind::Interval, action, period_ms)
    }

    /// Returns false when the timer already fired or was cancelled.
    pub fn untrack(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn flush_all(&mut self) -> usize {
        let flushed = self.timers.len();
        self.timers.clear();
        flushed
    }

    pub fn is_tracked(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn kind_of(&self, id: TimerId) -> Option<TimerKind> {
        self.timers.get(&id).map(|timer| timer.kind)
    }

    pub fn remaining_ms(&self, id: TimerId) -> Option<u64> {
        self.timers.get(&id).map(|timer| timer.remaining_ms)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Resume semantics: every outstanding timer starts its full duration over.
    pub fn restart_all(&mut self) {
        for timer in self.timers.values_mut() {
            timer.remaining_ms = timer.duration_ms;
        }
    }

    /// Advances the clock and returns fired timers in due order. Timeouts are
    /// untracked before they are returned; intervals re-arm and may fire more
    /// than once when `dt_ms` spans several periods.
    pub fn advance(&mut self, dt_ms: u64) -> Vec<FiredTimer> {
        let mut due: Vec<(u64, TimerId, TimerAction)> = Vec::new();
        let mut expired = Vec::new();

        for (id, timer) in self.timers.iter_mut() {
            if timer.remaining_ms > dt_ms {
                timer.remaining_ms -= dt_ms;
                continue;
            }
            match timer.kind {
                TimerKind::Timeout => {
                    due.push((timer.remaining_ms, *id, timer.action));
                    expired.push(*id);
                }
                TimerKind::Interval => {
                    let mut offset = timer.remaining_ms;
                    while offset <= dt_ms {
                        due.push((offset, *id, timer.action));
                        offset += timer.duration_ms;
                    }
                    timer.remaining_ms = offset - dt_ms;
                }
            }
        }

        for id in expired {
            self.timers.remove(&id);
        }

        due.sort_by_key(|(offset, id, _)| (*offset, *id));
        due.into_iter()
            .map(|(_, id, action)| FiredTimer { id, action })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_fires_once_and_is_untracked() {
        let mut ledger = TimerLedger::new();
        let id = ledger.timeout(TimerAction::StartRound, 100);

        assert!(ledger.advance(99).is_empty());
        let fired = ledger.advance(1);
        assert_eq!(
            fired,
            vec![FiredTimer {
                id,
                action: TimerAction::StartRound
            }]
        );
        assert!(!ledger.is_tracked(id));
        assert!(ledger.advance(1_000).is_empty());
    }

    #[test]
    fn interval_rearms_and_catches_up() {
        let mut ledger = TimerLedger::new();
        let id = ledger.interval(TimerAction::CountdownTick, 1_000);

        assert_eq!(ledger.advance(2_500).len(), 2);
        assert!(ledger.is_tracked(id));
        assert_eq!(ledger.remaining_ms(id), Some(500));
        assert_eq!(ledger.advance(500).len(), 1);
    }

    #[test]
    fn fired_order_follows_due_time_then_id() {
        let mut ledger = TimerLedger::new();
        let late = ledger.timeout(TimerAction::StartRound, 80);
        let early = ledger.timeout(TimerAction::RoundFailsafe { round_id: 1 }, 20);
        let tie = ledger.timeout(TimerAction::DismissProtestors { region_id: 0 }, 80);

        let ids: Vec<TimerId> = ledger.advance(100).into_iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![early, late, tie]);
    }

    #[test]
    fn untrack_cancels_and_reports_staleness() {
        let mut ledger = TimerLedger::new();
        let id = ledger.timeout(TimerAction::StartRound, 10);
        assert!(ledger.untrack(id));
        assert!(!ledger.untrack(id));
        assert!(ledger.advance(50).is_empty());
    }

    #[test]
    fn flush_all_cancels_everything() {
        let mut ledger = TimerLedger::new();
        ledger.timeout(TimerAction::StartRound, 10);
        ledger.interval(TimerAction::SpeedStep, 10);
        assert_eq!(ledger.flush_all(), 2);
        assert!(ledger.is_empty());
        assert!(ledger.advance(100).is_empty());
    }

    #[test]
    fn restart_all_resets_to_full_duration() {
        let mut ledger = TimerLedger::new();
        let id = ledger.timeout(TimerAction::StartRound, 1_000);
        ledger.advance(900);
        assert_eq!(ledger.remaining_ms(id), Some(100));
        ledger.restart_all();
        assert_eq!(ledger.remaining_ms(id), Some(1_000));
        assert!(ledger.advance(999).is_empty());
        assert_eq!(ledger.advance(1).len(), 1);
    }

    #[test]
    fn zero_delay_timeout_fires_on_next_advance() {
        let mut ledger = TimerLedger::new();
        ledger.timeout(TimerAction::StartRound, 0);
        assert_eq!(ledger.advance(0).len(), 1);
    }
}
