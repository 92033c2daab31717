//! Call state tracking
//!
//! Keeps one record per caller and turns notification-level observations
//! (post and removal) into call lifecycle events. The OS gives no reliable
//! "call answered" or "call missed" signal, so both are inferred:
//!
//! - A removal while still ringing means the call was missed.
//! - A removal after the call went ongoing means it was answered and then
//!   hung up; nothing is relayed for that.
//! - Outgoing calls are detected from dialing-style texts ("Calling..."),
//!   either on the observation itself or within a short window before an
//!   unanswered Incoming->Ongoing transition. Their removal relays ENDED.
//!
//! MISSED is deduplicated per caller inside a 30 s window because dialers
//! repost the missed-call notification while updating the shade.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::{CallKey, CallState, PhoneCallEvent};

const MISSED_DEDUP_WINDOW: Duration = Duration::from_secs(30);
const DEDUP_PRUNE_AFTER: Duration = Duration::from_secs(60);
const DIALING_WINDOW: Duration = Duration::from_secs(5);
const RECORD_IDLE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug)]
struct CallRecord {
    state: CallState,
    answered: bool,
    outgoing: bool,
    answered_at: Option<Instant>,
    last_seen: Instant,
}

/// Per-caller call lifecycle tracker
pub struct CallStateTracker {
    records: HashMap<CallKey, CallRecord>,
    missed_sent: HashMap<CallKey, Instant>,
    last_dialing: Option<Instant>,
}

impl CallStateTracker {
    pub fn new() -> Self {
        CallStateTracker {
            records: HashMap::new(),
            missed_sent: HashMap::new(),
            last_dialing: None,
        }
    }

    /// Record that a dialing-style text was just seen, opening the
    /// corrected-outgoing window
    pub fn note_dialing(&mut self, now: Instant) {
        self.last_dialing = Some(now);
    }

    fn dialing_recently(&self, now: Instant) -> bool {
        self.last_dialing
            .map(|t| now.saturating_duration_since(t) < DIALING_WINDOW)
            .unwrap_or(false)
    }

    /// Feed one posted-notification observation. Returns the lifecycle
    /// events to relay (zero or one; repeats of the same state are silent).
    pub fn observe(
        &mut self,
        key: CallKey,
        state: CallState,
        outgoing_hint: bool,
        now: Instant,
    ) -> Vec<PhoneCallEvent> {
        self.evict_idle(now);
        if outgoing_hint {
            self.note_dialing(now);
        }

        match state {
            CallState::Incoming => self.on_incoming(key, now),
            CallState::Ongoing => self.on_ongoing(key, outgoing_hint, now),
            CallState::Missed => self.on_missed(key, now),
            // An explicit "call ended" text is the same terminal signal as a
            // removal and takes the same path
            CallState::Ended => self.conclude(&key, now),
        }
    }

    /// Feed a removal observation for a caller
    pub fn observe_removed(&mut self, key: &CallKey, now: Instant) -> Vec<PhoneCallEvent> {
        self.evict_idle(now);
        self.conclude(key, now)
    }

    /// Terminal signal for a call: decide between MISSED, ENDED, and silence
    fn conclude(&mut self, key: &CallKey, now: Instant) -> Vec<PhoneCallEvent> {
        let Some(record) = self.records.remove(key) else {
            debug!(caller = key.display_name(), "terminal signal for untracked call");
            return Vec::new();
        };

        if record.outgoing {
            return vec![PhoneCallEvent {
                key: key.clone(),
                state: CallState::Ended,
                duration_secs: duration_since(record.answered_at, now),
            }];
        }
        if !record.answered {
            return self.emit_missed(key.clone(), now).into_iter().collect();
        }
        // An answered call ending is not worth a glance at the bars
        Vec::new()
    }

    fn on_incoming(&mut self, key: CallKey, now: Instant) -> Vec<PhoneCallEvent> {
        if let Some(record) = self.records.get_mut(&key) {
            record.last_seen = now;
            if record.state == CallState::Incoming {
                return Vec::new();
            }
        }
        self.records.insert(
            key.clone(),
            CallRecord {
                state: CallState::Incoming,
                answered: false,
                outgoing: false,
                answered_at: None,
                last_seen: now,
            },
        );
        vec![PhoneCallEvent {
            key,
            state: CallState::Incoming,
            duration_secs: 0,
        }]
    }

    fn on_ongoing(&mut self, key: CallKey, outgoing_hint: bool, now: Instant) -> Vec<PhoneCallEvent> {
        let corrected = outgoing_hint || self.dialing_recently(now);

        if let Some(record) = self.records.get_mut(&key) {
            record.last_seen = now;
            if record.state == CallState::Ongoing {
                return Vec::new();
            }
            // Ringing went ongoing: answered, unless dialing context says
            // this was our own outgoing call all along
            record.state = CallState::Ongoing;
            record.outgoing = corrected;
            record.answered = !corrected;
            record.answered_at = Some(now);
        } else {
            // Ongoing with no ring seen means the call originated here
            self.records.insert(
                key.clone(),
                CallRecord {
                    state: CallState::Ongoing,
                    answered: false,
                    outgoing: true,
                    answered_at: Some(now),
                    last_seen: now,
                },
            );
        }
        vec![PhoneCallEvent {
            key,
            state: CallState::Ongoing,
            duration_secs: 0,
        }]
    }

    fn on_missed(&mut self, key: CallKey, now: Instant) -> Vec<PhoneCallEvent> {
        self.records.insert(
            key.clone(),
            CallRecord {
                state: CallState::Missed,
                answered: false,
                outgoing: false,
                answered_at: None,
                last_seen: now,
            },
        );
        self.emit_missed(key, now).into_iter().collect()
    }

    /// MISSED with per-caller dedup. The sent map is pruned lazily; entries
    /// older than a minute can never suppress anything again.
    fn emit_missed(&mut self, key: CallKey, now: Instant) -> Option<PhoneCallEvent> {
        self.missed_sent
            .retain(|_, sent| now.saturating_duration_since(*sent) < DEDUP_PRUNE_AFTER);

        if let Some(sent) = self.missed_sent.get(&key) {
            if now.saturating_duration_since(*sent) < MISSED_DEDUP_WINDOW {
                debug!(caller = key.display_name(), "suppressing duplicate missed call");
                return None;
            }
        }
        self.missed_sent.insert(key.clone(), now);
        Some(PhoneCallEvent {
            key,
            state: CallState::Missed,
            duration_secs: 0,
        })
    }

    /// Drop records nothing has touched for a long time; a removal we never
    /// saw must not pin memory forever
    fn evict_idle(&mut self, now: Instant) {
        self.records
            .retain(|_, r| now.saturating_duration_since(r.last_seen) < RECORD_IDLE_TTL);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.records.len()
    }
}

impl Default for CallStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn duration_since(start: Option<Instant>, now: Instant) -> u64 {
    start
        .map(|t| now.saturating_duration_since(t).as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn alice() -> CallKey {
        CallKey::new(Some("Alice".to_string()), None).expect("key")
    }

    fn bob() -> CallKey {
        CallKey::new(Some("Bob".to_string()), None).expect("key")
    }

    fn at(base: Instant, secs: u64) -> Instant {
        base + Duration::from_secs(secs)
    }

    #[test]
    fn test_unanswered_removal_is_missed() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        let events = tracker.observe(alice(), CallState::Incoming, false, base);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Incoming);

        let events = tracker.observe_removed(&alice(), at(base, 10));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Missed);
    }

    #[test]
    fn test_answered_removal_is_silent() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Incoming, false, base);
        let events = tracker.observe(alice(), CallState::Ongoing, false, at(base, 10));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ongoing);

        let events = tracker.observe_removed(&alice(), at(base, 70));
        assert!(events.is_empty());
    }

    #[test]
    fn test_repeated_state_is_silent() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        assert_eq!(tracker.observe(alice(), CallState::Incoming, false, base).len(), 1);
        assert!(tracker
            .observe(alice(), CallState::Incoming, false, at(base, 1))
            .is_empty());
    }

    #[test]
    fn test_missed_dedup_within_window() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        let events = tracker.observe(alice(), CallState::Missed, false, base);
        assert_eq!(events.len(), 1);

        // Dialer reposts the missed-call notification seconds later
        let events = tracker.observe(alice(), CallState::Missed, false, at(base, 5));
        assert!(events.is_empty());

        // Outside the window it relays again
        let events = tracker.observe(alice(), CallState::Missed, false, at(base, 31));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_missed_dedup_is_per_caller() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        assert_eq!(tracker.observe(alice(), CallState::Missed, false, base).len(), 1);
        assert_eq!(
            tracker.observe(bob(), CallState::Missed, false, at(base, 1)).len(),
            1
        );
    }

    #[test]
    fn test_outgoing_hint_removal_is_ended() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        let events = tracker.observe(alice(), CallState::Ongoing, true, base);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ongoing);

        let events = tracker.observe_removed(&alice(), at(base, 42));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ended);
        assert_eq!(events[0].duration_secs, 42);
    }

    #[test]
    fn test_dialing_window_corrects_incoming_to_outgoing() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Incoming, false, base);
        tracker.note_dialing(at(base, 1));

        // Ongoing arrives without its own hint, but the window is open
        tracker.observe(alice(), CallState::Ongoing, false, at(base, 3));
        let events = tracker.observe_removed(&alice(), at(base, 60));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ended);
    }

    #[test]
    fn test_dialing_window_expires() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.note_dialing(base);
        tracker.observe(alice(), CallState::Incoming, false, at(base, 1));

        // Past the window the transition counts as answered
        tracker.observe(alice(), CallState::Ongoing, false, at(base, 10));
        assert!(tracker.observe_removed(&alice(), at(base, 60)).is_empty());
    }

    #[test]
    fn test_ongoing_without_incoming_never_missed() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        let events = tracker.observe(alice(), CallState::Ongoing, false, base);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ongoing);

        let events = tracker.observe_removed(&alice(), at(base, 30));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ended);
    }

    #[test]
    fn test_explicit_ended_outgoing_reports_duration() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Ongoing, true, base);
        let events = tracker.observe(alice(), CallState::Ended, false, at(base, 60));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Ended);
        assert_eq!(events[0].duration_secs, 60);
    }

    #[test]
    fn test_explicit_ended_unanswered_routes_missed() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Incoming, false, base);
        let events = tracker.observe(alice(), CallState::Ended, false, at(base, 20));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, CallState::Missed);
    }

    #[test]
    fn test_explicit_ended_after_answer_is_silent() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Incoming, false, base);
        tracker.observe(alice(), CallState::Ongoing, false, at(base, 5));
        assert!(tracker
            .observe(alice(), CallState::Ended, false, at(base, 65))
            .is_empty());
    }

    #[test]
    fn test_idle_records_evicted() {
        let mut tracker = CallStateTracker::new();
        let base = Instant::now();

        tracker.observe(alice(), CallState::Incoming, false, base);
        assert_eq!(tracker.tracked(), 1);

        // A removal we never saw; the next observation is long after
        let events = tracker.observe_removed(&alice(), at(base, 16 * 60));
        assert!(events.is_empty());
        assert_eq!(tracker.tracked(), 0);
    }

    #[test]
    fn test_removal_of_unknown_caller_is_silent() {
        let mut tracker = CallStateTracker::new();
        assert!(tracker.observe_removed(&alice(), Instant::now()).is_empty());
    }
}
