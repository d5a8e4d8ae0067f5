//! Future event scheduling.
//!
//! Each domain owner (a settlement, a vehicle) keeps its own
//! [`FutureEventQueue`]. Anything that wants to be woken at a simulated
//! instant implements [`ScheduledEventHandler`] and registers with the
//! owner's queue; the owner drives the queue from its clock pulse.
//!
//! The queue holds handlers by [`Weak`] reference. It never keeps a handler
//! alive: an entry whose handler has been dropped is discarded when it comes
//! due.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use marsim_types::MarsTime;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error};

use crate::clock::ClockPulse;

/// Behaviour woken by a [`FutureEventQueue`].
pub trait ScheduledEventHandler: Send + Sync {
    /// Human-readable description. Must not have side effects.
    fn event_description(&self) -> String;

    /// Run the behaviour for a due occurrence.
    ///
    /// A positive return value asks to be woken again that many millisols
    /// after `now`; zero or negative means done.
    fn execute(&self, now: &MarsTime) -> i32;
}

/// Observer view of one queued entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingEventInfo {
    /// When the entry comes due.
    pub due: MarsTime,
    /// The handler's description.
    pub description: String,
}

/// Entries and the insertion counter that breaks ties.
#[derive(Default)]
struct QueueInner {
    /// Entries keyed by due time, then insertion order.
    entries: BTreeMap<(MarsTime, u64), Weak<dyn ScheduledEventHandler>>,
    /// Sequence number for the next insertion.
    next_seq: u64,
}

impl QueueInner {
    fn insert(&mut self, due: MarsTime, handler: Weak<dyn ScheduledEventHandler>) {
        let seq = self.next_seq;
        self.next_seq = seq.wrapping_add(1);
        self.entries.insert((due, seq), handler);
    }
}

/// Time-ordered queue of pending callbacks for one domain owner.
pub struct FutureEventQueue {
    /// Owner name, for logs.
    owner: String,
    /// Entry map. Never held while a handler runs.
    inner: Mutex<QueueInner>,
    /// Held for the whole of a processing pass.
    processing: Mutex<()>,
}

impl std::fmt::Debug for FutureEventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureEventQueue")
            .field("owner", &self.owner)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl FutureEventQueue {
    /// Create an empty queue for the named owner.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            inner: Mutex::new(QueueInner::default()),
            processing: Mutex::new(()),
        }
    }

    /// Name of the owning domain.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Schedule `handler` to run at `when`.
    ///
    /// A time already in the past is accepted and fires on the next pass.
    /// Entries with the same due time run in insertion order.
    pub fn add_event(&self, when: MarsTime, handler: Weak<dyn ScheduledEventHandler>) {
        self.inner.lock().insert(when, handler);
    }

    /// Schedule `handler` to run `delay` millisols after `now`.
    pub fn add_event_in(
        &self,
        now: &MarsTime,
        delay: f64,
        handler: Weak<dyn ScheduledEventHandler>,
    ) {
        self.add_event(now.add_time(delay), handler);
    }

    /// Run every entry due at or before `now`, earliest first.
    ///
    /// The due set is taken in one step, so an entry that falls behind by
    /// several due times still runs once per entry, and anything scheduled
    /// during the pass waits for the next one. A positive handler result
    /// re-queues the handler at `now + result`.
    ///
    /// Returns the number of handlers executed.
    pub fn process_up_to(&self, now: &MarsTime) -> usize {
        let _processing = self.processing.lock();

        let due: Vec<((MarsTime, u64), Weak<dyn ScheduledEventHandler>)> = {
            let mut inner = self.inner.lock();
            let mut due = Vec::new();
            while let Some(entry) = inner.entries.first_entry() {
                if entry.key().0 > *now {
                    break;
                }
                due.push(entry.remove_entry());
            }
            due
        };

        let mut executed: usize = 0;
        for ((due_at, _seq), weak) in due {
            let Some(handler) = weak.upgrade() else {
                debug!(owner = self.owner, due = %due_at, "Discarding event whose handler is gone");
                continue;
            };

            executed = executed.saturating_add(1);
            match catch_unwind(AssertUnwindSafe(|| handler.execute(now))) {
                Ok(delay) if delay > 0 => {
                    self.add_event(now.add_time(f64::from(delay)), weak);
                }
                Ok(_) => {}
                Err(_panic) => {
                    error!(
                        owner = self.owner,
                        event = handler.event_description(),
                        due = %due_at,
                        "Scheduled event panicked; dropping it"
                    );
                }
            }
        }

        if executed > 0 {
            debug!(owner = self.owner, %now, executed, "Processed future events");
        }
        executed
    }

    /// Drive the queue from a clock pulse.
    pub fn time_passing(&self, pulse: &ClockPulse) -> usize {
        self.process_up_to(pulse.mars_time())
    }

    /// Snapshot of live entries in due order.
    pub fn pending_events(&self) -> Vec<PendingEventInfo> {
        let live: Vec<(MarsTime, Arc<dyn ScheduledEventHandler>)> = self
            .inner
            .lock()
            .entries
            .iter()
            .filter_map(|((due, _), weak)| weak.upgrade().map(|h| (*due, h)))
            .collect();
        live.into_iter()
            .map(|(due, handler)| PendingEventInfo {
                due,
                description: handler.event_description(),
            })
            .collect()
    }

    /// Due time of the earliest entry.
    pub fn next_due(&self) -> Option<MarsTime> {
        self.inner
            .lock()
            .entries
            .first_key_value()
            .map(|((due, _), _)| *due)
    }

    /// Number of queued entries, including ones whose handler is gone.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    type Log = Arc<Mutex<Vec<(String, MarsTime)>>>;

    /// Logs each execution and returns a fixed reschedule delay.
    struct Recorder {
        name: String,
        log: Log,
        reschedule: i32,
    }

    impl Recorder {
        fn new(name: &str, log: &Log, reschedule: i32) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                log: Arc::clone(log),
                reschedule,
            })
        }
    }

    impl ScheduledEventHandler for Recorder {
        fn event_description(&self) -> String {
            format!("recorder {}", self.name)
        }

        fn execute(&self, now: &MarsTime) -> i32 {
            self.log.lock().push((self.name.clone(), *now));
            self.reschedule
        }
    }

    struct Exploding;

    impl ScheduledEventHandler for Exploding {
        fn event_description(&self) -> String {
            "exploding".to_owned()
        }

        #[allow(clippy::panic)]
        fn execute(&self, _now: &MarsTime) -> i32 {
            panic!("handler blew up");
        }
    }

    fn t(millisols: f64) -> MarsTime {
        MarsTime::from_total_millisols(millisols)
    }

    /// Coerce a concrete handler into the queue's entry type.
    fn weak<T: ScheduledEventHandler + 'static>(
        handler: &Arc<T>,
    ) -> Weak<dyn ScheduledEventHandler> {
        let weak: Weak<T> = Arc::downgrade(handler);
        weak
    }

    fn names(log: &Log) -> Vec<String> {
        log.lock().iter().map(|(n, _)| n.clone()).collect()
    }

    #[test]
    fn executes_in_due_order_with_insertion_tiebreak() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let c = Recorder::new("c", &log, 0);
        let a = Recorder::new("a", &log, 0);
        let b1 = Recorder::new("b1", &log, 0);
        let b2 = Recorder::new("b2", &log, 0);
        queue.add_event(t(1030.0), weak(&c));
        queue.add_event(t(1010.0), weak(&a));
        queue.add_event(t(1020.0), weak(&b1));
        queue.add_event(t(1020.0), weak(&b2));

        assert_eq!(queue.process_up_to(&t(1100.0)), 4);
        assert_eq!(names(&log), vec!["a", "b1", "b2", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn nothing_runs_before_its_time() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let a = Recorder::new("a", &log, 0);
        queue.add_event(t(1500.0), weak(&a));

        assert_eq!(queue.process_up_to(&t(1499.9)), 0);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.process_up_to(&t(1500.0)), 1);
    }

    #[test]
    fn catch_up_runs_each_due_entry_once() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let repeating = Recorder::new("r", &log, 10);
        for due in [1100.0, 1110.0, 1120.0] {
            queue.add_event(t(due), weak(&repeating));
        }

        let now = t(1135.0);
        assert_eq!(queue.process_up_to(&now), 3);
        assert_eq!(log.lock().len(), 3);
        assert!(log.lock().iter().all(|(_, at)| *at == now));

        // Every entry was re-queued at now + 10.
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.next_due(), Some(t(1145.0)));
        assert_eq!(queue.process_up_to(&t(1144.0)), 0);
    }

    #[test]
    fn one_shot_is_removed() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let once = Recorder::new("once", &log, 0);
        let negative = Recorder::new("neg", &log, -5);
        queue.add_event(t(10.0), weak(&once));
        queue.add_event(t(10.0), weak(&negative));

        assert_eq!(queue.process_up_to(&t(20.0)), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.process_up_to(&t(5000.0)), 0);
    }

    #[test]
    fn past_due_time_fires_on_next_pass() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let late = Recorder::new("late", &log, 0);
        queue.add_event(t(1.0), weak(&late));
        assert_eq!(queue.process_up_to(&t(2000.0)), 1);
        assert_eq!(names(&log), vec!["late"]);
    }

    #[test]
    fn dropped_handler_is_discarded() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let gone = Recorder::new("gone", &log, 10);
        queue.add_event(t(10.0), weak(&gone));
        drop(gone);

        assert_eq!(queue.process_up_to(&t(20.0)), 0);
        assert!(queue.is_empty());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn panicking_handler_is_dropped_and_others_run() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let boom: Arc<dyn ScheduledEventHandler> = Arc::new(Exploding);
        let after = Recorder::new("after", &log, 0);
        queue.add_event(t(10.0), Arc::downgrade(&boom));
        queue.add_event(t(11.0), weak(&after));

        assert_eq!(queue.process_up_to(&t(20.0)), 2);
        assert_eq!(names(&log), vec!["after"]);
        assert!(queue.is_empty());
    }

    /// Schedules a follow-up on its own queue when executed.
    struct Chainer {
        queue: Arc<FutureEventQueue>,
        follow_up: Arc<Recorder>,
    }

    impl ScheduledEventHandler for Chainer {
        fn event_description(&self) -> String {
            "chainer".to_owned()
        }

        fn execute(&self, now: &MarsTime) -> i32 {
            self.queue.add_event(*now, weak(&self.follow_up));
            0
        }
    }

    #[test]
    fn handler_may_schedule_on_the_same_queue() {
        let log = Log::default();
        let queue = Arc::new(FutureEventQueue::new("Base"));
        let chainer = Arc::new(Chainer {
            queue: Arc::clone(&queue),
            follow_up: Recorder::new("follow", &log, 0),
        });
        queue.add_event(t(10.0), weak(&chainer));

        assert_eq!(queue.process_up_to(&t(10.0)), 1);
        assert!(log.lock().is_empty());
        assert_eq!(queue.process_up_to(&t(10.0)), 1);
        assert_eq!(names(&log), vec!["follow"]);
    }

    #[test]
    fn pending_events_lists_live_entries_in_order() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let late = Recorder::new("late", &log, 0);
        let early = Recorder::new("early", &log, 0);
        let gone = Recorder::new("gone", &log, 0);
        queue.add_event_in(&t(100.0), 50.0, weak(&late));
        queue.add_event(t(120.0), weak(&early));
        queue.add_event(t(130.0), weak(&gone));
        drop(gone);

        let pending = queue.pending_events();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending.first().unwrap().description, "recorder early");
        assert_eq!(pending.last().unwrap().due, t(150.0));
    }

    #[test]
    fn time_passing_uses_pulse_time() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let a = Recorder::new("a", &log, 0);
        queue.add_event(t(1005.0), weak(&a));
        let pulse = ClockPulse::new(1, 5.0, t(1005.0), chrono::Utc::now());
        assert_eq!(queue.time_passing(&pulse), 1);
    }

    #[test]
    fn concurrent_registration_loses_nothing() {
        let log = Log::default();
        let queue = FutureEventQueue::new("Base");
        let recorder = Recorder::new("r", &log, 0);
        std::thread::scope(|scope| {
            for worker in 0..4_u32 {
                let queue = &queue;
                let recorder = &recorder;
                scope.spawn(move || {
                    for i in 0..100_u32 {
                        let due = f64::from(worker.saturating_mul(1000).saturating_add(i));
                        queue.add_event(t(due), weak(recorder));
                    }
                });
            }
        });
        assert_eq!(queue.len(), 400);
        assert_eq!(queue.process_up_to(&t(10_000.0)), 400);
    }

    /// Counts its own executions.
    #[derive(Default)]
    struct Tally {
        runs: AtomicUsize,
    }

    impl ScheduledEventHandler for Tally {
        fn event_description(&self) -> String {
            "tally".to_owned()
        }

        fn execute(&self, _now: &MarsTime) -> i32 {
            self.runs.fetch_add(1, Ordering::SeqCst);
            0
        }
    }

    #[test]
    fn registration_during_a_pass_is_neither_lost_nor_repeated() {
        let queue = FutureEventQueue::new("Base");
        let tallies: Vec<Arc<Tally>> = (0..400).map(|_| Arc::new(Tally::default())).collect();
        let adding_done = AtomicBool::new(false);
        let horizon = t(10_000.0);

        std::thread::scope(|scope| {
            let queue = &queue;
            let adding_done = &adding_done;
            let horizon = &horizon;
            scope.spawn(move || {
                while !adding_done.load(Ordering::SeqCst) {
                    queue.process_up_to(horizon);
                }
            });

            let adders: Vec<_> = tallies
                .chunks(100)
                .zip(0..4_u32)
                .map(|(chunk, worker)| {
                    scope.spawn(move || {
                        for (tally, i) in chunk.iter().zip(0_u32..) {
                            let due = f64::from(worker.saturating_mul(1000).saturating_add(i));
                            queue.add_event(t(due), weak(tally));
                        }
                    })
                })
                .collect();
            for adder in adders {
                adder.join().unwrap();
            }
            adding_done.store(true, Ordering::SeqCst);
        });

        queue.process_up_to(&horizon);
        assert!(queue.is_empty());
        assert!(
            tallies
                .iter()
                .all(|tally| tally.runs.load(Ordering::SeqCst) == 1)
        );
    }
}
