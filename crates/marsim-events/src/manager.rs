//! The historical event manager.
//!
//! One manager exists per simulation run and is shared by `Arc` handle with
//! every producer (activities, missions, malfunctions) and every observer.
//!
//! # Concurrency
//!
//! - The record buffer sits behind a lock that is never held while
//!   listeners run.
//! - The listener set is copy-on-write: notification iterates an `Arc`
//!   snapshot, so listeners may be added or removed (even by a listener)
//!   during an in-flight notification.
//! - A listener that errors or panics is logged and skipped.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use marsim_types::{EventId, MarsTime, MarsTimeSource};
use parking_lot::RwLock;
use tracing::{debug, error};

use crate::config::HistoryConfig;
use crate::error::HistoryListenerError;
use crate::event::{HistoricalEvent, HistoricalRecord};

/// Observer of newly recorded history.
pub trait HistoricalEventListener: Send + Sync {
    /// Called synchronously after a record has been appended.
    fn on_event_added(&self, record: &HistoricalRecord) -> Result<(), HistoryListenerError>;
}

/// What happened to an event handed to [`HistoricalEventManager::register_new_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Stamped and appended.
    Recorded(Arc<HistoricalRecord>),
    /// An identical event is already in the buffer.
    Duplicate,
    /// The event's category or type is configured as noise.
    Filtered,
}

impl RegisterOutcome {
    /// Whether the event was appended.
    pub const fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    /// The appended record, if any.
    pub const fn record(&self) -> Option<&Arc<HistoricalRecord>> {
        match self {
            Self::Recorded(record) => Some(record),
            Self::Duplicate | Self::Filtered => None,
        }
    }
}

/// Bounded, deduplicating log of notable occurrences.
pub struct HistoricalEventManager {
    /// Timestamp source (the master clock in production).
    clock: Arc<dyn MarsTimeSource>,
    /// Capacity and noise filters.
    config: HistoryConfig,
    /// Records, oldest first.
    records: RwLock<VecDeque<Arc<HistoricalRecord>>>,
    /// Copy-on-write listener snapshot.
    listeners: RwLock<Arc<Vec<Arc<dyn HistoricalEventListener>>>>,
}

impl std::fmt::Debug for HistoricalEventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoricalEventManager")
            .field("config", &self.config)
            .field("len", &self.len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl HistoricalEventManager {
    /// Create an empty manager that stamps records from `clock`.
    pub fn new(clock: Arc<dyn MarsTimeSource>, config: HistoryConfig) -> Self {
        let capacity = config.effective_capacity();
        Self {
            clock,
            config,
            records: RwLock::new(VecDeque::with_capacity(capacity)),
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Register a new event.
    ///
    /// Noise is dropped, exact duplicates of a buffered record are
    /// suppressed, and anything else is stamped with the current simulated
    /// time, appended (evicting the oldest record past capacity) and
    /// delivered to every listener in registration order.
    pub fn register_new_event(&self, event: HistoricalEvent) -> RegisterOutcome {
        if self.config.is_ignored(&event) {
            debug!(
                event_type = ?event.event_type,
                category = ?event.category,
                "Historical event filtered as noise"
            );
            return RegisterOutcome::Filtered;
        }

        let timestamp = self.clock.mars_time();
        let record = {
            let mut records = self.records.write();
            if records.iter().any(|r| r.event.is_duplicate_of(&event)) {
                debug!(
                    event_type = ?event.event_type,
                    source = %event.source,
                    "Duplicate historical event suppressed"
                );
                return RegisterOutcome::Duplicate;
            }

            let record = Arc::new(HistoricalRecord {
                id: EventId::new(),
                timestamp,
                event,
            });
            records.push_back(Arc::clone(&record));
            let capacity = self.config.effective_capacity();
            while records.len() > capacity {
                records.pop_front();
            }
            record
        };

        debug!(
            event_type = ?record.event.event_type,
            %timestamp,
            source = %record.event.source,
            "Historical event recorded"
        );
        self.notify(&record);
        RegisterOutcome::Recorded(record)
    }

    /// Deliver a record to a snapshot of the listener set.
    fn notify(&self, record: &HistoricalRecord) {
        let snapshot = Arc::clone(&*self.listeners.read());
        for listener in snapshot.iter() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event_added(record))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(record_id = %record.id, error = %e, "History listener failed");
                }
                Err(_panic) => {
                    error!(record_id = %record.id, "History listener panicked");
                }
            }
        }
    }

    /// Add a listener. Adding the same listener twice is a no-op.
    ///
    /// Returns `true` if the listener was added.
    pub fn add_listener(&self, listener: Arc<dyn HistoricalEventListener>) -> bool {
        let mut guard = self.listeners.write();
        if guard.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        let mut next = Vec::with_capacity(guard.len().saturating_add(1));
        next.extend(guard.iter().cloned());
        next.push(listener);
        *guard = Arc::new(next);
        true
    }

    /// Remove a listener. Removing an unknown listener is a no-op.
    ///
    /// Returns `true` if the listener was present.
    pub fn remove_listener(&self, listener: &Arc<dyn HistoricalEventListener>) -> bool {
        let mut guard = self.listeners.write();
        if !guard.iter().any(|l| Arc::ptr_eq(l, listener)) {
            return false;
        }
        let next: Vec<_> = guard
            .iter()
            .filter(|l| !Arc::ptr_eq(l, listener))
            .cloned()
            .collect();
        *guard = Arc::new(next);
        true
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// All buffered records, oldest first.
    pub fn events(&self) -> Vec<Arc<HistoricalRecord>> {
        self.records.read().iter().cloned().collect()
    }

    /// The most recently recorded event.
    pub fn latest(&self) -> Option<Arc<HistoricalRecord>> {
        self.records.read().back().cloned()
    }

    /// Records stamped at or after `since`, oldest first.
    pub fn events_since(&self, since: &MarsTime) -> Vec<Arc<HistoricalRecord>> {
        self.records
            .read()
            .iter()
            .filter(|r| r.timestamp >= *since)
            .cloned()
            .collect()
    }

    /// Records associated with the named settlement, oldest first.
    pub fn events_for_settlement(&self, settlement: &str) -> Vec<Arc<HistoricalRecord>> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.settlement == settlement)
            .cloned()
            .collect()
    }

    /// Number of buffered records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Maximum number of buffered records.
    pub fn capacity(&self) -> usize {
        self.config.effective_capacity()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use marsim_types::HistoricalEventType;
    use parking_lot::Mutex;

    use super::*;

    /// A settable clock for stamping.
    struct TestClock(Mutex<MarsTime>);

    impl TestClock {
        fn at(sol: u32, millisol: f64) -> Arc<Self> {
            Arc::new(Self(Mutex::new(MarsTime::new(sol, millisol))))
        }

        fn set(&self, t: MarsTime) {
            *self.0.lock() = t;
        }
    }

    impl MarsTimeSource for TestClock {
        fn mars_time(&self) -> MarsTime {
            *self.0.lock()
        }
    }

    /// Counts deliveries.
    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl HistoricalEventListener for Counter {
        fn on_event_added(&self, _record: &HistoricalRecord) -> Result<(), HistoryListenerError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl HistoricalEventListener for Failing {
        fn on_event_added(&self, _record: &HistoricalRecord) -> Result<(), HistoryListenerError> {
            Err(HistoryListenerError::Failed {
                reason: "display closed".to_owned(),
            })
        }
    }

    struct Panicking;

    impl HistoricalEventListener for Panicking {
        #[allow(clippy::panic)]
        fn on_event_added(&self, _record: &HistoricalRecord) -> Result<(), HistoryListenerError> {
            panic!("listener blew up");
        }
    }

    fn manager(clock: &Arc<TestClock>) -> HistoricalEventManager {
        let source: Arc<dyn MarsTimeSource> = Arc::clone(clock) as Arc<dyn MarsTimeSource>;
        HistoricalEventManager::new(source, HistoryConfig::default())
    }

    fn event(n: usize) -> HistoricalEvent {
        HistoricalEvent::new(
            HistoricalEventType::MalfunctionUnfixed,
            format!("Building {n}"),
            "Pressure loss",
        )
        .with_settlement("Base")
    }

    #[test]
    fn records_are_stamped_at_registration() {
        let clock = TestClock::at(1, 10.0);
        let mgr = manager(&clock);
        let built = event(1);
        clock.set(MarsTime::new(3, 250.0));

        let outcome = mgr.register_new_event(built);
        let record = outcome.record().unwrap();
        assert_eq!(record.timestamp, MarsTime::new(3, 250.0));
    }

    #[test]
    fn exact_duplicates_are_suppressed() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        assert!(mgr.register_new_event(event(1)).is_recorded());
        clock.set(MarsTime::new(1, 5.0));
        assert_eq!(mgr.register_new_event(event(1)), RegisterOutcome::Duplicate);
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn buffer_keeps_the_fifty_most_recent() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        for n in 0..60 {
            assert!(mgr.register_new_event(event(n)).is_recorded());
        }
        let events = mgr.events();
        assert_eq!(events.len(), 50);
        assert_eq!(events.first().unwrap().event.source, "Building 10");
        assert_eq!(events.last().unwrap().event.source, "Building 59");
    }

    #[test]
    fn evicted_event_can_be_recorded_again() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        for n in 0..51 {
            mgr.register_new_event(event(n));
        }
        // Building 0 has been evicted, so it is no longer a duplicate.
        assert!(mgr.register_new_event(event(0)).is_recorded());
    }

    #[test]
    fn noise_is_filtered() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        let counter = Arc::new(Counter::default());
        mgr.add_listener(counter.clone());
        let task = HistoricalEvent::new(HistoricalEventType::TaskFinish, "Alice", "done");
        assert_eq!(mgr.register_new_event(task), RegisterOutcome::Filtered);
        assert!(mgr.is_empty());
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn listeners_are_idempotent_and_removable() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        let counter = Arc::new(Counter::default());
        let as_dyn: Arc<dyn HistoricalEventListener> = counter.clone();

        assert!(mgr.add_listener(Arc::clone(&as_dyn)));
        assert!(!mgr.add_listener(Arc::clone(&as_dyn)));
        assert_eq!(mgr.listener_count(), 1);

        mgr.register_new_event(event(1));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);

        assert!(mgr.remove_listener(&as_dyn));
        assert!(!mgr.remove_listener(&as_dyn));
        mgr.register_new_event(event(2));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn faulting_listeners_do_not_block_others() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        let counter = Arc::new(Counter::default());
        mgr.add_listener(Arc::new(Failing));
        mgr.add_listener(Arc::new(Panicking));
        mgr.add_listener(counter.clone());

        assert!(mgr.register_new_event(event(1)).is_recorded());
        assert!(mgr.register_new_event(event(2)).is_recorded());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.len(), 2);
    }

    /// Removes itself on first delivery.
    struct OneShot {
        mgr: Arc<HistoricalEventManager>,
        me: Mutex<Option<Arc<dyn HistoricalEventListener>>>,
        seen: AtomicUsize,
    }

    impl HistoricalEventListener for OneShot {
        fn on_event_added(&self, _record: &HistoricalRecord) -> Result<(), HistoryListenerError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            if let Some(me) = self.me.lock().take() {
                self.mgr.remove_listener(&me);
            }
            Ok(())
        }
    }

    #[test]
    fn listener_can_detach_during_notification() {
        let clock = TestClock::at(1, 0.0);
        let mgr = Arc::new(manager(&clock));
        let one_shot = Arc::new(OneShot {
            mgr: Arc::clone(&mgr),
            me: Mutex::new(None),
            seen: AtomicUsize::new(0),
        });
        let as_dyn: Arc<dyn HistoricalEventListener> = one_shot.clone();
        *one_shot.me.lock() = Some(Arc::clone(&as_dyn));
        let counter = Arc::new(Counter::default());
        mgr.add_listener(as_dyn);
        mgr.add_listener(counter.clone());

        mgr.register_new_event(event(1));
        mgr.register_new_event(event(2));

        assert_eq!(one_shot.seen.load(Ordering::SeqCst), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.listener_count(), 1);
    }

    #[test]
    fn queries_filter_by_time_and_settlement() {
        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        mgr.register_new_event(event(1));
        clock.set(MarsTime::new(2, 0.0));
        mgr.register_new_event(event(2).with_settlement("Other"));

        assert_eq!(mgr.events_since(&MarsTime::new(1, 500.0)).len(), 1);
        assert_eq!(mgr.events_for_settlement("Base").len(), 1);
        assert_eq!(mgr.latest().unwrap().event.settlement, "Other");
    }

    #[test]
    fn concurrent_registration_records_each_event_once() {
        const WORKERS: usize = 4;
        const OWN_EVENTS: usize = 10;
        const SHARED_EVENTS: usize = 5;

        let clock = TestClock::at(1, 0.0);
        let mgr = manager(&clock);
        let steady = Arc::new(Counter::default());
        mgr.add_listener(steady.clone());
        let churn: Arc<dyn HistoricalEventListener> = Arc::new(Counter::default());
        let registering_done = AtomicBool::new(false);

        let (recorded, shared_recorded) = std::thread::scope(|scope| {
            let mgr = &mgr;
            let churn = &churn;
            let registering_done = &registering_done;
            scope.spawn(move || {
                while !registering_done.load(Ordering::SeqCst) {
                    mgr.add_listener(Arc::clone(churn));
                    mgr.remove_listener(churn);
                }
            });

            let workers: Vec<_> = (0..WORKERS)
                .map(|worker| {
                    scope.spawn(move || {
                        let mut recorded: usize = 0;
                        let mut shared_recorded: usize = 0;
                        for i in 0..OWN_EVENTS {
                            let own = event(worker.saturating_mul(100).saturating_add(i));
                            if mgr.register_new_event(own).is_recorded() {
                                recorded = recorded.saturating_add(1);
                            }
                            if i < SHARED_EVENTS
                                && mgr
                                    .register_new_event(event(1000_usize.saturating_add(i)))
                                    .is_recorded()
                            {
                                shared_recorded = shared_recorded.saturating_add(1);
                            }
                        }
                        (recorded, shared_recorded)
                    })
                })
                .collect();
            let totals = workers
                .into_iter()
                .map(|w| w.join().unwrap())
                .fold((0_usize, 0_usize), |(a, b), (r, s)| {
                    (a.saturating_add(r), b.saturating_add(s))
                });
            registering_done.store(true, Ordering::SeqCst);
            totals
        });

        assert_eq!(recorded, WORKERS.saturating_mul(OWN_EVENTS));
        assert_eq!(shared_recorded, SHARED_EVENTS);
        assert!(mgr.len() <= mgr.capacity());
        assert_eq!(mgr.len(), recorded.saturating_add(shared_recorded));
        assert_eq!(
            steady.0.load(Ordering::SeqCst),
            recorded.saturating_add(shared_recorded)
        );
        assert_eq!(mgr.listener_count(), 1);
    }
}
