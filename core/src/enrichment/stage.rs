//! Concurrent enrichment between extraction and dispatch.
//!
//! Events with player handles start their lookups as soon as they arrive.
//! Deliveries wait in a window until every sink has moved past them. Each
//! sink keeps its own cursor into the window and only waits on a lookup
//! for an entry it actually accepts, so a slow lookup holds back the sinks
//! that show that event and nobody else. Every sink still sees its own
//! records in source order.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, warn};

use super::cache::OrgCache;
use super::{Affiliation, OrgLookup};
use crate::dispatch::{Delivery, Dispatcher};
use crate::events::{Event, Record};

/// Attaches organizations to events through a shared cache.
pub struct Enricher<L> {
    cache: Arc<OrgCache<L>>,
}

impl<L> Clone for Enricher<L> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<L: OrgLookup> Enricher<L> {
    pub fn new(cache: Arc<OrgCache<L>>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<OrgCache<L>> {
        &self.cache
    }

    /// Resolve every handle on the event concurrently.
    ///
    /// Returns the input unchanged when nothing resolved, otherwise a new
    /// event; the original is never modified.
    pub async fn enrich(&self, event: Arc<Event>) -> Arc<Event> {
        let handles = event.handles();
        if handles.is_empty() {
            return event;
        }

        let mut lookups = JoinSet::new();
        for handle in handles {
            let cache = Arc::clone(&self.cache);
            lookups.spawn(async move {
                let affiliation = cache.resolve(&handle).await;
                (handle, affiliation)
            });
        }

        let mut organizations: BTreeMap<String, Affiliation> = BTreeMap::new();
        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((handle, Some(affiliation))) => {
                    organizations.insert(handle, affiliation);
                }
                Ok((_, None)) => {}
                Err(e) => warn!(error = %e, "Organization lookup task failed"),
            }
        }

        if organizations.is_empty() {
            event
        } else {
            Arc::new(Event::clone(&event).with_organizations(organizations))
        }
    }
}

/// Producer half: hands deliveries to the stage in source order.
pub struct StageSender {
    tx: Sender<Delivery>,
}

impl StageSender {
    /// Returns `false` once the stage is gone.
    pub async fn submit(&self, delivery: Delivery) -> bool {
        self.tx.send(delivery).await.is_ok()
    }
}

struct Entry {
    delivery: Delivery,
    /// Lookup still running for this entry.
    lookup: Option<task::Id>,
}

enum Step {
    Resolved(Result<(task::Id, Arc<Event>), JoinError>),
    Received(Option<Delivery>),
}

/// Consumer half: enriches and feeds the dispatcher.
pub struct EnrichmentStage<L> {
    rx: Receiver<Delivery>,
    enricher: Option<Enricher<L>>,
    lookups: JoinSet<Arc<Event>>,
    window: VecDeque<Entry>,
    /// Sequence number of the window front.
    base: u64,
    /// Per sink, sequence number of the next entry it has not passed.
    cursors: Vec<u64>,
    capacity: usize,
    input_closed: bool,
}

/// Create the stage. With no enricher every delivery passes straight through.
///
/// At most `capacity` deliveries wait in the window. Beyond that the
/// sender waits until lookups finish.
pub fn enrichment_stage<L: OrgLookup>(
    enricher: Option<Enricher<L>>,
    capacity: usize,
) -> (StageSender, EnrichmentStage<L>) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let stage = EnrichmentStage {
        rx,
        enricher,
        lookups: JoinSet::new(),
        window: VecDeque::with_capacity(capacity),
        base: 0,
        cursors: Vec::new(),
        capacity,
        input_closed: false,
    };
    (StageSender { tx }, stage)
}

impl<L: OrgLookup> EnrichmentStage<L> {
    /// Deliver until the sender is dropped and everything submitted has
    /// reached the sinks.
    pub async fn run(&mut self, dispatcher: &mut Dispatcher) {
        loop {
            self.release(dispatcher).await;
            if self.input_closed && self.window.is_empty() {
                return;
            }

            let room = !self.input_closed && self.window.len() < self.capacity;
            let step = tokio::select! {
                Some(joined) = self.lookups.join_next_with_id(), if !self.lookups.is_empty() => {
                    Step::Resolved(joined)
                }
                received = self.rx.recv(), if room => Step::Received(received),
                else => return,
            };

            match step {
                Step::Resolved(joined) => self.resolved(joined),
                Step::Received(Some(delivery)) => self.admit(delivery),
                Step::Received(None) => self.input_closed = true,
            }
        }
    }

    fn admit(&mut self, delivery: Delivery) {
        let lookup = match (&self.enricher, &delivery) {
            (Some(enricher), Delivery::Record(Record::Event(event))) if !event.handles().is_empty() => {
                let enricher = enricher.clone();
                let event = Arc::clone(event);
                Some(self.lookups.spawn(async move { enricher.enrich(event).await }).id())
            }
            _ => None,
        };
        self.window.push_back(Entry { delivery, lookup });
    }

    fn resolved(&mut self, joined: Result<(task::Id, Arc<Event>), JoinError>) {
        let (id, enriched) = match joined {
            Ok((id, event)) => (id, Some(event)),
            Err(e) => {
                debug!(error = %e, "Enrichment task did not finish, delivering without organizations");
                (e.id(), None)
            }
        };
        if let Some(entry) = self.window.iter_mut().find(|e| e.lookup == Some(id)) {
            entry.lookup = None;
            if let Some(event) = enriched {
                entry.delivery = Delivery::Record(Record::Event(event));
            }
        }
    }

    /// Move every sink forward as far as it can go, then drop entries all
    /// sinks have passed.
    async fn release(&mut self, dispatcher: &mut Dispatcher) {
        let sinks = dispatcher.slot_count();
        if self.cursors.len() < sinks {
            self.cursors.resize(sinks, self.base);
        }

        for sink in 0..sinks {
            loop {
                let position = (self.cursors[sink] - self.base) as usize;
                let Some(entry) = self.window.get(position) else {
                    break;
                };
                if dispatcher.accepts(sink, &entry.delivery) {
                    if entry.lookup.is_some() {
                        break;
                    }
                    dispatcher.deliver(sink, &entry.delivery).await;
                }
                self.cursors[sink] += 1;
            }
        }

        while !self.window.is_empty() && self.cursors.iter().all(|&c| c > self.base) {
            self.window.pop_front();
            self.base += 1;
        }
    }

    /// Stop accepting work and abort every running lookup.
    ///
    /// Whatever has not reached the sinks yet is discarded.
    pub fn abort_pending(&mut self) -> usize {
        self.rx.close();
        let aborted = self.lookups.len();
        self.lookups.abort_all();
        self.base += self.window.len() as u64;
        self.window.clear();
        self.cursors.clear();
        self.input_closed = true;
        while self.rx.try_recv().is_ok() {}
        aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{Sink, SinkFilter};
    use crate::enrichment::OrganizationInfo;
    use crate::error::LookupError;
    use crate::events::Notice;
    use chrono::Utc;
    use sclm_types::EventType;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Slow for "Slow", instant for everyone else.
    struct FakeLookup {
        calls: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    impl OrgLookup for FakeLookup {
        async fn lookup(&self, handle: &str) -> Result<Affiliation, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if handle == "Slow" {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.finished.fetch_add(1, Ordering::SeqCst);
            if handle == "Broken" {
                return Err(LookupError::Status(500));
            }
            Ok(Affiliation::Citizen {
                organization: Some(OrganizationInfo {
                    sid: format!("{}_ORG", handle.to_uppercase()),
                }),
            })
        }
    }

    struct Counters {
        calls: Arc<AtomicUsize>,
        finished: Arc<AtomicUsize>,
    }

    fn enricher() -> (Enricher<FakeLookup>, Counters) {
        let calls = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let cache = OrgCache::new(
            FakeLookup {
                calls: Arc::clone(&calls),
                finished: Arc::clone(&finished),
            },
            Duration::from_secs(1),
            chrono::Duration::days(1),
        );
        (Enricher::new(Arc::new(cache)), Counters { calls, finished })
    }

    fn death(victim: &str, killer: &str) -> Arc<Event> {
        Arc::new(Event {
            event_type: EventType::ActorDeath,
            timestamp: Utc::now(),
            raw_line: format!("{} killed by {}", victim, killer),
            fields: [("victim", victim), ("killer", killer)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            organizations: BTreeMap::new(),
        })
    }

    fn transition() -> Arc<Event> {
        Arc::new(Event {
            event_type: EventType::RequestingTransition,
            timestamp: Utc::now(),
            raw_line: String::new(),
            fields: BTreeMap::new(),
            organizations: BTreeMap::new(),
        })
    }

    #[derive(Clone, Default)]
    struct Recorded(Arc<Mutex<Vec<Delivery>>>);

    impl Recorded {
        fn take(&self) -> Vec<Delivery> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }

        fn len(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    struct RecordingSink(Recorded);

    impl Sink for RecordingSink {
        fn accept(&mut self, record: &Record) {
            self.0.0.lock().unwrap().push(Delivery::Record(record.clone()));
        }

        fn notice(&mut self, notice: &Notice) {
            self.0.0.lock().unwrap().push(Delivery::Notice(notice.clone()));
        }

        fn clear(&mut self) {
            self.0.0.lock().unwrap().push(Delivery::Clear);
        }

        fn cadence(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    async fn dispatcher_with(sinks: &[(&str, SinkFilter, &Recorded)]) -> Dispatcher {
        let mut dispatcher = Dispatcher::new(16);
        for (name, filter, recorded) in sinks {
            let recorded = (*recorded).clone();
            dispatcher
                .register_sink(name, filter.clone(), move || Ok::<_, String>(RecordingSink(recorded)))
                .await
                .unwrap();
        }
        dispatcher
    }

    fn event_of(delivery: &Delivery) -> &Arc<Event> {
        match delivery {
            Delivery::Record(Record::Event(event)) => event,
            other => panic!("expected an event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_enrich_attaches_organizations_without_touching_original() {
        let (enricher, _) = enricher();
        let original = death("Alice", "Broken");

        let enriched = enricher.enrich(Arc::clone(&original)).await;

        assert!(original.organizations.is_empty());
        assert_eq!(enriched.organization("Alice").unwrap().sid, "ALICE_ORG");
        assert!(enriched.affiliation("Broken").is_none());
    }

    #[tokio::test]
    async fn test_repeated_handles_are_looked_up_once() {
        let (enricher, counters) = enricher();
        enricher.enrich(death("Alice", "Bob")).await;
        enricher.enrich(death("Bob", "Alice")).await;
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stage_preserves_submission_order() {
        let (enricher, _) = enricher();
        let (tx, mut stage) = enrichment_stage(Some(enricher), 8);
        let seen = Recorded::default();
        let mut dispatcher = dispatcher_with(&[("main", SinkFilter::all(), &seen)]).await;

        assert!(tx.submit(Delivery::Record(Record::Event(death("Slow", "Bob")))).await);
        assert!(tx.submit(Delivery::Notice(Notice::Restarting)).await);
        assert!(tx.submit(Delivery::Record(Record::Event(death("Carol", "Dave")))).await);
        drop(tx);

        stage.run(&mut dispatcher).await;
        dispatcher.shutdown();

        let seen = seen.take();
        assert_eq!(seen.len(), 3);
        let first = event_of(&seen[0]);
        assert_eq!(first.field("victim"), Some("Slow"));
        assert_eq!(first.organization("Slow").unwrap().sid, "SLOW_ORG");
        assert_eq!(seen[1], Delivery::Notice(Notice::Restarting));
        assert_eq!(event_of(&seen[2]).field("victim"), Some("Carol"));
    }

    #[tokio::test]
    async fn test_pending_lookup_only_holds_back_sinks_that_want_it() {
        let (enricher, _) = enricher();
        let (tx, mut stage) = enrichment_stage(Some(enricher), 8);
        let deaths = Recorded::default();
        let transitions = Recorded::default();
        let mut dispatcher = dispatcher_with(&[
            ("deaths", SinkFilter::only([EventType::ActorDeath]), &deaths),
            ("transitions", SinkFilter::only([EventType::RequestingTransition]), &transitions),
        ])
        .await;

        tx.submit(Delivery::Record(Record::Event(death("Slow", "Bob")))).await;
        tx.submit(Delivery::Record(Record::Event(transition()))).await;

        // The death lookup takes 100ms, the transition must not wait for it
        let _ = tokio::time::timeout(Duration::from_millis(60), stage.run(&mut dispatcher)).await;
        assert_eq!(transitions.len(), 1);
        assert_eq!(deaths.len(), 0);

        drop(tx);
        stage.run(&mut dispatcher).await;
        dispatcher.shutdown();

        let deaths = deaths.take();
        assert_eq!(deaths.len(), 1);
        assert_eq!(event_of(&deaths[0]).organization("Slow").unwrap().sid, "SLOW_ORG");
        assert_eq!(transitions.len(), 1);
    }

    #[tokio::test]
    async fn test_without_enricher_events_pass_through() {
        let (tx, mut stage) = enrichment_stage::<FakeLookup>(None, 4);
        let seen = Recorded::default();
        let mut dispatcher = dispatcher_with(&[("main", SinkFilter::all(), &seen)]).await;

        let event = death("Alice", "Bob");
        tx.submit(Delivery::Record(Record::Event(Arc::clone(&event)))).await;
        drop(tx);
        stage.run(&mut dispatcher).await;
        dispatcher.shutdown();

        let seen = seen.take();
        assert!(Arc::ptr_eq(event_of(&seen[0]), &event));
    }

    #[tokio::test]
    async fn test_abort_pending_cancels_running_lookups() {
        let (enricher, counters) = enricher();
        let (tx, mut stage) = enrichment_stage(Some(enricher), 4);
        let mut dispatcher = Dispatcher::new(4);

        tx.submit(Delivery::Record(Record::Event(death("Slow", "Bob")))).await;
        tx.submit(Delivery::Notice(Notice::Banner)).await;
        let _ = tokio::time::timeout(Duration::from_millis(20), stage.run(&mut dispatcher)).await;
        assert_eq!(counters.calls.load(Ordering::SeqCst), 2);

        assert_eq!(stage.abort_pending(), 1);
        assert!(!tx.submit(Delivery::Clear).await);

        // Only the instant lookup ever completes
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counters.finished.load(Ordering::SeqCst), 1);
    }
}
