use std::fmt::Display;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::{self, Sender, error::TrySendError};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::consumer::run_consumer;
use super::sink::{Delivery, Sink, SinkFilter};
use crate::error::SinkError;

struct SinkSlot {
    name: String,
    filter: SinkFilter,
    tx: Sender<Delivery>,
    dropped: u64,
    /// Set once a send timed out. Cleared when the queue has room again.
    stalled: bool,
    closed: bool,
    thread: Option<JoinHandle<()>>,
}

impl SinkSlot {
    fn record_drop(&mut self) {
        self.dropped += 1;
        // Log on 1, 2, 4, 8... to keep a stuck sink from flooding the log
        if self.dropped.is_power_of_two() {
            warn!(sink = %self.name, dropped = self.dropped, "Sink stalled, dropping deliveries");
        }
    }

    fn mark_closed(&mut self) {
        warn!(sink = %self.name, "Sink closed, no longer delivering to it");
        self.closed = true;
    }
}

/// How long a full queue may block the producer before the sink counts as stalled.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Routes each delivery to every sink whose filter accepts it.
///
/// Each sink has its own bounded queue and thread. A full queue makes the
/// producer wait, so a sink that is merely slower than the log loses
/// nothing. Only a sink that makes no progress for the stall timeout has
/// deliveries dropped, and only its own.
pub struct Dispatcher {
    slots: Vec<SinkSlot>,
    queue_capacity: usize,
    stall_timeout: Duration,
}

impl Dispatcher {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            queue_capacity: queue_capacity.max(1),
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    pub fn with_stall_timeout(mut self, stall_timeout: Duration) -> Self {
        self.stall_timeout = stall_timeout;
        self
    }

    /// Build a sink on a dedicated thread and start feeding it.
    ///
    /// The factory runs on the sink's own thread, which matters for window
    /// handles that must stay on the thread that created them. Fails if the
    /// factory does.
    pub async fn register_sink<S, F, E>(
        &mut self,
        name: &str,
        filter: SinkFilter,
        factory: F,
    ) -> Result<(), SinkError>
    where
        S: Sink,
        F: FnOnce() -> Result<S, E> + Send + 'static,
        E: Display,
    {
        let (tx, rx) = mpsc::channel::<Delivery>(self.queue_capacity);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), String>>();
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(format!("sink-{}", name))
            .spawn(move || match factory() {
                Ok(sink) => {
                    let _ = ready_tx.send(Ok(()));
                    run_consumer(&thread_name, sink, rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| SinkError::Start {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        match ready_rx.await {
            Ok(Ok(())) => {
                info!(sink = name, "Sink registered");
                self.slots.push(SinkSlot {
                    name: name.to_string(),
                    filter,
                    tx,
                    dropped: 0,
                    stalled: false,
                    closed: false,
                    thread: Some(thread),
                });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                error!(sink = name, %reason, "Sink failed to start");
                Err(SinkError::Start {
                    name: name.to_string(),
                    reason,
                })
            }
            Err(_) => {
                let _ = thread.join();
                Err(SinkError::Vanished {
                    name: name.to_string(),
                })
            }
        }
    }

    /// Queue a delivery for every accepting sink, in registration order.
    ///
    /// Returns how many sinks it was queued for.
    pub async fn dispatch(&mut self, delivery: &Delivery) -> usize {
        let mut queued = 0;
        for index in 0..self.slots.len() {
            if self.accepts(index, delivery) && self.deliver(index, delivery).await {
                queued += 1;
            }
        }
        queued
    }

    /// Whether the sink at `index` is open and its filter takes `delivery`.
    pub fn accepts(&self, index: usize, delivery: &Delivery) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| !slot.closed && slot.filter.accepts(delivery))
    }

    /// Queue a delivery for one sink, ignoring its filter.
    ///
    /// Waits while the queue is full, up to the stall timeout. A sink that
    /// timed out is considered stalled and has deliveries dropped without
    /// waiting until its queue has room again.
    pub async fn deliver(&mut self, index: usize, delivery: &Delivery) -> bool {
        let stall_timeout = self.stall_timeout;
        let Some(slot) = self.slots.get_mut(index).filter(|s| !s.closed) else {
            return false;
        };

        let pending = match slot.tx.try_send(delivery.clone()) {
            Ok(()) => {
                if slot.stalled {
                    slot.stalled = false;
                    info!(sink = %slot.name, dropped = slot.dropped, "Sink caught up");
                }
                return true;
            }
            Err(TrySendError::Closed(_)) => {
                slot.mark_closed();
                return false;
            }
            Err(TrySendError::Full(pending)) => pending,
        };

        if slot.stalled {
            slot.record_drop();
            return false;
        }

        match timeout(stall_timeout, slot.tx.send(pending)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                slot.mark_closed();
                false
            }
            Err(_) => {
                slot.stalled = true;
                slot.record_drop();
                false
            }
        }
    }

    /// Registered sinks, open or not. Indexes stay stable.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn sink_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.closed).count()
    }

    /// Deliveries dropped so far for the named sink.
    pub fn dropped(&self, name: &str) -> u64 {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map_or(0, |s| s.dropped)
    }

    /// Close every queue and wait for the sink threads to finish.
    pub fn shutdown(self) {
        let mut threads = Vec::with_capacity(self.slots.len());
        for mut slot in self.slots {
            drop(slot.tx);
            if let Some(thread) = slot.thread.take() {
                threads.push((slot.name, thread));
            }
        }
        for (name, thread) in threads {
            if thread.join().is_err() {
                error!(sink = %name, "Sink thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, Notice, Record};
    use chrono::Utc;
    use sclm_types::EventType;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Recorded(Arc<Mutex<Vec<String>>>);

    struct RecordingSink(Recorded);

    impl Sink for RecordingSink {
        fn accept(&mut self, record: &Record) {
            let text = match record {
                Record::Event(event) => event.event_type.to_string(),
                Record::Unmatched(line) => format!("raw:{}", line.text()),
            };
            self.0.0.lock().unwrap().push(text);
        }

        fn notice(&mut self, notice: &Notice) {
            self.0.0.lock().unwrap().push(notice.message());
        }

        fn clear(&mut self) {
            self.0.0.lock().unwrap().clear();
        }

        fn cadence(&self) -> Duration {
            Duration::from_millis(5)
        }
    }

    fn event(event_type: EventType) -> Delivery {
        Delivery::Record(Record::Event(Arc::new(Event {
            event_type,
            timestamp: Utc::now(),
            raw_line: String::new(),
            fields: Default::default(),
            organizations: Default::default(),
        })))
    }

    #[tokio::test]
    async fn test_each_sink_gets_only_what_it_accepts_in_order() {
        let main = Recorded::default();
        let overlay = Recorded::default();
        let mut dispatcher = Dispatcher::new(16);

        let m = main.clone();
        dispatcher
            .register_sink("main", SinkFilter::only([EventType::ActorDeath, EventType::VehicleDestruction]), move || {
                Ok::<_, String>(RecordingSink(m))
            })
            .await
            .unwrap();
        let o = overlay.clone();
        dispatcher
            .register_sink("overlay", SinkFilter::only([EventType::VehicleDestruction]), move || {
                Ok::<_, String>(RecordingSink(o))
            })
            .await
            .unwrap();

        assert_eq!(dispatcher.dispatch(&event(EventType::VehicleDestruction)).await, 2);
        assert_eq!(dispatcher.dispatch(&event(EventType::ActorDeath)).await, 1);
        assert_eq!(dispatcher.dispatch(&event(EventType::ActorStall)).await, 0);
        assert_eq!(dispatcher.dispatch(&event(EventType::VehicleDestruction)).await, 2);
        dispatcher.shutdown();

        assert_eq!(
            *main.0.lock().unwrap(),
            vec!["vehicle-destruction", "actor-death", "vehicle-destruction"]
        );
        assert_eq!(
            *overlay.0.lock().unwrap(),
            vec!["vehicle-destruction", "vehicle-destruction"]
        );
    }

    #[tokio::test]
    async fn test_failed_factory_is_reported_and_others_continue() {
        let main = Recorded::default();
        let mut dispatcher = Dispatcher::new(16);

        let err = dispatcher
            .register_sink("overlay", SinkFilter::all(), || {
                Err::<RecordingSink, _>("no display")
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no display"));

        let m = main.clone();
        dispatcher
            .register_sink("main", SinkFilter::all(), move || Ok::<_, String>(RecordingSink(m)))
            .await
            .unwrap();
        assert_eq!(dispatcher.sink_count(), 1);

        dispatcher.dispatch(&Delivery::Notice(Notice::Restarting)).await;
        dispatcher.shutdown();
        assert_eq!(main.0.lock().unwrap().len(), 1);
    }

    /// Parks inside its first tick until the test releases it.
    struct StuckSink {
        entered: Arc<std::sync::Barrier>,
        release: Arc<std::sync::Barrier>,
        parked: bool,
    }

    impl Sink for StuckSink {
        fn accept(&mut self, _: &Record) {}
        fn notice(&mut self, _: &Notice) {}
        fn clear(&mut self) {}
        fn tick(&mut self) -> bool {
            if !self.parked {
                self.parked = true;
                self.entered.wait();
                self.release.wait();
            }
            true
        }
    }

    #[tokio::test]
    async fn test_slow_sink_receives_everything() {
        let slow = Recorded::default();
        let mut dispatcher = Dispatcher::new(2);

        let s = slow.clone();
        dispatcher
            .register_sink("slow", SinkFilter::all(), move || Ok::<_, String>(RecordingSink(s)))
            .await
            .unwrap();

        for _ in 0..40 {
            assert_eq!(dispatcher.dispatch(&event(EventType::ActorDeath)).await, 1);
        }
        assert_eq!(dispatcher.dropped("slow"), 0);
        dispatcher.shutdown();
        assert_eq!(slow.0.lock().unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_stalled_sink_drops_after_timeout() {
        let entered = Arc::new(std::sync::Barrier::new(2));
        let release = Arc::new(std::sync::Barrier::new(2));
        let mut dispatcher = Dispatcher::new(2).with_stall_timeout(Duration::from_millis(50));

        let sink = StuckSink {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
            parked: false,
        };
        dispatcher
            .register_sink("stuck", SinkFilter::all(), move || Ok::<_, String>(sink))
            .await
            .unwrap();

        entered.wait();
        let started = std::time::Instant::now();
        for _ in 0..5 {
            dispatcher.dispatch(&event(EventType::ActorDeath)).await;
        }
        // Only the first overflow waits, the rest are dropped straight away
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(dispatcher.dropped("stuck"), 3);

        release.wait();
        dispatcher.shutdown();
    }
}
