use std::collections::HashSet;
use std::time::Duration;

use sclm_types::EventType;

use crate::events::{Notice, Record};

/// One unit of work queued for a sink.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Record(Record),
    /// Status shown regardless of filters.
    Notice(Notice),
    /// Drop everything currently displayed.
    Clear,
}

/// Which deliveries a sink wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkFilter {
    /// `None` accepts every event type.
    accepted: Option<HashSet<EventType>>,
    show_unmatched: bool,
}

impl SinkFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Accept only the given types. An empty list accepts everything.
    pub fn only(types: impl IntoIterator<Item = EventType>) -> Self {
        let accepted: HashSet<EventType> = types.into_iter().collect();
        Self {
            accepted: (!accepted.is_empty()).then_some(accepted),
            show_unmatched: false,
        }
    }

    pub fn with_unmatched(mut self, show: bool) -> Self {
        self.show_unmatched = show;
        self
    }

    pub fn accepts_type(&self, event_type: EventType) -> bool {
        self.accepted
            .as_ref()
            .is_none_or(|accepted| accepted.contains(&event_type))
    }

    pub fn shows_unmatched(&self) -> bool {
        self.show_unmatched
    }

    pub fn accepts(&self, delivery: &Delivery) -> bool {
        match delivery {
            Delivery::Record(Record::Event(event)) => self.accepts_type(event.event_type),
            Delivery::Record(Record::Unmatched(_)) => self.show_unmatched,
            Delivery::Notice(_) | Delivery::Clear => true,
        }
    }
}

/// A presentation consumer.
///
/// Runs on its own thread: deliveries are applied in order, then `tick` is
/// called once per `cadence`.
pub trait Sink {
    fn accept(&mut self, record: &Record);

    fn notice(&mut self, notice: &Notice);

    fn clear(&mut self);

    /// Periodic housekeeping such as redrawing. Returning `false` stops the sink.
    fn tick(&mut self) -> bool {
        true
    }

    fn cadence(&self) -> Duration {
        Duration::from_millis(50)
    }

    /// Called once after the queue is closed.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Event, UnmatchedLine};
    use crate::log::LogLine;
    use chrono::Utc;
    use std::sync::Arc;

    fn event(event_type: EventType) -> Delivery {
        Delivery::Record(Record::Event(Arc::new(Event {
            event_type,
            timestamp: Utc::now(),
            raw_line: String::new(),
            fields: Default::default(),
            organizations: Default::default(),
        })))
    }

    fn unmatched() -> Delivery {
        Delivery::Record(Record::Unmatched(Arc::new(UnmatchedLine {
            line: LogLine {
                text: "noise".into(),
                offset: 0,
                read_at: Utc::now(),
            },
        })))
    }

    #[test]
    fn test_only_filter_rejects_other_types() {
        let filter = SinkFilter::only([EventType::ActorDeath]);
        assert!(filter.accepts(&event(EventType::ActorDeath)));
        for other in EventType::ALL.into_iter().filter(|t| *t != EventType::ActorDeath) {
            assert!(!filter.accepts(&event(other)));
        }
    }

    #[test]
    fn test_empty_filter_accepts_everything() {
        let filter = SinkFilter::only([]).with_unmatched(true);
        assert_eq!(filter, SinkFilter::all().with_unmatched(true));
        for t in EventType::ALL {
            assert!(filter.accepts(&event(t)));
        }
        assert!(filter.accepts(&unmatched()));
    }

    #[test]
    fn test_unmatched_visibility_is_independent_of_type_filter() {
        let hidden = SinkFilter::all();
        assert!(!hidden.accepts(&unmatched()));

        let narrow = SinkFilter::only([EventType::ActorStall]).with_unmatched(true);
        assert!(narrow.accepts(&unmatched()));
    }

    #[test]
    fn test_notices_bypass_filters() {
        let filter = SinkFilter::only([EventType::ActorStall]);
        assert!(filter.accepts(&Delivery::Notice(Notice::Banner)));
        assert!(filter.accepts(&Delivery::Clear));
    }
}
