use std::thread;
use std::time::Instant;

use tokio::sync::mpsc::Receiver;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info};

use super::sink::{Delivery, Sink};

/// Drive one sink until its queue closes or the sink asks to stop.
pub(super) fn run_consumer<S: Sink>(name: &str, mut sink: S, mut rx: Receiver<Delivery>) {
    let cadence = sink.cadence();

    loop {
        let started = Instant::now();
        let mut closed = false;

        loop {
            match rx.try_recv() {
                Ok(Delivery::Record(record)) => sink.accept(&record),
                Ok(Delivery::Notice(notice)) => sink.notice(&notice),
                Ok(Delivery::Clear) => sink.clear(),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        if !sink.tick() {
            info!(sink = name, "Sink stopped");
            break;
        }
        if closed {
            debug!(sink = name, "Sink queue closed");
            break;
        }

        thread::sleep(cadence.saturating_sub(started.elapsed()));
    }

    rx.close();
    sink.close();
}
