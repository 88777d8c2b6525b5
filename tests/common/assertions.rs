//! Event and file assertions

use std::path::Path;

use edelstein_assets::Event;
use tokio::sync::broadcast;

/// Drain every event currently buffered on `rx`
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    events
}

/// Highest `completed` value reported by `LocatorCompleted` events
pub fn last_completed(events: &[Event]) -> Option<(usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::LocatorCompleted {
                completed, total, ..
            } => Some((*completed, *total)),
            _ => None,
        })
        .max()
}

/// Assert `path` exists and holds exactly `expected`
pub fn assert_file_eq(path: &Path, expected: &[u8]) {
    match std::fs::read(path) {
        Ok(actual) => assert!(
            actual == expected,
            "{} differs: {} bytes, expected {}",
            path.display(),
            actual.len(),
            expected.len()
        ),
        Err(e) => panic!("cannot read {}: {}", path.display(), e),
    }
}
