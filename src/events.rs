//! Typed event dispatch for the public façade.
//!
//! The source this crate is based on consults listener counts before
//! emitting, so a disconnected event never pays for payload construction.
//! Ported as an explicit multicast dispatcher: each event kind gets its own
//! `Vec` of closures, and callers check `is_empty()` before doing any work
//! to build that event's payload.

use bytes::Bytes;

use crate::error::ParseError;

/// The three notifications the façade can deliver, matching §6's Events
/// section. `Segment` always carries the newly published segment bytes.
#[derive(Debug, Clone)]
pub enum Event {
    Initialized,
    Segment(Bytes),
    Error(ParseError),
}

type Listener<T> = Box<dyn FnMut(&T) + Send>;

/// Holds the subscriber lists for one parser instance. Not `Clone`: closures aren't.
#[derive(Default)]
pub struct Subscribers {
    initialized: Vec<Listener<()>>,
    segment: Vec<Listener<Bytes>>,
    error: Vec<Listener<ParseError>>,
}

impl Subscribers {
    pub fn on_initialized<F: FnMut(&()) + Send + 'static>(&mut self, f: F) {
        self.initialized.push(Box::new(f));
    }

    pub fn on_segment<F: FnMut(&Bytes) + Send + 'static>(&mut self, f: F) {
        self.segment.push(Box::new(f));
    }

    pub fn on_error<F: FnMut(&ParseError) + Send + 'static>(&mut self, f: F) {
        self.error.push(Box::new(f));
    }

    pub fn has_segment_listeners(&self) -> bool {
        !self.segment.is_empty()
    }

    pub fn fire_initialized(&mut self) {
        for f in self.initialized.iter_mut() {
            f(&());
        }
    }

    pub fn fire_segment(&mut self, bytes: &Bytes) {
        for f in self.segment.iter_mut() {
            f(bytes);
        }
    }

    pub fn fire_error(&mut self, err: &ParseError) {
        for f in self.error.iter_mut() {
            f(err);
        }
    }
}
