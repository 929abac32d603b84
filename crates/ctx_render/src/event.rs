//! Event source boundary
//!
//! Input is not dispatched here; a context only forwards the capability
//! set {has_event, get_event, destroy, get_fd} of an installed source.

use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerKind {
    Press,
    Motion,
    Release,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyKind {
    Down,
    Up,
    Press,
}

/// Input event delivered by an [`EventSource`]
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Pointer {
        kind: PointerKind,
        x: f32,
        y: f32,
        device: u32,
    },
    Key {
        kind: KeyKind,
        /// Key name, e.g. `"a"`, `"return"`, `"control-c"`
        name: String,
        unicode: u32,
    },
    /// Free-form message from the host
    Message(String),
}

/// Host-provided producer of input events
pub trait EventSource: Send {
    /// Whether an event is pending, waiting up to `timeout_ms`
    fn has_event(&mut self, timeout_ms: u32) -> bool;

    /// Next pending event
    fn get_event(&mut self) -> Option<Event>;

    /// File descriptor a host event loop can poll, if the source has one
    fn get_fd(&self) -> Option<i32> {
        None
    }

    /// Release resources; called once when the source is replaced or the
    /// context is dropped
    fn destroy(&mut self) {}
}

/// In-memory event source the host pushes into
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSource for EventQueue {
    fn has_event(&mut self, _timeout_ms: u32) -> bool {
        !self.events.is_empty()
    }

    fn get_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn destroy(&mut self) {
        self.events.clear();
    }
}
