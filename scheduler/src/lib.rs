//! Deferred-task scheduling for pledge.
//!
//! The core only needs one capability from its environment: run a callback
//! later, after the current call stack unwinds, in the order callbacks were
//! scheduled. [`Scheduler`] is that capability. [`EventLoop`] is a
//! deterministic single-threaded implementation with a virtual clock for
//! timer-driven tasks.

mod event_loop;

pub use event_loop::{EventLoop, EventLoopConfig, LoopError, LoopStats};
pub use pledge_types::TimerId;

use std::any::Any;
use std::rc::Rc;

/// A unit of deferred work. Runs to completion exactly once.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Shared handle to a scheduler, as stored by every future.
pub type SchedulerRef = Rc<dyn Scheduler>;

/// Accepts deferred tasks.
///
/// Implementations must never run `task` inline, must run tasks in the
/// order they were scheduled, and must not let a panicking task take the
/// host down.
pub trait Scheduler {
    fn schedule_deferred(&self, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for Rc<S> {
    fn schedule_deferred(&self, task: Task) {
        (**self).schedule_deferred(task);
    }
}

/// Best-effort message from a caught panic payload.
#[must_use]
pub fn panic_payload_to_string(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
