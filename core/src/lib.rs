//! Promise/A+ deferred values.
//!
//! A [`Future`] starts pending and settles exactly once, either fulfilled
//! with a value or rejected with a reason. Observers attach with
//! [`Future::then`] and friends at any time; each is notified exactly once,
//! in registration order, as a deferred task on the future's
//! [`Scheduler`], never synchronously with the registering call.
//!
//! Settling with something future-like, a native [`Future`] or any
//! [`FutureLike`] wrapped in [`Value::Foreign`], adopts its eventual outcome
//! instead of storing it, however deeply it nests.
//!
//! ```
//! use pledge_core::{EventLoop, Future, Value};
//!
//! let event_loop = EventLoop::new();
//! let scheduler = event_loop.scheduler();
//!
//! let doubled = Future::resolve(&scheduler, 21).then(|value| {
//!     let n = value.as_i64().unwrap_or_default();
//!     Ok(Value::from(n * 2))
//! });
//! assert!(doubled.is_pending());
//!
//! event_loop.run_until_idle().unwrap();
//! assert_eq!(doubled.value(), Some(Value::from(42)));
//! ```

mod combinators;
mod future;
mod guard;
mod resolution;
mod value;

pub use future::{Callback, Completion, Future, Resolver};
pub use value::{FutureLike, Notify, ThenFn, Value};

pub use pledge_scheduler::{EventLoop, EventLoopConfig, LoopError, Scheduler, SchedulerRef};
pub use pledge_types::{FutureError, FutureId, Settlement, State};
