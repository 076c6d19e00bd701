//! Runs user code so that a panic surfaces as a rejection reason.

use std::panic::{self, AssertUnwindSafe};

use pledge_scheduler::panic_payload_to_string;
use pledge_types::FutureError;

use crate::value::Value;

/// Invoke `f`, turning a panic into `Err(FutureError::Panicked)`.
///
/// Callers must not hold a `RefCell` borrow across this call.
pub(crate) fn call<T>(f: impl FnOnce() -> Result<T, Value>) -> Result<T, Value> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_payload_to_string(&payload);
            tracing::debug!(%message, "user code panicked");
            Err(Value::Error(FutureError::panicked(message)))
        }
    }
}
