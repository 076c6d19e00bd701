//! Payloads carried by futures.
//!
//! A future settles with a [`Value`]: plain data, an aggregate produced by a
//! combinator, an error raised by the core itself, or something future-like
//! that the resolution procedure has to unwrap first.

use std::fmt;
use std::ptr;
use std::rc::Rc;

use serde_json::json;

use pledge_types::{FutureError, Settlement};

use crate::future::Future;

/// One of the two notifiers handed to a `then` member.
///
/// `Fn` rather than `FnOnce`: foreign implementations may call it any number
/// of times, and only the first call of either notifier counts.
pub type Notify = Rc<dyn Fn(Value)>;

/// A retrieved `then` member, invoked at most once with
/// `(on_fulfilled, on_rejected)`. `Err` is a synchronous failure.
pub type ThenFn = Box<dyn FnOnce(Notify, Notify) -> Result<(), Value>>;

/// Anything that can be awaited by the resolution procedure.
///
/// Detection is structural: a value is future-like when it exposes a callable
/// `then` member, whatever its concrete type. [`Future`] implements this
/// trait, and foreign implementations wrapped in [`Value::Foreign`] interoperate
/// with it.
pub trait FutureLike {
    /// Look up the `then` member.
    ///
    /// Called exactly once per resolution attempt. `Ok(None)` means the
    /// object has no callable `then` and is treated as a plain value; `Err`
    /// is a failing lookup and rejects the future being resolved.
    fn then_member(&self) -> Result<Option<ThenFn>, Value>;
}

/// Dynamically typed payload of a future.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Data(serde_json::Value),
    List(Vec<Value>),
    /// A tagged outcome, as produced by settle-all aggregation.
    Outcome(Box<Settlement<Value>>),
    Error(FutureError),
    Future(Future),
    Foreign(Rc<dyn FutureLike>),
}

impl Value {
    /// Wrap a foreign future-like object.
    pub fn foreign(object: impl FutureLike + 'static) -> Self {
        Self::Foreign(Rc::new(object))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether the resolution procedure would probe this value for `then`.
    #[must_use]
    pub fn is_future_like(&self) -> bool {
        matches!(self, Self::Future(_) | Self::Foreign(_))
    }

    #[must_use]
    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_data().and_then(serde_json::Value::as_i64)
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_data().and_then(serde_json::Value::as_f64)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.as_data().and_then(serde_json::Value::as_bool)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_data().and_then(serde_json::Value::as_str)
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_outcome(&self) -> Option<&Settlement<Value>> {
        match self {
            Self::Outcome(outcome) => Some(outcome),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_future(&self) -> Option<&Future> {
        match self {
            Self::Future(future) => Some(future),
            _ => None,
        }
    }

    /// JSON snapshot for logs and output. Futures render as their id and
    /// current state, never their eventual value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined => serde_json::Value::Null,
            Self::Data(data) => data.clone(),
            Self::List(items) => items.iter().map(Self::to_json).collect(),
            Self::Outcome(outcome) => match outcome.as_ref() {
                Settlement::Fulfilled { value } => {
                    json!({"state": "fulfilled", "value": value.to_json()})
                }
                Settlement::Rejected { reason } => {
                    json!({"state": "rejected", "reason": reason.to_json()})
                }
            },
            Self::Error(err) => json!({"error": err.to_string()}),
            Self::Future(future) => {
                json!({"future": future.id().value(), "state": future.state().as_str()})
            }
            Self::Foreign(_) => json!({"future_like": true}),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Data(a), Self::Data(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Outcome(a), Self::Outcome(b)) => a == b,
            (Self::Error(a), Self::Error(b)) => a == b,
            (Self::Future(a), Self::Future(b)) => a.ptr_eq(b),
            (Self::Foreign(a), Self::Foreign(b)) => ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Data(data) => write!(f, "Data({data})"),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
            Self::Outcome(outcome) => f.debug_tuple("Outcome").field(outcome).finish(),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Future(future) => write!(f, "Future({future})"),
            Self::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Data(data) => write!(f, "{data}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Outcome(outcome) => write!(f, "{{{}: {}}}", outcome.state(), outcome.payload()),
            Self::Error(err) => write!(f, "{err}"),
            Self::Future(future) => write!(f, "{future}"),
            Self::Foreign(_) => f.write_str("[future-like]"),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}

macro_rules! impl_from_data {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Data(serde_json::Value::from(value))
                }
            }
        )*
    };
}

impl_from_data!(i32, i64, u32, u64, f64, bool, String);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Data(serde_json::Value::from(value))
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Data(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<Settlement<Value>> for Value {
    fn from(outcome: Settlement<Value>) -> Self {
        Self::Outcome(Box::new(outcome))
    }
}

impl From<FutureError> for Value {
    fn from(err: FutureError) -> Self {
        Self::Error(err)
    }
}

impl From<Future> for Value {
    fn from(future: Future) -> Self {
        Self::Future(future)
    }
}

impl From<&Future> for Value {
    fn from(future: &Future) -> Self {
        Self::Future(future.clone())
    }
}
