//! The demonstration scenarios. Each one builds its futures on the shared
//! loop and hands back the future whose outcome gets reported.

use pledge_core::{EventLoop, Future, FutureLike, Notify, Settlement, ThenFn, Value};

pub struct Scenario {
    pub name: &'static str,
    pub future: Future,
}

impl Scenario {
    fn new(name: &'static str, future: Future) -> Self {
        Self { name, future }
    }

    /// `pending`, `fulfilled <value>` or `rejected <reason>`.
    pub fn describe(&self) -> String {
        match self.future.settlement() {
            None => "pending".to_string(),
            Some(Settlement::Fulfilled { value }) => format!("fulfilled {value}"),
            Some(Settlement::Rejected { reason }) => format!("rejected {reason}"),
        }
    }
}

/// Build every scenario. Nothing settles until the loop runs.
pub fn schedule(event_loop: &EventLoop) -> Vec<Scenario> {
    vec![
        Scenario::new("chain", chain(event_loop)),
        Scenario::new("increment", increment(event_loop)),
        Scenario::new("recover", recover(event_loop)),
        Scenario::new("nested", nested(event_loop)),
        Scenario::new("foreign", foreign(event_loop)),
        Scenario::new("all", all(event_loop)),
        Scenario::new("race", race(event_loop)),
        Scenario::new("all_settled", all_settled(event_loop)),
    ]
}

/// A handler returns a rejected future; the rejection skips ahead to `catch`.
fn chain(event_loop: &EventLoop) -> Future {
    let scheduler = event_loop.scheduler();
    let inner_scheduler = scheduler.clone();
    Future::resolve(&scheduler, 22222)
        .then(move |_| Ok(Value::from(Future::reject(&inner_scheduler, "000000000"))))
        .catch(Ok)
}

fn increment(event_loop: &EventLoop) -> Future {
    Future::resolve(&event_loop.scheduler(), 1).then(|value| {
        let n = value.as_i64().unwrap_or_default();
        Ok(Value::from(n + 1))
    })
}

fn recover(event_loop: &EventLoop) -> Future {
    Future::new(&event_loop.scheduler(), |settle| {
        settle.reject("x");
        Ok(())
    })
    .catch(Ok)
}

/// Two levels of asynchronous nesting flatten to the innermost value.
fn nested(event_loop: &EventLoop) -> Future {
    let scheduler = event_loop.scheduler();
    let deep = after(event_loop, 5, Settlement::fulfilled(Value::from("deep")));
    let middle = Future::new(&scheduler, move |settle| {
        settle.fulfill(deep);
        Ok(())
    });
    Future::new(&scheduler, move |settle| {
        settle.fulfill(middle);
        Ok(())
    })
}

fn foreign(event_loop: &EventLoop) -> Future {
    Future::resolve(
        &event_loop.scheduler(),
        Value::foreign(Immediate(Value::from("from a future-like"))),
    )
}

fn all(event_loop: &EventLoop) -> Future {
    let scheduler = event_loop.scheduler();
    Future::all(
        &scheduler,
        [
            Future::resolve(&scheduler, 1),
            Future::resolve(&scheduler, 2),
            Future::reject(&scheduler, "e"),
        ],
    )
}

fn race(event_loop: &EventLoop) -> Future {
    Future::race(
        &event_loop.scheduler(),
        [
            after(event_loop, 10, Settlement::fulfilled(Value::from("slow"))),
            after(event_loop, 1, Settlement::fulfilled(Value::from("fast"))),
        ],
    )
}

fn all_settled(event_loop: &EventLoop) -> Future {
    Future::all_settled(
        &event_loop.scheduler(),
        vec![
            Value::from(after(event_loop, 4, Settlement::fulfilled(Value::from("ok")))),
            Value::from(after(event_loop, 8, Settlement::rejected(Value::from("bad")))),
            Value::from(3),
        ],
    )
}

/// A future that takes `outcome` once the loop's clock passes `delay_ms`.
fn after(event_loop: &EventLoop, delay_ms: u64, outcome: Settlement<Value>) -> Future {
    let timers = event_loop.clone();
    Future::new(&event_loop.scheduler(), move |settle| {
        timers.set_timeout(delay_ms, move || match outcome {
            Settlement::Fulfilled { value } => settle.fulfill(value),
            Settlement::Rejected { reason } => settle.reject(reason),
        });
        Ok(())
    })
}

/// A future-like from outside the library that fulfills as soon as it is
/// subscribed to.
struct Immediate(Value);

impl FutureLike for Immediate {
    fn then_member(&self) -> Result<Option<ThenFn>, Value> {
        let value = self.0.clone();
        Ok(Some(Box::new(move |on_fulfilled: Notify, _: Notify| {
            on_fulfilled(value);
            Ok(())
        })))
    }
}
