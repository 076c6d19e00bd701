//! Unwrapping of nested and foreign future-like values.

use std::cell::{Cell, RefCell};
use std::num::NonZeroUsize;
use std::rc::Rc;

use pledge_core::{EventLoop, EventLoopConfig, Future, FutureError, Notify, State, Value};

use crate::common::{
    FailingLookup, NoThen, Scripted, delayed_fulfill, delayed_reject, deferred, scripted,
};

#[test]
fn flattens_two_levels_of_asynchronous_nesting() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let r = delayed_fulfill(&event_loop, 5, "deep");
    let q = Future::new(&scheduler, move |settle_q| {
        settle_q.fulfill(r);
        Ok(())
    });
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(q.clone());

    event_loop.run_microtasks().unwrap();
    assert_eq!(outer.state(), State::Pending);
    assert_eq!(q.state(), State::Pending);

    event_loop.run_until_idle().unwrap();
    assert_eq!(q.value(), Some(Value::from("deep")));
    assert_eq!(outer.value(), Some(Value::from("deep")));
    assert_eq!(event_loop.now_ms(), 5);
}

#[test]
fn deeply_nested_chain_unwraps_without_recursion_limits() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();

    let mut current = Future::resolve(&scheduler, "bottom");
    for _ in 0..500 {
        let inner = current.clone();
        current = Future::new(&scheduler, move |settle| {
            settle.fulfill(inner);
            Ok(())
        });
    }
    event_loop.run_until_idle().unwrap();

    assert_eq!(current.value(), Some(Value::from("bottom")));
}

#[test]
fn resolving_with_itself_rejects_immediately() {
    let event_loop = EventLoop::new();
    let (future, settle) = deferred(&event_loop);

    settle.fulfill(&future);

    assert_eq!(
        future.reason(),
        Some(Value::Error(FutureError::SelfResolution))
    );
}

#[test]
fn adopts_rejection_of_nested_future() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(delayed_reject(&event_loop, 3, "nested failure"));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.reason(), Some(Value::from("nested failure")));
}

#[test]
fn foreign_then_is_invoked_on_a_later_turn() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(|on_fulfilled, _| {
        on_fulfilled(Value::from("sync"));
        Ok(())
    }));
    assert!(outer.is_pending());

    event_loop.run_microtasks().unwrap();
    assert_eq!(outer.value(), Some(Value::from("sync")));
}

fn nested_foreign(depth: usize) -> Value {
    scripted(move |on_fulfilled, _| {
        let next = if depth == 0 {
            Value::from("bottom")
        } else {
            nested_foreign(depth - 1)
        };
        on_fulfilled(next);
        Ok(())
    })
}

#[test]
fn deeply_nested_synchronous_foreign_chain_does_not_grow_the_stack() {
    let event_loop = EventLoop::with_config(EventLoopConfig {
        microtask_budget: NonZeroUsize::new(1_000_000).unwrap(),
        ..EventLoopConfig::default()
    });
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(nested_foreign(100_000));
    let stats = event_loop.run_until_idle().unwrap();

    assert_eq!(outer.value(), Some(Value::from("bottom")));
    assert_eq!(stats.microtasks_run, 100_001);
}

#[test]
fn first_notification_wins() {
    let event_loop = EventLoop::new();

    let (fulfilled_first, settle) = deferred(&event_loop);
    settle.fulfill(scripted(|on_fulfilled, on_rejected| {
        on_fulfilled(Value::from("win"));
        on_rejected(Value::from("lose"));
        on_fulfilled(Value::from("lose again"));
        Ok(())
    }));

    let (rejected_first, settle) = deferred(&event_loop);
    settle.fulfill(scripted(|on_fulfilled, on_rejected| {
        on_rejected(Value::from("first"));
        on_rejected(Value::from("second"));
        on_fulfilled(Value::from("third"));
        Ok(())
    }));
    event_loop.run_until_idle().unwrap();

    assert_eq!(fulfilled_first.value(), Some(Value::from("win")));
    assert_eq!(rejected_first.reason(), Some(Value::from("first")));
}

#[test]
fn failure_after_notification_is_ignored() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(|on_fulfilled, _| {
        on_fulfilled(Value::from(1));
        Err(Value::from("too late"))
    }));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.value(), Some(Value::from(1)));
}

#[test]
fn failure_before_notification_rejects() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(|_, _| Err(Value::from("then failed"))));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.reason(), Some(Value::from("then failed")));
}

#[test]
fn panicking_then_rejects() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(|_, _| panic!("then exploded")));
    let stats = event_loop.run_until_idle().unwrap();
    assert_eq!(stats.panicked, 0);

    assert_eq!(
        outer.reason(),
        Some(Value::Error(FutureError::panicked("then exploded")))
    );
}

#[test]
fn failing_then_lookup_rejects_and_is_read_once() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);
    let reads = Rc::new(Cell::new(0));

    settle.fulfill(Value::foreign(FailingLookup {
        reason: Value::from("getter failed"),
        reads: reads.clone(),
    }));

    assert_eq!(outer.reason(), Some(Value::from("getter failed")));
    assert_eq!(reads.get(), 1);
}

#[test]
fn then_member_is_looked_up_once_per_resolution() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);
    let object = Scripted::new(|on_fulfilled, _| {
        on_fulfilled(Value::from("ok"));
        Ok(())
    });
    let reads = object.reads();

    settle.fulfill(Value::foreign(object));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.value(), Some(Value::from("ok")));
    assert_eq!(reads.get(), 1);
}

#[test]
fn object_without_callable_then_is_a_plain_value() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);
    let object = Value::foreign(NoThen);

    settle.fulfill(object.clone());

    assert_eq!(outer.value(), Some(object));
}

#[test]
fn foreign_notifying_later_is_adopted_when_it_fires() {
    let event_loop = EventLoop::new();
    let timers = event_loop.clone();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(move |on_fulfilled, _| {
        timers.set_timeout(7, move || on_fulfilled(Value::from("later")));
        Ok(())
    }));
    event_loop.run_microtasks().unwrap();
    assert!(outer.is_pending());

    event_loop.run_until_idle().unwrap();
    assert_eq!(outer.value(), Some(Value::from("later")));
}

#[test]
fn foreign_fulfilling_with_foreign_unwraps_recursively() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(|on_fulfilled, _| {
        on_fulfilled(scripted(|on_fulfilled, _| {
            on_fulfilled(scripted(|_, on_rejected| {
                on_rejected(Value::from("three levels down"));
                Ok(())
            }));
            Ok(())
        }));
        Ok(())
    }));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.reason(), Some(Value::from("three levels down")));
}

#[test]
fn foreign_fulfilling_with_native_future_adopts_it() {
    let event_loop = EventLoop::new();
    let scheduler = event_loop.scheduler();
    let native = Future::reject(&scheduler, "native reason");
    let (outer, settle) = deferred(&event_loop);

    settle.fulfill(scripted(move |on_fulfilled, _| {
        on_fulfilled(Value::from(&native));
        Ok(())
    }));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.reason(), Some(Value::from("native reason")));
}

#[test]
fn reentrant_notifiers_are_ignored_after_first_call() {
    let event_loop = EventLoop::new();
    let (outer, settle) = deferred(&event_loop);
    let stored: Rc<RefCell<Option<Notify>>> = Rc::new(RefCell::new(None));
    let keep = stored.clone();

    settle.fulfill(scripted(move |on_fulfilled, on_rejected| {
        *keep.borrow_mut() = Some(on_rejected);
        on_fulfilled(Value::from("kept"));
        Ok(())
    }));
    event_loop.run_until_idle().unwrap();
    let late = stored.borrow_mut().take().expect("script stored the notifier");
    late(Value::from("late rejection"));
    event_loop.run_until_idle().unwrap();

    assert_eq!(outer.value(), Some(Value::from("kept")));
}

#[test]
fn handler_returning_foreign_chains_next_future() {
    let event_loop = EventLoop::new();

    let next = Future::resolve(&event_loop.scheduler(), 1).then(|_| {
        Ok(scripted(|on_fulfilled, _| {
            on_fulfilled(Value::from("via foreign"));
            Ok(())
        }))
    });
    event_loop.run_until_idle().unwrap();

    assert_eq!(next.value(), Some(Value::from("via foreign")));
}
