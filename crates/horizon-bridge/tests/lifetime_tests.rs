//! Proxy finalization, deferred destruction and timed calls.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{FakeObject, Harness, counting_callable};
use horizon_bridge::{
    Bridge, ManagedCallable, ManagedError, ManagedObject, ManagedProxy, ManagedValue, NativeToolkit,
    ProxyState,
};
use horizon_bridge::scheduler::MAX_DELAY;
use parking_lot::Mutex;

#[test]
fn test_owned_widget_is_destroyed_by_the_pump_after_detach() {
    let h = Harness::new();
    let object = FakeObject::new("Button");
    let proxy = ManagedProxy::create(&h.bridge, "Button", &object.as_managed());
    let widget = proxy.widget();

    let registry = Arc::clone(h.bridge.registry());
    let unregistered_first = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&unregistered_first);
    h.toolkit.set_on_destroy(move |destroyed| {
        *seen.lock() = Some(registry.lookup(destroyed).is_none() && registry.name_of(destroyed).is_none());
    });

    drop(proxy);
    assert!(h.bridge.lookup_proxy(widget).is_none());
    assert!(h.toolkit.is_alive(widget));

    assert_eq!(h.bridge.process_pending(), 1);
    assert_eq!(*unregistered_first.lock(), Some(true));
    assert!(!h.toolkit.is_alive(widget));
}

#[test]
fn test_proxy_finalized_off_thread_defers_destruction() {
    let h = Harness::new();
    let object = FakeObject::new("Button");
    let proxy = ManagedProxy::create(&h.bridge, "Button", &object.as_managed());
    let widget = proxy.widget();
    let wakes = h.toolkit.wakes();

    std::thread::spawn(move || drop(proxy)).join().unwrap();

    assert!(h.toolkit.wakes() > wakes);
    assert!(h.toolkit.is_alive(widget));
    h.bridge.process_pending();
    assert!(!h.toolkit.is_alive(widget));
}

#[test]
fn test_borrowed_widget_is_never_destroyed() {
    let h = Harness::new();
    let object = FakeObject::new("Panel");
    let (widget, proxy) = h.widget_with(&object);

    drop(proxy);
    h.bridge.process_pending();

    assert!(h.toolkit.is_alive(widget));
    assert!(h.toolkit.log().iter().all(|entry| !entry.starts_with("destroy:")));
}

#[test]
fn test_destroy_is_skipped_when_widget_was_adopted_again() {
    let h = Harness::new();
    let object = FakeObject::new("Button");
    let proxy = ManagedProxy::create(&h.bridge, "Button", &object.as_managed());
    let widget = proxy.widget();

    drop(proxy);
    let adopted = ManagedProxy::adopt(&h.bridge, widget, &object.as_managed());
    h.bridge.process_pending();

    assert!(h.toolkit.is_alive(widget));
    assert_eq!(adopted.state(), ProxyState::Bound(widget));
}

#[test]
fn test_widget_destroyed_cancels_owned_timers() {
    let h = Harness::new();
    let object = FakeObject::new("Panel");
    let (widget, proxy) = h.widget_with(&object);
    let counter = Arc::new(AtomicUsize::new(0));

    h.bridge.schedule_timed_call(
        Some(widget),
        Duration::ZERO,
        Some(counting_callable(Arc::clone(&counter))),
        Vec::new(),
    );
    h.bridge.widget_destroyed(widget);
    h.bridge.process_pending();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(h.bridge.scheduler().is_empty());
    assert_eq!(proxy.state(), ProxyState::Detached);
}

#[test]
fn test_zero_delay_call_waits_for_the_next_iteration() {
    let h = Harness::new();
    let inner = Arc::new(AtomicUsize::new(0));

    let bridge = Arc::downgrade(&h.bridge);
    let inner_counter = Arc::clone(&inner);
    let outer: Arc<dyn ManagedCallable> = Arc::new(move |_: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
        if let Some(bridge) = bridge.upgrade() {
            bridge.schedule_timed_call(
                None,
                Duration::ZERO,
                Some(counting_callable(Arc::clone(&inner_counter))),
                Vec::new(),
            );
        }
        Ok(ManagedValue::None)
    });

    h.bridge.schedule_timed_call(None, Duration::ZERO, Some(outer), Vec::new());
    assert_eq!(inner.load(Ordering::SeqCst), 0);

    h.bridge.process_pending();
    assert_eq!(inner.load(Ordering::SeqCst), 0);

    h.bridge.process_pending();
    assert_eq!(inner.load(Ordering::SeqCst), 1);
}

#[test]
fn test_timed_call_releases_its_references() {
    let h = Harness::new();
    let argument = FakeObject::new("Document");
    let callable_owner = FakeObject::new("Owner");
    let captured = Arc::clone(&callable_owner);
    let callable: Arc<dyn ManagedCallable> = Arc::new(move |args: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
        assert_eq!(captured.type_name(), "Owner");
        assert_eq!(args.len(), 1);
        Err(ManagedError::new("InvalidValue", "timed call release check"))
    });

    h.bridge.schedule_timed_call(
        None,
        Duration::ZERO,
        Some(callable),
        vec![ManagedValue::Object(argument.as_managed())],
    );
    assert_eq!(Arc::strong_count(&argument), 2);
    assert_eq!(Arc::strong_count(&callable_owner), 2);

    h.bridge.process_pending();
    assert_eq!(Arc::strong_count(&argument), 1);
    assert_eq!(Arc::strong_count(&callable_owner), 1);
    assert_eq!(h.toolkit.exceptions(), vec!["InvalidValue: timed call release check".to_string()]);
}

#[test]
fn test_timer_without_callable_runs_on_timer() {
    let h = Harness::new();
    let object = FakeObject::new("Clock");
    object.returning("on-timer", ManagedValue::None);
    let (widget, _proxy) = h.widget_with(&object);

    h.bridge.schedule_timed_call(Some(widget), Duration::ZERO, None, Vec::new());
    h.bridge.process_pending();

    assert_eq!(object.count("on-timer"), 1);
}

#[test]
fn test_timer_without_callable_or_owner_is_dropped() {
    let h = Harness::new();
    h.bridge.schedule_timed_call(None, Duration::ZERO, None, Vec::new());
    h.bridge.process_pending();

    assert!(h.bridge.scheduler().is_empty());
    assert!(h.toolkit.exceptions().is_empty());
}

#[test]
fn test_delayed_call_fires_once_due() {
    let h = Harness::new();
    let counter = Arc::new(AtomicUsize::new(0));

    h.bridge.schedule_timed_call(
        None,
        Duration::from_millis(20),
        Some(counting_callable(Arc::clone(&counter))),
        Vec::new(),
    );
    h.bridge.process_pending();
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(h.bridge.time_until_next_timer().is_some());

    std::thread::sleep(Duration::from_millis(40));
    h.bridge.process_pending();
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(h.bridge.time_until_next_timer().is_none());
}

#[test]
fn test_cancelled_call_never_fires() {
    let h = Harness::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let id = h.bridge.schedule_timed_call(
        None,
        Duration::ZERO,
        Some(counting_callable(Arc::clone(&counter))),
        Vec::new(),
    );
    assert!(h.bridge.cancel_timed_call(id));
    assert!(!h.bridge.cancel_timed_call(id));
    h.bridge.process_pending();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_calls_scheduled_off_thread_fire_on_the_ui_thread() {
    let h = Harness::new();
    let fired_on = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&fired_on);
    let callable: Arc<dyn ManagedCallable> = Arc::new(move |_: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
        *sink.lock() = Some(std::thread::current().id());
        Ok(ManagedValue::None)
    });
    let bridge: Arc<Bridge> = Arc::clone(&h.bridge);
    std::thread::spawn(move || {
        bridge.schedule_timed_call(None, Duration::ZERO, Some(callable), Vec::new());
    })
    .join()
    .unwrap();

    assert_eq!(*fired_on.lock(), None);
    h.bridge.process_pending();
    assert_eq!(*fired_on.lock(), Some(std::thread::current().id()));
}

#[test]
fn test_huge_delay_is_clamped_instead_of_panicking() {
    let h = Harness::new();
    let counter = Arc::new(AtomicUsize::new(0));

    let id = h.bridge.schedule_timed_call(
        None,
        Duration::MAX,
        Some(counting_callable(Arc::clone(&counter))),
        Vec::new(),
    );
    h.bridge.process_pending();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert!(h.bridge.scheduler().is_pending(id));
    let remaining = h.bridge.time_until_next_timer().unwrap();
    assert!(remaining > Duration::from_secs(60 * 60 * 24 * 365));
    assert!(remaining <= MAX_DELAY);
    assert!(h.bridge.cancel_timed_call(id));
}

#[test]
fn test_cancel_drops_queued_entries() {
    let h = Harness::new();
    let object = FakeObject::new("Panel");
    let (widget, _proxy) = h.widget_with(&object);
    let far = Duration::from_secs(3600);

    let ids: Vec<_> = (0..64)
        .map(|_| {
            let callable = counting_callable(Arc::new(AtomicUsize::new(0)));
            h.bridge.schedule_timed_call(None, far, Some(callable), Vec::new())
        })
        .collect();
    for _ in 0..3 {
        h.bridge.schedule_timed_call(Some(widget), far, None, Vec::new());
    }
    assert_eq!(h.bridge.scheduler().queued(), 67);

    for id in ids {
        assert!(h.bridge.cancel_timed_call(id));
    }
    assert_eq!(h.bridge.scheduler().queued(), 3);

    h.bridge.widget_destroyed(widget);
    assert_eq!(h.bridge.scheduler().queued(), 0);
    assert!(h.bridge.time_until_next_timer().is_none());
}
