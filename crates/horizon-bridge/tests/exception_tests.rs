//! Exception escalation, deduplication and termination.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::Harness;
use horizon_bridge::{
    BridgeConfig, ExceptionChoice, ExceptionRecords, ManagedCallable, ManagedError, ManagedValue,
    ReportOutcome,
};

#[test]
fn test_suppressed_message_is_shown_once() {
    let h = Harness::new();
    h.toolkit.set_exception_choice(ExceptionChoice {
        terminate: false,
        suppress: true,
    });
    let message = "ArithmeticError: suppressed once";

    assert_eq!(h.bridge.report_managed_exception(message), ReportOutcome::Shown);
    assert!(ExceptionRecords::is_suppressed(message));
    assert_eq!(h.bridge.report_managed_exception(message), ReportOutcome::Suppressed);
    assert_eq!(h.toolkit.exceptions(), vec![message.to_string()]);
}

#[test]
fn test_unsuppressed_message_is_shown_every_time() {
    let h = Harness::new();
    let message = "LookupError: shown every time";

    h.bridge.report_managed_exception(message);
    h.bridge.report_managed_exception(message);

    assert_eq!(h.toolkit.exceptions().len(), 2);
    assert!(!ExceptionRecords::is_suppressed(message));
}

#[test]
fn test_off_thread_report_is_deferred_to_the_pump() {
    let h = Harness::new();
    let message = "RangeError: reported from a worker";

    let bridge = Arc::clone(&h.bridge);
    let outcome = std::thread::spawn(move || bridge.report_managed_exception(message))
        .join()
        .unwrap();

    assert_eq!(outcome, ReportOutcome::Deferred);
    assert!(h.toolkit.exceptions().is_empty());
    h.bridge.process_pending();
    assert_eq!(h.toolkit.exceptions(), vec![message.to_string()]);
}

#[test]
fn test_reports_defer_while_pumping_when_configured() {
    let h = Harness::with_config(BridgeConfig::new().report_off_thread_when_running(true));
    let bridge = Arc::downgrade(&h.bridge);
    let callable: Arc<dyn ManagedCallable> =
        Arc::new(move |_: &[ManagedValue]| -> Result<ManagedValue, ManagedError> {
            if let Some(bridge) = bridge.upgrade() {
                assert_eq!(
                    bridge.report_managed_exception("IoError: raised inside the pump"),
                    ReportOutcome::Deferred
                );
            }
            Ok(ManagedValue::None)
        });
    h.bridge
        .schedule_timed_call(None, Duration::ZERO, Some(callable), Vec::new());

    h.bridge.process_pending();
    assert!(h.toolkit.exceptions().is_empty());
    h.bridge.process_pending();
    assert_eq!(h.toolkit.exceptions(), vec!["IoError: raised inside the pump".to_string()]);
}

#[test]
fn test_grab_is_released_around_the_modal() {
    let h = Harness::new();
    let window = h.toolkit.add_window("Frame");
    h.bridge.grab_pointer(window);

    h.bridge.report_managed_exception("TypeError: modal during grab");

    let raw = window.as_raw();
    assert_eq!(
        h.toolkit.log(),
        vec![
            format!("grab:{raw}"),
            format!("release:{raw}"),
            "exception".to_string(),
            format!("grab:{raw}"),
        ]
    );
    assert_eq!(h.bridge.grab_tracker().current(), Some(window));
}

#[test]
fn test_new_grab_evicts_the_previous_one() {
    let h = Harness::new();
    let first = h.toolkit.add_window("Frame");
    let second = h.toolkit.add_window("Popup");

    h.bridge.grab_pointer(first);
    h.bridge.grab_pointer(second);
    assert_eq!(h.bridge.release_pointer(), Some(second));
    assert_eq!(h.bridge.release_pointer(), None);

    assert_eq!(
        h.toolkit.log(),
        vec![
            format!("grab:{}", first.as_raw()),
            format!("release:{}", first.as_raw()),
            format!("grab:{}", second.as_raw()),
            format!("release:{}", second.as_raw()),
        ]
    );
}

#[test]
fn test_destroyed_grabber_is_forgotten() {
    let h = Harness::new();
    let window = h.toolkit.add_window("Frame");
    h.bridge.grab_pointer(window);

    h.bridge.widget_destroyed(window);
    assert_eq!(h.bridge.grab_tracker().current(), None);
    assert_eq!(h.bridge.release_pointer(), None);
}

#[test]
fn test_terminate_quits_and_exits() {
    let h = Harness::new();
    h.toolkit.set_exception_choice(ExceptionChoice {
        terminate: true,
        suppress: false,
    });

    h.bridge.report_managed_exception("FatalError: user chose to terminate");

    assert!(h.toolkit.log().contains(&"quit".to_string()));
    assert_eq!(*h.terminated.lock(), vec![-1]);
}

#[test]
fn test_request_quit_goes_through_the_pump() {
    let h = Harness::new();
    assert!(h.bridge.request_quit());
    assert!(!h.toolkit.log().contains(&"quit".to_string()));

    h.bridge.process_pending();
    assert_eq!(h.toolkit.log(), vec!["quit".to_string()]);
}
