//! Tests for query configuration, dispatch, retry and failure reporting

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{init_tracing, Counters, CountingElement, Notepad};
use crate::{
    AutomationError, Clock, ControlType, Element, ManualClock, MemoryElement, RetryPolicy, Scope,
    Search, TreeScope,
};

/// A manual clock that runs a hook on every sleep, used to change the tree
/// while a query is polling.
struct ScriptedClock {
    clock: ManualClock,
    sleeps: Mutex<usize>,
    on_sleep: Box<dyn Fn(usize) + Send + Sync>,
}

impl std::fmt::Debug for ScriptedClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedClock").field("clock", &self.clock).finish()
    }
}

impl ScriptedClock {
    fn new(on_sleep: impl Fn(usize) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            clock: ManualClock::new(),
            sleeps: Mutex::new(0),
            on_sleep: Box::new(on_sleep),
        })
    }

    fn sleeps(&self) -> usize {
        *self.sleeps.lock().unwrap()
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> Instant {
        self.clock.now()
    }

    fn sleep(&self, duration: Duration) {
        self.clock.sleep(duration);
        let sleeps = {
            let mut sleeps = self.sleeps.lock().unwrap();
            *sleeps += 1;
            *sleeps
        };
        (self.on_sleep)(sleeps);
    }
}

fn policy(timeout_ms: u64) -> RetryPolicy {
    RetryPolicy::with_timeout(Duration::from_millis(timeout_ms)).interval(Duration::from_millis(100))
}

#[test]
fn default_scope_returns_the_anchor_itself() {
    let notepad = Notepad::new();
    let found = notepad.dialog.build_find().first().unwrap();
    assert_eq!(found, notepad.dialog);

    let all = notepad.dialog.build_find().all().unwrap();
    assert_eq!(all, vec![notepad.dialog.clone()]);
}

#[test]
fn conditions_without_a_scope_are_rejected() {
    let notepad = Notepad::new();
    let err = notepad.window.build_find().by_name("Save").first_or_default().unwrap_err();
    match err {
        AutomationError::InvalidQuery(msg) => assert!(msg.contains("no search scope"), "{msg}"),
        other => panic!("expected InvalidQuery, got {other:?}"),
    }
}

#[test]
fn flat_scopes_require_exactly_one_condition() {
    let notepad = Notepad::new();

    for scope in [
        Scope::Element,
        Scope::Descendants,
        Scope::Subtree,
        Scope::Parent,
        Scope::Ancestors,
    ] {
        let none = notepad.save.build_find().scope(scope).first_or_default();
        match none {
            Err(AutomationError::InvalidQuery(msg)) => {
                assert!(msg.contains(&scope.to_string()), "{msg}");
                assert!(msg.contains("got 0"), "{msg}");
            }
            other => panic!("{scope}: expected InvalidQuery, got {other:?}"),
        }

        let two = notepad
            .save
            .build_find()
            .scope(scope)
            .by_name("Save")
            .by_control_type(ControlType::Button)
            .all();
        match two {
            Err(AutomationError::InvalidQuery(msg)) => assert!(msg.contains("got 2"), "{msg}"),
            other => panic!("{scope}: expected InvalidQuery, got {other:?}"),
        }
    }
}

#[test]
fn single_condition_without_retry_searches_exactly_once() {
    let notepad = Notepad::new();
    let anchor = CountingElement::new(notepad.window.clone());

    let found = anchor
        .build_find()
        .in_descendants()
        .by_name("Save")
        .first_or_default()
        .unwrap();
    assert_eq!(found.map(|e| e.inner), Some(notepad.save.clone()));
    assert_eq!(Counters::get(&anchor.counters.find_first), 1);

    let missing = anchor.build_find().in_descendants().by_name("Print").first();
    assert!(matches!(missing, Err(AutomationError::ElementNotFound(_))));
    assert_eq!(Counters::get(&anchor.counters.find_first), 2);
    assert_eq!(Counters::get(&anchor.counters.nested), 0);
}

#[test]
fn children_scope_uses_the_nested_search() {
    let notepad = Notepad::new();
    let anchor = CountingElement::new(notepad.window.clone());

    let found = anchor
        .build_find()
        .in_children()
        .by_name("Dialog")
        .by_name("Save")
        .first()
        .unwrap();

    assert_eq!(found.inner, notepad.save);
    assert_eq!(Counters::get(&anchor.counters.nested), 1);
}

#[test]
fn last_scope_wins() {
    let notepad = Notepad::new();
    let found = notepad
        .window
        .build_find()
        .in_children()
        .in_parent()
        .in_descendants()
        .by_name("File")
        .first()
        .unwrap();
    assert_eq!(found, notepad.file_item);
}

#[test]
fn modifier_log_has_one_entry_per_call_with_values_verbatim() {
    let notepad = Notepad::new();
    let builder = notepad
        .window
        .build_find()
        .in_descendants()
        .by_automation_id("txt Add-New #1")
        .parent()
        .child()
        .retry(Duration::from_secs(3));

    assert_eq!(
        builder.modifiers(),
        [
            "Scope: Descendants",
            "AutomationId: txt Add-New #1",
            "Action: Parent",
            "Action: Child",
            "Retry: timeout 3s, interval 100ms",
        ]
    );
    assert_eq!(
        builder.to_string(),
        "Query modifiers:\n1. Scope: Descendants\n2. AutomationId: txt Add-New #1\n\
         3. Action: Parent\n4. Action: Child\n5. Retry: timeout 3s, interval 100ms"
    );
}

#[test]
fn every_condition_kind_is_logged_and_searchable() {
    let notepad = Notepad::new();
    let window = &notepad.window;

    let by_class = window.build_find().in_descendants().by_class_name("Edit");
    assert_eq!(by_class.modifiers()[1], "ClassName: Edit");
    assert_eq!(by_class.first().unwrap(), notepad.document);

    let by_help = window.build_find().in_descendants().by_help_text("Save the document");
    assert_eq!(by_help.modifiers()[1], "HelpText: Save the document");
    assert_eq!(by_help.first().unwrap(), notepad.save);

    let by_text = window.build_find().in_descendants().by_text("Save changes?");
    assert_eq!(by_text.modifiers()[1], "Text: Save changes?");
    assert_eq!(by_text.first().unwrap(), notepad.prompt);

    let by_pid = window.build_find().in_subtree().by_process_id(4242);
    assert_eq!(by_pid.modifiers()[1], "ProcessId: 4242");
    assert_eq!(by_pid.first().unwrap(), notepad.window);

    let by_framework = window.build_find().in_descendants().by_framework_id("WPF");
    assert_eq!(by_framework.modifiers()[1], "FrameworkId: WPF");
    assert!(by_framework.first_or_default().unwrap().is_none());

    let by_localized = window
        .build_find()
        .in_descendants()
        .by_localized_control_type("button");
    assert_eq!(by_localized.modifiers()[1], "LocalizedControlType: button");
    assert!(by_localized.first_or_default().unwrap().is_none());
}

#[test]
fn custom_condition_is_logged_through_its_display() {
    let notepad = Notepad::new();
    let builder = notepad.window.build_find().in_descendants().by(|cf| {
        cf.by_control_type(ControlType::Button)
            .and(cf.by_name("Save").not())
    });

    assert_eq!(
        builder.modifiers()[1],
        "Condition: (ControlType == Button AND NOT Name == 'Save')"
    );
    assert_eq!(builder.first().unwrap().name().as_deref(), Some("Cancel"));
}

#[test]
fn first_failure_lists_every_modifier_in_order() {
    init_tracing();
    let notepad = Notepad::new();

    let err = notepad
        .window
        .build_find()
        .in_children()
        .by_name("Foo")
        .by_control_type(ControlType::Button)
        .parent()
        .first()
        .unwrap_err();

    let msg = match err {
        AutomationError::ElementNotFound(msg) => msg,
        other => panic!("expected ElementNotFound, got {other:?}"),
    };
    let positions: Vec<usize> = ["Scope: Children", "Name: Foo", "ControlType: Button", "Action: Parent"]
        .iter()
        .map(|needle| msg.find(needle).unwrap_or_else(|| panic!("{needle} missing from {msg}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{msg}");
    assert!(msg.contains("1. Scope: Children"), "{msg}");
    assert!(msg.contains("4. Action: Parent"), "{msg}");
}

#[test]
fn retried_first_searches_once_more_after_the_deadline() {
    let notepad = Notepad::new();
    let anchor = CountingElement::new(notepad.window.clone());
    let clock = Arc::new(ManualClock::new());

    let err = anchor
        .build_find()
        .in_descendants()
        .by_name("Print")
        .retry(policy(300))
        .with_clock(clock.clone())
        .first()
        .unwrap_err();

    assert!(matches!(err, AutomationError::ElementNotFound(ref m) if m.contains("Retry: timeout 300ms")));
    // Polls at 0, 100, 200 and 300ms, then one direct search.
    assert_eq!(Counters::get(&anchor.counters.find_first), 5);
    assert_eq!(clock.elapsed(), Duration::from_millis(300));
}

#[test]
fn retry_finds_an_element_that_appears_while_polling() {
    let notepad = Notepad::new();
    let dialog = notepad.dialog.clone();
    let clock = ScriptedClock::new(move |sleeps| {
        if sleeps == 2 {
            dialog.append(MemoryElement::new(ControlType::Button).with_name("Don't Save")).unwrap();
        }
    });

    let found = notepad
        .window
        .build_find()
        .in_descendants()
        .by_name("Don't Save")
        .retry(policy(1_000))
        .with_clock(clock.clone())
        .first()
        .unwrap();

    assert_eq!(found.name().as_deref(), Some("Don't Save"));
    assert_eq!(clock.sleeps(), 2);
}

#[test]
fn without_enough_time_the_late_element_is_missed() {
    let notepad = Notepad::new();
    let dialog = notepad.dialog.clone();
    let clock = ScriptedClock::new(move |sleeps| {
        if sleeps == 5 {
            dialog.append(MemoryElement::new(ControlType::Button).with_name("Don't Save")).unwrap();
        }
    });

    let found = notepad
        .window
        .build_find()
        .in_descendants()
        .by_name("Don't Save")
        .retry(policy(300))
        .with_clock(clock.clone())
        .first_or_default()
        .unwrap();

    assert!(found.is_none());
    assert_eq!(clock.sleeps(), 3);
}

#[test]
fn all_waits_for_a_non_empty_result_under_retry() {
    let notepad = Notepad::new();
    let menu_bar = notepad.menu_bar.clone();
    let clock = ScriptedClock::new(move |sleeps| {
        if sleeps == 1 {
            menu_bar.append(MemoryElement::new(ControlType::MenuItem).with_name("Format")).unwrap();
            menu_bar.append(MemoryElement::new(ControlType::MenuItem).with_name("Format")).unwrap();
        }
    });

    let all = notepad
        .window
        .build_find()
        .in_descendants()
        .by_name("Format")
        .retry(policy(500))
        .with_clock(clock)
        .all()
        .unwrap();
    assert_eq!(all.len(), 2);

    let none = notepad
        .window
        .build_find()
        .in_descendants()
        .by_name("View")
        .retry(policy(200))
        .with_clock(Arc::new(ManualClock::new()))
        .all()
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn all_returns_every_match_in_tree_order() {
    let notepad = Notepad::new();
    let buttons = notepad
        .window
        .build_find()
        .in_descendants()
        .by_control_type(ControlType::Button)
        .all()
        .unwrap();

    let names: Vec<_> = buttons.iter().filter_map(|b| b.name()).collect();
    assert_eq!(names, ["Save", "Cancel"]);
}

#[test]
fn provider_errors_propagate_unless_ignored() {
    let notepad = Notepad::new();
    let detached = notepad.dialog.clone();
    notepad.dialog.remove();

    let err = detached
        .build_find()
        .in_descendants()
        .by_name("Save")
        .retry(policy(300))
        .with_clock(Arc::new(ManualClock::new()))
        .first_or_default()
        .unwrap_err();
    assert!(matches!(err, AutomationError::ElementDetached(_)));

    let swallowed = detached
        .build_find()
        .in_descendants()
        .by_name("Save")
        .retry(policy(300).ignore_errors(true))
        .with_clock(Arc::new(ManualClock::new()))
        .first_or_default()
        .unwrap();
    assert!(swallowed.is_none());
}

#[test]
fn ignored_errors_still_end_in_a_not_found_report() {
    let notepad = Notepad::new();
    let detached = notepad.dialog.clone();
    notepad.dialog.remove();

    let err = detached
        .build_find()
        .in_descendants()
        .by_name("Save")
        .retry(policy(300).ignore_errors(true))
        .with_clock(Arc::new(ManualClock::new()))
        .first()
        .unwrap_err();

    match err {
        AutomationError::ElementNotFound(msg) => {
            assert!(msg.contains("2. Name: Save"), "{msg}");
            assert!(msg.contains("ignoring errors"), "{msg}");
        }
        other => panic!("expected ElementNotFound, got {other:?}"),
    }
}

#[test]
fn resolved_searches_dispatch_by_variant() {
    let notepad = Notepad::new();
    let cf = notepad.window.condition_factory();

    let nested = Search::nested([cf.by_name("Application"), cf.by_name("File")]);
    assert_eq!(nested.first(&notepad.window).unwrap(), Some(notepad.file_item.clone()));

    let scoped = Search::scoped(TreeScope::Children, cf.by_control_type(ControlType::Pane));
    assert_eq!(scoped.all(&notepad.window).unwrap(), vec![notepad.dialog.clone()]);

    assert_eq!(
        Search::resolve(Scope::Descendants, &[cf.by_name("Save")]).unwrap(),
        Search::scoped(TreeScope::Descendants, cf.by_name("Save"))
    );
    assert_eq!(Search::resolve(Scope::Anchor, &[]).unwrap(), Search::Anchor);
    assert_eq!(
        Search::Anchor.first(&notepad.save).unwrap(),
        Some(notepad.save.clone())
    );
}
