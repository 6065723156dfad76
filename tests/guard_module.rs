use webswarm::action::{Action, ActionKind};
use webswarm::guard::LoopGuard;
use webswarm::page::{InteractiveElement, Link, PageState};

fn empty_page() -> PageState {
    PageState {
        url: "https://app.test/".to_string(),
        title: "Home".to_string(),
        interactive_elements: Vec::new(),
        links: Vec::new(),
        forms: Vec::new(),
        images: Vec::new(),
        errors: Vec::new(),
        observed_at: 1,
        worker_id: 0,
    }
}

fn element(selector: &str) -> InteractiveElement {
    InteractiveElement {
        selector: selector.to_string(),
        text: selector.trim_start_matches('#').to_string(),
        kind: "button".to_string(),
    }
}

fn link(url: &str) -> Link {
    Link {
        url: url.to_string(),
        text: "link".to_string(),
    }
}

#[test]
fn three_repeats_in_last_five_trigger_loop_detection() {
    let mut guard = LoopGuard::new(10, 5, 3);
    guard.track(&Action::click("#a"));
    guard.track(&Action::click("#b"));
    guard.track(&Action::click("#a"));
    guard.track(&Action::click("#c"));
    guard.track(&Action::click("#a"));
    assert!(guard.is_looping());
}

#[test]
fn two_repeats_in_last_five_do_not_trigger() {
    let mut guard = LoopGuard::new(10, 5, 3);
    guard.track(&Action::click("#a"));
    guard.track(&Action::click("#b"));
    guard.track(&Action::click("#a"));
    guard.track(&Action::click("#c"));
    guard.track(&Action::click("#d"));
    assert!(!guard.is_looping());
}

#[test]
fn detection_looks_only_at_the_recent_window() {
    let mut guard = LoopGuard::new(10, 5, 3);
    // Three old repeats pushed out of the window by five distinct actions.
    for _ in 0..3 {
        guard.track(&Action::click("#old"));
    }
    for idx in 0..5 {
        guard.track(&Action::click(format!("#fresh-{idx}")));
    }
    assert!(!guard.is_looping());
}

#[test]
fn reasoning_differences_do_not_defeat_detection() {
    let mut guard = LoopGuard::new(10, 5, 3);
    guard.track(&Action::click("#a").with_reasoning("first try"));
    guard.track(&Action::scroll());
    guard.track(&Action::click("#a").with_reasoning("second look"));
    guard.track(&Action::scroll());
    guard.track(&Action::click("#a").with_reasoning("why not"));
    assert!(guard.is_looping());
}

#[test]
fn fallback_prefers_untried_element_over_link() {
    let mut page = empty_page();
    page.interactive_elements.push(element("#fresh"));
    page.links.push(link("https://app.test/about"));

    let guard = LoopGuard::new(10, 5, 3);
    let action = guard.fallback_action(&page);
    assert_eq!(action.kind, ActionKind::Click { selector: "#fresh".to_string() });
}

#[test]
fn fallback_skips_recently_tried_elements() {
    let mut page = empty_page();
    page.interactive_elements.push(element("#tried"));
    page.links.push(link("https://app.test/about"));

    let mut guard = LoopGuard::new(10, 5, 3);
    guard.track(&Action::click("#tried"));
    let action = guard.fallback_action(&page);
    assert_eq!(
        action.kind,
        ActionKind::Navigate {
            url: "https://app.test/about".to_string()
        }
    );
}

#[test]
fn fallback_link_filter_rejects_javascript_and_bare_fragments() {
    let mut page = empty_page();
    page.links.push(link("javascript:void(0)"));
    page.links.push(link("https://app.test/page#"));
    page.links.push(link("https://app.test/real"));

    let guard = LoopGuard::new(10, 5, 3);
    let action = guard.fallback_action(&page);
    assert_eq!(
        action.kind,
        ActionKind::Navigate {
            url: "https://app.test/real".to_string()
        }
    );
}

#[test]
fn fallback_scrolls_when_nothing_else_exists() {
    let guard = LoopGuard::new(10, 5, 3);
    let action = guard.fallback_action(&empty_page());
    assert_eq!(action.kind, ActionKind::Scroll);
}

#[test]
fn fallback_candidate_is_none_on_an_empty_page() {
    let guard = LoopGuard::new(10, 5, 3);
    assert!(guard.fallback_candidate(&empty_page()).is_none());
}

#[test]
fn thresholds_are_parameters_not_constants() {
    let mut guard = LoopGuard::new(6, 3, 2);
    guard.track(&Action::click("#a"));
    guard.track(&Action::click("#b"));
    guard.track(&Action::click("#a"));
    assert!(guard.is_looping(), "2-of-3 window configuration");

    let mut strict = LoopGuard::new(10, 5, 5);
    for _ in 0..4 {
        strict.track(&Action::click("#a"));
    }
    strict.track(&Action::click("#b"));
    assert!(!strict.is_looping(), "5-of-5 requires every entry identical");
}
