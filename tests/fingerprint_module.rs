use webswarm::action::Action;
use webswarm::fingerprint::{action_fingerprint, element_fingerprint, page_fingerprint};

#[test]
fn page_fingerprint_ignores_query_strings() {
    assert_eq!(
        page_fingerprint("https://x/a?x=1", "T"),
        page_fingerprint("https://x/a?y=2", "T"),
    );
    assert_eq!(
        page_fingerprint("https://x/a", "T"),
        page_fingerprint("https://x/a?page=2&sort=asc", "T"),
    );
}

#[test]
fn page_fingerprint_distinguishes_paths_and_titles() {
    assert_ne!(
        page_fingerprint("https://x/a", "T"),
        page_fingerprint("https://x/b", "T"),
    );
    assert_ne!(
        page_fingerprint("https://x/a", "T"),
        page_fingerprint("https://x/a", "U"),
    );
}

#[test]
fn action_fingerprint_ignores_reasoning() {
    let terse = Action::click("#s");
    let verbose = Action::click("#s").with_reasoning("this button looked neglected");
    assert_eq!(action_fingerprint(&terse), action_fingerprint(&verbose));
}

#[test]
fn action_fingerprint_separates_kind_selector_and_url() {
    assert_ne!(
        action_fingerprint(&Action::click("#s")),
        action_fingerprint(&Action::fill("#s", "x")),
    );
    assert_ne!(
        action_fingerprint(&Action::navigate("https://x/a")),
        action_fingerprint(&Action::navigate("https://x/b")),
    );
}

#[test]
fn element_fingerprint_keys_on_selector_and_text() {
    assert_eq!(
        element_fingerprint("#save", "Save"),
        element_fingerprint("#save", "Save"),
    );
    assert_ne!(
        element_fingerprint("#save", "Save"),
        element_fingerprint("#save", "Submit"),
    );
    assert_ne!(
        element_fingerprint("#save", "Save"),
        element_fingerprint("#submit", "Save"),
    );
}

#[test]
fn fingerprints_are_stable_across_calls() {
    // Same logical input, same digest, always.
    for _ in 0..3 {
        assert_eq!(
            page_fingerprint("https://x/a?session=9f2", "Account"),
            page_fingerprint("https://x/a", "Account"),
        );
    }
}
