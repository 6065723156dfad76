//! Per-worker repetition guard.
//!
//! Keeps a bounded ring of recently selected actions, each reduced to
//! (kind, selector prefix) so noisy free-text fields cannot defeat the
//! comparison. Detection is cheap and strictly worker-local: it only has
//! to break one worker out of a degenerate cycle; global novelty is the
//! coordination store's job.

use crate::action::Action;
use crate::page::PageState;
use std::collections::{HashSet, VecDeque};

const SELECTOR_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TrackedAction {
    kind: &'static str,
    selector: String,
}

impl TrackedAction {
    fn reduce(action: &Action) -> Self {
        Self {
            kind: action.kind.tag(),
            selector: action
                .selector()
                .unwrap_or("")
                .chars()
                .take(SELECTOR_PREFIX_CHARS)
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct LoopGuard {
    tracked: VecDeque<TrackedAction>,
    cap: usize,
    window: usize,
    repeat_threshold: usize,
}

impl LoopGuard {
    pub fn new(cap: usize, window: usize, repeat_threshold: usize) -> Self {
        Self {
            tracked: VecDeque::with_capacity(cap),
            cap,
            window,
            repeat_threshold,
        }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self::new(
            settings.tracked_actions_cap,
            settings.loop_window,
            settings.loop_repeat_threshold,
        )
    }

    /// Push a selected action onto the ring, evicting the oldest entry
    /// once the cap is reached.
    pub fn track(&mut self, action: &Action) {
        if self.tracked.len() == self.cap {
            self.tracked.pop_front();
        }
        self.tracked.push_back(TrackedAction::reduce(action));
    }

    /// True when any single reduced action accounts for at least
    /// `repeat_threshold` of the last `window` tracked entries. Always
    /// false until a full window has been tracked.
    pub fn is_looping(&self) -> bool {
        if self.tracked.len() < self.window {
            return false;
        }
        let window = self.tracked.iter().rev().take(self.window);
        let mut counts: std::collections::HashMap<&TrackedAction, usize> =
            std::collections::HashMap::new();
        for entry in window {
            let count = counts.entry(entry).or_insert(0);
            *count += 1;
            if *count >= self.repeat_threshold {
                return true;
            }
        }
        false
    }

    /// Corrective action, strict priority order: an element not tried in
    /// the recent window, then a navigable link, then a scroll. Scroll is
    /// always available, so a looping worker always has a way out.
    pub fn fallback_action(&self, state: &PageState) -> Action {
        self.fallback_candidate(state)
            .unwrap_or_else(|| Action::scroll().with_reasoning("breaking out of action loop"))
    }

    /// The candidate part of the cascade (element, then link) with no
    /// terminal scroll. Used on an explicit oracle decline, where an empty
    /// page should backtrack instead of scrolling in place.
    pub fn fallback_candidate(&self, state: &PageState) -> Option<Action> {
        let recent = self.recent_selectors();

        for element in &state.interactive_elements {
            let prefix: String = element
                .selector
                .chars()
                .take(SELECTOR_PREFIX_CHARS)
                .collect();
            if !recent.contains(prefix.as_str()) {
                return Some(
                    Action::click(element.selector.clone())
                        .with_reasoning("breaking out of action loop"),
                );
            }
        }

        for link in &state.links {
            if link.is_navigable() {
                return Some(
                    Action::navigate(link.url.clone())
                        .with_reasoning("breaking out of action loop"),
                );
            }
        }

        None
    }

    fn recent_selectors(&self) -> HashSet<&str> {
        self.tracked
            .iter()
            .rev()
            .take(self.window)
            .map(|entry| entry.selector.as_str())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn tracked_len(&self) -> usize {
        self.tracked.len()
    }
}
