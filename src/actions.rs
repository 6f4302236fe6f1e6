//! Symbolic actions a gesture can resolve to, and the dispatcher seam.

use anyhow::Result;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    NewTab,
    CloseTab,
    NextTab,
    PreviousTab,
    Reload,
    ReopenLastClosed,
    HistoryForward,
    HistoryBack,
    ScrollToTop,
    ScrollToBottom,
    CloseOtherTabs,
    PinTab,
    CloseWindow,
    MinimizeWindow,
    DuplicateTab,
}

/// Where an action takes effect: inside the page, or on tabs/windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Page,
    Browser,
}

impl Action {
    /// Ordered by numeric id; `ALL[id]` is the action stored as `id` in a binding table.
    pub const ALL: [Action; 15] = [
        Action::NewTab,
        Action::CloseTab,
        Action::NextTab,
        Action::PreviousTab,
        Action::Reload,
        Action::ReopenLastClosed,
        Action::HistoryForward,
        Action::HistoryBack,
        Action::ScrollToTop,
        Action::ScrollToBottom,
        Action::CloseOtherTabs,
        Action::PinTab,
        Action::CloseWindow,
        Action::MinimizeWindow,
        Action::DuplicateTab,
    ];

    pub fn id(self) -> i8 {
        self as i8
    }

    /// Unknown ids (including the `-1` "unbound" marker) map to `None`.
    pub fn from_id(id: i64) -> Option<Action> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::NewTab => "new-tab",
            Action::CloseTab => "close-tab",
            Action::NextTab => "next-tab",
            Action::PreviousTab => "previous-tab",
            Action::Reload => "reload",
            Action::ReopenLastClosed => "reopen-last-closed",
            Action::HistoryForward => "history-forward",
            Action::HistoryBack => "history-back",
            Action::ScrollToTop => "scroll-to-top",
            Action::ScrollToBottom => "scroll-to-bottom",
            Action::CloseOtherTabs => "close-other-tabs",
            Action::PinTab => "pin-tab",
            Action::CloseWindow => "close-window",
            Action::MinimizeWindow => "minimize-window",
            Action::DuplicateTab => "duplicate-tab",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Action::Reload
            | Action::HistoryForward
            | Action::HistoryBack
            | Action::ScrollToTop
            | Action::ScrollToBottom => Scope::Page,
            _ => Scope::Browser,
        }
    }

    /// Browser shortcut that performs the action, if a common one exists.
    pub fn key_chord(self) -> Option<&'static str> {
        match self {
            Action::NewTab => Some("CTRL+T"),
            Action::CloseTab => Some("CTRL+W"),
            Action::NextTab => Some("CTRL+TAB"),
            Action::PreviousTab => Some("CTRL+SHIFT+TAB"),
            Action::Reload => Some("F5"),
            Action::ReopenLastClosed => Some("CTRL+SHIFT+T"),
            Action::HistoryForward => Some("ALT+RIGHT"),
            Action::HistoryBack => Some("ALT+LEFT"),
            Action::ScrollToTop => Some("CTRL+HOME"),
            Action::ScrollToBottom => Some("CTRL+END"),
            Action::CloseWindow => Some("CTRL+SHIFT+W"),
            Action::CloseOtherTabs
            | Action::PinTab
            | Action::MinimizeWindow
            | Action::DuplicateTab => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Accepts the kebab-case name or the numeric id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = s.parse::<i64>() {
            return Action::from_id(id).ok_or_else(|| format!("no action with id {id}"));
        }
        Action::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// Receives resolved actions and performs them.
pub trait ActionDispatcher {
    fn dispatch(&mut self, action: Action) -> Result<()>;
}

/// Collects actions; used by trace replay and tests.
impl ActionDispatcher for Vec<Action> {
    fn dispatch(&mut self, action: Action) -> Result<()> {
        self.push(action);
        Ok(())
    }
}

/// Logs actions without performing them.
#[derive(Debug, Default)]
pub struct LogDispatcher;

impl ActionDispatcher for LogDispatcher {
    fn dispatch(&mut self, action: Action) -> Result<()> {
        info!("action: {action} ({:?} scope)", action.scope());
        Ok(())
    }
}
