//! Decides whether the native context menu may open after a secondary click.

use serde::{Deserialize, Serialize};

use crate::resolver::GestureResolver;

pub const DEFAULT_REARM_MS: u64 = 500;

/// When the platform raises its context-menu event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MenuMode {
    /// After the button is released (Windows).
    OnRelease,
    /// As soon as the button is pressed (X11, Wayland, macOS).
    #[default]
    OnPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuDecision {
    Show,
    Suppress,
}

#[derive(Debug, Clone)]
pub struct ContextMenuGate {
    mode: MenuMode,
    rearm_ms: u64,
    armed_at: Option<u64>,
}

impl ContextMenuGate {
    pub fn new(mode: MenuMode, rearm_ms: u64) -> Self {
        Self {
            mode,
            rearm_ms,
            armed_at: None,
        }
    }

    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    /// In press mode the menu would cover the stroke, so the first request is
    /// swallowed. A second request inside the rearm window is a deliberate
    /// double click: the stroke is dropped and the menu opens.
    pub fn on_context_menu(&mut self, resolver: &mut GestureResolver, now_ms: u64) -> MenuDecision {
        match self.mode {
            MenuMode::OnRelease => {
                if resolver.suppresses_context_menu() {
                    MenuDecision::Suppress
                } else {
                    MenuDecision::Show
                }
            }
            MenuMode::OnPress => {
                let armed = self
                    .armed_at
                    .is_some_and(|t| now_ms.saturating_sub(t) < self.rearm_ms);
                self.armed_at = Some(now_ms);
                if armed {
                    resolver.reset();
                    MenuDecision::Show
                } else {
                    MenuDecision::Suppress
                }
            }
        }
    }

    /// Called once an action fires so the next click starts fresh.
    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    /// Call after the release that closed a stroke. A stroke that counted as
    /// a gesture clears the window even when its slot was unbound.
    pub fn on_stroke_end(&mut self, resolver: &GestureResolver) {
        if resolver.suppresses_context_menu() {
            self.disarm();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }
}

impl Default for ContextMenuGate {
    fn default() -> Self {
        Self::new(MenuMode::default(), DEFAULT_REARM_MS)
    }
}
