//! Replays recorded host input (JSON lines) through a resolver.

use anyhow::{Result, anyhow};
use log::debug;
use serde::Deserialize;

use crate::actions::{Action, ActionDispatcher};
use crate::menu::{ContextMenuGate, MenuDecision};
use crate::resolver::{Button, GestureResolver, PointerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEvent {
    Down { button: Button, x: f64, y: f64 },
    Up { button: Button, x: f64, y: f64 },
    Wheel { delta_y: f64 },
    Cancel,
    ContextMenu,
}

impl HostEvent {
    pub fn pointer(self) -> Option<PointerEvent> {
        match self {
            HostEvent::Down { button, x, y } => Some(PointerEvent::Down { button, x, y }),
            HostEvent::Up { button, x, y } => Some(PointerEvent::Up { button, x, y }),
            HostEvent::Wheel { delta_y } => Some(PointerEvent::Wheel { delta_y }),
            HostEvent::Cancel => Some(PointerEvent::Cancel),
            HostEvent::ContextMenu => None,
        }
    }
}

/// One line of a trace file.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TraceEvent {
    #[serde(default)]
    pub t_ms: u64,
    #[serde(default = "trusted_default")]
    pub trusted: bool,
    #[serde(flatten)]
    pub event: HostEvent,
}

fn trusted_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fired(Action),
    Menu(MenuDecision),
}

/// Blank lines and `#` comments are skipped.
pub fn parse(text: &str) -> Result<Vec<TraceEvent>> {
    let mut out = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let ev: TraceEvent =
            serde_json::from_str(line).map_err(|e| anyhow!("trace line {}: {e}", n + 1))?;
        out.push(ev);
    }
    Ok(out)
}

pub fn replay<D>(
    events: &[TraceEvent],
    resolver: &mut GestureResolver,
    gate: &mut ContextMenuGate,
    dispatcher: &mut D,
) -> Result<Vec<Outcome>>
where
    D: ActionDispatcher + ?Sized,
{
    let mut out = Vec::new();
    for ev in events {
        if !ev.trusted {
            debug!("skipping untrusted {:?}", ev.event);
            continue;
        }
        let Some(p) = ev.event.pointer() else {
            out.push(Outcome::Menu(gate.on_context_menu(resolver, ev.t_ms)));
            continue;
        };
        let was_active = resolver.is_active();
        let fired = resolver.feed(p, dispatcher)?;
        if let Some(action) = fired {
            gate.disarm();
            out.push(Outcome::Fired(action));
        }
        if was_active && matches!(p, PointerEvent::Up { button: Button::Secondary, .. }) {
            gate.on_stroke_end(resolver);
        }
    }
    Ok(out)
}
