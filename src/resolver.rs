//! Gesture resolver: per-stroke state machine turning pointer input into actions.
//!
//! One stroke at a time. A stroke opens on a secondary-button press and closes
//! on the matching release, where the displacement is classified and looked up
//! in the binding table. A wheel turn while the stroke is open resolves
//! immediately through the wheel slots and consumes the stroke, so the release
//! that follows fires nothing. The table is read through a [`SharedBindings`]
//! handle on every lookup.

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::actions::{Action, ActionDispatcher};
use crate::bindings::{SharedBindings, Slot};
use crate::gestures::{DISTANCE_THRESHOLD, Point, Stroke};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Button {
    Primary,
    Middle,
    Secondary,
}

/// Host input, already filtered to trusted events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PointerEvent {
    Down { button: Button, x: f64, y: f64 },
    Up { button: Button, x: f64, y: f64 },
    Wheel { delta_y: f64 },
    Cancel,
}

#[derive(Debug, Clone, Copy, Default)]
struct StrokeState {
    origin: Option<Point>,
    is_wheel_gesture: bool,
    stroke_consumed: bool,
}

#[derive(Debug)]
pub struct GestureResolver {
    bindings: SharedBindings,
    threshold: f64,
    stroke: Option<StrokeState>,
    menu_suppressed: bool,
}

impl GestureResolver {
    pub fn new(bindings: SharedBindings) -> Self {
        Self::with_threshold(bindings, DISTANCE_THRESHOLD)
    }

    pub fn with_threshold(bindings: SharedBindings, threshold: f64) -> Self {
        Self {
            bindings,
            threshold,
            stroke: None,
            menu_suppressed: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn is_active(&self) -> bool {
        self.stroke.is_some_and(|s| s.origin.is_some())
    }

    pub fn on_pointer_down(&mut self, button: Button, point: Point) {
        if button != Button::Secondary || self.is_active() {
            return;
        }
        self.stroke = Some(StrokeState {
            origin: Some(point),
            ..StrokeState::default()
        });
    }

    pub fn on_pointer_up(&mut self, button: Button, point: Point) -> Option<Action> {
        if button != Button::Secondary {
            return None;
        }
        let state = self.stroke.take()?;
        let origin = state.origin?;

        let stroke = Stroke::between(origin, point);
        if state.is_wheel_gesture || state.stroke_consumed || stroke.distance < self.threshold {
            // a short stroke is a plain click and must not swallow the menu
            self.menu_suppressed = state.is_wheel_gesture || state.stroke_consumed;
            return None;
        }

        self.menu_suppressed = true;
        let slot = stroke.slot();
        let action = self.bindings.get().action(slot);
        debug!(
            "stroke ({:.1}, {:.1}) len {:.1} -> bucket {} slot {slot} -> {action:?}",
            stroke.dx, stroke.dy, stroke.distance, stroke.bucket
        );
        action
    }

    pub fn on_wheel(&mut self, delta_y: f64) -> Option<Action> {
        let state = self.stroke.as_mut()?;
        if state.origin.is_none() || state.stroke_consumed || delta_y == 0.0 {
            return None;
        }
        state.is_wheel_gesture = true;

        let slot = Slot::for_wheel(delta_y);
        let action = self.bindings.get().action(slot);
        if action.is_some() {
            state.stroke_consumed = true;
            self.menu_suppressed = true;
        }
        debug!("wheel {delta_y} -> slot {slot} -> {action:?}");
        action
    }

    pub fn reset(&mut self) {
        self.stroke = None;
    }

    /// Whether the last finished stroke was a gesture rather than a plain
    /// secondary click.
    pub fn suppresses_context_menu(&self) -> bool {
        self.menu_suppressed
    }

    /// Routes one event and hands any produced action to `dispatcher`.
    pub fn feed<D>(&mut self, event: PointerEvent, dispatcher: &mut D) -> Result<Option<Action>>
    where
        D: ActionDispatcher + ?Sized,
    {
        let action = match event {
            PointerEvent::Down { button, x, y } => {
                self.on_pointer_down(button, Point::new(x, y));
                None
            }
            PointerEvent::Up { button, x, y } => self.on_pointer_up(button, Point::new(x, y)),
            PointerEvent::Wheel { delta_y } => self.on_wheel(delta_y),
            PointerEvent::Cancel => {
                self.reset();
                None
            }
        };
        if let Some(a) = action {
            dispatcher.dispatch(a)?;
        }
        Ok(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::BindingTable;

    fn resolver() -> (GestureResolver, SharedBindings) {
        let shared = SharedBindings::default();
        (GestureResolver::new(shared.clone()), shared)
    }

    fn stroke(r: &mut GestureResolver, dx: f64, dy: f64) -> Option<Action> {
        r.on_pointer_down(Button::Secondary, Point::new(200.0, 200.0));
        r.on_pointer_up(Button::Secondary, Point::new(200.0 + dx, 200.0 + dy))
    }

    #[test]
    fn up_stroke_resolves_slot_zero() {
        let (mut r, _) = resolver();
        assert_eq!(stroke(&mut r, 0.0, -100.0), Some(Action::NewTab));
        assert!(!r.is_active());
    }

    #[test]
    fn right_stroke_resolves_slot_two() {
        let (mut r, _) = resolver();
        assert_eq!(stroke(&mut r, 100.0, 0.0), Some(Action::NextTab));
    }

    #[test]
    fn all_directions_with_default_table() {
        let (mut r, _) = resolver();
        let cases = [
            ((0.0, 50.0), Action::CloseTab),
            ((-50.0, 0.0), Action::PreviousTab),
            ((50.0, -50.0), Action::Reload),
            ((-50.0, 50.0), Action::ReopenLastClosed),
            ((50.0, 50.0), Action::HistoryForward),
            ((-50.0, -50.0), Action::HistoryBack),
        ];
        for ((dx, dy), want) in cases {
            assert_eq!(stroke(&mut r, dx, dy), Some(want), "({dx}, {dy})");
        }
    }

    #[test]
    fn short_strokes_are_discarded() {
        let (mut r, _) = resolver();
        for (dx, dy) in [(0.0, 0.0), (5.9, 0.0), (-3.0, 4.0 - 1e-9), (0.0, -5.99)] {
            assert_eq!(stroke(&mut r, dx, dy), None);
            assert!(!r.suppresses_context_menu());
            assert!(!r.is_active());
        }
        // exactly at the threshold counts
        assert_eq!(stroke(&mut r, 0.0, -6.0), Some(Action::NewTab));
    }

    #[test]
    fn unbound_slot_yields_nothing_but_still_counts_as_gesture() {
        let (mut r, shared) = resolver();
        shared.replace(BindingTable::default().with(Slot::Up, None));
        assert_eq!(stroke(&mut r, 0.0, -100.0), None);
        assert!(r.suppresses_context_menu());
    }

    #[test]
    fn other_buttons_are_ignored() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Primary, Point::new(0.0, 0.0));
        assert!(!r.is_active());
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_pointer_up(Button::Primary, Point::new(0.0, -100.0)), None);
        assert!(r.is_active());
    }

    #[test]
    fn second_press_does_not_move_origin() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        r.on_pointer_down(Button::Secondary, Point::new(0.0, -100.0));
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(0.0, -100.0)), Some(Action::NewTab));
    }

    #[test]
    fn release_without_press_is_noop() {
        let (mut r, _) = resolver();
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(0.0, -100.0)), None);
    }

    #[test]
    fn wheel_uses_sign_only() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_wheel(-5.0), Some(Action::ScrollToTop));
        r.reset();

        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_wheel(5.0), Some(Action::ScrollToBottom));
    }

    #[test]
    fn wheel_without_stroke_is_ignored() {
        let (mut r, _) = resolver();
        assert_eq!(r.on_wheel(-5.0), None);
    }

    #[test]
    fn zero_wheel_delta_leaves_stroke_open() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_wheel(0.0), None);
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(100.0, 0.0)), Some(Action::NextTab));
    }

    #[test]
    fn wheel_consumes_the_stroke() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_wheel(-1.0), Some(Action::ScrollToTop));
        assert_eq!(r.on_wheel(-1.0), None);
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(0.0, -300.0)), None);
        assert!(r.suppresses_context_menu());
        assert!(!r.is_active());
    }

    #[test]
    fn unbound_wheel_still_suppresses_release() {
        let (mut r, shared) = resolver();
        shared.replace(BindingTable::default().with(Slot::WheelDown, None));
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        assert_eq!(r.on_wheel(3.0), None);
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(0.0, -300.0)), None);
    }

    #[test]
    fn table_replaced_mid_stroke_is_used() {
        let (mut r, shared) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        shared.replace(BindingTable::default().with(Slot::Up, Some(Action::DuplicateTab)));
        assert_eq!(
            r.on_pointer_up(Button::Secondary, Point::new(0.0, -80.0)),
            Some(Action::DuplicateTab)
        );
    }

    #[test]
    fn reset_drops_stroke() {
        let (mut r, _) = resolver();
        r.on_pointer_down(Button::Secondary, Point::new(0.0, 0.0));
        r.reset();
        assert_eq!(r.on_pointer_up(Button::Secondary, Point::new(0.0, -100.0)), None);
    }

    #[test]
    fn custom_threshold() {
        let (mut r, _) = resolver();
        r.set_threshold(50.0);
        assert_eq!(stroke(&mut r, 0.0, -40.0), None);
        assert_eq!(stroke(&mut r, 0.0, -60.0), Some(Action::NewTab));
    }

    #[test]
    fn feed_dispatches_produced_actions() {
        let (mut r, _) = resolver();
        let mut out: Vec<Action> = Vec::new();
        let events = [
            PointerEvent::Down { button: Button::Secondary, x: 10.0, y: 10.0 },
            PointerEvent::Up { button: Button::Secondary, x: 10.0, y: 110.0 },
            PointerEvent::Down { button: Button::Secondary, x: 10.0, y: 10.0 },
            PointerEvent::Cancel,
            PointerEvent::Up { button: Button::Secondary, x: 10.0, y: 110.0 },
        ];
        for e in events {
            r.feed(e, &mut out).unwrap();
        }
        assert_eq!(out, vec![Action::CloseTab]);
    }
}
