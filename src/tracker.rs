//! Relative pointer tracking: folds evdev reports into absolute pointer events.

use crate::gestures::Point;
use crate::resolver::{Button, PointerEvent};

#[derive(Debug, Clone, Copy)]
enum Pending {
    Button(Button, bool),
    Wheel(i32),
}

/// Integrates `REL_X`/`REL_Y` into a virtual position. Events gathered within
/// one report are released on `SYN_REPORT`, motion first.
#[derive(Debug, Default)]
pub struct Tracker {
    position: Point,
    dx: i32,
    dy: i32,
    pending: Vec<Pending>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_rel_x(&mut self, v: i32) {
        self.dx += v;
    }

    pub fn on_rel_y(&mut self, v: i32) {
        self.dy += v;
    }

    /// Detents as reported by `REL_WHEEL`: positive scrolls away from the user.
    pub fn on_wheel(&mut self, detents: i32) {
        if detents != 0 {
            self.pending.push(Pending::Wheel(detents));
        }
    }

    /// `value` is the evdev key value: 1 press, 0 release, 2 autorepeat.
    pub fn on_button(&mut self, button: Button, value: i32) {
        match value {
            0 => self.pending.push(Pending::Button(button, false)),
            1 => self.pending.push(Pending::Button(button, true)),
            _ => {}
        }
    }

    pub fn on_syn_report(&mut self) -> Vec<PointerEvent> {
        self.position.x += f64::from(self.dx);
        self.position.y += f64::from(self.dy);
        self.dx = 0;
        self.dy = 0;

        let Point { x, y } = self.position;
        let mut out = Vec::with_capacity(self.pending.len());
        for p in self.pending.drain(..) {
            match p {
                Pending::Button(button, true) => out.push(PointerEvent::Down { button, x, y }),
                Pending::Button(button, false) => out.push(PointerEvent::Up { button, x, y }),
                // DOM convention: negative delta_y scrolls up
                Pending::Wheel(d) => out.push(PointerEvent::Wheel {
                    delta_y: -f64::from(d),
                }),
            }
        }
        out
    }

    /// Drops whatever the current report collected, e.g. after SYN_DROPPED.
    pub fn discard_report(&mut self) {
        self.dx = 0;
        self.dy = 0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_before_button_in_same_report() {
        let mut t = Tracker::new();
        t.on_button(Button::Secondary, 1);
        assert_eq!(
            t.on_syn_report(),
            vec![PointerEvent::Down { button: Button::Secondary, x: 0.0, y: 0.0 }]
        );

        t.on_rel_y(-40);
        assert!(t.on_syn_report().is_empty());

        t.on_button(Button::Secondary, 0);
        t.on_rel_y(-10);
        t.on_rel_x(3);
        assert_eq!(
            t.on_syn_report(),
            vec![PointerEvent::Up { button: Button::Secondary, x: 3.0, y: -50.0 }]
        );
    }

    #[test]
    fn wheel_sign_is_inverted() {
        let mut t = Tracker::new();
        t.on_wheel(1);
        t.on_wheel(0);
        t.on_wheel(-2);
        assert_eq!(
            t.on_syn_report(),
            vec![
                PointerEvent::Wheel { delta_y: -1.0 },
                PointerEvent::Wheel { delta_y: 2.0 },
            ]
        );
    }

    #[test]
    fn autorepeat_is_ignored() {
        let mut t = Tracker::new();
        t.on_button(Button::Primary, 2);
        assert!(t.on_syn_report().is_empty());
    }

    #[test]
    fn discard_report_keeps_position() {
        let mut t = Tracker::new();
        t.on_rel_x(5);
        t.on_syn_report();
        t.on_rel_x(100);
        t.on_button(Button::Secondary, 1);
        t.discard_report();
        assert!(t.on_syn_report().is_empty());
        t.on_button(Button::Secondary, 1);
        assert_eq!(
            t.on_syn_report(),
            vec![PointerEvent::Down { button: Button::Secondary, x: 5.0, y: 0.0 }]
        );
    }
}
