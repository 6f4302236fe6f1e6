//! Stroke geometry: displacement vector -> compass bucket -> binding slot.

use crate::bindings::Slot;
use serde::{Deserialize, Serialize};

/// Strokes shorter than this are plain secondary clicks.
pub const DISTANCE_THRESHOLD: f64 = 6.0;
/// Rotates bucket boundaries so each bucket is centred on its direction.
pub const ROTATION_OFFSET_DEG: f64 = 23.0;
pub const BUCKET_WIDTH_DEG: f64 = 45.0;
/// Bucket index (compass order from "up", clockwise) -> binding slot index.
pub const BUCKET_TO_SLOT: [usize; 8] = [4, 2, 6, 1, 5, 3, 7, 0];

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub dx: f64,
    pub dy: f64,
    pub distance: f64,
    pub bucket: usize,
}

impl Stroke {
    pub fn between(from: Point, to: Point) -> Self {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        Self {
            dx,
            dy,
            distance: dx.hypot(dy),
            bucket: bucket(dx, dy),
        }
    }

    pub fn slot(&self) -> Slot {
        slot_for_bucket(self.bucket)
    }
}

/// Screen coordinates: y grows downwards, so `(0, -1)` is "up".
pub fn bucket(dx: f64, dy: f64) -> usize {
    if dx == 0.0 {
        return if dy > 0.0 { 3 } else { 7 };
    }
    let a = (dy / dx).atan().to_degrees();
    let a = if dx > 0.0 { a + 90.0 } else { a + 270.0 };
    // wrap uses the unrotated angle
    let a = if a - ROTATION_OFFSET_DEG < 0.0 {
        360.0 - a
    } else {
        a - ROTATION_OFFSET_DEG
    };
    ((a / BUCKET_WIDTH_DEG).floor() as usize).min(7)
}

pub fn slot_for_bucket(bucket: usize) -> Slot {
    Slot::ALL[BUCKET_TO_SLOT[bucket.min(7)]]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_of(dx: f64, dy: f64) -> Slot {
        Stroke::between(Point::new(0.0, 0.0), Point::new(dx, dy)).slot()
    }

    #[test]
    fn vertical_special_case() {
        assert_eq!(bucket(0.0, 1.0), 3);
        assert_eq!(bucket(0.0, 250.0), 3);
        assert_eq!(bucket(0.0, -1.0), 7);
        assert_eq!(bucket(0.0, -250.0), 7);
    }

    #[test]
    fn pointing_right_lands_in_bucket_one() {
        // 0 + 90 - 23 = 67 -> floor(67 / 45) = 1
        assert_eq!(bucket(100.0, 0.0), 1);
        assert_eq!(BUCKET_TO_SLOT[1], 2);
        assert_eq!(slot_of(100.0, 0.0), Slot::Right);
    }

    #[test]
    fn eight_compass_directions() {
        assert_eq!(slot_of(0.0, -100.0), Slot::Up);
        assert_eq!(slot_of(0.0, 100.0), Slot::Down);
        assert_eq!(slot_of(100.0, 0.0), Slot::Right);
        assert_eq!(slot_of(-100.0, 0.0), Slot::Left);
        assert_eq!(slot_of(100.0, -100.0), Slot::UpRight);
        assert_eq!(slot_of(-100.0, 100.0), Slot::DownLeft);
        assert_eq!(slot_of(100.0, 100.0), Slot::DownRight);
        assert_eq!(slot_of(-100.0, -100.0), Slot::UpLeft);
    }

    #[test]
    fn near_vertical_up_takes_wrap_branch() {
        // a = atan(-10) + 90 ~= 5.7, below the offset: 360 - 5.7 -> bucket 7
        assert_eq!(bucket(1.0, -10.0), 7);
        assert_eq!(slot_of(1.0, -10.0), Slot::Up);
    }

    #[test]
    fn bucket_boundaries_follow_offset() {
        // bucket 1 starts at a bearing of 45 + 23 = 68
        let just_right = (68.5f64 - 90.0).to_radians().tan();
        assert_eq!(bucket(1.0, just_right), 1);
        let still_upright = (67.5f64 - 90.0).to_radians().tan();
        assert_eq!(bucket(1.0, still_upright), 0);
    }

    #[test]
    fn degenerate_bearing_is_clamped() {
        // atan saturates at -90 for a huge negative ratio
        assert_eq!(bucket(f64::MIN_POSITIVE, -1e300), 7);
    }

    #[test]
    fn distance_is_euclidean() {
        let s = Stroke::between(Point::new(1.0, 1.0), Point::new(4.0, 5.0));
        assert_eq!(s.distance, 5.0);
    }
}
