//! The ten-slot binding table and a shared handle to it.

use crate::actions::Action;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, PoisonError, RwLock},
};
use thiserror::Error;

pub const SLOT_COUNT: usize = 10;
pub const UNBOUND: i8 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Up,
    Down,
    Right,
    Left,
    UpRight,
    DownLeft,
    DownRight,
    UpLeft,
    WheelUp,
    WheelDown,
}

impl Slot {
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::Up,
        Slot::Down,
        Slot::Right,
        Slot::Left,
        Slot::UpRight,
        Slot::DownLeft,
        Slot::DownRight,
        Slot::UpLeft,
        Slot::WheelUp,
        Slot::WheelDown,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Slot::Up => "up",
            Slot::Down => "down",
            Slot::Right => "right",
            Slot::Left => "left",
            Slot::UpRight => "up-right",
            Slot::DownLeft => "down-left",
            Slot::DownRight => "down-right",
            Slot::UpLeft => "up-left",
            Slot::WheelUp => "wheel-up",
            Slot::WheelDown => "wheel-down",
        }
    }

    /// Negative delta scrolls away from the user.
    pub fn for_wheel(delta_y: f64) -> Slot {
        if delta_y < 0.0 {
            Slot::WheelUp
        } else {
            Slot::WheelDown
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(i) = s.parse::<usize>() {
            return Slot::ALL
                .get(i)
                .copied()
                .ok_or_else(|| format!("slot index out of range: {i}"));
        }
        Slot::ALL
            .iter()
            .copied()
            .find(|slot| slot.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown slot: {s}"))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("binding table must have exactly 10 entries, got {0}")]
    WrongLength(usize),
    #[error("slot {slot} holds {value}, expected -1..=14")]
    OutOfRange { slot: usize, value: i64 },
}

/// Persisted as a plain JSON array of ten integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct BindingTable([i8; SLOT_COUNT]);

impl Default for BindingTable {
    fn default() -> Self {
        Self([0, 1, 2, 3, 4, 5, 6, 7, 8, 9])
    }
}

impl BindingTable {
    pub fn from_values(values: &[i64]) -> Result<Self, BindingError> {
        if values.len() != SLOT_COUNT {
            return Err(BindingError::WrongLength(values.len()));
        }
        let mut out = [UNBOUND; SLOT_COUNT];
        for (slot, &value) in values.iter().enumerate() {
            if value != UNBOUND as i64 && Action::from_id(value).is_none() {
                return Err(BindingError::OutOfRange { slot, value });
            }
            out[slot] = value as i8;
        }
        Ok(Self(out))
    }

    pub fn action(&self, slot: Slot) -> Option<Action> {
        Action::from_id(self.0[slot.index()] as i64)
    }

    pub fn raw(&self, slot: Slot) -> i8 {
        self.0[slot.index()]
    }

    /// Copy of the table with one slot rebound; the original is untouched.
    pub fn with(&self, slot: Slot, action: Option<Action>) -> Self {
        let mut next = self.0;
        next[slot.index()] = action.map_or(UNBOUND, Action::id);
        Self(next)
    }

    pub fn to_json(&self) -> String {
        let values: Vec<i64> = (*self).into();
        serde_json::Value::from(values).to_string()
    }
}

impl TryFrom<Vec<i64>> for BindingTable {
    type Error = BindingError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_values(&values)
    }
}

impl From<BindingTable> for Vec<i64> {
    fn from(table: BindingTable) -> Self {
        table.0.iter().map(|&v| v as i64).collect()
    }
}

/// Cloneable handle to the current table. Readers always see the latest
/// replacement; there is no per-reader copy.
#[derive(Debug, Clone, Default)]
pub struct SharedBindings(Arc<RwLock<BindingTable>>);

impl SharedBindings {
    pub fn new(table: BindingTable) -> Self {
        Self(Arc::new(RwLock::new(table)))
    }

    pub fn get(&self) -> BindingTable {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a new table and returns the previous one.
    pub fn replace(&self, table: BindingTable) -> BindingTable {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_identity() {
        let t = BindingTable::default();
        for (i, slot) in Slot::ALL.iter().enumerate() {
            assert_eq!(t.raw(*slot) as usize, i);
            assert_eq!(t.action(*slot), Action::from_id(i as i64));
        }
        assert_eq!(t.action(Slot::Up), Some(Action::NewTab));
        assert_eq!(t.action(Slot::WheelDown), Some(Action::ScrollToBottom));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            BindingTable::from_values(&[0, 1, 2]),
            Err(BindingError::WrongLength(3))
        );
        assert_eq!(
            BindingTable::from_values(&[0; 11]),
            Err(BindingError::WrongLength(11))
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut v = vec![0i64; SLOT_COUNT];
        v[4] = 15;
        assert_eq!(
            BindingTable::from_values(&v),
            Err(BindingError::OutOfRange { slot: 4, value: 15 })
        );
        v[4] = -2;
        assert!(BindingTable::from_values(&v).is_err());
    }

    #[test]
    fn unbound_slot_has_no_action() {
        let t = BindingTable::default().with(Slot::Left, None);
        assert_eq!(t.raw(Slot::Left), UNBOUND);
        assert_eq!(t.action(Slot::Left), None);
        assert_eq!(t.action(Slot::Right), Some(Action::NextTab));
    }

    #[test]
    fn json_round_trip_keeps_order() {
        let t = BindingTable::from_values(&[14, -1, 2, 3, 11, 5, 6, 7, 9, 8]).unwrap();
        let json = t.to_json();
        assert_eq!(json, "[14,-1,2,3,11,5,6,7,9,8]");
        let back: BindingTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn deserialize_enforces_length() {
        let err = serde_json::from_str::<BindingTable>("[0,1,2,3,4,5,6,7,8]");
        assert!(err.is_err());
    }

    #[test]
    fn slot_names_parse() {
        assert_eq!("down-left".parse::<Slot>(), Ok(Slot::DownLeft));
        assert_eq!("9".parse::<Slot>(), Ok(Slot::WheelDown));
        assert!("10".parse::<Slot>().is_err());
        assert_eq!(Slot::for_wheel(-3.0), Slot::WheelUp);
        assert_eq!(Slot::for_wheel(3.0), Slot::WheelDown);
    }

    #[test]
    fn shared_handle_sees_replacement() {
        let shared = SharedBindings::default();
        let reader = shared.clone();
        let next = BindingTable::default().with(Slot::Up, Some(Action::PinTab));
        let prev = shared.replace(next);
        assert_eq!(prev, BindingTable::default());
        assert_eq!(reader.get().action(Slot::Up), Some(Action::PinTab));
    }
}
