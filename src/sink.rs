//! Executes actions by emitting key chords through a uinput virtual keyboard.

use anyhow::{Result, anyhow};
use log::{info, warn};

use crate::actions::{Action, ActionDispatcher};
use crate::bindings::{BindingTable, Slot};
use crate::config::Config;

pub struct UinputSink {
    enabled: bool,
    config: Config,
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
}

impl UinputSink {
    pub fn new(config: Config) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = LinuxUinput::create()?;
            return Ok(Self {
                enabled: true,
                config,
                linux: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop(config))
        }
    }

    pub fn noop(config: Config) -> Self {
        Self {
            enabled: true,
            config,
            linux: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    /// Swap in new chord overrides after a config reload.
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Bound actions this sink has no chord for, in slot order.
    pub fn missing_chords(&self, table: &BindingTable) -> Vec<Action> {
        let mut out: Vec<Action> = Vec::new();
        for action in Slot::ALL.iter().filter_map(|s| table.action(*s)) {
            if self.config.chord_for(action).is_none() && !out.contains(&action) {
                out.push(action);
            }
        }
        out
    }

    /// Closes a context menu the host opened under the stroke.
    pub fn dismiss_menu(&mut self) -> Result<()> {
        if self.config.menu.dismiss_with_escape {
            self.key_chord("ESC")?;
        }
        Ok(())
    }

    /// Send a chord like "CTRL+SHIFT+T" or a single "F5".
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        let keys = parse_chord(chord)?;
        if !self.enabled {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            let keys: Vec<_> = keys.iter().map(|k| k.to_uinput()).collect();
            // press in order
            for k in &keys {
                dev.key_send(*k, 1)?;
            }
            dev.sync()?;
            // release in reverse
            for k in keys.iter().rev() {
                dev.key_send(*k, 0)?;
            }
            dev.sync()?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = keys;
        Ok(())
    }
}

impl ActionDispatcher for UinputSink {
    fn dispatch(&mut self, action: Action) -> Result<()> {
        let Some(chord) = self.config.chord_for(action).map(str::to_string) else {
            warn!("no key chord for {action}; add one under [chords]");
            return Ok(());
        };
        info!("{action} -> {chord}");
        self.key_chord(&chord)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordKey {
    Ctrl,
    Alt,
    Shift,
    Super,
    Esc,
    Tab,
    Home,
    End,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Minus,
    Equal,
    F(u8),
    Letter(char),
}

pub fn parse_chord(chord: &str) -> Result<Vec<ChordKey>> {
    chord
        .split('+')
        .map(|s| map_key(&s.trim().to_ascii_uppercase()))
        .collect()
}

fn map_key(tok: &str) -> Result<ChordKey> {
    let k = match tok {
        "CTRL" | "CONTROL" => ChordKey::Ctrl,
        "ALT" => ChordKey::Alt,
        "SHIFT" => ChordKey::Shift,
        "SUPER" | "META" | "WIN" => ChordKey::Super,
        "ESC" | "ESCAPE" => ChordKey::Esc,
        "TAB" => ChordKey::Tab,
        "HOME" => ChordKey::Home,
        "END" => ChordKey::End,
        "LEFT" => ChordKey::Left,
        "RIGHT" => ChordKey::Right,
        "UP" => ChordKey::Up,
        "DOWN" => ChordKey::Down,
        "PAGEUP" => ChordKey::PageUp,
        "PAGEDOWN" => ChordKey::PageDown,
        "MINUS" | "-" => ChordKey::Minus,
        "EQUAL" | "=" => ChordKey::Equal,
        f if f.len() > 1 && f.starts_with('F') => match f[1..].parse::<u8>() {
            Ok(n @ 1..=12) => ChordKey::F(n),
            _ => return Err(anyhow!("unsupported function key: {f}")),
        },
        l if l.len() == 1 && l.as_bytes()[0].is_ascii_uppercase() => {
            ChordKey::Letter(l.as_bytes()[0] as char)
        }
        other => return Err(anyhow!("unsupported key token: {other}")),
    };
    Ok(k)
}

#[cfg(target_os = "linux")]
impl ChordKey {
    fn to_uinput(self) -> uinput::event::keyboard::Key {
        use uinput::event::keyboard::Key as K;
        match self {
            ChordKey::Ctrl => K::LeftControl,
            ChordKey::Alt => K::LeftAlt,
            ChordKey::Shift => K::LeftShift,
            ChordKey::Super => K::LeftMeta,
            ChordKey::Esc => K::Esc,
            ChordKey::Tab => K::Tab,
            ChordKey::Home => K::Home,
            ChordKey::End => K::End,
            ChordKey::Left => K::Left,
            ChordKey::Right => K::Right,
            ChordKey::Up => K::Up,
            ChordKey::Down => K::Down,
            ChordKey::PageUp => K::PageUp,
            ChordKey::PageDown => K::PageDown,
            ChordKey::Minus => K::Minus,
            ChordKey::Equal => K::Equal,
            ChordKey::F(n) => match n {
                1 => K::F1,
                2 => K::F2,
                3 => K::F3,
                4 => K::F4,
                5 => K::F5,
                6 => K::F6,
                7 => K::F7,
                8 => K::F8,
                9 => K::F9,
                10 => K::F10,
                11 => K::F11,
                _ => K::F12,
            },
            ChordKey::Letter(c) => match c {
                'A' => K::A,
                'B' => K::B,
                'C' => K::C,
                'D' => K::D,
                'E' => K::E,
                'F' => K::F,
                'G' => K::G,
                'H' => K::H,
                'I' => K::I,
                'J' => K::J,
                'K' => K::K,
                'L' => K::L,
                'M' => K::M,
                'N' => K::N,
                'O' => K::O,
                'P' => K::P,
                'Q' => K::Q,
                'R' => K::R,
                'S' => K::S,
                'T' => K::T,
                'U' => K::U,
                'V' => K::V,
                'W' => K::W,
                'X' => K::X,
                'Y' => K::Y,
                _ => K::Z,
            },
        }
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        let dev = uinput::default()?
            .name("Mousegest Virtual Keyboard")?
            .event(uinput::event::Keyboard::All)?
            .create()?;

        info!("uinput: created virtual keyboard");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<()> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn key_send(&mut self, key: uinput::event::keyboard::Key, val: i32) -> Result<()> {
        self.dev.send(key, val)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_chords() {
        for a in Action::ALL {
            if let Some(chord) = a.key_chord() {
                assert!(parse_chord(chord).is_ok(), "{a}: {chord}");
            }
        }
        assert_eq!(
            parse_chord("ctrl+shift+t").unwrap(),
            vec![ChordKey::Ctrl, ChordKey::Shift, ChordKey::Letter('T')]
        );
        assert_eq!(parse_chord("F5").unwrap(), vec![ChordKey::F(5)]);
    }

    #[test]
    fn rejects_unknown_tokens() {
        assert!(parse_chord("CTRL+HYPER").is_err());
        assert!(parse_chord("F13").is_err());
        assert!(parse_chord("CTRL+").is_err());
    }

    #[test]
    fn noop_sink_accepts_everything_it_can_parse() {
        let mut sink = UinputSink::noop(Config::default());
        sink.dispatch(Action::NewTab).unwrap();
        // no default chord: logged and skipped
        sink.dispatch(Action::PinTab).unwrap();
        assert!(sink.key_chord("CTRL+NOPE").is_err());
    }

    #[test]
    fn reports_bound_actions_without_chords() {
        let table = BindingTable::from_values(&[11, 1, 11, 3, 13, 5, 6, 7, -1, 9]).unwrap();
        let sink = UinputSink::noop(Config::default());
        assert_eq!(sink.missing_chords(&table), vec![Action::PinTab, Action::MinimizeWindow]);

        let cfg = Config::parse("[chords]\npin-tab = \"CTRL+SHIFT+P\"").unwrap();
        let sink = UinputSink::noop(cfg);
        assert_eq!(sink.missing_chords(&table), vec![Action::MinimizeWindow]);
        assert!(sink.missing_chords(&BindingTable::default()).is_empty());
    }
}
