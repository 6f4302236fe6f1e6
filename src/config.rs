use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use crate::actions::Action;
use crate::gestures::DISTANCE_THRESHOLD;
use crate::menu::{DEFAULT_REARM_MS, MenuMode};
use crate::sink::parse_chord;

pub const CONFIG_DIR_ENV: &str = "MOUSEGEST_CONFIG_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum stroke length, in pointer units, for a drag to count as a gesture.
    #[serde(default = "default_distance")]
    pub distance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            distance: DISTANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    #[serde(default)]
    pub mode: MenuMode,
    #[serde(default = "default_rearm_ms")]
    pub rearm_ms: u64,
    /// Press Escape before running an action, closing the menu the desktop
    /// opened for the right click that started the stroke.
    #[serde(default = "default_true")]
    pub dismiss_with_escape: bool,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            mode: MenuMode::default(),
            rearm_ms: DEFAULT_REARM_MS,
            dismiss_with_escape: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Explicit `/dev/input/event*` paths; empty means auto-discover.
    #[serde(default)]
    pub devices: Vec<String>,
    /// Execute actions through uinput; when false they are only logged.
    #[serde(default = "default_true")]
    pub emit: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            emit: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub menu: MenuConfig,
    #[serde(default)]
    pub input: InputConfig,
    /// Per-action key chord overrides, e.g. `pin-tab = "CTRL+SHIFT+P"`.
    #[serde(default)]
    pub chords: BTreeMap<String, String>,
}

fn default_distance() -> f64 {
    DISTANCE_THRESHOLD
}

fn default_rearm_ms() -> u64 {
    DEFAULT_REARM_MS
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn parse(text: &str) -> Result<Self> {
        let cfg: Config = toml::from_str(text)?;
        validate_config(&cfg)?;
        Ok(cfg)
    }

    /// Override first, then the built-in default.
    pub fn chord_for(&self, action: Action) -> Option<&str> {
        self.chords
            .get(action.name())
            .map(String::as_str)
            .or_else(|| action.key_chord())
    }
}

fn validate_config(c: &Config) -> Result<()> {
    if !c.thresholds.distance.is_finite() || c.thresholds.distance < 0.0 {
        return Err(anyhow!("thresholds.distance must be a non-negative number"));
    }
    if c.menu.rearm_ms == 0 {
        return Err(anyhow!("menu.rearm_ms must be positive"));
    }
    for (action, chord) in &c.chords {
        action
            .parse::<Action>()
            .map_err(|e| anyhow!("chords: {e}"))?;
        parse_chord(chord).map_err(|e| anyhow!("chord for '{action}' ('{chord}'): {e}"))?;
    }
    Ok(())
}

/// Locations and loaded configuration for one run.
#[derive(Debug, Clone)]
pub struct ConfigState {
    pub config: Config,
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
    pub bindings_path: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("mousegest"))
}

fn default_config_text() -> &'static str {
    include_str!("../config/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_from(config_dir()?)
    }

    pub fn load_from(dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = dir.into();
        fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, default_config_text())?;
            info!("installed default config at {}", config_path.display());
        }
        let config = load_config(&config_path)?;

        Ok(Self {
            config,
            bindings_path: config_dir.join("bindings.json"),
            config_path,
            config_dir,
        })
    }

    /// Keeps the current configuration when the file fails to load.
    pub fn reload(&mut self) -> Result<()> {
        self.config = load_config(&self.config_path)?;
        Ok(())
    }

    pub fn doctor_report(&self, devices: &[String]) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "config": self.config_path,
            "bindings": self.bindings_path,
            "menu_mode": self.config.menu.mode,
            "devices": devices,
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Config::parse(&txt).map_err(|e| anyhow!("failed to parse {}: {e}", path.display()))
}

fn check_in_input_group() -> bool {
    let Ok(s) = fs::read_to_string("/etc/group") else {
        return false;
    };
    let user = whoami::username();
    s.lines()
        .filter(|line| line.starts_with("input:"))
        .any(|line| {
            line.split(':')
                .nth(3)
                .unwrap_or("")
                .split(',')
                .any(|u| u == user)
        })
}
