//! Pointer device discovery (evdev 0.13.2 compatible)

use evdev::{Device, KeyCode, RelativeAxisCode};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
}

impl DeviceInfo {
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.path)
    }
}

/// Relative pointers with a secondary button: mice, trackballs, trackpoints.
pub fn discover_pointers() -> Vec<DeviceInfo> {
    let mut out = vec![];
    let Ok(rd) = std::fs::read_dir("/dev/input") else {
        return out;
    };
    for e in rd.flatten() {
        let p = e.path();
        let is_event_node = p
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.starts_with("event"));
        if !is_event_node {
            continue;
        }
        if let Ok(dev) = Device::open(&p) {
            if is_pointer(&dev) {
                out.push(DeviceInfo {
                    path: p.display().to_string(),
                    name: dev.name().unwrap_or("unknown").to_string(),
                });
            }
        }
    }
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn is_pointer(dev: &Device) -> bool {
    let has_rel = dev.supported_relative_axes().is_some_and(|a| {
        a.contains(RelativeAxisCode::REL_X) && a.contains(RelativeAxisCode::REL_Y)
    });
    let has_secondary = dev
        .supported_keys()
        .is_some_and(|k| k.contains(KeyCode::BTN_RIGHT));
    has_rel && has_secondary
}

/// Configured paths win over discovery.
pub fn select_devices(configured: &[String]) -> Vec<DeviceInfo> {
    if configured.is_empty() {
        return discover_pointers();
    }
    configured
        .iter()
        .map(|path| DeviceInfo {
            path: path.clone(),
            name: Device::open(path)
                .ok()
                .and_then(|d| d.name().map(str::to_string))
                .unwrap_or_else(|| "unknown".to_string()),
        })
        .collect()
}
