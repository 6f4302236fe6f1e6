use anyhow::Result;
use log::{debug, error, info, warn};
use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError},
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use evdev::{Device, EventType, KeyCode, RelativeAxisCode, SynchronizationCode};

use super::dispatch::DaemonDispatcher;
use super::server::DaemonEvent;
use crate::actions::ActionDispatcher;
use crate::bindings::{BindingTable, SharedBindings};
use crate::config::Config;
use crate::input;
use crate::menu::{ContextMenuGate, MenuMode};
use crate::resolver::{Button, GestureResolver, PointerEvent};
use crate::sink::UinputSink;
use crate::tracker::Tracker;

pub enum PipelineCmd {
    Config(Config),
    SetEnabled(bool),
}

pub fn run_pipeline(
    bindings: SharedBindings,
    config: Config,
    rx_cmd: Receiver<PipelineCmd>,
    updates: Receiver<BindingTable>,
    tx_evt: Sender<DaemonEvent>,
) -> Result<()> {
    let devices = input::select_devices(&config.input.devices);
    let _ = tx_evt.send(DaemonEvent::Devices(
        devices.iter().map(|d| d.label()).collect(),
    ));

    let mut devs: Vec<Device> = vec![];
    for d in &devices {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                let _ = dev.set_nonblocking(true);
                info!("reading pointer {}", d.label());
                devs.push(dev);
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    if devs.is_empty() {
        warn!("no pointer devices available; pipeline idle");
        let _ = tx_evt.send(DaemonEvent::Log("idle: no pointer devices".into()));
    }

    let mut tracker = Tracker::new();
    let shared = bindings.clone();
    let mut resolver = GestureResolver::with_threshold(bindings, config.thresholds.distance);
    let mut sink = if config.input.emit {
        UinputSink::new(config.clone()).unwrap_or_else(|e| {
            warn!("uinput unavailable ({e}); actions will only be logged");
            UinputSink::noop(config.clone())
        })
    } else {
        UinputSink::noop(config.clone())
    };
    let mut gate = ContextMenuGate::new(config.menu.mode, config.menu.rearm_ms);
    warn_missing_chords(&sink, &shared.get());

    loop {
        loop {
            match rx_cmd.try_recv() {
                Ok(PipelineCmd::Config(cfg)) => {
                    resolver.set_threshold(cfg.thresholds.distance);
                    gate = ContextMenuGate::new(cfg.menu.mode, cfg.menu.rearm_ms);
                    sink.set_config(cfg);
                    warn_missing_chords(&sink, &shared.get());
                    info!("pipeline: config applied (threshold {})", resolver.threshold());
                }
                Ok(PipelineCmd::SetEnabled(en)) => {
                    sink.set_enabled(en);
                    resolver.reset();
                    info!("pipeline: {}", if en { "resumed" } else { "paused" });
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
        if let Some(table) = updates.try_iter().last() {
            warn_missing_chords(&sink, &table);
        }

        let mut any_event = false;
        for dev in devs.iter_mut() {
            let Ok(events) = dev.fetch_events() else {
                continue;
            };
            for ev in events {
                any_event = true;
                let ready = translate(&mut tracker, ev.event_type(), ev.code(), ev.value());
                if ready.is_empty() {
                    continue;
                }
                let now_ms = millis(ev.timestamp());
                // a dropped report leaves the stroke in an unknown state
                if ready == [PointerEvent::Cancel] {
                    warn!("input events dropped; stroke cancelled");
                }
                let mut dispatcher = DaemonDispatcher {
                    sink: &mut sink,
                    tx_evt: &tx_evt,
                };
                for pe in ready {
                    route(&mut resolver, &mut gate, pe, now_ms, &mut dispatcher);
                }
            }
        }

        if !any_event {
            thread::sleep(Duration::from_millis(if devs.is_empty() { 250 } else { 4 }));
        }
    }
}

fn millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn warn_missing_chords(sink: &UinputSink, table: &BindingTable) {
    let missing = sink.missing_chords(table);
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|a| a.name()).collect();
        warn!(
            "bound actions without a key chord will do nothing: {} (set them under [chords])",
            names.join(", ")
        );
    }
}

/// Feeds one raw evdev event into the tracker; returns pointer events once a
/// report completes.
pub fn translate(tracker: &mut Tracker, ty: EventType, code: u16, value: i32) -> Vec<PointerEvent> {
    if ty == EventType::RELATIVE {
        match code {
            c if c == RelativeAxisCode::REL_X.0 => tracker.on_rel_x(value),
            c if c == RelativeAxisCode::REL_Y.0 => tracker.on_rel_y(value),
            c if c == RelativeAxisCode::REL_WHEEL.0 => tracker.on_wheel(value),
            _ => {}
        }
    } else if ty == EventType::KEY {
        if let Some(button) = button_for(code) {
            tracker.on_button(button, value);
        }
    } else if ty == EventType::SYNCHRONIZATION {
        if code == SynchronizationCode::SYN_REPORT.0 {
            return tracker.on_syn_report();
        }
        if code == SynchronizationCode::SYN_DROPPED.0 {
            tracker.discard_report();
            return vec![PointerEvent::Cancel];
        }
    }
    Vec::new()
}

fn button_for(code: u16) -> Option<Button> {
    match code {
        c if c == KeyCode::BTN_LEFT.0 => Some(Button::Primary),
        c if c == KeyCode::BTN_MIDDLE.0 => Some(Button::Middle),
        c if c == KeyCode::BTN_RIGHT.0 => Some(Button::Secondary),
        _ => None,
    }
}

/// Another button pressed mid-stroke abandons the stroke. The desktop raises
/// its menu on the secondary press or release depending on `gate`'s mode, and
/// the gate is consulted at that point; a double press drops the stroke.
pub fn route<D>(
    resolver: &mut GestureResolver,
    gate: &mut ContextMenuGate,
    ev: PointerEvent,
    now_ms: u64,
    dispatcher: &mut D,
) where
    D: ActionDispatcher + ?Sized,
{
    if let PointerEvent::Down { button, .. } = ev {
        if button != Button::Secondary && resolver.is_active() {
            debug!("{button:?} press interrupts stroke");
            resolver.reset();
        }
    }

    let was_active = resolver.is_active();
    match resolver.feed(ev, dispatcher) {
        Ok(Some(_)) => gate.disarm(),
        Ok(None) => {}
        Err(e) => error!("dispatch failed: {e}"),
    }

    match ev {
        PointerEvent::Down { button: Button::Secondary, .. } if gate.mode() == MenuMode::OnPress => {
            let decision = gate.on_context_menu(resolver, now_ms);
            debug!("context menu on press: {decision:?}");
        }
        PointerEvent::Up { button: Button::Secondary, .. } => {
            if was_active {
                gate.on_stroke_end(resolver);
            }
            if gate.mode() == MenuMode::OnRelease {
                let decision = gate.on_context_menu(resolver, now_ms);
                debug!("context menu on release: {decision:?}");
            }
        }
        _ => {}
    }
}
