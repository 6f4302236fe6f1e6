use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, fs, process::Command};

use crate::actions::{Action, ActionDispatcher, LogDispatcher};
use crate::bindings::{BindingTable, Slot};
use crate::config::ConfigState;
use crate::gestures::{Point, Stroke};
use crate::ipc;
use crate::menu::ContextMenuGate;
use crate::resolver::GestureResolver;
use crate::sink::UinputSink;
use crate::store::SettingsStore;
use crate::trace::{self, Outcome};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("mousegest: started daemon (pid={})", child.id());
            Ok(())
        }

        Some(op @ ("stop" | "status" | "reload" | "pause" | "resume" | "doctor")) => {
            let op = if op == "stop" { "shutdown" } else { op };
            let r = ipc::client_request(serde_json::json!({ "op": op }))?;
            print_response(&r);
            Ok(())
        }

        Some("bindings") => {
            let what: Option<String> = pargs.free_from_str().ok();
            bindings_cmd(&mut pargs, what.as_deref().unwrap_or("show"))
        }

        Some("actions") => {
            for a in Action::ALL {
                println!(
                    "{:>2}  {:<20} {:<8} {}",
                    a.id(),
                    a.name(),
                    format!("{:?}", a.scope()).to_lowercase(),
                    a.key_chord().unwrap_or("-")
                );
            }
            println!("\nactions marked - need a chord under [chords] in config.toml");
            Ok(())
        }

        Some("classify") => {
            let dx: f64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: mousegest classify <dx> <dy>"))?;
            let dy: f64 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: mousegest classify <dx> <dy>"))?;
            let cfg = ConfigState::load_or_install_default()?;
            let store = SettingsStore::open(&cfg.bindings_path)?;
            let stroke = Stroke::between(Point::new(0.0, 0.0), Point::new(dx, dy));
            if stroke.distance < cfg.config.thresholds.distance {
                println!(
                    "length {:.1} is below the threshold {}: plain click",
                    stroke.distance, cfg.config.thresholds.distance
                );
                return Ok(());
            }
            let slot = stroke.slot();
            let action = store.current().action(slot);
            println!(
                "length {:.1}  bucket {}  slot {}  action {}",
                stroke.distance,
                stroke.bucket,
                slot,
                action.map_or("none".to_string(), |a| a.to_string())
            );
            Ok(())
        }

        Some("replay") => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: mousegest replay <trace.jsonl>"))?;
            let text = fs::read_to_string(&path).map_err(|e| anyhow!("reading {path}: {e}"))?;
            let events = trace::parse(&text)?;

            let cfg = ConfigState::load_or_install_default()?;
            let store = SettingsStore::open(&cfg.bindings_path)?;
            let mut resolver =
                GestureResolver::with_threshold(store.handle(), cfg.config.thresholds.distance);
            let mut gate = ContextMenuGate::new(cfg.config.menu.mode, cfg.config.menu.rearm_ms);

            let outcomes = trace::replay(&events, &mut resolver, &mut gate, &mut LogDispatcher)?;
            let mut fired = 0;
            for o in &outcomes {
                match o {
                    Outcome::Fired(a) => {
                        fired += 1;
                        println!("fire  {a}");
                    }
                    Outcome::Menu(d) => println!("menu  {}", format!("{d:?}").to_lowercase()),
                }
            }
            println!("{} events, {fired} actions", events.len());
            Ok(())
        }

        Some("emit") => {
            // usage:
            //   mousegest emit new-tab
            //   mousegest emit key CTRL+SHIFT+T
            let what: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: mousegest emit <action|key> ..."))?;
            let cfg = ConfigState::load_or_install_default()?;
            let mut sink = UinputSink::new(cfg.config)?;
            if what == "key" {
                let chord: String = pargs
                    .free_from_str()
                    .map_err(|_| anyhow!("usage: mousegest emit key CTRL+T"))?;
                sink.key_chord(&chord)?;
                println!("ok: sent key chord {chord}");
            } else {
                let action: Action = what.parse().map_err(|e: String| anyhow!(e))?;
                sink.dispatch(action)?;
                println!("ok: performed {action}");
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

/// Edits go straight to the bindings file; a running daemon picks them up
/// through its watcher.
fn bindings_cmd(pargs: &mut Arguments, what: &str) -> Result<()> {
    let cfg = ConfigState::load_or_install_default()?;
    let mut store = SettingsStore::open(&cfg.bindings_path)?;

    match what {
        "show" => print_table(&store.current()),
        "set" => {
            let usage = || anyhow!("usage: mousegest bindings set <slot> <action|none>");
            let slot: String = pargs.free_from_str().map_err(|_| usage())?;
            let action: String = pargs.free_from_str().map_err(|_| usage())?;
            let slot: Slot = slot.parse().map_err(|e: String| anyhow!(e))?;
            let action = match action.as_str() {
                "none" | "-1" => None,
                s => Some(s.parse::<Action>().map_err(|e| anyhow!(e))?),
            };
            let table = store.set_slot(slot, action)?;
            print_table(&table);
        }
        "reset" => {
            store.reset()?;
            print_table(&store.current());
        }
        "export" => {
            let out: Option<String> = pargs.free_from_str().ok();
            let json = store.export_json();
            match out {
                Some(path) => {
                    fs::write(&path, format!("{json}\n"))?;
                    println!("ok: wrote {path}");
                }
                None => println!("{json}"),
            }
        }
        "import" => {
            let path: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: mousegest bindings import <file>"))?;
            let text = fs::read_to_string(&path).map_err(|e| anyhow!("reading {path}: {e}"))?;
            let table = store.import_json(&text)?;
            print_table(&table);
        }
        other => return Err(anyhow!("unknown bindings command: {other}")),
    }
    Ok(())
}

fn print_table(table: &BindingTable) {
    for slot in Slot::ALL {
        let action = table
            .action(slot)
            .map_or("none".to_string(), |a| a.to_string());
        println!("{:<11} {:>2}  {action}", slot.name(), table.raw(slot));
    }
}

fn print_help() {
    println!(
        r#"mousegest: right-button mouse gestures

USAGE:
  mousegest help [command]                Show general or command-specific help
  mousegest start                         Start the daemon
  mousegest stop                          Stop the daemon
  mousegest status                        Show daemon state
  mousegest reload                        Reload config and bindings
  mousegest pause | resume                Stop or restart performing gestures
  mousegest doctor                        Diagnose permissions/devices
  mousegest bindings [show]               Show the gesture table
  mousegest bindings set <slot> <action>  Bind a slot (or `none`)
  mousegest bindings reset                Restore the default table
  mousegest bindings export [file]        Print or save the table as JSON
  mousegest bindings import <file>        Load a table from JSON
  mousegest actions                       List actions and their key chords
  mousegest classify <dx> <dy>            Show which slot a drag resolves to
  mousegest replay <trace.jsonl>          Run recorded events through the resolver
  mousegest emit <action>                 Perform an action now
  mousegest emit key CTRL+T               Emit a key chord

SLOTS:
  up down right left up-right down-left down-right up-left wheel-up wheel-down

TIPS:
  - Config: ~/.config/mousegest/config.toml (override with MOUSEGEST_CONFIG_DIR)
  - Bindings: ~/.config/mousegest/bindings.json
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: mousegest start\nStarts the background daemon."),
        "stop" => println!("usage: mousegest stop\nStops the running daemon."),
        "status" => println!(
            "usage: mousegest status\nShows enabled flag, bindings, devices and the last action."
        ),
        "reload" => println!(
            "usage: mousegest reload\nRereads config.toml and bindings.json; keeps last good on error."
        ),
        "pause" | "resume" => println!(
            "usage: mousegest pause|resume\nGestures are still tracked while paused but nothing is performed."
        ),
        "doctor" => println!(
            "usage: mousegest doctor\nChecks /dev/uinput, input group membership and pointer devices."
        ),
        "bindings" => println!(
            "usage:\n  mousegest bindings [show]\n  mousegest bindings set <slot> <action|none>\n  mousegest bindings reset\n  mousegest bindings export [file]\n  mousegest bindings import <file>\nThe file is a JSON array of 10 action ids (-1 = none)."
        ),
        "actions" => println!("usage: mousegest actions\nLists action ids, names, scopes and chords."),
        "classify" => println!(
            "usage: mousegest classify <dx> <dy>\nScreen coordinates: negative dy is up."
        ),
        "replay" => println!(
            "usage: mousegest replay <trace.jsonl>\nOne JSON event per line, e.g.\n  {{\"type\":\"down\",\"button\":\"secondary\",\"x\":0,\"y\":0}}"
        ),
        "emit" => println!("usage:\n  mousegest emit <action>\n  mousegest emit key CTRL+T"),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
