use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use serde::Deserialize;
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::mpsc::{self, Sender},
    thread,
    time::Duration,
};

use super::pipeline::{PipelineCmd, run_pipeline};
use super::runtime::socket_path;
use crate::actions::Action;
use crate::bindings::{BindingTable, Slot};
use crate::config::ConfigState;
use crate::store::SettingsStore;

const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub enum DaemonEvent {
    Log(String),
    Devices(Vec<String>),
    Fired(Action),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Request {
    Status,
    Reload,
    Bindings,
    Pause,
    Resume,
    Doctor,
    Shutdown,
}

struct IpcMsg {
    req: Request,
    reply: Sender<serde_json::Value>,
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();
    let (tx_cmd, rx_cmd) = mpsc::channel::<PipelineCmd>();

    // state
    let mut state = DaemonState::new(ConfigState::load_or_install_default()?, tx_cmd)?;
    info!(
        "daemon: bindings {} from {}",
        state.store.export_json(),
        state.store.path().display()
    );

    // signals
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let tx_sig = tx_req.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}");
            let (reply, _) = mpsc::channel();
            let _ = tx_sig.send(IpcMsg {
                req: Request::Shutdown,
                reply,
            });
        }
    });

    // settings watcher
    let (tx_fs, rx_fs) = mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(tx_fs)?;
    watcher.watch(&state.cfg.config_dir, RecursiveMode::NonRecursive)?;

    // gesture thread
    let updates = state.store.subscribe();
    let bindings = state.store.handle();
    let config = state.cfg.config.clone();
    let tx_evt_pipeline = tx_evt.clone();
    let pipeline = thread::spawn(move || {
        if let Err(e) = run_pipeline(bindings, config, rx_cmd, updates, tx_evt_pipeline) {
            error!("gesture pipeline failed: {e}");
        }
    });

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let tx = tx_req.clone();
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, tx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(evt) = rx_evt.try_recv() {
            state.on_event(evt);
        }

        let (mut bindings_changed, mut config_changed) = (false, false);
        while let Ok(res) = rx_fs.try_recv() {
            match res {
                Ok(ev) => {
                    for p in &ev.paths {
                        bindings_changed |= same_file(p, state.store.path());
                        config_changed |= same_file(p, &state.cfg.config_path);
                    }
                }
                Err(e) => warn!("settings watcher: {e}"),
            }
        }
        if bindings_changed {
            let _ = state.reload_bindings();
        }
        if config_changed {
            let _ = state.reload_config();
        }

        while let Ok(msg) = rx_req.try_recv() {
            let resp = state.handle(msg.req);
            let _ = msg.reply.send(resp);
            if msg.req == Request::Shutdown {
                let _ = std::fs::remove_file(&sock);
                info!("daemon: shutting down");
                return Ok(());
            }
        }
        state.pipeline_alive = !pipeline.is_finished();

        thread::sleep(Duration::from_millis(5));
    }
}

fn same_file(changed: &Path, watched: &Path) -> bool {
    changed.file_name().is_some() && changed.file_name() == watched.file_name()
}

fn handle_client(mut stream: UnixStream, tx_req: Sender<IpcMsg>) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }

    let resp = match serde_json::from_str::<Request>(&line) {
        Ok(req) => {
            let (reply, rx) = mpsc::channel();
            tx_req
                .send(IpcMsg { req, reply })
                .map_err(|_| anyhow!("daemon loop has stopped"))?;
            rx.recv_timeout(REPLY_TIMEOUT).unwrap_or_else(
                |e| serde_json::json!({"ok": false, "error": format!("daemon did not answer: {e}")}),
            )
        }
        Err(e) => serde_json::json!({"ok": false, "error": format!("bad request: {e}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

/// Slot-by-slot view of a table, in slot order.
pub fn bindings_json(table: &BindingTable) -> serde_json::Value {
    let slots: Vec<_> = Slot::ALL
        .iter()
        .map(|s| serde_json::json!({"slot": s.name(), "action": table.action(*s)}))
        .collect();
    serde_json::json!({"table": table, "slots": slots})
}

struct DaemonState {
    enabled: bool,
    cfg: ConfigState,
    store: SettingsStore,
    devices: Vec<String>,
    fired: u64,
    last_action: Option<Action>,
    pipeline_alive: bool,
    tx_cmd: Sender<PipelineCmd>,
}

impl DaemonState {
    fn new(cfg: ConfigState, tx_cmd: Sender<PipelineCmd>) -> Result<Self> {
        let store = SettingsStore::open(&cfg.bindings_path)?;
        Ok(Self {
            enabled: true,
            cfg,
            store,
            devices: Vec::new(),
            fired: 0,
            last_action: None,
            pipeline_alive: true,
            tx_cmd,
        })
    }

    fn on_event(&mut self, evt: DaemonEvent) {
        match evt {
            DaemonEvent::Log(s) => info!("[gesture] {s}"),
            DaemonEvent::Devices(d) => self.devices = d,
            DaemonEvent::Fired(a) => {
                self.fired += 1;
                self.last_action = Some(a);
            }
        }
    }

    fn reload_bindings(&mut self) -> Result<bool> {
        let changed = self.store.reload()?;
        if changed {
            info!("bindings reloaded from {}", self.store.path().display());
        }
        Ok(changed)
    }

    fn reload_config(&mut self) -> Result<()> {
        if let Err(e) = self.cfg.reload() {
            error!("config reload failed: {e}");
            return Err(e);
        }
        let _ = self.tx_cmd.send(PipelineCmd::Config(self.cfg.config.clone()));
        info!("config reloaded");
        Ok(())
    }

    fn set_enabled(&mut self, en: bool) -> serde_json::Value {
        self.enabled = en;
        let _ = self.tx_cmd.send(PipelineCmd::SetEnabled(en));
        serde_json::json!({"ok": true, "data": {"enabled": en}})
    }

    fn handle(&mut self, req: Request) -> serde_json::Value {
        match req {
            Request::Status => serde_json::json!({"ok": true, "data": {
                "enabled": self.enabled,
                "config": self.cfg.config_path,
                "bindings": self.store.current(),
                "devices": self.devices,
                "fired": self.fired,
                "last_action": self.last_action,
                "pipeline_alive": self.pipeline_alive,
            }}),
            Request::Reload => {
                let bindings = self.reload_bindings();
                let config = self.reload_config();
                match (bindings, config) {
                    (Ok(_), Ok(())) => serde_json::json!({"ok": true, "data": bindings_json(&self.store.current())}),
                    (Err(e), _) => serde_json::json!({"ok": false, "error": e.to_string()}),
                    (_, Err(e)) => serde_json::json!({"ok": false, "error": e.to_string()}),
                }
            }
            Request::Bindings => {
                serde_json::json!({"ok": true, "data": bindings_json(&self.store.current())})
            }
            Request::Pause => self.set_enabled(false),
            Request::Resume => self.set_enabled(true),
            Request::Doctor => {
                let report = self.cfg.doctor_report(&self.devices);
                serde_json::json!({"ok": true, "data": report})
            }
            Request::Shutdown => serde_json::json!({"ok": true, "data": "shutting down"}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, sync::mpsc::Receiver};
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> (DaemonState, Receiver<PipelineCmd>) {
        let (tx, rx) = mpsc::channel();
        let cfg = ConfigState::load_from(dir.path()).unwrap();
        (DaemonState::new(cfg, tx).unwrap(), rx)
    }

    #[test]
    fn parses_requests() {
        let r: Request = serde_json::from_str(r#"{"op":"status"}"#).unwrap();
        assert_eq!(r, Request::Status);
        assert!(serde_json::from_str::<Request>(r#"{"op":"explode"}"#).is_err());
    }

    #[test]
    fn status_reports_bindings_and_counters() {
        let dir = TempDir::new().unwrap();
        let (mut st, _rx) = state(&dir);
        st.on_event(DaemonEvent::Fired(Action::Reload));
        st.on_event(DaemonEvent::Devices(vec!["mouse (/dev/input/event3)".into()]));

        let v = st.handle(Request::Status);
        assert_eq!(v["ok"], true);
        assert_eq!(v["data"]["bindings"], serde_json::json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert_eq!(v["data"]["fired"], 1);
        assert_eq!(v["data"]["last_action"], "reload");
        assert_eq!(v["data"]["devices"][0], "mouse (/dev/input/event3)");
    }

    #[test]
    fn reload_pushes_config_and_bindings() {
        let dir = TempDir::new().unwrap();
        let (mut st, rx) = state(&dir);
        let handle = st.store.handle();

        fs::write(&st.cfg.bindings_path, "[-1,1,2,3,4,5,6,7,8,9]").unwrap();
        fs::write(&st.cfg.config_path, "[thresholds]\ndistance = 20.0\n").unwrap();
        let v = st.handle(Request::Reload);
        assert_eq!(v["ok"], true);
        assert_eq!(v["data"]["slots"][0], serde_json::json!({"slot": "up", "action": null}));
        assert_eq!(handle.get().action(Slot::Up), None);
        assert!(matches!(rx.try_recv(), Ok(PipelineCmd::Config(c)) if c.thresholds.distance == 20.0));
    }

    #[test]
    fn reload_reports_bad_bindings_file() {
        let dir = TempDir::new().unwrap();
        let (mut st, _rx) = state(&dir);
        fs::write(&st.cfg.bindings_path, "[0,1]").unwrap();
        let v = st.handle(Request::Reload);
        assert_eq!(v["ok"], false);
        assert_eq!(st.store.current(), BindingTable::default());
    }

    #[test]
    fn pause_and_resume() {
        let dir = TempDir::new().unwrap();
        let (mut st, rx) = state(&dir);
        st.handle(Request::Pause);
        assert!(matches!(rx.try_recv(), Ok(PipelineCmd::SetEnabled(false))));
        let v = st.handle(Request::Status);
        assert_eq!(v["data"]["enabled"], false);
        st.handle(Request::Resume);
        assert!(matches!(rx.try_recv(), Ok(PipelineCmd::SetEnabled(true))));
    }

    #[test]
    fn matches_watched_file_by_name() {
        let watched = Path::new("/home/u/.config/mousegest/bindings.json");
        assert!(same_file(Path::new("/home/u/.config/mousegest/bindings.json"), watched));
        assert!(!same_file(Path::new("/home/u/.config/mousegest/bindings.json.tmp"), watched));
        assert!(!same_file(Path::new("/"), watched));
    }
}
