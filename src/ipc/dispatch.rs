use anyhow::Result;
use std::sync::mpsc::Sender;

use super::server::DaemonEvent;
use crate::actions::{Action, ActionDispatcher};
use crate::sink::UinputSink;

/// Pipeline-side dispatcher: closes the stray context menu, runs the action's
/// chord, and reports the action to the daemon.
pub struct DaemonDispatcher<'a> {
    pub sink: &'a mut UinputSink,
    pub tx_evt: &'a Sender<DaemonEvent>,
}

impl ActionDispatcher for DaemonDispatcher<'_> {
    fn dispatch(&mut self, action: Action) -> Result<()> {
        if !self.sink.is_enabled() {
            return Ok(());
        }
        self.sink.dismiss_menu()?;
        self.sink.dispatch(action)?;
        let _ = self.tx_evt.send(DaemonEvent::Fired(action));
        Ok(())
    }
}
