mod actions;
mod bindings;
mod cli;
mod config;
mod gestures;
mod input;
mod ipc;
mod logging;
mod menu;
mod resolver;
mod sink;
mod store;
mod trace;
mod tracker;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
