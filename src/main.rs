use anyhow::Context;
use log::LevelFilter;
use std::{env, path::PathBuf, sync::mpsc};
use sunshine_face::{
    config::Config,
    display::Display,
    face::SunshineFace,
    host::{self, Host, HostEvent, HostProperties, SystemClock, WindowInsets},
    layout::FACE_SIZE,
    sync::http::HttpSyncClient,
};

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_module("sunshine_face", LevelFilter::Info)
        .parse_default_env()
        .init();

    let config_path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| Config::PATH.into());
    let config = Config::load(&config_path)?;

    let (sender, receiver) = mpsc::channel();
    let client = HttpSyncClient::new(&config.companion, sender.clone());
    let face = SunshineFace::new(&config, client)?;
    let display = Display::new(&config)?;

    let signal_sender = sender.clone();
    ctrlc::set_handler(move || {
        let _ = signal_sender.send(HostEvent::Destroy);
    })
    .context("Error installing signal handler")?;
    host::spawn_stdin_controls(sender.clone());

    for event in HostEvent::startup(
        WindowInsets {
            is_round: config.round,
        },
        HostProperties {
            low_bit_ambient: config.low_bit_ambient,
        },
    ) {
        sender.send(event)?;
    }

    Host::new(face, display, SystemClock, FACE_SIZE).run(receiver)
}
