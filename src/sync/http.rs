//! Companion channel over plain HTTP polling. The companion serves its data
//! items as JSON; a background thread watches one of them and feeds changes
//! into the host's event queue.

use crate::{
    config::CompanionConfig,
    host::HostEvent,
    sync::{
        ConnectionFailure, ConnectionId, DataEvent, SyncClient, SyncEvent,
        WEATHER_PATH,
    },
};
use anyhow::Context;
use log::{debug, info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError, Sender},
        Arc,
    },
    thread,
    time::Duration,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct HttpSyncClient {
    url: String,
    poll_interval: Duration,
    events: Sender<HostEvent>,
    /// Shared with the poller, which only reports changes while this is set
    listening: Arc<AtomicBool>,
    /// Dropping this stops the poller
    stop: Option<Sender<()>>,
    /// Connections started so far
    connections: u64,
}

impl HttpSyncClient {
    pub fn new(config: &CompanionConfig, events: Sender<HostEvent>) -> Self {
        Self {
            url: config.url.trim_end_matches('/').to_owned(),
            poll_interval: config.poll_interval(),
            events,
            listening: Default::default(),
            stop: None,
            connections: 0,
        }
    }
}

impl SyncClient for HttpSyncClient {
    fn connect(&mut self) -> ConnectionId {
        // Replace any poller that's still going. It may be blocked on a
        // request, so whatever it sends later is tagged with the old id.
        self.disconnect();
        let (stop, stopped) = mpsc::channel();
        self.stop = Some(stop);
        self.connections += 1;
        let connection = ConnectionId(self.connections);

        let poller = Poller {
            connection,
            agent: ureq::AgentBuilder::new()
                .user_agent("sunshine-face")
                .timeout(REQUEST_TIMEOUT)
                .build(),
            health_url: format!("{}/health", self.url),
            item_url: format!("{}/data{}", self.url, WEATHER_PATH),
            poll_interval: self.poll_interval,
            listening: Arc::clone(&self.listening),
            events: self.events.clone(),
        };
        thread::spawn(move || poller.run(stopped));
        connection
    }

    fn disconnect(&mut self) {
        if self.stop.take().is_some() {
            debug!("Stopping companion poller");
        }
    }

    fn add_listener(&mut self) {
        self.listening.store(true, Ordering::Relaxed);
    }

    fn remove_listener(&mut self) {
        self.listening.store(false, Ordering::Relaxed);
    }
}

/// Background half of [HttpSyncClient]
struct Poller {
    connection: ConnectionId,
    agent: ureq::Agent,
    health_url: String,
    item_url: String,
    poll_interval: Duration,
    listening: Arc<AtomicBool>,
    events: Sender<HostEvent>,
}

impl Poller {
    fn run(self, stopped: mpsc::Receiver<()>) {
        match self.check_health() {
            Ok(()) => {
                if !self.send(SyncEvent::Connected) {
                    return;
                }
            }
            Err(failure) => {
                self.send(SyncEvent::ConnectionFailed(failure));
                return;
            }
        }

        let mut last_seen: Option<DataEvent> = None;
        loop {
            match stopped.recv_timeout(self.poll_interval) {
                Err(RecvTimeoutError::Timeout) => {}
                // Client dropped its end, we're done
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if !self.listening.load(Ordering::Relaxed) {
                continue;
            }

            match self.fetch() {
                Ok(Some(event)) if last_seen.as_ref() != Some(&event) => {
                    info!("Companion data changed at {}", event.path);
                    last_seen = Some(event.clone());
                    if !self.send(SyncEvent::DataChanged(vec![event])) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("Error polling companion: {err:#}");
                    if !self.send(SyncEvent::ConnectionSuspended) {
                        break;
                    }
                }
            }
        }
        debug!("Companion poller exited");
    }

    /// Check the companion is there at all. Network trouble might clear up;
    /// an error response from the companion won't.
    fn check_health(&self) -> Result<(), ConnectionFailure> {
        match self.agent.get(&self.health_url).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::Transport(transport)) => Err(ConnectionFailure {
                has_resolution: true,
                message: transport.to_string(),
            }),
            Err(ureq::Error::Status(status, _)) => Err(ConnectionFailure {
                has_resolution: false,
                message: format!("{} returned status {status}", self.health_url),
            }),
        }
    }

    /// Get the current data item. `None` if the companion hasn't published
    /// one yet.
    fn fetch(&self) -> anyhow::Result<Option<DataEvent>> {
        let response = match self.agent.get(&self.item_url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Error fetching {}", self.item_url)
                })
            }
        };
        let event = response
            .into_json()
            .context("Error parsing data item as JSON")?;
        Ok(Some(event))
    }

    /// Push an event to the host. Returns false if the host is gone.
    fn send(&self, event: SyncEvent) -> bool {
        self.events
            .send(HostEvent::Sync(self.connection, event))
            .is_ok()
    }
}
