//! Weather updates pushed from the paired companion device. The companion
//! publishes data items at logical paths; we watch one of them.

pub mod http;

use crate::state::PersistedPreferences;
use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data item path the companion publishes weather at
pub const WEATHER_PATH: &str = "/weather_update";
const KEY_HIGH_TEMP: &str = "high_temp";
const KEY_LOW_TEMP: &str = "low_temp";
const KEY_WEATHER_ID: &str = "weather_id";

/// Named fields of a data item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataMap(IndexMap<String, Value>);

impl DataMap {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get_string(&self, key: &str) -> anyhow::Result<&str> {
        self.get(key)?
            .as_str()
            .with_context(|| format!("Field `{key}` is not a string"))
    }

    pub fn get_long(&self, key: &str) -> anyhow::Result<i64> {
        self.get(key)?
            .as_i64()
            .with_context(|| format!("Field `{key}` is not an integer"))
    }

    fn get(&self, key: &str) -> anyhow::Result<&Value> {
        self.0
            .get(key)
            .ok_or_else(|| anyhow!("Missing field `{key}`"))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// A data item that changed on the companion side
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataEvent {
    pub path: String,
    pub data: DataMap,
}

impl DataEvent {
    /// Pull the weather triple out of the payload. All three fields must be
    /// present with the right types.
    pub fn weather(&self) -> anyhow::Result<PersistedPreferences> {
        Ok(PersistedPreferences {
            high_temp: self.data.get_string(KEY_HIGH_TEMP)?.to_owned(),
            low_temp: self.data.get_string(KEY_LOW_TEMP)?.to_owned(),
            weather_code: self.data.get_long(KEY_WEATHER_ID)?,
        })
    }
}

/// Something happened on the sync channel. All of these are delivered on the
/// host's event queue, in order with every other callback.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    Connected,
    ConnectionSuspended,
    ConnectionFailed(ConnectionFailure),
    DataChanged(Vec<DataEvent>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionFailure {
    /// Whether trying again might help
    pub has_resolution: bool,
    pub message: String,
}

/// Identifies one attempt to connect. Every [SyncEvent] carries the id of the
/// connection it came from, so events from a replaced connection can be told
/// apart from the current one's.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ConnectionId(pub u64);

/// The device-to-device channel. Calls only request a change; the outcome
/// comes back later as a [SyncEvent].
pub trait SyncClient {
    /// Start a new connection, replacing any existing one
    fn connect(&mut self) -> ConnectionId;

    fn disconnect(&mut self);

    /// Start delivering [SyncEvent::DataChanged]
    fn add_listener(&mut self);

    fn remove_listener(&mut self);
}

/// Listens for weather updates while the face is visible
#[derive(Debug)]
pub struct CompanionSync<C> {
    client: C,
    /// Whether we want the channel at all (i.e. the face is visible)
    registered: bool,
    /// The connection we're waiting on or using. Events from any other are
    /// stale.
    connection: Option<ConnectionId>,
    listening: bool,
    /// Whether we've already spent our reconnect since the last success
    retried: bool,
}

impl<C: SyncClient> CompanionSync<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            registered: false,
            connection: None,
            listening: false,
            retried: false,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    /// Open the channel. The listener is added once it connects.
    pub fn register(&mut self) {
        if self.registered {
            return;
        }
        self.registered = true;
        info!("Connecting to companion");
        self.connection = Some(self.client.connect());
    }

    pub fn unregister(&mut self) {
        if !self.registered {
            return;
        }
        self.registered = false;
        self.stop_listening();
        info!("Disconnecting from companion");
        self.connection = None;
        self.client.disconnect();
    }

    /// Handle a channel event. If it carried a weather update, return it.
    /// Multiple updates in one batch collapse to the last valid one. Events
    /// from anything but the current connection are dropped.
    pub fn handle(
        &mut self,
        connection: ConnectionId,
        event: SyncEvent,
    ) -> Option<PersistedPreferences> {
        if self.connection != Some(connection) {
            debug!("Dropping {event:?} from stale connection {connection:?}");
            return None;
        }
        match event {
            SyncEvent::Connected => {
                info!("Connected to companion");
                self.retried = false;
                if self.registered {
                    self.client.add_listener();
                    self.listening = true;
                }
                None
            }
            SyncEvent::ConnectionSuspended => {
                info!("Companion connection suspended");
                None
            }
            SyncEvent::ConnectionFailed(failure) => {
                self.on_connection_failed(failure);
                None
            }
            SyncEvent::DataChanged(events) => {
                if !self.listening {
                    trace!("Not listening, dropping {} data events", events.len());
                    return None;
                }
                events
                    .iter()
                    .filter(|event| event.path == WEATHER_PATH)
                    .filter_map(|event| match event.weather() {
                        Ok(update) => Some(update),
                        Err(err) => {
                            warn!("Ignoring malformed weather update: {err:#}");
                            None
                        }
                    })
                    .last()
            }
        }
    }

    fn on_connection_failed(&mut self, failure: ConnectionFailure) {
        if failure.has_resolution && !self.retried && self.registered {
            warn!(
                "Companion connection failed, retrying: {}",
                failure.message
            );
            self.retried = true;
            self.connection = Some(self.client.connect());
        } else {
            warn!(
                "Companion connection failed, giving up: {}",
                failure.message
            );
            self.stop_listening();
        }
    }

    fn stop_listening(&mut self) {
        self.client.remove_listener();
        self.listening = false;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Records every call, in order
    #[derive(Debug, Default)]
    pub struct FakeClient {
        pub calls: Vec<&'static str>,
    }

    impl SyncClient for FakeClient {
        fn connect(&mut self) -> ConnectionId {
            self.calls.push("connect");
            let connects = self.calls.iter().filter(|call| **call == "connect");
            ConnectionId(connects.count() as u64)
        }

        fn disconnect(&mut self) {
            self.calls.push("disconnect");
        }

        fn add_listener(&mut self) {
            self.calls.push("add_listener");
        }

        fn remove_listener(&mut self) {
            self.calls.push("remove_listener");
        }
    }

    pub fn weather_event(high: &str, low: &str, code: i64) -> DataEvent {
        DataEvent {
            path: WEATHER_PATH.into(),
            data: [
                (KEY_HIGH_TEMP, Value::from(high)),
                (KEY_LOW_TEMP, Value::from(low)),
                (KEY_WEATHER_ID, Value::from(code)),
            ]
            .into_iter()
            .collect(),
        }
    }

    /// Deliver an event from whichever connection is current
    fn deliver(
        sync: &mut CompanionSync<FakeClient>,
        event: SyncEvent,
    ) -> Option<PersistedPreferences> {
        let connection = sync.connection().unwrap();
        sync.handle(connection, event)
    }

    fn failure(has_resolution: bool) -> SyncEvent {
        SyncEvent::ConnectionFailed(ConnectionFailure {
            has_resolution,
            message: "nope".into(),
        })
    }

    fn connected() -> CompanionSync<FakeClient> {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        deliver(&mut sync, SyncEvent::Connected);
        sync
    }

    #[test]
    fn test_payload_json() {
        let event: DataEvent = serde_json::from_str(
            r#"{
                "path": "/weather_update",
                "data": {"high_temp": "75°", "low_temp": "58°", "weather_id": 800}
            }"#,
        )
        .unwrap();
        assert_eq!(event, weather_event("75°", "58°", 800));
    }

    #[test]
    fn test_weather_update() {
        let mut sync = connected();
        assert_eq!(
            sync.client().calls,
            vec!["connect", "add_listener"]
        );
        let update = deliver(
            &mut sync,
            SyncEvent::DataChanged(vec![weather_event("75°", "58°", 800)]),
        )
        .unwrap();
        assert_eq!(
            update,
            PersistedPreferences {
                high_temp: "75°".into(),
                low_temp: "58°".into(),
                weather_code: 800,
            }
        );
    }

    #[test]
    fn test_last_update_wins() {
        let mut sync = connected();
        let mut malformed = weather_event("1°", "0°", 200);
        malformed.data.insert(KEY_WEATHER_ID, "not a number");
        let mut elsewhere = weather_event("99°", "98°", 500);
        elsewhere.path = "/somewhere_else".into();

        let update = deliver(&mut sync, SyncEvent::DataChanged(vec![
            weather_event("60°", "50°", 501),
            weather_event("61°", "51°", 800),
            malformed,
            elsewhere,
        ]));
        assert_eq!(update.unwrap().high_temp, "61°");
    }

    #[test]
    fn test_malformed_update() {
        let mut sync = connected();
        let mut missing = weather_event("75°", "58°", 800);
        missing.data = [(KEY_HIGH_TEMP, "75°")].into_iter().collect();
        assert_eq!(deliver(&mut sync, SyncEvent::DataChanged(vec![missing])), None);

        let mut wrong_type = weather_event("75°", "58°", 800);
        wrong_type.data.insert(KEY_LOW_TEMP, 58);
        assert!(wrong_type.weather().is_err());
        assert_eq!(deliver(&mut sync, SyncEvent::DataChanged(vec![wrong_type])), None);
    }

    #[test]
    fn test_ignored_when_not_listening() {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        let update = deliver(&mut sync, SyncEvent::DataChanged(vec![weather_event(
            "75°", "58°", 800,
        )]));
        assert_eq!(update, None);
    }

    #[test]
    fn test_register_idempotent() {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        sync.register();
        sync.unregister();
        sync.unregister();
        assert_eq!(
            sync.client().calls,
            vec!["connect", "remove_listener", "disconnect"]
        );
        assert!(!sync.is_listening());
    }

    #[test]
    fn test_retry_once() {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        deliver(&mut sync, failure(true));
        assert_eq!(sync.client().calls, vec!["connect", "connect"]);

        // Second recoverable failure in a row: give up
        deliver(&mut sync, failure(true));
        assert_eq!(
            sync.client().calls,
            vec!["connect", "connect", "remove_listener"]
        );
        assert!(!sync.is_listening());
    }

    #[test]
    fn test_retry_budget_resets() {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        deliver(&mut sync, failure(true));
        deliver(&mut sync, SyncEvent::Connected);
        deliver(&mut sync, failure(true));
        assert_eq!(
            sync.client().calls,
            vec!["connect", "connect", "add_listener", "connect"]
        );
    }

    #[test]
    fn test_stale_connection_ignored() {
        let mut sync = CompanionSync::new(FakeClient::default());
        sync.register();
        let first = sync.connection().unwrap();
        // Quick hide and show while the first attempt is still in flight
        sync.unregister();
        sync.register();
        let second = sync.connection().unwrap();
        assert_ne!(first, second);

        // The replaced attempt finally fails; that doesn't cost a retry
        assert_eq!(sync.handle(first, failure(true)), None);
        assert_eq!(sync.handle(first, SyncEvent::Connected), None);
        assert_eq!(
            sync.client().calls,
            vec!["connect", "remove_listener", "disconnect", "connect"]
        );
        assert!(!sync.is_listening());

        sync.handle(second, SyncEvent::Connected);
        assert!(sync.is_listening());
        // Data from a dead connection is dropped too
        let stale = sync.handle(
            first,
            SyncEvent::DataChanged(vec![weather_event("75°", "58°", 800)]),
        );
        assert_eq!(stale, None);

        // The real connection still has its retry
        sync.handle(second, failure(true));
        assert_eq!(sync.client().calls.last(), Some(&"connect"));
        assert_ne!(sync.connection(), Some(second));
    }

    #[test]
    fn test_unrecoverable_failure() {
        let mut sync = connected();
        deliver(&mut sync, failure(false));
        assert_eq!(
            sync.client().calls,
            vec!["connect", "add_listener", "remove_listener"]
        );
        assert!(!sync.is_listening());
    }
}
