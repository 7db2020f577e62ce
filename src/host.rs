//! The host side of the watch face: lifecycle callbacks, and the loop that
//! delivers them. Every callback (lifecycle, timer, sync) goes through one
//! queue and runs to completion before the next, so faces never need locks.

use crate::{
    render::Frame,
    scheduler::{PendingTimer, TimerToken},
    sync::{ConnectionId, SyncEvent},
};
use anyhow::Context;
use chrono::{DateTime, Local, TimeZone, Timelike};
use embedded_graphics::{draw_target::DrawTarget, geometry::Size, pixelcolor::Rgb888};
use log::{debug, info, trace, warn};
use std::{
    io::{self, BufRead},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

/// Card peeking behavior requested by the face
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeekMode {
    Short,
    Variable,
}

/// When the host shows a background behind peeking cards
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BackgroundVisibility {
    Interruptive,
    Persistent,
}

/// Display preferences a face declares when it's created
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WatchFaceStyle {
    pub peek_mode: PeekMode,
    pub background_visibility: BackgroundVisibility,
    /// Whether the host should draw its own clock over the face
    pub show_system_ui_time: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WindowInsets {
    pub is_round: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct HostProperties {
    pub low_bit_ambient: bool,
}

/// Everything the host can tell a face. Timer messages aren't here: the host
/// delivers those itself when [WatchFace::next_timer] comes due.
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    Create,
    Destroy,
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    ApplyWindowInsets(WindowInsets),
    PropertiesChanged(HostProperties),
    /// Once a minute while visible in ambient mode
    TimeTick,
    /// Something happened on a companion connection
    Sync(ConnectionId, SyncEvent),
}

impl HostEvent {
    /// Parse a control command, as typed on stdin
    pub fn from_command(command: &str) -> Option<Self> {
        let event = match command.trim() {
            "show" => Self::VisibilityChanged(true),
            "hide" => Self::VisibilityChanged(false),
            "ambient" => Self::AmbientModeChanged(true),
            "interactive" => Self::AmbientModeChanged(false),
            "round" => Self::ApplyWindowInsets(WindowInsets { is_round: true }),
            "square" => {
                Self::ApplyWindowInsets(WindowInsets { is_round: false })
            }
            "quit" => Self::Destroy,
            _ => return None,
        };
        Some(event)
    }

    /// The events a host sends when bringing a face up
    pub fn startup(
        insets: WindowInsets,
        properties: HostProperties,
    ) -> Vec<Self> {
        vec![
            Self::Create,
            Self::PropertiesChanged(properties),
            Self::ApplyWindowInsets(insets),
            Self::VisibilityChanged(true),
        ]
    }
}

/// A watch face, driven entirely by host callbacks
pub trait WatchFace {
    /// Get a descriptive name for this face, for logging
    fn name(&self) -> &str;

    fn on_create(&mut self) -> WatchFaceStyle;

    /// Final callback. Nothing is delivered after this
    fn on_destroy(&mut self);

    fn on_visibility_changed(&mut self, visible: bool, now: &DateTime<Local>);

    fn on_ambient_mode_changed(&mut self, ambient: bool, now: &DateTime<Local>);

    fn on_apply_window_insets(&mut self, insets: WindowInsets);

    fn on_properties_changed(&mut self, properties: HostProperties);

    fn on_time_tick(&mut self);

    /// A timer previously returned by [Self::next_timer] came due
    fn on_timer(&mut self, token: TimerToken, now: &DateTime<Local>);

    fn on_sync_event(&mut self, connection: ConnectionId, event: SyncEvent);

    fn on_draw<D>(
        &mut self,
        target: &mut D,
        now: &DateTime<Local>,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>;

    fn next_timer(&self) -> Option<PendingTimer>;

    /// Whether a redraw was requested since the last call. Clears the request
    fn take_invalidated(&mut self) -> bool;
}

/// Where finished frames go
pub trait Surface {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()>;
}

/// Source of wall-clock time
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// What the host is waiting on between events
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Wakeup {
    Timer(PendingTimer),
    TimeTick { due_ms: i64 },
}

impl Wakeup {
    fn due_ms(self) -> i64 {
        match self {
            Self::Timer(timer) => timer.due_ms,
            Self::TimeTick { due_ms } => due_ms,
        }
    }
}

/// Runs a face: delivers events one at a time, fires its timer, and pushes a
/// new frame to the surface whenever the face asks for a redraw
pub struct Host<F, S, K> {
    face: F,
    surface: S,
    clock: K,
    frame: Frame,
    /// Last frame sent to the surface, to skip pushing identical ones
    shown: Option<Frame>,
    visible: bool,
    ambient: bool,
    /// When the next ambient minute tick is due, while one is armed
    next_time_tick_ms: Option<i64>,
    destroyed: bool,
}

impl<F: WatchFace, S: Surface, K: Clock> Host<F, S, K> {
    pub fn new(face: F, surface: S, clock: K, size: Size) -> Self {
        Self {
            face,
            surface,
            clock,
            frame: Frame::new(size),
            shown: None,
            visible: false,
            ambient: false,
            next_time_tick_ms: None,
            destroyed: false,
        }
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    pub fn face_mut(&mut self) -> &mut F {
        &mut self.face
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Deliver events until the face is destroyed, or every sender is gone
    pub fn run(mut self, events: Receiver<HostEvent>) -> anyhow::Result<()> {
        info!("Starting face {}", self.face.name());
        while !self.destroyed {
            let event = match self.next_wakeup() {
                Some(wakeup) => {
                    let wait_ms = wakeup.due_ms() - self.clock.now().timestamp_millis();
                    let wait = Duration::from_millis(wait_ms.max(0) as u64);
                    match events.recv_timeout(wait) {
                        Ok(event) => Some(event),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => {
                            Some(HostEvent::Destroy)
                        }
                    }
                }
                None => Some(events.recv().unwrap_or(HostEvent::Destroy)),
            };
            match event {
                Some(event) => self.dispatch(event)?,
                None => self.wake()?,
            }
        }
        info!("Face {} destroyed", self.face.name());
        Ok(())
    }

    /// Deliver a single event to the face, then redraw if it asked
    pub fn dispatch(&mut self, event: HostEvent) -> anyhow::Result<()> {
        if self.destroyed {
            warn!("Dropping {event:?}, face is already destroyed");
            return Ok(());
        }
        trace!("Dispatching {event:?}");
        let now = self.clock.now();
        match event {
            HostEvent::Create => {
                let style = self.face.on_create();
                info!("Face {} created with style {style:?}", self.face.name());
            }
            HostEvent::Destroy => {
                self.face.on_destroy();
                self.destroyed = true;
                self.next_time_tick_ms = None;
                return Ok(());
            }
            HostEvent::VisibilityChanged(visible) => {
                self.visible = visible;
                self.update_time_tick(&now);
                self.face.on_visibility_changed(visible, &now);
            }
            HostEvent::AmbientModeChanged(ambient) => {
                self.ambient = ambient;
                self.update_time_tick(&now);
                self.face.on_ambient_mode_changed(ambient, &now);
            }
            HostEvent::ApplyWindowInsets(insets) => {
                self.face.on_apply_window_insets(insets)
            }
            HostEvent::PropertiesChanged(properties) => {
                self.face.on_properties_changed(properties)
            }
            HostEvent::TimeTick => self.face.on_time_tick(),
            HostEvent::Sync(connection, event) => {
                self.face.on_sync_event(connection, event)
            }
        }
        self.redraw()
    }

    /// Deliver whatever is due right now, if anything
    pub fn wake(&mut self) -> anyhow::Result<()> {
        let now = self.clock.now();
        match self.next_wakeup() {
            Some(wakeup) if wakeup.due_ms() <= now.timestamp_millis() => {
                match wakeup {
                    Wakeup::Timer(timer) => self.face.on_timer(timer.token, &now),
                    Wakeup::TimeTick { .. } => {
                        self.next_time_tick_ms = Some(next_minute_ms(&now));
                        self.face.on_time_tick();
                    }
                }
                self.redraw()
            }
            _ => Ok(()),
        }
    }

    /// Earliest thing to deliver that isn't an event
    fn next_wakeup(&self) -> Option<Wakeup> {
        if self.destroyed {
            return None;
        }
        let timer = self.face.next_timer().map(Wakeup::Timer);
        let time_tick = self
            .next_time_tick_ms
            .map(|due_ms| Wakeup::TimeTick { due_ms });
        timer.into_iter().chain(time_tick).min_by_key(|wakeup| wakeup.due_ms())
    }

    /// Arm the minute tick on entering visible ambient mode, and disarm it on
    /// leaving. An armed tick keeps its deadline.
    fn update_time_tick(&mut self, now: &DateTime<Local>) {
        if !(self.visible && self.ambient) {
            self.next_time_tick_ms = None;
        } else if self.next_time_tick_ms.is_none() {
            self.next_time_tick_ms = Some(next_minute_ms(now));
        }
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        if !self.face.take_invalidated() {
            return Ok(());
        }
        let now = self.clock.now();
        self.face
            .on_draw(&mut self.frame, &now)
            .unwrap_or_else(|never| match never {});

        if self.shown.as_ref() != Some(&self.frame) {
            trace!("Frame changed, sending to surface");
            self.surface
                .show(&self.frame)
                .context("Error showing frame")?;
            self.shown = Some(self.frame.clone());
        }
        Ok(())
    }
}

/// Start of the next wall-clock minute, in ms since the epoch
fn next_minute_ms<Tz: TimeZone>(now: &DateTime<Tz>) -> i64 {
    let into_minute =
        now.second() as i64 * 1000 + now.timestamp_subsec_millis() as i64;
    now.timestamp_millis() - into_minute + 60_000
}

/// Read control commands from stdin on a background thread, forwarding them
/// as host events. End of input is ignored; the face keeps running.
pub fn spawn_stdin_controls(events: Sender<HostEvent>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match HostEvent::from_command(&line) {
                Some(event) => {
                    if events.send(event).is_err() {
                        break;
                    }
                }
                None => warn!("Unknown command `{}`", line.trim()),
            }
        }
        debug!("Stdin closed");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_from_command() {
        assert_eq!(
            HostEvent::from_command("hide\n"),
            Some(HostEvent::VisibilityChanged(false))
        );
        assert_eq!(
            HostEvent::from_command(" ambient "),
            Some(HostEvent::AmbientModeChanged(true))
        );
        assert_eq!(
            HostEvent::from_command("square"),
            Some(HostEvent::ApplyWindowInsets(WindowInsets { is_round: false }))
        );
        assert_eq!(HostEvent::from_command("quit"), Some(HostEvent::Destroy));
        assert_eq!(HostEvent::from_command("dance"), None);
    }

    #[test]
    fn test_next_minute() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 14)
            .unwrap()
            .and_hms_milli_opt(3, 7, 45, 250)
            .unwrap()
            .and_utc();
        let expected = NaiveDate::from_ymd_opt(2026, 10, 14)
            .unwrap()
            .and_hms_opt(3, 8, 0)
            .unwrap()
            .and_utc();
        assert_eq!(next_minute_ms(&now), expected.timestamp_millis());

        let on_the_minute: DateTime<Utc> = expected;
        assert_eq!(
            next_minute_ms(&on_the_minute),
            expected.timestamp_millis() + 60_000
        );
    }
}
