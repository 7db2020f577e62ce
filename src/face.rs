//! Digital watch face with the day's forecast. In ambient mode the icon is
//! hidden and the timer stops; the host's minute tick keeps the clock fresh.

use crate::{
    config::Config,
    host::{
        BackgroundVisibility, HostProperties, PeekMode, WatchFace,
        WatchFaceStyle, WindowInsets,
    },
    layout::LayoutMetrics,
    render::{Palette, Scene},
    scheduler::{PendingTimer, TimerToken, UpdateScheduler},
    state::{DisplayState, PreferencesStore},
    sync::{CompanionSync, ConnectionId, SyncClient, SyncEvent},
};
use chrono::{DateTime, Local, Locale};
use embedded_graphics::{draw_target::DrawTarget, pixelcolor::Rgb888, Drawable};
use log::{error, info};
use std::mem;

pub struct SunshineFace<C> {
    locale: Locale,
    palette: Palette,
    preferences: PreferencesStore,
    sync: CompanionSync<C>,
    scheduler: UpdateScheduler,
    state: DisplayState,
    layout: LayoutMetrics,
    visible: bool,
    ambient: bool,
    low_bit_ambient: bool,
    invalidated: bool,
}

impl<C: SyncClient> SunshineFace<C> {
    pub fn new(config: &Config, client: C) -> anyhow::Result<Self> {
        Ok(Self {
            locale: config.locale()?,
            palette: Palette::from(&config.colors),
            preferences: PreferencesStore::new(&config.preferences_path),
            sync: CompanionSync::new(client),
            scheduler: UpdateScheduler::new(),
            state: DisplayState::default(),
            layout: LayoutMetrics::default(),
            visible: false,
            ambient: false,
            low_bit_ambient: false,
            invalidated: false,
        })
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn layout(&self) -> &LayoutMetrics {
        &self.layout
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn sync(&self) -> &CompanionSync<C> {
        &self.sync
    }

    /// The timer only runs while we're visible and interactive
    fn should_timer_be_running(&self) -> bool {
        self.visible && !self.ambient
    }

    fn update_timer(&mut self, now: &DateTime<Local>) {
        self.scheduler
            .update(self.should_timer_be_running(), now.timestamp_millis());
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
    }
}

impl<C: SyncClient> WatchFace for SunshineFace<C> {
    fn name(&self) -> &str {
        "Sunshine"
    }

    fn on_create(&mut self) -> WatchFaceStyle {
        // Show the last-known weather until the companion syncs
        self.state = DisplayState::from(&self.preferences.load());
        self.invalidate();
        WatchFaceStyle {
            peek_mode: PeekMode::Variable,
            background_visibility: BackgroundVisibility::Interruptive,
            show_system_ui_time: false,
        }
    }

    fn on_destroy(&mut self) {
        self.scheduler.shutdown();
        self.sync.unregister();
    }

    fn on_visibility_changed(&mut self, visible: bool, now: &DateTime<Local>) {
        self.visible = visible;
        if visible {
            self.sync.register();
            // Time zone may have changed while we were hidden
            self.invalidate();
        } else {
            self.sync.unregister();
        }
        self.update_timer(now);
    }

    fn on_ambient_mode_changed(&mut self, ambient: bool, now: &DateTime<Local>) {
        if self.ambient != ambient {
            info!("Ambient mode: {ambient}");
            self.ambient = ambient;
            self.invalidate();
        }
        self.update_timer(now);
    }

    fn on_apply_window_insets(&mut self, insets: WindowInsets) {
        self.layout = LayoutMetrics::for_shape(insets.is_round);
        self.invalidate();
    }

    fn on_properties_changed(&mut self, properties: HostProperties) {
        self.low_bit_ambient = properties.low_bit_ambient;
    }

    fn on_time_tick(&mut self) {
        self.invalidate();
    }

    fn on_timer(&mut self, token: TimerToken, now: &DateTime<Local>) {
        let should_run = self.should_timer_be_running();
        if self
            .scheduler
            .fire(token, should_run, now.timestamp_millis())
        {
            self.invalidate();
        }
    }

    fn on_sync_event(&mut self, connection: ConnectionId, event: SyncEvent) {
        let Some(update) = self.sync.handle(connection, event) else {
            return;
        };
        info!("Weather update: {update:?}");
        self.state.set_weather(&update);
        if let Err(err) = self.preferences.save(&update) {
            error!("{err:?}");
        }
        self.invalidate();
    }

    fn on_draw<D>(
        &mut self,
        target: &mut D,
        now: &DateTime<Local>,
    ) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        Scene {
            now,
            locale: self.locale,
            state: &self.state,
            layout: &self.layout,
            palette: &self.palette,
            ambient: self.ambient,
            low_bit_ambient: self.low_bit_ambient,
        }
        .draw(target)
    }

    fn next_timer(&self) -> Option<PendingTimer> {
        self.scheduler.pending()
    }

    fn take_invalidated(&mut self) -> bool {
        mem::take(&mut self.invalidated)
    }
}
