use crate::{
    config::Config,
    host::Surface,
    render::Frame,
    util::{self, Color},
};
use anyhow::{anyhow, Context};
use display_interface::DisplayError;
use display_interface_spi::SPIInterface;
use embedded_graphics::{
    geometry::{OriginDimensions, Point},
    draw_target::DrawTarget,
    Pixel,
};
use linux_embedded_hal::{
    spidev::{SpiModeFlags, SpidevOptions},
    sysfs_gpio::Direction,
    Delay, SpidevDevice, SysfsPin,
};
use log::{info, trace};
use weact_studio_epd::{
    graphics::{Display290BlackWhite, DisplayRotation},
    Color as EpdColor, WeActStudio290BlackWhiteDriver,
};

const PIN_BUSY: u64 = 17; // GPIO/BCM 17, pin 11
const PIN_DC: u64 = 22; // GPIO/BCM 22, pin 15
const PIN_RESET: u64 = 27; // GPIO/BCM 27, pin 13

/// Panel height in landscape orientation. The face is shrunk to a square of
/// this size and centered.
const PANEL_HEIGHT: u32 = 128;
const PANEL_WIDTH: u32 = 296;
/// Pixels brighter than this (text, divider, icon) become black ink on the
/// white panel; everything darker is paper
const INK_LUMA: u8 = 160;
/// Partial refreshes leave ghosting behind, so every so often do a full one
const FULL_REFRESH_INTERVAL: u32 = 30;

type Driver = WeActStudio290BlackWhiteDriver<
    SPIInterface<SpidevDevice, SysfsPin>,
    SysfsPin,
    SysfsPin,
    Delay,
>;

/// Mirrors the face onto a 2.9" black/white e-paper panel
pub struct Display {
    driver: Driver,
    display: Display290BlackWhite,
    /// Partial refreshes since the last full one
    partial_updates: u32,
}

impl Display {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut spi =
            SpidevDevice::open(&config.display_port).context("SPI device")?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(4_000_000)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options).context("SPI configuration")?;

        let reset = init_pin(PIN_RESET, Direction::Out)
            .context("Initializing pin Reset")?;
        let dc =
            init_pin(PIN_DC, Direction::Out).context("Initializing pin D/C")?;
        let busy = init_pin(PIN_BUSY, Direction::In)
            .context("Initializing pin Busy")?;

        let interface = SPIInterface::new(spi, dc);
        let mut driver =
            WeActStudio290BlackWhiteDriver::new(interface, busy, reset, Delay);
        driver.init().map_err(map_error)?;
        info!("Display controller initialized");

        let mut display = Display290BlackWhite::new();
        display.set_rotation(DisplayRotation::Rotate90);

        Ok(Self {
            driver,
            display,
            // Start with a full refresh to clear whatever was left on screen
            partial_updates: FULL_REFRESH_INTERVAL,
        })
    }

    /// Downscale and threshold a face frame into the panel buffer
    fn draw_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
        let size = frame.size();
        let scaled = util::scale_nearest(
            frame.pixels(),
            (size.width, size.height),
            (PANEL_HEIGHT, PANEL_HEIGHT),
        );
        let x_offset = ((PANEL_WIDTH - PANEL_HEIGHT) / 2) as i32;

        let pixels = scaled.into_iter().enumerate().map(|(i, color)| {
            let i = i as u32;
            let point = Point::new(
                x_offset + (i % PANEL_HEIGHT) as i32,
                (i / PANEL_HEIGHT) as i32,
            );
            let ink = Color::from(color).luma() > INK_LUMA;
            Pixel(point, if ink { EpdColor::Black } else { EpdColor::White })
        });
        self.display
            .clear(EpdColor::White)
            .map_err(|err| anyhow!("{err:?}"))?;
        self.display
            .draw_iter(pixels)
            .map_err(|err| anyhow!("{err:?}"))?;
        Ok(())
    }
}

impl Surface for Display {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.draw_frame(frame)?;
        if self.partial_updates >= FULL_REFRESH_INTERVAL {
            trace!("Full display refresh");
            self.driver
                .full_update(&self.display)
                .map_err(map_error)?;
            self.partial_updates = 0;
        } else {
            trace!("Partial display refresh");
            self.driver
                .fast_update(&self.display)
                .map_err(map_error)?;
            self.partial_updates += 1;
        }
        Ok(())
    }
}

/// Initialize a GPIO pin
fn init_pin(pin_num: u64, direction: Direction) -> anyhow::Result<SysfsPin> {
    let pin = SysfsPin::new(pin_num);
    pin.export().context("Error exporting pin")?;
    while !pin.is_exported() {}
    pin.set_direction(direction)
        .context("Error setting pin direction")?;
    if matches!(direction, Direction::Out) {
        pin.set_value(1).context("Error enabling pin")?;
    }
    Ok(pin)
}

/// The error type from the driver doesn't implement Error so we have to map
/// manually
fn map_error(error: DisplayError) -> anyhow::Error {
    anyhow!("{error:?}")
}
