//! Drawing the face. Everything here is a pure function of its inputs, drawn
//! onto any embedded-graphics target; [Frame] is the in-memory one we use.

use crate::{
    config::ColorConfig,
    layout::{FontSize, LayoutMetrics},
    state::DisplayState,
};
use chrono::{DateTime, Locale, TimeZone};
use embedded_graphics::{
    draw_target::DrawTarget,
    geometry::{OriginDimensions, Point, Size},
    pixelcolor::{Rgb888, RgbColor},
    primitives::{Primitive, PrimitiveStyle},
    Drawable, Pixel,
};
use log::warn;
use std::{convert::Infallible, fmt::Display};
use u8g2_fonts::types::{FontColor, VerticalPosition};

/// `HH:MM`, 24-hour, zero-padded. Not localized.
pub fn format_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    // https://docs.rs/chrono/latest/chrono/format/strftime/index.html
    now.format("%H:%M").to_string()
}

/// Full date, e.g. `WED, OCT 14 2026`, with day and month names in the given
/// locale
pub fn format_date<Tz: TimeZone>(now: &DateTime<Tz>, locale: Locale) -> String
where
    Tz::Offset: Display,
{
    now.format_localized("%a, %b %d %Y", locale)
        .to_string()
        .to_uppercase()
}

/// Resolved colors for a frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Palette {
    pub background: Rgb888,
    pub digital_text: Rgb888,
    pub light_digital_text: Rgb888,
    pub icon: Rgb888,
}

impl Palette {
    /// Low-bit ambient screens can only show full-on pixels
    const LOW_BIT: Self = Self {
        background: Rgb888::BLACK,
        digital_text: Rgb888::WHITE,
        light_digital_text: Rgb888::WHITE,
        icon: Rgb888::WHITE,
    };
}

impl From<&ColorConfig> for Palette {
    fn from(colors: &ColorConfig) -> Self {
        Self {
            background: colors.background.into(),
            digital_text: colors.digital_text.into(),
            light_digital_text: colors.light_digital_text.into(),
            icon: colors.icon.into(),
        }
    }
}

/// One frame of the face: the time to show, and everything needed to draw it
pub struct Scene<'a, Tz: TimeZone> {
    pub now: &'a DateTime<Tz>,
    pub locale: Locale,
    pub state: &'a DisplayState,
    pub layout: &'a LayoutMetrics,
    pub palette: &'a Palette,
    pub ambient: bool,
    pub low_bit_ambient: bool,
}

impl<Tz: TimeZone> Scene<'_, Tz>
where
    Tz::Offset: Display,
{
    fn palette(&self) -> Palette {
        if self.ambient && self.low_bit_ambient {
            Palette::LOW_BIT
        } else {
            *self.palette
        }
    }
}

impl<Tz: TimeZone> Drawable for Scene<'_, Tz>
where
    Tz::Offset: Display,
{
    type Color = Rgb888;
    type Output = ();

    fn draw<D>(&self, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Self::Color>,
    {
        let palette = self.palette();
        let layout = self.layout;

        // Background
        if self.ambient {
            target.clear(Rgb888::BLACK)?;
        } else {
            target.clear(palette.background)?;
        }

        draw_text(
            target,
            &format_time(self.now),
            layout.time_origin(),
            layout.text_size,
            palette.digital_text,
        )?;
        draw_text(
            target,
            &format_date(self.now, self.locale),
            layout.date_origin(),
            layout.date_text_size,
            palette.light_digital_text,
        )?;
        layout
            .divider()
            .into_styled(PrimitiveStyle::with_fill(palette.light_digital_text))
            .draw(target)?;

        // Icons are too bright for ambient
        if let Some(icon) = self.state.icon.as_ref().filter(|_| !self.ambient)
        {
            let origin = layout.icon_origin();
            target.draw_iter(icon.ink().map(|(x, y)| {
                Pixel(origin + Point::new(x as i32, y as i32), palette.icon)
            }))?;
        }

        draw_text(
            target,
            &self.state.high_temp,
            layout.high_temp_origin(),
            layout.temp_text_size,
            palette.digital_text,
        )?;
        draw_text(
            target,
            &self.state.low_temp,
            layout.low_temp_origin(),
            layout.temp_text_size,
            palette.light_digital_text,
        )?;
        Ok(())
    }
}

/// Draw a line of text with its baseline at `origin`. Font lookup failures
/// are logged and skipped; only errors from the target itself propagate.
fn draw_text<D>(
    target: &mut D,
    text: &str,
    origin: Point,
    font_size: FontSize,
    color: Rgb888,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    if text.is_empty() {
        return Ok(());
    }
    match font_size.renderer().render(
        text,
        origin,
        VerticalPosition::Baseline,
        FontColor::Transparent(color),
        target,
    ) {
        Ok(_) => Ok(()),
        Err(u8g2_fonts::Error::DisplayError(err)) => Err(err),
        Err(u8g2_fonts::Error::GlyphNotFound(glyph)) => {
            warn!("Missing glyph {glyph:?} drawing text `{text}`");
            Ok(())
        }
        Err(u8g2_fonts::Error::BackgroundColorNotSupported) => {
            warn!("Font can't draw a background for text `{text}`");
            Ok(())
        }
    }
}

/// Owned RGB pixel buffer, the surface every frame is drawn onto before it
/// goes to hardware
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    size: Size,
    /// Row-major
    pixels: Vec<Rgb888>,
}

impl Frame {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![Rgb888::BLACK; (size.width * size.height) as usize],
        }
    }

    /// Get a single pixel, or `None` if out of bounds
    pub fn get(&self, point: Point) -> Option<Rgb888> {
        self.index(point).map(|i| self.pixels[i])
    }

    pub fn pixels(&self) -> &[Rgb888] {
        &self.pixels
    }

    /// Number of pixels with the given color
    pub fn count(&self, color: Rgb888) -> usize {
        self.pixels.iter().filter(|pixel| **pixel == color).count()
    }

    fn index(&self, point: Point) -> Option<usize> {
        let (x, y) = (point.x, point.y);
        if x < 0
            || y < 0
            || x >= self.size.width as i32
            || y >= self.size.height as i32
        {
            None
        } else {
            Some(y as usize * self.size.width as usize + x as usize)
        }
    }
}

impl OriginDimensions for Frame {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for Frame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            // Anything off-canvas is clipped
            if let Some(i) = self.index(point) {
                self.pixels[i] = color;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{layout::FACE_SIZE, state::PersistedPreferences, util::Color};
    use chrono::{FixedOffset, NaiveDate};
    use embedded_graphics::primitives::{PointsIter, Rectangle};

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<FixedOffset> {
        NaiveDate::from_ymd_opt(2026, 10, 14)
            .unwrap()
            .and_hms_opt(hour, min, sec)
            .unwrap()
            .and_local_timezone(FixedOffset::east_opt(0).unwrap())
            .unwrap()
    }

    fn palette() -> Palette {
        Palette {
            background: Color::new(0x03, 0xa9, 0xf4).into(),
            digital_text: Rgb888::WHITE,
            light_digital_text: Color::new(0xb3, 0xe5, 0xfc).into(),
            icon: Rgb888::new(0xff, 0xeb, 0x3b),
        }
    }

    fn clear_day() -> DisplayState {
        DisplayState::from(&PersistedPreferences {
            high_temp: "75°".into(),
            low_temp: "58°".into(),
            weather_code: 800,
        })
    }

    fn draw(state: &DisplayState, ambient: bool, low_bit: bool) -> Frame {
        let now = at(3, 7, 45);
        let layout = LayoutMetrics::for_shape(true);
        let palette = palette();
        let mut frame = Frame::new(FACE_SIZE);
        Scene {
            now: &now,
            locale: Locale::en_US,
            state,
            layout: &layout,
            palette: &palette,
            ambient,
            low_bit_ambient: low_bit,
        }
        .draw(&mut frame)
        .unwrap();
        frame
    }

    /// Count pixels of a color within an area of a frame
    fn count_in(frame: &Frame, area: Rectangle, color: Rgb888) -> usize {
        area.points()
            .filter(|point| frame.get(*point) == Some(color))
            .count()
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(&at(3, 7, 45)), "03:07");
        assert_eq!(format_time(&at(0, 0, 0)), "00:00");
        assert_eq!(format_time(&at(23, 59, 59)), "23:59");
        assert_eq!(format_time(&at(12, 30, 0)), "12:30");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&at(3, 7, 45), Locale::en_US), "WED, OCT 14 2026");
        let date = at(3, 7, 45);
        let german = format_date(&date, Locale::de_DE);
        assert!(german.ends_with("14 2026"), "{german}");
        assert_eq!(german, german.to_uppercase());
    }

    #[test]
    fn test_interactive_frame() {
        let state = clear_day();
        let frame = draw(&state, false, false);
        let palette = palette();
        let layout = LayoutMetrics::for_shape(true);

        // Background corner is untouched by anything else
        assert_eq!(frame.get(Point::new(0, 0)), Some(palette.background));
        // Divider is solid
        assert!(layout
            .divider()
            .points()
            .all(|point| frame.get(point) == Some(palette.light_digital_text)));
        // Icon and time got drawn
        let icon_area = Rectangle::new(
            layout.icon_origin(),
            LayoutMetrics::MAX_ICON_SIZE,
        );
        assert!(count_in(&frame, icon_area, palette.icon) > 0);
        assert!(frame.count(palette.digital_text) > 0);
    }

    #[test]
    fn test_ambient_frame() {
        let state = clear_day();
        let frame = draw(&state, true, false);
        let palette = palette();
        let layout = LayoutMetrics::for_shape(true);

        assert_eq!(frame.get(Point::new(0, 0)), Some(Rgb888::BLACK));
        assert_eq!(frame.count(palette.background), 0);
        // No icon in ambient
        assert_eq!(frame.count(palette.icon), 0);
        // Temperatures are still shown
        let temp_area = Rectangle::new(
            layout.high_temp_origin() - Point::new(0, 19),
            Size::new(56, 23),
        );
        assert!(count_in(&frame, temp_area, palette.digital_text) > 0);
    }

    #[test]
    fn test_low_bit_ambient_frame() {
        let frame = draw(&clear_day(), true, true);
        // Nothing but full black and full white
        assert_eq!(
            frame.count(Rgb888::BLACK) + frame.count(Rgb888::WHITE),
            frame.pixels().len()
        );
    }

    #[test]
    fn test_missing_weather() {
        let frame = draw(&DisplayState::default(), false, false);
        let palette = palette();
        let layout = LayoutMetrics::for_shape(true);
        assert_eq!(frame.count(palette.icon), 0);
        // Nothing in the temperature row
        let weather_row = Rectangle::new(
            Point::new(0, layout.weather_icon_y_offset as i32),
            Size::new(FACE_SIZE.width, 46),
        );
        assert_eq!(
            count_in(&frame, weather_row, palette.background),
            weather_row.size.width as usize * weather_row.size.height as usize
        );
    }

    #[test]
    fn test_frame_clips() {
        let mut frame = Frame::new(Size::new(2, 2));
        frame
            .draw_iter([
                Pixel(Point::new(1, 1), Rgb888::RED),
                Pixel(Point::new(-1, 0), Rgb888::RED),
                Pixel(Point::new(2, 0), Rgb888::RED),
            ])
            .unwrap();
        assert_eq!(frame.count(Rgb888::RED), 1);
        assert_eq!(frame.get(Point::new(1, 1)), Some(Rgb888::RED));
        assert_eq!(frame.get(Point::new(5, 5)), None);
    }

    /// Error type with nothing but identity: no Debug, no Display
    struct Refused;

    /// Target that rejects every pixel
    struct ReadOnly;

    impl OriginDimensions for ReadOnly {
        fn size(&self) -> Size {
            FACE_SIZE
        }
    }

    impl DrawTarget for ReadOnly {
        type Color = Rgb888;
        type Error = Refused;

        fn draw_iter<I>(&mut self, _: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Err(Refused)
        }
    }

    #[test]
    fn test_target_errors_propagate() {
        let result = draw_text(
            &mut ReadOnly,
            "12:34",
            Point::new(10, 50),
            FontSize::Large,
            Rgb888::WHITE,
        );
        assert!(matches!(result, Err(Refused)));

        let state = clear_day();
        let scene = Scene {
            now: &at(3, 7, 45),
            locale: Locale::en_US,
            state: &state,
            layout: &LayoutMetrics::default(),
            palette: &palette(),
            ambient: false,
            low_bit_ambient: false,
        };
        assert!(matches!(scene.draw(&mut ReadOnly), Err(Refused)));
    }
}
