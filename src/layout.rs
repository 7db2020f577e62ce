//! Where everything goes on the face. Round and rectangular screens get
//! different horizontal offsets and text sizes; vertical offsets are shared.

use embedded_graphics::{
    geometry::{Point, Size},
    primitives::Rectangle,
};
use u8g2_fonts::{fonts, FontRenderer};

/// Width and height of the face canvas, in pixels
pub const FACE_SIZE: Size = Size::new(240, 240);

/// Vertical offsets. Text offsets are baselines, the rest are top edges.
const Y_OFFSET: f32 = 84.0;
const DATE_Y_OFFSET: f32 = 110.0;
const DIVIDER_Y_OFFSET: f32 = 124.0;
const DIVIDER_HEIGHT: f32 = 1.0;
const WEATHER_ICON_Y_OFFSET: f32 = 140.0;
const TEMP_Y_OFFSET: f32 = 174.0;

/// Offsets and sizes for every element. Computed from the screen shape once
/// the host reports it, then left alone until the next inset change.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LayoutMetrics {
    pub x_offset: f32,
    pub y_offset: f32,
    pub text_size: FontSize,
    pub date_x_offset: f32,
    pub date_y_offset: f32,
    pub date_text_size: FontSize,
    pub divider_x_offset: f32,
    pub divider_y_offset: f32,
    pub divider_width: f32,
    pub divider_height: f32,
    pub weather_icon_x_offset: f32,
    pub weather_icon_y_offset: f32,
    pub temp_y_offset: f32,
    pub high_temp_x_offset: f32,
    pub low_temp_x_offset: f32,
    pub temp_text_size: FontSize,
}

impl LayoutMetrics {
    /// Widest strings we expect in each slot, for collision checks
    pub const SAMPLE_TIME: &'static str = "00:00";
    pub const SAMPLE_DATE: &'static str = "WED, SEP 30 2026";
    pub const SAMPLE_TEMP: &'static str = "100°";
    /// Largest icon we draw: the 64px assets at 70%
    pub const MAX_ICON_SIZE: Size = Size::new(44, 44);

    pub fn for_shape(is_round: bool) -> Self {
        if is_round {
            Self {
                x_offset: 58.0,
                text_size: FontSize::Huge,
                date_x_offset: 46.0,
                date_text_size: FontSize::Small,
                divider_x_offset: 90.0,
                divider_width: 60.0,
                weather_icon_x_offset: 40.0,
                high_temp_x_offset: 96.0,
                low_temp_x_offset: 152.0,
                temp_text_size: FontSize::Medium,
                ..Self::shared()
            }
        } else {
            Self {
                x_offset: 36.0,
                text_size: FontSize::Large,
                date_x_offset: 30.0,
                date_text_size: FontSize::Tiny,
                divider_x_offset: 80.0,
                divider_width: 80.0,
                weather_icon_x_offset: 28.0,
                high_temp_x_offset: 92.0,
                low_temp_x_offset: 156.0,
                temp_text_size: FontSize::Small,
                ..Self::shared()
            }
        }
    }

    /// Values that don't depend on the screen shape. Horizontal fields are
    /// placeholders, always overwritten by [Self::for_shape].
    fn shared() -> Self {
        Self {
            x_offset: 0.0,
            y_offset: Y_OFFSET,
            text_size: FontSize::Large,
            date_x_offset: 0.0,
            date_y_offset: DATE_Y_OFFSET,
            date_text_size: FontSize::Small,
            divider_x_offset: 0.0,
            divider_y_offset: DIVIDER_Y_OFFSET,
            divider_width: 0.0,
            divider_height: DIVIDER_HEIGHT,
            weather_icon_x_offset: 0.0,
            weather_icon_y_offset: WEATHER_ICON_Y_OFFSET,
            temp_y_offset: TEMP_Y_OFFSET,
            high_temp_x_offset: 0.0,
            low_temp_x_offset: 0.0,
            temp_text_size: FontSize::Small,
        }
    }

    pub fn time_origin(&self) -> Point {
        point(self.x_offset, self.y_offset)
    }

    pub fn date_origin(&self) -> Point {
        point(self.date_x_offset, self.date_y_offset)
    }

    pub fn divider(&self) -> Rectangle {
        Rectangle::new(
            point(self.divider_x_offset, self.divider_y_offset),
            Size::new(
                self.divider_width.round() as u32,
                self.divider_height.round() as u32,
            ),
        )
    }

    pub fn icon_origin(&self) -> Point {
        point(self.weather_icon_x_offset, self.weather_icon_y_offset)
    }

    pub fn high_temp_origin(&self) -> Point {
        point(self.high_temp_x_offset, self.temp_y_offset)
    }

    pub fn low_temp_origin(&self) -> Point {
        point(self.low_temp_x_offset, self.temp_y_offset)
    }

    /// Approximate bounding box of every element, using the sample strings
    pub fn regions(&self) -> [(Element, Rectangle); 6] {
        [
            (
                Element::Time,
                self.text_size
                    .text_box(Self::SAMPLE_TIME, self.time_origin()),
            ),
            (
                Element::Date,
                self.date_text_size
                    .text_box(Self::SAMPLE_DATE, self.date_origin()),
            ),
            (Element::Divider, self.divider()),
            (
                Element::Icon,
                Rectangle::new(self.icon_origin(), Self::MAX_ICON_SIZE),
            ),
            (
                Element::HighTemp,
                self.temp_text_size
                    .text_box(Self::SAMPLE_TEMP, self.high_temp_origin()),
            ),
            (
                Element::LowTemp,
                self.temp_text_size
                    .text_box(Self::SAMPLE_TEMP, self.low_temp_origin()),
            ),
        ]
    }
}

impl Default for LayoutMetrics {
    /// Until the host tells us otherwise, assume a round screen
    fn default() -> Self {
        Self::for_shape(true)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Element {
    Time,
    Date,
    Divider,
    Icon,
    HighTemp,
    LowTemp,
}

/// Proxy for font sizes, because the u8g2 fonts are types, not values
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FontSize {
    Tiny,
    Small,
    Medium,
    Large,
    Huge,
}

const FONT_TINY: FontRenderer =
    FontRenderer::new::<fonts::u8g2_font_helvR10_tf>()
        .with_ignore_unknown_chars(true);
const FONT_SMALL: FontRenderer =
    FontRenderer::new::<fonts::u8g2_font_helvR12_tf>()
        .with_ignore_unknown_chars(true);
const FONT_MEDIUM: FontRenderer =
    FontRenderer::new::<fonts::u8g2_font_helvB18_tf>()
        .with_ignore_unknown_chars(true);
const FONT_LARGE: FontRenderer =
    FontRenderer::new::<fonts::u8g2_font_logisoso38_tn>()
        .with_ignore_unknown_chars(true);
const FONT_HUGE: FontRenderer =
    FontRenderer::new::<fonts::u8g2_font_logisoso42_tn>()
        .with_ignore_unknown_chars(true);

impl FontSize {
    pub fn renderer(self) -> &'static FontRenderer {
        match self {
            Self::Tiny => &FONT_TINY,
            Self::Small => &FONT_SMALL,
            Self::Medium => &FONT_MEDIUM,
            Self::Large => &FONT_LARGE,
            Self::Huge => &FONT_HUGE,
        }
    }

    /// (widest advance, ascent, descent) in pixels. Rough, but generous.
    fn char_dimensions(self) -> (u32, u32, u32) {
        match self {
            Self::Tiny => (10, 11, 3),
            Self::Small => (11, 13, 3),
            Self::Medium => (14, 19, 4),
            Self::Large => (22, 38, 0),
            Self::Huge => (24, 42, 0),
        }
    }

    /// Box that `text` drawn with its baseline at `origin` would fit in
    fn text_box(self, text: &str, origin: Point) -> Rectangle {
        let (char_width, ascent, descent) = self.char_dimensions();
        let width = text.chars().count() as u32 * char_width;
        Rectangle::new(
            origin - Point::new(0, ascent as i32),
            Size::new(width, ascent + descent),
        )
    }
}

fn point(x: f32, y: f32) -> Point {
    Point::new(x.round() as i32, y.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn assert_no_overlap(layout: &LayoutMetrics) {
        let canvas = Rectangle::new(Point::zero(), FACE_SIZE);
        let regions = layout.regions();
        for (element, region) in &regions {
            assert!(
                canvas.contains(region.top_left)
                    && region
                        .bottom_right()
                        .is_some_and(|corner| canvas.contains(corner)),
                "{element:?} {region:?} is off screen"
            );
        }
        for ((a, region_a), (b, region_b)) in
            regions.iter().tuple_combinations()
        {
            assert!(
                region_a.intersection(region_b).is_zero_sized(),
                "{a:?} {region_a:?} overlaps {b:?} {region_b:?}"
            );
        }
    }

    #[test]
    fn test_round_layout() {
        let layout = LayoutMetrics::for_shape(true);
        assert_eq!(layout.text_size, FontSize::Huge);
        assert_no_overlap(&layout);
    }

    #[test]
    fn test_rectangular_layout() {
        let layout = LayoutMetrics::for_shape(false);
        assert_eq!(layout.text_size, FontSize::Large);
        assert_no_overlap(&layout);
    }

    #[test]
    fn test_shape_is_pure() {
        assert_eq!(LayoutMetrics::for_shape(true), LayoutMetrics::for_shape(true));
        assert_ne!(
            LayoutMetrics::for_shape(true),
            LayoutMetrics::for_shape(false)
        );
        // Vertical rhythm is shared
        let (round, rect) =
            (LayoutMetrics::for_shape(true), LayoutMetrics::for_shape(false));
        assert_eq!(round.y_offset, rect.y_offset);
        assert_eq!(round.temp_y_offset, rect.temp_y_offset);
    }

    #[test]
    fn test_divider() {
        let divider = LayoutMetrics::for_shape(true).divider();
        assert_eq!(divider.top_left, Point::new(90, 124));
        assert_eq!(divider.size, Size::new(60, 1));
    }
}
