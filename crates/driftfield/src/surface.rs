//! The drawing surface the particles are rendered onto.
//!
//! The field itself only knows about the [`Canvas`] trait. The [`Surface`] implementation here
//! keeps a buffer of RGBA "pixels" and converts them to TTY cells with the UTF8 half-block
//! trick: ▀▄▀▄ — every cell carries 2 pixels, the upper in its foreground colour and the lower
//! in its background colour.

use glam::Vec2;
use termwiz::surface::Change as TermwizChange;
use termwiz::surface::Position as TermwizPosition;

/// An RGBA colour
pub type Colour = (f32, f32, f32, f32);

/// No colour at all. Lets the terminal's own background show through.
pub const TRANSPARENT: Colour = (0.0, 0.0, 0.0, 0.0);

/// What the field draws on. Coordinates are logical pixels, `(0, 0)` top-left.
pub trait Canvas {
    /// Change the surface's size. `scale` is the device pixel ratio the backing store should
    /// honour.
    fn resize(&mut self, width: f32, height: f32, scale: f32);
    /// Discard the previous frame entirely.
    fn clear(&mut self);
    /// Paint a translucent colour over the whole surface.
    fn wash(&mut self, colour: Colour);
    /// A filled circle.
    fn fill_circle(&mut self, centre: Vec2, radius: f32, colour: Colour);
    /// A straight line segment.
    fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour);
}

/// A pixel surface for the terminal.
#[derive(Clone, Debug)]
pub struct Surface {
    /// Width in pixels, so also the number of TTY columns.
    pub width: usize,
    /// Height in pixels, double the number of TTY rows.
    pub height: usize,
    /// Row-major RGBA pixels.
    pixels: Vec<Colour>,
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions,
    reason = "We're rastering floats onto a terminal grid"
)]
impl Surface {
    /// Create a blank surface. Dimensions are in pixels, not TTY rows.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![TRANSPARENT; width * height],
        }
    }

    /// Blend a colour over whatever is already at the given pixel. Source-over, straight alpha.
    pub fn blend_pixel(&mut self, x: isize, y: isize, colour: Colour) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let index = y as usize * self.width + x as usize;
        if let Some(destination) = self.pixels.get_mut(index) {
            *destination = blend(colour, *destination);
        }
    }

    /// The pixel at the given coordinate, transparent when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Colour {
        if x >= self.width || y >= self.height {
            return TRANSPARENT;
        }
        self.pixels
            .get(y * self.width + x)
            .copied()
            .unwrap_or(TRANSPARENT)
    }

    /// Convert the pixel buffer to a Termwiz surface of half-block cells, ready for
    /// `BufferedTerminal::draw_from_screen`.
    #[must_use]
    pub fn to_termwiz(&self) -> termwiz::surface::Surface {
        let rows = self.height.div_euclid(2);
        let mut surface = termwiz::surface::Surface::new(self.width, rows);

        for row in 0..rows {
            for col in 0..self.width {
                let upper = self.pixel(col, row * 2);
                let lower = self.pixel(col, row * 2 + 1);
                let is_upper_visible = upper.3 > 0.01;
                let is_lower_visible = lower.3 > 0.01;
                if !is_upper_visible && !is_lower_visible {
                    continue;
                }

                surface.add_change(TermwizChange::CursorPosition {
                    x: TermwizPosition::Absolute(col),
                    y: TermwizPosition::Absolute(row),
                });

                // A lone lower pixel must use "▄" so the cell's background can stay the
                // terminal's default colour.
                if is_lower_visible && !is_upper_visible {
                    surface.add_changes(vec![
                        make_fg_colour(over_black(lower)),
                        make_default_bg_colour(),
                    ]);
                    surface.add_change("▄");
                    continue;
                }

                let bg_colour = if is_lower_visible {
                    make_bg_colour(over_black(lower))
                } else {
                    make_default_bg_colour()
                };
                surface.add_changes(vec![make_fg_colour(over_black(upper)), bg_colour]);
                surface.add_change("▀");
            }
        }

        surface
    }
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::as_conversions,
    reason = "We're rastering floats onto a terminal grid"
)]
impl Canvas for Surface {
    fn resize(&mut self, width: f32, height: f32, _scale: f32) {
        // A terminal cell is always one physical "pixel" wide, so the scale has nothing to
        // amplify here.
        self.width = width.round().max(1.0) as usize;
        self.height = height.round().max(1.0) as usize;
        self.pixels = vec![TRANSPARENT; self.width * self.height];
    }

    fn clear(&mut self) {
        self.pixels.fill(TRANSPARENT);
    }

    fn wash(&mut self, colour: Colour) {
        for pixel in &mut self.pixels {
            *pixel = blend(colour, *pixel);
        }
    }

    fn fill_circle(&mut self, centre: Vec2, radius: f32, colour: Colour) {
        let radius = radius.max(0.5);
        let radius_squared = radius * radius;
        let min_x = (centre.x - radius).floor() as isize;
        let max_x = (centre.x + radius).ceil() as isize;
        let min_y = (centre.y - radius).floor() as isize;
        let max_y = (centre.y + radius).ceil() as isize;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let offset = Vec2::new(x as f32, y as f32) - centre;
                if offset.length_squared() <= radius_squared {
                    self.blend_pixel(x, y, colour);
                }
            }
        }
    }

    fn stroke_line(&mut self, from: Vec2, to: Vec2, colour: Colour) {
        let length = (to - from).length();
        let steps = (length.ceil() as usize).max(1);
        for step in 0..=steps {
            let point = from.lerp(to, step as f32 / steps as f32);
            self.blend_pixel(
                point.x.round() as isize,
                point.y.round() as isize,
                colour,
            );
        }
    }
}

/// Source-over blending with straight (non-premultiplied) alpha.
#[must_use]
fn blend(source: Colour, destination: Colour) -> Colour {
    let alpha = source.3 + destination.3 * (1.0 - source.3);
    if alpha <= f32::EPSILON {
        return TRANSPARENT;
    }
    let channel = |source_channel: f32, destination_channel: f32| {
        (source_channel * source.3 + destination_channel * destination.3 * (1.0 - source.3)) / alpha
    };
    (
        channel(source.0, destination.0),
        channel(source.1, destination.1),
        channel(source.2, destination.2),
        alpha,
    )
}

/// Terminals can't actually show translucency, so composite over black before converting.
#[must_use]
fn over_black(colour: Colour) -> Colour {
    (
        colour.0 * colour.3,
        colour.1 * colour.3,
        colour.2 * colour.3,
        1.0,
    )
}

/// Make a Termwiz colour attribute
#[must_use]
fn make_colour_attribute(colour: Colour) -> termwiz::color::ColorAttribute {
    termwiz::color::ColorAttribute::TrueColorWithDefaultFallback(termwiz::color::SrgbaTuple(
        colour.0, colour.1, colour.2, colour.3,
    ))
}

/// Make a Termwiz foreground colour
#[must_use]
fn make_fg_colour(colour: Colour) -> TermwizChange {
    TermwizChange::Attribute(termwiz::cell::AttributeChange::Foreground(
        make_colour_attribute(colour),
    ))
}

/// Make a Termwiz background colour
#[must_use]
fn make_bg_colour(colour: Colour) -> TermwizChange {
    TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(
        make_colour_attribute(colour),
    ))
}

/// The non-colour, usually black, that a terminal displays when nothing else has been set. It's
/// often what's used on a GUI terminal to make its background transparent.
#[must_use]
fn make_default_bg_colour() -> TermwizChange {
    TermwizChange::Attribute(termwiz::cell::AttributeChange::Background(
        termwiz::color::ColorAttribute::Default,
    ))
}

#[cfg(test)]
#[expect(
    clippy::indexing_slicing,
    clippy::default_numeric_fallback,
    reason = "Tests aren't so strict"
)]
mod test {
    use super::*;

    const WHITE: Colour = (1.0, 1.0, 1.0, 1.0);

    #[test]
    fn circle_covers_its_centre_but_not_the_far_corner() {
        let mut surface = Surface::new(20, 20);
        surface.fill_circle(Vec2::new(10.0, 10.0), 3.0, WHITE);
        assert!(surface.pixel(10, 10).3 > 0.9);
        assert!(surface.pixel(12, 10).3 > 0.9);
        assert!((surface.pixel(0, 0).3 - 0.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tiny_circles_still_land_a_pixel() {
        let mut surface = Surface::new(4, 4);
        surface.fill_circle(Vec2::new(2.0, 2.0), 0.1, WHITE);
        assert!(surface.pixel(2, 2).3 > 0.9);
    }

    #[test]
    fn line_touches_both_endpoints() {
        let mut surface = Surface::new(30, 30);
        surface.stroke_line(Vec2::new(2.0, 2.0), Vec2::new(20.0, 14.0), WHITE);
        assert!(surface.pixel(2, 2).3 > 0.9);
        assert!(surface.pixel(20, 14).3 > 0.9);
    }

    #[test]
    fn blending_accumulates_alpha() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(0, 0, (1.0, 0.0, 0.0, 0.5));
        surface.blend_pixel(0, 0, (1.0, 0.0, 0.0, 0.5));
        let pixel = surface.pixel(0, 0);
        assert!((pixel.3 - 0.75).abs() < 0.001);
    }

    #[test]
    fn drawing_off_surface_is_ignored() {
        let mut surface = Surface::new(4, 4);
        surface.blend_pixel(-1, 0, WHITE);
        surface.blend_pixel(0, 99, WHITE);
        surface.stroke_line(Vec2::new(-10.0, -10.0), Vec2::new(-1.0, -1.0), WHITE);
        for y in 0..4 {
            for x in 0..4 {
                assert!((surface.pixel(x, y).3 - 0.0).abs() < f32::EPSILON);
            }
        }
    }

    #[test]
    fn upper_pixel_becomes_a_half_block_cell() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(0, 0, WHITE);
        let mut termwiz_surface = surface.to_termwiz();

        let cells = termwiz_surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▀");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(WHITE));
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn lone_lower_pixel_keeps_the_default_background() {
        let mut surface = Surface::new(1, 2);
        surface.blend_pixel(0, 1, WHITE);
        let mut termwiz_surface = surface.to_termwiz();

        let cells = termwiz_surface.screen_cells();
        let cell = &cells[0][0];
        assert_eq!(cell.str(), "▄");
        assert_eq!(cell.attrs().foreground(), make_colour_attribute(WHITE));
        assert_eq!(
            cell.attrs().background(),
            termwiz::color::ColorAttribute::Default
        );
    }

    #[test]
    fn untouched_cells_stay_blank() {
        let surface = Surface::new(2, 2);
        let mut termwiz_surface = surface.to_termwiz();
        let cells = termwiz_surface.screen_cells();
        assert_eq!(cells[0][0].str(), " ");
    }

    #[test]
    fn resize_discards_old_pixels() {
        let mut surface = Surface::new(2, 2);
        surface.blend_pixel(0, 0, WHITE);
        surface.resize(6.0, 8.0, 2.0);
        assert_eq!(surface.width, 6);
        assert_eq!(surface.height, 8);
        assert!((surface.pixel(0, 0).3 - 0.0).abs() < f32::EPSILON);
    }
}
