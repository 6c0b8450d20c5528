//! Drawing surface abstraction for the snapshot renderer.
//!
//! The renderer core is backend-agnostic: it issues primitive draw calls
//! through the [`Surface`] trait and never touches a concrete graphics API.
//! The `render-macroquad` feature provides a real backend; tests use a
//! recording surface.

/// A straight-alpha RGBA color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::new(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Rgba = Rgba::new(0.0, 0.0, 0.0, 1.0);

    /// Construct a color from components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// The same color with a replaced alpha component.
    #[must_use]
    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    /// Parse a CSS color string as the game server sends them:
    /// `#RGB`, `#RRGGBB`, `hsl(h,s%,l%)` or `hsla(h,s%,l%,a)`.
    ///
    /// Returns `None` for anything else — callers fall back to a neutral
    /// color rather than failing the frame.
    pub fn from_css(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = s.to_ascii_lowercase();
        if let Some(body) = lower
            .strip_prefix("hsla(")
            .or_else(|| lower.strip_prefix("hsl("))
        {
            return parse_hsl(body.strip_suffix(')')?);
        }
        None
    }

    /// Like [`from_css`](Self::from_css) but falls back to white.
    pub fn from_css_or_white(s: &str) -> Self {
        Self::from_css(s).unwrap_or(Self::WHITE)
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    let expand = |c: u8| (c << 4) | c;
    let bytes = match hex.len() {
        3 => {
            let mut it = hex.chars().map(|c| c.to_digit(16).map(|d| d as u8));
            [
                expand(it.next()??),
                expand(it.next()??),
                expand(it.next()??),
            ]
        }
        6 => {
            let v = u32::from_str_radix(hex, 16).ok()?;
            [(v >> 16) as u8, (v >> 8) as u8, v as u8]
        }
        _ => return None,
    };
    Some(Rgba::new(
        f32::from(bytes[0]) / 255.0,
        f32::from(bytes[1]) / 255.0,
        f32::from(bytes[2]) / 255.0,
        1.0,
    ))
}

fn parse_hsl(body: &str) -> Option<Rgba> {
    let mut parts = body.split(',').map(str::trim);
    let h: f32 = parts.next()?.parse().ok()?;
    let s: f32 = parts.next()?.strip_suffix('%')?.parse::<f32>().ok()? / 100.0;
    let l: f32 = parts.next()?.strip_suffix('%')?.parse::<f32>().ok()? / 100.0;
    let a: f32 = match parts.next() {
        Some(alpha) => alpha.parse().ok()?,
        None => 1.0,
    };

    // Standard HSL → RGB conversion.
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = (h.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    Some(Rgba::new(r1 + m, g1 + m, b1 + m, a.clamp(0.0, 1.0)))
}

/// A drawing surface the renderer can target.
///
/// Coordinates are in pixels with the origin at the top-left corner, matching
/// the grid layout (`cell * grid` pixels per axis).
pub trait Surface {
    /// Resize the drawable area in pixels. Called when the grid dimensions
    /// change (field scaling or a snapshot with different dims).
    fn resize(&mut self, width: f32, height: f32);

    /// Clear the whole surface to the background.
    fn clear(&mut self);

    /// Stroke a straight line.
    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32, color: Rgba);

    /// Fill a rectangle with rounded corners. Backends without rounded
    /// rectangles may draw square corners; the radius is decorative.
    fn fill_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: Rgba);

    /// Fill a circle centered at `(x, y)`.
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba);
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.005
    }

    #[test]
    fn parses_six_digit_hex() {
        let c = Rgba::from_css("#FF5252").unwrap();
        assert!(close(c.r, 1.0));
        assert!(close(c.g, 0x52 as f32 / 255.0));
        assert!(close(c.b, 0x52 as f32 / 255.0));
        assert!(close(c.a, 1.0));
    }

    #[test]
    fn parses_three_digit_hex() {
        let c = Rgba::from_css("#fff").unwrap();
        assert!(close(c.r, 1.0) && close(c.g, 1.0) && close(c.b, 1.0));
    }

    #[test]
    fn parses_hsla_like_server_particle_colors() {
        // hsla(270,100%,60%,1) — the violet particle color.
        let c = Rgba::from_css("hsla(270,100%,60%,1)").unwrap();
        assert!(close(c.a, 1.0));
        // Violet: blue strongest, red next, green weakest.
        assert!(c.b > c.r && c.r > c.g);
    }

    #[test]
    fn parses_hsl_without_alpha() {
        let c = Rgba::from_css("hsl(0, 100%, 50%)").unwrap();
        assert!(close(c.r, 1.0) && close(c.g, 0.0) && close(c.b, 0.0));
        assert!(close(c.a, 1.0));
    }

    #[test]
    fn hsl_gray_axis() {
        let c = Rgba::from_css("hsl(123, 0%, 50%)").unwrap();
        assert!(close(c.r, 0.5) && close(c.g, 0.5) && close(c.b, 0.5));
    }

    #[test]
    fn garbage_falls_back_to_none() {
        assert!(Rgba::from_css("").is_none());
        assert!(Rgba::from_css("#12345").is_none());
        assert!(Rgba::from_css("hsl(1,2,3)").is_none());
        assert!(Rgba::from_css("blue").is_none());
        assert_eq!(Rgba::from_css_or_white("blue"), Rgba::WHITE);
    }

    #[test]
    fn with_alpha_replaces_only_alpha() {
        let c = Rgba::new(0.1, 0.2, 0.3, 1.0).with_alpha(0.25);
        assert!(close(c.a, 0.25));
        assert!(close(c.r, 0.1));
    }
}
