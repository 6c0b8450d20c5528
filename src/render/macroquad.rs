//! Macroquad-backed [`Surface`] implementation.
//!
//! Draw calls target macroquad's global context, so this surface must be
//! used from the macroquad main loop. Only available with the
//! `render-macroquad` feature.
//!
//! ```rust,ignore
//! let config = GameConfig::default();
//! let mut renderer = Renderer::new(MacroquadSurface::new(), &config);
//! renderer.start();
//! loop {
//!     renderer.frame();
//!     ::macroquad::window::next_frame().await;
//! }
//! ```

use super::surface::{Rgba, Surface};

fn mq_color(c: Rgba) -> ::macroquad::color::Color {
    ::macroquad::color::Color::new(c.r, c.g, c.b, c.a)
}

/// Background clear color (near-black, matching the arena theme).
const BACKGROUND: Rgba = Rgba::new(0.04, 0.04, 0.08, 1.0);

/// A [`Surface`] that draws through macroquad's immediate-mode API.
#[derive(Debug, Default)]
pub struct MacroquadSurface;

impl MacroquadSurface {
    pub fn new() -> Self {
        Self
    }
}

impl Surface for MacroquadSurface {
    fn resize(&mut self, width: f32, height: f32) {
        ::macroquad::window::request_new_screen_size(width, height);
    }

    fn clear(&mut self) {
        ::macroquad::window::clear_background(mq_color(BACKGROUND));
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, thickness: f32, color: Rgba) {
        ::macroquad::shapes::draw_line(x1, y1, x2, y2, thickness, mq_color(color));
    }

    fn fill_round_rect(&mut self, x: f32, y: f32, w: f32, h: f32, _radius: f32, color: Rgba) {
        // macroquad has no rounded rectangle primitive; the radius is
        // decorative, so square corners are acceptable here.
        ::macroquad::shapes::draw_rectangle(x, y, w, h, mq_color(color));
    }

    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: Rgba) {
        ::macroquad::shapes::draw_circle(x, y, radius, mq_color(color));
    }
}
