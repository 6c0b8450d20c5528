//! Snapshot renderer: redraws the game surface at the host display cadence,
//! independent of when snapshots or particle triggers arrive.
//!
//! # Scheduling
//!
//! The renderer does not re-arm its own frame callback. The host display
//! loop (macroquad's main loop, a timer, a test harness) calls
//! [`Renderer::frame`] once per refresh; `frame` draws only while the
//! renderer is running, so [`stop`](Renderer::stop) deterministically
//! prevents any draw after it returns. This keeps render cadence fully
//! decoupled from the network tick: a frame with a stale or absent snapshot
//! simply draws what it has.
//!
//! # Frame pass
//!
//! clear → background grid lines → advance+draw particles → (with a
//! snapshot) food, then snakes head-first. Dead players and empty bodies
//! are skipped entirely.

pub mod particles;
pub mod surface;

#[cfg(feature = "render-macroquad")]
pub mod macroquad;

use rand::thread_rng;
use tracing::debug;

use crate::config::GameConfig;
use crate::protocol::Snapshot;

use particles::Particle;
pub use surface::{Rgba, Surface};

/// Background grid line color.
const GRID_LINE: Rgba = Rgba::new(1.0, 1.0, 1.0, 0.04);

/// Inset of a snake segment inside its cell, in pixels.
const SEGMENT_INSET: f32 = 1.5;

/// Corner radius of a snake segment.
const SEGMENT_RADIUS: f32 = 4.0;

/// Eye placement offset from the head cell's corner, in pixels.
const EYE_OFFSET: f32 = 5.0;

/// Food fill color (`#FF5252`).
const FOOD_COLOR: Rgba = Rgba::new(1.0, 0x52 as f32 / 255.0, 0x52 as f32 / 255.0, 1.0);

/// Food pulse phase advance per frame, tuned to roughly match a 200 ms
/// wall-clock period at display refresh rates.
const FOOD_PULSE_STEP: f32 = 0.08;

/// Field scale factor for a player count: doubles both grid axes every
/// `threshold` players.
pub fn field_scale(player_count: usize, threshold: u32) -> u32 {
    let steps = player_count as u32 / threshold.max(1);
    2u32.saturating_pow(steps)
}

/// Fixed-cadence snapshot renderer over a [`Surface`] backend.
pub struct Renderer<S: Surface> {
    surface: S,
    cell: f32,
    base_w: u32,
    base_h: u32,
    scale_threshold: u32,
    grid_w: u32,
    grid_h: u32,
    running: bool,
    snapshot: Option<Snapshot>,
    particles: Vec<Particle>,
    frame_count: u64,
}

impl<S: Surface> Renderer<S> {
    /// Create a renderer over `surface` with grid geometry from `config`.
    /// The surface is sized to the base grid immediately.
    pub fn new(mut surface: S, config: &GameConfig) -> Self {
        let (w, h) = (config.base_grid_w, config.base_grid_h);
        surface.resize(w as f32 * config.cell_size, h as f32 * config.cell_size);
        Self {
            surface,
            cell: config.cell_size,
            base_w: w,
            base_h: h,
            scale_threshold: config.field_scale_threshold,
            grid_w: w,
            grid_h: h,
            running: false,
            snapshot: None,
            particles: Vec::new(),
            frame_count: 0,
        }
    }

    /// Begin drawing frames. Idempotent.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop drawing frames. Takes effect before the next scheduled frame:
    /// no frame is drawn after this returns. Calling it when already
    /// stopped is a no-op.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Whether the frame pass currently draws.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Replace the held snapshot wholesale.
    ///
    /// When the snapshot carries grid dimensions different from the current
    /// ones, the surface is resized to match before the next draw. The
    /// previous snapshot is discarded entirely — nothing is merged.
    pub fn update_state(&mut self, snapshot: Snapshot) {
        if snapshot.grid_w > 0
            && snapshot.grid_h > 0
            && (snapshot.grid_w != self.grid_w || snapshot.grid_h != self.grid_h)
        {
            self.grid_w = snapshot.grid_w;
            self.grid_h = snapshot.grid_h;
            self.resize_surface();
        }
        self.snapshot = Some(snapshot);
    }

    /// Recompute the grid dimensions from the player count: both axes scale
    /// by `2^⌊count / threshold⌋`, so every `threshold` additional players
    /// doubles the linear dimensions.
    pub fn update_field_size(&mut self, player_count: usize) {
        let scale = field_scale(player_count, self.scale_threshold);
        let (w, h) = (
            self.base_w.saturating_mul(scale),
            self.base_h.saturating_mul(scale),
        );
        if (w, h) != (self.grid_w, self.grid_h) {
            debug!(player_count, scale, "field rescaled to {w}×{h}");
            self.grid_w = w;
            self.grid_h = h;
            self.resize_surface();
        }
    }

    /// Spawn a particle burst at the center of grid cell `(x, y)` in the
    /// given CSS color (unparsable colors fall back to white).
    pub fn create_particles(&mut self, x: i32, y: i32, color: &str) {
        let px = (x as f32 + 0.5) * self.cell;
        let py = (y as f32 + 0.5) * self.cell;
        let color = Rgba::from_css_or_white(color);
        self.particles
            .extend(particles::burst(&mut thread_rng(), px, py, color));
    }

    /// Draw one frame. No-op while stopped; tolerates an absent snapshot.
    pub fn frame(&mut self) {
        if !self.running {
            return;
        }
        self.frame_count = self.frame_count.wrapping_add(1);

        self.surface.clear();
        let px_w = self.grid_w as f32 * self.cell;
        let px_h = self.grid_h as f32 * self.cell;
        draw_grid(&mut self.surface, px_w, px_h, self.cell);
        particles::advance_and_draw(&mut self.surface, &mut self.particles);

        if let Some(snapshot) = &self.snapshot {
            draw_food(&mut self.surface, snapshot, self.cell, self.frame_count);
            draw_snakes(&mut self.surface, snapshot, self.cell);
        }
    }

    /// Current grid dimensions in cells.
    pub fn grid_size(&self) -> (u32, u32) {
        (self.grid_w, self.grid_h)
    }

    /// Live particles. Exposed for effect inspection and tests.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    fn resize_surface(&mut self) {
        self.surface
            .resize(self.grid_w as f32 * self.cell, self.grid_h as f32 * self.cell);
    }
}

fn draw_grid(surface: &mut impl Surface, px_w: f32, px_h: f32, cell: f32) {
    let mut x = 0.0;
    while x <= px_w {
        surface.line(x, 0.0, x, px_h, 1.0, GRID_LINE);
        x += cell;
    }
    let mut y = 0.0;
    while y <= px_h {
        surface.line(0.0, y, px_w, y, 1.0, GRID_LINE);
        y += cell;
    }
}

fn draw_food(surface: &mut impl Surface, snapshot: &Snapshot, cell: f32, frame_count: u64) {
    let pulse = 4.0 + (frame_count as f32 * FOOD_PULSE_STEP).sin() * 2.0;
    for food in &snapshot.foods {
        let cx = (food.x as f32 + 0.5) * cell;
        let cy = (food.y as f32 + 0.5) * cell;
        surface.fill_circle(cx, cy, pulse, FOOD_COLOR);
        // Specular highlight.
        surface.fill_circle(cx - 1.0, cy - 1.0, 1.5, Rgba::WHITE.with_alpha(0.7));
    }
}

fn draw_snakes(surface: &mut impl Surface, snapshot: &Snapshot, cell: f32) {
    for player in &snapshot.players {
        if !player.alive || player.snake.is_empty() {
            continue;
        }
        let head = Rgba::from_css_or_white(&player.color.head);
        let body = Rgba::from_css_or_white(&player.color.body);

        for (i, seg) in player.snake.iter().enumerate() {
            let color = if i == 0 { head } else { body };
            surface.fill_round_rect(
                seg.x as f32 * cell + SEGMENT_INSET,
                seg.y as f32 * cell + SEGMENT_INSET,
                cell - 2.0 * SEGMENT_INSET,
                cell - 2.0 * SEGMENT_INSET,
                SEGMENT_RADIUS,
                color,
            );
            if i == 0 {
                draw_eyes(surface, seg.x as f32 * cell, seg.y as f32 * cell, cell);
            }
        }
    }
}

fn draw_eyes(surface: &mut impl Surface, px: f32, py: f32, cell: f32) {
    let (lx, ly) = (px + EYE_OFFSET, py + EYE_OFFSET);
    let (rx, ry) = (px + cell - EYE_OFFSET, py + EYE_OFFSET);
    surface.fill_circle(lx, ly, 2.0, Rgba::WHITE);
    surface.fill_circle(rx, ry, 2.0, Rgba::WHITE);
    surface.fill_circle(lx, ly, 0.8, Rgba::BLACK);
    surface.fill_circle(rx, ry, 0.8, Rgba::BLACK);
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use crate::protocol::{Cell, PlayerColor, SnapshotPlayer};

    /// Records every draw call for assertions.
    #[derive(Debug, PartialEq, Clone)]
    enum Op {
        Resize { w: f32, h: f32 },
        Clear,
        Line,
        RoundRect { x: f32, y: f32, color: Rgba },
        Circle { x: f32, y: f32, r: f32, color: Rgba },
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
    }

    impl Surface for RecordingSurface {
        fn resize(&mut self, width: f32, height: f32) {
            self.ops.push(Op::Resize {
                w: width,
                h: height,
            });
        }
        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }
        fn line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Rgba) {
            self.ops.push(Op::Line);
        }
        fn fill_round_rect(&mut self, x: f32, y: f32, _: f32, _: f32, _: f32, color: Rgba) {
            self.ops.push(Op::RoundRect { x, y, color });
        }
        fn fill_circle(&mut self, x: f32, y: f32, r: f32, color: Rgba) {
            self.ops.push(Op::Circle { x, y, r, color });
        }
    }

    fn test_renderer() -> Renderer<RecordingSurface> {
        let mut r = Renderer::new(RecordingSurface::default(), &GameConfig::default());
        // Discard the construction-time resize so tests see draw ops only.
        r.surface.ops.clear();
        r
    }

    fn snake_player(alive: bool, cells: &[(i32, i32)]) -> SnapshotPlayer {
        SnapshotPlayer {
            id: "p".into(),
            nickname: "P".into(),
            snake: cells.iter().map(|&(x, y)| Cell { x, y }).collect(),
            score: 0,
            alive,
            color: PlayerColor {
                head: "#7C4DFF".into(),
                body: "#5A31C9".into(),
                particle: String::new(),
            },
        }
    }

    fn snapshot_with(players: Vec<SnapshotPlayer>, foods: Vec<Cell>) -> Snapshot {
        Snapshot {
            players,
            foods,
            tick: 0.0,
            grid_w: 60,
            grid_h: 30,
        }
    }

    #[test]
    fn field_scale_doubles_every_threshold() {
        assert_eq!(field_scale(0, 8), 1);
        assert_eq!(field_scale(7, 8), 1);
        assert_eq!(field_scale(8, 8), 2);
        assert_eq!(field_scale(23, 8), 2);
        assert_eq!(field_scale(24, 8), 4);
    }

    #[test]
    fn update_field_size_scales_grid_and_resizes_surface() {
        let mut r = test_renderer();
        r.update_field_size(8);
        assert_eq!(r.grid_size(), (120, 60));
        assert_eq!(
            r.surface.ops,
            vec![Op::Resize {
                w: 120.0 * 20.0,
                h: 60.0 * 20.0
            }]
        );

        // Same scale bracket → no change, no resize.
        r.surface.ops.clear();
        r.update_field_size(15);
        assert_eq!(r.grid_size(), (120, 60));
        assert!(r.surface.ops.is_empty());
    }

    #[test]
    fn no_frame_is_drawn_while_stopped() {
        let mut r = test_renderer();
        r.frame();
        assert!(r.surface.ops.is_empty());

        r.start();
        r.frame();
        assert!(!r.surface.ops.is_empty());

        r.surface.ops.clear();
        r.stop();
        r.stop(); // double stop is a no-op
        r.frame();
        assert!(r.surface.ops.is_empty());
    }

    #[test]
    fn frame_tolerates_absent_snapshot() {
        let mut r = test_renderer();
        r.start();
        r.frame();
        // Clear plus grid lines, nothing else.
        assert_eq!(r.surface.ops.first(), Some(&Op::Clear));
        assert!(r
            .surface
            .ops
            .iter()
            .skip(1)
            .all(|op| matches!(op, Op::Line)));
    }

    #[test]
    fn dead_and_empty_players_are_skipped() {
        let mut r = test_renderer();
        r.update_state(snapshot_with(
            vec![
                snake_player(false, &[(1, 1), (1, 2)]),
                snake_player(true, &[]),
            ],
            vec![],
        ));
        r.start();
        r.frame();
        assert!(!r
            .surface
            .ops
            .iter()
            .any(|op| matches!(op, Op::RoundRect { .. })));
    }

    #[test]
    fn head_gets_head_color_and_eyes() {
        let mut r = test_renderer();
        r.update_state(snapshot_with(vec![snake_player(true, &[(2, 3), (2, 4)])], vec![]));
        r.start();
        r.frame();

        let rects: Vec<_> = r
            .surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::RoundRect { x, y, color } => Some((*x, *y, *color)),
                _ => None,
            })
            .collect();
        assert_eq!(rects.len(), 2);

        let head_color = Rgba::from_css("#7C4DFF").unwrap();
        let body_color = Rgba::from_css("#5A31C9").unwrap();
        // Head first, at cell (2,3) with the head color.
        assert_eq!(rects[0], (2.0 * 20.0 + 1.5, 3.0 * 20.0 + 1.5, head_color));
        assert_eq!(rects[1].2, body_color);

        // Four eye circles (two whites, two pupils) on the head only.
        let eyes = r
            .surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Circle { r, .. } if *r <= 2.0))
            .count();
        assert_eq!(eyes, 4);
    }

    #[test]
    fn snapshot_replacement_is_total() {
        let mut r = test_renderer();
        r.start();

        r.update_state(snapshot_with(vec![], vec![Cell { x: 9, y: 9 }]));
        r.frame();
        let food_at = |ops: &[Op], cx: f32, cy: f32| {
            ops.iter()
                .any(|op| matches!(op, Op::Circle { x, y, .. } if *x == cx && *y == cy))
        };
        assert!(food_at(&r.surface.ops, 9.5 * 20.0, 9.5 * 20.0));

        // The replacement snapshot has different food; the old cell must
        // not be drawn again.
        r.surface.ops.clear();
        r.update_state(snapshot_with(vec![], vec![Cell { x: 1, y: 1 }]));
        r.frame();
        assert!(!food_at(&r.surface.ops, 9.5 * 20.0, 9.5 * 20.0));
        assert!(food_at(&r.surface.ops, 1.5 * 20.0, 1.5 * 20.0));
    }

    #[test]
    fn snapshot_with_new_dims_resizes_surface() {
        let mut r = test_renderer();
        let mut snapshot = snapshot_with(vec![], vec![]);
        snapshot.grid_w = 120;
        snapshot.grid_h = 60;
        r.update_state(snapshot);
        assert_eq!(r.grid_size(), (120, 60));
        assert_eq!(
            r.surface.ops,
            vec![Op::Resize {
                w: 2400.0,
                h: 1200.0
            }]
        );
    }

    #[test]
    fn particle_burst_lives_through_frames_then_expires() {
        let mut r = test_renderer();
        r.start();
        r.create_particles(5, 5, "hsla(270,100%,60%,1)");
        assert_eq!(r.particles().len(), particles::BURST_SIZE);

        for _ in 0..particles::PARTICLE_LIFE {
            r.frame();
        }
        assert!(r.particles().is_empty());
    }

    #[test]
    fn particles_still_advance_without_snapshot() {
        let mut r = test_renderer();
        r.start();
        r.create_particles(0, 0, "#FF5252");
        r.frame();
        let first = r.particles().first().copied().unwrap();
        assert_eq!(first.life, particles::PARTICLE_LIFE - 1);
    }

    #[test]
    fn particle_alpha_fades_with_life() {
        let mut r = test_renderer();
        r.start();
        r.create_particles(0, 0, "#FF5252");

        r.frame();
        let particle_circles: Vec<Rgba> = r
            .surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::Circle { r, color, .. } if *r == 3.0 => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(particle_circles.len(), particles::BURST_SIZE);
        let expected = (particles::PARTICLE_LIFE - 1) as f32 / particles::PARTICLE_LIFE as f32;
        for color in particle_circles {
            assert!((color.a - expected).abs() < 1e-6);
        }
    }
}
