//! Ephemeral particle effects for eat events.
//!
//! Particles are visual-only: never persisted, never part of a snapshot,
//! never synchronized across clients. A burst is spawned per `ate` event and
//! burns down over a fixed frame count.

use rand::Rng;

use super::surface::{Rgba, Surface};

/// Particles per burst.
pub const BURST_SIZE: usize = 12;

/// Particle lifetime in frames.
pub const PARTICLE_LIFE: u32 = 25;

/// Draw radius in pixels.
const PARTICLE_RADIUS: f32 = 3.0;

/// Maximum random angular jitter added to the evenly spaced burst angles,
/// in radians.
const ANGLE_JITTER: f32 = 0.5;

/// One decorative particle. Position and velocity are in surface pixels.
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Remaining life in frames; the particle is culled at zero.
    pub life: u32,
    pub max_life: u32,
    pub color: Rgba,
}

/// Spawn a burst of [`BURST_SIZE`] particles at a point.
///
/// Velocities are evenly distributed around the full circle with a small
/// random angular jitter and a randomized speed of 1–4 pixels per frame.
pub fn burst(rng: &mut impl Rng, x: f32, y: f32, color: Rgba) -> Vec<Particle> {
    (0..BURST_SIZE)
        .map(|i| {
            let angle = std::f32::consts::TAU * i as f32 / BURST_SIZE as f32
                + rng.gen::<f32>() * ANGLE_JITTER;
            let speed = 1.0 + rng.gen::<f32>() * 3.0;
            Particle {
                x,
                y,
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                life: PARTICLE_LIFE,
                max_life: PARTICLE_LIFE,
                color,
            }
        })
        .collect()
}

/// Advance every particle one frame, draw it, and cull the expired.
///
/// Draw-then-cull: a particle is moved, its life decremented, and it is
/// still drawn on the frame its life reaches zero (at zero alpha), then
/// removed in the same pass. After [`PARTICLE_LIFE`] advances a burst is
/// gone from the renderable set.
pub fn advance_and_draw(surface: &mut impl Surface, particles: &mut Vec<Particle>) {
    for p in particles.iter_mut() {
        p.x += p.vx;
        p.y += p.vy;
        p.life = p.life.saturating_sub(1);
        // Linear fade: alpha scales with remaining life.
        let fade = p.life as f32 / p.max_life as f32;
        surface.fill_circle(p.x, p.y, PARTICLE_RADIUS, p.color.with_alpha(p.color.a * fade));
    }
    particles.retain(|p| p.life > 0);
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
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    struct NullSurface;

    impl Surface for NullSurface {
        fn resize(&mut self, _width: f32, _height: f32) {}
        fn clear(&mut self) {}
        fn line(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Rgba) {}
        fn fill_round_rect(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: Rgba) {}
        fn fill_circle(&mut self, _: f32, _: f32, _: f32, _: Rgba) {}
    }

    #[test]
    fn burst_spawns_twelve_particles_at_origin_point() {
        let mut rng = StdRng::seed_from_u64(7);
        let particles = burst(&mut rng, 110.0, 50.0, Rgba::WHITE);
        assert_eq!(particles.len(), BURST_SIZE);
        for p in &particles {
            assert_eq!((p.x, p.y), (110.0, 50.0));
            assert_eq!(p.life, PARTICLE_LIFE);
            let speed = (p.vx * p.vx + p.vy * p.vy).sqrt();
            assert!((1.0..=4.0).contains(&speed), "speed {speed} out of range");
        }
    }

    #[test]
    fn burst_is_gone_after_exactly_lifetime_advances() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut particles = burst(&mut rng, 0.0, 0.0, Rgba::WHITE);
        let mut surface = NullSurface;

        for advance in 1..=PARTICLE_LIFE {
            advance_and_draw(&mut surface, &mut particles);
            if advance < PARTICLE_LIFE {
                assert_eq!(particles.len(), BURST_SIZE, "after advance {advance}");
            }
        }
        assert!(particles.is_empty(), "all particles culled at end of life");
    }

    #[test]
    fn particles_move_by_their_velocity() {
        let mut particles = vec![Particle {
            x: 10.0,
            y: 20.0,
            vx: 1.5,
            vy: -2.0,
            life: 5,
            max_life: 25,
            color: Rgba::WHITE,
        }];
        let mut surface = NullSurface;
        advance_and_draw(&mut surface, &mut particles);
        assert_eq!(particles.len(), 1);
        assert_eq!((particles[0].x, particles[0].y), (11.5, 18.0));
        assert_eq!(particles[0].life, 4);
    }
}
