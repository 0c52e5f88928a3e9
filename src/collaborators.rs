//! Consumers of lever decisions.
//!
//! The governance subsystem never renders, spawns or schedules anything
//! itself. It pushes lever values into these traits, implemented by the
//! host's renderer, particle system, entity spawner and UI scheduler.

use tracing::debug;

/// Consumes the render pixel ratio.
pub trait Renderer {
    fn set_pixel_ratio(&mut self, pixel_ratio: f64);
}

/// Consumes the particle budget.
pub trait ParticleSystem {
    fn set_enabled(&mut self, enabled: bool);
    fn set_intensity(&mut self, intensity: f64);
}

/// Consumes target entity populations.
///
/// Implementations are expected to approach the targets gradually rather
/// than spawning or despawning everything at once.
pub trait EntitySpawner {
    fn set_target_population(&mut self, bots: u32, food: u32);
}

/// Consumes the minimum interval between non-critical UI redraws.
///
/// Zero means "redraw whenever needed".
pub trait UiScheduler {
    fn set_min_interval_ms(&mut self, interval_ms: u32);
}

/// The set of collaborators a decision or settings push is applied to.
pub struct Collaborators<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub particles: &'a mut dyn ParticleSystem,
    pub spawner: &'a mut dyn EntitySpawner,
    pub ui: Option<&'a mut dyn UiScheduler>,
}

/// Push particle intensity along with the implicit enabled flag.
pub(crate) fn push_particles(particles: &mut dyn ParticleSystem, intensity: f64) {
    particles.set_enabled(intensity > 0.0);
    particles.set_intensity(intensity);
}

/// Fraction of the remaining gap closed per [`AsymptoticPopulation::step`].
pub const DEFAULT_APPROACH_RATE: f64 = 0.2;

/// Reference spawner that moves populations toward their targets a fraction
/// of the remaining gap per simulation step.
///
/// Always moves by at least one entity while a gap remains, so targets are
/// reached in finite steps.
#[derive(Debug, Clone, PartialEq)]
pub struct AsymptoticPopulation {
    bots: u32,
    food: u32,
    target_bots: u32,
    target_food: u32,
    approach_rate: f64,
}

impl AsymptoticPopulation {
    pub fn new(bots: u32, food: u32) -> Self {
        Self {
            bots,
            food,
            target_bots: bots,
            target_food: food,
            approach_rate: DEFAULT_APPROACH_RATE,
        }
    }

    pub fn with_approach_rate(mut self, rate: f64) -> Self {
        self.approach_rate = if rate.is_finite() {
            rate.clamp(0.01, 1.0)
        } else {
            DEFAULT_APPROACH_RATE
        };
        self
    }

    pub fn bots(&self) -> u32 {
        self.bots
    }

    pub fn food(&self) -> u32 {
        self.food
    }

    pub fn targets(&self) -> (u32, u32) {
        (self.target_bots, self.target_food)
    }

    pub fn is_settled(&self) -> bool {
        self.bots == self.target_bots && self.food == self.target_food
    }

    /// Advance one simulation step toward the targets.
    pub fn step(&mut self) {
        self.bots = approach(self.bots, self.target_bots, self.approach_rate);
        self.food = approach(self.food, self.target_food, self.approach_rate);
    }
}

impl EntitySpawner for AsymptoticPopulation {
    fn set_target_population(&mut self, bots: u32, food: u32) {
        debug!(bots, food, "Entity population targets updated");
        self.target_bots = bots;
        self.target_food = food;
    }
}

fn approach(current: u32, target: u32, rate: f64) -> u32 {
    let gap = target as f64 - current as f64;
    if gap == 0.0 {
        return current;
    }

    let step = (gap.abs() * rate).round().max(1.0);
    if gap > 0.0 {
        (current as f64 + step).min(target as f64) as u32
    } else {
        (current as f64 - step).max(target as f64) as u32
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_population_approaches_target_gradually() {
        let mut population = AsymptoticPopulation::new(18, 500);
        population.set_target_population(12, 320);

        population.step();
        assert!(population.bots() < 18 && population.bots() > 12);
        assert!(population.food() < 500 && population.food() > 320);

        for _ in 0..100 {
            population.step();
        }
        assert!(population.is_settled());
        assert_eq!((population.bots(), population.food()), (12, 320));
    }

    #[test]
    fn test_population_grows_back() {
        let mut population = AsymptoticPopulation::new(6, 180).with_approach_rate(0.5);
        population.set_target_population(10, 250);

        population.step();
        assert_eq!(population.bots(), 8);
        assert_eq!(population.food(), 215);
    }

    #[test]
    fn test_particles_disabled_at_zero_intensity() {
        let mut recorder = testing::Recorder::default();
        push_particles(&mut recorder, 0.0);
        assert_eq!(recorder.particles_enabled, Some(false));

        push_particles(&mut recorder, 0.4);
        assert_eq!(recorder.particles_enabled, Some(true));
        assert_eq!(recorder.particle_intensity, Some(0.4));
    }

    proptest! {
        // Property: a step never overshoots the target.
        #[test]
        fn prop_step_never_overshoots(
            current in 0u32..1000,
            target in 0u32..1000,
            rate in 0.01f64..=1.0,
        ) {
            let next = approach(current, target, rate);
            let (low, high) = if current <= target { (current, target) } else { (target, current) };
            prop_assert!(next >= low && next <= high);
            if current != target {
                prop_assert!(next != current);
            }
        }
    }
}
