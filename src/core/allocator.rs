/// Duration allocation: splits a total target duration across scenes.
///
/// Each scene gets a preferred length from its narration size and the
/// default speaking rate, bounded by the fastest and slowest allowed rates.
/// The gap to the target is water-filled across scenes with spare room,
/// then the result is rounded so the integer durations sum to the target.

use crate::core::config::PacingConfig;
use crate::core::text::clean_char_count;
use crate::schema::scene::Scene;

const EPSILON: f64 = 1e-6;

/// Longest target accepted, in seconds.
pub const MAX_TARGET_SEC: f64 = 86_400.0;

/// Allocation input for one scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBudget {
    /// Spoken characters (whitespace removed).
    pub chars: usize,
    /// Explicit duration from the scenario; pinned scenes are never resized.
    pub pinned_sec: Option<f64>,
}

impl SceneBudget {
    pub fn from_scene(scene: &Scene, primary: &str) -> Self {
        Self {
            chars: clean_char_count(scene.speech_text(primary)),
            pinned_sec: scene.timing.duration_sec().filter(|d| *d > 0.0),
        }
    }
}

/// Continuous bounds for one scene, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub lower: f64,
    pub preferred: f64,
    pub upper: f64,
    pub pinned: bool,
}

/// Result of an allocation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Integer target the durations sum to.
    pub target_sec: u32,
    pub durations_sec: Vec<u32>,
    /// Water-filled durations before rounding.
    pub continuous_sec: Vec<f64>,
    /// True when the target could not be met within the rate bounds.
    pub bounds_relaxed: bool,
}

impl Allocation {
    pub fn total_sec(&self) -> u32 {
        self.durations_sec.iter().sum()
    }
}

pub struct DurationAllocator {
    config: PacingConfig,
}

impl DurationAllocator {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn bounds(&self, budget: &SceneBudget) -> SceneBounds {
        let min = self.config.min_scene_sec;
        if let Some(pinned) = budget.pinned_sec {
            let sec = pinned.max(min);
            return SceneBounds {
                lower: sec,
                preferred: sec,
                upper: sec,
                pinned: true,
            };
        }
        let chars = budget.chars as f64;
        SceneBounds {
            lower: (chars / self.config.max_rate).max(min),
            preferred: (chars / self.config.default_rate).max(min),
            upper: (chars / self.config.min_rate).max(min),
            pinned: false,
        }
    }

    /// Allocate integer durations for `budgets`.
    ///
    /// A missing or non-positive `target_sec` falls back to the sum of the
    /// preferred durations. The target never drops below one minimum slot
    /// per scene.
    pub fn allocate(&self, budgets: &[SceneBudget], target_sec: Option<f64>) -> Allocation {
        if budgets.is_empty() {
            return Allocation {
                target_sec: 0,
                durations_sec: Vec::new(),
                continuous_sec: Vec::new(),
                bounds_relaxed: false,
            };
        }

        let bounds: Vec<SceneBounds> = budgets.iter().map(|b| self.bounds(b)).collect();
        let preferred_sum: f64 = bounds.iter().map(|b| b.preferred).sum();

        let requested = match target_sec {
            Some(t) if t.is_finite() && t > 0.0 => t.round(),
            _ => {
                tracing::debug!(preferred_sum, "no target duration, using preferred sum");
                preferred_sum.round()
            }
        };
        let requested = if requested > MAX_TARGET_SEC {
            tracing::warn!(requested, max = MAX_TARGET_SEC, "target longer than a day, capping it");
            MAX_TARGET_SEC
        } else {
            requested
        };
        let floor = (self.config.min_scene_sec.ceil() as u32).saturating_mul(budgets.len() as u32);
        let target = (requested.max(0.0) as u32).max(floor);
        if (target as f64) > requested {
            tracing::warn!(
                requested,
                target,
                scenes = budgets.len(),
                "target too short for one slot per scene, raising it"
            );
        }

        let (continuous, relaxed) = self.water_fill(&bounds, target as f64);
        let durations = self.round_to_target(&continuous, &bounds, target);

        tracing::debug!(target, ?durations, relaxed, "allocated scene durations");
        Allocation {
            target_sec: target,
            durations_sec: durations,
            continuous_sec: continuous,
            bounds_relaxed: relaxed,
        }
    }

    /// Move durations from preferred toward `target`, never past a scene's
    /// bounds. Returns the durations and whether bounds had to be relaxed.
    fn water_fill(&self, bounds: &[SceneBounds], target: f64) -> (Vec<f64>, bool) {
        let mut durations: Vec<f64> = bounds.iter().map(|b| b.preferred).collect();

        for _ in 0..self.config.max_fill_iterations {
            let delta = target - durations.iter().sum::<f64>();
            if delta.abs() < EPSILON {
                return (durations, false);
            }
            let rooms: Vec<f64> = bounds
                .iter()
                .zip(&durations)
                .map(|(b, d)| {
                    let room = if delta > 0.0 { b.upper - d } else { d - b.lower };
                    room.max(0.0)
                })
                .collect();
            let total_room: f64 = rooms.iter().sum();
            if total_room < EPSILON {
                break;
            }
            for (d, room) in durations.iter_mut().zip(&rooms) {
                let share = (delta.abs() * room / total_room).min(*room);
                *d += share * delta.signum();
            }
        }

        let residual = target - durations.iter().sum::<f64>();
        if residual.abs() < EPSILON {
            return (durations, false);
        }

        // Bounds exhausted: spread what is left over unpinned scenes.
        let min = self.config.min_scene_sec;
        let weights: Vec<f64> = bounds
            .iter()
            .zip(&durations)
            .map(|(b, d)| match (b.pinned, residual > 0.0) {
                (true, _) => 0.0,
                (false, true) => *d,
                (false, false) => (d - min).max(0.0),
            })
            .collect();
        let total_weight: f64 = weights.iter().sum();
        if total_weight > EPSILON {
            for (d, w) in durations.iter_mut().zip(&weights) {
                *d += residual * w / total_weight;
            }
        }
        tracing::warn!(residual, "speaking-rate bounds cannot meet target, relaxing");
        (durations, true)
    }

    /// Floor, hand out the remainder by largest fraction, then settle any
    /// residue on the last adjustable scene.
    fn round_to_target(&self, continuous: &[f64], bounds: &[SceneBounds], target: u32) -> Vec<u32> {
        let min = self.config.min_scene_sec.ceil() as u32;
        let mut durations: Vec<u32> = continuous
            .iter()
            .map(|d| (d.floor().max(0.0) as u32).max(min))
            .collect();

        let mut remainder = target as i64 - durations.iter().map(|d| *d as i64).sum::<i64>();
        if remainder > 0 {
            let mut order: Vec<usize> = (0..continuous.len()).collect();
            order.sort_by(|&a, &b| {
                let fa = continuous[a] - continuous[a].floor();
                let fb = continuous[b] - continuous[b].floor();
                fb.total_cmp(&fa).then(a.cmp(&b))
            });
            for idx in order.into_iter().take(remainder as usize) {
                durations[idx] += 1;
                remainder -= 1;
            }
        }

        if remainder != 0 {
            // Last unpinned scene first, then walk backwards.
            let mut candidates: Vec<usize> = (0..durations.len()).rev().filter(|&i| !bounds[i].pinned).collect();
            candidates.extend((0..durations.len()).rev().filter(|&i| bounds[i].pinned));
            for idx in candidates {
                if remainder > 0 {
                    durations[idx] += remainder as u32;
                    remainder = 0;
                } else {
                    let spare = durations[idx].saturating_sub(min) as i64;
                    let take = spare.min(-remainder);
                    durations[idx] -= take as u32;
                    remainder += take;
                }
                if remainder == 0 {
                    break;
                }
            }
        }

        durations
    }
}
