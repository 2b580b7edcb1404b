//! Reference boids generator.
//!
//! Agents fly over a torus the size of the contribution grid. Each agent
//! contributes once per step to the cell under it, with a signed value
//! proportional to its horizontal velocity. Seeding makes runs repeatable.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::generator::{CellValue, GeneratorSnapshot, ModulationGenerator, Position};
use crate::mapping::{Contribution, COLUMN_COUNT, ROW_COUNT};

const WIDTH: f32 = COLUMN_COUNT as f32;
const HEIGHT: f32 = ROW_COUNT as f32;

/// Tunables for [`Flock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockParams {
    /// Number of agents.
    pub agents: usize,
    /// Radius within which agents see each other, in cells.
    pub neighbor_radius: f32,
    /// Speed limit, in cells per step.
    pub max_speed: f32,
    /// Steering weight away from close neighbours.
    pub separation: f32,
    /// Steering weight towards the neighbours' mean velocity.
    pub alignment: f32,
    /// Steering weight towards the neighbours' centre.
    pub cohesion: f32,
    /// Contribution at full horizontal speed.
    pub depth: f32,
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            agents: 24,
            neighbor_radius: 6.0,
            max_speed: 0.8,
            separation: 0.05,
            alignment: 0.04,
            cohesion: 0.005,
            depth: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Agent {
    pos: Position,
    vx: f32,
    vy: f32,
}

/// Seeded boids simulation.
#[derive(Debug, Clone)]
pub struct Flock {
    params: FlockParams,
    agents: Vec<Agent>,
    steps: u64,
}

impl Flock {
    /// Scatter agents over the grid using `seed`.
    ///
    /// The same params and seed always give the same trajectory.
    pub fn new(params: FlockParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let agents = (0..params.agents)
            .map(|_| Agent {
                pos: Position {
                    x: rng.gen_range(0.0..WIDTH),
                    y: rng.gen_range(0.0..HEIGHT),
                },
                vx: rng.gen_range(-params.max_speed..=params.max_speed),
                vy: rng.gen_range(-params.max_speed..=params.max_speed) * 0.25,
            })
            .collect();
        Self {
            params,
            agents,
            steps: 0,
        }
    }

    /// Default params with the given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(FlockParams::default(), seed)
    }

    /// Tunables this flock was built with.
    pub fn params(&self) -> &FlockParams {
        &self.params
    }

    /// Steps taken since construction.
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

/// Shortest signed distance from `a` to `b` on a ring of length `len`.
fn wrapped_delta(a: f32, b: f32, len: f32) -> f32 {
    let d = b - a;
    if d > len / 2.0 {
        d - len
    } else if d < -len / 2.0 {
        d + len
    } else {
        d
    }
}

fn wrap(v: f32, len: f32) -> f32 {
    let w = v.rem_euclid(len);
    // rem_euclid can round up to exactly len for tiny negative inputs
    if w >= len {
        0.0
    } else {
        w
    }
}

impl ModulationGenerator for Flock {
    fn advance(&mut self) {
        let p = self.params;
        let radius_sq = p.neighbor_radius * p.neighbor_radius;
        let previous = self.agents.clone();

        for (i, agent) in self.agents.iter_mut().enumerate() {
            let (mut sep_x, mut sep_y) = (0.0f32, 0.0f32);
            let (mut ali_x, mut ali_y) = (0.0f32, 0.0f32);
            let (mut coh_x, mut coh_y) = (0.0f32, 0.0f32);
            let mut neighbors = 0u32;

            for (j, other) in previous.iter().enumerate() {
                if i == j {
                    continue;
                }
                let dx = wrapped_delta(agent.pos.x, other.pos.x, WIDTH);
                let dy = wrapped_delta(agent.pos.y, other.pos.y, HEIGHT);
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > radius_sq || dist_sq == 0.0 {
                    continue;
                }
                neighbors += 1;
                sep_x -= dx / dist_sq;
                sep_y -= dy / dist_sq;
                ali_x += other.vx;
                ali_y += other.vy;
                coh_x += dx;
                coh_y += dy;
            }

            if neighbors > 0 {
                let n = neighbors as f32;
                agent.vx += sep_x * p.separation
                    + (ali_x / n - agent.vx) * p.alignment
                    + (coh_x / n) * p.cohesion;
                agent.vy += sep_y * p.separation
                    + (ali_y / n - agent.vy) * p.alignment
                    + (coh_y / n) * p.cohesion;
            }

            let speed = (agent.vx * agent.vx + agent.vy * agent.vy).sqrt();
            if speed > p.max_speed {
                let scale = p.max_speed / speed;
                agent.vx *= scale;
                agent.vy *= scale;
            }

            agent.pos.x = wrap(agent.pos.x + agent.vx, WIDTH);
            agent.pos.y = wrap(agent.pos.y + agent.vy, HEIGHT);
        }

        self.steps += 1;
    }

    fn snapshot(&self) -> GeneratorSnapshot {
        let max_speed = self.params.max_speed.max(f32::EPSILON);
        let mut cells: BTreeMap<(i32, i32), f32> = BTreeMap::new();
        let mut contributions = Vec::with_capacity(self.agents.len());
        let mut positions = Vec::with_capacity(self.agents.len());

        for agent in &self.agents {
            let row = (agent.pos.y.floor() as i32).clamp(0, ROW_COUNT - 1);
            let col = (agent.pos.x.floor() as i32).clamp(0, COLUMN_COUNT - 1);
            let value = self.params.depth * (agent.vx / max_speed);

            contributions.push(Contribution::new(row, col, value));
            positions.push(agent.pos);
            *cells.entry((row, col)).or_insert(0.0) += value;
        }

        GeneratorSnapshot {
            contributions,
            positions,
            cells: cells
                .into_iter()
                .map(|((row, col), value)| CellValue { row, col, value })
                .collect(),
        }
    }
}
