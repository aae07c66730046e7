use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::graph::Measurement;

const NOISE_STDDEV_M: f32 = 0.05;
const MIN_REPORTED_M: f32 = 0.1;
const ORBIT_CENTER: Vec2 = vec2(2.5, 2.5);
const ORBIT_RADIUS_M: f32 = 1.5;
const ORBIT_RATE: f32 = 0.3;
const TIME_STEP: f32 = 0.1;

/// A small ranging network in meters: a gateway at the origin, three fixed
/// room anchors and one mobile tag circling between them. Every batch
/// reports all pairwise distances with Gaussian noise.
pub struct LiveNetwork {
    nodes: Vec<(String, Vec2)>,
    mobile: usize,
    time: f32,
    noise_stddev: f32,
    rng: StdRng,
}

impl LiveNetwork {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            nodes: vec![
                ("B5A4".to_owned(), vec2(0.0, 0.0)),
                ("R001".to_owned(), vec2(3.0, 2.0)),
                ("R002".to_owned(), vec2(1.5, 4.0)),
                ("R003".to_owned(), vec2(5.0, 3.5)),
                ("T001".to_owned(), vec2(2.0, 2.5)),
            ],
            mobile: 4,
            time: 0.0,
            noise_stddev: NOISE_STDDEV_M,
            rng,
        }
    }

    pub fn with_noise(mut self, stddev_m: f32) -> Self {
        self.noise_stddev = stddev_m.max(0.0);
        self
    }

    pub fn true_position(&self, id: &str) -> Option<Vec2> {
        self.nodes
            .iter()
            .find(|(node_id, _)| node_id == id)
            .map(|(_, position)| *position)
    }

    /// Box-Muller standard normal sample.
    fn gaussian(&mut self) -> f32 {
        let u1 = self.rng.r#gen::<f32>().max(f32::MIN_POSITIVE);
        let u2 = self.rng.r#gen::<f32>();
        (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }

    fn advance(&mut self) {
        self.time += TIME_STEP;
        let angle = self.time * ORBIT_RATE;
        self.nodes[self.mobile].1 = ORBIT_CENTER + vec2(angle.cos(), angle.sin()) * ORBIT_RADIUS_M;
    }

    pub fn next_batch(&mut self) -> Vec<Measurement> {
        self.advance();

        let mut batch = Vec::with_capacity(self.nodes.len() * (self.nodes.len() - 1) / 2);
        for i in 0..self.nodes.len() {
            for j in (i + 1)..self.nodes.len() {
                let exact = (self.nodes[i].1 - self.nodes[j].1).length();
                let noisy = exact + self.gaussian() * self.noise_stddev;
                batch.push(Measurement::new(
                    self.nodes[i].0.clone(),
                    self.nodes[j].0.clone(),
                    noisy.max(MIN_REPORTED_M),
                ));
            }
        }
        batch
    }
}
