//! Optional fault injection for exercising sender recovery.
//!
//! A [`Simulator`] decides, frame by frame, whether the receiver should
//! pretend an inbound data frame never arrived: no delivery, no ack.  The
//! sender then has to recover through its timeout.  It is off unless
//! [`crate::config::ReceiverConfig::fault`] is set.
//!
//! The RNG can be seeded so a lossy run is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Configuration for the fault-injection model.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Probability in `[0.0, 1.0]` that an inbound data frame is dropped.
    pub loss_rate: f64,
    /// Seed for the RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default: a transparent pass-through.
        Self {
            loss_rate: 0.0,
            seed: None,
        }
    }
}

/// Seeded random-drop decision source.
#[derive(Debug)]
pub struct Simulator {
    loss_rate: f64,
    rng: StdRng,
}

impl Simulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let loss_rate = if config.loss_rate.is_nan() {
            0.0
        } else {
            config.loss_rate.clamp(0.0, 1.0)
        };
        Self { loss_rate, rng }
    }

    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// `true` if the next frame should be dropped.
    pub fn should_drop(&mut self) -> bool {
        self.rng.gen_bool(self.loss_rate)
    }
}
