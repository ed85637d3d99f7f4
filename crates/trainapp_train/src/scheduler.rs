//! One-cycle learning rate schedule.

use burn::lr_scheduler::LrScheduler;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

/// Configuration for OneCycleLR scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneCycleLRConfig {
    /// Maximum learning rate.
    pub max_lr: f64,
    /// Total number of steps.
    pub total_steps: usize,
    /// Percentage of steps for warmup.
    pub pct_start: f64,
    /// Division factor for initial LR.
    pub div_factor: f64,
    /// Final division factor.
    pub final_div_factor: f64,
}

impl Default for OneCycleLRConfig {
    fn default() -> Self {
        Self {
            max_lr: 1e-3,
            total_steps: 1000,
            pct_start: 0.25,
            div_factor: 25.0,
            final_div_factor: 1e5,
        }
    }
}

/// One-cycle learning rate scheduler.
///
/// The LR rises linearly from `max_lr / div_factor` to `max_lr` during the
/// warmup fraction of the run, then follows a cosine down to
/// `max_lr / final_div_factor`.
///
/// As a burn [`LrScheduler`] it yields the rate of each optimizer step in
/// turn.
#[derive(Debug, Clone)]
pub struct OneCycleLR {
    config: OneCycleLRConfig,
    initial_lr: f64,
    final_lr: f64,
    warmup_steps: usize,
    step: usize,
}

impl OneCycleLR {
    /// Create a new OneCycleLR scheduler.
    pub fn new(config: OneCycleLRConfig) -> Self {
        let initial_lr = config.max_lr / config.div_factor;
        let final_lr = config.max_lr / config.final_div_factor;
        let warmup_steps = (config.total_steps as f64 * config.pct_start) as usize;

        Self {
            config,
            initial_lr,
            final_lr,
            warmup_steps,
            step: 0,
        }
    }

    /// Create with just max_lr and total_steps.
    pub fn simple(max_lr: f64, total_steps: usize) -> Self {
        Self::new(OneCycleLRConfig {
            max_lr,
            total_steps,
            ..Default::default()
        })
    }

    /// Number of steps taken.
    pub fn steps_taken(&self) -> usize {
        self.step
    }

    /// Learning rate at `step`; steps past the end keep the final rate.
    pub fn get_lr(&self, step: usize) -> f64 {
        let step = step.min(self.config.total_steps.saturating_sub(1));

        if step < self.warmup_steps {
            let progress = step as f64 / self.warmup_steps as f64;
            self.initial_lr + (self.config.max_lr - self.initial_lr) * progress
        } else {
            let annealing_steps = (self.config.total_steps - self.warmup_steps).max(1);
            let progress = (step - self.warmup_steps) as f64 / annealing_steps as f64;
            let cosine = (1.0 + (std::f64::consts::PI * progress).cos()) / 2.0;
            self.final_lr + (self.config.max_lr - self.final_lr) * cosine
        }
    }
}

impl LrScheduler for OneCycleLR {
    type Record<B: Backend> = usize;

    fn step(&mut self) -> f64 {
        let lr = self.get_lr(self.step);
        self.step += 1;
        lr
    }

    fn to_record<B: Backend>(&self) -> Self::Record<B> {
        self.step
    }

    fn load_record<B: Backend>(mut self, record: Self::Record<B>) -> Self {
        self.step = record;
        self
    }
}
