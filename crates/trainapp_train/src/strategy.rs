//! Epoch bookkeeping shared by the training steps and the learner's
//! early stopping and checkpointing strategies.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burn::train::checkpoint::{CheckpointingAction, CheckpointingStrategy};
use burn::train::metric::store::EventStoreClient;
use burn::train::EarlyStoppingStrategy;
use tracing::{info, warn};

use crate::learner::TrainingState;
use crate::scheduler::OneCycleLR;
use trainapp_core::Goal;

/// Collects per-batch losses and metrics and folds them into a
/// [`TrainingState`] once an epoch ends.
///
/// Steps feed it as batches run; the learner's strategies call
/// [`EpochRecorder::observe`] at the end of every epoch. Observing an epoch
/// twice is a no-op, so both strategies can share one recorder.
#[derive(Debug)]
pub struct EpochRecorder {
    monitor: Option<(String, Goal)>,
    min_delta: f32,
    schedule: OneCycleLR,
    train: Running,
    valid: Running,
    metrics: BTreeMap<String, f32>,
    state: TrainingState,
    epochs_without_improvement: usize,
    last_improved: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Running {
    total: f32,
    samples: usize,
    batches: usize,
}

impl Running {
    fn add(&mut self, value: f32, samples: usize) {
        self.total += value * samples as f32;
        self.samples += samples;
        self.batches += 1;
    }

    fn mean(&self) -> f32 {
        if self.samples > 0 {
            self.total / self.samples as f32
        } else {
            0.0
        }
    }
}

impl EpochRecorder {
    /// Create a recorder tracking `monitor` in the direction of `goal`.
    ///
    /// `schedule` is a fresh copy of the learning rate schedule, used to
    /// report the rate of each epoch's last step.
    pub fn new(monitor: Option<(String, Goal)>, min_delta: f32, schedule: OneCycleLR) -> Self {
        Self {
            monitor,
            min_delta,
            schedule,
            train: Running::default(),
            valid: Running::default(),
            metrics: BTreeMap::new(),
            state: TrainingState::default(),
            epochs_without_improvement: 0,
            last_improved: false,
        }
    }

    /// Wrap in the handle shared with the steps and strategies.
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// Record the mean loss of one training batch.
    pub fn record_train(&mut self, loss: f32, batch_size: usize) {
        self.train.add(loss, batch_size);
    }

    /// Record the mean loss and metric values of one validation batch.
    pub fn record_valid(&mut self, loss: f32, metrics: &[(String, f32)], batch_size: usize) {
        self.valid.add(loss, batch_size);
        for (name, value) in metrics {
            *self.metrics.entry(name.clone()).or_insert(0.0) += value * batch_size as f32;
        }
    }

    /// Close epoch `epoch` (one-based), updating history and best value.
    pub fn observe(&mut self, epoch: usize) {
        if epoch <= self.state.epoch {
            return;
        }

        let train_loss = self.train.mean();
        let valid_loss = self.valid.mean();
        let scale = if self.valid.samples > 0 {
            1.0 / self.valid.samples as f32
        } else {
            0.0
        };
        let metrics: BTreeMap<String, f32> = std::mem::take(&mut self.metrics)
            .into_iter()
            .map(|(name, total)| (name, total * scale))
            .collect();

        self.state.epoch = epoch;
        self.state.step += self.train.batches;
        let lr = self.schedule.get_lr(self.state.step.saturating_sub(1));
        self.state.history.train_losses.push(train_loss);
        self.state.history.valid_losses.push(valid_loss);
        self.state.history.lrs.push(lr);

        self.last_improved = false;
        if let Some((name, goal)) = &self.monitor {
            let value = match name.as_str() {
                "train_loss" => Some(train_loss),
                "loss" | "valid_loss" => Some(valid_loss),
                other => metrics.get(other).copied(),
            };
            match value {
                Some(value) => {
                    let best = self.state.best_value.unwrap_or_else(|| goal.worst());
                    if goal.is_improvement(value, best, self.min_delta) {
                        self.state.best_epoch = Some(epoch - 1);
                        self.state.best_value = Some(value);
                        self.epochs_without_improvement = 0;
                        self.last_improved = true;
                    } else {
                        self.epochs_without_improvement += 1;
                    }
                }
                None => warn!(monitor = %name, epoch, "monitored value missing from epoch"),
            }
        }

        info!(
            epoch,
            train_loss,
            valid_loss,
            lr,
            metrics = ?metrics,
            improved = self.last_improved,
            "epoch finished"
        );

        self.state.history.metrics.push(metrics);
        self.train = Running::default();
        self.valid = Running::default();
    }

    /// Whether a monitored value is tracked.
    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    /// Whether the last observed epoch improved the monitored value.
    pub fn last_improved(&self) -> bool {
        self.last_improved
    }

    /// Epochs since the monitored value last improved.
    pub fn epochs_without_improvement(&self) -> usize {
        self.epochs_without_improvement
    }

    /// The state accumulated so far.
    pub fn state(&self) -> &TrainingState {
        &self.state
    }

    /// Take the accumulated state.
    pub fn into_state(self) -> TrainingState {
        self.state
    }
}

fn lock(recorder: &Mutex<EpochRecorder>) -> MutexGuard<'_, EpochRecorder> {
    recorder.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stops training once the monitored value has not improved for
/// `patience` epochs. Never stops without a monitor or with zero patience.
pub struct PatienceStopping {
    recorder: Arc<Mutex<EpochRecorder>>,
    patience: usize,
}

impl PatienceStopping {
    /// Create the strategy.
    pub fn new(recorder: Arc<Mutex<EpochRecorder>>, patience: usize) -> Self {
        Self { recorder, patience }
    }
}

impl EarlyStoppingStrategy for PatienceStopping {
    fn should_stop(&mut self, epoch: usize, _store: &EventStoreClient) -> bool {
        let mut recorder = lock(&self.recorder);
        recorder.observe(epoch);

        let stop = self.patience > 0
            && recorder.is_monitoring()
            && recorder.epochs_without_improvement() >= self.patience;
        if stop {
            info!(
                epoch,
                patience = self.patience,
                "early stopping after epochs without improvement"
            );
        }
        stop
    }
}

/// Keeps a single checkpoint: the epoch with the best monitored value.
pub struct BestEpochCheckpointing {
    recorder: Arc<Mutex<EpochRecorder>>,
    current: Option<usize>,
}

impl BestEpochCheckpointing {
    /// Create the strategy.
    pub fn new(recorder: Arc<Mutex<EpochRecorder>>) -> Self {
        Self {
            recorder,
            current: None,
        }
    }
}

impl CheckpointingStrategy for BestEpochCheckpointing {
    fn checkpointing(&mut self, epoch: usize, _store: &EventStoreClient) -> Vec<CheckpointingAction> {
        let improved = {
            let mut recorder = lock(&self.recorder);
            recorder.observe(epoch);
            recorder.last_improved()
        };

        let mut actions = Vec::new();
        if improved {
            if let Some(previous) = self.current.replace(epoch) {
                actions.push(CheckpointingAction::Delete(previous));
            }
            actions.push(CheckpointingAction::Save);
        }
        actions
    }
}
