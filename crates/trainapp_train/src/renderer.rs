//! Learner progress reported through `tracing` instead of a terminal UI.

use burn::train::renderer::{MetricState, MetricsRenderer, TrainingProgress};
use tracing::debug;

/// Renders learner progress as `tracing` events.
///
/// Per-epoch summaries come from the epoch recorder; this renderer only
/// adds step-level detail at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl MetricsRenderer for TracingRenderer {
    fn update_train(&mut self, _state: MetricState) {}

    fn update_valid(&mut self, _state: MetricState) {}

    fn render_train(&mut self, item: TrainingProgress) {
        debug!(
            epoch = item.epoch,
            epochs = item.epoch_total,
            iteration = item.iteration,
            "train step"
        );
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        debug!(
            epoch = item.epoch,
            epochs = item.epoch_total,
            iteration = item.iteration,
            "valid step"
        );
    }
}
