//! The application trait and its hooks.

use std::io::Write;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::bibtex::default_bibtex_files;
use crate::cli::{AppCli, InferenceBackend};
use crate::error::{AppError, Result};
use crate::model::Mlp;
use crate::pretrained::resolve_pretrained;
use trainapp_core::{Goal, Hook, HookArgs, Param};
use trainapp_data::{DataLoaders, TabularDataset};
use trainapp_train::{
    monitor_goal, AppModel, LearnerConfig, LearnerFactory, LossFunction, Metric, Predictions,
};

/// A command-line training application.
///
/// Implementors override the hooks that define their task. Every hook `h`
/// has a companion `h_params()` listing its parameters; that list is the
/// only place a hook's defaults are declared, and it drives both the
/// command-line flags and [`App::default_args`].
///
/// Hooks without a sensible default fail with [`AppError::NotImplemented`].
///
/// # Example
///
/// ```rust,ignore
/// struct MyApp;
///
/// impl App for MyApp {
///     type Model<B: AutodiffBackend> = Mlp<B>;
///
///     fn model_params(&self) -> Vec<Param> {
///         vec![Param::int("hidden_size").default(8)]
///     }
///
///     fn model<B: AutodiffBackend>(&self, args: &HookArgs, device: &B::Device) -> Result<Mlp<B>> {
///         let hidden = args.get::<usize>("hidden_size")?;
///         Ok(MlpConfig::new(4, 3).with_hidden_sizes(vec![hidden]).init(device))
///     }
/// }
///
/// fn main() -> anyhow::Result<()> {
///     MyApp.cli()?.run()?;
///     Ok(())
/// }
/// ```
pub trait App: Sized {
    /// The model the app trains, for any autodiff backend.
    type Model<B: AutodiffBackend>: AppModel<B>
        + AutodiffModule<B, InnerModule: AppModel<B::InnerBackend>>
        + 'static;

    /// The app's name; the unqualified type name unless overridden.
    fn name(&self) -> String {
        type_name_of::<Self>()
    }

    /// One-line description shown in the command-line help.
    fn description(&self) -> String {
        String::new()
    }

    /// Base directory for relative pretrained locations.
    fn asset_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Parameters of [`App::model`].
    fn model_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Build the model.
    fn model<B: AutodiffBackend>(&self, _args: &HookArgs, _device: &B::Device) -> Result<Self::Model<B>> {
        Err(AppError::not_implemented(self.name(), Hook::Model))
    }

    /// Parameters of [`App::data`].
    fn data_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Build the training and validation dataloaders.
    fn data(&self, _args: &HookArgs) -> Result<DataLoaders> {
        Err(AppError::not_implemented(self.name(), Hook::Data))
    }

    /// Parameters of [`App::loss_function`].
    fn loss_function_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// The loss to optimize. Cross-entropy by default.
    fn loss_function(&self, _args: &HookArgs) -> Result<LossFunction> {
        Ok(LossFunction::CrossEntropy)
    }

    /// Parameters of [`App::metrics`].
    fn metrics_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Metrics evaluated on the validation set. None by default.
    fn metrics<B: Backend>(&self, _args: &HookArgs) -> Result<Vec<Box<dyn Metric<B>>>> {
        Ok(Vec::new())
    }

    /// Parameters of the training run itself.
    fn fit_params(&self) -> Vec<Param> {
        vec![
            Param::int("epochs").default(20).help("Number of training epochs"),
            Param::float("lr").default(1e-3).help("Peak learning rate of the one-cycle schedule"),
            Param::float("weight_decay").default(0.01).help("Weight decay for Adam"),
            Param::int("patience")
                .default(0)
                .help("Epochs without improvement before stopping (0 disables)"),
            Param::int("seed").default(42).help("Seed for parameter initialization"),
            Param::path("output_dir")
                .default(PathBuf::from("outputs"))
                .help("Directory for the trained model and its history"),
        ]
    }

    /// The monitored value (a metric name, `valid_loss` or `train_loss`).
    ///
    /// `None` means no value is tracked: the final model is kept.
    fn monitor(&self) -> Option<String> {
        None
    }

    /// Direction of improvement of [`App::monitor`].
    ///
    /// A metric of that name decides through its `higher_is_better`;
    /// otherwise losses are minimized and anything else maximized.
    fn goal(&self) -> Option<Goal> {
        let monitor = self.monitor()?;
        let metrics = self
            .metrics::<InferenceBackend>(&self.default_args(Hook::Metrics))
            .unwrap_or_default();
        Some(monitor_goal(&monitor, &metrics))
    }

    /// Default location of pretrained weights: a path relative to
    /// [`App::asset_dir`], an absolute path, or a URL.
    fn pretrained_location(&self) -> Option<String> {
        None
    }

    /// BibTeX files to cite. Overrides usually extend
    /// [`default_bibtex_files`].
    fn bibtex_files(&self) -> Vec<PathBuf> {
        default_bibtex_files()
    }

    /// Parameters of [`App::inference_data`].
    fn inference_data_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// The rows to run predictions on.
    fn inference_data(&self, _args: &HookArgs) -> Result<TabularDataset> {
        Err(AppError::not_implemented(self.name(), Hook::InferenceData))
    }

    /// Parameters of [`App::output_results`].
    fn output_results_params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Report predictions to `out`. Writes the predicted index and raw
    /// outputs of every row by default.
    fn output_results(
        &self,
        predictions: &Predictions,
        _args: &HookArgs,
        out: &mut dyn Write,
    ) -> Result<()> {
        for (i, class) in predictions.decoded().into_iter().enumerate() {
            let outputs: Vec<String> = predictions.row(i).iter().map(|v| format!("{v:.4}")).collect();
            writeln!(out, "{i}\t{class}\t[{}]", outputs.join(", "))?;
        }
        Ok(())
    }

    /// The parameter list of `hook`.
    fn params(&self, hook: Hook) -> Vec<Param> {
        match hook {
            Hook::Data => self.data_params(),
            Hook::Model => self.model_params(),
            Hook::LossFunction => self.loss_function_params(),
            Hook::Metrics => self.metrics_params(),
            Hook::Fit => self.fit_params(),
            Hook::InferenceData => self.inference_data_params(),
            Hook::OutputResults => self.output_results_params(),
        }
    }

    /// Arguments holding the declared defaults of `hook`, for calling it
    /// directly. Override single values with [`HookArgs::set`].
    fn default_args(&self, hook: Hook) -> HookArgs {
        HookArgs::from_params(&self.params(hook))
    }

    /// Resolve the pretrained weights file.
    ///
    /// See [`resolve_pretrained`] for the rules.
    fn pretrained_local_path(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        resolve_pretrained(
            &self.name(),
            explicit,
            self.pretrained_location().as_deref(),
            &self.asset_dir(),
        )
    }

    /// A factory turning a model and dataloaders into a learner configured
    /// with this app's loss, metrics and monitor.
    fn build_learner_func<B: AutodiffBackend>(
        &self,
        args: &HookArgs,
        device: &B::Device,
    ) -> Result<LearnerFactory<B>> {
        let metrics = self.metrics::<B::InnerBackend>(args)?;
        let goal = self.goal().or_else(|| {
            self.monitor()
                .map(|monitor| monitor_goal(&monitor, &metrics))
        });
        let config = LearnerConfig::default()
            .with_loss(self.loss_function(args)?)
            .with_monitor(self.monitor(), goal);
        Ok(LearnerFactory::new(config, device).with_metrics(metrics))
    }

    /// Build the command-line interface, validating every hook declaration.
    fn cli(self) -> Result<AppCli<Self>> {
        AppCli::new(self)
    }
}

/// An app that overrides nothing.
///
/// Useful as a base for tests and to inspect the framework's defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseApp;

impl App for BaseApp {
    type Model<B: AutodiffBackend> = Mlp<B>;
}

/// The unqualified name of `T`, with generic arguments stripped.
pub(crate) fn type_name_of<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}
