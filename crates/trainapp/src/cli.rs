//! Command-line interface synthesized from an app's hook declarations.
//!
//! Every command calls a fixed set of hooks; the parameters of those hooks
//! become the command's flags. Values resolve in order: command line,
//! then `--config` file, then the declared default.

use std::collections::{BTreeMap, HashSet};
use std::ffi::OsString;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use clap::builder::{BoolishValueParser, PossibleValuesParser};
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing::{debug, info};

use crate::app::App;
use crate::bibtex::merge_bibtex_files;
use crate::config::ConfigFile;
use crate::error::{AppError, Result};
use crate::logging;
use trainapp_core::{Hook, HookArgs, Param, ParamKind, ParamValue};
use trainapp_train::export::MODEL_WEIGHTS_FILE;
use trainapp_train::{load_model, predict, save_bundle, ExportMetadata, FitConfig, LearnerFactory};

/// Backend the commands train with.
pub type TrainBackend = Autodiff<NdArray>;

pub(crate) type InferenceBackend = <TrainBackend as AutodiffBackend>::InnerBackend;

/// Parameter names taken by the framework's own flags.
pub const RESERVED_NAMES: [&str; 6] = ["help", "version", "verbose", "config", "pretrained", "export_path"];

const PREDICT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Train,
    Validate,
    Predict,
    Export,
    Pretrained,
    Bibtex,
    Params,
}

impl CommandKind {
    const ALL: [CommandKind; 7] = [
        CommandKind::Train,
        CommandKind::Validate,
        CommandKind::Predict,
        CommandKind::Export,
        CommandKind::Pretrained,
        CommandKind::Bibtex,
        CommandKind::Params,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validate => "validate",
            Self::Predict => "predict",
            Self::Export => "export",
            Self::Pretrained => "pretrained",
            Self::Bibtex => "bibtex",
            Self::Params => "params",
        }
    }

    fn about(self) -> &'static str {
        match self {
            Self::Train => "Train the model and save it to the output directory",
            Self::Validate => "Evaluate pretrained weights on the validation set",
            Self::Predict => "Run pretrained weights on the inference data",
            Self::Export => "Write pretrained weights and metadata to a bundle directory",
            Self::Pretrained => "Print the resolved path of the pretrained weights",
            Self::Bibtex => "Print the BibTeX references of the app",
            Self::Params => "Print the resolved arguments of every hook as JSON",
        }
    }

    fn hooks(self) -> &'static [Hook] {
        match self {
            Self::Train => &[Hook::Data, Hook::Model, Hook::LossFunction, Hook::Metrics, Hook::Fit],
            Self::Validate => &[Hook::Data, Hook::Model, Hook::LossFunction, Hook::Metrics],
            Self::Predict => &[Hook::Model, Hook::InferenceData, Hook::OutputResults],
            Self::Export => &[Hook::Model],
            Self::Pretrained | Self::Bibtex => &[],
            Self::Params => &Hook::ALL,
        }
    }

    fn takes_pretrained(self) -> bool {
        matches!(self, Self::Validate | Self::Predict | Self::Export | Self::Pretrained)
    }
}

/// One subcommand and the merged parameters of its hooks.
#[derive(Debug, Clone)]
struct CommandDef {
    kind: CommandKind,
    params: Vec<Param>,
}

impl CommandDef {
    fn command(&self) -> Command {
        let mut cmd = Command::new(self.kind.name()).about(self.kind.about());
        for param in &self.params {
            cmd = cmd.arg(param_arg(param));
        }

        if self.kind.takes_pretrained() {
            cmd = cmd.arg(
                Arg::new("pretrained")
                    .long("pretrained")
                    .value_name("PATH")
                    .value_parser(value_parser!(PathBuf))
                    .help("Weights file, overriding the app's pretrained location"),
            );
        }
        match self.kind {
            CommandKind::Export => cmd.arg(
                Arg::new("export_path")
                    .long("export-path")
                    .value_name("DIR")
                    .required(true)
                    .value_parser(value_parser!(PathBuf))
                    .help("Directory the bundle is written to"),
            ),
            CommandKind::Bibtex => cmd.arg(
                Arg::new("output")
                    .long("output")
                    .short('o')
                    .value_name("FILE")
                    .value_parser(value_parser!(PathBuf))
                    .help("Write the references to FILE instead of stdout"),
            ),
            _ => cmd,
        }
    }
}

fn param_arg(param: &Param) -> Arg {
    let mut arg = Arg::new(param.name().to_string())
        .long(param.flag())
        .help(param.help_text().to_string());

    arg = match param.kind() {
        ParamKind::Bool => arg
            .value_name("BOOL")
            .num_args(0..=1)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new()),
        ParamKind::Choice(choices) => arg.value_parser(PossibleValuesParser::new(choices.clone())),
        kind => arg.value_name(kind.name().to_uppercase()),
    };

    match param.default_value() {
        Some(default) => arg.default_value(default.to_string()),
        None => arg,
    }
}

/// Parameters of `hooks`, merged into one flag list.
///
/// A parameter may appear in several hooks when every declaration agrees
/// on kind and default.
fn merged_params<A: App>(app: &A, hooks: &[Hook]) -> Result<Vec<Param>> {
    let mut merged: Vec<(Param, Hook)> = Vec::new();

    for &hook in hooks {
        let mut seen = HashSet::new();
        for param in app.params(hook) {
            let fail = |reason: String| {
                AppError::Initialization(format!("{}: hook '{hook}': {reason}", app.name()))
            };

            param.validate().map_err(|e| fail(e.to_string()))?;
            if RESERVED_NAMES.contains(&param.name()) {
                return Err(fail(format!("parameter name '{}' is reserved", param.name())));
            }
            if !seen.insert(param.name().to_string()) {
                return Err(fail(format!("parameter '{}' is declared twice", param.name())));
            }

            match merged.iter().position(|(p, _)| p.name() == param.name()) {
                Some(index) => {
                    let (existing, other) = &merged[index];
                    if existing.kind() != param.kind() || existing.default_value() != param.default_value() {
                        return Err(fail(format!(
                            "parameter '{}' conflicts with its declaration in hook '{other}'",
                            param.name()
                        )));
                    }
                }
                None => merged.push((param, hook)),
            }
        }
    }

    Ok(merged.into_iter().map(|(p, _)| p).collect())
}

/// The value a flag was given on the command line.
fn cli_value(param: &Param, matches: &ArgMatches) -> Result<ParamValue> {
    if let ParamKind::Bool = param.kind() {
        return Ok(ParamValue::Bool(
            matches.get_one::<bool>(param.name()).copied().unwrap_or(true),
        ));
    }
    let text = matches
        .get_one::<String>(param.name())
        .ok_or_else(|| AppError::MissingArgument(param.name().to_string()))?;
    Ok(param.kind().parse(param.name(), text)?)
}

/// Command-line interface of an [`App`].
///
/// # Example
///
/// ```rust,ignore
/// fn main() -> anyhow::Result<()> {
///     IrisApp::default().cli()?.run()?;
///     Ok(())
/// }
/// ```
pub struct AppCli<A: App> {
    app: A,
    commands: Vec<CommandDef>,
}

impl<A: App> AppCli<A> {
    /// Validate the app's hook declarations and build its commands.
    ///
    /// Fails with [`AppError::Initialization`] on a malformed declaration.
    pub fn new(app: A) -> Result<Self> {
        let commands = CommandKind::ALL
            .iter()
            .map(|&kind| {
                Ok(CommandDef {
                    kind,
                    params: merged_params(&app, kind.hooks())?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(app = %app.name(), "validated hook declarations");
        Ok(Self { app, commands })
    }

    /// The wrapped app.
    pub fn app(&self) -> &A {
        &self.app
    }

    /// Names of the subcommands.
    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.kind.name()).collect()
    }

    /// The merged parameters of subcommand `name`.
    pub fn params_of(&self, name: &str) -> Option<&[Param]> {
        self.find(name).map(|c| c.params.as_slice())
    }

    /// The clap command tree.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(self.app.name())
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .action(ArgAction::Count)
                    .global(true)
                    .help("Increase verbosity (-v, -vv, -vvv)"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_name("FILE")
                    .value_parser(value_parser!(PathBuf))
                    .global(true)
                    .help("JSON file of parameter values"),
            );

        let description = self.app.description();
        if !description.is_empty() {
            cmd = cmd.about(description);
        }
        for def in &self.commands {
            cmd = cmd.subcommand(def.command());
        }
        cmd
    }

    /// Run with the process arguments, exiting on usage errors.
    pub fn run(&self) -> Result<()> {
        match self.run_from(std::env::args_os()) {
            Err(AppError::Cli(e)) => e.exit(),
            other => other,
        }
    }

    /// Run with explicit arguments (the first is the binary name).
    pub fn run_from<I, T>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.run_with_output(args, &mut out)
    }

    /// Run with explicit arguments, writing command output to `out`.
    pub fn run_with_output<I, T>(&self, args: I, out: &mut dyn Write) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command().try_get_matches_from(args)?;
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| AppError::MissingArgument("command".to_string()))?;

        logging::init(matches.get_count("verbose").max(sub.get_count("verbose")));

        let def = self
            .find(name)
            .ok_or_else(|| AppError::invalid_value("command", format!("unknown command '{name}'")))?;
        let config_path = sub
            .get_one::<PathBuf>("config")
            .or_else(|| matches.get_one::<PathBuf>("config"));
        let config = config_path.map(ConfigFile::load).transpose()?;
        let args = self.resolve_args(def, sub, config.as_ref())?;

        info!(app = %self, command = name, "running command");
        let pretrained = sub.try_get_one::<PathBuf>("pretrained").ok().flatten();

        match def.kind {
            CommandKind::Train => self.train(&args, out),
            CommandKind::Validate => self.validate(&args, pretrained, out),
            CommandKind::Predict => self.predict(&args, pretrained, out),
            CommandKind::Export => {
                let export_path = sub
                    .get_one::<PathBuf>("export_path")
                    .ok_or_else(|| AppError::MissingArgument("export_path".to_string()))?;
                self.export(&args, pretrained, export_path, out)
            }
            CommandKind::Pretrained => {
                let path = self.app.pretrained_local_path(pretrained.map(PathBuf::as_path))?;
                writeln!(out, "{}", path.display())?;
                Ok(())
            }
            CommandKind::Bibtex => self.bibtex(sub.get_one::<PathBuf>("output"), out),
            CommandKind::Params => self.print_params(&args, out),
        }
    }

    fn find(&self, name: &str) -> Option<&CommandDef> {
        self.commands.iter().find(|c| c.kind.name() == name)
    }

    fn resolve_args(
        &self,
        def: &CommandDef,
        matches: &ArgMatches,
        config: Option<&ConfigFile>,
    ) -> Result<HookArgs> {
        let mut args = HookArgs::new();
        for param in &def.params {
            let value = if matches.value_source(param.name()) == Some(ValueSource::CommandLine) {
                Some(cli_value(param, matches)?)
            } else {
                let configured = match config {
                    Some(config) => config.value_for(param)?,
                    None => None,
                };
                configured.or_else(|| param.default_value().cloned())
            };

            if let Some(value) = value {
                args.insert(param.name(), value);
            }
        }
        Ok(args)
    }

    /// The subset of `args` declared by `hooks`.
    fn hook_args(&self, hooks: &[Hook], args: &HookArgs) -> HookArgs {
        let mut selected = HookArgs::new();
        for hook in hooks {
            for param in self.app.params(*hook) {
                if let Some(value) = args.value(param.name()) {
                    selected.insert(param.name(), value.clone());
                }
            }
        }
        selected
    }

    fn learner_factory(
        &self,
        args: &HookArgs,
        device: &<TrainBackend as Backend>::Device,
    ) -> Result<LearnerFactory<TrainBackend>> {
        let args = self.hook_args(&[Hook::LossFunction, Hook::Metrics], args);
        self.app.build_learner_func::<TrainBackend>(&args, device)
    }

    fn load_pretrained(
        &self,
        args: &HookArgs,
        explicit: Option<&PathBuf>,
        device: &<TrainBackend as Backend>::Device,
    ) -> Result<A::Model<TrainBackend>> {
        let path = self.app.pretrained_local_path(explicit.map(PathBuf::as_path))?;
        info!(path = %path.display(), "loading pretrained weights");

        let model = self
            .app
            .model::<TrainBackend>(&self.hook_args(&[Hook::Model], args), device)?;
        Ok(load_model::<TrainBackend, _>(model, &path, device)?)
    }

    fn train(&self, args: &HookArgs, out: &mut dyn Write) -> Result<()> {
        let device = Default::default();
        let fit = FitConfig::from_args(&self.hook_args(&[Hook::Fit], args))?;
        TrainBackend::seed(fit.seed.value());

        let dls = self.app.data(&self.hook_args(&[Hook::Data], args))?;
        let model = self
            .app
            .model::<TrainBackend>(&self.hook_args(&[Hook::Model], args), &device)?;
        let mut learner = self.learner_factory(args, &device)?.build(model, dls);
        let state = learner.fit(&fit)?.clone();

        let output_dir = args
            .get_opt::<PathBuf>("output_dir")?
            .unwrap_or_else(|| PathBuf::from("outputs"));
        let metadata = ExportMetadata::new(self.app.name())
            .with_training_stats(&state)
            .with_monitor(self.app.monitor())
            .with_args(args.clone());
        save_bundle::<TrainBackend, _>(learner.model(), &output_dir, Some(&state), &metadata)?;

        if let Some(best) = state.best_value {
            writeln!(out, "best {}: {best:.6}", self.app.monitor().unwrap_or_default())?;
        }
        writeln!(out, "Model saved to {}", output_dir.join(MODEL_WEIGHTS_FILE).display())?;
        Ok(())
    }

    fn validate(&self, args: &HookArgs, pretrained: Option<&PathBuf>, out: &mut dyn Write) -> Result<()> {
        let device = Default::default();
        let model = self.load_pretrained(args, pretrained, &device)?;
        let dls = self.app.data(&self.hook_args(&[Hook::Data], args))?;

        let result = self.learner_factory(args, &device)?.build(model, dls).validate()?;
        writeln!(out, "valid_loss\t{:.6}", result.loss)?;
        for (name, value) in &result.metrics {
            writeln!(out, "{name}\t{value:.6}")?;
        }
        Ok(())
    }

    fn predict(&self, args: &HookArgs, pretrained: Option<&PathBuf>, out: &mut dyn Write) -> Result<()> {
        let device = Default::default();
        let model = self.load_pretrained(args, pretrained, &device)?;
        let dataset = self
            .app
            .inference_data(&self.hook_args(&[Hook::InferenceData], args))?;

        let predictions = predict::<InferenceBackend, _>(&model.valid(), &dataset, PREDICT_BATCH_SIZE, &device)?;
        self.app
            .output_results(&predictions, &self.hook_args(&[Hook::OutputResults], args), out)
    }

    fn export(
        &self,
        args: &HookArgs,
        pretrained: Option<&PathBuf>,
        export_path: &Path,
        out: &mut dyn Write,
    ) -> Result<()> {
        let device = Default::default();
        let model = self.load_pretrained(args, pretrained, &device)?;
        let metadata = ExportMetadata::new(self.app.name())
            .with_monitor(self.app.monitor())
            .with_args(self.hook_args(&[Hook::Model], args));

        save_bundle::<TrainBackend, _>(&model, export_path, None, &metadata)?;
        writeln!(out, "Exported to {}", export_path.display())?;
        Ok(())
    }

    fn bibtex(&self, output: Option<&PathBuf>, out: &mut dyn Write) -> Result<()> {
        let merged = merge_bibtex_files(&self.app.bibtex_files())?;
        match output {
            Some(path) => {
                std::fs::write(path, &merged)?;
                info!(path = %path.display(), "wrote references");
            }
            None => write!(out, "{merged}")?,
        }
        Ok(())
    }

    fn print_params(&self, args: &HookArgs, out: &mut dyn Write) -> Result<()> {
        let by_hook: BTreeMap<&str, HookArgs> = Hook::ALL
            .iter()
            .map(|hook| (hook.name(), self.hook_args(&[*hook], args)))
            .collect();
        serde_json::to_writer_pretty(&mut *out, &by_hook).map_err(|e| AppError::Config(e.to_string()))?;
        writeln!(out)?;
        Ok(())
    }
}

impl<A: App> fmt::Display for AppCli<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.app.name())
    }
}
