//! Framework behavior observed through small test apps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use trainapp::bibtex::{default_bibtex_files, merge_bibtex};
use trainapp::prelude::*;
use trainapp::testing::AppTestCase;
use trainapp::train::Learner;

const TOY_CSV: &str = "\
a,b,label
0.0,0.1,x
0.1,0.0,x
0.2,0.1,x
1.0,0.9,y
0.9,1.0,y
1.1,1.0,y
";

#[derive(Debug, Default)]
struct DummyApp;

impl App for DummyApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn model_params(&self) -> Vec<Param> {
        vec![
            Param::int("hidden_size").default(8).help("Width of the hidden layer"),
            Param::choice("activation", Activation::NAMES).default("relu"),
        ]
    }

    fn model<B: AutodiffBackend>(&self, args: &HookArgs, device: &B::Device) -> Result<Mlp<B>> {
        let activation: Activation = args.get::<String>("activation")?.parse()?;
        Ok(MlpConfig::new(2, 2)
            .with_hidden_sizes(vec![args.get("hidden_size")?])
            .with_activation(activation)
            .init(device))
    }

    fn data_params(&self) -> Vec<Param> {
        vec![Param::int("batch_size").default(2)]
    }

    fn data(&self, args: &HookArgs) -> Result<DataLoaders> {
        let data = read_csv_from(TOY_CSV.as_bytes(), &CsvOptions::with_class_target("label"))?;
        let (train, valid) = train_valid_split(&data.dataset, 0.34, Seed::new(1))?;
        Ok(DataLoaders::builder(train, valid)
            .batch_size(args.get("batch_size")?)
            .build()?)
    }
}

/// A regression app monitoring a lower-is-better metric.
#[derive(Debug, Default)]
struct RegressionApp;

impl App for RegressionApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn loss_function(&self, _args: &HookArgs) -> Result<LossFunction> {
        Ok(LossFunction::Mse)
    }

    fn metrics<B: Backend>(&self, _args: &HookArgs) -> Result<Vec<Box<dyn Metric<B>>>> {
        Ok(vec![Box::new(MSE)])
    }

    fn monitor(&self) -> Option<String> {
        Some("mse".to_string())
    }
}

/// An app with a relative pretrained location under its own asset dir.
struct LocatedApp {
    dir: PathBuf,
}

impl App for LocatedApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn asset_dir(&self) -> PathBuf {
        self.dir.clone()
    }

    fn pretrained_location(&self) -> Option<String> {
        Some("weights/model.mpk".to_string())
    }
}

/// An app whose hooks declare whatever the test hands it.
struct DeclaringApp {
    data: Vec<Param>,
    model: Vec<Param>,
}

impl App for DeclaringApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn data_params(&self) -> Vec<Param> {
        self.data.clone()
    }

    fn model_params(&self) -> Vec<Param> {
        self.model.clone()
    }
}

fn declaring(data: Vec<Param>, model: Vec<Param>) -> DeclaringApp {
    DeclaringApp { data, model }
}

fn run_params(app: DummyApp, args: &[&str]) -> BTreeMap<String, BTreeMap<String, serde_json::Value>> {
    let cli = app.cli().unwrap();
    let mut out = Vec::new();
    let argv = std::iter::once("dummy").chain(args.iter().copied());
    cli.run_with_output(argv, &mut out).unwrap();
    serde_json::from_slice(&out).unwrap()
}

#[test]
fn test_default_args_reach_the_hook() {
    let device = Default::default();

    let model = DummyApp
        .model::<TrainBackend>(&DummyApp.default_args(Hook::Model), &device)
        .unwrap();
    assert_eq!(model.hidden_sizes(), vec![8]);
    assert_eq!(model.activation(), Activation::Relu);

    let args = DummyApp
        .default_args(Hook::Model)
        .set("hidden_size", 16)
        .set("activation", "gelu");
    let model = DummyApp.model::<TrainBackend>(&args, &device).unwrap();
    assert_eq!(model.hidden_sizes(), vec![16]);
    assert_eq!(model.activation(), Activation::Gelu);
}

#[test]
fn test_invalid_argument_raised_by_hook() {
    let device = Default::default();
    let args = DummyApp.default_args(Hook::Model).set("activation", "tanh");
    let err = DummyApp.model::<TrainBackend>(&args, &device).unwrap_err();
    assert!(matches!(err, AppError::InvalidValue { ref name, .. } if name == "activation"));
}

#[test]
fn test_missing_argument() {
    let device = Default::default();
    let err = DummyApp.model::<TrainBackend>(&HookArgs::new(), &device).unwrap_err();
    assert!(matches!(err, AppError::MissingArgument(_)));
}

#[test]
fn test_base_app_hooks_not_implemented() {
    let device = Default::default();

    let err = BaseApp
        .model::<TrainBackend>(&HookArgs::new(), &device)
        .unwrap_err();
    assert!(matches!(err, AppError::NotImplemented { hook: Hook::Model, .. }));
    assert!(err.is_configuration_missing());

    let err = BaseApp.data(&HookArgs::new()).unwrap_err();
    assert!(matches!(err, AppError::NotImplemented { hook: Hook::Data, .. }));
    assert_eq!(err.to_string(), "BaseApp does not implement the 'data' hook");
}

#[test]
fn test_malformed_declarations_fail_initialization() {
    let cases = [
        declaring(vec![Param::int("Batch Size")], vec![]),
        declaring(vec![Param::int("batch_size").default("many")], vec![]),
        declaring(vec![Param::choice("mode", Vec::<String>::new())], vec![]),
        declaring(vec![Param::path("pretrained")], vec![]),
        declaring(vec![Param::int("seed"), Param::int("seed")], vec![]),
        declaring(vec![Param::int("width").default(4)], vec![Param::int("width").default(8)]),
        declaring(vec![Param::int("width")], vec![Param::float("width")]),
    ];

    for app in cases {
        let declared = format!("{:?} {:?}", app.data, app.model);
        assert!(
            matches!(app.cli(), Err(AppError::Initialization(_))),
            "accepted {declared}"
        );
    }
}

#[test]
fn test_shared_declarations_are_merged() {
    let shared = || Param::int("width").default(4);
    let cli = declaring(vec![shared().help("data width")], vec![shared()])
        .cli()
        .unwrap();

    let train = cli.params_of("train").unwrap();
    assert_eq!(train.iter().filter(|p| p.name() == "width").count(), 1);
}

#[test]
fn test_help_renders() {
    AppTestCase::new(BaseApp::default).assert_help_renders();
    AppTestCase::new(DummyApp::default).assert_help_renders();
}

#[test]
fn test_name_defaults_to_type_name() {
    assert_eq!(DummyApp.name(), "DummyApp");
    assert_eq!(BaseApp.name(), "BaseApp");
    assert_eq!(DummyApp.cli().unwrap().to_string(), "DummyApp");
}

#[test]
fn test_pretrained_resolution() {
    assert!(matches!(
        BaseApp.pretrained_local_path(None),
        Err(AppError::FileNotFound(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("custom.mpk");
    std::fs::write(&weights, b"weights").unwrap();

    let resolved = BaseApp.pretrained_local_path(Some(weights.as_path())).unwrap();
    assert!(resolved.is_absolute());
    assert_eq!(resolved.file_name(), weights.file_name());
    assert_eq!(resolved.parent(), Some(dir.path()));

    let missing = dir.path().join("missing.mpk");
    assert!(matches!(
        BaseApp.pretrained_local_path(Some(missing.as_path())),
        Err(AppError::FileNotFound(_))
    ));

    let located = LocatedApp {
        dir: dir.path().to_path_buf(),
    };
    assert!(matches!(
        located.pretrained_local_path(None),
        Err(AppError::FileNotFound(_))
    ));
    std::fs::create_dir_all(dir.path().join("weights")).unwrap();
    std::fs::write(dir.path().join("weights/model.mpk"), b"weights").unwrap();
    assert_eq!(
        located.pretrained_local_path(None).unwrap(),
        dir.path().join("weights").join("model.mpk")
    );
}

#[test]
fn test_pretrained_command_prints_path() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("model.mpk");
    std::fs::write(&weights, b"weights").unwrap();

    let cli = BaseApp.cli().unwrap();
    let mut out = Vec::new();
    cli.run_with_output(
        ["base", "pretrained", "--pretrained", weights.to_str().unwrap()],
        &mut out,
    )
    .unwrap();
    assert_eq!(String::from_utf8(out).unwrap().trim(), weights.display().to_string());
}

#[test]
fn test_goal_follows_monitor() {
    assert!(BaseApp.monitor().is_none());
    assert!(BaseApp.goal().is_none());
    assert!(DummyApp.goal().is_none());
}

#[test]
fn test_goal_of_lower_is_better_metric() {
    assert_eq!(RegressionApp.goal(), Some(Goal::Minimize));

    let device = Default::default();
    let factory = RegressionApp
        .build_learner_func::<TrainBackend>(&HookArgs::new(), &device)
        .unwrap();
    assert_eq!(factory.config().monitor.as_deref(), Some("mse"));
    assert_eq!(factory.config().goal, Some(Goal::Minimize));
}

#[test]
fn test_learner_factory_builds_learner() {
    let device = Default::default();
    let factory = DummyApp
        .build_learner_func::<TrainBackend>(&HookArgs::new(), &device)
        .unwrap();
    assert_eq!(factory.config().loss, LossFunction::CrossEntropy);
    assert!(factory.config().monitor.is_none());

    let model = DummyApp
        .model::<TrainBackend>(&DummyApp.default_args(Hook::Model), &device)
        .unwrap();
    let dls = DummyApp.data(&DummyApp.default_args(Hook::Data)).unwrap();
    let learner: Learner<TrainBackend, Mlp<TrainBackend>> = factory.build(model, dls);

    assert!(learner.metric_names().is_empty());
    assert_eq!(learner.dls().n_features(), 2);
    assert_eq!(learner.state().epoch, 0);
}

#[test]
fn test_config_file_and_flags_precedence() {
    let defaults = run_params(DummyApp, &["params"]);
    assert_eq!(defaults["model"]["hidden_size"], serde_json::json!(8));
    assert_eq!(defaults["fit"]["epochs"], serde_json::json!(20));

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"hidden_size": 12, "epochs": 2, "activation": "gelu"}"#).unwrap();
    let config = config.to_str().unwrap();

    let configured = run_params(DummyApp, &["params", "--config", config]);
    assert_eq!(configured["model"]["hidden_size"], serde_json::json!(12));
    assert_eq!(configured["model"]["activation"], serde_json::json!("gelu"));
    assert_eq!(configured["fit"]["epochs"], serde_json::json!(2));
    assert_eq!(configured["data"]["batch_size"], serde_json::json!(2));

    let flagged = run_params(
        DummyApp,
        &["--config", config, "params", "--hidden-size", "16", "--activation", "sigmoid"],
    );
    assert_eq!(flagged["model"]["hidden_size"], serde_json::json!(16));
    assert_eq!(flagged["model"]["activation"], serde_json::json!("sigmoid"));
    assert_eq!(flagged["fit"]["epochs"], serde_json::json!(2));
}

#[test]
fn test_bad_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    std::fs::write(&config, r#"{"hidden_size": "wide"}"#).unwrap();

    let cli = DummyApp.cli().unwrap();
    let err = cli
        .run_with_output(
            ["dummy", "params", "--config", config.to_str().unwrap()],
            &mut Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidValue { ref name, .. } if name == "hidden_size"));
}

#[test]
fn test_bibtex_merge_dedupes_keys() {
    let merged = merge_bibtex([
        "@article{fisher1936, title={Iris}}",
        "@article{Fisher1936, title={Iris again}}\n@misc{burn, title={Burn}}",
    ]);
    assert_eq!(merged.matches('@').count(), 2);
    assert!(merged.contains("title={Iris}"));
    assert!(!merged.contains("Iris again"));
}

/// An app citing the framework file plus a file that repeats one of its keys.
struct CitingApp {
    extra: PathBuf,
}

impl App for CitingApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn bibtex_files(&self) -> Vec<PathBuf> {
        let mut files = default_bibtex_files();
        files.push(self.extra.clone());
        files
    }
}

#[test]
fn test_bibtex_command() {
    let dir = tempfile::tempdir().unwrap();
    let extra = dir.path().join("extra.bib");
    std::fs::write(
        &extra,
        "@software{burn, title={Duplicate}}\n\n@article{fisher1936, title={Iris}}\n",
    )
    .unwrap();

    let cli = CitingApp { extra }.cli().unwrap();
    let mut out = Vec::new();
    cli.run_with_output(["citing", "bibtex"], &mut out).unwrap();
    let printed = String::from_utf8(out).unwrap();

    assert_eq!(printed.matches("@software{burn").count(), 1);
    assert!(!printed.contains("Duplicate"));
    assert!(printed.contains("fisher1936"));

    let output = dir.path().join("refs.bib");
    cli.run_with_output(
        ["citing", "bibtex", "--output", output.to_str().unwrap()],
        &mut Vec::new(),
    )
    .unwrap();
    assert_eq!(std::fs::read_to_string(Path::new(&output)).unwrap(), printed);
}
