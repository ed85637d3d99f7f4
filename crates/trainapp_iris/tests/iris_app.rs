//! End-to-end tests of the iris application.

use trainapp::prelude::*;
use trainapp::train::export::ModelExport;
use trainapp_iris::{IrisApp, FEATURES, SPECIES};

trainapp::app_contract_tests!(iris_contract, IrisApp::default);

fn run(args: &[&str]) -> String {
    let cli = IrisApp.cli().unwrap();
    let mut out = Vec::new();
    let argv = std::iter::once("iris").chain(args.iter().copied());
    cli.run_with_output(argv, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_invalid_activation() {
    let device = Default::default();
    let args = IrisApp.default_args(Hook::Model).set("activation", "tanh");
    let err = IrisApp.model::<TrainBackend>(&args, &device).unwrap_err();
    assert!(matches!(err, AppError::InvalidValue { ref name, .. } if name == "activation"));
}

#[test]
fn test_invalid_activation_flag_is_rejected_by_cli() {
    let cli = IrisApp.cli().unwrap();
    let err = cli
        .run_with_output(["iris", "train", "--activation", "tanh"], &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, AppError::Cli(_)));
}

#[test]
fn test_data_split() {
    let dls = IrisApp.data(&IrisApp.default_args(Hook::Data)).unwrap();
    assert_eq!(dls.train().dataset().len(), 120);
    assert_eq!(dls.valid().dataset().len(), 30);
    assert_eq!(dls.n_features(), FEATURES.len());
    assert_eq!(dls.batch_size(), 32);
}

#[test]
fn test_bad_validation_fraction() {
    let args = IrisApp.default_args(Hook::Data).set("validation_fraction", 1.5);
    assert!(matches!(IrisApp.data(&args), Err(AppError::Data(_))));
}

#[test]
fn test_inference_data() {
    let dataset = IrisApp
        .inference_data(&IrisApp.default_args(Hook::InferenceData))
        .unwrap();
    assert_eq!(dataset.len(), 1);
    assert_eq!(dataset.n_features(), 4);
    assert!(!dataset.has_targets());

    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("rows.csv");
    std::fs::write(
        &csv,
        "sepal_length,sepal_width,petal_length,petal_width,species\n5.1,3.5,1.4,0.2,setosa\n6.3,3.3,6.0,2.5,virginica\n",
    )
    .unwrap();
    let args = IrisApp.default_args(Hook::InferenceData).set("csv", csv.as_path());
    assert_eq!(IrisApp.inference_data(&args).unwrap().len(), 2);
}

#[test]
fn test_monitor_and_goal() {
    assert_eq!(IrisApp.monitor().as_deref(), Some("accuracy"));
    assert_eq!(IrisApp.goal(), Some(Goal::Maximize));
}

#[test]
fn test_bibtex_includes_iris_reference() {
    let printed = run(&["bibtex"]);
    assert!(printed.contains("fisher1936use"));
    assert!(printed.contains("@software{burn"));
}

#[test]
fn test_learner_fits_iris() {
    let device = Default::default();
    TrainBackend::seed(42);

    let model = IrisApp
        .model::<TrainBackend>(&IrisApp.default_args(Hook::Model), &device)
        .unwrap();
    let dls = IrisApp.data(&IrisApp.default_args(Hook::Data)).unwrap();
    let mut learner = IrisApp
        .build_learner_func::<TrainBackend>(&HookArgs::new(), &device)
        .unwrap()
        .build(model, dls);
    assert_eq!(learner.metric_names(), vec!["accuracy".to_string()]);

    let fit = trainapp::train::FitConfig {
        epochs: 3,
        lr: 1e-2,
        ..Default::default()
    };
    let state = learner.fit(&fit).unwrap().clone();
    assert_eq!(state.epoch, 3);
    assert_eq!(state.history.train_losses.len(), 3);
    assert!(state.best_value.is_some());

    let result = learner.validate().unwrap();
    assert_eq!(result.n_samples, 30);
    let accuracy = result.get("accuracy").unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
}

#[test]
fn test_train_validate_predict_export_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("outputs");
    let output = output_dir.to_str().unwrap();

    let printed = run(&["train", "--epochs", "2", "--lr", "0.01", "--output-dir", output]);
    assert!(printed.contains("Model saved to"));

    let weights = output_dir.join("model.mpk");
    assert!(weights.is_file());
    let bundle = ModelExport::load(&output_dir).unwrap();
    assert_eq!(bundle.metadata.app, "IrisApp");
    assert_eq!(bundle.metadata.epochs_trained, 2);
    assert_eq!(bundle.metadata.monitor.as_deref(), Some("accuracy"));
    assert_eq!(bundle.metadata.args.get::<usize>("hidden_size").unwrap(), 8);
    assert_eq!(bundle.history().map(|h| h.valid_losses.len()), Some(2));

    let weights_arg = weights.to_str().unwrap();
    let printed = run(&["validate", "--pretrained", weights_arg]);
    assert!(printed.starts_with("valid_loss\t"));
    assert!(printed.contains("accuracy\t"));

    let printed = run(&["predict", "--pretrained", weights_arg, "--features", "5.1,3.5,1.4,0.2;6.3,3.3,6.0,2.5"]);
    let lines: Vec<&str> = printed.lines().collect();
    assert_eq!(lines.len(), 2);
    for (i, line) in lines.iter().enumerate() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], i.to_string());
        assert!(SPECIES.contains(&fields[1]), "unexpected species in {line:?}");
        let probability: f32 = fields[2].parse().unwrap();
        assert!((0.0..=1.0).contains(&probability));
    }

    let export_dir = dir.path().join("export");
    let printed = run(&[
        "export",
        "--pretrained",
        weights_arg,
        "--export-path",
        export_dir.to_str().unwrap(),
    ]);
    assert!(printed.contains("Exported to"));
    let exported = ModelExport::load(&export_dir).unwrap();
    assert!(exported.state.is_none());
    assert!(exported.model_path().is_file());
}

#[test]
fn test_predict_without_weights_fails() {
    let cli = IrisApp.cli().unwrap();
    let err = cli
        .run_with_output(["iris", "predict"], &mut Vec::new())
        .unwrap_err();
    assert!(matches!(err, AppError::FileNotFound(_)));
    assert_eq!(SPECIES.len(), 3);
}
