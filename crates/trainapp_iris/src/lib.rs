//! # trainapp_iris
//!
//! Predicts the species of an iris flower from its sepal and petal lengths
//! and widths.
//!
//! The classic dataset was published in Fisher, R.A. "The Use of Multiple
//! Measurements in Taxonomic Problems", Annals of Eugenics 7 (1936). All
//! 150 samples ship with the crate.
//!
//! ```text
//! iris train --epochs 50 --lr 0.01 --output-dir outputs
//! iris predict --pretrained outputs/model.mpk --features "6.3,3.3,6.0,2.5"
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use trainapp::data::CsvData;
use trainapp::prelude::*;

/// The embedded dataset: a header row, then 150 labelled samples.
pub const IRIS_CSV: &str = include_str!("../data/iris.csv");

/// Feature columns, in model input order.
pub const FEATURES: [&str; 4] = ["sepal_length", "sepal_width", "petal_length", "petal_width"];

/// Target column.
pub const TARGET: &str = "species";

/// Species, indexed by class id.
pub const SPECIES: [&str; 3] = ["setosa", "versicolor", "virginica"];

/// Iris species classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct IrisApp;

impl IrisApp {
    fn load(&self, csv: Option<&Path>) -> Result<CsvData> {
        let options = CsvOptions::with_class_target(TARGET);
        let data = match csv {
            Some(path) => read_csv(path, &options)?,
            None => read_csv_from(IRIS_CSV.as_bytes(), &options)?,
        };

        if data.dataset.n_features() != FEATURES.len() {
            return Err(AppError::invalid_value(
                "csv",
                format!("expected columns {FEATURES:?}, found {:?}", data.feature_names),
            ));
        }
        Ok(data)
    }
}

/// Parse `;`-separated rows of comma-separated measurements.
fn parse_features(text: &str) -> Result<Vec<Vec<f32>>> {
    text.split(';')
        .filter(|row| !row.trim().is_empty())
        .map(|row| {
            let values = row
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AppError::invalid_value("features", format!("'{row}': {e}")))?;
            if values.len() != FEATURES.len() {
                return Err(AppError::invalid_value(
                    "features",
                    format!("'{row}' has {} values, expected {}", values.len(), FEATURES.len()),
                ));
            }
            Ok(values)
        })
        .collect()
}

/// Row-wise softmax of raw outputs.
fn probabilities(outputs: &[f32]) -> Vec<f32> {
    let max = outputs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = outputs.iter().map(|v| (v - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl App for IrisApp {
    type Model<B: AutodiffBackend> = Mlp<B>;

    fn description(&self) -> String {
        "Predict the species of an iris from sepal and petal measurements".to_string()
    }

    fn asset_dir(&self) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    fn data_params(&self) -> Vec<Param> {
        vec![
            Param::float("validation_fraction")
                .default(0.2)
                .help("Fraction of the samples held out for validation"),
            Param::int("batch_size").default(32).help("Samples per batch"),
            Param::int("seed").default(42).help("Seed for the split and the shuffling"),
            Param::path("csv").help("CSV file with the feature columns and a species column; the bundled data when absent"),
        ]
    }

    fn data(&self, args: &HookArgs) -> Result<DataLoaders> {
        let seed = Seed::new(args.get("seed")?);
        let csv = args.get_opt::<PathBuf>("csv")?;
        let data = self.load(csv.as_deref())?;

        let (train, valid) = train_valid_split(&data.dataset, args.get("validation_fraction")?, seed)?;
        info!(train = train.len(), valid = valid.len(), "split iris samples");

        Ok(DataLoaders::builder(train, valid)
            .batch_size(args.get("batch_size")?)
            .seed(seed)
            .build()?)
    }

    fn model_params(&self) -> Vec<Param> {
        vec![
            Param::int("hidden_size").default(8).help("Width of the hidden layer"),
            Param::choice("activation", Activation::NAMES)
                .default("relu")
                .help("Hidden-layer activation"),
        ]
    }

    fn model<B: AutodiffBackend>(&self, args: &HookArgs, device: &B::Device) -> Result<Mlp<B>> {
        let hidden_size: usize = args.get("hidden_size")?;
        if hidden_size == 0 {
            return Err(AppError::invalid_value("hidden_size", "must be at least 1"));
        }
        let activation: Activation = args.get::<String>("activation")?.parse()?;

        Ok(MlpConfig::new(FEATURES.len(), SPECIES.len())
            .with_hidden_sizes(vec![hidden_size])
            .with_activation(activation)
            .init(device))
    }

    fn metrics<B: Backend>(&self, _args: &HookArgs) -> Result<Vec<Box<dyn Metric<B>>>> {
        let metrics: Vec<Box<dyn Metric<B>>> = vec![Box::new(Accuracy)];
        Ok(metrics)
    }

    fn monitor(&self) -> Option<String> {
        Some("accuracy".to_string())
    }

    fn bibtex_files(&self) -> Vec<PathBuf> {
        let mut files = trainapp::bibtex::default_bibtex_files();
        files.push(self.asset_dir().join("iris.bib"));
        files
    }

    fn inference_data_params(&self) -> Vec<Param> {
        vec![
            Param::string("features")
                .default("5.1,3.5,1.4,0.2")
                .help("Measurements to classify: sepal length, sepal width, petal length, petal width; separate rows with ';'"),
            Param::path("csv").help("CSV file of measurements to classify, overriding --features"),
        ]
    }

    fn inference_data(&self, args: &HookArgs) -> Result<TabularDataset> {
        if let Some(path) = args.get_opt::<PathBuf>("csv")? {
            let text = std::fs::read_to_string(&path)?;
            let has_target = text
                .lines()
                .next()
                .is_some_and(|header| header.split(',').any(|c| c.trim() == TARGET));
            let options = if has_target {
                CsvOptions::with_class_target(TARGET)
            } else {
                CsvOptions::default()
            };

            let data = read_csv_from(text.as_bytes(), &options)?;
            if data.dataset.n_features() != FEATURES.len() {
                return Err(AppError::invalid_value(
                    "csv",
                    format!("expected columns {FEATURES:?}, found {:?}", data.feature_names),
                ));
            }
            debug!(path = %path.display(), rows = data.dataset.len(), "read inference rows");
            return Ok(data.dataset);
        }

        let rows = parse_features(&args.get::<String>("features")?)?;
        Ok(TabularDataset::from_rows(&rows)?)
    }

    fn output_results(
        &self,
        predictions: &Predictions,
        _args: &HookArgs,
        out: &mut dyn Write,
    ) -> Result<()> {
        for (i, class) in predictions.decoded().into_iter().enumerate() {
            let row = predictions.row(i).to_vec();
            let probability = probabilities(&row).get(class).copied().unwrap_or(0.0);
            let species = SPECIES.get(class).copied().unwrap_or("unknown");
            writeln!(out, "{i}\t{species}\t{probability:.3}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_dataset() {
        let data = IrisApp.load(None).unwrap();
        assert_eq!(data.dataset.len(), 150);
        assert_eq!(data.feature_names, FEATURES);
        assert_eq!(data.classes, SPECIES);
        assert_eq!(data.dataset.n_classes(), Some(3));
    }

    #[test]
    fn test_parse_features() {
        let rows = parse_features("5.1,3.5,1.4,0.2; 6.3, 3.3, 6.0, 2.5").unwrap();
        assert_eq!(rows, vec![vec![5.1, 3.5, 1.4, 0.2], vec![6.3, 3.3, 6.0, 2.5]]);

        assert!(matches!(
            parse_features("5.1,3.5"),
            Err(AppError::InvalidValue { ref name, .. }) if name == "features"
        ));
        assert!(parse_features("5.1,x,1.4,0.2").is_err());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let probs = probabilities(&[2.0, 1.0, 0.1]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }
}
