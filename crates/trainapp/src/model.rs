//! A multilayer perceptron for tabular data.

use std::fmt;
use std::str::FromStr;

use burn::module::Ignored;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::{gelu, relu, sigmoid};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use trainapp_train::AppModel;

/// Hidden-layer activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified linear unit.
    #[default]
    Relu,
    /// Gaussian error linear unit.
    Gelu,
    /// Logistic sigmoid.
    Sigmoid,
}

impl Activation {
    /// Names accepted by [`FromStr`].
    pub const NAMES: [&'static str; 3] = ["relu", "gelu", "sigmoid"];

    /// Apply the activation.
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Relu => relu(x),
            Self::Gelu => gelu(x),
            Self::Sigmoid => sigmoid(x),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relu => f.write_str("relu"),
            Self::Gelu => f.write_str("gelu"),
            Self::Sigmoid => f.write_str("sigmoid"),
        }
    }
}

impl FromStr for Activation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relu" => Ok(Self::Relu),
            "gelu" => Ok(Self::Gelu),
            "sigmoid" => Ok(Self::Sigmoid),
            other => Err(AppError::invalid_value(
                "activation",
                format!("unknown activation '{other}', expected one of {:?}", Self::NAMES),
            )),
        }
    }
}

/// Configuration for [`Mlp`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpConfig {
    /// Number of input features.
    pub n_features: usize,
    /// Number of outputs (classes or regression targets).
    pub n_outputs: usize,
    /// Hidden layer sizes.
    pub hidden_sizes: Vec<usize>,
    /// Hidden-layer activation.
    pub activation: Activation,
    /// Dropout rate after each hidden layer.
    pub dropout: f64,
}

impl MlpConfig {
    /// Create a config with a single hidden layer of 8 units.
    pub fn new(n_features: usize, n_outputs: usize) -> Self {
        Self {
            n_features,
            n_outputs,
            hidden_sizes: vec![8],
            activation: Activation::Relu,
            dropout: 0.0,
        }
    }

    /// Set hidden layer sizes.
    #[must_use]
    pub fn with_hidden_sizes(mut self, sizes: Vec<usize>) -> Self {
        self.hidden_sizes = sizes;
        self
    }

    /// Set the activation.
    #[must_use]
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Set dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Mlp<B> {
        Mlp::new(self, device)
    }
}

/// Multilayer perceptron: `[Linear + activation + Dropout] x N`, then a
/// linear head.
///
/// # Example
///
/// ```rust,ignore
/// use trainapp::{Activation, MlpConfig};
///
/// let model = MlpConfig::new(4, 3)
///     .with_hidden_sizes(vec![16])
///     .with_activation(Activation::Gelu)
///     .init::<NdArray>(&device);
/// let logits = model.forward(x); // (batch, 3)
/// ```
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    hidden: Vec<Linear<B>>,
    head: Linear<B>,
    dropout: Dropout,
    activation: Ignored<Activation>,
}

impl<B: Backend> Mlp<B> {
    /// Create a new model.
    pub fn new(config: &MlpConfig, device: &B::Device) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_sizes.len());
        let mut prev_size = config.n_features;
        for &size in &config.hidden_sizes {
            hidden.push(LinearConfig::new(prev_size, size).init(device));
            prev_size = size;
        }

        Self {
            hidden,
            head: LinearConfig::new(prev_size, config.n_outputs).init(device),
            dropout: DropoutConfig::new(config.dropout).init(),
            activation: Ignored(config.activation),
        }
    }

    /// The hidden-layer activation.
    pub fn activation(&self) -> Activation {
        self.activation.0
    }

    /// Width of each hidden layer.
    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.hidden.iter().map(|layer| layer.weight.val().dims()[1]).collect()
    }
}

impl<B: Backend> AppModel<B> for Mlp<B> {
    fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.iter().fold(x, |x, layer| {
            let x = self.activation.forward(layer.forward(x));
            self.dropout.forward(x)
        });
        self.head.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mlp_output_shape() {
        let device = Default::default();
        let model = MlpConfig::new(4, 3)
            .with_hidden_sizes(vec![16, 8])
            .init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 2>::zeros([5, 4], &device);
        assert_eq!(model.forward(x).dims(), [5, 3]);
        assert_eq!(model.hidden_sizes(), vec![16, 8]);
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!("gelu".parse::<Activation>().unwrap(), Activation::Gelu);
        assert!(matches!(
            "tanh".parse::<Activation>(),
            Err(AppError::InvalidValue { .. })
        ));
        for name in Activation::NAMES {
            assert_eq!(name.parse::<Activation>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_sigmoid_mlp_keeps_activation() {
        let device = Default::default();
        let model = MlpConfig::new(2, 2)
            .with_activation(Activation::Sigmoid)
            .init::<TestBackend>(&device);
        assert_eq!(model.activation(), Activation::Sigmoid);
    }
}
