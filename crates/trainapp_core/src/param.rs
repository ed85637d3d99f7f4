//! Declarative hook parameters and the typed arguments built from them.
//!
//! A hook declares its parameters as a list of [`Param`] descriptors. The
//! same list drives the command-line flags of every command that calls the
//! hook and the [`HookArgs`] used when the hook is called directly, so the
//! defaults live in exactly one place.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// The kind of value a parameter accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// `true` / `false`.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float. Integer values are accepted and widened.
    Float,
    /// Free text.
    Str,
    /// A filesystem path.
    Path,
    /// One of a fixed set of strings.
    Choice(Vec<String>),
}

impl ParamKind {
    /// Short name used in error messages and help output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::Path => "path",
            Self::Choice(_) => "choice",
        }
    }

    /// Whether `value` is acceptable for this kind.
    #[must_use]
    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (Self::Bool, ParamValue::Bool(_))
            | (Self::Int, ParamValue::Int(_))
            | (Self::Float, ParamValue::Float(_) | ParamValue::Int(_))
            | (Self::Str, ParamValue::Str(_))
            | (Self::Path, ParamValue::Path(_) | ParamValue::Str(_)) => true,
            (Self::Choice(choices), ParamValue::Str(s)) => choices.iter().any(|c| c == s),
            _ => false,
        }
    }

    /// Parse command-line or config text into a value of this kind.
    pub fn parse(&self, name: &str, text: &str) -> Result<ParamValue> {
        let invalid = |reason: String| CoreError::InvalidValue {
            name: name.to_string(),
            reason,
        };
        match self {
            Self::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "on" => Ok(ParamValue::Bool(true)),
                "false" | "no" | "0" | "off" => Ok(ParamValue::Bool(false)),
                _ => Err(invalid(format!("'{text}' is not a boolean"))),
            },
            Self::Int => text
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|e| invalid(e.to_string())),
            Self::Float => text
                .parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|e| invalid(e.to_string())),
            Self::Str => Ok(ParamValue::Str(text.to_string())),
            Self::Path => Ok(ParamValue::Path(PathBuf::from(text))),
            Self::Choice(choices) => {
                if choices.iter().any(|c| c == text) {
                    Ok(ParamValue::Str(text.to_string()))
                } else {
                    Err(invalid(format!(
                        "'{text}' is not one of [{}]",
                        choices.join(", ")
                    )))
                }
            }
        }
    }

    /// Convert a loosely typed value (as read from a config file) to this kind.
    ///
    /// Integers widen to floats, strings become paths, and string values are
    /// parsed for the other kinds. Anything else is rejected.
    pub fn coerce(&self, name: &str, value: ParamValue) -> Result<ParamValue> {
        match (self, value) {
            (Self::Float, ParamValue::Int(i)) => Ok(ParamValue::Float(i as f64)),
            (Self::Path, ParamValue::Str(s)) => Ok(ParamValue::Path(PathBuf::from(s))),
            (kind, value) if kind.accepts(&value) => Ok(value),
            (kind, ParamValue::Str(s)) => kind.parse(name, &s),
            (kind, value) => Err(CoreError::TypeMismatch {
                name: name.to_string(),
                expected: kind.name().to_string(),
                got: value.kind_name().to_string(),
            }),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice(choices) => write!(f, "choice[{}]", choices.join("|")),
            other => f.write_str(other.name()),
        }
    }
}

/// A concrete parameter value.
///
/// Values serialize untagged, so JSON `true`, `3`, `0.5` and `"text"` map to
/// `Bool`, `Int`, `Float` and `Str`. Paths deserialize as `Str`; use
/// [`ParamKind::coerce`] to restore the declared kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value (also used for choices).
    Str(String),
    /// Path value.
    Path(PathBuf),
}

impl ParamValue {
    /// Name of the stored kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Path(_) => "path",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Path(v) => write!(f, "{}", v.display()),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<PathBuf> for ParamValue {
    fn from(v: PathBuf) -> Self {
        Self::Path(v)
    }
}

impl From<&Path> for ParamValue {
    fn from(v: &Path) -> Self {
        Self::Path(v.to_path_buf())
    }
}

/// Descriptor of one hook parameter.
///
/// ```rust
/// use trainapp_core::{Param, ParamKind};
///
/// let p = Param::int("batch_size").default(32).help("Samples per batch");
/// assert_eq!(p.flag(), "batch-size");
/// assert_eq!(p.kind(), &ParamKind::Int);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    name: String,
    kind: ParamKind,
    default: Option<ParamValue>,
    help: String,
}

impl Param {
    /// Create a parameter of the given kind with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
            help: String::new(),
        }
    }

    /// A boolean parameter.
    #[must_use]
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    /// An integer parameter.
    #[must_use]
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Int)
    }

    /// A float parameter.
    #[must_use]
    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    /// A string parameter.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Str)
    }

    /// A path parameter.
    #[must_use]
    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Path)
    }

    /// A parameter restricted to `choices`.
    #[must_use]
    pub fn choice<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ParamKind::Choice(choices.into_iter().map(Into::into).collect()),
        )
    }

    /// Set the default value.
    #[must_use]
    pub fn default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the help text.
    #[must_use]
    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Parameter name (snake_case).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter kind.
    #[must_use]
    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    /// Declared default, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }

    /// Help text.
    #[must_use]
    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// The long command-line flag (kebab-case, without dashes).
    #[must_use]
    pub fn flag(&self) -> String {
        self.name.replace('_', "-")
    }

    /// Check the descriptor is well formed.
    ///
    /// Names must be non-empty snake_case starting with a letter, choice
    /// lists non-empty, and any default acceptable for the kind.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| CoreError::InvalidParam {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        let mut chars = self.name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return Err(invalid("name must start with a lowercase letter")),
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(invalid("name must be snake_case"));
        }

        if let ParamKind::Choice(choices) = &self.kind {
            if choices.is_empty() {
                return Err(invalid("choice parameter has no choices"));
            }
        }

        if let Some(default) = &self.default {
            if !self.kind.accepts(default) {
                return Err(invalid(&format!(
                    "default {} ({}) does not fit kind {}",
                    default,
                    default.kind_name(),
                    self.kind
                )));
            }
        }

        Ok(())
    }
}

/// Conversion from a stored [`ParamValue`] into a Rust type.
pub trait FromParamValue: Sized {
    /// Kind name reported in mismatch errors.
    const EXPECTED: &'static str;

    /// Convert `value`, stored under `name`.
    fn from_param(name: &str, value: &ParamValue) -> Result<Self>;
}

fn mismatch(name: &str, expected: &str, value: &ParamValue) -> CoreError {
    CoreError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        got: value.kind_name().to_string(),
    }
}

impl FromParamValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(mismatch(name, Self::EXPECTED, other)),
        }
    }
}

impl FromParamValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(v) => Ok(*v),
            other => Err(mismatch(name, Self::EXPECTED, other)),
        }
    }
}

macro_rules! int_from_param {
    ($($ty:ty),*) => {
        $(
            impl FromParamValue for $ty {
                const EXPECTED: &'static str = "int";

                fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
                    let v = i64::from_param(name, value)?;
                    <$ty>::try_from(v).map_err(|_| CoreError::InvalidValue {
                        name: name.to_string(),
                        reason: format!("{v} is out of range for {}", stringify!($ty)),
                    })
                }
            }
        )*
    };
}

int_from_param!(i32, u32, u64, usize);

impl FromParamValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(mismatch(name, Self::EXPECTED, other)),
        }
    }
}

impl FromParamValue for f32 {
    const EXPECTED: &'static str = "float";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        f64::from_param(name, value).map(|v| v as f32)
    }
}

impl FromParamValue for String {
    const EXPECTED: &'static str = "string";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Str(v) => Ok(v.clone()),
            ParamValue::Path(p) => Ok(p.to_string_lossy().into_owned()),
            other => Err(mismatch(name, Self::EXPECTED, other)),
        }
    }
}

impl FromParamValue for PathBuf {
    const EXPECTED: &'static str = "path";

    fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Path(p) => Ok(p.clone()),
            ParamValue::Str(s) => Ok(PathBuf::from(s)),
            other => Err(mismatch(name, Self::EXPECTED, other)),
        }
    }
}

/// Arguments handed to a hook, keyed by parameter name.
///
/// ```rust
/// use trainapp_core::{HookArgs, Param};
///
/// let params = [Param::int("size").default(2)];
/// let args = HookArgs::from_params(&params).set("size", 5);
/// assert_eq!(args.get::<usize>("size").unwrap(), 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookArgs {
    values: BTreeMap<String, ParamValue>,
}

impl HookArgs {
    /// Empty arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arguments holding the declared defaults of `params`.
    ///
    /// Parameters without a default are left out.
    #[must_use]
    pub fn from_params(params: &[Param]) -> Self {
        let values = params
            .iter()
            .filter_map(|p| p.default_value().map(|d| (p.name().to_string(), d.clone())))
            .collect();
        Self { values }
    }

    /// Set a value, returning the updated arguments.
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Read a required argument.
    pub fn get<T: FromParamValue>(&self, name: &str) -> Result<T> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| CoreError::MissingArgument(name.to_string()))?;
        T::from_param(name, value)
    }

    /// Read an optional argument.
    pub fn get_opt<T: FromParamValue>(&self, name: &str) -> Result<Option<T>> {
        self.values
            .get(name)
            .map(|value| T::from_param(name, value))
            .transpose()
    }

    /// The raw stored value.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Whether an argument is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
