// Config — tri-state options and the model configuration
//
// Every option is in one of three states:
//
//   Absent     the key was never given            → default
//   NotSet     the key was given as "use default"  → default
//   Value(v)   the key was given a value          → v, even if v is false/0
//
// so a legitimate falsy value (use_gradient_penalty = false, grad_weight = 0)
// is never mistaken for "not provided". In JSON, `null` is NotSet and a
// missing key is Absent.
//
// Options are consumed as they are read (`retrieve` removes the entry);
// whatever is left over when a config has been built is an unknown key and
// is rejected.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use wgan_core::backend::Backend;
use wgan_core::error::{Error, Result};
use wgan_core::DType;
use wgan_nn::Module;

// Setting

/// One option value in its tri-state form.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Setting<T> {
    #[default]
    Absent,
    NotSet,
    Value(T),
}

impl<T> Setting<T> {
    /// The value if one was given, otherwise `default`.
    pub fn resolve(self, default: T) -> T {
        match self {
            Setting::Value(v) => v,
            Setting::Absent | Setting::NotSet => default,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Setting::Absent)
    }

    /// True for `Value(_)` only.
    pub fn is_value(&self) -> bool {
        matches!(self, Setting::Value(_))
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            Setting::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Setting<U> {
        match self {
            Setting::Absent => Setting::Absent,
            Setting::NotSet => Setting::NotSet,
            Setting::Value(v) => Setting::Value(f(v)),
        }
    }
}

// `null` → NotSet, value → Value. A missing key never reaches here; fields
// use `#[serde(default)]`, which yields Absent.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(d)? {
            Some(v) => Setting::Value(v),
            None => Setting::NotSet,
        })
    }
}

impl<T: Serialize> Serialize for Setting<T> {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Setting::Value(v) => s.serialize_some(v),
            Setting::Absent | Setting::NotSet => s.serialize_none(),
        }
    }
}

// OptionValue

/// A loosely typed option value, converted on retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Nested structure, e.g. call options.
    Json(serde_json::Value),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Int(_) => "int",
            OptionValue::Float(_) => "float",
            OptionValue::Text(_) => "string",
            OptionValue::Json(_) => "json",
        }
    }

    fn from_json(value: serde_json::Value) -> Setting<OptionValue> {
        use serde_json::Value;
        match value {
            Value::Null => Setting::NotSet,
            Value::Bool(b) => Setting::Value(OptionValue::Bool(b)),
            Value::Number(n) => Setting::Value(match n.as_i64() {
                Some(i) => OptionValue::Int(i),
                None => OptionValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Setting::Value(OptionValue::Text(s)),
            other => Setting::Value(OptionValue::Json(other)),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(i) => write!(f, "{i}"),
            OptionValue::Float(x) => write!(f, "{x}"),
            OptionValue::Text(s) => write!(f, "{s:?}"),
            OptionValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<CallOptions> for OptionValue {
    fn from(v: CallOptions) -> Self {
        OptionValue::Json(serde_json::to_value(v).unwrap_or(serde_json::Value::Null))
    }
}

/// Types an [`OptionValue`] can be converted into.
pub trait FromOptionValue: Sized {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self>;
}

fn wrong_type(key: &str, want: &str, got: &OptionValue) -> Error {
    Error::config(format!(
        "option '{key}' expects {want}, got {} ({got})",
        got.kind()
    ))
}

impl FromOptionValue for bool {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        match value {
            OptionValue::Bool(b) => Ok(b),
            other => Err(wrong_type(key, "a bool", &other)),
        }
    }
}

impl FromOptionValue for usize {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        match value {
            OptionValue::Int(i) if i >= 0 => Ok(i as usize),
            other => Err(wrong_type(key, "a non-negative integer", &other)),
        }
    }
}

impl FromOptionValue for f64 {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        match value {
            OptionValue::Float(x) => Ok(x),
            OptionValue::Int(i) => Ok(i as f64),
            other => Err(wrong_type(key, "a number", &other)),
        }
    }
}

impl FromOptionValue for String {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        match value {
            OptionValue::Text(s) => Ok(s),
            other => Err(wrong_type(key, "a string", &other)),
        }
    }
}

impl FromOptionValue for DType {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        let name = String::from_option_value(key, value)?;
        parse_dtype(&name)
    }
}

impl FromOptionValue for CallOptions {
    fn from_option_value(key: &str, value: OptionValue) -> Result<Self> {
        match value {
            OptionValue::Json(v) => serde_json::from_value(v)
                .map_err(|e| Error::config(format!("option '{key}': {e}"))),
            other => Err(wrong_type(key, "an object", &other)),
        }
    }
}

fn parse_dtype(name: &str) -> Result<DType> {
    match name {
        "f32" => Ok(DType::F32),
        "f64" => Ok(DType::F64),
        other => Err(Error::config(format!(
            "unknown dtype '{other}' (expected \"f32\" or \"f64\")"
        ))),
    }
}

// Options

/// String-keyed option bag, consumed as options are retrieved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    entries: BTreeMap<String, Setting<OptionValue>>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Options::set`].
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder form of [`Options::set_not_set`].
    pub fn with_not_set(mut self, key: &str) -> Self {
        self.set_not_set(key);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<OptionValue>) {
        self.entries
            .insert(key.to_string(), Setting::Value(value.into()));
    }

    /// Record `key` as explicitly "use the default".
    pub fn set_not_set(&mut self, key: &str) {
        self.entries.insert(key.to_string(), Setting::NotSet);
    }

    pub fn get(&self, key: &str) -> &Setting<OptionValue> {
        const ABSENT: &Setting<OptionValue> = &Setting::Absent;
        self.entries.get(key).unwrap_or(ABSENT)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Remove `key` and return its value, or `default` when the key is
    /// absent or NotSet.
    pub fn retrieve<T: FromOptionValue>(&mut self, key: &str, default: T) -> Result<T> {
        Ok(self.retrieve_setting(key)?.resolve(default))
    }

    /// Remove `key` and return it in tri-state form.
    pub fn retrieve_setting<T: FromOptionValue>(&mut self, key: &str) -> Result<Setting<T>> {
        match self.entries.remove(key) {
            None | Some(Setting::Absent) => Ok(Setting::Absent),
            Some(Setting::NotSet) => Ok(Setting::NotSet),
            Some(Setting::Value(v)) => Ok(Setting::Value(T::from_option_value(key, v)?)),
        }
    }

    /// Fail if any option was never retrieved.
    pub fn finish(self) -> Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }
        let keys: Vec<&str> = self.keys().collect();
        Err(Error::config(format!("unknown option(s): {}", keys.join(", "))))
    }

    /// Options from a JSON object. `null` values become NotSet.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(Error::config("options must be a JSON object"));
        };
        let entries = map
            .into_iter()
            .map(|(k, v)| (k, OptionValue::from_json(v)))
            .collect();
        Ok(Options { entries })
    }
}

// CallOptions

/// Keyword options forwarded to every generator and critic call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallOptions {
    /// Put the module in training (`true`) or inference (`false`) mode before
    /// the call. `None` leaves the mode alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<bool>,
}

impl CallOptions {
    pub fn training(training: bool) -> Self {
        CallOptions {
            training: Some(training),
        }
    }

    /// Apply the options to `module`, then run it on `x`.
    pub fn call<B, M>(&self, module: &M, x: &wgan_core::Tensor<B>) -> Result<wgan_core::Tensor<B>>
    where
        B: Backend,
        M: Module<B> + ?Sized,
    {
        if let Some(training) = self.training {
            module.set_training(training);
        }
        module.forward(x)
    }
}

// WganConfig

pub const DEFAULT_BATCH_SIZE: usize = 64;
pub const DEFAULT_LATENT_DIM: usize = 16;
pub const DEFAULT_GRAD_WEIGHT: f64 = 10.0;
pub const DEFAULT_N_CRITIC: usize = 5;

/// Hyperparameters of a [`crate::gan::WassersteinGan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConfig")]
pub struct WganConfig {
    /// Fakes generated per step; real batches must have this many samples.
    pub batch_size: usize,
    pub latent_dim: usize,
    /// Add `grad_weight * penalty` to the critic loss.
    pub use_gradient_penalty: bool,
    pub grad_weight: f64,
    /// Critic updates per generator update, counting the full step.
    pub n_critic: usize,
    #[serde(serialize_with = "serialize_dtype")]
    pub dtype: DType,
    #[serde(rename = "call_options")]
    pub call: CallOptions,
}

impl Default for WganConfig {
    fn default() -> Self {
        WganConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            latent_dim: DEFAULT_LATENT_DIM,
            use_gradient_penalty: true,
            grad_weight: DEFAULT_GRAD_WEIGHT,
            n_critic: DEFAULT_N_CRITIC,
            dtype: DType::F32,
            call: CallOptions::default(),
        }
    }
}

fn serialize_dtype<S: Serializer>(dtype: &DType, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&dtype.to_string())
}

// The on-disk form: every field tri-state, unknown keys rejected.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    batch_size: Setting<usize>,
    #[serde(default)]
    latent_dim: Setting<usize>,
    #[serde(default)]
    use_gradient_penalty: Setting<bool>,
    #[serde(default)]
    grad_weight: Setting<f64>,
    #[serde(default)]
    n_critic: Setting<usize>,
    #[serde(default)]
    dtype: Setting<String>,
    #[serde(default, alias = "tf_call_kw")]
    call_options: Setting<CallOptions>,
}

impl TryFrom<RawConfig> for WganConfig {
    type Error = Error;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let defaults = WganConfig::default();
        let dtype = match raw.dtype {
            Setting::Value(name) => parse_dtype(&name)?,
            _ => defaults.dtype,
        };
        let config = WganConfig {
            batch_size: raw.batch_size.resolve(defaults.batch_size),
            latent_dim: raw.latent_dim.resolve(defaults.latent_dim),
            use_gradient_penalty: raw
                .use_gradient_penalty
                .resolve(defaults.use_gradient_penalty),
            grad_weight: raw.grad_weight.resolve(defaults.grad_weight),
            n_critic: raw.n_critic.resolve(defaults.n_critic),
            dtype,
            call: raw.call_options.resolve(defaults.call),
        };
        config.validate()?;
        Ok(config)
    }
}

impl WganConfig {
    /// Build from an option bag. Every recognised key is consumed; any key
    /// left over is an error.
    pub fn from_options(mut opts: Options) -> Result<Self> {
        let d = WganConfig::default();
        let call = match opts.retrieve_setting::<CallOptions>("call_options")? {
            Setting::Value(c) => c,
            _ => opts.retrieve("tf_call_kw", d.call)?,
        };
        let config = WganConfig {
            batch_size: opts.retrieve("batch_size", d.batch_size)?,
            latent_dim: opts.retrieve("latent_dim", d.latent_dim)?,
            use_gradient_penalty: opts.retrieve("use_gradient_penalty", d.use_gradient_penalty)?,
            grad_weight: opts.retrieve("grad_weight", d.grad_weight)?,
            n_critic: opts.retrieve("n_critic", d.n_critic)?,
            dtype: opts.retrieve("dtype", d.dtype)?,
            call,
        };
        opts.finish()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::config(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be positive"));
        }
        if self.latent_dim == 0 {
            return Err(Error::config("latent_dim must be positive"));
        }
        if self.n_critic == 0 {
            return Err(Error::config("n_critic must be at least 1"));
        }
        if !self.grad_weight.is_finite() {
            return Err(Error::config(format!(
                "grad_weight must be finite, got {}",
                self.grad_weight
            )));
        }
        Ok(())
    }
}
