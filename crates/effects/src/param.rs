//! Parameter schema shared by the registry and the renderer's uniform binder.
//!
//! Types:
//!
//! - `ParamValue` is the tagged value a stage carries for one parameter. It
//!   deserializes from a number, a boolean, or an array of 2-4 numbers; any
//!   other shape is a `ParameterTypeError`.
//! - `ParamKind` is the semantic type declared by an effect.
//! - `ParameterSpec` pairs a kind with its range, step, default and label, and
//!   knows how to coerce (type-check and clamp) an incoming value.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Parameter values keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// A malformed parameter value: wrong shape, wrong arity, or wrong kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTypeError {
    name: Option<String>,
    reason: String,
}

impl ParameterTypeError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            reason: reason.into(),
        }
    }

    pub(crate) fn shape(reason: impl Into<String>) -> Self {
        Self {
            name: None,
            reason: reason.into(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for ParameterTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "parameter '{name}': {}", self.reason),
            None => write!(f, "invalid parameter value: {}", self.reason),
        }
    }
}

impl std::error::Error for ParameterTypeError {}

/// A single parameter value as supplied by a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParam", into = "RawParam")]
pub enum ParamValue {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Bool(bool),
}

impl ParamValue {
    /// Builds a vector value from 2, 3 or 4 components.
    pub fn from_components(components: &[f32]) -> Result<Self, ParameterTypeError> {
        match *components {
            [x, y] => Ok(Self::Vec2([x, y])),
            [x, y, z] => Ok(Self::Vec3([x, y, z])),
            [x, y, z, w] => Ok(Self::Vec4([x, y, z, w])),
            _ => Err(ParameterTypeError::shape(format!(
                "arrays must have 2, 3 or 4 components, got {}",
                components.len()
            ))),
        }
    }

    /// Short shape name used in diagnostics (`float`, `vec3`, `bool`).
    pub fn shape_name(&self) -> &'static str {
        match self {
            ParamValue::Scalar(_) => "float",
            ParamValue::Vec2(_) => "vec2",
            ParamValue::Vec3(_) => "vec3",
            ParamValue::Vec4(_) => "vec4",
            ParamValue::Bool(_) => "bool",
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            ParamValue::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    pub fn components(&self) -> Vec<f32> {
        match self {
            ParamValue::Scalar(value) => vec![*value],
            ParamValue::Vec2(v) => v.to_vec(),
            ParamValue::Vec3(v) => v.to_vec(),
            ParamValue::Vec4(v) => v.to_vec(),
            ParamValue::Bool(flag) => vec![if *flag { 1.0 } else { 0.0 }],
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<[f32; 2]> for ParamValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 3]> for ParamValue {
    fn from(value: [f32; 3]) -> Self {
        Self::Vec3(value)
    }
}

impl From<[f32; 4]> for ParamValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawParam {
    Bool(bool),
    Number(f64),
    Array(Vec<f64>),
}

impl TryFrom<RawParam> for ParamValue {
    type Error = ParameterTypeError;

    fn try_from(raw: RawParam) -> Result<Self, Self::Error> {
        match raw {
            RawParam::Bool(flag) => Ok(ParamValue::Bool(flag)),
            RawParam::Number(value) => Ok(ParamValue::Scalar(value as f32)),
            RawParam::Array(values) => {
                let components: Vec<f32> = values.into_iter().map(|v| v as f32).collect();
                ParamValue::from_components(&components)
            }
        }
    }
}

impl From<ParamValue> for RawParam {
    fn from(value: ParamValue) -> Self {
        match value {
            ParamValue::Bool(flag) => RawParam::Bool(flag),
            ParamValue::Scalar(value) => RawParam::Number(f64::from(value)),
            other => RawParam::Array(other.components().into_iter().map(f64::from).collect()),
        }
    }
}

/// Semantic type of an effect parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    /// Enumerated choice; the stage value is the option index.
    Choice { options: Vec<String> },
    Bool,
}

impl ParamKind {
    fn expected(&self) -> &'static str {
        match self {
            ParamKind::Scalar => "float",
            ParamKind::Vec2 => "vec2",
            ParamKind::Vec3 => "vec3",
            ParamKind::Vec4 => "vec4",
            ParamKind::Choice { .. } => "choice index",
            ParamKind::Bool => "bool",
        }
    }

    fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (self, value),
            (ParamKind::Scalar, ParamValue::Scalar(_))
                | (ParamKind::Vec2, ParamValue::Vec2(_))
                | (ParamKind::Vec3, ParamValue::Vec3(_))
                | (ParamKind::Vec4, ParamValue::Vec4(_))
                | (ParamKind::Choice { .. }, ParamValue::Scalar(_))
                | (ParamKind::Bool, ParamValue::Bool(_))
        )
    }
}

/// Declared schema of one effect parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    pub kind: ParamKind,
    pub min: f32,
    pub max: f32,
    pub step: f32,
    pub default: ParamValue,
    pub label: String,
}

impl ParameterSpec {
    pub fn scalar(label: &str, default: f32, min: f32, max: f32, step: f32) -> Self {
        Self {
            kind: ParamKind::Scalar,
            min,
            max,
            step,
            default: ParamValue::Scalar(default),
            label: label.to_string(),
        }
    }

    pub fn vec2(label: &str, default: [f32; 2], min: f32, max: f32, step: f32) -> Self {
        Self {
            kind: ParamKind::Vec2,
            min,
            max,
            step,
            default: ParamValue::Vec2(default),
            label: label.to_string(),
        }
    }

    pub fn vec3(label: &str, default: [f32; 3], min: f32, max: f32, step: f32) -> Self {
        Self {
            kind: ParamKind::Vec3,
            min,
            max,
            step,
            default: ParamValue::Vec3(default),
            label: label.to_string(),
        }
    }

    pub fn vec4(label: &str, default: [f32; 4], min: f32, max: f32, step: f32) -> Self {
        Self {
            kind: ParamKind::Vec4,
            min,
            max,
            step,
            default: ParamValue::Vec4(default),
            label: label.to_string(),
        }
    }

    pub fn choice(label: &str, options: &[&str], default_index: usize) -> Self {
        Self {
            kind: ParamKind::Choice {
                options: options.iter().map(|option| option.to_string()).collect(),
            },
            min: 0.0,
            max: options.len().saturating_sub(1) as f32,
            step: 1.0,
            default: ParamValue::Scalar(default_index as f32),
            label: label.to_string(),
        }
    }

    pub fn toggle(label: &str, default: bool) -> Self {
        Self {
            kind: ParamKind::Bool,
            min: 0.0,
            max: 1.0,
            step: 1.0,
            default: ParamValue::Bool(default),
            label: label.to_string(),
        }
    }

    /// Returns human-readable problems with this spec; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if !(self.min <= self.max) {
            issues.push(format!("range [{}, {}] is empty", self.min, self.max));
        }
        if !(self.step >= 0.0) {
            issues.push(format!("step {} must be non-negative", self.step));
        }
        if let ParamKind::Choice { options } = &self.kind {
            if options.is_empty() {
                issues.push("choice parameters need at least one option".to_string());
            }
        }
        if !self.kind.accepts(&self.default) {
            issues.push(format!(
                "default is a {} but the parameter is a {}",
                self.default.shape_name(),
                self.kind.expected()
            ));
        } else if !matches!(self.kind, ParamKind::Bool) {
            let outside = self
                .default
                .components()
                .into_iter()
                .any(|component| component < self.min || component > self.max);
            if outside {
                issues.push(format!(
                    "default {:?} lies outside [{}, {}]",
                    self.default, self.min, self.max
                ));
            }
        }
        issues
    }

    /// Type-checks `value` against this spec and clamps it into range.
    ///
    /// Out-of-range values are clamped for every kind: each vector component
    /// independently, choice indices to the option range.
    pub fn coerce(&self, name: &str, value: ParamValue) -> Result<ParamValue, ParameterTypeError> {
        if !self.kind.accepts(&value) {
            return Err(ParameterTypeError::new(
                name,
                format!(
                    "expected {} but got {}",
                    self.kind.expected(),
                    value.shape_name()
                ),
            ));
        }

        let clamp = |component: f32| -> Result<f32, ParameterTypeError> {
            if component.is_nan() {
                return Err(ParameterTypeError::new(name, "value is NaN"));
            }
            Ok(component.clamp(self.min, self.max))
        };

        let coerced = match (&self.kind, value) {
            (ParamKind::Choice { .. }, ParamValue::Scalar(index)) => {
                ParamValue::Scalar(clamp(index)?.round())
            }
            (_, ParamValue::Scalar(v)) => ParamValue::Scalar(clamp(v)?),
            (_, ParamValue::Vec2([x, y])) => ParamValue::Vec2([clamp(x)?, clamp(y)?]),
            (_, ParamValue::Vec3([x, y, z])) => {
                ParamValue::Vec3([clamp(x)?, clamp(y)?, clamp(z)?])
            }
            (_, ParamValue::Vec4([x, y, z, w])) => {
                ParamValue::Vec4([clamp(x)?, clamp(y)?, clamp(z)?, clamp(w)?])
            }
            (_, flag @ ParamValue::Bool(_)) => flag,
        };

        if coerced != value {
            tracing::debug!(
                parameter = name,
                requested = ?value,
                clamped = ?coerced,
                min = self.min,
                max = self.max,
                "parameter clamped into range"
            );
        }
        Ok(coerced)
    }
}
