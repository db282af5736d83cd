//! Attribute payloads stored in parameter cells.

use std::fmt;

use crate::id::ParameterId;

/// Concrete type tag of a parameter cell.
///
/// `Undefined` marks a parameter whose type could not be resolved, for
/// example one declared by an external plugin that is not loaded. Such
/// parameters still participate in transactions; the transaction result
/// flags them so a caller can decide whether to re-resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Signed integer scalar.
    Int,
    /// Floating-point scalar.
    Real,
    /// Boolean flag.
    Bool,
    /// ASCII/UTF-8 string.
    Str,
    /// Array of integers.
    IntArray,
    /// Array of reals.
    RealArray,
    /// Non-owning reference to another parameter.
    Reference,
    /// Type not resolved.
    Undefined,
}

/// Value held by a parameter cell.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Signed integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Real(f64),
    /// Boolean flag.
    Bool(bool),
    /// ASCII/UTF-8 string.
    Str(String),
    /// Array of integers.
    IntArray(Vec<i64>),
    /// Array of reals.
    RealArray(Vec<f64>),
    /// Non-owning reference to another parameter.
    Reference(ParameterId),
    /// No value assigned yet.
    None,
}

impl ParamValue {
    /// Type tag matching this value.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Real(_) => ParamType::Real,
            ParamValue::Bool(_) => ParamType::Bool,
            ParamValue::Str(_) => ParamType::Str,
            ParamValue::IntArray(_) => ParamType::IntArray,
            ParamValue::RealArray(_) => ParamType::RealArray,
            ParamValue::Reference(_) => ParamType::Reference,
            ParamValue::None => ParamType::Undefined,
        }
    }

    /// Integer payload, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Real payload, if this is a `Real`.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            ParamValue::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if this is a `Str`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for ParamValue {
    fn default() -> Self {
        ParamValue::None
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Str(v) => write!(f, "{v}"),
            ParamValue::IntArray(v) => write!(f, "{v:?}"),
            ParamValue::RealArray(v) => write!(f, "{v:?}"),
            ParamValue::Reference(id) => write!(f, "-> {id}"),
            ParamValue::None => write!(f, "<none>"),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}
