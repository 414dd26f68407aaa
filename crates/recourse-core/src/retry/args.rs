//! Call-site arguments and their semantic types.
//!
//! Recovery handlers declare the argument shape they expect; the registry
//! compares that shape against the types of the values the caller passed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic type of a single call argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    Str,
    Int,
    Float,
    Bool,
    Bytes,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgType::Str => "string",
            ArgType::Int => "integer",
            ArgType::Float => "float",
            ArgType::Bool => "bool",
            ArgType::Bytes => "bytes",
        };
        f.write_str(name)
    }
}

/// A single argument value as passed to the wrapped operation.
///
/// Untagged so a JSON array like `["name", 99]` deserializes directly.
/// Variant order matters for untagged decoding: integers are tried before floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl ArgValue {
    pub fn arg_type(&self) -> ArgType {
        match self {
            ArgValue::Bool(_) => ArgType::Bool,
            ArgValue::Int(_) => ArgType::Int,
            ArgValue::Float(_) => ArgType::Float,
            ArgValue::Str(_) => ArgType::Str,
            ArgValue::Bytes(_) => ArgType::Bytes,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ArgValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ArgValue::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ArgValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Int(n) => write!(f, "{}", n),
            ArgValue::Float(x) => write!(f, "{}", x),
            ArgValue::Str(s) => write!(f, "{:?}", s),
            ArgValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Str(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Str(s)
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        ArgValue::Int(n)
    }
}

impl From<i32> for ArgValue {
    fn from(n: i32) -> Self {
        ArgValue::Int(n.into())
    }
}

impl From<u32> for ArgValue {
    fn from(n: u32) -> Self {
        ArgValue::Int(n.into())
    }
}

impl From<f64> for ArgValue {
    fn from(x: f64) -> Self {
        ArgValue::Float(x)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        ArgValue::Bool(b)
    }
}

impl From<Vec<u8>> for ArgValue {
    fn from(b: Vec<u8>) -> Self {
        ArgValue::Bytes(b)
    }
}

/// Ordered argument list of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallArgs(Vec<ArgValue>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one argument (builder style).
    pub fn with(mut self, value: impl Into<ArgValue>) -> Self {
        self.0.push(value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ArgValue> {
        self.0.iter()
    }

    /// Semantic types of the arguments, in call order.
    pub fn shape(&self) -> Vec<ArgType> {
        self.0.iter().map(ArgValue::arg_type).collect()
    }

    /// True when the argument count and every argument's type equal `shape`.
    pub fn matches_shape(&self, shape: &[ArgType]) -> bool {
        self.0.len() == shape.len()
            && self
                .0
                .iter()
                .zip(shape)
                .all(|(value, expected)| value.arg_type() == *expected)
    }
}

impl From<Vec<ArgValue>> for CallArgs {
    fn from(values: Vec<ArgValue>) -> Self {
        CallArgs(values)
    }
}

impl FromIterator<ArgValue> for CallArgs {
    fn from_iter<I: IntoIterator<Item = ArgValue>>(iter: I) -> Self {
        CallArgs(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a CallArgs {
    type Item = &'a ArgValue;
    type IntoIter = std::slice::Iter<'a, ArgValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Build a [`CallArgs`](crate::retry::CallArgs) from a list of values.
///
/// ```
/// let args = recourse_core::call_args!["name", 99];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! call_args {
    ($($value:expr),* $(,)?) => {
        $crate::retry::CallArgs::from(vec![$($crate::retry::ArgValue::from($value)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_follows_call_order() {
        let args = CallArgs::new().with("name").with(99).with(true);
        assert_eq!(args.shape(), vec![ArgType::Str, ArgType::Int, ArgType::Bool]);
    }

    #[test]
    fn matches_shape_requires_count_and_types() {
        let args = crate::call_args!["name", 99];
        assert!(args.matches_shape(&[ArgType::Str, ArgType::Int]));
        assert!(!args.matches_shape(&[ArgType::Int, ArgType::Str]));
        assert!(!args.matches_shape(&[ArgType::Str]));
        assert!(!args.matches_shape(&[]));
    }

    #[test]
    fn json_array_decodes_to_typed_values() {
        let args: CallArgs = serde_json::from_str(r#"["name", 99, 1.5, false]"#).unwrap();
        assert_eq!(
            args.shape(),
            vec![ArgType::Str, ArgType::Int, ArgType::Float, ArgType::Bool]
        );
        assert_eq!(args.get(1).and_then(ArgValue::as_int), Some(99));
    }

    #[test]
    fn display_lists_values() {
        let args = crate::call_args!["name", 99];
        assert_eq!(args.to_string(), r#"("name", 99)"#);
    }
}
