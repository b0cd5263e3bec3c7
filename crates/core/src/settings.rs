//! Component settings.
//!
//! Every component receives an immutable map of `key → value` at creation.
//! Values are an open variant type; components bind them to typed fields
//! during initialization. A missing key or a type mismatch is a
//! configuration error and keeps the device from starting.
//!
//! The [`SettingValue::Shared`] variant carries arbitrary shared objects,
//! typically `Arc` handles to interface handlers that application components
//! drive imperatively.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors from typed settings extraction.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing setting \"{key}\"")]
    Missing { key: String },

    #[error("setting \"{key}\" has the wrong type (expected {expected})")]
    WrongType { key: String, expected: &'static str },
}

/// A dynamically-typed setting value.
#[derive(Clone)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Duration(Duration),
    /// An arbitrary shared object, extracted as `Arc<T>`.
    Shared(Arc<dyn Any + Send + Sync>),
}

impl SettingValue {
    /// Wrap a value as a shared object.
    pub fn shared<T: Any + Send + Sync>(value: T) -> Self {
        SettingValue::Shared(Arc::new(value))
    }
}

impl fmt::Debug for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "Bool({v})"),
            SettingValue::Int(v) => write!(f, "Int({v})"),
            SettingValue::Float(v) => write!(f, "Float({v})"),
            SettingValue::Str(v) => write!(f, "Str({v:?})"),
            SettingValue::Duration(v) => write!(f, "Duration({v:?})"),
            SettingValue::Shared(_) => write!(f, "Shared(..)"),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Int(v)
    }
}

impl From<i32> for SettingValue {
    fn from(v: i32) -> Self {
        SettingValue::Int(v.into())
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::Int(v.into())
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Str(v.to_owned())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Str(v)
    }
}

impl From<Duration> for SettingValue {
    fn from(v: Duration) -> Self {
        SettingValue::Duration(v)
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for SettingValue {
    fn from(v: Arc<T>) -> Self {
        SettingValue::Shared(v)
    }
}

/// Typed extraction from a [`SettingValue`].
pub trait FromSetting: Sized {
    /// Human-readable type name used in error reports.
    const EXPECTED: &'static str;

    fn from_setting(value: &SettingValue) -> Option<Self>;
}

impl FromSetting for bool {
    const EXPECTED: &'static str = "bool";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSetting for i64 {
    const EXPECTED: &'static str = "i64";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSetting for u32 {
    const EXPECTED: &'static str = "u32";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(v) => (*v).try_into().ok(),
            _ => None,
        }
    }
}

impl FromSetting for u64 {
    const EXPECTED: &'static str = "u64";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(v) => (*v).try_into().ok(),
            _ => None,
        }
    }
}

impl FromSetting for usize {
    const EXPECTED: &'static str = "usize";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(v) => (*v).try_into().ok(),
            _ => None,
        }
    }
}

impl FromSetting for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromSetting for String {
    const EXPECTED: &'static str = "string";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Str(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromSetting for Duration {
    const EXPECTED: &'static str = "duration";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Duration(v) => Some(*v),
            _ => None,
        }
    }
}

impl<T: Any + Send + Sync> FromSetting for Arc<T> {
    const EXPECTED: &'static str = "shared object";

    fn from_setting(value: &SettingValue) -> Option<Self> {
        match value {
            SettingValue::Shared(v) => Arc::clone(v).downcast::<T>().ok(),
            _ => None,
        }
    }
}

/// Immutable configuration map handed to a component at creation.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Extract and coerce the value under `key`.
    pub fn get<T: FromSetting>(&self, key: &str) -> Result<T, SettingsError> {
        let value = self.values.get(key).ok_or_else(|| SettingsError::Missing {
            key: key.to_owned(),
        })?;
        T::from_setting(value).ok_or_else(|| SettingsError::WrongType {
            key: key.to_owned(),
            expected: T::EXPECTED,
        })
    }
}
