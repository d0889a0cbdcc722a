//! Value transform chains applied to raw payload values before coercion.
//!
//! A chain is an ordered list of pure steps. Every chain starts with the
//! built-in [`ValueTransform::null_to_absent`] step, so an explicit JSON
//! `null` and a missing value look the same to everything downstream.
//!
//! # Example
//!
//! ```rust
//! use mapping::{TransformChain, ValueTransform};
//! use store::PayloadValue;
//!
//! let chain = TransformChain::new([
//!     ValueTransform::trim_strings(),
//!     ValueTransform::empty_string_to_absent(),
//! ]);
//!
//! assert_eq!(chain.apply(Some(&PayloadValue::from("  "))).unwrap(), None);
//! assert_eq!(chain.apply(Some(&PayloadValue::Null)).unwrap(), None);
//! assert_eq!(
//!     chain.apply(Some(&PayloadValue::from(" x "))).unwrap(),
//!     Some(PayloadValue::from("x"))
//! );
//! ```
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use store::PayloadValue;
use thiserror::Error;

type TransformFn =
    dyn Fn(Option<PayloadValue>) -> Result<Option<PayloadValue>, TransformError> + Send + Sync;

/// A transform step rejected its input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("transform `{step}` failed: {message}")]
pub struct TransformError {
    pub step: String,
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            step: String::new(),
            message: message.into(),
        }
    }

    fn in_step(mut self, step: &str) -> Self {
        if self.step.is_empty() {
            self.step = step.to_string();
        }
        self
    }
}

/// One named, pure rewriting step.
#[derive(Clone)]
pub struct ValueTransform {
    name: Arc<str>,
    step: Arc<TransformFn>,
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValueTransform").field(&self.name).finish()
    }
}

impl ValueTransform {
    /// Wraps a step that sees absent values too.
    pub fn new<F>(name: &str, step: F) -> Self
    where
        F: Fn(Option<PayloadValue>) -> Result<Option<PayloadValue>, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: Arc::from(name),
            step: Arc::new(step),
        }
    }

    /// Wraps an infallible step that only runs on present values.
    pub fn map<F>(name: &str, step: F) -> Self
    where
        F: Fn(PayloadValue) -> Option<PayloadValue> + Send + Sync + 'static,
    {
        Self::new(name, move |value| Ok(value.and_then(&step)))
    }

    /// Wraps a fallible step that only runs on present values.
    pub fn try_map<F>(name: &str, step: F) -> Self
    where
        F: Fn(PayloadValue) -> Result<Option<PayloadValue>, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, move |value| match value {
            Some(value) => step(value),
            None => Ok(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: Option<PayloadValue>) -> Result<Option<PayloadValue>, TransformError> {
        (self.step)(value).map_err(|err| err.in_step(&self.name))
    }

    /// Built-in first step of every chain: `null` becomes absent.
    pub fn null_to_absent() -> Self {
        Self::map("null_to_absent", |value| match value {
            PayloadValue::Null => None,
            other => Some(other),
        })
    }

    pub fn empty_string_to_absent() -> Self {
        Self::map("empty_string_to_absent", |value| match value {
            PayloadValue::String(s) if s.is_empty() => None,
            other => Some(other),
        })
    }

    pub fn trim_strings() -> Self {
        Self::map("trim_strings", |value| match value {
            PayloadValue::String(s) => Some(PayloadValue::String(s.trim().to_string())),
            other => Some(other),
        })
    }

    /// Parses RFC 3339 strings into [`PayloadValue::Date`]; date attributes
    /// never parse strings on their own.
    pub fn parse_rfc3339_date() -> Self {
        Self::try_map("parse_rfc3339_date", |value| match value {
            PayloadValue::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|date| Some(PayloadValue::Date(date.with_timezone(&Utc))))
                .map_err(|err| TransformError::new(format!("`{s}` is not RFC 3339: {err}"))),
            other => Ok(Some(other)),
        })
    }

    /// Interprets numbers as seconds since the Unix epoch.
    pub fn unix_seconds_to_date() -> Self {
        Self::try_map("unix_seconds_to_date", |value| match value {
            PayloadValue::Number(n) => {
                let seconds = n
                    .as_f64()
                    .ok_or_else(|| TransformError::new(format!("`{n}` is not a timestamp")))?;
                let millis = (seconds * 1000.0).round() as i64;
                DateTime::<Utc>::from_timestamp_millis(millis)
                    .map(|date| Some(PayloadValue::Date(date)))
                    .ok_or_else(|| TransformError::new(format!("timestamp `{n}` out of range")))
            }
            other => Ok(Some(other)),
        })
    }
}

/// Ordered transform steps, always prefixed with [`ValueTransform::null_to_absent`].
#[derive(Clone, Debug)]
pub struct TransformChain {
    steps: Vec<ValueTransform>,
}

impl Default for TransformChain {
    fn default() -> Self {
        Self {
            steps: vec![ValueTransform::null_to_absent()],
        }
    }
}

impl TransformChain {
    pub fn new(steps: impl IntoIterator<Item = ValueTransform>) -> Self {
        let mut chain = Self::default();
        chain.steps.extend(steps);
        chain
    }

    /// Runs every step in order; an absent value keeps flowing so steps may
    /// substitute one.
    pub fn apply(&self, raw: Option<&PayloadValue>) -> Result<Option<PayloadValue>, TransformError> {
        self.steps
            .iter()
            .try_fold(raw.cloned(), |value, step| step.apply(value))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(ValueTransform::name)
    }
}

impl From<Vec<ValueTransform>> for TransformChain {
    fn from(steps: Vec<ValueTransform>) -> Self {
        Self::new(steps)
    }
}
