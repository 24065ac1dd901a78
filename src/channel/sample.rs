use std::sync::Arc;
use std::time::SystemTime;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

/// One keyed value travelling through a [`Channel`](crate::Channel).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Channel key (e.g. `"tcs.temperature"`).
    pub key: Arc<str>,
    /// Encoded payload.
    pub value: serde_json::Value,
    /// Wall-clock time the sample was produced.
    pub at: SystemTime,
}

impl Sample {
    /// Wraps an already-encoded payload, stamped now.
    pub fn new(key: impl Into<Arc<str>>, value: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            value,
            at: SystemTime::now(),
        }
    }

    /// Encodes `value` into a sample for `key`.
    ///
    /// ```
    /// use seqflow::Sample;
    ///
    /// let s = Sample::encode("tcs.temperature", &42_i64).unwrap();
    /// assert_eq!(s.decode::<i64>().unwrap(), 42);
    /// ```
    pub fn encode<T: Serialize>(key: impl Into<Arc<str>>, value: &T) -> Result<Self, ScriptError> {
        let key = key.into();
        let value = serde_json::to_value(value).map_err(|e| ScriptError::Codec {
            key: key.to_string(),
            error: e.to_string(),
        })?;
        Ok(Self::new(key, value))
    }

    /// Decodes the payload as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ScriptError> {
        T::deserialize(&self.value).map_err(|e| ScriptError::Codec {
            key: self.key.to_string(),
            error: e.to_string(),
        })
    }
}
