use crate::error::DecodeError;
use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

/// One decoded telemetry record, as carried by a single inbound text frame.
///
/// Wire shape: `{"msg_num", "delta", "count", "mean", "std_dev"}`, nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sample {
    /// Source-assigned sequence number.
    #[serde(deserialize_with = "lenient")]
    pub msg_num: u64,
    /// Elapsed time since the previous event, in seconds.
    #[serde(deserialize_with = "lenient")]
    pub delta: f64,
    /// Number of deltas the source has aggregated so far.
    #[serde(deserialize_with = "lenient")]
    pub count: u64,
    #[serde(deserialize_with = "lenient")]
    pub mean: f64,
    #[serde(deserialize_with = "lenient")]
    pub std_dev: f64,
}

/// A field may arrive as a JSON number or as a string holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient<T> {
    Value(T),
    Text(String),
}

fn lenient<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: Display,
{
    match Lenient::<T>::deserialize(de)? {
        Lenient::Value(v) => Ok(v),
        Lenient::Text(s) => s
            .parse()
            .map_err(|e| D::Error::custom(format!("`{s}` is not numeric: {e}"))),
    }
}

/// Decode a raw text frame into a [`Sample`].
///
/// Any missing, extra or mistyped field rejects the whole frame, as does a
/// non-finite float or a negative `delta` / `std_dev`.
pub fn decode(frame: &str) -> Result<Sample, DecodeError> {
    // Derived struct impls also accept positional arrays; only objects are frames.
    let value: Value = serde_json::from_str(frame)?;
    if !value.is_object() {
        return Err(DecodeError::Malformed(serde_json::Error::custom(
            "frame is not a JSON object",
        )));
    }
    let sample = Sample::deserialize(value)?;

    for (field, value) in [
        ("delta", sample.delta),
        ("mean", sample.mean),
        ("std_dev", sample.std_dev),
    ] {
        if !value.is_finite() {
            return Err(DecodeError::OutOfRange { field, value });
        }
    }
    if sample.delta < 0.0 {
        return Err(DecodeError::OutOfRange { field: "delta", value: sample.delta });
    }
    if sample.std_dev < 0.0 {
        return Err(DecodeError::OutOfRange { field: "std_dev", value: sample.std_dev });
    }

    Ok(sample)
}
