//! Serde helpers for floats that may be infinite or NaN.
//!
//! JSON has no representation for non-finite numbers and `serde_json` writes
//! them as `null`, which can't be read back into an `f64`. These helpers write
//! non-finite values as the strings `"inf"`, `"-inf"` and `"NaN"`.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
struct Lossless(f64);

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(f64),
    Special(String),
}

impl Serialize for Lossless {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.0;
        if value.is_finite() {
            serializer.serialize_f64(value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }
}

impl<'de> Deserialize<'de> for Lossless {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(Lossless(value)),
            Repr::Special(text) => text
                .parse::<f64>()
                .map(Lossless)
                .map_err(|_| de::Error::custom(format!("invalid float {text:?}"))),
        }
    }
}

pub(crate) mod scalar {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        Lossless(*value).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Lossless::deserialize(deserializer).map(|v| v.0)
    }
}

pub(crate) mod option {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(
        value: &Option<f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(Lossless).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        Ok(Option::<Lossless>::deserialize(deserializer)?.map(|v| v.0))
    }
}

pub(crate) mod vec {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().copied().map(Lossless))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<f64>, D::Error> {
        Ok(Vec::<Lossless>::deserialize(deserializer)?
            .into_iter()
            .map(|v| v.0)
            .collect())
    }
}

pub(crate) mod option_vec {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(
        values: &Option<Vec<f64>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        values
            .as_ref()
            .map(|values| values.iter().copied().map(Lossless).collect::<Vec<_>>())
            .serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<f64>>, D::Error> {
        Ok(Option::<Vec<Lossless>>::deserialize(deserializer)?
            .map(|values| values.into_iter().map(|v| v.0).collect()))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::scalar")]
        scalar: f64,
        #[serde(with = "super::option")]
        option: Option<f64>,
        #[serde(with = "super::vec")]
        values: Vec<f64>,
        #[serde(with = "super::option_vec")]
        maybe_values: Option<Vec<f64>>,
    }

    #[test]
    fn it_keeps_non_finite_values() {
        let sample = Sample {
            scalar: f64::INFINITY,
            option: Some(f64::NEG_INFINITY),
            values: vec![1.5, f64::NAN, f64::INFINITY],
            maybe_values: Some(vec![f64::NEG_INFINITY, 2.0]),
        };

        let json = serde_json::to_string(&sample).unwrap();
        assert!(!json.contains("null"));

        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scalar, f64::INFINITY);
        assert_eq!(back.option, Some(f64::NEG_INFINITY));
        assert_eq!(back.values[0], 1.5);
        assert!(back.values[1].is_nan());
        assert_eq!(back.values[2], f64::INFINITY);
        assert_eq!(back.maybe_values, Some(vec![f64::NEG_INFINITY, 2.0]));
    }

    #[test]
    fn it_writes_finite_values_as_numbers() {
        let json = serde_json::to_string(&Sample {
            scalar: 0.25,
            option: None,
            values: vec![],
            maybe_values: None,
        })
        .unwrap();

        assert_eq!(
            json,
            r#"{"scalar":0.25,"option":null,"values":[],"maybe_values":null}"#
        );
    }
}
