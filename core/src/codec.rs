//! JSON encoding and decoding for request and response bodies.
//!
//! # Design
//! serde_json has no decoder-wide date strategy, so dates in the service's
//! fixed format are opted into per field with
//! `#[serde(with = "netop_core::codec::date_format")]`.
//!
//! An empty 2xx body decodes to the target type's empty value. Whether a type
//! has one is a capability (`ResponseModel::empty`); types without it fail
//! with `CodecError::EmptyBodyUnsupported` instead of being forced.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Decode target for successful responses.
pub trait ResponseModel: DeserializeOwned + Send + 'static {
    /// Value produced for a 2xx response without a body.
    fn empty() -> Option<Self> {
        None
    }
}

/// Response type for calls whose success carries no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
pub struct EmptyResponse {}

impl ResponseModel for EmptyResponse {
    fn empty() -> Option<Self> {
        Some(EmptyResponse {})
    }
}

impl ResponseModel for () {
    fn empty() -> Option<Self> {
        Some(())
    }
}

impl ResponseModel for serde_json::Value {
    fn empty() -> Option<Self> {
        Some(serde_json::Value::Null)
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseModel for Vec<T> {
    fn empty() -> Option<Self> {
        Some(Vec::new())
    }
}

impl<T: DeserializeOwned + Send + 'static> ResponseModel for Option<T> {
    fn empty() -> Option<Self> {
        Some(None)
    }
}

/// Implement `ResponseModel` for types whose `Default` is their empty value.
#[macro_export]
macro_rules! empty_as_default {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::ResponseModel for $ty {
                fn empty() -> Option<Self> {
                    Some(<$ty as ::std::default::Default>::default())
                }
            }
        )+
    };
}

pub fn encode<M: Serialize + ?Sized>(model: &M) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(model).map_err(CodecError::Encode)
}

/// Decode a success body, falling back to `T::empty()` for empty bodies.
pub fn decode<T: ResponseModel>(body: &[u8]) -> Result<T, CodecError> {
    if is_blank(body) {
        return T::empty().ok_or(CodecError::EmptyBodyUnsupported {
            type_name: std::any::type_name::<T>(),
        });
    }
    decode_json(body)
}

/// Decode a non-empty JSON body into any deserializable type.
pub fn decode_json<D: DeserializeOwned>(body: &[u8]) -> Result<D, CodecError> {
    serde_json::from_slice(body).map_err(CodecError::Decode)
}

pub(crate) fn is_blank(body: &[u8]) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// `yyyy-MM-dd'T'HH:mm:ss.SSSZ`, e.g. `2021-02-16T09:30:00.000+0300`.
pub mod date_format {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

    pub fn format(date: &DateTime<Utc>) -> String {
        date.format(FORMAT).to_string()
    }

    /// Parse the fixed format; a trailing `Z` designator is accepted too.
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .map(|date| date.with_timezone(&Utc))
    }

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Same format for `Option<DateTime<Utc>>` fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            date: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => serializer.serialize_str(&super::format(date)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
