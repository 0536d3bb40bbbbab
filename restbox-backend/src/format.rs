//! Value serialization formats.
//!
//! | Format | Size | Human-readable |
//! |--------|------|----------------|
//! | [`Json`](Format::Json) | Large | Yes |
//! | [`Bincode`](Format::Bincode) | Compact | No |

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Error raised while encoding or decoding stored values.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Value could not be encoded.
    #[error(transparent)]
    Serialize(Box<dyn std::error::Error + Send + Sync>),

    /// Stored bytes could not be decoded.
    #[error(transparent)]
    Deserialize(Box<dyn std::error::Error + Send + Sync>),
}

/// Serialization format a [`Storage`](crate::Storage) uses for its values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    /// JSON via `serde_json` (default).
    #[default]
    Json,
    /// Bincode with the standard configuration.
    Bincode,
}

impl Format {
    /// Encodes a value.
    pub fn serialize<T>(&self, value: &T) -> Result<Bytes, FormatError>
    where
        T: Serialize,
    {
        match self {
            Format::Json => serde_json::to_vec(value)
                .map(Bytes::from)
                .map_err(|err| FormatError::Serialize(Box::new(err))),
            Format::Bincode => bincode::serde::encode_to_vec(value, bincode::config::standard())
                .map(Bytes::from)
                .map_err(|err| FormatError::Serialize(Box::new(err))),
        }
    }

    /// Decodes a value.
    pub fn deserialize<T>(&self, data: &[u8]) -> Result<T, FormatError>
    where
        T: DeserializeOwned,
    {
        match self {
            Format::Json => {
                serde_json::from_slice(data).map_err(|err| FormatError::Deserialize(Box::new(err)))
            }
            Format::Bincode => {
                bincode::serde::decode_from_slice(data, bincode::config::standard())
                    .map(|(value, _)| value)
                    .map_err(|err| FormatError::Deserialize(Box::new(err)))
            }
        }
    }
}
