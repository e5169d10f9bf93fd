//! Serde helpers that encode byte fields as lowercase hex strings.
//!
//! Transactions, keys and values are opaque bytes; JSON transports carry them
//! hex-encoded so that arbitrary (non-UTF-8) payloads round-trip exactly.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! struct Example {
//!     #[serde(with = "kvstore_types::serde_hex")]
//!     key: Vec<u8>,
//! }
//! ```

use serde::{Deserialize, Deserializer, Serializer};

/// Serialize bytes as a hex string.
pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&hex::encode(bytes))
}

/// Deserialize bytes from a hex string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    hex::decode(s.as_bytes()).map_err(serde::de::Error::custom)
}

/// Same encoding for optional byte fields; `None` maps to `null`.
pub mod option {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize optional bytes as a hex string or `null`.
    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional bytes from a hex string or `null`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| hex::decode(s.as_bytes()).map_err(serde::de::Error::custom))
            .transpose()
    }
}
