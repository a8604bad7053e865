//! JSON serialization helpers shared by export and persistence code.

use serde_json::Value;

/// Types that can be serialized to/from JSON strings with a
/// module-specific error type.
///
/// Generic over the error so each seam maps `serde_json::Error` into its
/// own diagnostic (see the blanket impl in [`crate::store`]).
pub trait JsonSerializable<E>: serde::Serialize + for<'de> serde::de::DeserializeOwned {
    /// Serialize this object to a JSON string.
    fn to_json_string(&self) -> Result<String, E>;

    /// Deserialize an object from a JSON string.
    fn from_json_str(s: &str) -> Result<Self, E>;
}

/// Best-effort conversion to a JSON value; anything unrepresentable
/// becomes `null`. For log and debug surfaces where failing is worse than
/// losing fidelity.
pub fn lossy_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
