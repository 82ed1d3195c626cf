//! Secret configuration values.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string that never appears in clear text outside of [`MaskedString::expose`].
///
/// Deserializes from a plain JSON string. `Debug`, `Display` and `Serialize`
/// all render one `x` per character, so configs can be logged or echoed safely.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MaskedString(String);

impl MaskedString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn masked(&self) -> String {
        "x".repeat(self.0.chars().count())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MaskedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskedString({})", self.masked())
    }
}

impl fmt::Display for MaskedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<String> for MaskedString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MaskedString {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Serialize for MaskedString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.masked())
    }
}

impl<'de> Deserialize<'de> for MaskedString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}
