use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// Each table has its own token type so sample and sample_data links can't be mixed up.
macro_rules! define_token {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                pub fn new(token: impl Into<String>) -> Self {
                    Self(token.into())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(token: String) -> Self {
                    Self(token)
                }
            }

            impl From<&str> for $name {
                fn from(token: &str) -> Self {
                    Self(token.to_string())
                }
            }
        )*
    };
}

define_token!(
    SceneToken,
    /// Keyframe (`sample` table).
    SampleToken,
    /// Any capture, keyframe or intermediate sweep (`sample_data` table).
    SampleDataToken,
    EgoPoseToken,
    CalibratedSensorToken,
    SensorToken,
    AnnotationToken,
    InstanceToken,
    CategoryToken,
);

/// `prev`/`next` links use the empty string for "no neighbour".
pub(crate) fn optional_link<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let token = String::deserialize(deserializer)?;
    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(T::from(token)))
    }
}
