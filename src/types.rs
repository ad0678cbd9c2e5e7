//! NewType wrappers for the identifiers that flow through the executor.
//!
//! A container guid (assigned by whoever asks us to run work) and a runtime
//! handle (assigned by the container backend) are both plain strings on the
//! wire, and mixing them up is an easy mistake to make.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Return `true` if the wrapped string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Caller-assigned identifier of a container registration.
    ///
    /// This is the key of the registry. It exists before any runtime
    /// resource does and outlives the resource until the registration is
    /// deleted.
    ContainerGuid
);

newtype_string!(
    /// Backend-assigned handle of a live runtime container.
    ContainerHandle
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_creation() {
        let guid = ContainerGuid::new("abc");
        assert_eq!(guid.as_str(), "abc");
        assert_eq!(guid.to_string(), "abc");
    }

    #[test]
    fn test_handle_from_string() {
        let handle: ContainerHandle = "h1".into();
        assert_eq!(handle.as_str(), "h1");

        let handle: ContainerHandle = String::from("h2").into();
        assert_eq!(handle.into_inner(), "h2");
    }

    #[test]
    fn test_guid_serde_is_transparent() {
        let guid = ContainerGuid::new("abc");
        let json = serde_json::to_string(&guid).unwrap();
        assert_eq!(json, "\"abc\"");

        let parsed: ContainerGuid = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, guid);
    }

    #[test]
    fn test_guid_borrow_for_map_lookup() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ContainerGuid::new("abc"), 1);

        assert_eq!(map.get("abc"), Some(&1));
        assert!(!map.contains_key("missing"));
    }

    #[test]
    fn test_empty_handle() {
        assert!(ContainerHandle::new("").is_empty());
        assert!(!ContainerHandle::new("h1").is_empty());
    }
}
