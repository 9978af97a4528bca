//! Strongly-typed identifiers
//!
//! Every entity in the engine is addressed by an opaque string id. Fresh ids
//! are ULIDs so they sort by creation time; ids coming from external
//! collaborators (identity provider, authoring tool) are accepted verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Generate a new time-sortable id
            #[inline]
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new().to_string())
            }

            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Organization identifier
    OrgId
);
string_id!(
    /// Team identifier
    TeamId
);
string_id!(
    /// User identifier, as resolved by the identity provider
    UserId
);
string_id!(
    /// Process identifier
    ProcessId
);
string_id!(
    /// Identifier of one published version of a content unit
    ContentUnitId
);
string_id!(
    /// Response identifier
    ResponseId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(ProcessId::generate(), ProcessId::generate());
    }

    #[test]
    fn external_ids_round_trip_through_json() {
        let id = UserId::from("u1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"u1\"");
        assert_eq!(serde_json::from_str::<UserId>(&json).unwrap(), id);
    }
}
