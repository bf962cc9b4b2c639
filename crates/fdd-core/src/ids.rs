//! # Identifier Newtypes
//!
//! UUID-backed identifiers for the four persistent entities. The
//! newtypes exist so stage signatures cannot confuse a section with the
//! document that contains it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a canonical franchisor entity.
    FranchisorId
);
id_newtype!(
    /// Identifier of a disclosure filing.
    FddId
);
id_newtype!(
    /// Identifier of a section within a filing.
    SectionId
);
id_newtype!(
    /// Identifier of a human-review queue record.
    ReviewId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct() {
        assert_ne!(FddId::new(), FddId::new());
    }

    #[test]
    fn serde_is_transparent() {
        let id = SectionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.0));
        let back: SectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
