//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Settlements, buildings, scheduled activities and recorded history entries
//! each carry a strongly-typed ID so they cannot be mixed up at compile
//! time. All IDs use UUID v7 (time-ordered), which also makes them a stable
//! tie-breaker when two venues are otherwise equal.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a settlement (a scheduling domain).
    SettlementId
}

define_id! {
    /// Unique identifier for a building that can host an activity.
    BuildingId
}

define_id! {
    /// Unique identifier for a scheduled group activity.
    ActivityId
}

define_id! {
    /// Unique identifier for a recorded historical event.
    EventId
}
