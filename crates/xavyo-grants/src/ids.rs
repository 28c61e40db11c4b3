//! Strongly typed identifiers.
//!
//! The authorization server hands out plain 64-bit integers for users,
//! userspaces, work groups and packets. Wrapping each in its own newtype keeps
//! a work-group id from being passed where a userspace id is expected.
//!
//! # Example
//!
//! ```
//! use xavyo_grants::{UserspaceId, WorkGroupId};
//!
//! let userspace = UserspaceId::new(9);
//! let work_group: WorkGroupId = 5.into();
//!
//! assert_eq!(userspace.get(), 9);
//! assert_eq!(work_group.to_string(), "5");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

/// Macro to define a strongly-typed integer ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw identifier.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw identifier.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(
    /// Identifier of a platform user (the `sub` claim).
    UserId
);

define_id!(
    /// Identifier of a userspace, the tenant-level isolation boundary.
    UserspaceId
);

define_id!(
    /// Identifier of a work group inside a userspace.
    WorkGroupId
);

define_id!(
    /// Identifier of a permission packet.
    PacketId
);
