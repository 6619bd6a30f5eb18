//! ULID-based identifiers
//!
//! Ledger entries, withdrawal requests and disputes all use ULIDs:
//! monotonic, sortable, 128-bit, and generated without coordination
//! (no sequence round-trip to the store).

use std::fmt;
use std::str::FromStr;

macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(ulid::Ulid);

        impl $name {
            /// Generate a new unique id
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            /// Get the inner ULID value
            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }
    };
}

ulid_id! {
    /// Ledger entry id. ULID ordering matches insertion order, which is the
    /// append-only ordering guarantee for a wallet's transaction log.
    EntryId
}

ulid_id! {
    /// Withdrawal (payout request) id
    WithdrawalId
}

ulid_id! {
    /// Dispute id
    DisputeId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_unique() {
        assert_ne!(EntryId::new(), EntryId::new());
        assert_ne!(WithdrawalId::new(), WithdrawalId::new());
    }

    #[test]
    fn test_id_string_roundtrip() {
        let id = DisputeId::new();
        let parsed: DisputeId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_entry_ids_sort_by_creation() {
        let a = EntryId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = EntryId::new();
        assert!(a < b);
    }
}
