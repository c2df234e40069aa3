//! Opaque, self-describing entity identifiers.
//!
//! Every identifier is a bech32-encoded uuid7 carrying a human-readable
//! prefix, generalizing the `utils::new_uuid_to_bech32` /
//! `UserID` newtype idiom across every entity this crate persists.

use bech32::{Bech32m, Hrp};
use uuid7::uuid7;

/// Generate a fresh bech32m-encoded uuid7 under the given human-readable prefix.
pub fn new_id(hrp: &str) -> String {
    let hrp = Hrp::parse(hrp).expect("id prefix must be a valid bech32 hrp");
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes()).expect("bech32 encoding of a uuid7 cannot fail")
}

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(crate::ids::new_id($prefix))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
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

opaque_id!(TokenId, "tok_");
opaque_id!(VersionId, "ver_");
opaque_id!(RequestId, "req_");
opaque_id!(VoteId, "vote_");
opaque_id!(AuditId, "audit_");
opaque_id!(WebhookId, "wh_");
opaque_id!(DeliveryId, "dlv_");

/// Validator ids are operator-assigned, not minted by this crate, so they
/// stay plain opaque strings rather than bech32-encoded uuids (§3,
/// `ValidatorVote.validator_id`).
pub type ValidatorId = String;
