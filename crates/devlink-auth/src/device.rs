//! Device records
//!
//! A device is known only by the opaque identifier it sends with every call.
//! Two independent records hang off that identifier: the code it is currently
//! showing on screen, and the account link created once a user redeems it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An activation code issued to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCode {
    /// Identifier supplied by the device
    pub device_id: String,
    /// Numeric code with trailing check digit
    pub code: String,
    /// When the code was issued
    pub created_at: DateTime<Utc>,
}

impl DeviceCode {
    /// Create a code record with an explicit issue time
    pub fn issued_at(device_id: String, code: String, created_at: DateTime<Utc>) -> Self {
        Self {
            device_id,
            code,
            created_at,
        }
    }

    /// Instant at which the code stops being redeemable
    pub fn expires_at(&self, ttl: Duration) -> DateTime<Utc> {
        self.created_at + ttl
    }

    /// Whether the code has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now >= self.expires_at(ttl)
    }
}

/// A device linked to an externally issued credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLink {
    /// Identifier supplied by the device
    pub device_id: String,
    /// Bearer credential, stored verbatim
    pub credential: Option<String>,
    /// When the link was last written
    pub linked_at: DateTime<Utc>,
}

impl AccountLink {
    pub fn new(device_id: String, credential: Option<String>) -> Self {
        Self {
            device_id,
            credential,
            linked_at: Utc::now(),
        }
    }

    /// A record without a usable credential does not count as linked
    pub fn linked_credential(&self) -> Option<&str> {
        self.credential.as_deref().filter(|c| !c.is_empty())
    }
}
