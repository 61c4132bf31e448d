//! Device linking protocol
//!
//! Implements the four operations a device and its user go through:
//! 1. Device calls [`LinkingManager::issue`] and shows the code on screen
//! 2. User types the code on a phone or browser, which calls
//!    [`LinkingManager::redeem`] along with their OAuth token
//! 3. Device polls [`LinkingManager::query`] until it reports linked
//! 4. Device (or user) may later call [`LinkingManager::revoke`]
//!
//! No state field is kept anywhere: where a device stands is read off the
//! two registries.

use crate::code::{luhn, CodeGenerator};
use crate::device::{AccountLink, DeviceCode};
use crate::storage::{CodeRegistry, LinkRegistry, StorageError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Linking errors
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Missing device id")]
    MissingDeviceId,
    #[error("Missing code")]
    MissingCode,
    #[error("Invalid or expired code")]
    InvalidCode,
    #[error("Failed to link account")]
    LinkFailed,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl LinkError {
    /// Error number shown on the activation result page
    ///
    /// `None` for failures that are not the user's to fix.
    pub fn error_code(&self) -> Option<u8> {
        match self {
            LinkError::MissingCode => Some(1),
            LinkError::InvalidCode => Some(2),
            LinkError::LinkFailed => Some(3),
            LinkError::MissingDeviceId | LinkError::Storage(_) => None,
        }
    }
}

pub type LinkResult<T> = Result<T, LinkError>;

/// `"yes"` / `"no"` flag used in device-facing responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

/// Response to a code request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCode {
    /// Code to display on the device
    pub code: String,
    /// Seconds until the code expires
    pub expiration: u64,
}

/// Response to a link status poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub linked: YesNo,
    /// Linked credential, empty when unlinked
    pub oauth_token: String,
}

/// Response to a disconnect request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisconnectStatus {
    pub success: YesNo,
}

/// Contents of both registries, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub codes: Vec<DeviceCode>,
    pub tokens: Vec<AccountLink>,
}

/// Drives code issuance, redemption, lookup and revocation
pub struct LinkingManager {
    generator: CodeGenerator,
    codes: Arc<CodeRegistry>,
    links: Arc<LinkRegistry>,
}

impl LinkingManager {
    /// Create a manager over the given registries
    pub fn new(
        generator: CodeGenerator,
        codes: Arc<CodeRegistry>,
        links: Arc<LinkRegistry>,
    ) -> Self {
        Self {
            generator,
            codes,
            links,
        }
    }

    /// Issue a fresh code for a device
    ///
    /// Any code previously issued to the device stops working.
    pub async fn issue(&self, device_id: &str) -> LinkResult<IssuedCode> {
        if device_id.is_empty() {
            return Err(LinkError::MissingDeviceId);
        }

        let code = self.generator.next_code();
        let record = self.codes.upsert(device_id, &code, Utc::now()).await;
        debug!("Issued code: {:?}", record);

        Ok(IssuedCode {
            code,
            expiration: self.codes.ttl_secs(),
        })
    }

    /// Redeem a code, linking its device to `credential`
    ///
    /// Codes stay redeemable until they expire; redeeming again replaces the
    /// stored credential. Returns the linked device id.
    pub async fn redeem(
        &self,
        code: Option<&str>,
        credential: Option<String>,
    ) -> LinkResult<String> {
        let code = code.filter(|c| !c.is_empty());
        let Some(code) = code else {
            return Err(LinkError::MissingCode);
        };

        if !luhn::is_valid(code) {
            warn!("Rejected code {} with bad check digit", code);
            return Err(LinkError::InvalidCode);
        }

        let record = self.codes.find_by_code(code).await;
        debug!("Code check: {} {:?}", code, record);
        let Some(record) = record else {
            warn!("Unknown or expired code {}", code);
            return Err(LinkError::InvalidCode);
        };

        if let Err(e) = self.links.upsert(&record.device_id, credential).await {
            error!("Failed to link device {}: {}", record.device_id, e);
            return Err(LinkError::LinkFailed);
        }

        info!("Device {} linked via code {}", record.device_id, code);
        Ok(record.device_id)
    }

    /// Report whether a device is linked, and to what
    pub async fn query(&self, device_id: &str) -> LinkResult<AuthStatus> {
        if device_id.is_empty() {
            return Err(LinkError::MissingDeviceId);
        }

        let status = match self.links.find_linked(device_id).await {
            Some(credential) => AuthStatus {
                linked: YesNo::Yes,
                oauth_token: credential,
            },
            None => AuthStatus {
                linked: YesNo::No,
                oauth_token: String::new(),
            },
        };
        debug!("Authentication: {} {:?}", device_id, status.linked);
        Ok(status)
    }

    /// Remove a device's link
    pub async fn revoke(&self, device_id: &str) -> LinkResult<DisconnectStatus> {
        if device_id.is_empty() {
            return Err(LinkError::MissingDeviceId);
        }

        let removed = self.links.delete(device_id).await?;
        debug!("Deleted link: {} {}", device_id, removed);
        Ok(DisconnectStatus {
            success: removed.into(),
        })
    }

    /// Read both registries
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let (codes, tokens) = tokio::join!(self.codes.list(), self.links.list());
        RegistrySnapshot { codes, tokens }
    }

    /// Code lifetime in seconds
    pub fn code_ttl_secs(&self) -> u64 {
        self.codes.ttl_secs()
    }
}
