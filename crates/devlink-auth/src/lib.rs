//! devlink Auth - Activation codes and account linking
//!
//! Lets a device without a keyboard borrow an OAuth token that a user
//! obtained on their phone or browser.
//!
//! # Linking Flow
//!
//! 1. Device calls `LinkingManager::issue()` and displays the returned code
//! 2. User opens the activation page and submits the code with their token
//! 3. `LinkingManager::redeem()` finds the device behind the code and links it
//! 4. Device polls `LinkingManager::query()` until it reports `linked: "yes"`
//! 5. `LinkingManager::revoke()` removes the link again
//!
//! Issued codes live in a [`CodeRegistry`] and vanish after their TTL; links
//! live in a [`LinkRegistry`] until revoked.
//!
//! # Example
//!
//! ```no_run
//! use devlink_auth::{CodeGenerator, CodeRegistry, LinkRegistry, LinkingManager};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let codes = Arc::new(CodeRegistry::new(900));
//!     let links = Arc::new(LinkRegistry::new().await.unwrap());
//!     let manager = LinkingManager::new(CodeGenerator::default(), codes, links);
//!
//!     let issued = manager.issue("roku-1234").await.unwrap();
//!     println!("Enter {} within {} seconds", issued.code, issued.expiration);
//!
//!     // Later, from the activation page
//!     manager
//!         .redeem(Some(&issued.code), Some("oauth-token".to_string()))
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod code;
pub mod device;
pub mod linking;
pub mod storage;

pub use code::{luhn, CodeGenerator, DEFAULT_CODE_RANGE};
pub use device::{AccountLink, DeviceCode};
pub use linking::{
    AuthStatus, DisconnectStatus, IssuedCode, LinkError, LinkResult, LinkingManager,
    RegistrySnapshot, YesNo,
};
pub use storage::{CodeRegistry, LinkRegistry, StorageError, StorageResult};
