//! Typed record persistence on top of a hierarchical directory.
//!
//! Stores records, group memberships and settings as entries of an
//! LDAP-style directory, and authenticates users against them.
//!
//! # Core Components
//!
//! - [`EntityStore`] - CRUD and bulk import for typed entities
//! - [`GroupStore`] - group membership with a sentinel member
//! - [`ValueStore`] - key/value settings
//! - [`DumpService`] - export and import of the whole store
//! - [`Authenticator`] - Basic and Bearer authentication with session tokens
//! - [`DirectoryGateway`] - the backend seam ([`InMemoryDirectory`], or
//!   `LdapGateway` with the `ldap` feature)
//!
//! # Quick Start
//!
//! ```rust
//! use directory_store::{EntityStore, InMemoryDirectory, StoreConfig};
//! use directory_store::entity::Employee;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::default().with_root_dn("dc=school,dc=example");
//! let directory = InMemoryDirectory::new("dc=school,dc=example");
//! let employees: EntityStore<_, Employee> = EntityStore::new(directory, &config);
//!
//! let jdoe = Employee { id: "jdoe".into(), teacher: true, ..Default::default() };
//! let created = employees.add(&jdoe, &jdoe.id, false).await?;
//! assert!(created.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! Bind failures are returned as `Err(StoreError::ServiceUnavailable)`;
//! every other failure is reported inside the [`OperationResult`].

pub mod auth;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod result;
pub mod store;

pub use auth::{AuthOutcome, Authenticator, Credential, HmacTokenIssuer, TokenIssuer};
pub use config::StoreConfig;
pub use directory::{DirectoryGateway, DirectorySession, InMemoryDirectory};
#[cfg(feature = "ldap")]
pub use directory::LdapGateway;
pub use entity::DirectoryEntity;
pub use error::{StoreError, StoreResult};
pub use result::{OperationResult, StatusCode};
pub use store::{DumpService, EntityStore, GroupStore, ImportMode, Snapshot, ValueStore};
