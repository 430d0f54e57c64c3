//! Record stores built on a [`DirectoryGateway`](crate::directory::DirectoryGateway).
//!
//! - [`EntityStore`] - CRUD and bulk import for one entity type
//! - [`GroupStore`] - group membership
//! - [`ValueStore`] - key/value settings
//! - [`DumpService`] - export and import of everything above
//! - [`BatchExecutor`] - the best-effort batch runner the others share
//!
//! Every public operation opens its own session. Bind failures surface as
//! `Err(StoreError::ServiceUnavailable)`; business outcomes are reported in
//! the returned [`OperationResult`](crate::result::OperationResult).

pub mod batch;
pub mod dump;
pub mod entity;
pub mod group;
pub mod value;

pub use batch::{BatchExecutor, BatchReport, CorrelatedRequest, ItemError};
pub use dump::{DumpService, ImportMode, Snapshot};
pub use entity::EntityStore;
pub use group::GroupStore;
pub use value::ValueStore;

use crate::directory::dn::CONTAINER_RDN_ATTRIBUTE;
use crate::directory::{AttributeSet, DirectoryError, DirectorySession};
use log::debug;

/// Object classes of the organisational units holding entities and settings.
pub(crate) const CONTAINER_OBJECT_CLASSES: &[&str] = &["top", "organizationalUnit"];

/// Create the container entry `dn` (named `name`) unless it exists.
///
/// `extra` attributes are written on creation only. Losing a creation race
/// to another caller counts as success.
pub(crate) async fn ensure_container<S: DirectorySession>(
    session: &S,
    dn: &str,
    name: &str,
    object_classes: &[&str],
    extra: AttributeSet,
) -> Result<(), DirectoryError> {
    if session.read(dn, Some(&[CONTAINER_RDN_ATTRIBUTE])).await?.is_some() {
        return Ok(());
    }

    debug!("Creating container {}", dn);
    let mut attributes = extra;
    attributes.insert(
        "objectClass".to_string(),
        object_classes.iter().map(|c| c.to_string()).collect(),
    );
    attributes.insert(CONTAINER_RDN_ATTRIBUTE.to_string(), vec![name.to_string()]);

    match session.add(dn, attributes).await {
        Ok(()) | Err(DirectoryError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}
