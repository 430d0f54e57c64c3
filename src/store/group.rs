//! Group membership.
//!
//! A group is an entry `ou=<name>,<root>` whose membership attribute
//! (`memberUid` by default) lists member identifiers. The attribute always
//! holds a sentinel member so that an empty group stays valid for schemas
//! that require at least one value; the sentinel is never reported as a
//! member and can never be added or removed through this API.
//!
//! Group entries share the `ou=` namespace with entity containers, so a
//! group cannot be named after a container (`students`, `employees`,
//! `values`).

use crate::config::{GroupConfig, StoreConfig};
use crate::directory::dn::CONTAINER_RDN_ATTRIBUTE;
use crate::directory::{
    AttributeMod, AttributeSet, DirectoryEntry, DirectoryError, DirectoryGateway,
    DirectoryRequest, DirectorySession, Filter, Naming, SearchScope,
};
use crate::error::StoreResult;
use crate::result::OperationResult;
use crate::store::batch::{self, CorrelatedRequest};
use crate::store::ensure_container;
use log::{debug, info, warn};

/// Object classes of group entries. `extensibleObject` admits the
/// membership attribute on an organisational unit.
const GROUP_OBJECT_CLASSES: &[&str] = &["top", "organizationalUnit", "extensibleObject"];

pub struct GroupStore<G> {
    gateway: G,
    naming: Naming,
    config: GroupConfig,
}

impl<G: DirectoryGateway> GroupStore<G> {
    pub fn new(gateway: G, config: &StoreConfig) -> Self {
        Self {
            gateway,
            naming: config.naming(),
            config: config.groups.clone(),
        }
    }

    pub fn group_dn(&self, name: &str) -> String {
        self.naming.group_dn(name)
    }

    fn is_sentinel(&self, id: &str) -> bool {
        id.eq_ignore_ascii_case(&self.config.sentinel_member)
    }

    fn membership(&self, entry: &DirectoryEntry) -> Vec<String> {
        entry
            .values(&self.config.membership_attribute)
            .unwrap_or_default()
            .iter()
            .filter(|member| !self.is_sentinel(member))
            .cloned()
            .collect()
    }

    /// Read the group entry; lookup failures read as absent.
    async fn read_group(&self, session: &G::Session, name: &str) -> Option<DirectoryEntry> {
        let attributes = [self.config.membership_attribute.as_str()];
        match session.read(&self.group_dn(name), Some(&attributes)).await {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Lookup of group '{}' failed, treating as absent: {}", name, e);
                None
            }
        }
    }

    async fn ensure_group(&self, session: &G::Session, name: &str) -> Result<(), DirectoryError> {
        let mut initial = AttributeSet::new();
        initial.insert(
            self.config.membership_attribute.clone(),
            vec![self.config.sentinel_member.clone()],
        );
        ensure_container(session, &self.group_dn(name), name, GROUP_OBJECT_CLASSES, initial).await
    }

    pub async fn exists(&self, name: &str) -> StoreResult<bool> {
        debug!("Checking existence of group '{}'", name);
        let session = self.gateway.connect().await?;
        Ok(self.read_group(&session, name).await.is_some())
    }

    /// False when the group or the member is absent.
    pub async fn is_member(&self, name: &str, id: &str) -> StoreResult<bool> {
        debug!("Checking membership of '{}' in group '{}'", id, name);
        if self.is_sentinel(id) {
            return Ok(false);
        }
        let session = self.gateway.connect().await?;
        Ok(self
            .read_group(&session, name)
            .await
            .is_some_and(|entry| {
                self.membership(&entry)
                    .iter()
                    .any(|member| member.eq_ignore_ascii_case(id))
            }))
    }

    /// Members in directory order, sentinel excluded. An absent group has
    /// no members.
    pub async fn members(&self, name: &str) -> StoreResult<Vec<String>> {
        debug!("Listing members of group '{}'", name);
        let session = self.gateway.connect().await?;
        Ok(self
            .read_group(&session, name)
            .await
            .map(|entry| self.membership(&entry))
            .unwrap_or_default())
    }

    /// Replace the whole member list, creating the group if needed.
    pub async fn set_members(&self, name: &str, ids: &[String]) -> StoreResult<bool> {
        info!("Setting {} members of group '{}'", ids.len(), name);
        let session = self.gateway.connect().await?;

        if let Err(e) = self.ensure_group(&session, name).await {
            warn!("Failed to create group '{}': {}", name, e);
            return Ok(false);
        }

        let mut members = vec![self.config.sentinel_member.clone()];
        for id in ids {
            let duplicate = members.iter().any(|m| m.eq_ignore_ascii_case(id));
            if !duplicate {
                members.push(id.clone());
            }
        }

        let change = AttributeMod::Replace(self.config.membership_attribute.clone(), members);
        match session.modify(&self.group_dn(name), vec![change]).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("Failed to set members of group '{}': {}", name, e);
                Ok(false)
            }
        }
    }

    fn add_directive(&self, name: &str, id: &str) -> DirectoryRequest {
        DirectoryRequest::Modify {
            dn: self.group_dn(name),
            mods: vec![AttributeMod::Add(
                self.config.membership_attribute.clone(),
                vec![id.to_string()],
            )],
        }
    }

    fn remove_directive(&self, name: &str, id: &str) -> DirectoryRequest {
        DirectoryRequest::Modify {
            dn: self.group_dn(name),
            mods: vec![AttributeMod::Delete(
                self.config.membership_attribute.clone(),
                vec![id.to_string()],
            )],
        }
    }

    /// Add one member, creating the group if needed. 409 if already a
    /// member.
    pub async fn add_member(&self, name: &str, id: &str) -> StoreResult<OperationResult<()>> {
        info!("Adding '{}' to group '{}'", id, name);
        if self.is_sentinel(id) {
            return Ok(OperationResult::bad_request(format!(
                "'{}' is a reserved member name",
                id
            )));
        }
        let session = self.gateway.connect().await?;

        if let Err(e) = self.ensure_group(&session, name).await {
            return Ok(OperationResult::bad_request(e.to_string()));
        }

        Ok(match session.submit(self.add_directive(name, id)).await {
            Ok(()) => OperationResult::empty(),
            Err(DirectoryError::AttributeOrValueExists { .. }) => OperationResult::conflict(
                format!("'{}' is already a member of group '{}'", id, name),
            ),
            Err(e) => {
                warn!("Failed to add '{}' to group '{}': {}", id, name, e);
                OperationResult::bad_request(e.to_string())
            }
        })
    }

    /// Add several members in one batch. Existing members are reported as
    /// per-id errors.
    pub async fn add_members(&self, name: &str, ids: &[String]) -> StoreResult<OperationResult<()>> {
        info!("Adding {} members to group '{}'", ids.len(), name);
        if ids.is_empty() {
            return Ok(OperationResult::empty());
        }
        let session = self.gateway.connect().await?;
        if let Err(e) = self.ensure_group(&session, name).await {
            return Ok(OperationResult::bad_request(e.to_string()));
        }

        let (reserved, requests) = self.partition(ids, |id| self.add_directive(name, id));
        let report = batch::execute_on(&session, requests).await;
        let mut errors = reserved;
        errors.extend(report.errors());
        Ok(OperationResult::batch(Vec::new(), errors, ids.len()))
    }

    /// Remove one member. 404 if the group or the member is absent.
    pub async fn remove_member(&self, name: &str, id: &str) -> StoreResult<OperationResult<()>> {
        info!("Removing '{}' from group '{}'", id, name);
        let session = self.gateway.connect().await?;

        let Some(entry) = self.read_group(&session, name).await else {
            return Ok(OperationResult::not_found(format!("Group '{}' not found", name)));
        };
        let is_member = self
            .membership(&entry)
            .iter()
            .any(|member| member.eq_ignore_ascii_case(id));
        if !is_member {
            return Ok(OperationResult::not_found(format!(
                "'{}' is not a member of group '{}'",
                id, name
            )));
        }

        Ok(match session.submit(self.remove_directive(name, id)).await {
            Ok(()) => OperationResult::empty(),
            Err(DirectoryError::NoSuchAttribute { .. }) => OperationResult::not_found(format!(
                "'{}' is not a member of group '{}'",
                id, name
            )),
            Err(e) => {
                warn!("Failed to remove '{}' from group '{}': {}", id, name, e);
                OperationResult::bad_request(e.to_string())
            }
        })
    }

    /// Remove several members in one batch. 404 if the group is absent;
    /// non-members are reported as per-id errors.
    pub async fn remove_members(
        &self,
        name: &str,
        ids: &[String],
    ) -> StoreResult<OperationResult<()>> {
        info!("Removing {} members from group '{}'", ids.len(), name);
        let session = self.gateway.connect().await?;
        if self.read_group(&session, name).await.is_none() {
            return Ok(OperationResult::not_found(format!("Group '{}' not found", name)));
        }
        if ids.is_empty() {
            return Ok(OperationResult::empty());
        }

        let (reserved, requests) = self.partition(ids, |id| self.remove_directive(name, id));
        let report = batch::execute_on(&session, requests).await;
        let mut errors = reserved;
        errors.extend(report.errors());
        Ok(OperationResult::batch(Vec::new(), errors, ids.len()))
    }

    /// Split ids into errors for the sentinel and directives for the rest.
    fn partition(
        &self,
        ids: &[String],
        directive: impl Fn(&str) -> DirectoryRequest,
    ) -> (Vec<String>, Vec<CorrelatedRequest>) {
        let mut reserved = Vec::new();
        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            if self.is_sentinel(id) {
                reserved.push(format!("{}: reserved member name", id));
            } else {
                requests.push(CorrelatedRequest::new(directive(id), id.clone()));
            }
        }
        (reserved, requests)
    }

    /// Names of all groups below the root, in directory order.
    pub async fn names(&self) -> StoreResult<Vec<String>> {
        debug!("Listing groups");
        let session = self.gateway.connect().await?;
        let filter = Filter::And(vec![
            Filter::equals("objectClass", "organizationalUnit"),
            Filter::present(self.config.membership_attribute.as_str()),
        ]);

        let entries = session
            .search(
                self.naming.root_dn(),
                &filter,
                SearchScope::OneLevel,
                Some(&[CONTAINER_RDN_ATTRIBUTE]),
            )
            .await?;
        Ok(entries
            .iter()
            .filter_map(|entry| entry.first(CONTAINER_RDN_ATTRIBUTE))
            .map(str::to_string)
            .collect())
    }
}
