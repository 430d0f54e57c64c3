//! Typed CRUD over one entity container.
//!
//! An [`EntityStore`] persists one [`DirectoryEntity`] type below
//! `ou=<container>,<root>`, one entry per identifier. Reads and writes go
//! through the entity's static attribute table; hidden attributes take part
//! only when `include_hidden` is set.
//!
//! # Example Usage
//!
//! ```rust
//! use directory_store::config::StoreConfig;
//! use directory_store::directory::InMemoryDirectory;
//! use directory_store::entity::Student;
//! use directory_store::result::StatusCode;
//! use directory_store::store::EntityStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StoreConfig::default().with_root_dn("dc=school,dc=example");
//! let directory = InMemoryDirectory::new("dc=school,dc=example");
//! let students = EntityStore::<_, Student>::new(directory, &config);
//!
//! let ada = Student { id: 17, first_name: Some("Ada".into()), ..Default::default() };
//! assert_eq!(students.add(&ada, &17, false).await?.status(), StatusCode::CREATED);
//! assert_eq!(students.add(&ada, &17, false).await?.status(), StatusCode::CONFLICT);
//! assert_eq!(students.get(&17, false).await?.value(), Some(&ada));
//! # Ok(())
//! # }
//! ```

use crate::config::StoreConfig;
use crate::directory::dn::ENTITY_RDN_ATTRIBUTE;
use crate::directory::{
    AttributeSet, DirectoryEntry, DirectoryError, DirectoryGateway, DirectoryRequest,
    DirectorySession, Filter, Naming, SearchScope,
};
use crate::entity::{DirectoryEntity, codec};
use crate::error::StoreResult;
use crate::result::OperationResult;
use crate::store::batch::{self, BatchExecutor, CorrelatedRequest};
use crate::store::{CONTAINER_OBJECT_CLASSES, ensure_container};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::marker::PhantomData;

/// CRUD and bulk import for entities of type `T`.
pub struct EntityStore<G, T> {
    gateway: G,
    naming: Naming,
    container: String,
    _entity: PhantomData<fn() -> T>,
}

impl<G: DirectoryGateway, T: DirectoryEntity> EntityStore<G, T> {
    pub fn new(gateway: G, config: &StoreConfig) -> Self {
        Self {
            gateway,
            naming: config.naming(),
            container: T::container(),
            _entity: PhantomData,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// DN of the container holding all entities of this type.
    pub fn container_dn(&self) -> String {
        self.naming.container_dn(&self.container)
    }

    /// DN of one entity.
    pub fn entity_dn(&self, id: &T::Id) -> String {
        self.naming.entity_dn(&self.container, &id.to_string())
    }

    fn describe(id: &T::Id) -> String {
        format!("{} {}", T::TYPE_NAME, id)
    }

    async fn ensure_container(&self, session: &G::Session) -> Result<(), DirectoryError> {
        ensure_container(
            session,
            &self.container_dn(),
            &self.container,
            CONTAINER_OBJECT_CLASSES,
            AttributeSet::new(),
        )
        .await
    }

    /// Whether an entry exists at `dn`; lookup failures read as absent.
    async fn exists_in(session: &G::Session, dn: &str) -> bool {
        match session.read(dn, Some(&[ENTITY_RDN_ATTRIBUTE])).await {
            Ok(entry) => entry.is_some(),
            Err(e) => {
                debug!("Lookup of {} failed, treating as absent: {}", dn, e);
                false
            }
        }
    }

    async fn read_entry(
        session: &G::Session,
        dn: &str,
        include_hidden: bool,
    ) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let attributes = T::schema().attribute_names(include_hidden);
        session.read(dn, Some(attributes.as_slice())).await
    }

    pub async fn exists(&self, id: &T::Id) -> StoreResult<bool> {
        let dn = self.entity_dn(id);
        debug!("Checking existence of {}", Self::describe(id));
        let session = self.gateway.connect().await?;
        Ok(Self::exists_in(&session, &dn).await)
    }

    /// Identifiers of all stored entities. Identifiers that do not parse as
    /// `T::Id` are skipped.
    pub async fn ids(&self) -> StoreResult<Vec<T::Id>> {
        debug!("Listing {} identifiers", T::TYPE_NAME);
        let session = self.gateway.connect().await?;
        let entries = match session
            .search(
                &self.container_dn(),
                &Filter::present(ENTITY_RDN_ATTRIBUTE),
                SearchScope::OneLevel,
                Some(&[ENTITY_RDN_ATTRIBUTE]),
            )
            .await
        {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(entries
            .iter()
            .filter_map(|entry| entry.first(ENTITY_RDN_ATTRIBUTE))
            .filter_map(|id| id.parse().ok())
            .collect())
    }

    /// Every entity in the container.
    ///
    /// Entries that fail to decode are reported per entry while the others
    /// are still returned (207). A missing container is an empty listing.
    pub async fn get_all(&self, include_hidden: bool) -> StoreResult<OperationResult<T>> {
        debug!("Listing all {} entities", T::TYPE_NAME);
        let session = self.gateway.connect().await?;
        let attributes = T::schema().attribute_names(include_hidden);

        let entries = match session
            .search(
                &self.container_dn(),
                &Filter::Any,
                SearchScope::OneLevel,
                Some(attributes.as_slice()),
            )
            .await
        {
            Ok(entries) => entries,
            Err(DirectoryError::NoSuchObject { .. }) => Vec::new(),
            Err(e) => return Ok(OperationResult::bad_request(e.to_string())),
        };

        let mut values = Vec::with_capacity(entries.len());
        let mut errors = Vec::new();
        for entry in &entries {
            match codec::decode::<T>(entry, include_hidden) {
                Ok(entity) => values.push(entity),
                Err(e) => {
                    let id = entry.first(ENTITY_RDN_ATTRIBUTE).unwrap_or(&entry.dn);
                    warn!("Failed to decode {} '{}' during list: {}", T::TYPE_NAME, id, e);
                    errors.push(format!("{}: {}", id, e));
                }
            }
        }

        debug!(
            "Listed {} {} entities ({} undecodable)",
            values.len(),
            T::TYPE_NAME,
            errors.len()
        );
        Ok(OperationResult::listing(values, errors))
    }

    /// One entity: 404 when absent, 400 when it cannot be decoded.
    pub async fn get(&self, id: &T::Id, include_hidden: bool) -> StoreResult<OperationResult<T>> {
        let dn = self.entity_dn(id);
        debug!("Getting {}", Self::describe(id));
        let session = self.gateway.connect().await?;

        let entry = match Self::read_entry(&session, &dn, include_hidden).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("{} not found", Self::describe(id));
                return Ok(OperationResult::not_found(format!(
                    "{} not found",
                    Self::describe(id)
                )));
            }
            Err(e) => return Ok(OperationResult::bad_request(e.to_string())),
        };

        Ok(match codec::decode::<T>(&entry, include_hidden) {
            Ok(entity) => OperationResult::ok(vec![entity]),
            Err(e) => {
                warn!("Failed to decode {}: {}", Self::describe(id), e);
                OperationResult::bad_request(format!("{}: {}", id, e))
            }
        })
    }

    /// Create the entity under `id`, which overrides the entity's own
    /// identifier field. 409 if the identifier is taken.
    pub async fn add(
        &self,
        entity: &T,
        id: &T::Id,
        include_hidden: bool,
    ) -> StoreResult<OperationResult<T>> {
        let dn = self.entity_dn(id);
        info!("Creating {}", Self::describe(id));
        let session = self.gateway.connect().await?;

        if let Err(e) = self.ensure_container(&session).await {
            return Ok(OperationResult::bad_request(e.to_string()));
        }
        if Self::exists_in(&session, &dn).await {
            debug!("{} already exists", Self::describe(id));
            return Ok(OperationResult::conflict(format!(
                "{} already exists",
                Self::describe(id)
            )));
        }

        let attributes = self.entry_attributes(entity, id, include_hidden);
        let created = codec::decode::<T>(
            &DirectoryEntry::new(&dn, attributes.clone().into_iter().collect()),
            include_hidden,
        );
        trace!("Create attributes: {:?}", attributes.keys().collect::<Vec<_>>());

        match session.add(&dn, attributes).await {
            Ok(()) => Ok(match created {
                Ok(entity) => OperationResult::created(entity),
                Err(e) => OperationResult::bad_request(format!("{}: {}", id, e)),
            }),
            Err(DirectoryError::AlreadyExists { .. }) => Ok(OperationResult::conflict(format!(
                "{} already exists",
                Self::describe(id)
            ))),
            Err(e) => {
                warn!("Failed to create {}: {}", Self::describe(id), e);
                Ok(OperationResult::bad_request(e.to_string()))
            }
        }
    }

    /// Object classes and encoded attributes, naming attribute set to `id`.
    fn entry_attributes(&self, entity: &T, id: &T::Id, include_hidden: bool) -> AttributeSet {
        let mut attributes = codec::encode(entity, include_hidden);
        attributes.insert(
            "objectClass".to_string(),
            T::schema()
                .object_classes()
                .iter()
                .map(|class| class.to_string())
                .collect(),
        );
        attributes.insert(ENTITY_RDN_ATTRIBUTE.to_string(), vec![id.to_string()]);
        attributes
    }

    /// Rewrite the stored entity with the fields of `entity`.
    ///
    /// Reads the stored entry first: fields that are now absent but stored
    /// are deleted explicitly. 404 if the identifier is absent.
    pub async fn modify(
        &self,
        entity: &T,
        id: &T::Id,
        include_hidden: bool,
    ) -> StoreResult<OperationResult<T>> {
        let dn = self.entity_dn(id);
        info!("Updating {}", Self::describe(id));
        let session = self.gateway.connect().await?;

        let current = match Self::read_entry(&session, &dn, include_hidden).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                return Ok(OperationResult::not_found(format!(
                    "{} not found",
                    Self::describe(id)
                )));
            }
            Err(e) => return Ok(OperationResult::bad_request(e.to_string())),
        };

        let mods = codec::diff(entity, &current, include_hidden);
        trace!(
            "Update changes: {:?}",
            mods.iter().map(|m| m.attribute()).collect::<Vec<_>>()
        );
        if !mods.is_empty() {
            if let Err(e) = session.modify(&dn, mods).await {
                warn!("Failed to update {}: {}", Self::describe(id), e);
                return Ok(OperationResult::bad_request(e.to_string()));
            }
        }

        Ok(match Self::read_entry(&session, &dn, include_hidden).await {
            Ok(Some(entry)) => match codec::decode::<T>(&entry, include_hidden) {
                Ok(stored) => OperationResult::ok(vec![stored]),
                Err(e) => OperationResult::bad_request(format!("{}: {}", id, e)),
            },
            Ok(None) => OperationResult::not_found(format!("{} not found", Self::describe(id))),
            Err(e) => OperationResult::bad_request(e.to_string()),
        })
    }

    /// Remove the entity. 404 if absent.
    pub async fn delete(&self, id: &T::Id) -> StoreResult<OperationResult<()>> {
        let dn = self.entity_dn(id);
        info!("Deleting {}", Self::describe(id));
        let session = self.gateway.connect().await?;

        if !Self::exists_in(&session, &dn).await {
            return Ok(OperationResult::not_found(format!(
                "{} not found",
                Self::describe(id)
            )));
        }

        Ok(match session.delete(&dn).await {
            Ok(()) => OperationResult::empty(),
            Err(DirectoryError::NoSuchObject { .. }) => {
                OperationResult::not_found(format!("{} not found", Self::describe(id)))
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", Self::describe(id), e);
                OperationResult::bad_request(e.to_string())
            }
        })
    }

    /// Bulk import.
    ///
    /// Each entity becomes a create directive, or a diff-aware modify when
    /// `overwrite` is set and its identifier already exists. Directives run
    /// as one batch; failures are reported as `"{id}: {message}"` without
    /// stopping the rest.
    pub async fn add_many<F>(
        &self,
        entities: &[T],
        id_selector: F,
        include_hidden: bool,
        overwrite: bool,
    ) -> StoreResult<OperationResult<()>>
    where
        F: Fn(&T) -> T::Id,
    {
        info!(
            "Importing {} {} entities (overwrite: {})",
            entities.len(),
            T::TYPE_NAME,
            overwrite
        );
        if entities.is_empty() {
            return Ok(OperationResult::empty());
        }

        let session = self.gateway.connect().await?;
        if let Err(e) = self.ensure_container(&session).await {
            return Ok(OperationResult::bad_request(e.to_string()));
        }
        let existing = match self.stored_by_id(&session, include_hidden).await {
            Ok(existing) => existing,
            Err(e) => return Ok(OperationResult::bad_request(e.to_string())),
        };

        let mut requests = Vec::with_capacity(entities.len());
        let mut unchanged = 0;
        for entity in entities {
            let id = id_selector(entity);
            let dn = self.entity_dn(&id);
            let current = existing.get(&id.to_string().to_ascii_lowercase());

            let request = match current {
                Some(current) if overwrite => {
                    let mods = codec::diff(entity, current, include_hidden);
                    if mods.is_empty() {
                        unchanged += 1;
                        continue;
                    }
                    DirectoryRequest::Modify { dn, mods }
                }
                _ => DirectoryRequest::Add {
                    attributes: self.entry_attributes(entity, &id, include_hidden),
                    dn,
                },
            };
            requests.push(CorrelatedRequest::new(request, id.to_string()));
        }

        debug!(
            "Import of {} prepared {} directives, {} entities unchanged",
            T::TYPE_NAME,
            requests.len(),
            unchanged
        );
        let report = batch::execute_on(&session, requests).await;
        Ok(OperationResult::batch(Vec::new(), report.errors(), entities.len()))
    }

    /// Stored entries of the container keyed by lowercased identifier.
    async fn stored_by_id(
        &self,
        session: &G::Session,
        include_hidden: bool,
    ) -> Result<HashMap<String, DirectoryEntry>, DirectoryError> {
        let attributes = T::schema().attribute_names(include_hidden);
        let entries = session
            .search(
                &self.container_dn(),
                &Filter::Any,
                SearchScope::OneLevel,
                Some(attributes.as_slice()),
            )
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.first(ENTITY_RDN_ATTRIBUTE)?.to_ascii_lowercase();
                Some((id, entry))
            })
            .collect())
    }

    /// Delete several entities in one batch. Absent identifiers are
    /// reported as per-item errors.
    pub async fn delete_many(&self, ids: &[T::Id]) -> StoreResult<OperationResult<()>> {
        info!("Deleting {} {} entities", ids.len(), T::TYPE_NAME);
        let requests = ids
            .iter()
            .map(|id| {
                CorrelatedRequest::new(
                    DirectoryRequest::Delete {
                        dn: self.entity_dn(id),
                    },
                    id.to_string(),
                )
            })
            .collect();

        let report = BatchExecutor::new(&self.gateway).execute(requests).await?;
        Ok(OperationResult::batch(Vec::new(), report.errors(), ids.len()))
    }
}
