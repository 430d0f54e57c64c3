//! Export and import of the complete store.
//!
//! A [`Snapshot`] holds every student and employee (hidden fields
//! included), every group's member list and the full settings map. It
//! serialises to JSON with serde, so a dump can be written to disk and
//! loaded back into another directory.

use crate::config::StoreConfig;
use crate::directory::DirectoryGateway;
use crate::entity::{DirectoryEntity, Employee, Student};
use crate::error::StoreResult;
use crate::result::OperationResult;
use crate::store::{EntityStore, GroupStore, ValueStore};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Everything the stores hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub employees: Vec<Employee>,
    /// Group name to members, sentinel excluded
    pub groups: BTreeMap<String, Vec<String>>,
    pub values: BTreeMap<String, String>,
}

impl Snapshot {
    /// Number of records the snapshot would write on import.
    pub fn len(&self) -> usize {
        self.students.len() + self.employees.len() + self.groups.len() + self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How an import treats records that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Leave existing records untouched.
    Additive,
    /// Replace existing records with the snapshot's version.
    Overwrite,
}

pub struct DumpService<G> {
    students: EntityStore<G, Student>,
    employees: EntityStore<G, Employee>,
    groups: GroupStore<G>,
    values: ValueStore<G>,
}

impl<G: DirectoryGateway + Clone> DumpService<G> {
    pub fn new(gateway: G, config: &StoreConfig) -> Self {
        Self {
            students: EntityStore::new(gateway.clone(), config),
            employees: EntityStore::new(gateway.clone(), config),
            groups: GroupStore::new(gateway.clone(), config),
            values: ValueStore::new(gateway, config),
        }
    }

    /// Read everything. Entries that fail to decode are reported as errors
    /// (207) and left out of the snapshot.
    pub async fn export(&self) -> StoreResult<OperationResult<Snapshot>> {
        info!("Exporting snapshot");
        let mut errors = Vec::new();

        let students = self.students.get_all(true).await?;
        errors.extend(prefixed(Student::container(), students.errors()));
        let employees = self.employees.get_all(true).await?;
        errors.extend(prefixed(Employee::container(), employees.errors()));

        let mut groups = BTreeMap::new();
        for name in self.groups.names().await? {
            let members = self.groups.members(&name).await?;
            groups.insert(name, members);
        }

        let snapshot = Snapshot {
            students: students.into_values(),
            employees: employees.into_values(),
            groups,
            values: self.values.get_all().await?,
        };
        debug!(
            "Exported {} students, {} employees, {} groups, {} values",
            snapshot.students.len(),
            snapshot.employees.len(),
            snapshot.groups.len(),
            snapshot.values.len()
        );
        Ok(OperationResult::listing(vec![snapshot], errors))
    }

    /// Write a snapshot.
    ///
    /// In [`ImportMode::Additive`] existing students, employees, groups and
    /// settings are skipped; in [`ImportMode::Overwrite`] they are replaced.
    /// Failures of individual records are collected; the result is 207 when
    /// some records failed and 400 when all did.
    pub async fn import(
        &self,
        snapshot: &Snapshot,
        mode: ImportMode,
    ) -> StoreResult<OperationResult<()>> {
        info!("Importing snapshot of {} records ({:?})", snapshot.len(), mode);
        let overwrite = mode == ImportMode::Overwrite;
        let mut errors = Vec::new();

        let students = self.pending(&self.students, &snapshot.students, mode).await?;
        let result = self
            .students
            .add_many(&students, |s| s.id, true, overwrite)
            .await?;
        errors.extend(prefixed(Student::container(), result.errors()));

        let employees = self.pending(&self.employees, &snapshot.employees, mode).await?;
        let result = self
            .employees
            .add_many(&employees, |e| e.id.clone(), true, overwrite)
            .await?;
        errors.extend(prefixed(Employee::container(), result.errors()));

        let existing_groups: HashSet<String> = if overwrite {
            HashSet::new()
        } else {
            self.groups.names().await?.iter().map(normalized).collect()
        };
        for (name, members) in &snapshot.groups {
            if existing_groups.contains(&normalized(name)) {
                debug!("Skipping existing group '{}'", name);
                continue;
            }
            if !self.groups.set_members(name, members).await? {
                errors.push(format!("groups/{}: failed to set members", name));
            }
        }

        let existing_values: HashSet<String> = if overwrite {
            HashSet::new()
        } else {
            self.values.get_all().await?.keys().map(normalized).collect()
        };
        for (key, value) in &snapshot.values {
            if existing_values.contains(&normalized(key)) {
                debug!("Skipping existing value '{}'", key);
                continue;
            }
            if !self.values.set(key, value).await? {
                errors.push(format!("values/{}: failed to store value", key));
            }
        }

        info!(
            "Import finished with {} errors out of {} records",
            errors.len(),
            snapshot.len()
        );
        if snapshot.is_empty() {
            return Ok(OperationResult::empty());
        }
        Ok(OperationResult::batch(Vec::new(), errors, snapshot.len()))
    }

    /// Entities of the snapshot that the import should write.
    async fn pending<T: DirectoryEntity>(
        &self,
        store: &EntityStore<G, T>,
        entities: &[T],
        mode: ImportMode,
    ) -> StoreResult<Vec<T>> {
        if mode == ImportMode::Overwrite {
            return Ok(entities.to_vec());
        }
        let existing: HashSet<String> = store.ids().await?.iter().map(normalized).collect();
        Ok(entities
            .iter()
            .filter(|entity| !existing.contains(&normalized(&entity.id())))
            .cloned()
            .collect())
    }
}

/// Directory names compare case-insensitively.
fn normalized(name: &impl ToString) -> String {
    name.to_string().to_ascii_lowercase()
}

fn prefixed(container: String, errors: &[String]) -> Vec<String> {
    errors
        .iter()
        .map(|error| format!("{}/{}", container, error))
        .collect()
}
