use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use crate::error::GenerateError;
use crate::model::WorkingSet;
use crate::naming::{self, Label};
use crate::requirement::normalize_name;
use crate::resolver::FeasibilityResult;

/// One external repository the generated install function registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub repository: String,
    pub wheels: Vec<PathBuf>,
    pub extras: Vec<String>,
}

/// Capability key → label, with the lookup semantics of the generated
/// `requirement()` / `pypi_whl_requirement()` functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    kind: &'static str,
    entries: BTreeMap<String, Label>,
}

impl LookupTable {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&Label, GenerateError> {
        self.entries
            .get(&normalize_name(name))
            .ok_or_else(|| GenerateError::UnknownCapability {
                table: self.kind,
                requested: name.to_string(),
                available: self.entries.keys().cloned().collect(),
            })
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &Label)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarations {
    pub registrations: Vec<Registration>,
    pub merged: Registration,
    pub libraries: LookupTable,
    pub file_groups: LookupTable,
    merged_library: Label,
    merged_file_group: Label,
}

impl Declarations {
    pub fn build(
        namespace: &str,
        working_set: &WorkingSet,
        feasibility: &FeasibilityResult,
    ) -> Result<Self, GenerateError> {
        let mut registrations = Vec::with_capacity(working_set.len());
        for package in working_set.iter() {
            let extras = feasibility.extras_for(package).ok_or_else(|| {
                GenerateError::MissingFeasibility {
                    repository: package.repository_id(),
                }
            })?;
            registrations.push(Registration {
                repository: naming::repository_target(namespace, package)?,
                wheels: vec![package.path().to_path_buf()],
                extras: extras.to_vec(),
            });
        }

        let merged = Registration {
            repository: naming::merged_repository(namespace)?,
            wheels: working_set
                .iter()
                .map(|package| package.path().to_path_buf())
                .collect(),
            extras: Vec::new(),
        };

        let mut libraries = LookupTable::new("dependency");
        let mut file_groups = LookupTable::new("whl dependency");
        for capability in feasibility.capabilities(working_set)? {
            let key = naming::capability_key(capability.package, capability.extra);
            libraries.entries.insert(
                key.clone(),
                naming::library_label(namespace, capability.package, capability.extra)?,
            );
            file_groups.entries.insert(
                key,
                naming::file_group_label(namespace, capability.package, capability.extra)?,
            );
        }

        debug!(
            registrations = registrations.len(),
            capabilities = libraries.len(),
            "declarations assembled"
        );

        Ok(Self {
            registrations,
            merged,
            libraries,
            file_groups,
            merged_library: naming::merged_library_label(namespace)?,
            merged_file_group: naming::merged_file_group_label(namespace)?,
        })
    }

    pub fn requirement(&self, name: &str) -> Result<&Label, GenerateError> {
        self.libraries.lookup(name)
    }

    pub fn whl_requirement(&self, name: &str) -> Result<&Label, GenerateError> {
        self.file_groups.lookup(name)
    }

    pub fn merged_library(&self) -> &Label {
        &self.merged_library
    }

    pub fn merged_file_group(&self) -> &Label {
        &self.merged_file_group
    }
}
