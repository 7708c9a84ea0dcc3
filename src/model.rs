use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, info};

use pep508_rs::MarkerEnvironment;

use crate::error::GenerateError;
use crate::metadata::{self, PackageMetadata};
use crate::requirement::{Dependency, normalize_name};

/// One wheel archive. Name, version and repository id come from the file name;
/// metadata is read from the archive on first use and kept for the lifetime of
/// the value.
#[derive(Debug)]
pub struct Package {
    path: PathBuf,
    distribution: String,
    version: String,
    environment: Arc<MarkerEnvironment>,
    metadata: OnceLock<Result<PackageMetadata, GenerateError>>,
}

impl Package {
    pub fn new(path: impl Into<PathBuf>, environment: Arc<MarkerEnvironment>) -> Result<Self, GenerateError> {
        let path = path.into();
        let malformed = || GenerateError::MalformedPackageName { path: path.clone() };

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(malformed)?;
        let stem = file_name.strip_suffix(".whl").unwrap_or(&file_name);

        // https://peps.python.org/pep-0427/#file-name-convention
        let mut parts = stem.split('-');
        let (Some(distribution), Some(version)) = (parts.next(), parts.next()) else {
            return Err(malformed());
        };
        if distribution.is_empty() || version.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            distribution: distribution.to_string(),
            version: version.to_string(),
            path,
            environment,
            metadata: OnceLock::new(),
        })
    }

    #[cfg(test)]
    pub fn with_metadata(
        path: impl Into<PathBuf>,
        environment: Arc<MarkerEnvironment>,
        metadata: PackageMetadata,
    ) -> Result<Self, GenerateError> {
        let package = Self::new(path, environment)?;
        let _ = package.metadata.set(Ok(metadata));
        Ok(package)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.distribution)
    }

    pub fn repository_id(&self) -> String {
        format!("{}_{}", self.distribution, self.version).replace(['.', '-'], "_")
    }

    fn dist_info(&self) -> String {
        format!("{}-{}.dist-info", self.distribution, self.version)
    }

    /// Reads the archive on the first call. Every later call, concurrent ones
    /// included, shares that single result, failures too.
    pub fn metadata(&self) -> Result<&PackageMetadata, GenerateError> {
        self.metadata
            .get_or_init(|| {
                let raw = metadata::read_archive_metadata(&self.path, &self.dist_info())?;
                PackageMetadata::resolve(raw, &self.environment)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Display name from the metadata, falling back to the file name's distribution.
    pub fn name(&self) -> Result<&str, GenerateError> {
        Ok(self
            .metadata()?
            .name
            .as_deref()
            .unwrap_or(&self.distribution))
    }

    pub fn extras(&self) -> Result<&[String], GenerateError> {
        Ok(&self.metadata()?.extras)
    }

    pub fn dependencies(&self, extra: Option<&str>) -> Result<&[Dependency], GenerateError> {
        Ok(self.metadata()?.dependencies(extra))
    }
}

/// Something downstream targets can depend on: a package, optionally with one extra.
#[derive(Debug, Clone, Copy)]
pub struct Capability<'a> {
    pub package: &'a Package,
    pub extra: Option<&'a str>,
}

impl PartialEq for Capability<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.package.repository_id() == other.package.repository_id() && self.extra == other.extra
    }
}

impl Eq for Capability<'_> {}

/// The closed set of wheels available to one generation run.
#[derive(Debug)]
pub struct WorkingSet {
    packages: Vec<Package>,
    by_name: HashMap<String, usize>,
}

impl WorkingSet {
    pub fn new(mut packages: Vec<Package>) -> Result<Self, GenerateError> {
        packages.sort_by(|a, b| a.path().cmp(b.path()));

        let mut ids: HashMap<String, usize> = HashMap::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        for (index, package) in packages.iter().enumerate() {
            if let Some(&previous) = ids.get(&package.repository_id()) {
                return Err(GenerateError::DuplicateRepositoryIdentifier {
                    id: package.repository_id(),
                    first: packages[previous].path().to_path_buf(),
                    second: package.path().to_path_buf(),
                });
            }
            if let Some(&previous) = by_name.get(&package.normalized_name()) {
                return Err(GenerateError::DuplicateDistribution {
                    name: package.normalized_name(),
                    first: packages[previous].path().to_path_buf(),
                    second: package.path().to_path_buf(),
                });
            }
            ids.insert(package.repository_id(), index);
            by_name.insert(package.normalized_name(), index);
        }

        Ok(Self { packages, by_name })
    }

    /// Builds the set from wheel paths and reads every archive's metadata,
    /// one worker per package. Fails on the first unreadable wheel.
    pub fn load(
        paths: &[PathBuf],
        environment: Arc<MarkerEnvironment>,
        progress: &ProgressBar,
    ) -> Result<Self, GenerateError> {
        let packages = paths
            .iter()
            .map(|path| Package::new(path.clone(), Arc::clone(&environment)))
            .collect::<Result<Vec<_>, _>>()?;
        let working_set = Self::new(packages)?;

        progress.set_length(working_set.len() as u64);
        working_set.packages.par_iter().try_for_each(|package| {
            package.metadata()?;
            debug!(package = package.distribution(), "metadata loaded");
            progress.inc(1);
            Ok::<(), GenerateError>(())
        })?;

        info!(packages = working_set.len(), "working set loaded");
        Ok(working_set)
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.by_name
            .get(&normalize_name(name))
            .map(|&index| &self.packages[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
