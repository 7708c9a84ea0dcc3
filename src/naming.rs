use std::fmt;

use crate::error::GenerateError;
use crate::model::Package;
use crate::requirement::normalize_name;

const LIBRARY_TARGET: &str = "pkg";
const FILE_GROUP_TARGET: &str = "whl";
const FILE_GROUP_SUFFIX: &str = "_whl";
const MERGED_SUFFIX: &str = "merged";

/// A reference to a target in an external repository: `@repository//:target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label {
    pub repository: String,
    pub target: String,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}//:{}", self.repository, self.target)
    }
}

fn check_namespace(namespace: &str) -> Result<(), GenerateError> {
    if namespace.trim().is_empty() {
        return Err(GenerateError::EmptyNamespace);
    }
    Ok(())
}

pub fn repository_target(namespace: &str, package: &Package) -> Result<String, GenerateError> {
    check_namespace(namespace)?;
    Ok(format!("{namespace}_{}", package.repository_id()))
}

pub fn merged_repository(namespace: &str) -> Result<String, GenerateError> {
    check_namespace(namespace)?;
    Ok(format!("{namespace}_{MERGED_SUFFIX}"))
}

/// Key under which a capability is published in both lookup tables,
/// normalized exactly like the names passed to a lookup.
pub fn capability_key(package: &Package, extra: Option<&str>) -> String {
    match extra {
        Some(extra) => normalize_name(&format!("{}[{}]", package.distribution(), extra.trim())),
        None => normalize_name(package.distribution()),
    }
}

/// Importable-library view of a capability.
pub fn library_label(
    namespace: &str,
    package: &Package,
    extra: Option<&str>,
) -> Result<Label, GenerateError> {
    Ok(Label {
        repository: repository_target(namespace, package)?,
        target: extra.unwrap_or(LIBRARY_TARGET).to_string(),
    })
}

/// Archive-artifact view of a capability.
pub fn file_group_label(
    namespace: &str,
    package: &Package,
    extra: Option<&str>,
) -> Result<Label, GenerateError> {
    Ok(Label {
        repository: repository_target(namespace, package)?,
        target: file_group_target(extra),
    })
}

pub fn merged_library_label(namespace: &str) -> Result<Label, GenerateError> {
    Ok(Label {
        repository: merged_repository(namespace)?,
        target: LIBRARY_TARGET.to_string(),
    })
}

pub fn merged_file_group_label(namespace: &str) -> Result<Label, GenerateError> {
    Ok(Label {
        repository: merged_repository(namespace)?,
        target: FILE_GROUP_TARGET.to_string(),
    })
}

/// Target name of the file group inside an expanded wheel's BUILD file.
pub fn file_group_target(extra: Option<&str>) -> String {
    match extra {
        Some(extra) => format!("{extra}{FILE_GROUP_SUFFIX}"),
        None => FILE_GROUP_TARGET.to_string(),
    }
}

pub fn library_target(extra: Option<&str>) -> String {
    extra.unwrap_or(LIBRARY_TARGET).to_string()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{
        capability_key, file_group_label, library_label, merged_file_group_label,
        merged_library_label, repository_target,
    };
    use crate::error::GenerateError;
    use crate::model::Package;
    use crate::testing::marker_env;

    fn requests() -> Result<Package> {
        Ok(Package::new(
            "/w/Requests-2.19.1-py2.py3-none-any.whl",
            marker_env("3.11"),
        )?)
    }

    #[test]
    fn builds_repository_and_labels() -> Result<()> {
        let package = requests()?;
        assert_eq!(repository_target("pypi", &package)?, "pypi_Requests_2_19_1");
        assert_eq!(
            library_label("pypi", &package, None)?.to_string(),
            "@pypi_Requests_2_19_1//:pkg"
        );
        assert_eq!(
            library_label("pypi", &package, Some("security"))?.to_string(),
            "@pypi_Requests_2_19_1//:security"
        );
        assert_eq!(
            file_group_label("pypi", &package, None)?.to_string(),
            "@pypi_Requests_2_19_1//:whl"
        );
        assert_eq!(
            file_group_label("pypi", &package, Some("security"))?.to_string(),
            "@pypi_Requests_2_19_1//:security_whl"
        );
        assert_eq!(merged_library_label("pypi")?.to_string(), "@pypi_merged//:pkg");
        assert_eq!(merged_file_group_label("pypi")?.to_string(), "@pypi_merged//:whl");
        Ok(())
    }

    #[test]
    fn capability_keys_are_lowercase() -> Result<()> {
        let package = requests()?;
        assert_eq!(capability_key(&package, None), "requests");
        assert_eq!(capability_key(&package, Some("SOCKS")), "requests[socks]");
        assert_eq!(capability_key(&package, Some("Foo-Bar")), "requests[foo_bar]");
        Ok(())
    }

    #[test]
    fn empty_namespace_is_rejected() -> Result<()> {
        let package = requests()?;
        assert!(matches!(
            repository_target("", &package),
            Err(GenerateError::EmptyNamespace)
        ));
        assert!(merged_library_label("  ").is_err());
        Ok(())
    }
}
