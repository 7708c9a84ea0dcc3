use std::str::FromStr;

use pep440_rs::Version;
use pep508_rs::{ExtraName, MarkerEnvironment, MarkerTree};
use serde::{Deserialize, Serialize};

use crate::error::GenerateError;

const DEFAULT_IMPLEMENTATION: &str = "cpython";

/// Interpreter and platform facts that environment markers are evaluated against.
///
/// Field names follow PEP 508, so the same JSON is accepted by
/// [`MarkerEnvironment`] and printed by the interpreter query in `config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub implementation_name: String,
    pub implementation_version: String,
    pub os_name: String,
    pub platform_machine: String,
    pub platform_python_implementation: String,
    pub platform_release: String,
    pub platform_system: String,
    pub platform_version: String,
    pub python_full_version: String,
    pub python_version: String,
    pub sys_platform: String,
}

impl Environment {
    /// Describes the machine the generator runs on, for the given Python version.
    pub fn host(python_version: &str) -> Self {
        let (os_name, sys_platform, platform_system) = match std::env::consts::OS {
            "windows" => ("nt", "win32", "Windows"),
            "macos" => ("posix", "darwin", "Darwin"),
            "linux" => ("posix", "linux", "Linux"),
            other => ("posix", other, other),
        };
        let platform_machine = match (std::env::consts::OS, std::env::consts::ARCH) {
            ("macos", "aarch64") => "arm64",
            ("windows", "x86_64") => "AMD64",
            (_, arch) => arch,
        };

        let segments: Vec<&str> = python_version.trim().split('.').collect();
        let short = segments
            .iter()
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        let full = if segments.len() >= 3 {
            python_version.trim().to_string()
        } else if segments.len() == 2 {
            format!("{short}.0")
        } else {
            format!("{short}.0.0")
        };

        Self {
            implementation_name: DEFAULT_IMPLEMENTATION.to_string(),
            implementation_version: full.clone(),
            os_name: os_name.to_string(),
            platform_machine: platform_machine.to_string(),
            platform_python_implementation: "CPython".to_string(),
            platform_release: String::new(),
            platform_system: platform_system.to_string(),
            platform_version: String::new(),
            python_full_version: full,
            python_version: short,
            sys_platform: sys_platform.to_string(),
        }
    }

    pub fn is_python3(&self) -> bool {
        Version::from_str(self.python_version.trim())
            .ok()
            .and_then(|version| version.release().first().copied())
            .is_some_and(|major| major >= 3)
    }

    /// Converts to the typed environment used for marker evaluation.
    ///
    /// Fails when one of the version fields is not a PEP 440 version.
    pub fn marker_environment(&self) -> Result<MarkerEnvironment, GenerateError> {
        let invalid = |reason: String| GenerateError::InvalidEnvironment { reason };
        let value = serde_json::to_value(self).map_err(|err| invalid(err.to_string()))?;
        serde_json::from_value(value).map_err(|err| invalid(err.to_string()))
    }
}

pub fn parse_marker(marker: &str) -> Result<MarkerTree, GenerateError> {
    MarkerTree::from_str(marker).map_err(|err| GenerateError::InvalidMarker {
        marker: marker.to_string(),
        reason: err.to_string(),
    })
}

/// Extra name in the form markers compare against; `None` for names PEP 685 rejects.
pub fn extra_name(extra: &str) -> Option<ExtraName> {
    ExtraName::from_str(extra.trim()).ok()
}
