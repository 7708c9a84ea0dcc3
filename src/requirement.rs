use std::fmt;
use std::str::FromStr;

use pep508_rs::Requirement;

use crate::error::GenerateError;

/// A dependency reduced to what the extras resolver reasons about: which
/// distribution is required and which of its extras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub extras: Vec<String>,
}

impl Dependency {
    pub fn from_requirement(requirement: &Requirement) -> Self {
        Self {
            name: requirement.name.to_string(),
            extras: requirement.extras.iter().map(ToString::to_string).collect(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extras.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.extras.join(","))
        }
    }
}

pub fn parse_requirement(entry: &str) -> Result<Requirement, GenerateError> {
    Requirement::from_str(entry.trim()).map_err(|err| GenerateError::InvalidRequirement {
        requirement: entry.to_string(),
        reason: err.to_string(),
    })
}

/// Lookup key for a distribution name: case-folded, `-` mapped to `_`.
pub fn normalize_name(name: &str) -> String {
    name.trim().replace('-', "_").to_lowercase()
}
