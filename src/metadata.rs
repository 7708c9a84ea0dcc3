use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use mailparse::MailHeaderMap;
use pep508_rs::{ExtraName, MarkerEnvironment};
use serde::Deserialize;
use tracing::debug;
use zip::ZipArchive;

use crate::error::GenerateError;
use crate::marker::{extra_name, parse_marker};
use crate::requirement::{Dependency, parse_requirement};

/// Metadata as written by the wheel builder, before markers are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub extras: Vec<String>,
    #[serde(default)]
    pub run_requires: Vec<RunRequirement>,
}

/// A group of requirements. `extra` and `environment` gate the whole group;
/// each entry may carry its own marker as well.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RunRequirement {
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
}

/// One on-disk representation of wheel metadata inside `*.dist-info/`.
pub trait MetadataSource {
    fn file_name(&self) -> &'static str;

    fn parse(&self, content: &str) -> Result<RawMetadata, String>;
}

/// `metadata.json` (PEP 426 style).
pub struct JsonMetadata;

impl MetadataSource for JsonMetadata {
    fn file_name(&self) -> &'static str {
        "metadata.json"
    }

    fn parse(&self, content: &str) -> Result<RawMetadata, String> {
        serde_json::from_str(content).map_err(|err| err.to_string())
    }
}

/// `METADATA` core metadata headers (PEP 314 / 566).
///
/// `Requires-Dist` entries keep their markers, including `extra == ...`
/// clauses; they are sorted into extras when the metadata is resolved.
pub struct PlainMetadata;

impl MetadataSource for PlainMetadata {
    fn file_name(&self) -> &'static str {
        "METADATA"
    }

    fn parse(&self, content: &str) -> Result<RawMetadata, String> {
        let (headers, _) =
            mailparse::parse_headers(content.as_bytes()).map_err(|err| err.to_string())?;

        let name = headers
            .get_first_value("Name")
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| "отсутствует поле Name".to_string())?;

        let extras = headers
            .get_all_values("Provides-Extra")
            .into_iter()
            .map(|extra| extra.trim().to_string())
            .filter(|extra| !extra.is_empty())
            .collect();

        let requires: Vec<String> = headers
            .get_all_values("Requires-Dist")
            .into_iter()
            .map(|requirement| requirement.trim().to_string())
            .filter(|requirement| !requirement.is_empty())
            .collect();

        let run_requires = if requires.is_empty() {
            Vec::new()
        } else {
            vec![RunRequirement {
                requires,
                ..RunRequirement::default()
            }]
        };

        Ok(RawMetadata {
            name: Some(name),
            extras,
            run_requires,
        })
    }
}

fn sources() -> [&'static dyn MetadataSource; 2] {
    [&JsonMetadata, &PlainMetadata]
}

/// Reads the first metadata document present under `dist_info/`.
pub fn read_archive_metadata(path: &Path, dist_info: &str) -> Result<RawMetadata, GenerateError> {
    let unreadable = |reason: String| GenerateError::MetadataUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|err| unreadable(err.to_string()))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|err| unreadable(err.to_string()))?;

    for source in sources() {
        let entry = format!("{dist_info}/{}", source.file_name());
        let Some(index) = archive.index_for_name(&entry) else {
            continue;
        };

        let mut content = String::new();
        archive
            .by_index(index)
            .map_err(|err| unreadable(err.to_string()))?
            .read_to_string(&mut content)
            .map_err(|err| unreadable(format!("{entry}: {err}")))?;

        debug!(wheel = %path.display(), %entry, "reading wheel metadata");
        return source
            .parse(&content)
            .map_err(|reason| unreadable(format!("{entry}: {reason}")));
    }

    Err(unreadable(format!(
        "в {dist_info}/ нет ни metadata.json, ни METADATA"
    )))
}

/// Metadata with environment markers applied, dependencies grouped by the
/// extra that enables them (`None` for unconditional ones).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: Option<String>,
    pub extras: Vec<String>,
    dependencies: BTreeMap<Option<String>, Vec<Dependency>>,
}

impl PackageMetadata {
    pub fn resolve(raw: RawMetadata, env: &MarkerEnvironment) -> Result<Self, GenerateError> {
        let mut extras: Vec<String> = Vec::new();
        for extra in raw.extras {
            if !extras.iter().any(|known| normalize_extra(known) == normalize_extra(&extra)) {
                extras.push(extra);
            }
        }
        let declared: Vec<(String, ExtraName)> = extras
            .iter()
            .filter_map(|extra| extra_name(extra).map(|name| (normalize_extra(extra), name)))
            .collect();

        let mut dependencies: BTreeMap<Option<String>, Vec<Dependency>> = BTreeMap::new();
        for group in raw.run_requires {
            let group_extras: Vec<ExtraName> =
                group.extra.as_deref().and_then(extra_name).into_iter().collect();

            if let Some(marker) = group.environment.as_deref() {
                if !parse_marker(marker)?.evaluate(env, &group_extras) {
                    debug!(marker, "requirement group skipped by environment marker");
                    continue;
                }
            }

            for entry in group.requires.iter().filter(|entry| !entry.trim().is_empty()) {
                let requirement = parse_requirement(entry)?;
                let dependency = Dependency::from_requirement(&requirement);

                if let Some(extra) = group.extra.as_deref() {
                    if requirement.evaluate_markers(env, &group_extras) {
                        dependencies
                            .entry(Some(normalize_extra(extra)))
                            .or_default()
                            .push(dependency);
                    }
                    continue;
                }

                if requirement.evaluate_markers(env, &[]) {
                    dependencies.entry(None).or_default().push(dependency);
                    continue;
                }

                // Not unconditional: file it under every extra that enables it.
                let mut enabled = false;
                for (key, name) in &declared {
                    if requirement.evaluate_markers(env, std::slice::from_ref(name)) {
                        dependencies
                            .entry(Some(key.clone()))
                            .or_default()
                            .push(dependency.clone());
                        enabled = true;
                    }
                }
                if !enabled {
                    debug!(entry = entry.as_str(), "requirement skipped by environment marker");
                }
            }
        }

        Ok(Self {
            name: raw.name,
            extras,
            dependencies,
        })
    }

    pub fn dependencies(&self, extra: Option<&str>) -> &[Dependency] {
        let key = extra.map(normalize_extra);
        self.dependencies
            .get(&key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

pub fn normalize_extra(extra: &str) -> String {
    extra.trim().replace(['-', '.'], "_").to_lowercase()
}
