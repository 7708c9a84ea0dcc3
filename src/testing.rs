use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use pep508_rs::MarkerEnvironment;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::marker::Environment;
use crate::requirement::Dependency;

/// Marker environment of the host for the given Python version.
pub fn marker_env(python_version: &str) -> Arc<MarkerEnvironment> {
    Arc::new(
        Environment::host(python_version)
            .marker_environment()
            .expect("окружение хоста должно разбираться"),
    )
}

/// Renders dependencies the way they appear in generated files.
pub fn names(dependencies: &[Dependency]) -> Vec<String> {
    dependencies.iter().map(ToString::to_string).collect()
}

/// Writes a zip archive named `file_name` into `dir` with the given entries.
pub fn write_wheel(dir: &Path, file_name: &str, entries: &[(&str, &str)]) -> Result<PathBuf> {
    let path = dir.join(file_name);
    let file =
        File::create(&path).with_context(|| format!("Не удалось создать {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default())?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;
    Ok(path)
}

/// Builds a `metadata.json` document for a synthetic wheel.
///
/// `requires` lists `(extra, requirement)` pairs; `None` means unconditional.
pub fn metadata_json(name: &str, extras: &[&str], requires: &[(Option<&str>, &str)]) -> String {
    let run_requires: Vec<serde_json::Value> = requires
        .iter()
        .map(|(extra, requirement)| match extra {
            Some(extra) => serde_json::json!({"extra": extra, "requires": [requirement]}),
            None => serde_json::json!({"requires": [requirement]}),
        })
        .collect();
    serde_json::json!({
        "name": name,
        "extras": extras,
        "run_requires": run_requires,
    })
    .to_string()
}

/// Writes `{dist}-{version}-py3-none-any.whl` carrying a `metadata.json`.
pub fn write_json_wheel(
    dir: &Path,
    dist: &str,
    version: &str,
    extras: &[&str],
    requires: &[(Option<&str>, &str)],
) -> Result<PathBuf> {
    let metadata = metadata_json(dist, extras, requires);
    let entry = format!("{dist}-{version}.dist-info/metadata.json");
    let module = format!("{}/__init__.py", dist.to_lowercase());
    write_wheel(
        dir,
        &format!("{dist}-{version}-py3-none-any.whl"),
        &[(entry.as_str(), metadata.as_str()), (module.as_str(), "")],
    )
}
