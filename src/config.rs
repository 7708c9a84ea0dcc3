use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::marker::Environment;

pub const PYTHON_VERSION_ENV: &str = "PIP_BZL_PYTHON_VERSION";
pub const DEFAULT_PYTHON_VERSION: &str = "3.11";

const INTERPRETER_SCRIPT: &str = r#"import json, os, platform, sys
def fmt(info):
    version = "{0.major}.{0.minor}.{0.micro}".format(info)
    if info.releaselevel != "final":
        version += info.releaselevel[0] + str(info.serial)
    return version
impl = getattr(sys, "implementation", None)
print(json.dumps({
    "implementation_name": impl.name if impl else "cpython",
    "implementation_version": fmt(impl.version) if impl else platform.python_version(),
    "os_name": os.name,
    "platform_machine": platform.machine(),
    "platform_python_implementation": platform.python_implementation(),
    "platform_release": platform.release(),
    "platform_system": platform.system(),
    "platform_version": platform.version(),
    "python_full_version": platform.python_version(),
    "python_version": ".".join(platform.python_version_tuple()[:2]),
    "sys_platform": sys.platform,
}))
"#;

/// Where the marker environment comes from, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentOptions {
    pub file: Option<PathBuf>,
    pub python: Option<String>,
    pub python_version: Option<String>,
}

pub fn resolve_environment(options: &EnvironmentOptions) -> Result<Environment> {
    if let Some(path) = &options.file {
        info!(path = %path.display(), "marker environment loaded from file");
        return load_environment(path);
    }

    if let Some(python) = &options.python {
        info!(python = python.as_str(), "probing interpreter for marker environment");
        return query_interpreter(python);
    }

    let version = match &options.python_version {
        Some(version) if !version.trim().is_empty() => version.clone(),
        _ => env::var(PYTHON_VERSION_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PYTHON_VERSION.to_string()),
    };
    debug!(version = version.as_str(), "using host marker environment");
    Ok(Environment::host(&version))
}

pub fn load_environment(path: &Path) -> Result<Environment> {
    let payload = fs::read_to_string(path)
        .with_context(|| format!("Не удалось прочитать {}", path.display()))?;
    serde_json::from_str(&payload)
        .with_context(|| format!("Повреждено описание окружения {}", path.display()))
}

pub fn save_environment(path: &Path, environment: &Environment) -> Result<()> {
    let payload = serde_json::to_string_pretty(environment)
        .context("Не удалось сериализовать описание окружения")?;
    fs::write(path, payload).with_context(|| format!("Не удалось записать {}", path.display()))
}

pub fn query_interpreter(python: &str) -> Result<Environment> {
    let output = Command::new(python)
        .arg("-c")
        .arg(INTERPRETER_SCRIPT)
        .output()
        .with_context(|| format!("Не удалось запустить {python}"))?;

    if !output.status.success() {
        return Err(anyhow!(
            "{} завершился с кодом {:?}: {}",
            python,
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .with_context(|| format!("{python} вернул некорректное описание окружения"))
}
