use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use pep508_rs::MarkerEnvironment;
use tracing::{debug, info, warn};

use crate::config::{self, EnvironmentOptions};
use crate::declarations::Declarations;
use crate::files;
use crate::model::{Package, WorkingSet};
use crate::render::{self, ExtraTargets, WHL_LIBRARY_RULE, WHL3_LIBRARY_RULE};
use crate::requirement::Dependency;
use crate::resolver::ExtrasResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    Generate {
        name: String,
        input: Option<String>,
        output: PathBuf,
        directory: Option<PathBuf>,
        wheels: Vec<PathBuf>,
    },
    Expand {
        wheels: Vec<PathBuf>,
        directory: PathBuf,
        requirements: Option<String>,
        extras: Vec<String>,
        track_deps: bool,
    },
    Query {
        name: String,
        directory: Option<PathBuf>,
        wheels: Vec<PathBuf>,
        requirement: String,
        files: bool,
    },
    Environment {
        output: Option<PathBuf>,
    },
}

pub fn run(options: &EnvironmentOptions, command: CliCommand, out: &mut dyn Write) -> Result<()> {
    let environment = config::resolve_environment(options)?;
    let markers = Arc::new(environment.marker_environment()?);

    match command {
        CliCommand::Generate {
            name,
            input,
            output,
            directory,
            wheels,
        } => {
            let paths = collect_wheels(directory.as_deref(), wheels)?;
            let declarations = declare(&name, &paths, markers)?;

            let rule = if environment.is_python3() {
                WHL3_LIBRARY_RULE
            } else {
                WHL_LIBRARY_RULE
            };
            let input = input.unwrap_or_else(|| "requirements.txt".to_string());
            let content = render::requirements_bzl(&declarations, &name, &input, rule);

            files::write_atomic(&output, &content)?;
            info!(
                output = %output.display(),
                packages = declarations.registrations.len(),
                "requirements file written"
            );
        }
        CliCommand::Expand {
            wheels,
            directory,
            requirements,
            extras,
            track_deps,
        } => expand(&wheels, &directory, requirements.as_deref(), &extras, track_deps, markers)?,
        CliCommand::Query {
            name,
            directory,
            wheels,
            requirement,
            files,
        } => {
            let paths = collect_wheels(directory.as_deref(), wheels)?;
            let declarations = declare(&name, &paths, markers)?;
            let label = if files {
                declarations.whl_requirement(&requirement)?
            } else {
                declarations.requirement(&requirement)?
            };
            writeln!(out, "{label}")?;
        }
        CliCommand::Environment { output } => match output {
            Some(path) => config::save_environment(&path, &environment)?,
            None => {
                let payload = serde_json::to_string_pretty(&environment)
                    .context("Не удалось сериализовать описание окружения")?;
                writeln!(out, "{payload}")?;
            }
        },
    }

    Ok(())
}

fn collect_wheels(directory: Option<&Path>, explicit: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut paths = match directory {
        Some(directory) => files::list_wheels(directory)?,
        None => Vec::new(),
    };
    let mut seen = paths
        .iter()
        .map(|path| files::canonical(path))
        .collect::<Result<Vec<_>>>()?;
    for path in explicit {
        if !path.is_file() {
            return Err(anyhow!("Не найден wheel-файл {}", path.display()));
        }
        let canonical = files::canonical(&path)?;
        if !seen.contains(&canonical) {
            seen.push(canonical);
            paths.push(path);
        }
    }

    if paths.is_empty() && directory.is_none() {
        return Err(anyhow!(
            "Не указаны wheel-файлы. Используйте --directory или --whl"
        ));
    }
    Ok(paths)
}

fn declare(namespace: &str, paths: &[PathBuf], markers: Arc<MarkerEnvironment>) -> Result<Declarations> {
    let progress = progress_bar(paths.len());
    let working_set = WorkingSet::load(paths, markers, &progress);
    progress.finish_and_clear();
    let working_set = working_set?;
    if working_set.is_empty() {
        warn!(namespace, "no wheels found, declarations will be empty");
    }

    let feasibility = ExtrasResolver::resolve(&working_set)?;
    Ok(Declarations::build(namespace, &working_set, &feasibility)?)
}

fn progress_bar(len: usize) -> ProgressBar {
    let progress = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner} чтение метаданных {pos}/{len} {wide_bar}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress
}

fn expand(
    wheels: &[PathBuf],
    directory: &Path,
    requirements: Option<&str>,
    extras: &[String],
    track_deps: bool,
    markers: Arc<MarkerEnvironment>,
) -> Result<()> {
    if wheels.is_empty() {
        return Err(anyhow!("Не указаны wheel-файлы для распаковки"));
    }

    let mut dependencies: Vec<String> = Vec::new();
    let mut extra_targets: Vec<ExtraTargets> = extras
        .iter()
        .map(|extra| ExtraTargets {
            extra: extra.clone(),
            dependencies: Vec::new(),
        })
        .collect();

    for wheel in wheels {
        let package = Package::new(wheel.clone(), Arc::clone(&markers))?;
        files::extract_wheel(wheel, directory)?;
        files::copy_into(wheel, directory)?;

        if track_deps {
            debug!(package = package.name()?, "collecting dependencies");
            push_unique(&mut dependencies, package.dependencies(None)?);
            for target in &mut extra_targets {
                push_unique(&mut target.dependencies, package.dependencies(Some(&target.extra))?);
            }
        }
        info!(
            wheel = package.file_name(),
            version = package.version(),
            directory = %directory.display(),
            "wheel expanded"
        );
    }

    let content = render::build_file(requirements, &dependencies, &extra_targets);
    files::write_atomic(&directory.join(files::BUILD_FILE), &content)
}

fn push_unique(target: &mut Vec<String>, dependencies: &[Dependency]) {
    for dependency in dependencies {
        let name = dependency.to_string();
        if !target.contains(&name) {
            target.push(name);
        }
    }
}
