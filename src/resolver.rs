use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::error::GenerateError;
use crate::metadata::normalize_extra;
use crate::model::{Capability, Package, WorkingSet};
use crate::requirement::normalize_name;

type Node = (String, Option<String>);

/// For every package, the extras that can be satisfied using only the wheels
/// of the working set, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeasibilityResult {
    extras: BTreeMap<String, Vec<String>>,
}

impl FeasibilityResult {
    pub fn extras_for(&self, package: &Package) -> Option<&[String]> {
        self.extras
            .get(&package.repository_id())
            .map(Vec::as_slice)
    }

    /// Every satisfiable capability: each package without extras, then each
    /// of its possible extras.
    pub fn capabilities<'a>(
        &'a self,
        working_set: &'a WorkingSet,
    ) -> Result<Vec<Capability<'a>>, GenerateError> {
        let mut capabilities = Vec::new();
        for package in working_set.iter() {
            let extras = self
                .extras_for(package)
                .ok_or_else(|| GenerateError::MissingFeasibility {
                    repository: package.repository_id(),
                })?;
            capabilities.push(Capability {
                package,
                extra: None,
            });
            capabilities.extend(extras.iter().map(|extra| Capability {
                package,
                extra: Some(extra.as_str()),
            }));
        }
        Ok(capabilities)
    }
}

/// Decides which extras are possible over a closed working set.
///
/// A `(distribution, extra)` node is possible when the distribution is present
/// and every requirement of the extra, with every extra it requests, is
/// possible in turn. Re-entering a node that is still being evaluated counts as
/// impossible.
pub struct ExtrasResolver<'a> {
    working_set: &'a WorkingSet,
    in_progress: HashSet<Node>,
    resolved: HashMap<Node, bool>,
}

impl<'a> ExtrasResolver<'a> {
    pub fn new(working_set: &'a WorkingSet) -> Self {
        Self {
            working_set,
            in_progress: HashSet::new(),
            resolved: HashMap::new(),
        }
    }

    pub fn resolve(working_set: &'a WorkingSet) -> Result<FeasibilityResult, GenerateError> {
        let mut resolver = Self::new(working_set);
        let mut extras = BTreeMap::new();

        for package in working_set.iter() {
            let mut possible = Vec::new();
            for extra in package.extras()? {
                if resolver.is_possible(package.distribution(), Some(extra))? {
                    possible.push(extra.clone());
                } else {
                    debug!(
                        package = package.distribution(),
                        extra = extra.as_str(),
                        "extra is not satisfiable from the working set"
                    );
                }
            }
            extras.insert(package.repository_id(), possible);
        }

        Ok(FeasibilityResult { extras })
    }

    pub fn is_possible(&mut self, name: &str, extra: Option<&str>) -> Result<bool, GenerateError> {
        let Some(package) = self.working_set.get(name) else {
            trace!(name, "distribution is not in the working set");
            return Ok(false);
        };
        let Some(extra) = extra else {
            return Ok(true);
        };

        let node = (normalize_name(name), Some(normalize_extra(extra)));
        if let Some(&known) = self.resolved.get(&node) {
            return Ok(known);
        }
        if !self.in_progress.insert(node.clone()) {
            trace!(name, extra, "cyclic extra requirement");
            return Ok(false);
        }

        let result = self.requirements_possible(package, extra);
        self.in_progress.remove(&node);

        // Requirements are conjunctive: a node that reached the active path
        // sits on a cycle itself, so caching a negative answer is sound.
        let possible = result?;
        self.resolved.insert(node, possible);
        Ok(possible)
    }

    fn requirements_possible(&mut self, package: &Package, extra: &str) -> Result<bool, GenerateError> {
        for dependency in package.dependencies(Some(extra))? {
            if !self.is_possible(&dependency.name, None)? {
                return Ok(false);
            }
            for requested in &dependency.extras {
                if !self.is_possible(&dependency.name, Some(requested))? {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::{ExtrasResolver, FeasibilityResult};
    use crate::metadata::{PackageMetadata, RawMetadata, RunRequirement};
    use crate::model::{Capability, Package, WorkingSet};
    use crate::testing::marker_env;

    fn package(dist: &str, extras: &[&str], requires: &[(Option<&str>, &str)]) -> Result<Package> {
        let env = marker_env("3.11");
        let raw = RawMetadata {
            name: Some(dist.to_string()),
            extras: extras.iter().map(|extra| extra.to_string()).collect(),
            run_requires: requires
                .iter()
                .map(|(extra, requirement)| RunRequirement {
                    extra: extra.map(str::to_string),
                    environment: None,
                    requires: vec![requirement.to_string()],
                })
                .collect(),
        };
        let metadata = PackageMetadata::resolve(raw, &env)?;
        Ok(Package::with_metadata(
            format!("/wheels/{dist}-1.0-py3-none-any.whl"),
            env,
            metadata,
        )?)
    }

    fn extras_of(result: &FeasibilityResult, set: &WorkingSet, dist: &str) -> Vec<String> {
        set.get(dist)
            .and_then(|package| result.extras_for(package))
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    #[test]
    fn extra_with_present_dependency_is_possible() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("a", &[], &[])?,
            package("b", &["x"], &[(Some("x"), "a (>=1.0)")])?,
        ])?;
        let result = ExtrasResolver::resolve(&set)?;
        assert_eq!(extras_of(&result, &set, "b"), ["x"]);
        assert!(extras_of(&result, &set, "a").is_empty());
        Ok(())
    }

    #[test]
    fn extra_with_missing_dependency_is_impossible() -> Result<()> {
        let set = WorkingSet::new(vec![package("b", &["x"], &[(Some("x"), "c")])?])?;
        let result = ExtrasResolver::resolve(&set)?;
        assert!(extras_of(&result, &set, "b").is_empty());
        Ok(())
    }

    #[test]
    fn nested_extra_must_itself_be_possible() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("a", &["y"], &[(Some("y"), "missing")])?,
            package("b", &["x", "z"], &[(Some("x"), "a[y]"), (Some("z"), "A")])?,
        ])?;
        let result = ExtrasResolver::resolve(&set)?;
        assert!(extras_of(&result, &set, "a").is_empty());
        assert_eq!(extras_of(&result, &set, "b"), ["z"]);
        Ok(())
    }

    #[test]
    fn mutual_extra_cycle_is_impossible() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("a", &["y"], &[(Some("y"), "b[z]")])?,
            package("b", &["z"], &[(Some("z"), "a[y]")])?,
        ])?;
        let result = ExtrasResolver::resolve(&set)?;
        assert!(extras_of(&result, &set, "a").is_empty());
        assert!(extras_of(&result, &set, "b").is_empty());
        Ok(())
    }

    #[test]
    fn self_referential_extra_is_impossible() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("p", &["e", "ok"], &[(Some("e"), "p[e]"), (Some("ok"), "p")])?,
            package("q", &["t"], &[(Some("t"), "r[u]")])?,
            package("r", &["u"], &[(Some("u"), "q[t]")])?,
        ])?;
        let mut resolver = ExtrasResolver::new(&set);
        assert!(!resolver.is_possible("p", Some("e"))?);
        assert!(resolver.is_possible("p", Some("ok"))?);
        assert!(!resolver.is_possible("q", Some("t"))?);
        assert!(!resolver.is_possible("r", Some("u"))?);
        Ok(())
    }

    #[test]
    fn absent_and_unconditional_queries() -> Result<()> {
        let set = WorkingSet::new(vec![package("Google_Cloud", &[], &[])?])?;
        let mut resolver = ExtrasResolver::new(&set);
        assert!(resolver.is_possible("google-cloud", None)?);
        assert!(!resolver.is_possible("nope", None)?);
        assert!(!resolver.is_possible("nope", Some("x"))?);
        assert!(resolver.is_possible("google-cloud", Some("undeclared"))?);
        Ok(())
    }

    #[test]
    fn keeps_declaration_order() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("dep", &[], &[])?,
            package(
                "pkg",
                &["zeta", "alpha", "broken", "mid"],
                &[(Some("broken"), "absent"), (Some("mid"), "dep")],
            )?,
        ])?;
        let result = ExtrasResolver::resolve(&set)?;
        assert_eq!(extras_of(&result, &set, "pkg"), ["zeta", "alpha", "mid"]);
        Ok(())
    }

    #[test]
    fn removing_a_wheel_never_enables_an_extra() -> Result<()> {
        let build = |with_c: bool| -> Result<WorkingSet> {
            let mut packages = vec![
                package("a", &["x", "y"], &[(Some("x"), "b[w]"), (Some("y"), "c")])?,
                package("b", &["w"], &[(Some("w"), "c")])?,
            ];
            if with_c {
                packages.push(package("c", &[], &[])?);
            }
            Ok(WorkingSet::new(packages)?)
        };

        let full = build(true)?;
        let reduced = build(false)?;
        let full_result = ExtrasResolver::resolve(&full)?;
        let reduced_result = ExtrasResolver::resolve(&reduced)?;

        assert_eq!(extras_of(&full_result, &full, "a"), ["x", "y"]);
        for dist in ["a", "b"] {
            let before = extras_of(&full_result, &full, dist);
            for extra in extras_of(&reduced_result, &reduced, dist) {
                assert!(before.contains(&extra));
            }
        }
        assert!(extras_of(&reduced_result, &reduced, "a").is_empty());
        Ok(())
    }

    #[test]
    fn resolution_is_idempotent() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("a", &["y"], &[(Some("y"), "b[z]")])?,
            package("b", &["z", "w"], &[(Some("z"), "a[y]"), (Some("w"), "a")])?,
        ])?;
        let first = ExtrasResolver::resolve(&set)?;
        let second = ExtrasResolver::resolve(&set)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn lists_capabilities_per_possible_extra() -> Result<()> {
        let set = WorkingSet::new(vec![
            package("a", &[], &[])?,
            package("b", &["x", "gone"], &[(Some("x"), "a"), (Some("gone"), "nothing")])?,
        ])?;
        let result = ExtrasResolver::resolve(&set)?;
        let capabilities = result.capabilities(&set)?;
        let keys: Vec<(String, Option<&str>)> = capabilities
            .iter()
            .map(|Capability { package, extra }| (package.distribution().to_string(), *extra))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("a".to_string(), None),
                ("b".to_string(), None),
                ("b".to_string(), Some("x")),
            ]
        );
        Ok(())
    }
}
