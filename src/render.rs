use crate::declarations::{Declarations, LookupTable, Registration};
use crate::naming;

pub const WHL_LIBRARY_RULE: &str = "whl_library";
pub const WHL3_LIBRARY_RULE: &str = "whl3_library";

const RULES_LOAD: &str = "@io_bazel_rules_python//python:whl.bzl";

/// Renders `requirements.bzl` for the given declarations.
///
/// `namespace` is the repository holding the wheels and this file, `input`
/// names the requirements file the wheels were produced from.
pub fn requirements_bzl(
    declarations: &Declarations,
    namespace: &str,
    input: &str,
    rule: &str,
) -> String {
    let mut out = String::new();
    out.push_str("# Install pip requirements.\n#\n");
    out.push_str(&format!("# Generated from {input}\n\n"));
    out.push_str(&format!("load(\"{RULES_LOAD}\", \"{rule}\")\n\n"));

    out.push_str("def pip_install():\n");
    if declarations.registrations.is_empty() {
        out.push_str("    pass\n");
    } else {
        for registration in &declarations.registrations {
            out.push_str(&registration_rule(registration, namespace, rule));
        }
        out.push_str(&registration_rule(&declarations.merged, namespace, rule));
    }
    out.push('\n');

    out.push_str(&table("_requirements", &declarations.libraries));
    out.push_str(&table("_whl_requirements", &declarations.file_groups));

    out.push_str(&format!(
        "_merged_py_library = \"{}\"\n",
        declarations.merged_library()
    ));
    out.push_str(&format!(
        "_merged_whl_filegroup = \"{}\"\n\n",
        declarations.merged_file_group()
    ));

    out.push_str(
        r#"def pypi_requirements():
    return _merged_py_library

def pypi_whl_requirements():
    return _merged_whl_filegroup

def pypi_whl_requirement(name):
    name_key = _make_name_key(name)
    if name_key not in _whl_requirements:
        fail("Could not find pip-provided whl dependency: '%s'; available: %s" % (name, sorted(_whl_requirements.keys())))
    return _whl_requirements[name_key]

def requirement(name):
    name_key = _make_name_key(name)
    if name_key not in _requirements:
        fail("Could not find pip-provided dependency: '%s'; available: %s" % (name, sorted(_requirements.keys())))
    return _requirements[name_key]

def _make_name_key(name):
    name_key = name.replace("-", "_").lower()
    return name_key
"#,
    );

    out
}

fn registration_rule(registration: &Registration, namespace: &str, rule: &str) -> String {
    let whls = registration
        .wheels
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| format!("\"@{namespace}//:{}\"", name.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "    if \"{repo}\" not in native.existing_rules():\n        {rule}(\n            name = \"{repo}\",\n            whls = [{whls}],\n            requirements = \"@{namespace}//:requirements.bzl\",\n            extras = [{extras}],\n        )\n",
        repo = registration.repository,
        extras = quote_all(&registration.extras),
    )
}

fn table(name: &str, table: &LookupTable) -> String {
    let mut out = format!("{name} = {{\n");
    for (key, label) in table.entries() {
        out.push_str(&format!("    \"{key}\": \"{label}\",\n"));
    }
    out.push_str("}\n\n");
    out
}

fn quote_all(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// An extra for which an expanded wheel gets its own library and file group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraTargets {
    pub extra: String,
    pub dependencies: Vec<String>,
}

/// Renders the BUILD file placed next to an expanded wheel's contents.
///
/// `requirements` is the label of the generated `requirements.bzl`; without
/// it the dependency helpers are not loaded and dependency lists stay empty.
pub fn build_file(
    requirements: Option<&str>,
    dependencies: &[String],
    extras: &[ExtraTargets],
) -> String {
    let requirement = |dep: &String| format!("requirement(\"{dep}\")");
    let whl_requirement = |dep: &String| format!("pypi_whl_requirement(\"{dep}\")");
    let track = requirements.is_some();

    let mut out = String::new();
    if let Some(requirements) = requirements {
        out.push_str(&format!(
            "load(\"{requirements}\", \"requirement\", \"pypi_whl_requirement\")\n\n"
        ));
    }
    out.push_str("package(default_visibility = [\"//visibility:public\"])\n\n");

    let deps = if track {
        dependencies.iter().map(requirement).collect::<Vec<_>>()
    } else {
        Vec::new()
    };
    let whl_deps = if track {
        dependencies.iter().map(whl_requirement).collect::<Vec<_>>()
    } else {
        Vec::new()
    };

    out.push_str(&format!(
        r#"py_library(
    name = "{pkg}",
    srcs = glob(["**/*.py"]),
    data = glob(["**/*"], exclude = ["**/*.py", "**/* *", "BUILD", "WORKSPACE", "**/*.whl"]),
    # This makes this directory a top-level in the python import
    # search path for anything that depends on this.
    imports = ["."],
    deps = [{deps}],
)

filegroup(
    name = "{whl}",
    srcs = glob(["**/*.whl"]) + [{whl_deps}],
)
"#,
        pkg = naming::library_target(None),
        whl = naming::file_group_target(None),
        deps = deps.join(", "),
        whl_deps = whl_deps.join(", "),
    ));

    for extra in extras {
        let mut deps = vec![format!("\":{}\"", naming::library_target(None))];
        let mut whl_deps = vec![format!("\":{}\"", naming::file_group_target(None))];
        if track {
            deps.extend(extra.dependencies.iter().map(requirement));
            whl_deps.extend(extra.dependencies.iter().map(whl_requirement));
        }

        out.push_str(&format!(
            "\npy_library(\n    name = \"{name}\",\n    deps = [\n        {deps},\n    ],\n)\n",
            name = naming::library_target(Some(&extra.extra)),
            deps = deps.join(",\n        "),
        ));
        out.push_str(&format!(
            "\nfilegroup(\n    name = \"{name}\",\n    srcs = [\n        {srcs},\n    ],\n)\n",
            name = naming::file_group_target(Some(&extra.extra)),
            srcs = whl_deps.join(",\n        "),
        ));
    }

    out
}
