// tests/task_tree.rs

use std::error::Error;
use std::io::Write;

use tempfile::NamedTempFile;
use tyche::config::{StepDefinition, load_and_validate, parse_str};
use tyche::errors::TycheError;
use tyche::task::{ROOT_TASK_NAME, TaskTree};
use tyche_test_utils::{ConfigFileBuilder, TaskDefinitionBuilder, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

const BUILD_CONFIG: &str = r#"
[config]
default_tool = "native"

[[tasks]]
name = "build"
description = "Build everything"
tasks = [
    "dependencies",
    { name = "build-cli", exec.native.command = ["cargo", "build"] },
]

[[tasks]]
name = "dependencies"
skips = { path_exists = "node_modules", files_not_changed = ["package.json"] }
exec.native = { command = ["npm", "install"], working = "web" }
"#;

#[test]
fn toml_config_builds_a_tree_with_sibling_reference() -> TestResult {
    init_tracing();

    let cfg = parse_str(BUILD_CONFIG)?;
    let cfg = tyche::config::ConfigFile::try_from(cfg)?;
    let tree = TaskTree::from_config(&cfg)?;

    assert_eq!(tree.name(tree.root()), ROOT_TASK_NAME);
    assert_eq!(tree.child_names(tree.root()), vec!["build", "dependencies"]);

    let build = tree.require("build")?;
    assert_eq!(tree.child_names(build), vec!["dependencies", "build-cli"]);
    assert_eq!(tree.task(build).description.as_deref(), Some("Build everything"));

    let deps = tree.require("dependencies")?;
    let task = tree.task(deps);
    assert_eq!(task.skips.path_exists.len(), 1);
    assert_eq!(task.skips.files_not_changed.len(), 1);
    let step = &task.exec.as_ref().ok_or("missing exec")?["native"];
    assert_eq!(step.command, vec!["npm", "install"]);

    // The shared task is resolved once.
    let order = tree.resolve(tree.root(), None)?;
    let names: Vec<&str> = order.iter().map(|&id| tree.name(id)).collect();
    assert_eq!(names, vec!["dependencies", "build-cli", "build", ROOT_TASK_NAME]);
    Ok(())
}

#[test]
fn dependencies_resolve_against_ancestors_and_other_branches() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .with_task(
            TaskDefinitionBuilder::new("release")
                .child(
                    TaskDefinitionBuilder::new("package")
                        .depends_on("compile")
                        .exec("native", &["tar", "czf", "out.tgz", "target"])
                        .build(),
                )
                .build(),
        )
        .with_task(
            TaskDefinitionBuilder::new("toolchain")
                .child(
                    TaskDefinitionBuilder::new("compile")
                        .exec("native", &["cargo", "build"])
                        .build(),
                )
                .build(),
        )
        .build();

    let tree = TaskTree::from_config(&cfg)?;
    let release = tree.require("release")?;
    let order: Vec<&str> = tree
        .resolve(release, None)?
        .iter()
        .map(|&id| tree.name(id))
        .collect();
    assert_eq!(order, vec!["compile", "package", "release"]);
    Ok(())
}

#[test]
fn duplicate_names_are_rejected() {
    let defs = vec![
        TaskDefinitionBuilder::new("lint").build(),
        TaskDefinitionBuilder::new("ci")
            .child(TaskDefinitionBuilder::new("lint").build())
            .build(),
    ];

    match TaskTree::from_definitions(&defs) {
        Err(TycheError::DuplicateTask(name)) => assert_eq!(name, "lint"),
        other => panic!("expected DuplicateTask, got {:?}", other.map(|t| t.len())),
    }
}

#[test]
fn every_unresolved_name_is_reported() {
    let defs = vec![
        TaskDefinitionBuilder::new("build")
            .depends_on("fetch")
            .child_ref("codegen")
            .child_ref("fetch")
            .build(),
    ];

    let err = TaskTree::from_definitions(&defs).map(|t| t.len()).unwrap_err();
    match &err {
        TycheError::UnresolvedDependency(names) => {
            assert_eq!(names, &vec!["fetch".to_string(), "codegen".to_string()]);
        }
        other => panic!("expected UnresolvedDependency, got {other:?}"),
    }
    assert_eq!(err.to_string(), "unresolved dependency: fetch, codegen");
}

#[test]
fn reference_cycles_are_rejected_when_building_the_tree() {
    let defs = vec![
        TaskDefinitionBuilder::new("a").child_ref("b").build(),
        TaskDefinitionBuilder::new("b").depends_on("a").build(),
    ];

    assert!(matches!(
        TaskTree::from_definitions(&defs),
        Err(TycheError::CircularDependency { .. })
    ));
}

#[test]
fn reduced_graph_is_a_copy() -> TestResult {
    let defs = vec![
        TaskDefinitionBuilder::new("app")
            .child_ref("lib")
            .child_ref("core")
            .build(),
        TaskDefinitionBuilder::new("lib").child_ref("core").build(),
        TaskDefinitionBuilder::new("core").build(),
    ];
    let tree = TaskTree::from_definitions(&defs)?;
    let app = tree.require("app")?;

    let reduced = tree.reduced(app)?;
    assert_eq!(reduced.edges(app).len(), 1);
    assert_eq!(tree.child_names(app), vec!["lib", "core"]);
    Ok(())
}

#[test]
fn load_and_validate_reports_cycles_from_file() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[[tasks]]
name = "A"
dependencies = ["B"]

[[tasks]]
name = "B"
dependencies = ["A"]
"#
    )?;

    match load_and_validate(file.path()) {
        Err(TycheError::CircularDependency { from, to }) => {
            let pair = [from.as_str(), to.as_str()];
            assert!(pair.contains(&"A") && pair.contains(&"B"));
        }
        Err(e) => panic!("Expected CircularDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn load_and_validate_reports_unknown_references() -> TestResult {
    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[[tasks]]
name = "A"
dependencies = ["NonExistent"]
tasks = ["AlsoMissing"]
"#
    )?;

    match load_and_validate(file.path()) {
        Err(TycheError::UnresolvedDependency(names)) => {
            assert_eq!(names, vec!["NonExistent", "AlsoMissing"]);
        }
        Err(e) => panic!("Expected UnresolvedDependency, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
    Ok(())
}

#[test]
fn empty_config_is_rejected() {
    let raw = ConfigFileBuilder::new().raw();
    assert!(matches!(
        tyche::config::ConfigFile::try_from(raw),
        Err(TycheError::ConfigError(_))
    ));
}

#[test]
fn step_accepts_camel_case_accepts_args() -> TestResult {
    let cfg = parse_str(
        r#"
[[tasks]]
name = "test"
exec.native = { command = ["cargo", "test"], acceptsArgs = true }
"#,
    )?;
    let step: &StepDefinition = &cfg.tasks[0].exec.as_ref().ok_or("missing exec")?["native"];
    assert!(step.accepts_args);
    Ok(())
}
