// tests/skip_policy.rs

use std::error::Error;
use std::fs;

use tempfile::TempDir;
use tyche::state::BuildState;
use tyche::task::skip::watched_files;
use tyche::task::{SkipPolicy, TaskTree};
use tyche::tool::ToolRegistry;
use tyche_test_utils::{TaskDefinitionBuilder, init_tracing};

type TestResult = Result<(), Box<dyn Error>>;

struct Fixture {
    dir: TempDir,
    state: BuildState,
    registry: ToolRegistry,
}

impl Fixture {
    async fn new() -> Result<Self, Box<dyn Error>> {
        init_tracing();
        let dir = tempfile::tempdir()?;
        let state = BuildState::open(dir.path().join("state.json"), "fixture_").await?;
        Ok(Self {
            dir,
            state,
            registry: ToolRegistry::default(),
        })
    }

    async fn should_skip(&mut self, tree: &mut TaskTree, name: &str, tool: &str) -> Result<bool, Box<dyn Error>> {
        let id = tree.require(name)?;
        let workdir = self.dir.path().to_path_buf();
        let skipped = SkipPolicy::new(&self.registry, &mut self.state, &workdir)
            .should_skip(tree, id, tool)
            .await?;
        Ok(skipped)
    }
}

#[tokio::test]
async fn no_predicates_means_run() -> TestResult {
    let mut fx = Fixture::new().await?;
    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("build")
        .exec("native", &["make"])
        .build()])?;

    assert!(!fx.should_skip(&mut tree, "build", "native").await?);
    Ok(())
}

#[tokio::test]
async fn existing_path_votes_skip_and_missing_path_votes_run() -> TestResult {
    let mut fx = Fixture::new().await?;
    fs::create_dir(fx.dir.path().join("node_modules"))?;

    let mut tree = TaskTree::from_definitions(&[
        TaskDefinitionBuilder::new("present")
            .skip_if_exists("node_modules")
            .exec("native", &["npm", "install"])
            .build(),
        TaskDefinitionBuilder::new("mixed")
            .skip_if_exists("node_modules")
            .skip_if_exists("dist")
            .exec("native", &["npm", "run", "build"])
            .build(),
    ])?;

    assert!(fx.should_skip(&mut tree, "present", "native").await?);
    assert!(!fx.should_skip(&mut tree, "mixed", "native").await?);
    Ok(())
}

#[tokio::test]
async fn unchanged_file_votes_skip_only_after_snapshot() -> TestResult {
    let mut fx = Fixture::new().await?;
    let manifest = fx.dir.path().join("package.json");
    fs::write(&manifest, "{}")?;

    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("deps")
        .skip_if_unchanged("package.json")
        .exec("native", &["npm", "install"])
        .build()])?;

    assert!(!fx.should_skip(&mut tree, "deps", "native").await?);

    fx.state.update_file_snapshot(&manifest).await?;
    assert!(fx.should_skip(&mut tree, "deps", "native").await?);
    Ok(())
}

#[tokio::test]
async fn compose_only_task_is_forced_to_skip_under_native() -> TestResult {
    let mut fx = Fixture::new().await?;
    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("db")
        .exec("compose", &["postgres"])
        .build()])?;

    assert!(fx.should_skip(&mut tree, "db", "native").await?);
    assert!(tree.is_forced(tree.require("db")?));

    tree.reset_forced();
    assert!(!fx.should_skip(&mut tree, "db", "compose").await?);
    Ok(())
}

#[tokio::test]
async fn always_use_tool_overrides_the_preferred_tool() -> TestResult {
    let mut fx = Fixture::new().await?;
    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("migrate")
        .exec("native", &["diesel", "migration", "run"])
        .always_use_tool("compose")
        .build()])?;

    // The only step is native, but the task insists on compose.
    assert!(fx.should_skip(&mut tree, "migrate", "native").await?);
    Ok(())
}

#[tokio::test]
async fn skip_dependencies_if_skip_forces_every_descendant() -> TestResult {
    let mut fx = Fixture::new().await?;
    fs::create_dir(fx.dir.path().join("dist"))?;

    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("bundle")
        .skip_if_exists("dist")
        .skip_dependencies_if_skip()
        .exec("native", &["webpack"])
        .child(
            TaskDefinitionBuilder::new("compile")
                .skip_if_exists("does-not-exist")
                .exec("native", &["tsc"])
                .child(
                    TaskDefinitionBuilder::new("codegen")
                        .exec("native", &["protoc"])
                        .build(),
                )
                .build(),
        )
        .build()])?;

    assert!(!fx.should_skip(&mut tree, "compile", "native").await?);

    assert!(fx.should_skip(&mut tree, "bundle", "native").await?);
    assert!(fx.should_skip(&mut tree, "compile", "native").await?);
    assert!(fx.should_skip(&mut tree, "codegen", "native").await?);
    Ok(())
}

#[tokio::test]
async fn unknown_preferred_tool_is_an_error() -> TestResult {
    let mut fx = Fixture::new().await?;
    let mut tree = TaskTree::from_definitions(&[TaskDefinitionBuilder::new("build")
        .exec("native", &["make"])
        .build()])?;

    assert!(fx.should_skip(&mut tree, "build", "podman").await.is_err());
    Ok(())
}

#[tokio::test]
async fn history_vote_requires_a_previous_run_with_the_same_tool() -> TestResult {
    let mut fx = Fixture::new().await?;
    fs::create_dir(fx.dir.path().join("node_modules"))?;
    let mut tree = TaskTree::from_definitions(&[
        TaskDefinitionBuilder::new("deps")
            .skip_if_exists("node_modules")
            .exec("native", &["npm", "install"])
            .build(),
        TaskDefinitionBuilder::new("lint")
            .exec("native", &["eslint", "."])
            .build(),
    ])?;
    let deps = tree.require("deps")?;
    let lint = tree.require("lint")?;
    let workdir = fx.dir.path().to_path_buf();

    let mut policy = SkipPolicy::new(&fx.registry, &mut fx.state, &workdir).require_history(true);
    assert!(!policy.should_skip(&mut tree, deps, "native").await?);
    // No predicates, so history has nothing to veto.
    assert_eq!(policy.votes(&tree, lint, "native").await?.cast(), 0);

    fx.state.record_run("deps", "compose", None)?;
    let mut policy = SkipPolicy::new(&fx.registry, &mut fx.state, &workdir).require_history(true);
    assert!(!policy.should_skip(&mut tree, deps, "native").await?);

    fx.state.record_run("deps", "native", None)?;
    let mut policy = SkipPolicy::new(&fx.registry, &mut fx.state, &workdir).require_history(true);
    assert!(policy.should_skip(&mut tree, deps, "native").await?);
    Ok(())
}

#[tokio::test]
async fn config_file_is_watched_alongside_declared_files() -> TestResult {
    let mut fx = Fixture::new().await?;
    let manifest = fx.dir.path().join("package.json");
    let config = fx.dir.path().join("tyche.toml");
    fs::write(&manifest, "{}")?;
    fs::write(&config, "# v1")?;

    let mut tree = TaskTree::from_definitions(&[
        TaskDefinitionBuilder::new("deps")
            .skip_if_unchanged("package.json")
            .exec("native", &["npm", "install"])
            .build(),
        TaskDefinitionBuilder::new("dist")
            .skip_if_exists("package.json")
            .exec("native", &["npm", "pack"])
            .build(),
    ])?;
    let deps = tree.require("deps")?;
    let dist = tree.require("dist")?;

    assert_eq!(
        watched_files(tree.task(deps), fx.dir.path(), Some(config.as_path())),
        vec![manifest.clone(), config.clone()]
    );
    assert!(watched_files(tree.task(dist), fx.dir.path(), Some(config.as_path())).is_empty());

    fx.state.update_file_snapshot(&manifest).await?;
    let workdir = fx.dir.path().to_path_buf();
    let mut policy =
        SkipPolicy::new(&fx.registry, &mut fx.state, &workdir).with_config_file(Some(config.as_path()));
    assert!(!policy.should_skip(&mut tree, deps, "native").await?);

    fx.state.update_file_snapshot(&config).await?;
    fx.state.cache_mut().invalidate_all();
    let mut policy =
        SkipPolicy::new(&fx.registry, &mut fx.state, &workdir).with_config_file(Some(config.as_path()));
    assert!(policy.should_skip(&mut tree, deps, "native").await?);
    Ok(())
}
