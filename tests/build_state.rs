// tests/build_state.rs

use std::error::Error;
use std::fs;

use tyche::state::BuildState;
use tyche_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn snapshot_survives_a_new_store_instance() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("state.json");
    let file = dir.path().join("package.json");
    fs::write(&file, r#"{"name":"web"}"#)?;

    let mut first = BuildState::open(&store_path, "web_").await?;
    assert!(first.file_changed(&file).await?);
    first.update_file_snapshot(&file).await?;
    first.finish().await?;

    let mut second = BuildState::open(&store_path, "web_").await?;
    assert!(!second.file_changed(&file).await?);
    Ok(())
}

#[tokio::test]
async fn edited_file_is_changed_in_the_next_run() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("state.json");
    let file = dir.path().join("Cargo.lock");
    fs::write(&file, "v1")?;

    let mut first = BuildState::open(&store_path, "app_").await?;
    first.update_file_snapshot(&file).await?;
    first.finish().await?;

    fs::write(&file, "v2")?;
    let mut second = BuildState::open(&store_path, "app_").await?;
    assert!(second.file_changed(&file).await?);
    Ok(())
}

#[tokio::test]
async fn never_snapshotted_path_is_always_changed() -> TestResult {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("README.md");
    fs::write(&file, "hello")?;

    let mut state = BuildState::open(dir.path().join("state.json"), "docs_").await?;
    assert!(state.file_changed(&file).await?);
    assert!(state.file_changed(&dir.path().join("missing.txt")).await?);
    Ok(())
}

#[tokio::test]
async fn build_number_and_history_persist() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("nested").join("state.json");

    let mut first = BuildState::open(&store_path, "svc_").await?;
    assert_eq!(first.next_build_number()?, 1);
    assert_eq!(first.next_build_number()?, 2);
    first.record_run("deploy", "compose", Some("deadbeef"))?;
    first.finish().await?;

    let second = BuildState::open(&store_path, "svc_").await?;
    assert_eq!(second.build_number()?, 2);
    let record = second.run_record("deploy")?.ok_or("missing run record")?;
    assert_eq!(record.tools_used, vec!["compose"]);
    assert_eq!(record.last_revision.as_deref(), Some("deadbeef"));
    Ok(())
}

#[tokio::test]
async fn empty_store_file_is_treated_as_new() -> TestResult {
    let dir = tempfile::tempdir()?;
    let store_path = dir.path().join("state.json");
    fs::write(&store_path, "")?;

    let state = BuildState::open(&store_path, "x_").await?;
    assert_eq!(state.build_number()?, 0);
    Ok(())
}
