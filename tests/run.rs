//! Integration tests for the `run` command.
use deropt::cli::{OutputOpts, RunOpts, handle_run_command};
use deropt::settings::Settings;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

/// Get the path to the demo scenario.
fn get_scenario_path() -> PathBuf {
    PathBuf::from("demos/simple/scenario.toml")
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("DEROPT_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output: OutputOpts {
            output_dir: Some(output_dir.clone()),
            overwrite: false,
        },
        no_bau: false,
    };
    handle_run_command(&get_scenario_path(), &opts, Some(Settings::default())).unwrap();

    let results: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output_dir.join("results.json")).unwrap())
            .unwrap();
    assert_eq!(results["status"], "optimal");
    assert_eq!(results["Financial"]["status_bau"], "optimal");
    assert!(results["Financial"]["lcc"].as_f64().unwrap() > 0.0);
    assert!(results["Financial"]["npv"].is_number());
    assert!(results["Financial"]["lcc_bau"].as_f64().unwrap() > 0.0);
    assert!(output_dir.join("dispatch.csv").is_file());

    // Second time will fail because the output folder isn't empty
    assert_eq!(
        handle_run_command(&get_scenario_path(), &opts, Some(Settings::default()))
            .unwrap_err()
            .chain()
            .next()
            .unwrap()
            .to_string(),
        format!("Failed to create output directory: {}", output_dir.display())
    );
}
