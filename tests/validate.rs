//! Integration tests for the `validate` command.
use deropt::cli::handle_validate_command;
use deropt::input::{LoadedScenario, load_scenario};
use deropt::log::is_logger_initialised;
use deropt::settings::Settings;
use std::path::Path;

/// An integration test for the `validate` command.
///
/// We also check that the logger is initialised after it is run.
#[test]
fn test_handle_validate_command() {
    unsafe { std::env::set_var("DEROPT_LOG_LEVEL", "off") };

    assert!(!is_logger_initialised());

    handle_validate_command(
        Path::new("demos/simple/scenario.toml"),
        Some(Settings::default()),
    )
    .unwrap();

    assert!(is_logger_initialised());
}

/// Every demo scenario should load
#[test]
fn test_load_demos() {
    let LoadedScenario::Single(scenario) =
        load_scenario(Path::new("demos/simple/scenario.toml")).unwrap()
    else {
        panic!("Expected a single-site scenario");
    };
    assert_eq!(scenario.time_index.len(), 8760);

    let LoadedScenario::Single(scenario) =
        load_scenario(Path::new("demos/control/scenario.toml")).unwrap()
    else {
        panic!("Expected a single-site scenario");
    };
    assert_eq!(scenario.time_index.len(), 48);

    let LoadedScenario::MultiNode(nodes) =
        load_scenario(Path::new("demos/multi_node/nodes.toml")).unwrap()
    else {
        panic!("Expected a multi-node scenario");
    };
    assert_eq!(nodes.len(), 2);
}
