//! The module responsible for writing results to disk.
use crate::results::{Metric, ResultSet};
use crate::simulation::multi_node::MultiNodeResults;
use anyhow::{Context, Result, ensure};
use serde::Serialize;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// The root folder in which scenario-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "deropt_results";

/// The output file name for results
const RESULTS_FILE_NAME: &str = "results.json";

/// The output file name for dispatch series
const DISPATCH_FILE_NAME: &str = "dispatch.csv";

/// Get the output folder for the scenario file at `scenario_path`
pub fn get_output_dir(scenario_path: &Path) -> Result<PathBuf> {
    let scenario_name = scenario_path
        .file_stem()
        .context("Scenario path has no file name")?
        .to_str()
        .context("Invalid chars in scenario file name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, scenario_name].iter().collect())
}

/// Create a new output directory.
///
/// If the directory already exists and contains files, it is only reused if `allow_overwrite` is
/// set. Returns whether existing files will be overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = output_dir.read_dir()?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite to replace it."
        );
        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// Write any serialisable results to a pretty-printed JSON file
fn write_json<T: Serialize>(file_path: &Path, value: &T) -> Result<()> {
    let file = File::create(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}

/// Write every time-step series in `results` to a CSV file, one column per series.
///
/// Columns are named `<category>.<key>`. Series of other lengths (e.g. monthly peaks or cash
/// flows) are skipped.
pub fn write_dispatch(file_path: &Path, results: &ResultSet, num_time_steps: usize) -> Result<()> {
    let columns: Vec<(String, &[f64])> = results
        .categories
        .iter()
        .flat_map(|(category, metrics)| {
            metrics.iter().filter_map(move |(key, metric)| match metric {
                Metric::Series(values) if values.len() == num_time_steps => {
                    Some((format!("{category}.{key}"), values.as_slice()))
                }
                _ => None,
            })
        })
        .collect();

    let mut writer = csv::Writer::from_path(file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    let mut header = vec!["time_step".to_string()];
    header.extend(columns.iter().map(|(name, _)| name.clone()));
    writer.write_record(&header)?;
    for t in 0..num_time_steps {
        let mut record = vec![t.to_string()];
        record.extend(columns.iter().map(|(_, values)| values[t].to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the results of a single-site run
pub fn write_results(output_dir: &Path, results: &ResultSet, num_time_steps: usize) -> Result<()> {
    write_json(&output_dir.join(RESULTS_FILE_NAME), results)?;
    write_dispatch(&output_dir.join(DISPATCH_FILE_NAME), results, num_time_steps)
}

/// Write the results of a multi-node run.
///
/// Dispatch series are written to one CSV file per node.
pub fn write_multi_node_results(
    output_dir: &Path,
    results: &MultiNodeResults,
    num_time_steps: usize,
) -> Result<()> {
    write_json(&output_dir.join(RESULTS_FILE_NAME), results)?;
    for (id, node) in &results.nodes {
        let file_path = output_dir.join(format!("dispatch_node_{id}.csv"));
        write_dispatch(&file_path, node, num_time_steps)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimisation::solve::SolveStatus;
    use itertools::Itertools;
    use tempfile::tempdir;

    fn results() -> ResultSet {
        let mut results = ResultSet::new(SolveStatus::Optimal, 0.5);
        results.insert("Financial", "lcc", Metric::Scalar(1000.0));
        results.insert(
            "ElectricUtility",
            "year_one_to_load_series_kw",
            Metric::Series(vec![1.0, 2.5, 0.0]),
        );
        results.insert(
            "ElectricTariff",
            "monthly_peak_demand_kw",
            Metric::Series(vec![3.0; 12]),
        );
        results
    }

    #[test]
    fn test_get_output_dir() {
        assert_eq!(
            get_output_dir(Path::new("scenarios/office.toml")).unwrap(),
            PathBuf::from("deropt_results/office")
        );
    }

    #[test]
    fn test_create_output_directory() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("out");

        // New directory
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing empty directory
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Existing non-empty directory
        File::create(output_dir.join("results.json")).unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("results.json").exists());
    }

    #[test]
    fn test_write_results() {
        let dir = tempdir().unwrap();
        write_results(dir.path(), &results(), 3).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(RESULTS_FILE_NAME)).unwrap())
                .unwrap();
        assert_eq!(json["status"], "optimal");
        assert_eq!(json["Financial"]["lcc"], 1000.0);

        let mut reader = csv::Reader::from_path(dir.path().join(DISPATCH_FILE_NAME)).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().collect_vec(),
            ["time_step", "ElectricUtility.year_one_to_load_series_kw"]
        );
        let rows: Vec<(usize, f64)> = reader.deserialize().try_collect().unwrap();
        assert_eq!(rows, [(0, 1.0), (1, 2.5), (2, 0.0)]);
    }
}
