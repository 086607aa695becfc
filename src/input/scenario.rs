//! Reading a complete scenario file.
use super::{
    FinancialParams, LoadParams, OutageParams, StorageParams, TariffParams, TechnologyParams,
    read_toml,
};
use crate::id::check_unique_ids;
use crate::load::{CsvReferenceProfiles, LoadProfile};
use crate::scenario::{Node, Scenario};
use crate::storage::StorageMap;
use crate::technology::{TechClass, TechnologyMap};
use crate::time_index::{HOURS_PER_YEAR, TimeIndex};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_time_steps_per_hour() -> usize {
    1
}

fn default_reference_profiles_dir() -> PathBuf {
    PathBuf::from("profiles")
}

/// The `[site]` table
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct SiteParams {
    #[serde(default = "default_time_steps_per_hour")]
    time_steps_per_hour: usize,
    /// Defaults to a full year
    num_time_steps: Option<usize>,
    /// Offset of the first time step from the start of the year
    #[serde(default)]
    start_time_step: usize,
    #[serde(default = "default_reference_profiles_dir")]
    reference_profiles_dir: PathBuf,
}

impl Default for SiteParams {
    fn default() -> Self {
        Self {
            time_steps_per_hour: default_time_steps_per_hour(),
            num_time_steps: None,
            start_time_step: 0,
            reference_profiles_dir: default_reference_profiles_dir(),
        }
    }
}

/// A `[[nodes]]` entry, pointing to the scenario file for one site
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct NodeParams {
    id: u32,
    scenario: PathBuf,
}

/// The contents of a scenario file
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    site: SiteParams,
    load: Option<LoadParams>,
    #[serde(default)]
    financial: FinancialParams,
    tariff: Option<TariffParams>,
    #[serde(default)]
    technologies: Vec<TechnologyParams>,
    #[serde(default)]
    storage: Vec<StorageParams>,
    outage: Option<OutageParams>,
    #[serde(default)]
    nodes: Vec<NodeParams>,
}

/// A scenario file describes either one site or several nodes
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedScenario {
    /// A single site
    Single(Scenario),
    /// Several independent sites to be optimised together
    MultiNode(Vec<Node>),
}

/// The directory containing a scenario file, against which relative paths are resolved
fn parent_dir(file_path: &Path) -> &Path {
    file_path.parent().unwrap_or(Path::new("."))
}

/// Read a scenario file, which may describe one site or several nodes.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML scenario file
pub fn load_scenario(file_path: &Path) -> Result<LoadedScenario> {
    let file: ScenarioFile = read_toml(file_path)?;
    let base_dir = parent_dir(file_path);

    if file.nodes.is_empty() {
        build_scenario(file, base_dir).map(LoadedScenario::Single)
    } else {
        build_nodes(file.nodes, base_dir).map(LoadedScenario::MultiNode)
    }
}

/// Read a scenario file describing a single site, e.g. for a control run
pub fn load_control_scenario(file_path: &Path) -> Result<Scenario> {
    match load_scenario(file_path)? {
        LoadedScenario::Single(scenario) => Ok(scenario),
        LoadedScenario::MultiNode(_) => bail!(
            "{} describes several nodes but a single site is needed",
            file_path.display()
        ),
    }
}

/// Read a scenario file listing the nodes of a multi-node run
pub fn load_nodes(file_path: &Path) -> Result<Vec<Node>> {
    match load_scenario(file_path)? {
        LoadedScenario::MultiNode(nodes) => Ok(nodes),
        LoadedScenario::Single(_) => bail!("{} has no [[nodes]]", file_path.display()),
    }
}

fn build_nodes(nodes: Vec<NodeParams>, base_dir: &Path) -> Result<Vec<Node>> {
    let mut seen = IndexSet::new();
    nodes
        .into_iter()
        .map(|node| {
            ensure!(seen.insert(node.id), "Duplicate node ID {}", node.id);

            let file_path = base_dir.join(&node.scenario);
            let file: ScenarioFile = read_toml(&file_path)?;
            ensure!(
                file.nodes.is_empty(),
                "Node scenario {} cannot itself list nodes",
                file_path.display()
            );
            let scenario = build_scenario(file, parent_dir(&file_path))
                .with_context(|| format!("Invalid scenario for node {}", node.id))?;

            Ok(Node {
                id: node.id,
                scenario,
            })
        })
        .collect()
}

/// Build the immutable scenario for one site
fn build_scenario(file: ScenarioFile, base_dir: &Path) -> Result<Scenario> {
    let site = file.site;
    let len = site
        .num_time_steps
        .unwrap_or(HOURS_PER_YEAR * site.time_steps_per_hour);
    let time_index = TimeIndex::for_horizon(len, site.time_steps_per_hour, site.start_time_step)?;

    let technologies = file
        .technologies
        .into_iter()
        .map(|params| params.into_technology(base_dir, len))
        .collect::<Result<Vec<_>>>()?;
    check_unique_ids(technologies.iter().map(|tech| &tech.id))?;
    let technologies: TechnologyMap = technologies
        .into_iter()
        .map(|tech| (tech.id.clone(), tech))
        .collect();

    let storage = file
        .storage
        .into_iter()
        .map(StorageParams::into_storage)
        .collect::<Result<Vec<_>>>()?;
    check_unique_ids(storage.iter().map(|storage| &storage.id))?;
    let storage: StorageMap = storage
        .into_iter()
        .map(|storage| (storage.id.clone(), storage))
        .collect();

    let load_params = file.load.context("A [load] table must be given")?;
    let existing_pv_kw = existing_pv_production(&technologies, len);
    let profiles = CsvReferenceProfiles::new(base_dir.join(&site.reference_profiles_dir));
    let load = LoadProfile::build(
        &load_params.spec(base_dir, len)?,
        &profiles,
        len,
        time_index.step_hours(),
        &existing_pv_kw,
        load_params.heating_loads_kw(base_dir, len)?,
    )
    .context("Invalid load")?;

    let tech_ids: IndexSet<_> = technologies.keys().cloned().collect();
    let tariff = file
        .tariff
        .context("A [tariff] table must be given")?
        .into_tariff(base_dir, len, &tech_ids)
        .context("Invalid tariff")?;
    let financial = file.financial.into_financial()?;
    let outage = file
        .outage
        .map(|outage| outage.into_outage_scenarios(base_dir, load.loads_kw()))
        .transpose()?;

    let scenario = Scenario {
        time_index,
        load,
        technologies,
        storage,
        tariff,
        financial,
        outage,
    };
    scenario.validate()?;

    Ok(scenario)
}

/// Production of PV already at the site at each time step
fn existing_pv_production(technologies: &TechnologyMap, len: usize) -> Vec<f64> {
    let mut production = vec![0.0; len];
    for tech in technologies.values().filter(|tech| tech.class == TechClass::Pv) {
        for (total, pf) in production.iter_mut().zip(&tech.production_factor) {
            *total += pf * tech.existing_kw.value();
        }
    }

    production
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs;
    use tempfile::tempdir;

    const SITE_TOML: &str = r#"
[site]
num_time_steps = 4

[load]
loads_kw = { csv = "load.csv" }
loads_are_net = true

[tariff]
energy_rates = [0.1]

[[technologies]]
id = "pv"
class = "PV"
max_kw = 100.0
existing_kw = 10.0
production_factor = [0.0, 0.5, 1.0, 0.0]

[[storage]]
id = "battery"
max_kw = 50.0
max_kwh = 200.0
"#;

    /// Write a single-site scenario into `dir`, returning the path to the TOML file
    fn write_site(dir: &Path, file_name: &str) -> PathBuf {
        fs::write(dir.join("load.csv"), "kw\n10\n10\n10\n10\n").unwrap();
        let file_path = dir.join(file_name);
        fs::write(&file_path, SITE_TOML).unwrap();
        file_path
    }

    #[test]
    fn test_load_scenario() {
        let dir = tempdir().unwrap();
        let file_path = write_site(dir.path(), "site.toml");

        let scenario = load_control_scenario(&file_path).unwrap();
        assert_eq!(scenario.time_index.len(), 4);
        assert_eq!(scenario.technologies.len(), 1);
        assert_eq!(scenario.storage.len(), 1);
        // Existing PV production is added back to the net load
        assert_eq!(scenario.load.loads_kw(), [10.0, 15.0, 20.0, 10.0]);
        assert!(scenario.outage.is_none());
    }

    #[test]
    fn test_load_nodes() {
        let dir = tempdir().unwrap();
        write_site(dir.path(), "site.toml");
        let file_path = dir.path().join("nodes.toml");
        fs::write(
            &file_path,
            "[[nodes]]\nid = 1\nscenario = \"site.toml\"\n\n\
            [[nodes]]\nid = 2\nscenario = \"site.toml\"\n",
        )
        .unwrap();

        let nodes = load_nodes(&file_path).unwrap();
        assert_eq!(nodes.iter().map(|node| node.id).collect::<Vec<_>>(), [1, 2]);
        assert!(load_control_scenario(&file_path).is_err());
    }

    #[test]
    fn test_duplicate_node_ids() {
        let dir = tempdir().unwrap();
        write_site(dir.path(), "site.toml");
        let file_path = dir.path().join("nodes.toml");
        fs::write(
            &file_path,
            "[[nodes]]\nid = 1\nscenario = \"site.toml\"\n\n\
            [[nodes]]\nid = 1\nscenario = \"site.toml\"\n",
        )
        .unwrap();

        assert_error!(load_scenario(&file_path), "Duplicate node ID 1");
    }

    #[test]
    fn test_missing_tariff() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("load.csv"), "kw\n10\n10\n10\n10\n").unwrap();
        let file_path = dir.path().join("site.toml");
        let toml_str = SITE_TOML.replace("[tariff]\nenergy_rates = [0.1]\n", "");
        fs::write(&file_path, toml_str).unwrap();

        assert_error!(load_scenario(&file_path), "A [tariff] table must be given");
    }

    #[test]
    fn test_duplicate_technology() {
        let dir = tempdir().unwrap();
        let file_path = write_site(dir.path(), "site.toml");
        let toml_str = format!(
            "{SITE_TOML}\n[[technologies]]\nid = \"pv\"\nclass = \"PV\"\nmax_kw = 5.0\n\
            production_factor = 0.5\n"
        );
        fs::write(&file_path, toml_str).unwrap();

        assert_error!(load_scenario(&file_path), "Duplicate ID pv");
    }
}
