//! Sizing and dispatch optimisation for distributed energy resources.
//!
//! A [`scenario::Scenario`] describes a site: its load, the technologies and storage which may be
//! bought, its electric tariff, financial assumptions and any grid outages to be survived. The
//! [`optimisation`] module turns a scenario into a mixed-integer linear program, which is solved
//! with HiGHS, and [`results`] reads a structured, rounded summary back out of the solution.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod finance;
pub mod financial;
pub mod id;
pub mod input;
pub mod load;
pub mod log;
pub mod optimisation;
pub mod outage;
pub mod output;
pub mod results;
pub mod scenario;
pub mod settings;
pub mod simulation;
pub mod storage;
pub mod tariff;
pub mod technology;
pub mod time_index;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory in which deropt's program settings are stored
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("deropt");
    path
}
