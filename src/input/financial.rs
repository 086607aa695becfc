//! Financial assumptions as given in a scenario file.
use super::Violations;
use crate::financial::Financial;
use anyhow::Result;
use serde::Deserialize;

/// The `[financial]` table.
///
/// Any field left out takes its value from [`Financial::default`].
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct FinancialParams {
    analysis_years: Option<u32>,
    offtaker_discount_rate: Option<f64>,
    owner_discount_rate: Option<f64>,
    offtaker_tax_rate: Option<f64>,
    owner_tax_rate: Option<f64>,
    #[serde(default)]
    third_party_ownership: bool,
    elec_cost_escalation_rate: Option<f64>,
    om_cost_escalation_rate: Option<f64>,
    fuel_cost_escalation_rate: Option<f64>,
}

impl FinancialParams {
    /// Fill in defaults and check every field
    pub fn into_financial(self) -> Result<Financial> {
        let defaults = Financial::default();
        let financial = Financial {
            analysis_years: self.analysis_years.unwrap_or(defaults.analysis_years),
            offtaker_discount_rate: self
                .offtaker_discount_rate
                .unwrap_or(defaults.offtaker_discount_rate),
            // Without third-party ownership the owner is the offtaker
            owner_discount_rate: self
                .owner_discount_rate
                .or(self.offtaker_discount_rate)
                .unwrap_or(defaults.owner_discount_rate),
            offtaker_tax_rate: self.offtaker_tax_rate.unwrap_or(defaults.offtaker_tax_rate),
            owner_tax_rate: self
                .owner_tax_rate
                .or(self.offtaker_tax_rate)
                .unwrap_or(defaults.owner_tax_rate),
            third_party_ownership: self.third_party_ownership,
            elec_cost_escalation_rate: self
                .elec_cost_escalation_rate
                .unwrap_or(defaults.elec_cost_escalation_rate),
            om_cost_escalation_rate: self
                .om_cost_escalation_rate
                .unwrap_or(defaults.om_cost_escalation_rate),
            fuel_cost_escalation_rate: self
                .fuel_cost_escalation_rate
                .unwrap_or(defaults.fuel_cost_escalation_rate),
        };
        validate(&financial)?;

        Ok(financial)
    }
}

fn validate(financial: &Financial) -> Result<()> {
    let mut violations = Violations::new("financial");
    violations.check(financial.analysis_years > 0, || {
        "analysis_years must be at least 1".to_string()
    });
    violations.fraction("offtaker_discount_rate", financial.offtaker_discount_rate);
    violations.fraction("owner_discount_rate", financial.owner_discount_rate);
    violations.fraction("offtaker_tax_rate", financial.offtaker_tax_rate);
    violations.fraction("owner_tax_rate", financial.owner_tax_rate);

    // Escalation may be negative, but not so negative that costs vanish
    for (field, rate) in [
        ("elec_cost_escalation_rate", financial.elec_cost_escalation_rate),
        ("om_cost_escalation_rate", financial.om_cost_escalation_rate),
        ("fuel_cost_escalation_rate", financial.fuel_cost_escalation_rate),
    ] {
        violations.check(rate > -1.0 && rate < 1.0, || {
            format!("{field} must be between -1 and 1 (got {rate})")
        });
    }
    violations.finish()?;

    Ok(())
}
