//! General functions related to finance.
//!
//! Costs in the objective are expressed as lifecycle present values, so recurring year-one costs
//! are multiplied by present-worth factors and capital costs are reduced by the present value of
//! tax incentives.

/// The fraction of the investment tax credit which reduces the depreciable basis
const MACRS_ITC_REDUCTION: f64 = 0.5;

/// Calculates the present-worth factor for a stream of escalating annual payments.
///
/// This is the sum over `years` of `((1 + escalation) / (1 + discount))^year`, i.e. the multiplier
/// which converts a year-one cost into its discounted lifecycle equivalent.
pub fn annuity(years: u32, escalation_rate: f64, discount_rate: f64) -> f64 {
    let x = (1.0 + escalation_rate) / (1.0 + discount_rate);
    if (x - 1.0).abs() < f64::EPSILON {
        return years as f64;
    }

    x * (1.0 - x.powi(years as i32)) / (1.0 - x)
}

/// Tax incentives which reduce the effective capital cost of a technology or storage
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapitalIncentives {
    /// Investment tax credit as a fraction of installed cost
    pub itc_fraction: f64,
    /// MACRS depreciation schedule (fraction of the depreciable basis per year)
    pub macrs_schedule: Vec<f64>,
    /// Fraction of the depreciable basis taken as bonus depreciation in year one
    pub macrs_bonus_fraction: f64,
}

/// A cost incurred again partway through the analysis period
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Replacement {
    /// Cost per unit at the time of replacement
    pub cost: f64,
    /// Year in which the replacement happens
    pub year: u32,
}

/// Calculates the effective up-front cost per unit of capacity.
///
/// The installed cost is reduced by the present value of the investment tax credit and of the
/// depreciation tax shield, and increased by the present value of any replacement.
pub fn effective_cost(
    installed_cost: f64,
    incentives: &CapitalIncentives,
    replacement: Option<Replacement>,
    discount_rate: f64,
    tax_rate: f64,
) -> f64 {
    let discount = |year: u32| (1.0 + discount_rate).powi(year as i32);

    let itc_savings = incentives.itc_fraction * installed_cost / discount(1);

    let depreciable_basis = installed_cost * (1.0 - MACRS_ITC_REDUCTION * incentives.itc_fraction);
    let bonus_savings =
        depreciable_basis * incentives.macrs_bonus_fraction * tax_rate / discount(1);
    let macrs_basis = depreciable_basis * (1.0 - incentives.macrs_bonus_fraction);
    let macrs_savings: f64 = incentives
        .macrs_schedule
        .iter()
        .zip(1..)
        .map(|(fraction, year)| fraction * macrs_basis * tax_rate / discount(year))
        .sum();

    let replacement_cost = replacement
        .map(|r| r.cost * (1.0 - tax_rate) / discount(r.year))
        .unwrap_or(0.0);

    installed_cost - itc_savings - bonus_savings - macrs_savings + replacement_cost
}

/// Calculates the factor applied to capital costs when a third party owns the system.
///
/// The owner recovers their capital through payments from the offtaker, so the capital cost seen
/// by the offtaker is scaled by the ratio of the two parties' after-tax annuities.
pub fn third_party_factor(
    analysis_years: u32,
    offtaker_discount_rate: f64,
    offtaker_tax_rate: f64,
    owner_discount_rate: f64,
    owner_tax_rate: f64,
) -> f64 {
    let pwf_offtaker = annuity(analysis_years, 0.0, offtaker_discount_rate);
    let pwf_owner = annuity(analysis_years, 0.0, owner_discount_rate);

    (pwf_offtaker * (1.0 - offtaker_tax_rate)) / (pwf_owner * (1.0 - owner_tax_rate))
}

/// Year-one differences between the optimal and business-as-usual cases
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProformaInputs {
    /// Up-front capital cost of the new technologies
    pub capital_cost: f64,
    /// Reduction in the utility bill, net of export credit
    pub year_one_bill_savings: f64,
    /// Reduction in fuel cost
    pub year_one_fuel_savings: f64,
    /// Increase in operation and maintenance cost
    pub year_one_om_increase: f64,
    /// Production incentives received
    pub year_one_incentive: f64,
    /// Length of the analysis period
    pub analysis_years: u32,
    /// Annual escalation of electricity costs
    pub elec_escalation_rate: f64,
    /// Annual escalation of fuel costs
    pub fuel_escalation_rate: f64,
    /// Annual escalation of O&M costs
    pub om_escalation_rate: f64,
    /// Offtaker discount rate
    pub discount_rate: f64,
    /// Offtaker tax rate
    pub tax_rate: f64,
}

/// Annual cash flows for the optimal case relative to business as usual
#[derive(Debug, Clone, PartialEq)]
pub struct Proforma {
    /// Net cash flow for year zero (capital) and each year of the analysis period
    pub net_cash_flows: Vec<f64>,
    /// Net present value of the cash flows
    pub npv: f64,
    /// Number of years until the cumulative (undiscounted) cash flow becomes positive
    pub simple_payback_years: Option<f64>,
}

/// Calculates a simple pro-forma cash flow
pub fn proforma(inputs: &ProformaInputs) -> Proforma {
    let mut net_cash_flows = Vec::with_capacity(inputs.analysis_years as usize + 1);
    net_cash_flows.push(-inputs.capital_cost);
    for year in 1..=inputs.analysis_years {
        let escalate = |rate: f64| (1.0 + rate).powi(year as i32 - 1);
        let pre_tax = inputs.year_one_bill_savings * escalate(inputs.elec_escalation_rate)
            + inputs.year_one_fuel_savings * escalate(inputs.fuel_escalation_rate)
            - inputs.year_one_om_increase * escalate(inputs.om_escalation_rate)
            + inputs.year_one_incentive;
        net_cash_flows.push(pre_tax * (1.0 - inputs.tax_rate));
    }

    let npv = net_cash_flows
        .iter()
        .zip(0..)
        .map(|(flow, year)| flow / (1.0 + inputs.discount_rate).powi(year))
        .sum();

    Proforma {
        simple_payback_years: simple_payback(&net_cash_flows),
        net_cash_flows,
        npv,
    }
}

/// Find the (fractional) year in which cumulative cash flow first becomes non-negative
fn simple_payback(net_cash_flows: &[f64]) -> Option<f64> {
    let mut cumulative = 0.0;
    for (year, flow) in net_cash_flows.iter().enumerate() {
        let previous = cumulative;
        cumulative += flow;
        if cumulative >= 0.0 {
            if year == 0 {
                return Some(0.0);
            }

            // Interpolate within the year
            return Some((year - 1) as f64 + (-previous / flow));
        }
    }

    None
}
