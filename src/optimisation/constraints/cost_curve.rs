//! Piecewise-linear capital costs.
use crate::finance::effective_cost;
use crate::optimisation::BuildContext;
use crate::optimisation::problem::{LinearExpr, Problem};
use crate::optimisation::variables::SegmentVariables;
use crate::technology::{CostSegment, Technology};

/// Select one segment of a technology's cost curve and return the resulting capital cost.
///
/// The cost is `slope * size + intercept` on the chosen segment, reduced by tax incentives in the
/// same proportion as a linear cost would be.
pub fn add_cost_curve_constraints(
    problem: &mut Problem,
    ctx: &BuildContext,
    tech: &Technology,
    curve: &[CostSegment],
    segments: &[SegmentVariables],
) -> LinearExpr {
    let vars = &ctx.vars.techs[&tech.id];

    // Exactly one segment is active
    problem.add_row(1.0..=1.0, segments.iter().map(|seg| (seg.active, 1.0)));

    for (segment, seg_vars) in curve.iter().zip(segments) {
        problem.add_row(
            0.0..,
            [(seg_vars.size, 1.0), (seg_vars.active, -segment.min_kw.value())],
        );
        problem.add_row(
            ..=0.0,
            [(seg_vars.size, 1.0), (seg_vars.active, -segment.max_kw.value())],
        );
    }

    // Purchased size is the size within the active segment
    problem.add_row(
        0.0..=0.0,
        std::iter::once((vars.purchase_size, 1.0))
            .chain(segments.iter().map(|seg| (seg.size, -1.0))),
    );

    let multiplier = effective_cost(
        1.0,
        &tech.incentives,
        None,
        ctx.factors.owner_discount_rate,
        ctx.factors.owner_tax_rate,
    );
    let mut capital = LinearExpr::default();
    for (segment, seg_vars) in curve.iter().zip(segments) {
        capital.add_term(seg_vars.size, segment.slope.value() * multiplier);
        capital.add_term(seg_vars.active, segment.intercept * multiplier);
    }

    capital
}
