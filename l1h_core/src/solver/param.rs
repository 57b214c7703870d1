use num_traits::Float;

/// Solver parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverParam<F: Float>
{
    /// Tolerance of small positive value, relative to the quantity it is compared with.
    /// Used for singular pivots and for an index re-entering right after it left.
    pub eps_zero: F,
    /// Relative decrease of \\(\lambda\\) applied to step over a degenerate breakpoint.
    pub eps_degen: F,
    /// Period of breakpoints to recompute correlations from scratch. `0` means never.
    pub refresh_period: usize,
    /// Period of breakpoints to output progress log (for debug/trace level).
    pub log_period: usize,
    /// Number of the last operator columns excluded from the L1 penalty.
    pub basis: usize,
    /// Restricts coefficients to be nonnegative.
    pub positive: bool,
}

impl<F: Float> Default for SolverParam<F>
{
    fn default() -> Self
    {
        let eps = F::epsilon().sqrt();

        SolverParam {
            eps_zero: eps,
            eps_degen: eps,
            refresh_period: 32,
            log_period: 100,
            basis: 0,
            positive: false,
        }
    }
}
