use std::fmt::Display;
use num_traits::{Float, Num};
use l1h_core::solver::SolverParam;

/// Number from an environment variable.
///
/// Returns `None` if the variable is not set or not parsed as `N`.
pub fn num_by_env<N: Num + Display>(e: &str) -> Option<N>
{
    if let Some(v) = std::env::var(e).ok()
                     .and_then(|s| N::from_str_radix(s.trim(), 10).ok()) {
        log::info!("{}: {}", e, v);
        Some(v)
    }
    else {
        None
    }
}

/// Overrides solver parameters by environment variables.
///
/// | variable | parameter |
/// |---|---|
/// | `L1H_EPS_ZERO` | [`SolverParam::eps_zero`] |
/// | `L1H_EPS_DEGEN` | [`SolverParam::eps_degen`] |
/// | `L1H_REFRESH_PERIOD` | [`SolverParam::refresh_period`] |
/// | `L1H_LOG_PERIOD` | [`SolverParam::log_period`] |
///
/// Unset or unparsable variables leave the parameters as they are.
pub fn set_par_by_env<F: Float + Display>(p: &mut SolverParam<F>)
{
    p.eps_zero = num_by_env("L1H_EPS_ZERO").unwrap_or(p.eps_zero);
    p.eps_degen = num_by_env("L1H_EPS_DEGEN").unwrap_or(p.eps_degen);
    p.refresh_period = num_by_env("L1H_REFRESH_PERIOD").unwrap_or(p.refresh_period);
    p.log_period = num_by_env("L1H_LOG_PERIOD").unwrap_or(p.log_period);
}

//

#[test]
fn test_set_par_by_env()
{
    use float_eq::assert_float_eq;

    std::env::set_var("L1H_EPS_DEGEN", "1e-6");
    std::env::set_var("L1H_REFRESH_PERIOD", "8");
    std::env::set_var("L1H_LOG_PERIOD", "not a number");

    let mut p = SolverParam::<f64>::default();
    let org = p.clone();
    set_par_by_env(&mut p);

    std::env::remove_var("L1H_EPS_DEGEN");
    std::env::remove_var("L1H_REFRESH_PERIOD");
    std::env::remove_var("L1H_LOG_PERIOD");

    assert_eq!(p.eps_zero, org.eps_zero);
    assert_float_eq!(p.eps_degen, 1e-6, r2nd <= 1e-9);
    assert_eq!(p.refresh_period, 8);
    assert_eq!(p.log_period, org.log_period);
}
