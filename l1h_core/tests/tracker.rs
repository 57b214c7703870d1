use float_eq::assert_float_eq;
use rand::prelude::*;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use l1h_core::solver::*;
use l1h_core::{FloatGeneric, MatOp};

type Backend<'a> = FloatGeneric<f64, MatOp<'a, f64>>;

//

const IDENTITY4: [f64; 16] = [ // column-major
    1., 0., 0., 0.,
    0., 1., 0., 0.,
    0., 0., 1., 0.,
    0., 0., 0., 1.,
];

fn tracker<'a>(a: &'a[f64], (m, n): (usize, usize), max_active: usize, par: SolverParam<f64>) -> PathTracker<Backend<'a>>
{
    PathTracker::new(FloatGeneric::new(MatOp::new((m, n), a), max_active), par).unwrap()
}

// y = A x_true + noise with a sparse x_true
fn rand_problem(m: usize, n: usize, seed: u64) -> (Vec<f64>, Vec<f64>)
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(seed);

    let a: Vec<f64> = (0.. m * n).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut x_true = vec![0.; n];
    for (i, v) in [(3, 1.5), (11, -2.), (17, 1.), (29, 0.8)] {
        x_true[i % n] = v;
    }

    let mut y: Vec<f64> = (0.. m).map(|_| 0.01 * rng.gen_range(-1.0..1.0)).collect();
    MatOp::new((m, n), &a).op(1., &x_true, 1., &mut y);

    (a, y)
}

// optimality conditions checked with c = A^T (y - A x) calculated independently
fn assert_optimal(a: &[f64], (m, n): (usize, usize), y: &[f64], x: &[f64], lambda: f64, par: &SolverParam<f64>)
{
    let op = MatOp::new((m, n), a);
    let mut r = y.to_vec();
    op.op(-1., x, 1., &mut r);
    let mut c = vec![0.; n];
    op.trans_op(1., &r, 0., &mut c);

    let tol = 1e-8 * (1. + lambda);
    for i in 0.. n {
        if i >= n - par.basis {
            assert_float_eq!(c[i], 0., abs <= tol);
        }
        else if x[i].abs() > tol {
            assert!(!par.positive || x[i] > 0.);
            assert_float_eq!(c[i], x[i].signum() * lambda, abs <= tol);
        }
        else if par.positive {
            assert!(c[i] <= lambda + tol, "c[{}] = {} > {}", i, c[i], lambda);
        }
        else {
            assert!(c[i].abs() <= lambda + tol, "|c[{}]| = {} > {}", i, c[i].abs(), lambda);
        }
    }
}

// active penalized coefficients never oppose their recorded signs
fn assert_signs<B: GramBackend<F = f64>>(t: &PathTracker<B>)
{
    for (&a, &s) in t.active().iter().zip(t.signs()) {
        assert!(s * t.x()[a] >= -1e-12, "x[{}] = {} against sign {}", a, t.x()[a], s);
    }
}

//

#[test]
fn test_identity()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut t = tracker(&IDENTITY4, (4, 4), 4, SolverParam::default());
    assert_eq!(t.state(), TrackerState::Cold);

    t.new_y(&[3., 0., 0., 0.]).unwrap();
    assert_eq!(t.state(), TrackerState::Ready);
    assert_float_eq!(t.lambda(), 3., abs <= 1e-12);

    let rpt = t.solve(0.5, 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::Converged);
    assert_eq!(rpt.iterations, 1);
    assert_eq!(rpt.degeneracies, 0);
    assert_eq!(t.state(), TrackerState::Converged);

    assert_float_eq!(t.lambda(), 0.5, abs <= 1e-12);
    assert_float_eq!(t.x(), [2.5, 0., 0., 0.].as_ref(), abs_all <= 1e-9);
    assert_eq!(t.active(), &[0]);
    assert_eq!(t.signs(), &[1.]);
}

#[test]
fn test_signs_and_positive()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let y = [3., -2., 1., 0.];

    let mut t = tracker(&IDENTITY4, (4, 4), 4, SolverParam::default());
    t.new_y(&y).unwrap();
    let rpt = t.solve(0.5, 100).unwrap();
    assert_eq!(rpt.iterations, 3);
    assert_float_eq!(t.x(), [2.5, -1.5, 0.5, 0.].as_ref(), abs_all <= 1e-9);
    assert_eq!(t.active(), &[0, 1, 2]);
    assert_eq!(t.signs(), &[1., -1., 1.]);

    let mut par = SolverParam::default();
    par.positive = true;
    let mut t = tracker(&IDENTITY4, (4, 4), 4, par.clone());
    t.new_y(&y).unwrap();
    t.solve(0.5, 100).unwrap();
    assert_float_eq!(t.x(), [2.5, 0., 0.5, 0.].as_ref(), abs_all <= 1e-9);
    assert_optimal(&IDENTITY4, (4, 4), &y, t.x(), t.lambda(), &par);
}

#[test]
fn test_basis()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // identity and a constant column
    let mut a = IDENTITY4.to_vec();
    a.extend_from_slice(&[1., 1., 1., 1.]);
    let y = [5., 1., 1., 1.];

    let mut par = SolverParam::default();
    par.basis = 1;
    let mut t = tracker(&a, (4, 5), 5, par.clone());

    t.new_y(&y).unwrap();
    assert_float_eq!(t.lambda(), 3., abs <= 1e-12);
    assert_float_eq!(t.x(), [0., 0., 0., 0., 2.].as_ref(), abs_all <= 1e-12);
    assert_eq!(t.active(), &[4]);

    let rpt = t.solve(1.5, 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::Converged);
    assert_float_eq!(t.x(), [2., 0., 0., 0., 1.5].as_ref(), abs_all <= 1e-9);
    assert_eq!(t.active(), &[4, 0]);
    assert_eq!(t.signs(), &[0., 1.]);
    assert_optimal(&a, (4, 5), &y, t.x(), t.lambda(), &par);
}

#[test]
fn test_optimality_random()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let (m, n) = (40, 50);
    let (a, y) = rand_problem(m, n, 1);
    let par = SolverParam::default();

    let mut t = tracker(&a, (m, n), n, par.clone());
    t.new_y(&y).unwrap();
    assert_optimal(&a, (m, n), &y, t.x(), t.lambda(), &par);

    let lambda_max = t.lambda();
    for ratio in [0.5, 0.2, 0.05] {
        let target = lambda_max * ratio;
        let rpt = t.solve(target, 1000).unwrap();
        assert_eq!(rpt.status, SolveStatus::Converged);
        assert_float_eq!(rpt.lambda, target, abs <= 1e-12);
        assert_optimal(&a, (m, n), &y, t.x(), t.lambda(), &par);
    }

    // the correlation kept by the tracker does not drift
    let mut c = y.clone();
    MatOp::new((m, n), &a).op(-1., t.x(), 1., &mut c);
    let mut atr = vec![0.; n];
    MatOp::new((m, n), &a).trans_op(1., &c, 0., &mut atr);
    assert_float_eq!(t.correlation(), atr.as_ref(), abs_all <= 1e-8);
}

#[test]
fn test_stepping()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let (m, n) = (30, 45);
    let (a, y) = rand_problem(m, n, 2);
    let par = SolverParam::default();

    let mut t_one = tracker(&a, (m, n), n, par.clone());
    t_one.new_y(&y).unwrap();
    let target = t_one.lambda() * 0.05;
    let rpt_one = t_one.solve(target, 1000).unwrap();
    assert_eq!(rpt_one.status, SolveStatus::Converged);

    let mut t = tracker(&a, (m, n), n, par.clone());
    t.new_y(&y).unwrap();

    let mut lambda = t.lambda();
    let mut entered = vec![0; n];
    let mut was_active = vec![false; n];
    let mut steps = 0;

    loop {
        let rpt = t.solve(target, 1).unwrap();
        steps += 1;
        assert!(steps <= rpt_one.iterations + 1);

        assert!(rpt.lambda <= lambda);
        lambda = rpt.lambda;
        assert_optimal(&a, (m, n), &y, t.x(), t.lambda(), &par);

        for i in 0.. n {
            let is_active = t.active().contains(&i);
            if is_active && !was_active[i] {
                entered[i] += 1;
            }
            was_active[i] = is_active;
        }

        if rpt.status == SolveStatus::Converged {
            break;
        }
        assert_eq!(rpt.status, SolveStatus::IterLimit);
        assert_eq!(t.state(), TrackerState::Tracking);
    }

    assert_float_eq!(t.lambda(), target, abs <= 1e-12);
    assert_float_eq!(t.x(), t_one.x(), abs_all <= 1e-9);
    assert!(entered.iter().all(|&e| e <= 3), "{:?}", entered);
}

#[test]
fn test_tied_breakpoints()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // integer data: indices 0 and 2 enter at the same lambda 2,
    // then 0 heads against its sign and has to leave at once
    let (m, n) = (4, 5);
    let a = [ // column-major
        -2., 2., -2., 2.,
         2., 1.,  2., 2.,
         0., 2., -2., 2.,
         0., -1., 2., 2.,
         2., 1.,  0., 2.,
    ];
    let y = [-2., -1., -3., -2.];
    let par = SolverParam::default();

    let mut t = tracker(&a, (m, n), n, par.clone());
    t.new_y(&y).unwrap();
    assert_float_eq!(t.lambda(), 15., abs <= 1e-12);

    let target = 0.05;
    let mut steps = 0;

    loop {
        let rpt = t.solve(target, 1).unwrap();
        steps += 1;
        assert!(steps <= 20);

        assert_signs(&t);
        assert_optimal(&a, (m, n), &y, t.x(), t.lambda(), &par);

        if rpt.status == SolveStatus::Converged {
            break;
        }
        assert_eq!(rpt.status, SolveStatus::IterLimit);
    }

    assert!(!t.active().contains(&0));
    assert_float_eq!(t.x(), [0., -347. / 240., 1. / 48., -1. / 120., 103. / 240.].as_ref(), abs_all <= 1e-9);
}

#[test]
fn test_refresh()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let (m, n) = (25, 30);
    let (a, y) = rand_problem(m, n, 3);

    let mut xs = Vec::new();
    for refresh_period in [0, 1, 5] {
        let mut par = SolverParam::default();
        par.refresh_period = refresh_period;
        par.log_period = 1;

        let mut t = tracker(&a, (m, n), n, par.clone());
        t.new_y(&y).unwrap();
        let target = t.lambda() * 0.1;
        t.solve(target, 1000).unwrap();
        assert_optimal(&a, (m, n), &y, t.x(), t.lambda(), &par);
        xs.push(t.x().to_vec());
    }

    assert_float_eq!(xs[0], xs[1], abs_all <= 1e-9);
    assert_float_eq!(xs[0], xs[2], abs_all <= 1e-9);
}

#[test]
fn test_no_op_calls()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut t = tracker(&IDENTITY4, (4, 4), 4, SolverParam::default());
    t.new_y(&[3., 0., 0., 0.]).unwrap();

    let rpt = t.solve(0.5, 0).unwrap();
    assert_eq!(rpt.status, SolveStatus::IterLimit);
    assert_eq!(rpt.iterations, 0);
    assert_float_eq!(t.lambda(), 3., abs <= 1e-12);
    assert_float_eq!(t.x(), [0.; 4].as_ref(), abs_all <= 0.);

    t.solve(0.5, 100).unwrap();
    let x = t.x().to_vec();

    // backward target
    let rpt = t.solve(1., 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::Converged);
    assert_eq!(rpt.iterations, 0);
    assert_float_eq!(rpt.lambda, 0.5, abs <= 1e-12);
    assert_float_eq!(t.x(), x.as_ref(), abs_all <= 0.);
}

#[test]
fn test_active_set_full()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let y = [3., -2., 1., 0.5];
    let mut t = tracker(&IDENTITY4, (4, 4), 2, SolverParam::default());
    assert_eq!(t.backend().capacity(), 2);

    t.new_y(&y).unwrap();
    let rpt = t.solve(0.1, 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::ActiveSetFull);
    assert_float_eq!(rpt.lambda, 1., abs <= 1e-12);
    assert_float_eq!(t.x(), [2., -1., 0., 0.].as_ref(), abs_all <= 1e-9);
    assert_optimal(&IDENTITY4, (4, 4), &y, t.x(), t.lambda(), t.par());
}

#[test]
fn test_errors()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut t = tracker(&IDENTITY4, (4, 4), 4, SolverParam::default());
    assert_eq!(t.solve(0.5, 10), Err(HomotopyError::State {op: "solve", state: "Cold"}));
    assert_eq!(t.new_y(&[1., 2., 3.]), Err(HomotopyError::InvalidLen {expected: 4, actual: 3}));
    assert_eq!(t.state(), TrackerState::Cold);

    t.new_y(&[1., 2., 3., 4.]).unwrap();
    assert_eq!(t.solve(-1., 10), Err(HomotopyError::InvalidParam));
    assert_eq!(t.solve(f64::NAN, 10), Err(HomotopyError::InvalidParam));
    assert_eq!(t.solve(f64::INFINITY, 10), Err(HomotopyError::InvalidParam));
    assert_eq!(t.state(), TrackerState::Ready);

    let mut par = SolverParam::default();
    par.basis = 5;
    let r = PathTracker::new(FloatGeneric::new(MatOp::new((4, 4), &IDENTITY4), 4), par);
    assert!(matches!(r, Err(HomotopyError::InvalidParam)));

    let r = PathTracker::new(FloatGeneric::new(MatOp::<f64>::new((0, 0), &[]), 4), SolverParam::default());
    assert!(matches!(r, Err(HomotopyError::InvalidOp)));

    // dependent basis columns
    let mut a = IDENTITY4.to_vec();
    a.extend_from_slice(&[1., 1., 0., 0.]);
    a.extend_from_slice(&[2., 2., 0., 0.]);
    let mut par = SolverParam::default();
    par.basis = 2;
    let mut t = tracker(&a, (4, 6), 6, par);
    assert_eq!(t.new_y(&[1., 2., 3., 4.]), Err(HomotopyError::Singular));
    assert_eq!(t.state(), TrackerState::Cold);
}

//

// fails to insert an index once, as a dependent column does
struct SingularOnce<'a>
{
    inner: Backend<'a>,
    idx: Option<usize>,
}

// returns a non-finite direction once the active set reaches a size
struct NanSolve<'a>
{
    inner: Backend<'a>,
    at: usize,
}

macro_rules! delegate_backend {
    () => {
        type F = f64;

        fn size(&self) -> (usize, usize) {self.inner.size()}
        fn capacity(&self) -> usize {self.inner.capacity()}
        fn active(&self) -> &[usize] {self.inner.active()}
        fn load_y(&mut self, y: &[f64], aty: &mut[f64]) -> Result<(), HomotopyError> {self.inner.load_y(y, aty)}
        fn remove(&mut self, pos: usize) -> Result<(), HomotopyError> {self.inner.remove(pos)}
        fn reset(&mut self) {self.inner.reset()}
        fn gram_apply(&mut self, v: &[f64], out: &mut[f64]) -> Result<(), HomotopyError> {self.inner.gram_apply(v, out)}
    };
}

impl<'a> GramBackend for SingularOnce<'a>
{
    delegate_backend!();

    fn insert(&mut self, j: usize, eps_zero: f64) -> Result<(), HomotopyError>
    {
        if self.idx == Some(j) {
            self.idx = None;
            return Err(HomotopyError::Singular);
        }
        self.inner.insert(j, eps_zero)
    }

    fn solve(&mut self, rhs: &[f64], sol: &mut[f64]) -> Result<(), HomotopyError>
    {
        self.inner.solve(rhs, sol)
    }
}

impl<'a> GramBackend for NanSolve<'a>
{
    delegate_backend!();

    fn insert(&mut self, j: usize, eps_zero: f64) -> Result<(), HomotopyError>
    {
        self.inner.insert(j, eps_zero)
    }

    fn solve(&mut self, rhs: &[f64], sol: &mut[f64]) -> Result<(), HomotopyError>
    {
        self.inner.solve(rhs, sol)?;
        if rhs.len() >= self.at {
            sol.fill(f64::NAN);
        }
        Ok(())
    }
}

#[test]
fn test_degeneracy()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = SingularOnce {
        inner: FloatGeneric::new(MatOp::new((4, 4), &IDENTITY4), 4),
        idx: Some(1),
    };
    let mut t = PathTracker::new(backend, SolverParam::default()).unwrap();

    t.new_y(&[3., -2., 1., 0.]).unwrap();
    let rpt = t.solve(0.5, 100).unwrap();

    assert_eq!(rpt.status, SolveStatus::Converged);
    assert_eq!(rpt.degeneracies, 1);
    assert_float_eq!(rpt.lambda, 0.5, abs <= 1e-12);
    // index 1 is blocked at its breakpoint and enters at the next one
    assert_eq!(t.active(), &[0, 2, 1]);
    assert_eq!(t.signs(), &[1., 1., -1.]);
}

#[test]
fn test_divergence()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = NanSolve {
        inner: FloatGeneric::new(MatOp::new((4, 4), &IDENTITY4), 4),
        at: 2,
    };
    let mut t = PathTracker::new(backend, SolverParam::default()).unwrap();

    t.new_y(&[3., -2., 1., 0.]).unwrap();
    assert_eq!(t.solve(0.5, 100), Err(HomotopyError::Divergence {lambda: 2.}));

    // the last valid breakpoint is kept
    assert_float_eq!(t.lambda(), 2., abs <= 1e-12);
    assert_float_eq!(t.x(), [1., 0., 0., 0.].as_ref(), abs_all <= 1e-12);
    assert_eq!(t.active(), &[0, 1]);
}

#[test]
fn test_degeneracy_leave()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = [ // column-major
        -0.4, -0.4, -0.3,
         0.5, -0.2,  0.2,
        -0.8,  0.8, -0.8,
    ];
    let backend = SingularOnce {
        inner: FloatGeneric::new(MatOp::new((3, 3), &a), 3),
        idx: Some(0),
    };
    let par = SolverParam {
        eps_degen: 0.5,
        ..Default::default()
    };
    let mut t = PathTracker::new(backend, par).unwrap();

    t.new_y(&[-0.7, 0.4, 0.1]).unwrap();
    assert_float_eq!(t.lambda(), 0.8, abs <= 1e-12);

    let mut degeneracies = 0;
    let mut steps = 0;

    loop {
        let rpt = t.solve(0.01, 1).unwrap();
        steps += 1;
        assert!(steps <= 20);
        assert_signs(&t);

        if rpt.degeneracies > 0 {
            // the step over index 0 stops where index 2 reaches zero,
            // short of 0.5 lambda
            assert_float_eq!(t.lambda(), 0.08, abs <= 1e-12);
            assert_eq!(t.active(), &[2, 1]);
            assert_float_eq!(t.x(), [0., -1., 0.].as_ref(), abs_all <= 1e-12);
        }
        degeneracies += rpt.degeneracies;

        if rpt.status == SolveStatus::Converged {
            break;
        }
    }

    assert_eq!(degeneracies, 1);
    assert_float_eq!(t.lambda(), 0.01, abs <= 1e-12);
}
