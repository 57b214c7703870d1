use float_eq::assert_float_eq;
use l1h::prelude::*;
use l1h::*;

type ASession<'a> = Session<FloatGeneric<f64, MatOp<'a, f64>>>;

fn identity(n: usize) -> MatBuild<f64>
{
    MatBuild::new((n, n)).by_fn(|r, c| if r == c {1.} else {0.})
}

//

#[test]
fn test_session1()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = identity(4);
    let mut s = ASession::new().par(|p| {
        p.refresh_period = 4;
    });
    assert_eq!(s.state(), "Uninit");

    s.initialize(a.as_op(), 4).unwrap();
    assert_eq!(s.state(), "Cold");

    s.new_y_vector(&[3., 0., 0., 0.]).unwrap();
    assert_eq!(s.state(), "Ready");
    assert_float_eq!(s.lambda().unwrap(), 3., abs <= 1e-12);

    let rpt = s.solve(0.5, 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::Converged);
    assert_eq!(s.state(), "Converged");
    assert_float_eq!(s.lambda().unwrap(), 0.5, abs <= 1e-12);

    let x = s.get_x_vector().unwrap();
    assert_float_eq!(x[..], [2.5, 0., 0., 0.].as_ref(), abs_all <= 1e-9);
    assert_eq!(s.tracker().map(|t| t.active().to_vec()), Some(vec![0]));

    s.cleanup();
    assert_eq!(s.state(), "Released");
}

#[test]
fn test_session_state_errors()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = identity(4);
    let mut s = ASession::new();

    assert_eq!(s.new_y_vector(&[1.; 4]), Err(HomotopyError::State {op: "new_y_vector", state: "Uninit"}));
    assert_eq!(s.solve(0.5, 10), Err(HomotopyError::State {op: "solve", state: "Uninit"}));
    assert_eq!(s.get_x_vector(), Err(HomotopyError::State {op: "get_x_vector", state: "Uninit"}));

    s.initialize(a.as_op(), 4).unwrap();
    assert_eq!(s.initialize(a.as_op(), 4), Err(HomotopyError::State {op: "initialize", state: "Cold"}));
    assert_eq!(s.solve(0.5, 10), Err(HomotopyError::State {op: "solve", state: "Cold"}));
    assert_eq!(s.get_x_vector(), Err(HomotopyError::State {op: "get_x_vector", state: "Cold"}));
    assert_eq!(s.lambda(), Err(HomotopyError::State {op: "lambda", state: "Cold"}));

    assert_eq!(s.new_y_vector(&[1.; 3]), Err(HomotopyError::InvalidLen {expected: 4, actual: 3}));
    assert_eq!(s.state(), "Cold");

    s.new_y_vector(&[1., 2., 3., 4.]).unwrap();
    let mut x = [0.; 3];
    assert_eq!(s.get_x_into(&mut x), Err(HomotopyError::InvalidLen {expected: 4, actual: 3}));
    assert_eq!(s.solve(-0.5, 10), Err(HomotopyError::InvalidParam));

    s.cleanup();
    s.cleanup();
    assert_eq!(s.state(), "Released");
    assert_eq!(s.new_y_vector(&[1.; 4]), Err(HomotopyError::State {op: "new_y_vector", state: "Released"}));
    assert_eq!(s.solve(0.5, 10), Err(HomotopyError::State {op: "solve", state: "Released"}));
    assert_eq!(s.get_x_into(&mut x), Err(HomotopyError::State {op: "get_x_vector", state: "Released"}));
    assert_eq!(s.initialize(a.as_op(), 4), Err(HomotopyError::State {op: "initialize", state: "Released"}));

    // dropped without cleanup
    let mut s = ASession::new();
    s.initialize(a.as_op(), 4).unwrap();
    s.new_y_vector(&[1., 2., 3., 4.]).unwrap();
    drop(s);
}

#[test]
fn test_session_readback()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = MatBuild::new((3, 5)).iter_rowmaj(&[
        1., 0.5, 0., 2., -1.,
        0., 1., 1., -1., 0.5,
        2., 0., 1., 0.5, 1.,
    ]).normalize_cols();
    let mut s = initialize(a.as_op(), 3, SolverParam::default()).unwrap();

    s.new_y_vector(&[1., -2., 0.5]).unwrap();
    let lambda_max = s.lambda().unwrap();
    s.solve(lambda_max * 0.3, 100).unwrap();

    let x1 = s.get_x_vector().unwrap();
    let x2 = s.get_x_vector().unwrap();
    let mut x3 = vec![0.; 5];
    s.get_x_into(&mut x3).unwrap();

    assert_eq!(x1, x2);
    assert_eq!(x1, x3);
    assert!(x1.iter().any(|&v| v != 0.));
}

#[test]
fn test_session_new_y()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = identity(4);
    let y1 = [3., -2., 1., 0.];
    let y2 = [0., 1., -4., 2.];

    let mut s = initialize(a.as_op(), 4, SolverParam::default()).unwrap();
    s.new_y_vector(&y1).unwrap();
    s.solve(0.5, 100).unwrap();
    assert_float_eq!(s.get_x_vector().unwrap()[..], [2.5, -1.5, 0.5, 0.].as_ref(), abs_all <= 1e-9);

    // operator-derived state is reused
    s.new_y_vector(&y2).unwrap();
    assert_eq!(s.state(), "Ready");
    assert_float_eq!(s.lambda().unwrap(), 4., abs <= 1e-12);
    s.solve(0.5, 100).unwrap();
    assert_float_eq!(s.get_x_vector().unwrap()[..], [0., 0.5, -3.5, 1.5].as_ref(), abs_all <= 1e-9);
}

#[test]
fn test_session_isolation()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let a = identity(4);
    let y1 = [3., -2., 1., 0.];
    let y2 = [0., 1., -4., 2.];

    let solo = |y: &[f64]| {
        let mut s = initialize(a.as_op(), 4, SolverParam::default()).unwrap();
        s.new_y_vector(y).unwrap();
        s.solve(0.5, 100).unwrap();
        s.get_x_vector().unwrap()
    };
    let x1 = solo(&y1);
    let x2 = solo(&y2);

    // interleaved calls
    let mut s1 = initialize(a.as_op(), 4, SolverParam::default()).unwrap();
    let mut s2 = initialize(a.as_op(), 4, SolverParam::default()).unwrap();
    s1.new_y_vector(&y1).unwrap();
    s2.new_y_vector(&y2).unwrap();
    s1.solve(1.5, 100).unwrap();
    s2.solve(1.5, 100).unwrap();
    s2.solve(0.5, 100).unwrap();
    s1.solve(0.5, 100).unwrap();
    assert_float_eq!(s1.get_x_vector().unwrap(), x1, abs_all <= 1e-12);
    assert_float_eq!(s2.get_x_vector().unwrap(), x2, abs_all <= 1e-12);

    // sessions on separate threads
    let hs: Vec<_> = [y1, y2].into_iter().map(|y| {
        std::thread::spawn(move || {
            let a = identity(4);
            let mut s = initialize(a.as_op(), 4, SolverParam::default()).unwrap();
            s.new_y_vector(&y).unwrap();
            s.solve(0.5, 100).unwrap();
            s.get_x_vector().unwrap()
        })
    }).collect();
    let xs: Vec<_> = hs.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(xs[0], x1);
    assert_eq!(xs[1], x2);
}

#[test]
fn test_session_positive_basis()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // identity and a constant column
    let a = MatBuild::new((4, 5)).by_fn(|r, c| if r == c || c == 4 {1.} else {0.});
    let mut s = ASession::new().par(|p| {
        p.basis = 1;
        p.positive = true;
    });
    s.initialize(a.as_op(), 5).unwrap();

    s.new_y_vector(&[5., 1., 1., -3.]).unwrap();
    // background fit 1, residual [4, 0, 0, -4]
    assert_float_eq!(s.lambda().unwrap(), 4., abs <= 1e-12);

    let rpt = s.solve(2., 100).unwrap();
    assert_eq!(rpt.status, SolveStatus::Converged);
    let x = s.get_x_vector().unwrap();
    assert_float_eq!(x[..], [8. / 3., 0., 0., 0., 1. / 3.].as_ref(), abs_all <= 1e-9);
}
