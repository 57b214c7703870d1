//! Homotopy path tracker

use num_traits::{Float, Zero, One, ToPrimitive};
use core::fmt::{Debug, LowerExp};
use alloc::vec;
use alloc::vec::Vec;
use crate::solver::{GramBackend, HomotopyError, SolverParam};

//

/// States of [`PathTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState
{
    /// No measurement vector is loaded.
    Cold,
    /// A measurement vector is loaded and no breakpoint is processed yet.
    Ready,
    /// Breakpoints are being processed.
    Tracking,
    /// The last target \\(\lambda\\) is reached.
    Converged,
}

impl TrackerState
{
    /// Name of the state used in [`HomotopyError::State`].
    pub fn name(&self) -> &'static str
    {
        match self {
            TrackerState::Cold      => "Cold",
            TrackerState::Ready     => "Ready",
            TrackerState::Tracking  => "Tracking",
            TrackerState::Converged => "Converged",
        }
    }
}

/// Reason why [`PathTracker::solve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus
{
    /// The target \\(\lambda\\) is reached.
    Converged,
    /// The number of breakpoints reached `max_iter` before the target.
    IterLimit,
    /// An index had to enter the active set at its capacity.
    ActiveSetFull,
}

/// Report of [`PathTracker::solve`].
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport<F>
{
    /// \\(\lambda\\) reached.
    pub lambda: F,
    /// Number of breakpoints processed.
    pub iterations: usize,
    /// Reason of return.
    pub status: SolveStatus,
    /// Number of degenerate breakpoints stepped over by perturbing \\(\lambda\\).
    pub degeneracies: usize,
}

//

#[derive(Debug, Clone, Copy)]
enum Event<F>
{
    Target,
    Enter(usize, F),
    Leave(usize),
}

struct Step<F>
{
    delta: F,
    idx: usize,
    event: Event<F>,
}

impl<F: Float> Step<F>
{
    // the target wins ties, otherwise the smallest index does
    fn offer(&mut self, delta: F, idx: usize, event: Event<F>)
    {
        let better = match self.event {
            Event::Target => delta < self.delta,
            _ => delta < self.delta || (delta == self.delta && idx < self.idx),
        };
        if better {
            self.delta = delta;
            self.idx = idx;
            self.event = event;
        }
    }
}

//

/// Homotopy path tracker struct.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// This struct follows the solution path of
/// \\[
/// \begin{array}{ll}
/// {\rm minimize} & {1 \over 2} \\|y - A x\\|_2^2 + \lambda \sum_{i \in P} |x_i|
/// \end{array}
/// \\]
/// as \\(\lambda\\) decreases, where \\(P\\) excludes the last [`SolverParam::basis`] columns.
/// Along the path the correlation \\(c = A^T (y - A x)\\) keeps
/// \\(c_i = s_i \lambda\\) for active \\(i \in P\\) with sign \\(s_i\\),
/// \\(|c_i| \le \lambda\\) for inactive \\(i\\) and \\(c_i = 0\\) for the basis columns.
///
/// Linear algebra is delegated to a [`GramBackend`], so that the same breakpoint logic runs on any backend.
/// Host vectors are allocated in [`PathTracker::new`] only.
pub struct PathTracker<B: GramBackend>
{
    par: SolverParam<B::F>,
    backend: B,
    state: TrackerState,
    lambda: B::F,

    x: Vec<B::F>,
    c: Vec<B::F>,
    aty: Vec<B::F>,
    dc: Vec<B::F>,

    sign: Vec<B::F>,
    dir: Vec<B::F>,
    work_k: Vec<B::F>,

    is_active: Vec<bool>,
    blocked: Vec<bool>,
    any_blocked: bool,
    left: Option<usize>,
    breakpoints: usize,
}

impl<B: GramBackend> PathTracker<B>
{
    /// Creates an instance in [`TrackerState::Cold`].
    ///
    /// Returns [`PathTracker`] instance,
    /// or `Err` with [`HomotopyError::InvalidOp`] for an empty backend
    /// and [`HomotopyError::InvalidParam`] if the basis columns do not fit.
    /// * `backend` is moved into the tracker.
    /// * `par` is the solver parameters.
    pub fn new(backend: B, par: SolverParam<B::F>) -> Result<Self, HomotopyError>
    {
        let (m, n) = backend.size();
        let cap = backend.capacity();

        if m == 0 || n == 0 {
            log::error!("Operator size must be nonzero: {:?}", (m, n));
            return Err(HomotopyError::InvalidOp);
        }
        if par.basis > n || par.basis > cap {
            log::error!("Basis columns {} must be <= {} and <= capacity {}", par.basis, n, cap);
            return Err(HomotopyError::InvalidParam);
        }

        let f0 = B::F::zero();

        Ok(PathTracker {
            par,
            backend,
            state: TrackerState::Cold,
            lambda: f0,
            x: vec![f0; n],
            c: vec![f0; n],
            aty: vec![f0; n],
            dc: vec![f0; n],
            sign: Vec::with_capacity(cap),
            dir: vec![f0; cap],
            work_k: vec![f0; cap],
            is_active: vec![false; n],
            blocked: vec![false; n],
            any_blocked: false,
            left: None,
            breakpoints: 0,
        })
    }

    /// Solver parameters.
    pub fn par(&self) -> &SolverParam<B::F>
    {
        &self.par
    }

    /// Current state.
    pub fn state(&self) -> TrackerState
    {
        self.state
    }

    /// Current \\(\lambda\\).
    pub fn lambda(&self) -> B::F
    {
        self.lambda
    }

    /// Current coefficient vector \\(x\\), of length \\(n\\).
    pub fn x(&self) -> &[B::F]
    {
        &self.x
    }

    /// Current correlation vector \\(c = A^T (y - A x)\\), of length \\(n\\).
    pub fn correlation(&self) -> &[B::F]
    {
        &self.c
    }

    /// Active indices, in the order of [`PathTracker::signs`].
    pub fn active(&self) -> &[usize]
    {
        self.backend.active()
    }

    /// Signs of the active indices; `0` for the basis columns.
    pub fn signs(&self) -> &[B::F]
    {
        &self.sign
    }

    /// Backend holding the active set and its factor.
    pub fn backend(&self) -> &B
    {
        &self.backend
    }

    fn lambda_max(&self) -> B::F
    {
        let (_, n) = self.backend.size();
        let mut lambda = B::F::zero();

        for &ci in &self.c[.. n - self.par.basis] {
            let v = if self.par.positive {ci} else {ci.abs()};
            lambda = lambda.max(v);
        }
        lambda
    }

    fn clear_blocked(&mut self)
    {
        if self.any_blocked {
            self.blocked.fill(false);
            self.any_blocked = false;
        }
    }

    // x_A += delta * dir, c -= delta * dc, lambda -= delta
    fn advance(&mut self, delta: B::F)
    {
        for (pos, &a) in self.backend.active().iter().enumerate() {
            self.x[a] = self.x[a] + delta * self.dir[pos];
        }
        for (ci, &dci) in self.c.iter_mut().zip(&self.dc) {
            *ci = *ci - delta * dci;
        }
        self.lambda = self.lambda - delta;
        self.pin_active();
    }

    fn pin_active(&mut self)
    {
        for (pos, &a) in self.backend.active().iter().enumerate() {
            self.c[a] = self.sign[pos] * self.lambda;
        }
    }

    fn refresh(&mut self) -> Result<(), HomotopyError>
    {
        let k = self.backend.active().len();
        for (pos, &a) in self.backend.active().iter().enumerate() {
            self.work_k[pos] = self.x[a];
        }
        self.backend.gram_apply(&self.work_k[.. k], &mut self.dc)?;

        for ((ci, &atyi), &dci) in self.c.iter_mut().zip(&self.aty).zip(&self.dc) {
            *ci = atyi - dci;
        }
        self.pin_active();
        Ok(())
    }

    // step length until the active coefficient at `pos` reaches zero;
    // zero if it already stands at or past zero while heading against its sign
    fn leave_delta(&self, pos: usize, a: usize) -> Option<B::F>
    {
        let f0 = B::F::zero();
        let d = self.dir[pos];

        if self.sign[pos] * d < f0 {
            Some((-self.x[a] / d).max(f0))
        }
        else {
            None
        }
    }

    fn leave_bound(&self) -> B::F
    {
        let mut bound = B::F::infinity();

        for (pos, &a) in self.backend.active().iter().enumerate() {
            if let Some(delta) = self.leave_delta(pos, a) {
                bound = bound.min(delta);
            }
        }
        bound
    }

    fn next_step(&self, target: B::F) -> Step<B::F>
    {
        let f0 = B::F::zero();
        let f1 = B::F::one();
        let (_, n) = self.backend.size();
        let lambda = self.lambda;

        let mut step = Step {
            delta: lambda - target,
            idx: usize::MAX,
            event: Event::Target,
        };

        // active coefficient reaching zero
        for (pos, &a) in self.backend.active().iter().enumerate() {
            if let Some(delta) = self.leave_delta(pos, a) {
                step.offer(delta, a, Event::Leave(pos));
            }
        }

        // inactive correlation reaching +-(lambda - delta)
        let eps_reenter = self.par.eps_zero * lambda;
        for i in 0.. n - self.par.basis {
            if self.is_active[i] || self.blocked[i] {
                continue;
            }
            let ci = self.c[i];
            let ai = self.dc[i];

            let mut offer = |delta: B::F, s: B::F| {
                if self.left != Some(i) || delta > eps_reenter {
                    step.offer(delta, i, Event::Enter(i, s));
                }
            };

            let den = f1 - ai;
            if den > f0 {
                offer(((lambda - ci) / den).max(f0), f1);
            }
            if !self.par.positive {
                let den = f1 + ai;
                if den > f0 {
                    offer(((lambda + ci) / den).max(f0), -f1);
                }
            }
        }

        step
    }
}

impl<B: GramBackend> PathTracker<B>
where B::F: Debug + LowerExp
{
    fn diverged(&self) -> HomotopyError
    {
        log::error!("----- Divergence at lambda {:.3e}", self.lambda);

        HomotopyError::Divergence {
            lambda: self.lambda.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// Loads a new measurement vector and moves to [`TrackerState::Ready`].
    ///
    /// The coefficients are reset to zero except the basis columns,
    /// which are fitted to `y` by least squares;
    /// \\(\lambda\\) is set to the smallest value for which this is the optimal solution.
    /// Returns `Err` with [`HomotopyError::InvalidLen`] if the length of `y` is not \\(m\\),
    /// or the backend error (e.g. [`HomotopyError::Singular`] for dependent basis columns),
    /// leaving the tracker in [`TrackerState::Cold`].
    /// * `y` is a measurement vector \\(y\\).
    pub fn new_y(&mut self, y: &[B::F]) -> Result<(), HomotopyError>
    {
        let (m, n) = self.backend.size();
        let f0 = B::F::zero();

        if y.len() != m {
            log::error!("Measurement length {} must be {}", y.len(), m);
            return Err(HomotopyError::InvalidLen {expected: m, actual: y.len()});
        }

        self.state = TrackerState::Cold;
        self.backend.load_y(y, &mut self.aty)?;

        self.x.fill(f0);
        self.c.copy_from_slice(&self.aty);
        self.sign.clear();
        self.is_active.fill(false);
        self.blocked.fill(false);
        self.any_blocked = false;
        self.left = None;
        self.breakpoints = 0;

        let basis = self.par.basis;
        if basis > 0 {
            for j in n - basis.. n {
                if let Err(e) = self.backend.insert(j, self.par.eps_zero) {
                    log::error!("Basis column {} cannot be factorized: {}", j, e);
                    self.backend.reset();
                    self.sign.clear();
                    self.is_active.fill(false);
                    return Err(e);
                }
                self.sign.push(f0);
                self.is_active[j] = true;
            }

            for (pos, &a) in self.backend.active().iter().enumerate() {
                self.work_k[pos] = self.aty[a];
            }
            self.backend.solve(&self.work_k[.. basis], &mut self.dir[.. basis])?;
            for (pos, &a) in self.backend.active().iter().enumerate() {
                self.x[a] = self.dir[pos];
            }
            self.backend.gram_apply(&self.dir[.. basis], &mut self.dc)?;
            for (ci, &dci) in self.c.iter_mut().zip(&self.dc) {
                *ci = *ci - dci;
            }
            self.pin_active();
        }

        self.lambda = self.lambda_max();
        self.state = TrackerState::Ready;
        log::debug!("lambda_max {:.3e}", self.lambda);

        Ok(())
    }

    /// Follows the solution path down to a target \\(\lambda\\).
    ///
    /// Returns `Ok` with [`SolveReport`] whose [`SolveReport::status`] tells whether the target is reached,
    /// or `Err` with [`HomotopyError`].
    /// On [`HomotopyError::Divergence`] the tracker keeps the last valid \\(x\\) and \\(\lambda\\).
    /// * `target` is the target \\(\lambda \ge 0\\).
    ///   If it is not below the current \\(\lambda\\), nothing is done.
    /// * `max_iter` is the maximum number of breakpoints to process in this call.
    pub fn solve(&mut self, target: B::F, max_iter: usize) -> Result<SolveReport<B::F>, HomotopyError>
    {
        let f0 = B::F::zero();

        if self.state == TrackerState::Cold {
            log::error!("solve before a measurement vector is loaded");
            return Err(HomotopyError::State {op: "solve", state: self.state.name()});
        }
        if !(target >= f0) || !target.is_finite() {
            log::error!("Target lambda {:?} must be finite and nonnegative", target);
            return Err(HomotopyError::InvalidParam);
        }

        let mut rpt = SolveReport {
            lambda: self.lambda,
            iterations: 0,
            status: SolveStatus::Converged,
            degeneracies: 0,
        };

        if target >= self.lambda {
            log::debug!("target {:.3e} not below lambda {:.3e}", target, self.lambda);
            self.state = TrackerState::Converged;
            return Ok(rpt);
        }
        if max_iter == 0 {
            rpt.status = SolveStatus::IterLimit;
            return Ok(rpt);
        }

        log::debug!("----- Started: lambda {:.3e} -> {:.3e}", self.lambda, target);
        self.state = TrackerState::Tracking;

        loop {
            if rpt.iterations >= max_iter {
                log::warn!("----- IterLimit at lambda {:.3e}", self.lambda);
                rpt.status = SolveStatus::IterLimit;
                break;
            }

            let k = self.backend.active().len();

            // direction of the active coefficients and of the correlation
            self.backend.solve(&self.sign[.. k], &mut self.dir[.. k])?;
            self.backend.gram_apply(&self.dir[.. k], &mut self.dc)?;

            if self.dir[.. k].iter().any(|d| !d.is_finite()) || self.dc.iter().any(|d| !d.is_finite()) {
                return Err(self.diverged());
            }

            let step = self.next_step(target);
            if !step.delta.is_finite() || step.delta < f0 {
                return Err(self.diverged());
            }

            self.advance(step.delta);

            match step.event {
                Event::Target => {
                    self.lambda = target;
                    self.pin_active();
                    self.state = TrackerState::Converged;
                    log::debug!("----- Converged: {} breakpoints", rpt.iterations);
                    break;
                },
                Event::Leave(pos) => {
                    let a = self.backend.active()[pos];
                    self.backend.remove(pos)?;
                    self.x[a] = f0;
                    self.sign.remove(pos);
                    self.is_active[a] = false;
                    self.left = Some(a);
                    self.clear_blocked();

                    log::trace!("{}: lambda {:.3e} leave {}", self.breakpoints, self.lambda, a);
                },
                Event::Enter(j, s) => {
                    match self.backend.insert(j, self.par.eps_zero) {
                        Ok(()) => {
                            self.sign.push(s);
                            self.is_active[j] = true;
                            self.c[j] = s * self.lambda;
                            self.left = None;
                            self.clear_blocked();

                            log::trace!("{}: lambda {:.3e} enter {} ({:?})", self.breakpoints, self.lambda, j, s);
                        },
                        Err(HomotopyError::Singular) => {
                            // step over the tie with the same direction
                            rpt.degeneracies += 1;
                            self.blocked[j] = true;
                            self.any_blocked = true;

                            let delta = (self.lambda * self.par.eps_degen)
                                        .min(self.lambda - target)
                                        .min(self.leave_bound());
                            self.advance(delta);

                            log::warn!("Degeneracy: index {} is dependent at lambda {:.3e}", j, self.lambda);
                        },
                        Err(HomotopyError::ActiveSetFull) => {
                            log::warn!("----- ActiveSetFull at lambda {:.3e}", self.lambda);
                            rpt.status = SolveStatus::ActiveSetFull;
                            break;
                        },
                        Err(e) => {
                            return Err(e);
                        },
                    }
                },
            }

            rpt.iterations += 1;
            self.breakpoints += 1;

            if self.par.refresh_period > 0 && self.breakpoints % self.par.refresh_period == 0 {
                self.refresh()?;
            }

            if self.par.log_period > 0 && self.breakpoints % self.par.log_period == 0 {
                log::debug!("{}: lambda {:.3e} active {}", self.breakpoints, self.lambda, self.backend.active().len());
            }

            if self.lambda <= target {
                self.lambda = target;
                self.pin_active();
                self.state = TrackerState::Converged;
                log::debug!("----- Converged: {} breakpoints", rpt.iterations);
                break;
            }
        }

        rpt.lambda = self.lambda;
        Ok(rpt)
    }
}
