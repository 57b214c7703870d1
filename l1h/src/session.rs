use core::fmt::{Debug, LowerExp};
use num_traits::Float;
use l1h_core::solver::{GramBackend, HomotopyError, Operator, PathTracker, SolveReport, SolverParam, TrackerState};
use l1h_core::FloatGeneric;

//

/// Session controller
///
/// Sequences the lifecycle
/// [`Session::initialize`] (or [`Session::initialize_backend`]) →
/// { [`Session::new_y_vector`] → [`Session::solve`] → [`Session::get_x_vector`] }\* →
/// [`Session::cleanup`]
/// around one [`PathTracker`] and its [`GramBackend`].
/// Out-of-order calls are rejected with [`HomotopyError::State`],
/// whose `state` is one of `Uninit`, `Released` or a [`l1h_core::solver::TrackerState`] name.
///
/// Each session owns its backend, so that sessions do not share any state.
pub struct Session<B: GramBackend>
{
    /// solver parameters, applied at initialization.
    pub par: SolverParam<B::F>,
    tracker: Option<PathTracker<B>>,
    released: bool,
}

impl<B: GramBackend> Session<B>
{
    /// Creates an uninitialized instance.
    ///
    /// Returns [`Session`] instance with default parameters.
    pub fn new() -> Self
    {
        Session {
            par: SolverParam::default(),
            tracker: None,
            released: false,
        }
    }

    /// Changes solver parameters.
    ///
    /// Returns [`Session`] with its parameters changed.
    /// * `f` is a function to change parameters given by its argument.
    pub fn par<P>(mut self, f: P) -> Self
    where P: FnOnce(&mut SolverParam<B::F>)
    {
        f(&mut self.par);
        self
    }

    /// Name of the current state.
    pub fn state(&self) -> &'static str
    {
        if self.released {
            "Released"
        }
        else if let Some(t) = &self.tracker {
            t.state().name()
        }
        else {
            "Uninit"
        }
    }

    /// Path tracker, if initialized.
    pub fn tracker(&self) -> Option<&PathTracker<B>>
    {
        self.tracker.as_ref()
    }

    fn tracker_ref(&self, op: &'static str) -> Result<&PathTracker<B>, HomotopyError>
    {
        match &self.tracker {
            Some(t) if !self.released => Ok(t),
            _ => {
                log::error!("`{}` is not allowed in state {}", op, self.state());
                Err(HomotopyError::State {op, state: self.state()})
            },
        }
    }

    fn tracker_mut(&mut self, op: &'static str) -> Result<&mut PathTracker<B>, HomotopyError>
    {
        self.tracker_ref(op)?;
        self.tracker.as_mut().ok_or(HomotopyError::State {op, state: "Uninit"})
    }

    /// Initializes with a backend.
    ///
    /// Moves from `Uninit` to `Cold`.
    /// Returns `Err` with [`HomotopyError::State`] in other states,
    /// or an error from [`PathTracker::new`] leaving the session `Uninit`.
    /// * `backend` is any [`GramBackend`] created by the caller, e.g. a GPU one.
    pub fn initialize_backend(&mut self, backend: B) -> Result<(), HomotopyError>
    {
        if self.released || self.tracker.is_some() {
            log::error!("`initialize` is not allowed in state {}", self.state());
            return Err(HomotopyError::State {op: "initialize", state: self.state()});
        }

        let (m, n) = backend.size();
        log::info!("initialize: {} x {}, capacity {}, basis {}", m, n, backend.capacity(), self.par.basis);

        self.tracker = Some(PathTracker::new(backend, self.par.clone())?);
        Ok(())
    }

    /// Reads back the coefficient vector.
    ///
    /// Returns a copy of \\(x\\) of length \\(n\\), which is the same until the next [`Session::new_y_vector`] or [`Session::solve`],
    /// or `Err` with [`HomotopyError::State`] before a measurement vector is loaded.
    pub fn get_x_vector(&self) -> Result<Vec<B::F>, HomotopyError>
    {
        let t = self.loaded("get_x_vector")?;

        Ok(t.x().to_vec())
    }

    /// Reads back the coefficient vector into a slice.
    ///
    /// Same as [`Session::get_x_vector`] without allocation.
    /// Returns `Err` with [`HomotopyError::InvalidLen`] if the length of `x` is not \\(n\\).
    pub fn get_x_into(&self, x: &mut[B::F]) -> Result<(), HomotopyError>
    {
        let t = self.loaded("get_x_vector")?;

        if x.len() != t.x().len() {
            log::error!("Output length {} must be {}", x.len(), t.x().len());
            return Err(HomotopyError::InvalidLen {expected: t.x().len(), actual: x.len()});
        }
        x.copy_from_slice(t.x());
        Ok(())
    }

    /// Current \\(\lambda\\).
    pub fn lambda(&self) -> Result<B::F, HomotopyError>
    {
        let t = self.loaded("lambda")?;

        Ok(t.lambda())
    }

    fn loaded(&self, op: &'static str) -> Result<&PathTracker<B>, HomotopyError>
    {
        let t = self.tracker_ref(op)?;

        if t.state() == TrackerState::Cold {
            log::error!("`{}` is not allowed in state {}", op, self.state());
            return Err(HomotopyError::State {op, state: self.state()});
        }
        Ok(t)
    }

    /// Releases the backend.
    ///
    /// Moves to `Released` from any state; calling again does nothing.
    /// Dropping a session without this is also fine.
    pub fn cleanup(&mut self)
    {
        if !self.released {
            log::info!("cleanup");
            self.tracker = None;
            self.released = true;
        }
    }
}

impl<B: GramBackend> Default for Session<B>
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl<B: GramBackend> Session<B>
where B::F: Debug + LowerExp
{
    /// Loads a new measurement vector.
    ///
    /// Nothing derived from the operator is rebuilt.
    /// See [`PathTracker::new_y`].
    pub fn new_y_vector(&mut self, y: &[B::F]) -> Result<(), HomotopyError>
    {
        self.tracker_mut("new_y_vector")?.new_y(y)
    }

    /// Follows the solution path down to `target`.
    ///
    /// See [`PathTracker::solve`].
    pub fn solve(&mut self, target: B::F, max_iter: usize) -> Result<SolveReport<B::F>, HomotopyError>
    {
        let t = self.tracker_mut("solve")?;

        log::info!("----- Started");
        let rslt = t.solve(target, max_iter);

        match &rslt {
            Ok(rpt) => log::info!("----- Finished: {:?} lambda {:.3e}, {} breakpoints", rpt.status, rpt.lambda, rpt.iterations),
            Err(e) => log::error!("----- Failed: {}", e),
        }
        rslt
    }
}

impl<F: Float, O: Operator<F>> Session<FloatGeneric<F, O>>
{
    /// Initializes with the pure Rust backend [`FloatGeneric`].
    ///
    /// Moves from `Uninit` to `Cold`. See [`Session::initialize_backend`].
    /// * `op` is the forward operator \\(A\\), fixed for the session.
    /// * `max_active` is the maximum active-set size, including the basis columns.
    pub fn initialize(&mut self, op: O, max_active: usize) -> Result<(), HomotopyError>
    {
        self.initialize_backend(FloatGeneric::new(op, max_active))
    }
}

/// Creates an initialized [`Session`] with the pure Rust backend.
///
/// Returns the [`Session`] in `Cold` state or `Err` with [`HomotopyError`].
/// * `op` is the forward operator \\(A\\).
/// * `max_active` is the maximum active-set size.
/// * `par` is the solver parameters.
pub fn initialize<F, O>(op: O, max_active: usize, par: SolverParam<F>) -> Result<Session<FloatGeneric<F, O>>, HomotopyError>
where F: Float, O: Operator<F>
{
    let mut s = Session::new().par(|p| *p = par);
    s.initialize(op, max_active)?;
    Ok(s)
}
