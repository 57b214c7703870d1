//! Gram matrix backend

use num_traits::Float;
use crate::solver::HomotopyError;

/// Linear algebra backend trait for the homotopy path tracker.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// A backend holds everything derived from a fixed forward operator \\(A \in \mathbb{R}^{m \times n}\\):
/// the Gram columns \\(G_{:,a} = A^T A e_a\\) of the active indices \\(a \in \mathcal{A}\\)
/// and an upper triangular factor \\(R\\) with \\(R^T R = G_{\mathcal{A}\mathcal{A}}\\),
/// kept in the order of [`GramBackend::active`].
/// All buffers are sized at construction, so that none of these methods allocates.
pub trait GramBackend
{
    /// Floating point data type used as scalars.
    type F: Float;

    /// Size of \\(A\\).
    ///
    /// Returns a tuple of \\(m\\) and \\(n\\).
    fn size(&self) -> (usize, usize);

    /// Maximum number of active indices the factor can hold.
    fn capacity(&self) -> usize;

    /// Active indices, in the column order of \\(R\\).
    fn active(&self) -> &[usize];

    /// Loads a measurement vector and empties the active set.
    ///
    /// * `y` is a measurement vector \\(y\\) of length \\(m\\).
    /// * `aty` is \\(A^T y\\) on exit, of length \\(n\\).
    fn load_y(&mut self, y: &[Self::F], aty: &mut[Self::F]) -> Result<(), HomotopyError>;

    /// Appends an index to the active set and extends \\(R\\) by one column.
    ///
    /// Returns [`HomotopyError::Singular`] if the new pivot squared is not greater than
    /// `eps_zero` times the diagonal Gram element,
    /// or [`HomotopyError::ActiveSetFull`] at capacity.
    /// The state is unchanged when an error is returned.
    /// * `j` is the index to append, which shall not be active.
    fn insert(&mut self, j: usize, eps_zero: Self::F) -> Result<(), HomotopyError>;

    /// Removes the active index at position `pos` and restores \\(R\\) to upper triangular.
    fn remove(&mut self, pos: usize) -> Result<(), HomotopyError>;

    /// Empties the active set.
    fn reset(&mut self);

    /// Solves \\(G_{\mathcal{A}\mathcal{A}} s = r\\).
    ///
    /// * `rhs` is \\(r\\) and `sol` is \\(s\\) on exit,
    ///   both of length `active().len()`.
    fn solve(&mut self, rhs: &[Self::F], sol: &mut[Self::F]) -> Result<(), HomotopyError>;

    /// Calculates \\(G_{:,\mathcal{A}} v\\).
    ///
    /// * `v` is of length `active().len()`.
    /// * `out` is \\(G_{:,\mathcal{A}} v\\) on exit, of length \\(n\\).
    fn gram_apply(&mut self, v: &[Self::F], out: &mut[Self::F]) -> Result<(), HomotopyError>;
}
