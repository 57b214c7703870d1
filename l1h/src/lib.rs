/*!
Sparse emitter recovery by L1 homotopy.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate for Rust provides **sessions of the L1-regularized least squares problem**
\\[
\begin{array}{ll}
{\rm minimize} & {1 \over 2} \\|y - A x\\|_2^2 + \lambda \\|x_P\\|_1
\end{array}
\\]
that are solved by the homotopy path tracker of [`l1h_core`],
together with forward operators \\(A\\) blurring point-like emitters by a PSF.

# General usage

1. Build a forward operator:
   * [`prelude::MatOp`] or [`MatBuild`] - a dense matrix.
   * [`ConvOp`] - "same"-size 2-D convolution by a PSF, optionally with background columns.
1. Choose a [`prelude::GramBackend`] implementation to use:
   * [`prelude::FloatGeneric`] -
     `num::Float`-generic, pure Rust, used by [`Session::initialize`] and [`initialize`].
   * [`l1h_f32cuda` crate](https://crates.io/crates/l1h_f32cuda) -
     `f32`-specific, using CUDA/cuBLAS which requires an installed environment;
     passed to [`Session::initialize_backend`].
1. Create a [`Session`] and optionally set its parameters.
1. For each measurement vector,
   invoke [`Session::new_y_vector`], [`Session::solve`] and [`Session::get_x_vector`].

# Examples

A single emitter seen through an identity operator:
the soft-thresholded coefficient is \\(3 - \lambda = 2.5\\) at \\(\lambda = 0.5\\).

```
use float_eq::assert_float_eq;
use l1h::prelude::*;

//env_logger::init(); // Use any logger crate as `l1h` uses `log` crate.

let array = &[ // column-major
    1., 0., 0., 0.,
    0., 1., 0., 0.,
    0., 0., 1., 0.,
    0., 0., 0., 1.,
];

let mut s = l1h::initialize(MatOp::new((4, 4), array), 4, SolverParam::default()).unwrap();
s.new_y_vector(&[3., 0., 0., 0.]).unwrap();

let rpt = s.solve(0.5, 100).unwrap();
assert_eq!(rpt.status, SolveStatus::Converged);

let x = s.get_x_vector().unwrap();
assert_float_eq!(x[..], [2.5, 0., 0., 0.].as_ref(), abs_all <= 1e-9);

s.cleanup();
```
*/

mod matbuild;

pub use matbuild::*;

//

mod conv;

pub use conv::*;

//

mod session;

pub use session::*;

//

mod config;

pub use config::*;

//

/// Prelude
pub mod prelude
{
    pub use l1h_core::solver::{GramBackend, HomotopyError, Operator, SolveReport, SolveStatus, SolverParam};
    pub use l1h_core::{FloatGeneric, MatOp};
    pub use crate::Session;
}
