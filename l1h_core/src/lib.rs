/*!
L1 homotopy path tracking core.

<script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
<script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>

This crate follows the solution path of the L1-regularized least squares problem
\\[
{\rm minimize} \ {1 \over 2} \\|y - A x\\|_2^2 + \lambda \\|x\\|_1
\\]
from the all-zero solution down to a target \\(\lambda\\),
one breakpoint (an index entering or leaving the active set) at a time.

* [`solver::PathTracker`] holds the active-set state machine.
* [`solver::GramBackend`] abstracts the active-set linear algebra;
  [`FloatGeneric`] is the pure Rust implementation,
  and the `l1h_f32cuda` crate offers a CUDA one.
* [`solver::Operator`] expresses the forward operator \\(A\\); [`MatOp`] is a dense one.

`no_std` with `alloc`: buffers are allocated once when a backend or a tracker is created.
*/

#![no_std]

extern crate alloc;

pub mod solver;

//

mod chol_factor;

pub use chol_factor::*;

//

mod floatgeneric;

pub use floatgeneric::*;

//

mod matop;

pub use matop::*;
