/*!
CUDA backend of the L1 homotopy path tracker.

This crate provides [`F32Cuda`], an `f32`-specific [`l1h_core::solver::GramBackend`]
which keeps the operator, the active Gram columns and the incremental Cholesky factor in device memory
and runs the active-set linear algebra by cuBLAS.

Each [`F32Cuda`] owns its own [`cuda_session::CudaSession`] (a CUDA context and a cuBLAS handle),
so that backends are independent of each other and are released when dropped.

```no_run
use l1h::prelude::*;
use l1h_f32cuda::F32Cuda;

let (h, w) = (16, 16);
let psf = vec![1. / 9.; 9];
let a = l1h::MatBuild::<f32>::from_psf((h, w), &psf, (3, 3));

let mut s = Session::new();
s.initialize_backend(F32Cuda::new(0, a.as_ref(), a.size(), 64).unwrap()).unwrap();

s.new_y_vector(&vec![0.; h * w]).unwrap();
s.solve(0.1, 1000).unwrap();
let x = s.get_x_vector().unwrap();
# let _ = x;
```
*/

pub mod cuda_session;

//

mod f32cuda;

pub use f32cuda::*;
