use rustacuda::memory::{CopyDestination, DeviceBuffer};
use cublas_sys::*;
use l1h_core::solver::{GramBackend, HomotopyError};
use crate::cuda_session::{cublas_check, CudaSession};

//

fn device_err(what: &str, e: rustacuda::error::CudaError) -> HomotopyError
{
    log::error!("{} failed: {}", what, e);
    HomotopyError::Device
}

/// `f32`-specific [`GramBackend`] implementation using `rustacuda` and `cublas-sys`.
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// \\(A\\), the Gram columns of the active indices and the factor \\(R\\) reside in device memory
/// allocated by [`F32Cuda::new`]; only vectors of length \\(m\\), \\(n\\) or the active-set size
/// and a few scalars are transferred afterwards.
///
/// You need a [NVIDIA CUDA Toolkit](https://developer.nvidia.com/cuda-downloads) to link.
pub struct F32Cuda
{
    m: usize,
    n: usize,
    cap: usize,
    active: Vec<usize>,

    a: DeviceBuffer<f32>,
    y: DeviceBuffer<f32>,
    aty: DeviceBuffer<f32>,
    gram: DeviceBuffer<f32>,
    r: DeviceBuffer<f32>,
    vec_k: DeviceBuffer<f32>,
    vec_n: DeviceBuffer<f32>,

    // dropped after the buffers
    session: CudaSession,
}

impl F32Cuda
{
    /// Creates an instance and uploads \\(A\\).
    ///
    /// Returns [`F32Cuda`] instance, or `Err` with
    /// [`HomotopyError::Resource`] if a CUDA context or device memory is not available,
    /// [`HomotopyError::InvalidOp`] for an empty operator,
    /// [`HomotopyError::InvalidLen`] if the length of `a` is not \\(mn\\).
    /// * `device` is an ordinal number of CUDA devices.
    /// * `a` is column-major data of \\(A\\), e.g. from `l1h::MatBuild::from_psf`.
    /// * `(m, n)` is a number of rows and columns of \\(A\\).
    /// * `max_active` is the maximum active-set size requested;
    ///   the capacity is clipped to \\(\min(m, n)\\).
    pub fn new(device: u32, a: &[f32], (m, n): (usize, usize), max_active: usize) -> Result<Self, HomotopyError>
    {
        if m == 0 || n == 0 {
            log::error!("Operator size must be nonzero: {:?}", (m, n));
            return Err(HomotopyError::InvalidOp);
        }
        if a.len() != m * n {
            log::error!("Operator data length {} must be {}", a.len(), m * n);
            return Err(HomotopyError::InvalidLen {expected: m * n, actual: a.len()});
        }

        let cap = max_active.min(n).min(m);
        let session = CudaSession::new(device)?;

        log::debug!("F32Cuda: {} x {}, capacity {}", m, n, cap);

        Ok(F32Cuda {
            m, n, cap,
            active: Vec::with_capacity(cap),
            a: session.buf_from_slice(a)?,
            y: session.buf_zeroes(m)?,
            aty: session.buf_zeroes(n)?,
            gram: session.buf_zeroes(n * cap)?,
            r: session.buf_zeroes(cap * cap)?,
            vec_k: session.buf_zeroes(cap)?,
            vec_n: session.buf_zeroes(n)?,
            session,
        })
    }

    fn download1(&self, buf: &DeviceBuffer<f32>, i: usize) -> Result<f32, HomotopyError>
    {
        let mut v = [0.];
        buf[i.. i + 1].copy_to(&mut v[..]).map_err(|e| device_err("download", e))?;
        Ok(v[0])
    }

    // y = A^T x, where x and y are device pointers
    unsafe fn gemv_t(&self, x: *const f32, y: *mut f32) -> Result<(), HomotopyError>
    {
        cublas_check(cublasSgemv_v2(
            self.session.cublas_handle(),
            cublasOperation_t::CUBLAS_OP_T,
            self.m as i32, self.n as i32,
            &1f32, self.a.as_ptr(), self.m as i32,
            x, 1,
            &0f32, y, 1
        ), "cublasSgemv_v2")
    }

    // x = R^-T x or R^-1 x for the leading k x k part of R
    unsafe fn trsv(&self, trans: cublasOperation_t, k: usize, x: *mut f32) -> Result<(), HomotopyError>
    {
        cublas_check(cublasStrsv_v2(
            self.session.cublas_handle(),
            cublasFillMode_t::CUBLAS_FILL_MODE_UPPER,
            trans,
            cublasDiagType_t::CUBLAS_DIAG_NON_UNIT,
            k as i32,
            self.r.as_ptr(), self.cap as i32,
            x, 1
        ), "cublasStrsv_v2")
    }
}

impl GramBackend for F32Cuda
{
    type F = f32;

    fn size(&self) -> (usize, usize)
    {
        (self.m, self.n)
    }

    fn capacity(&self) -> usize
    {
        self.cap
    }

    fn active(&self) -> &[usize]
    {
        &self.active
    }

    fn load_y(&mut self, y: &[f32], aty: &mut[f32]) -> Result<(), HomotopyError>
    {
        assert_eq!(y.len(), self.m);
        assert_eq!(aty.len(), self.n);

        self.session.activate()?;
        self.active.clear();

        self.y.copy_from(y).map_err(|e| device_err("upload y", e))?;
        let (dy, daty) = (self.y.as_ptr(), self.aty.as_mut_ptr());
        unsafe {
            self.gemv_t(dy, daty)?;
        }
        self.aty.copy_to(aty).map_err(|e| device_err("download A^T y", e))
    }

    fn insert(&mut self, j: usize, eps_zero: f32) -> Result<(), HomotopyError>
    {
        let (m, n, cap) = (self.m, self.n, self.cap);
        let k = self.active.len();
        assert!(j < n);

        if k >= cap {
            return Err(HomotopyError::ActiveSetFull);
        }

        self.session.activate()?;

        let gram = self.gram.as_mut_ptr();
        let r = self.r.as_mut_ptr();
        let h = self.session.cublas_handle();

        unsafe {
            // G e_j = A^T a_j into the k-th Gram column
            self.gemv_t(self.a.as_ptr().add(j * m), gram.add(k * n))?;
        }
        let g_jj = self.download1(&self.gram, k * n + j)?;

        let mut wtw = 0.;
        if k > 0 {
            unsafe {
                // G_{A j}: the j-th row of the active Gram columns, into the k-th column of R
                cublas_check(cublasScopy_v2(
                    h, k as i32,
                    gram.add(j), n as i32,
                    r.add(k * cap), 1
                ), "cublasScopy_v2")?;

                self.trsv(cublasOperation_t::CUBLAS_OP_T, k, r.add(k * cap))?;

                cublas_check(cublasSdot_v2(
                    h, k as i32,
                    r.add(k * cap), 1,
                    r.add(k * cap), 1,
                    &mut wtw
                ), "cublasSdot_v2")?;
            }
        }

        let d2 = g_jj - wtw;
        if !(d2 > eps_zero * g_jj) {
            return Err(HomotopyError::Singular);
        }

        let i = k * cap + k;
        self.r[i.. i + 1].copy_from(&[d2.sqrt()][..]).map_err(|e| device_err("upload pivot", e))?;

        self.active.push(j);
        Ok(())
    }

    fn remove(&mut self, pos: usize) -> Result<(), HomotopyError>
    {
        let (n, cap) = (self.n, self.cap);
        let k = self.active.len();
        assert!(pos < k);

        self.session.activate()?;

        let gram = self.gram.as_mut_ptr();
        let r = self.r.as_mut_ptr();
        let h = self.session.cublas_handle();

        for c in pos.. k - 1 {
            unsafe {
                cublas_check(cublasScopy_v2(
                    h, (c + 2) as i32,
                    r.add((c + 1) * cap), 1,
                    r.add(c * cap), 1
                ), "cublasScopy_v2")?;

                cublas_check(cublasScopy_v2(
                    h, n as i32,
                    gram.add((c + 1) * n), 1,
                    gram.add(c * n), 1
                ), "cublasScopy_v2")?;
            }
        }

        // Givens rotations of rows j and j + 1 back to upper triangular
        for j in pos.. k - 1 {
            let mut ab = [0f32; 2];
            let i = j * cap + j;
            self.r[i.. i + 2].copy_to(&mut ab[..]).map_err(|e| device_err("download", e))?;

            let hyp = ab[0].hypot(ab[1]);
            let (cs, sn) = (ab[0] / hyp, ab[1] / hyp);

            unsafe {
                cublas_check(cublasSrot_v2(
                    h, (k - 1 - j) as i32,
                    r.add(i), cap as i32,
                    r.add(i + 1), cap as i32,
                    &cs, &sn
                ), "cublasSrot_v2")?;
            }
        }

        self.active.remove(pos);
        Ok(())
    }

    fn reset(&mut self)
    {
        self.active.clear();
    }

    fn solve(&mut self, rhs: &[f32], sol: &mut[f32]) -> Result<(), HomotopyError>
    {
        let k = self.active.len();
        assert_eq!(rhs.len(), k);
        assert_eq!(sol.len(), k);

        if k == 0 {
            return Ok(());
        }

        self.session.activate()?;

        self.vec_k[.. k].copy_from(rhs).map_err(|e| device_err("upload", e))?;
        let x = self.vec_k.as_mut_ptr();
        unsafe {
            self.trsv(cublasOperation_t::CUBLAS_OP_T, k, x)?;
            self.trsv(cublasOperation_t::CUBLAS_OP_N, k, x)?;
        }
        self.vec_k[.. k].copy_to(sol).map_err(|e| device_err("download", e))
    }

    fn gram_apply(&mut self, v: &[f32], out: &mut[f32]) -> Result<(), HomotopyError>
    {
        let (n, k) = (self.n, self.active.len());
        assert_eq!(v.len(), k);
        assert_eq!(out.len(), n);

        if k == 0 {
            out.fill(0.);
            return Ok(());
        }

        self.session.activate()?;

        self.vec_k[.. k].copy_from(v).map_err(|e| device_err("upload", e))?;
        unsafe {
            cublas_check(cublasSgemv_v2(
                self.session.cublas_handle(),
                cublasOperation_t::CUBLAS_OP_N,
                n as i32, k as i32,
                &1f32, self.gram.as_ptr(), n as i32,
                self.vec_k.as_ptr(), 1,
                &0f32, self.vec_n.as_mut_ptr(), 1
            ), "cublasSgemv_v2")?;
        }
        self.vec_n.copy_to(out).map_err(|e| device_err("download", e))
    }
}

impl Drop for F32Cuda
{
    fn drop(&mut self)
    {
        // device buffers are freed in this context
        let _ = self.session.activate();
    }
}
