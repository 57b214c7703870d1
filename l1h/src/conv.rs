use std::cell::RefCell;
use std::sync::Arc;
use num_traits::{Float, cast};
use num_complex::Complex;
use rustfft::{Fft, FftNum, FftPlanner};
use l1h_core::solver::Operator;

//

struct FftPath<F: FftNum>
{
    p: usize,
    q: usize,
    row_fwd: Arc<dyn Fft<F>>,
    row_inv: Arc<dyn Fft<F>>,
    col_fwd: Arc<dyn Fft<F>>,
    col_inv: Arc<dyn Fft<F>>,
    // kernel spectrum, in the transposed (q x p) layout
    spec: Vec<Complex<F>>,
    work: RefCell<FftWork<F>>,
}

struct FftWork<F>
{
    buf: Vec<Complex<F>>,
    buf_t: Vec<Complex<F>>,
    scratch: Vec<Complex<F>>,
}

fn transpose<T: Copy>(src: &[T], dst: &mut[T], rows: usize, cols: usize)
{
    for r in 0.. rows {
        for c in 0.. cols {
            dst[c * rows + r] = src[r * cols + c];
        }
    }
}

impl<F: Float + FftNum> FftPath<F>
{
    fn new(psf: &[F], (h, w): (usize, usize), (kh, kw): (usize, usize)) -> Self
    {
        let p = h + kh - 1;
        let q = w + kw - 1;
        let z = Complex::new(F::zero(), F::zero());

        let mut planner = FftPlanner::<F>::new();
        let row_fwd = planner.plan_fft_forward(q);
        let row_inv = planner.plan_fft_inverse(q);
        let col_fwd = planner.plan_fft_forward(p);
        let col_inv = planner.plan_fft_inverse(p);

        let scratch_len = [&row_fwd, &row_inv, &col_fwd, &col_inv].iter()
                          .map(|f| f.get_inplace_scratch_len())
                          .max().unwrap_or(0);

        let mut path = FftPath {
            p, q,
            row_fwd, row_inv, col_fwd, col_inv,
            spec: vec![z; p * q],
            work: RefCell::new(FftWork {
                buf: vec![z; p * q],
                buf_t: vec![z; p * q],
                scratch: vec![z; scratch_len],
            }),
        };

        {
            let mut work = path.work.borrow_mut();
            for ky in 0.. kh {
                for kx in 0.. kw {
                    work.buf[ky * q + kx] = Complex::new(psf[ky * kw + kx], F::zero());
                }
            }
            path.forward(&mut work);
            path.spec.copy_from_slice(&work.buf_t);
        }

        path
    }

    // buf (p x q) -> buf_t (q x p) spectrum
    fn forward(&self, work: &mut FftWork<F>)
    {
        let FftWork {buf, buf_t, scratch} = work;

        self.row_fwd.process_with_scratch(buf, scratch);
        transpose(buf, buf_t, self.p, self.q);
        self.col_fwd.process_with_scratch(buf_t, scratch);
    }

    // buf_t (q x p) spectrum -> buf (p x q), scaled by 1 / (p q)
    fn inverse(&self, work: &mut FftWork<F>)
    {
        let FftWork {buf, buf_t, scratch} = work;

        self.col_inv.process_with_scratch(buf_t, scratch);
        transpose(buf_t, buf, self.q, self.p);
        self.row_inv.process_with_scratch(buf, scratch);

        let scale = F::one() / cast::<_, F>(self.p * self.q).unwrap_or_else(F::one);
        for v in buf.iter_mut() {
            *v = *v * scale;
        }
    }
}

//

/// PSF convolution operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// Implements [`Operator`] of
/// \\[
/// A x = \left[ K * x_{\rm img} \quad b_0 \quad \cdots \quad b_{B-1} \right]
/// \left[ \begin{matrix} 1 \\\\ x_{\rm basis} \end{matrix} \right],
/// \\]
/// the "same"-size 2-D convolution of an `h x w` coefficient image \\(x_{\rm img}\\)
/// with a `kh x kw` kernel \\(K\\) centered at `(kh / 2, kw / 2)` under zero boundary,
/// followed by optional basis images \\(b_i\\) (e.g. a constant background).
/// All images are row-major, so that \\(A\\) is \\(hw \times (hw + B)\\).
///
/// Kernels of at most [`ConvOp::DIRECT_MAX_TAPS`] taps are applied by direct summation,
/// larger ones by FFT multiplication on the zero-padded size `(h + kh - 1) x (w + kw - 1)`.
/// FFT plans and the kernel spectrum are prepared in [`ConvOp::new`];
/// work buffers are held inside, so that an instance shall not be shared between threads.
pub struct ConvOp<F: Float + FftNum>
{
    h: usize,
    w: usize,
    kh: usize,
    kw: usize,
    psf: Vec<F>,
    basis: Vec<F>,
    fft: Option<FftPath<F>>,
}

impl<F: Float + FftNum> ConvOp<F>
{
    /// Maximum number of kernel taps applied by direct summation.
    pub const DIRECT_MAX_TAPS: usize = 64;

    /// Creates an instance without basis columns.
    ///
    /// Returns [`ConvOp`] instance.
    /// * `(h, w)` is a size of an image.
    /// * `psf` is a row-major kernel of size `(kh, kw)`.
    pub fn new((h, w): (usize, usize), psf: &[F], (kh, kw): (usize, usize)) -> Self
    {
        assert_eq!(psf.len(), kh * kw);
        assert!(kh > 0 && kw > 0);

        let fft = if kh * kw > Self::DIRECT_MAX_TAPS && h * w > 0 {
            log::debug!("ConvOp: FFT {} x {}", h + kh - 1, w + kw - 1);
            Some(FftPath::new(psf, (h, w), (kh, kw)))
        }
        else {
            log::debug!("ConvOp: direct {} taps", kh * kw);
            None
        };

        ConvOp {
            h, w, kh, kw,
            psf: psf.to_vec(),
            basis: Vec::new(),
            fft,
        }
    }

    /// Appends a basis column.
    ///
    /// * `image` is a row-major `h x w` image.
    pub fn with_basis(mut self, image: &[F]) -> Self
    {
        assert_eq!(image.len(), self.h * self.w);

        self.basis.extend_from_slice(image);
        self
    }

    /// Appends a constant background basis column of unit norm.
    pub fn with_background(self) -> Self
    {
        let hw = self.h * self.w;
        let v = F::one() / cast::<_, F>(hw).unwrap_or_else(F::one).sqrt();

        self.with_basis(&vec![v; hw])
    }

    /// Number of basis columns.
    pub fn basis_len(&self) -> usize
    {
        self.basis.len() / (self.h * self.w).max(1)
    }

    /// Whether the FFT path is used.
    pub fn uses_fft(&self) -> bool
    {
        self.fft.is_some()
    }

    fn direct_conv(&self, alpha: F, x: &[F], y: &mut[F])
    {
        let (h, w, kh, kw) = (self.h, self.w, self.kh, self.kw);
        let (ch, cw) = (kh / 2, kw / 2);

        for oy in 0.. h {
            for ox in 0.. w {
                let mut s = F::zero();
                for ky in 0.. kh {
                    let iy = match (oy + ch).checked_sub(ky) {
                        Some(iy) if iy < h => iy,
                        _ => continue,
                    };
                    for kx in 0.. kw {
                        if let Some(ix) = (ox + cw).checked_sub(kx).filter(|&ix| ix < w) {
                            s = s + self.psf[ky * kw + kx] * x[iy * w + ix];
                        }
                    }
                }
                y[oy * w + ox] = y[oy * w + ox] + alpha * s;
            }
        }
    }

    fn direct_corr(&self, alpha: F, z: &[F], y: &mut[F])
    {
        let (h, w, kh, kw) = (self.h, self.w, self.kh, self.kw);
        let (ch, cw) = (kh / 2, kw / 2);

        for iy in 0.. h {
            for ix in 0.. w {
                let mut s = F::zero();
                for ky in 0.. kh {
                    let oy = match (iy + ky).checked_sub(ch) {
                        Some(oy) if oy < h => oy,
                        _ => continue,
                    };
                    for kx in 0.. kw {
                        if let Some(ox) = (ix + kx).checked_sub(cw).filter(|&ox| ox < w) {
                            s = s + self.psf[ky * kw + kx] * z[oy * w + ox];
                        }
                    }
                }
                y[iy * w + ix] = y[iy * w + ix] + alpha * s;
            }
        }
    }

    fn fft_conv(&self, fft: &FftPath<F>, alpha: F, x: &[F], y: &mut[F])
    {
        let (h, w) = (self.h, self.w);
        let (ch, cw) = (self.kh / 2, self.kw / 2);
        let q = fft.q;
        let mut work = fft.work.borrow_mut();

        work.buf.fill(Complex::new(F::zero(), F::zero()));
        for iy in 0.. h {
            for ix in 0.. w {
                work.buf[iy * q + ix] = Complex::new(x[iy * w + ix], F::zero());
            }
        }

        fft.forward(&mut work);
        for (v, &k) in work.buf_t.iter_mut().zip(&fft.spec) {
            *v = *v * k;
        }
        fft.inverse(&mut work);

        for oy in 0.. h {
            for ox in 0.. w {
                let v = work.buf[(oy + ch) * q + ox + cw].re;
                y[oy * w + ox] = y[oy * w + ox] + alpha * v;
            }
        }
    }

    fn fft_corr(&self, fft: &FftPath<F>, alpha: F, z: &[F], y: &mut[F])
    {
        let (h, w) = (self.h, self.w);
        let (ch, cw) = (self.kh / 2, self.kw / 2);
        let q = fft.q;
        let mut work = fft.work.borrow_mut();

        work.buf.fill(Complex::new(F::zero(), F::zero()));
        for oy in 0.. h {
            for ox in 0.. w {
                work.buf[(oy + ch) * q + ox + cw] = Complex::new(z[oy * w + ox], F::zero());
            }
        }

        fft.forward(&mut work);
        for (v, &k) in work.buf_t.iter_mut().zip(&fft.spec) {
            *v = *v * k.conj();
        }
        fft.inverse(&mut work);

        for iy in 0.. h {
            for ix in 0.. w {
                let v = work.buf[iy * q + ix].re;
                y[iy * w + ix] = y[iy * w + ix] + alpha * v;
            }
        }
    }
}

impl<F: Float + FftNum> Operator<F> for ConvOp<F>
{
    fn size(&self) -> (usize, usize)
    {
        let hw = self.h * self.w;

        (hw, hw + self.basis_len())
    }

    fn op(&self, alpha: F, x: &[F], beta: F, y: &mut[F])
    {
        let (m, n) = self.size();
        assert_eq!(x.len(), n);
        assert_eq!(y.len(), m);

        for v in y.iter_mut() {
            *v = beta * *v;
        }

        let (x_img, x_basis) = x.split_at(m);
        match &self.fft {
            Some(fft) => self.fft_conv(fft, alpha, x_img, y),
            None => self.direct_conv(alpha, x_img, y),
        }

        for (&xb, b) in x_basis.iter().zip(self.basis.chunks_exact(m.max(1))) {
            let axb = alpha * xb;
            for (v, &bi) in y.iter_mut().zip(b) {
                *v = *v + axb * bi;
            }
        }
    }

    fn trans_op(&self, alpha: F, x: &[F], beta: F, y: &mut[F])
    {
        let (m, n) = self.size();
        assert_eq!(x.len(), m);
        assert_eq!(y.len(), n);

        for v in y.iter_mut() {
            *v = beta * *v;
        }

        let (y_img, y_basis) = y.split_at_mut(m);
        match &self.fft {
            Some(fft) => self.fft_corr(fft, alpha, x, y_img),
            None => self.direct_corr(alpha, x, y_img),
        }

        for (v, b) in y_basis.iter_mut().zip(self.basis.chunks_exact(m.max(1))) {
            let dot = b.iter().zip(x).fold(F::zero(), |acc, (&bi, &xi)| acc + bi * xi);
            *v = *v + alpha * dot;
        }
    }
}

//

#[cfg(test)]
fn test_psf(kh: usize, kw: usize) -> Vec<f64>
{
    let (ch, cw) = ((kh / 2) as f64, (kw / 2) as f64);
    let mut psf = Vec::new();
    for ky in 0.. kh {
        for kx in 0.. kw {
            let (dy, dx) = (ky as f64 - ch, kx as f64 - cw);
            // slightly asymmetric to catch flipped indices
            psf.push((-(dy * dy + 0.5 * dx * dx) / 4.).exp() + 0.01 * kx as f64);
        }
    }
    psf
}

#[cfg(test)]
fn test_vec(len: usize, seed: usize) -> Vec<f64>
{
    (0.. len).map(|i| (((i + seed) * 7919 % 101) as f64) / 50. - 1.).collect()
}

#[cfg(test)]
fn assert_adjoint(op: &ConvOp<f64>)
{
    use float_eq::assert_float_eq;

    let (m, n) = op.size();
    let x = test_vec(n, 3);
    let z = test_vec(m, 11);

    let mut ax = vec![0.; m];
    op.op(1., &x, 0., &mut ax);
    let mut atz = vec![0.; n];
    op.trans_op(1., &z, 0., &mut atz);

    let lhs: f64 = ax.iter().zip(&z).map(|(u, v)| u * v).sum();
    let rhs: f64 = x.iter().zip(&atz).map(|(u, v)| u * v).sum();
    assert_float_eq!(lhs, rhs, abs <= 1e-9);
}

#[test]
fn test_conv_direct()
{
    let op = ConvOp::new((5, 6), &test_psf(3, 4), (3, 4));
    assert!(!op.uses_fft());
    assert_eq!(op.size(), (30, 30));
    assert_adjoint(&op);

    let op = op.with_background();
    assert_eq!(op.basis_len(), 1);
    assert_eq!(op.size(), (30, 31));
    assert_adjoint(&op);
}

#[test]
fn test_conv_fft()
{
    let op = ConvOp::new((7, 6), &test_psf(9, 8), (9, 8)).with_background();
    assert!(op.uses_fft());
    assert_adjoint(&op);
}

#[test]
fn test_conv_fft_vs_dense()
{
    use float_eq::assert_float_eq;
    use crate::MatBuild;

    let (h, w, kh, kw) = (6, 5, 9, 9);
    let psf = test_psf(kh, kw);
    let op = ConvOp::new((h, w), &psf, (kh, kw));
    assert!(op.uses_fft());

    let dense = MatBuild::from_psf((h, w), &psf, (kh, kw));
    let x = test_vec(h * w, 5);

    let mut y_fft = vec![0.5; h * w];
    op.op(2., &x, -1., &mut y_fft);
    let mut y_dense = vec![0.5; h * w];
    dense.as_op().op(2., &x, -1., &mut y_dense);
    assert_float_eq!(y_fft, y_dense, abs_all <= 1e-9);

    let mut t_fft = vec![0.; h * w];
    op.trans_op(1., &x, 0., &mut t_fft);
    let mut t_dense = vec![0.; h * w];
    dense.as_op().trans_op(1., &x, 0., &mut t_dense);
    assert_float_eq!(t_fft, t_dense, abs_all <= 1e-9);
}

#[test]
fn test_conv_direct_vs_dense()
{
    use float_eq::assert_float_eq;
    use crate::MatBuild;

    let (h, w, kh, kw) = (4, 7, 5, 3);
    let psf = test_psf(kh, kw);
    let op = ConvOp::new((h, w), &psf, (kh, kw));
    let dense = MatBuild::from_op(&op);
    let ref_dense = MatBuild::from_psf((h, w), &psf, (kh, kw));

    assert_float_eq!(dense.as_ref(), ref_dense.as_ref(), abs_all <= 1e-12);
}
