use std::ops::{Index, IndexMut, Deref};
use num_traits::Float;
use l1h_core::solver::Operator;
use l1h_core::MatOp;

//

/// Matrix builder
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-svg.js"></script>
///
/// Matrix struct which owns a `Vec` of column-major data array and is able to be converted as [`l1h_core::MatOp`].
/// This struct relies on dynamic heap allocation.
#[derive(Debug, Clone)]
pub struct MatBuild<F: Float>
{
    n_row: usize,
    n_col: usize,
    array: Vec<F>,
}

impl<F: Float> MatBuild<F>
{
    /// Creates an instance.
    ///
    /// Returns the [`MatBuild`] instance with zero data.
    /// * `(n_row, n_col)` is a number of rows and a number of columns.
    pub fn new((n_row, n_col): (usize, usize)) -> Self
    {
        MatBuild {
            n_row, n_col,
            array: vec![F::zero(); n_row * n_col],
        }
    }

    /// Dense matrix of an [`Operator`].
    ///
    /// Each column is calculated by applying `op` to a unit vector.
    pub fn from_op<O: Operator<F>>(op: &O) -> Self
    {
        let (m, n) = op.size();
        let mut mat = MatBuild::new((m, n));
        let mut unit = vec![F::zero(); n];

        for (c, col) in mat.array.chunks_exact_mut(m.max(1)).enumerate().take(n) {
            unit[c] = F::one();
            op.op(F::one(), &unit, F::zero(), col);
            unit[c] = F::zero();
        }
        mat
    }

    /// Dense matrix of a "same"-size 2-D convolution.
    ///
    /// Returns the `(h * w) x (h * w)` matrix which is equivalent to [`crate::ConvOp`] without basis columns.
    /// Images are row-major.
    /// * `(h, w)` is a size of an image.
    /// * `psf` is a row-major kernel of size `(kh, kw)`, centered at `(kh / 2, kw / 2)`.
    pub fn from_psf((h, w): (usize, usize), psf: &[F], (kh, kw): (usize, usize)) -> Self
    {
        assert_eq!(psf.len(), kh * kw);

        let (ch, cw) = (kh / 2, kw / 2);

        MatBuild::new((h * w, h * w)).by_fn(|r, c| {
            let (oy, ox) = (r / w, r % w);
            let (iy, ix) = (c / w, c % w);
            let ky = (oy + ch).checked_sub(iy).filter(|&k| k < kh);
            let kx = (ox + cw).checked_sub(ix).filter(|&k| k < kw);
            match (ky, kx) {
                (Some(ky), Some(kx)) => psf[ky * kw + kx],
                _ => F::zero(),
            }
        })
    }

    /// Size of the matrix.
    ///
    /// Returns a tuple of a number of rows and columns.
    pub fn size(&self) -> (usize, usize)
    {
        (self.n_row, self.n_col)
    }

    /// Converted as [`l1h_core::MatOp`].
    ///
    /// Returns the [`l1h_core::MatOp`] borrowing the internal data array.
    pub fn as_op(&self) -> MatOp<'_, F>
    {
        MatOp::new((self.n_row, self.n_col), &self.array)
    }

    /// Data by a function.
    ///
    /// * `func` takes a row and a column of the matrix and returns data of each element.
    pub fn set_by_fn<M>(&mut self, mut func: M)
    where M: FnMut(usize, usize) -> F
    {
        for c in 0.. self.n_col {
            for r in 0.. self.n_row {
                self[(r, c)] = func(r, c);
            }
        }
    }
    /// Builder pattern of [`MatBuild::set_by_fn`].
    pub fn by_fn<M>(mut self, func: M) -> Self
    where M: FnMut(usize, usize) -> F
    {
        self.set_by_fn(func);
        self
    }

    /// Data by an iterator in column-major.
    ///
    /// * `iter` iterates matrix data in column-major.
    pub fn set_iter_colmaj<T, I>(&mut self, iter: T)
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        for (a, v) in self.array.iter_mut().zip(iter) {
            *a = *v;
        }
    }
    /// Builder pattern of [`MatBuild::set_iter_colmaj`].
    pub fn iter_colmaj<T, I>(mut self, iter: T) -> Self
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        self.set_iter_colmaj(iter);
        self
    }

    /// Data by an iterator in row-major.
    ///
    /// * `iter` iterates matrix data in row-major.
    pub fn set_iter_rowmaj<T, I>(&mut self, iter: T)
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        let mut i = iter.into_iter();

        for r in 0.. self.n_row {
            for c in 0.. self.n_col {
                if let Some(v) = i.next() {
                    self[(r, c)] = *v;
                }
                else {
                    return;
                }
            }
        }
    }
    /// Builder pattern of [`MatBuild::set_iter_rowmaj`].
    pub fn iter_rowmaj<T, I>(mut self, iter: T) -> Self
    where T: IntoIterator<Item=I>, I: Deref<Target=F>
    {
        self.set_iter_rowmaj(iter);
        self
    }

    /// Scales by \\(\alpha\\).
    ///
    /// * `alpha` is a scalar \\(\alpha\\).
    pub fn set_scale(&mut self, alpha: F)
    {
        for a in self.array.iter_mut() {
            *a = alpha * *a;
        }
    }
    /// Builder pattern of [`MatBuild::set_scale`].
    pub fn scale(mut self, alpha: F) -> Self
    {
        self.set_scale(alpha);
        self
    }

    /// Scales each column to unit norm. Zero columns are left as they are.
    pub fn set_normalize_cols(&mut self)
    {
        let f0 = F::zero();

        for col in self.array.chunks_exact_mut(self.n_row.max(1)) {
            let norm = col.iter().fold(f0, |acc, &v| acc + v * v).sqrt();
            if norm > f0 {
                for v in col.iter_mut() {
                    *v = *v / norm;
                }
            }
        }
    }
    /// Builder pattern of [`MatBuild::set_normalize_cols`].
    pub fn normalize_cols(mut self) -> Self
    {
        self.set_normalize_cols();
        self
    }

    fn index(&self, (r, c): (usize, usize)) -> usize
    {
        assert!(r < self.n_row);
        assert!(c < self.n_col);

        c * self.n_row + r
    }
}

//

impl<F: Float> Index<(usize, usize)> for MatBuild<F>
{
    type Output = F;
    fn index(&self, index: (usize, usize)) -> &Self::Output
    {
        let i = self.index(index);

        &self.array[i]
    }
}

impl<F: Float> IndexMut<(usize, usize)> for MatBuild<F>
{
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output
    {
        let i = self.index(index);

        &mut self.array[i]
    }
}

//

// column-major data for uploading to a device
impl<F: Float> AsRef<[F]> for MatBuild<F>
{
    fn as_ref(&self) -> &[F]
    {
        &self.array
    }
}

impl<F: Float> AsMut<[F]> for MatBuild<F>
{
    fn as_mut(&mut self) -> &mut[F]
    {
        &mut self.array
    }
}

//

impl<F: Float + core::fmt::LowerExp> core::fmt::Display for MatBuild<F>
{
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error>
    {
        let (nr, nc) = self.size();
        if nr == 0 || nc == 0 {
            write!(f, "[ ]")?;
        }
        else {
            write!(f, "[ {:.3e}", self[(0, 0)])?;
            if nc > 2 {
                write!(f, " ...")?;
            }
            if nc > 1 {
                write!(f, " {:.3e}", self[(0, nc - 1)])?;
            }

            if nr > 2 {
                writeln!(f)?;
                write!(f, "  ...")?;
            }

            if nr > 1 {
                writeln!(f)?;
                write!(f, "  {:.3e}", self[(nr - 1, 0)])?;
                if nc > 2 {
                    write!(f, " ...")?;
                }
                if nc > 1 {
                    write!(f, " {:.3e}", self[(nr - 1, nc - 1)])?;
                }
            }
            write!(f, " ]")?;
        }

        write!(f, " ({} x {})", nr, nc)
    }
}

//

#[test]
fn test_matbuild1()
{
    use float_eq::assert_float_eq;

    let rowmaj = &[
        1., 2., 3.,
        4., 5., 6.,
    ];
    let m = MatBuild::<f64>::new((2, 3))
            .iter_rowmaj(rowmaj)
            .scale(2.);

    assert_float_eq!(m.as_ref(), [2., 8., 4., 10., 6., 12.].as_ref(), abs_all <= 1e-12);
    assert_eq!(m.as_op().size(), (2, 3));

    let n = MatBuild::from_op(&m.as_op());
    assert_float_eq!(n.as_ref(), m.as_ref(), abs_all <= 1e-12);

    let u = MatBuild::<f64>::new((2, 2)).iter_colmaj(&[3., 4., 0., 0.]).normalize_cols();
    assert_float_eq!(u.as_ref(), [0.6, 0.8, 0., 0.].as_ref(), abs_all <= 1e-12);

    assert_eq!(format!("{}", MatBuild::<f64>::new((0, 2))), "[ ] (0 x 2)");
}

#[test]
fn test_matbuild_psf()
{
    use float_eq::assert_float_eq;

    // 1 x 3 image, 1 x 3 kernel centered at 1
    let psf = &[1., 2., 3.];
    let m = MatBuild::<f64>::from_psf((1, 3), psf, (1, 3));

    // out[o] = sum_k psf[k] x[o + 1 - k]
    let x = [1., 0., 0.];
    let mut y = [0.; 3];
    m.as_op().op(1., &x, 0., &mut y);
    assert_float_eq!(y, [2., 3., 0.], abs_all <= 1e-12);

    let x = [0., 0., 1.];
    m.as_op().op(1., &x, 0., &mut y);
    assert_float_eq!(y, [0., 1., 2.], abs_all <= 1e-12);
}
