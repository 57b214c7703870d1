use num_traits::Float;
use crate::solver::Operator;

//

/// Matrix operator
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Matrix struct which borrows a slice of column-major data array and implements [`Operator`].
#[derive(Debug, Clone, Copy)]
pub struct MatOp<'a, F: Float>
{
    n_row: usize,
    n_col: usize,
    array: &'a[F],
}

impl<'a, F: Float> MatOp<'a, F>
{
    /// Creates an instance
    ///
    /// Returns [`MatOp`] instance.
    /// * `(n_row, n_col)`: a number of rows and a number of columns.
    /// * `array`: column-major matrix data of length `n_row * n_col`.
    pub fn new((n_row, n_col): (usize, usize), array: &'a[F]) -> Self
    {
        assert_eq!(n_row * n_col, array.len());

        MatOp {
            n_row, n_col, array,
        }
    }

    /// Column `c` of the matrix.
    pub fn col(&self, c: usize) -> &'a[F]
    {
        assert!(c < self.n_col);

        &self.array[c * self.n_row.. (c + 1) * self.n_row]
    }
}

impl<'a, F: Float> Operator<F> for MatOp<'a, F>
{
    fn size(&self) -> (usize, usize)
    {
        (self.n_row, self.n_col)
    }

    fn op(&self, alpha: F, x: &[F], beta: F, y: &mut[F])
    {
        assert_eq!(x.len(), self.n_col);
        assert_eq!(y.len(), self.n_row);

        for v in y.iter_mut() {
            *v = beta * *v;
        }
        for (c, &xc) in x.iter().enumerate() {
            if xc != F::zero() {
                let axc = alpha * xc;
                for (v, &a) in y.iter_mut().zip(self.col(c)) {
                    *v = *v + axc * a;
                }
            }
        }
    }

    fn trans_op(&self, alpha: F, x: &[F], beta: F, y: &mut[F])
    {
        assert_eq!(x.len(), self.n_row);
        assert_eq!(y.len(), self.n_col);

        for (c, v) in y.iter_mut().enumerate() {
            let mut dot = F::zero();
            for (&a, &u) in self.col(c).iter().zip(x) {
                dot = dot + a * u;
            }
            *v = alpha * dot + beta * *v;
        }
    }
}

impl<'a, F: Float> AsRef<[F]> for MatOp<'a, F>
{
    fn as_ref(&self) -> &[F]
    {
        self.array
    }
}

//

#[test]
fn test_matop1()
{
    use float_eq::assert_float_eq;

    let array = &[ // column-major
        1.,  4.,
        2.,  5.,
        3.,  6.,
    ];
    let op = MatOp::new((2, 3), array);

    let x = [1., 0., -1.];
    let mut y = [10., 20.];
    op.op(2., &x, 0.5, &mut y);
    assert_float_eq!(y, [5. + 2. * (1. - 3.), 10. + 2. * (4. - 6.)], abs_all <= 1e-12);

    let z = [1., 2.];
    let mut w = [1., 1., 1.];
    op.trans_op(1., &z, -1., &mut w);
    assert_float_eq!(w, [9. - 1., 12. - 1., 15. - 1.], abs_all <= 1e-12);

    // adjoint: <A x, z> == <x, A^T z>
    let mut ax = [0.; 2];
    op.op(1., &x, 0., &mut ax);
    let mut atz = [0.; 3];
    op.trans_op(1., &z, 0., &mut atz);
    let lhs: f64 = ax.iter().zip(&z).map(|(u, v)| u * v).sum();
    let rhs: f64 = x.iter().zip(&atz).map(|(u, v)| u * v).sum();
    assert_float_eq!(lhs, rhs, abs <= 1e-12);
}
