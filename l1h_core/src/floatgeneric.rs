use num_traits::Float;
use alloc::vec;
use alloc::vec::Vec;
use crate::solver::{GramBackend, HomotopyError, Operator};
use crate::CholFactor;

/// `num::Float`-generic [`GramBackend`] implementation
///
/// All numeric operations are written in pure Rust over any [`Operator`].
/// The Gram column of an entering index \\(j\\) is calculated as \\(A^T (A e_j)\\),
/// and the columns of the active indices are kept in an `n * capacity` array.
pub struct FloatGeneric<F, O>
{
    op: O,
    factor: CholFactor<F>,
    gram: Vec<F>,
    unit: Vec<F>,
    col: Vec<F>,
    g: Vec<F>,
}

impl<F: Float, O: Operator<F>> FloatGeneric<F, O>
{
    /// Creates an instance.
    ///
    /// Returns [`FloatGeneric`] instance.
    /// * `op` is the forward operator \\(A\\), fixed for the lifetime of the instance.
    /// * `max_active` is the maximum active-set size requested;
    ///   the capacity is clipped to \\(\min(m, n)\\), beyond which the Gram matrix is singular.
    pub fn new(op: O, max_active: usize) -> Self
    {
        let (m, n) = op.size();
        let cap = max_active.min(n).min(m);
        let f0 = F::zero();

        log::debug!("FloatGeneric: {} x {}, capacity {}", m, n, cap);

        FloatGeneric {
            op,
            factor: CholFactor::new(cap),
            gram: vec![f0; n * cap],
            unit: vec![f0; n],
            col: vec![f0; m],
            g: vec![f0; cap],
        }
    }

    /// The forward operator.
    pub fn op(&self) -> &O
    {
        &self.op
    }

    /// The incremental factor.
    pub fn factor(&self) -> &CholFactor<F>
    {
        &self.factor
    }
}

impl<F: Float, O: Operator<F>> GramBackend for FloatGeneric<F, O>
{
    type F = F;

    fn size(&self) -> (usize, usize)
    {
        self.op.size()
    }

    fn capacity(&self) -> usize
    {
        self.factor.capacity()
    }

    fn active(&self) -> &[usize]
    {
        self.factor.active()
    }

    fn load_y(&mut self, y: &[F], aty: &mut[F]) -> Result<(), HomotopyError>
    {
        let (m, n) = self.op.size();
        assert_eq!(y.len(), m);
        assert_eq!(aty.len(), n);

        self.op.trans_op(F::one(), y, F::zero(), aty);
        self.factor.clear();
        Ok(())
    }

    fn insert(&mut self, j: usize, eps_zero: F) -> Result<(), HomotopyError>
    {
        let (_, n) = self.op.size();
        let k = self.factor.len();
        assert!(j < n);

        if k >= self.factor.capacity() {
            return Err(HomotopyError::ActiveSetFull);
        }

        let f0 = F::zero();
        let f1 = F::one();

        let gram_j = &mut self.gram[k * n.. (k + 1) * n];
        self.unit[j] = f1;
        self.op.op(f1, &self.unit, f0, &mut self.col);
        self.unit[j] = f0;
        self.op.trans_op(f1, &self.col, f0, gram_j);

        for (gi, &a) in self.g.iter_mut().zip(self.factor.active()) {
            *gi = gram_j[a];
        }

        self.factor.append(j, &self.g[.. k], gram_j[j], eps_zero)
    }

    fn remove(&mut self, pos: usize) -> Result<(), HomotopyError>
    {
        let (_, n) = self.op.size();
        let k = self.factor.len();

        self.factor.delete(pos);
        for c in pos.. k - 1 {
            self.gram.copy_within((c + 1) * n.. (c + 2) * n, c * n);
        }
        Ok(())
    }

    fn reset(&mut self)
    {
        self.factor.clear();
    }

    fn solve(&mut self, rhs: &[F], sol: &mut[F]) -> Result<(), HomotopyError>
    {
        self.factor.solve(rhs, sol);
        Ok(())
    }

    fn gram_apply(&mut self, v: &[F], out: &mut[F]) -> Result<(), HomotopyError>
    {
        let (_, n) = self.op.size();
        assert_eq!(v.len(), self.factor.len());
        assert_eq!(out.len(), n);

        out.fill(F::zero());
        for (&vi, gram_i) in v.iter().zip(self.gram.chunks_exact(n)) {
            for (o, &g) in out.iter_mut().zip(gram_i) {
                *o = *o + vi * g;
            }
        }
        Ok(())
    }
}

//

#[test]
fn test_floatgeneric_gram()
{
    use float_eq::assert_float_eq;
    use crate::MatOp;

    let array = &[ // 3 x 3, column-major
        1., 0., 1.,
        0., 2., 0.,
        1., 1., 0.,
    ];
    let mut b = FloatGeneric::new(MatOp::new((3, 3), array), 8);
    assert_eq!(b.capacity(), 3);

    let mut aty = [0.; 3];
    b.load_y(&[1., 1., 1.], &mut aty).unwrap();
    assert_float_eq!(aty, [2., 2., 2.], abs_all <= 1e-12);

    b.insert(2, 1e-12).unwrap();
    b.insert(0, 1e-12).unwrap();
    assert_eq!(b.active(), &[2, 0]);

    // G = A^T A = [[2, 0, 1], [0, 4, 2], [1, 2, 2]]
    let mut out = [0.; 3];
    b.gram_apply(&[1., -1.], &mut out).unwrap();
    assert_float_eq!(out, [1. - 2., 2. - 0., 2. - 1.], abs_all <= 1e-12);

    let mut sol = [0.; 2];
    b.solve(&[1., 1.], &mut sol).unwrap();
    // [[2, 1], [1, 2]] s = [1, 1]
    assert_float_eq!(sol, [1. / 3., 1. / 3.], abs_all <= 1e-12);

    b.remove(0).unwrap();
    assert_eq!(b.active(), &[0]);
    b.gram_apply(&[1.], &mut out).unwrap();
    assert_float_eq!(out, [2., 0., 1.], abs_all <= 1e-12);
}
