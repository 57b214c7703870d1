use num_traits::Float;
use alloc::vec;
use alloc::vec::Vec;
use crate::solver::HomotopyError;

//

/// Incremental Cholesky factor of an active-set Gram matrix
///
/// <script src="https://polyfill.io/v3/polyfill.min.js?features=es6"></script>
/// <script id="MathJax-script" async src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js"></script>
///
/// Holds an upper triangular \\(R\\) with \\(R^T R = G_{\mathcal{A}\mathcal{A}}\\)
/// together with the ordered active-index sequence \\(\mathcal{A}\\) it corresponds to.
/// \\(R\\) is stored column-major in a `capacity * capacity` array allocated by [`CholFactor::new`];
/// appending and deleting never allocate.
#[derive(Debug, Clone)]
pub struct CholFactor<F>
{
    cap: usize,
    r: Vec<F>,
    active: Vec<usize>,
}

impl<F: Float> CholFactor<F>
{
    /// Creates an empty factor.
    ///
    /// * `cap` is the maximum number of active indices.
    pub fn new(cap: usize) -> Self
    {
        CholFactor {
            cap,
            r: vec![F::zero(); cap * cap],
            active: Vec::with_capacity(cap),
        }
    }

    pub fn capacity(&self) -> usize
    {
        self.cap
    }

    pub fn len(&self) -> usize
    {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.active.is_empty()
    }

    /// Active indices in the column order of \\(R\\).
    pub fn active(&self) -> &[usize]
    {
        &self.active
    }

    /// Position of an index in [`CholFactor::active`].
    pub fn position(&self, j: usize) -> Option<usize>
    {
        self.active.iter().position(|&a| a == j)
    }

    /// Element \\(R_{rc}\\); zero below the diagonal.
    pub fn r(&self, row: usize, col: usize) -> F
    {
        assert!(row < self.len() && col < self.len());

        if row <= col {
            self.r[col * self.cap + row]
        }
        else {
            F::zero()
        }
    }

    pub fn clear(&mut self)
    {
        self.active.clear();
    }

    /// Appends an index and extends \\(R\\) by one column.
    ///
    /// The new column \\(w\\) solves \\(R^T w = g\\) and the new pivot is \\(\sqrt{g_{jj} - w^T w}\\).
    /// Returns [`HomotopyError::Singular`] if \\(g_{jj} - w^T w \le\\) `eps_zero` \\(g_{jj}\\),
    /// or [`HomotopyError::ActiveSetFull`] at capacity; the factor is unchanged on error.
    /// * `j` is the index to append.
    /// * `g` is \\(G_{\mathcal{A} j}\\), Gram elements between the active indices and `j`, in active order.
    /// * `g_jj` is the diagonal Gram element \\(G_{jj}\\).
    pub fn append(&mut self, j: usize, g: &[F], g_jj: F, eps_zero: F) -> Result<(), HomotopyError>
    {
        let k = self.len();
        assert_eq!(g.len(), k);

        if k >= self.cap {
            return Err(HomotopyError::ActiveSetFull);
        }

        let col = k * self.cap;
        let (r_done, r_rest) = self.r.split_at_mut(col);
        let w = &mut r_rest[.. k + 1];

        // forward substitution with R^T
        let mut wtw = F::zero();
        for i in 0.. k {
            let mut v = g[i];
            for l in 0.. i {
                v = v - r_done[i * self.cap + l] * w[l];
            }
            v = v / r_done[i * self.cap + i];
            w[i] = v;
            wtw = wtw + v * v;
        }

        let d2 = g_jj - wtw;
        if !(d2 > eps_zero * g_jj) {
            return Err(HomotopyError::Singular);
        }
        w[k] = d2.sqrt();

        self.active.push(j);
        Ok(())
    }

    /// Deletes the index at position `pos` and restores \\(R\\) to upper triangular.
    ///
    /// Removing a column of \\(R\\) leaves it upper Hessenberg from `pos` on,
    /// which is swept back by Givens rotations of adjacent rows.
    pub fn delete(&mut self, pos: usize)
    {
        let k = self.len();
        assert!(pos < k);

        let cap = self.cap;

        for c in pos.. k - 1 {
            let src = (c + 1) * cap;
            self.r.copy_within(src.. src + c + 2, c * cap);
        }

        for j in pos.. k - 1 {
            let a = self.r[j * cap + j];
            let b = self.r[j * cap + j + 1];
            let h = a.hypot(b);
            let (cs, sn) = (a / h, b / h);

            for c in j.. k - 1 {
                let u = self.r[c * cap + j];
                let v = self.r[c * cap + j + 1];
                self.r[c * cap + j] = cs * u + sn * v;
                self.r[c * cap + j + 1] = cs * v - sn * u;
            }
        }

        self.active.remove(pos);
    }

    /// Solves \\(R^T R s = r\\).
    ///
    /// * `rhs` is \\(r\\) and `sol` is \\(s\\) on exit, both of length [`CholFactor::len`].
    pub fn solve(&self, rhs: &[F], sol: &mut[F])
    {
        let k = self.len();
        let cap = self.cap;
        assert_eq!(rhs.len(), k);
        assert_eq!(sol.len(), k);

        // R^T z = rhs
        for i in 0.. k {
            let mut v = rhs[i];
            for l in 0.. i {
                v = v - self.r[i * cap + l] * sol[l];
            }
            sol[i] = v / self.r[i * cap + i];
        }

        // R s = z
        for i in (0.. k).rev() {
            let mut v = sol[i];
            for l in i + 1.. k {
                v = v - self.r[l * cap + i] * sol[l];
            }
            sol[i] = v / self.r[i * cap + i];
        }
    }
}

//

#[cfg(test)]
fn gram_of(a: &[f64], m: usize, i: usize, j: usize) -> f64
{
    let (ci, cj) = (&a[i * m.. (i + 1) * m], &a[j * m.. (j + 1) * m]);
    ci.iter().zip(cj).map(|(u, v)| u * v).sum()
}

#[cfg(test)]
fn append_col(f: &mut CholFactor<f64>, a: &[f64], m: usize, j: usize) -> Result<(), HomotopyError>
{
    let g: Vec<f64> = f.active().iter().map(|&i| gram_of(a, m, i, j)).collect();
    f.append(j, &g, gram_of(a, m, j, j), 1e-12)
}

#[cfg(test)]
fn assert_factorizes(f: &CholFactor<f64>, a: &[f64], m: usize)
{
    use float_eq::assert_float_eq;

    let k = f.len();
    for p in 0.. k {
        for q in 0.. k {
            let mut rtr = 0.;
            for l in 0.. k {
                rtr += f.r(l, p) * f.r(l, q);
            }
            let g = gram_of(a, m, f.active()[p], f.active()[q]);
            assert_float_eq!(rtr, g, abs <= 1e-9);
        }
    }
}

#[cfg(test)]
const TEST_A: [f64; 20] = [ // 5 x 4, column-major
    1., 0., 2., 0., 1.,
    0., 1., 1., 3., 0.,
    2., 1., 0., 1., 1.,
    1., 1., 1., 0., 2.,
];

#[test]
fn test_chol_append_delete()
{
    let a = &TEST_A;
    let mut f = CholFactor::<f64>::new(4);

    for j in [2, 0, 3, 1] {
        append_col(&mut f, a, 5, j).unwrap();
        assert_factorizes(&f, a, 5);
    }
    assert_eq!(f.active(), &[2, 0, 3, 1]);

    f.delete(1);
    assert_eq!(f.active(), &[2, 3, 1]);
    assert_factorizes(&f, a, 5);

    f.delete(0);
    assert_eq!(f.active(), &[3, 1]);
    assert_factorizes(&f, a, 5);

    append_col(&mut f, a, 5, 0).unwrap();
    assert_eq!(f.position(0), Some(2));
    assert_factorizes(&f, a, 5);

    f.delete(2);
    assert_factorizes(&f, a, 5);
}

#[test]
fn test_chol_solve()
{
    use float_eq::assert_float_eq;

    let a = &TEST_A;
    let mut f = CholFactor::<f64>::new(3);
    for j in [0, 1, 3] {
        append_col(&mut f, a, 5, j).unwrap();
    }

    let rhs = [1., -1., 0.5];
    let mut sol = [0.; 3];
    f.solve(&rhs, &mut sol);

    for p in 0.. 3 {
        let mut gs = 0.;
        for q in 0.. 3 {
            gs += gram_of(a, 5, f.active()[p], f.active()[q]) * sol[q];
        }
        assert_float_eq!(gs, rhs[p], abs <= 1e-9);
    }
}

#[test]
fn test_chol_singular_and_full()
{
    let mut a = TEST_A.to_vec();
    // column 3 := column 0 + column 1
    for r in 0.. 5 {
        a[15 + r] = a[r] + a[5 + r];
    }

    let mut f = CholFactor::<f64>::new(3);
    append_col(&mut f, &a, 5, 0).unwrap();
    append_col(&mut f, &a, 5, 1).unwrap();

    assert_eq!(append_col(&mut f, &a, 5, 3), Err(HomotopyError::Singular));
    assert_eq!(f.active(), &[0, 1]);
    assert_factorizes(&f, &a, 5);

    append_col(&mut f, &a, 5, 2).unwrap();
    assert_eq!(append_col(&mut f, &a, 5, 3), Err(HomotopyError::ActiveSetFull));
}
