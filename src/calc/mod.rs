use nalgebra::*;
use rand::Rng;
use rand_distr::Open01;
use special::Gamma;
use crate::distr::ConjugateError;

/// Largest deviation of a probability vector sum from unity that is still
/// accepted as a point on the simplex.
pub const SIMPLEX_TOL : f64 = 1E-10;

// Same relative/absolute tolerances numpy uses for allclose.
const SYM_RTOL : f64 = 1E-5;

const SYM_ATOL : f64 = 1E-8;

/// Natural logarithm of the absolute value of the gamma function.
pub fn ln_gamma(x : f64) -> f64 {
    Gamma::ln_gamma(x).0
}

/// First derivative of ln_gamma.
pub fn digamma(x : f64) -> f64 {
    Gamma::digamma(x)
}

/// Sum of ln_gamma((eta - i) / 2) for i in 0..dim, which is the multivariate
/// log-gamma function of order dim at eta/2 without its constant term.
pub fn mv_ln_gamma(eta : f64, dim : usize) -> f64 {
    (0..dim).map(|i| ln_gamma((eta - i as f64) / 2.) ).sum()
}

/// Sum of digamma((eta - i) / 2) for i in 0..dim. This is the derivative of
/// mv_ln_gamma, and enters the expected log-determinant of a Wishart draw.
pub fn mv_digamma(eta : f64, dim : usize) -> f64 {
    (0..dim).map(|i| digamma((eta - i as f64) / 2.) ).sum()
}

/// Natural logarithm of a Gamma(shape, 1) draw. Shapes below one are drawn as
/// Gamma(shape + 1, 1) times U^(1/shape), with the correction kept on the log scale
/// so draws far below the smallest positive float are still distinguishable.
pub fn log_gamma_variate<R>(shape : f64, rng : &mut R) -> Result<f64, ConjugateError>
    where R : Rng + ?Sized
{
    let boost = shape < 1.;
    let gamma = rand_distr::Gamma::new(if boost { shape + 1. } else { shape }, 1.)
        .map_err(|e| ConjugateError::Sampling(format!("{}", e)) )?;
    let g : f64 = rng.sample(gamma);
    if boost {
        let u : f64 = rng.sample(Open01);
        Ok(g.ln() + u.ln() / shape)
    } else {
        Ok(g.ln())
    }
}

/// Lower Cholesky factor L of a positive-definite matrix, such that m = L L^T.
pub fn cholesky(m : &DMatrix<f64>) -> Result<DMatrix<f64>, ConjugateError> {
    Cholesky::new(m.clone())
        .map(|chol| chol.unpack() )
        .ok_or(ConjugateError::NotPositiveDefinite)
}

/// Solves L x = b for the lower-triangular factor L. The factor is assumed
/// to come from cholesky(.), so its diagonal is strictly positive.
pub fn solve_factor(fact : &DMatrix<f64>, b : &DMatrix<f64>) -> DMatrix<f64> {
    fact.solve_lower_triangular_unchecked(b)
}

/// Half of the log-determinant of L L^T, given the lower factor L.
pub fn half_log_det(fact : &DMatrix<f64>) -> f64 {
    fact.diagonal().iter().map(|d| d.ln() ).sum()
}

/// Squared Frobenius norm of every column of m.
pub fn column_sq_norms(m : &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(m.ncols(), m.column_iter().map(|c| c.norm_squared() ))
}

pub fn outer(a : &DVector<f64>, b : &DVector<f64>) -> DMatrix<f64> {
    a * b.transpose()
}

/// Averages a square matrix with its transpose, removing the asymmetry left
/// by floating-point accumulation.
pub fn symmetrize(m : &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()).unscale(2.)
}

pub fn is_symmetric(m : &DMatrix<f64>) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    for i in 0..m.nrows() {
        for j in (i+1)..m.ncols() {
            let (a, b) = (m[(i, j)], m[(j, i)]);
            if (a - b).abs() > SYM_ATOL + SYM_RTOL * b.abs() {
                return false;
            }
        }
    }
    true
}

/// Weighted sum of the columns of obs (i.e. obs * w).
pub fn weighted_sum(obs : &DMatrix<f64>, w : &DVector<f64>) -> DVector<f64> {
    obs * w
}

/// Subtracts the reference vector from every column of obs.
pub fn center(obs : &DMatrix<f64>, reference : &DVector<f64>) -> DMatrix<f64> {
    let mut resid = obs.clone();
    for mut col in resid.column_iter_mut() {
        col -= reference;
    }
    resid
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::*;

    #[test]
    fn special_values() {
        assert_abs_diff_eq!(ln_gamma(1.), 0.0, epsilon = 1E-12);
        assert_abs_diff_eq!(ln_gamma(5.), 24f64.ln(), epsilon = 1E-10);
        assert_abs_diff_eq!(digamma(1.), -0.5772156649015329, epsilon = 1E-10);
        assert_abs_diff_eq!(mv_ln_gamma(3., 1), ln_gamma(1.5), epsilon = 1E-12);
        assert_abs_diff_eq!(mv_digamma(4., 2), digamma(2.) + digamma(1.5), epsilon = 1E-12);
    }

    #[test]
    fn small_shape_variates() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(9);
        let draws : Vec<f64> = (0..2000).map(|_| log_gamma_variate(1E-3, &mut rng).unwrap() ).collect();
        assert!(draws.iter().all(|d| d.is_finite() ));

        // Most of these would underflow to zero on the natural scale.
        assert!(draws.iter().filter(|d| d.exp() == 0.0 ).count() > 500);

        // E[ln G] = digamma(shape)
        let shape = 2.5;
        let n = 20_000;
        let mean = (0..n).map(|_| log_gamma_variate(shape, &mut rng).unwrap() ).sum::<f64>() / n as f64;
        assert_abs_diff_eq!(mean, digamma(shape), epsilon = 0.02);
        assert!(log_gamma_variate(f64::NAN, &mut rng).is_err());
    }

    #[test]
    fn cholesky_factor() {
        let m = DMatrix::from_row_slice(2, 2, &[4., 2., 2., 3.]);
        let l = cholesky(&m).unwrap();
        assert_relative_eq!(&l * l.transpose(), m, epsilon = 1E-12);
        assert_abs_diff_eq!(half_log_det(&l), 0.5 * 8f64.ln(), epsilon = 1E-12);
        let b = DMatrix::from_row_slice(2, 1, &[2., 1.]);
        let x = solve_factor(&l, &b);
        assert_relative_eq!(&l * x, b, epsilon = 1E-12);
        let not_pd = DMatrix::from_row_slice(2, 2, &[1., 2., 2., 1.]);
        assert!(cholesky(&not_pd).is_err());
    }

    #[test]
    fn symmetry() {
        let m = DMatrix::from_row_slice(2, 2, &[1., 0.5, 0.4, 1.]);
        assert!(!is_symmetric(&m));
        let s = symmetrize(&m);
        assert!(is_symmetric(&s));
        assert_abs_diff_eq!(s[(0, 1)], 0.45, epsilon = 1E-15);
    }

    #[test]
    fn centering() {
        let obs = DMatrix::from_row_slice(2, 3, &[1., 2., 3., 4., 5., 6.]);
        let r = center(&obs, &DVector::from_column_slice(&[1., 4.]));
        assert_eq!(r, DMatrix::from_row_slice(2, 3, &[0., 1., 2., 0., 1., 2.]));
        let sq = column_sq_norms(&r);
        assert_eq!(sq, DVector::from_column_slice(&[0., 2., 8.]));
        let w = DVector::from_column_slice(&[1., 0., 2.]);
        assert_eq!(weighted_sum(&obs, &w), DVector::from_column_slice(&[7., 16.]));
    }

}
