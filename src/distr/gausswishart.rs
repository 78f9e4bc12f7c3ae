use nalgebra::*;
use super::*;
use crate::calc;
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::{Add, AddAssign};

/// Hyperparameters of the Gauss-Wishart: location mu and precision scale omega of the
/// conditional Gauss factor over the mean; dispersion matrix sigma and degrees of
/// freedom eta of the marginal Wishart factor over the precision matrix. When returned
/// by stat(.), mu holds the weighted sum of observations, omega and eta the total weights,
/// and sigma the weighted scatter matrix around the sample mean.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussWishartParam {

    mu : DVector<f64>,

    omega : f64,

    sigma : DMatrix<f64>,

    eta : f64

}

impl GaussWishartParam {

    /// Builds a record without validation (as sufficient statistics are).
    pub fn new(mu : DVector<f64>, omega : f64, sigma : DMatrix<f64>, eta : f64) -> Self {
        Self { mu, omega, sigma, eta }
    }

    pub fn zeros(dim : usize) -> Self {
        Self { mu : DVector::zeros(dim), omega : 0.0, sigma : DMatrix::zeros(dim, dim), eta : 0.0 }
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

}

impl AddAssign<&GaussWishartParam> for GaussWishartParam {

    fn add_assign(&mut self, other : &GaussWishartParam) {
        self.mu += &other.mu;
        self.omega += other.omega;
        self.sigma += &other.sigma;
        self.eta += other.eta;
    }

}

impl Add for GaussWishartParam {

    type Output = GaussWishartParam;

    fn add(mut self, other : GaussWishartParam) -> GaussWishartParam {
        self += &other;
        self
    }

}

/// Gauss-Wishart distribution, the conjugate prior of a multivariate normal with full
/// covariance. The precision matrix follows a Wishart with eta degrees of freedom
/// and expected value sigma^-1; conditional on it, the mean is normal with location mu
/// and precision omega times the precision matrix. Infinite omega or eta fix the
/// mean or precision matrix, respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussWishart {

    dim : usize,

    param : GaussWishartParam

}

impl GaussWishart {

    /// Creates a Gauss-Wishart of dimension dim. Defaults to a centered location, identity
    /// dispersion, unit precision scale and dim degrees of freedom.
    pub fn new(
        dim : usize,
        mu : Option<DVector<f64>>,
        omega : Option<f64>,
        sigma : Option<DMatrix<f64>>,
        eta : Option<f64>
    ) -> Result<Self, ConjugateError> {
        if dim == 0 {
            return Err(ConjugateError::ZeroDimension);
        }
        let param = GaussWishartParam::new(
            mu.unwrap_or_else(|| DVector::zeros(dim) ),
            omega.unwrap_or(1.),
            sigma.unwrap_or_else(|| DMatrix::identity(dim, dim) ),
            eta.unwrap_or(dim as f64)
        );
        Self::check_param(dim, &param)?;
        log::debug!("Created Gauss-Wishart (dim = {}, omega = {}, eta = {})", dim, param.omega, param.eta);
        Ok(Self { dim, param })
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.param.mu
    }

    pub fn omega(&self) -> f64 {
        self.param.omega
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.param.sigma
    }

    pub fn eta(&self) -> f64 {
        self.param.eta
    }

    pub fn set_mu(&mut self, mu : DVector<f64>) -> Result<(), ConjugateError> {
        Self::check_mu(self.dim, &mu)?;
        self.param.mu = mu;
        Ok(())
    }

    pub fn set_omega(&mut self, omega : f64) -> Result<(), ConjugateError> {
        check_positive("omega", omega)?;
        self.param.omega = omega;
        Ok(())
    }

    pub fn set_sigma(&mut self, sigma : DMatrix<f64>) -> Result<(), ConjugateError> {
        Self::check_sigma(self.dim, &sigma)?;
        self.param.sigma = sigma;
        Ok(())
    }

    pub fn set_eta(&mut self, eta : f64) -> Result<(), ConjugateError> {
        Self::check_eta(self.dim, eta)?;
        self.param.eta = eta;
        Ok(())
    }

    fn check_mu(dim : usize, mu : &DVector<f64>) -> Result<(), ConjugateError> {
        check_dim(dim, mu.nrows())?;
        check_finite("mu", mu.iter())
    }

    fn check_sigma(dim : usize, sigma : &DMatrix<f64>) -> Result<(), ConjugateError> {
        check_dim(dim, sigma.nrows())?;
        check_dim(dim, sigma.ncols())?;
        check_finite("sigma", sigma.iter())?;
        if !calc::is_symmetric(sigma) {
            return Err(ConjugateError::NotSymmetric);
        }
        calc::cholesky(sigma).map(|_| () )
    }

    // The Wishart is only defined for more than dim - 1 degrees of freedom.
    fn check_eta(dim : usize, eta : f64) -> Result<(), ConjugateError> {
        let min = dim as f64 - 1.;
        if eta > min {
            Ok(())
        } else {
            Err(ConjugateError::DegreesOfFreedom { eta, min })
        }
    }

    fn check_param(dim : usize, param : &GaussWishartParam) -> Result<(), ConjugateError> {
        Self::check_mu(dim, &param.mu)?;
        check_positive("omega", param.omega)?;
        Self::check_sigma(dim, &param.sigma)?;
        Self::check_eta(dim, param.eta)
    }

    /// Expected squared Mahalanobis distance of each observation, and half of the expected
    /// log-determinant of the covariance.
    fn expected_error(&self, obs : &DMatrix<f64>) -> Result<(DVector<f64>, f64), ConjugateError> {
        check_dim(self.dim, obs.nrows())?;
        let GaussWishartParam { ref mu, omega, ref sigma, eta } = self.param;
        let d = self.dim as f64;
        let fact = calc::cholesky(sigma)?;
        let mut sqerr = calc::column_sq_norms(&calc::solve_factor(&fact, &calc::center(obs, mu)));
        if omega.is_finite() {
            sqerr.add_scalar_mut(d / omega);
        }
        let mut logdet = calc::half_log_det(&fact);
        if eta.is_finite() {
            logdet += (d / 2.) * (eta / 2.).ln() - calc::mv_digamma(eta, self.dim) / 2.;
        }
        Ok((sqerr, logdet))
    }

    /// Draws a dispersion matrix by the Bartlett decomposition: the lower-triangular B with
    /// chi-distributed diagonal (drawn on the log scale) and standard normal entries below it
    /// satisfies B B^T ~ W(I, eta), so solving B X = sqrt(eta) L^T for L = chol(sigma) gives
    /// X^T X with inverse-Wishart law. Returns the dispersion with a lower factor F such that
    /// F F^T equals it, taken from the QR decomposition of X.
    fn rand_disp<R>(&self, rng : &mut R) -> Result<(DMatrix<f64>, DMatrix<f64>), ConjugateError>
        where R : Rng + ?Sized
    {
        let GaussWishartParam { ref sigma, eta, .. } = self.param;
        let dim = self.dim;
        let mut bartlett = DMatrix::zeros(dim, dim);
        for i in 0..dim {
            let ln_gamma = calc::log_gamma_variate((eta - i as f64) / 2., rng)?;
            bartlett[(i, i)] = ((2f64.ln() + ln_gamma) / 2.).exp();
        }
        for i in 1..dim {
            for j in 0..i {
                bartlett[(i, j)] = rng.sample::<f64, _>(StandardNormal);
            }
        }
        let root = calc::cholesky(sigma)?.transpose().scale(eta.sqrt());
        let fact = calc::solve_factor(&bartlett, &root);
        let disp = calc::symmetrize(&(fact.transpose() * &fact));

        // Near eta = dim - 1 the smallest chi draw might leave the dispersion beyond float range.
        if !fact.iter().chain(disp.iter()).all(|d| d.is_finite() ) {
            return Err(ConjugateError::Sampling(format!("Dispersion draw is not representable for eta = {}", eta)));
        }
        let mut upper = fact.qr().r();
        for (i, mut row) in upper.row_iter_mut().enumerate() {
            if row[i] < 0.0 {
                row.neg_mut();
            }
        }
        Ok((disp, upper.transpose()))
    }

}

impl Conjugate for GaussWishart {

    type Param = GaussWishartParam;

    /// Location and dispersion (covariance) matrix draws.
    type Sample = (DVector<f64>, DMatrix<f64>);

    type Obs = DMatrix<f64>;

    type Evidence<'a> = Evidence<'a>;

    fn dim(&self) -> usize {
        self.dim
    }

    fn param(&self) -> &GaussWishartParam {
        &self.param
    }

    fn copy(&mut self, other : &Self) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, other.dim)?;
        self.param.clone_from(&other.param);
        Ok(self)
    }

    fn rand<R>(&self, rng : &mut R) -> Result<(DVector<f64>, DMatrix<f64>), ConjugateError>
        where R : Rng + ?Sized
    {
        let GaussWishartParam { ref mu, omega, ref sigma, eta } = self.param;
        let (disp, root) = if eta.is_finite() {
            let (disp, root) = self.rand_disp(rng)?;
            (disp, Some(root))
        } else {
            (sigma.clone(), None)
        };
        let loc = if omega.is_finite() {
            let fact = match root {
                Some(root) => root,
                None => calc::cholesky(&disp)?
            };
            let z = DVector::from_iterator(self.dim, (0..self.dim).map(|_| rng.sample::<f64, _>(StandardNormal) ));
            mu + (fact * z).unscale(omega.sqrt())
        } else {
            mu.clone()
        };
        Ok((loc, disp))
    }

    fn loglik(&self, obs : &DMatrix<f64>) -> Result<DVector<f64>, ConjugateError> {
        let (sqerr, logdet) = self.expected_error(obs)?;
        Ok(predictive(self.dim, &sqerr, logdet, None).0)
    }

    fn div(&self, prior : &Self) -> Result<f64, ConjugateError> {
        check_dim(self.dim, prior.dim)?;
        let (post, prior) = (&self.param, &prior.param);
        let d = self.dim as f64;
        let post_fact = calc::cholesky(&post.sigma)?;

        let div = match (post.omega.is_finite(), prior.omega.is_finite()) {
            (true, true) => {
                let ratio = prior.omega / post.omega;
                let diff = DMatrix::from_column_slice(self.dim, 1, (&post.mu - &prior.mu).as_slice());
                let quad = calc::solve_factor(&post_fact, &diff).norm_squared();
                (d / 2.) * (ratio - ratio.ln() - 1.) + (prior.omega / 2.) * quad
            },
            (false, false) if post.mu == prior.mu => 0.0,
            _ => {
                log::trace!("Singular Gauss factor with distinct locations; divergence is infinite");
                return Ok(f64::INFINITY);
            }
        };

        match (post.eta.is_finite(), prior.eta.is_finite()) {
            (true, true) => {
                let prior_fact = calc::cholesky(&prior.sigma)?;
                let post_det = calc::half_log_det(&post_fact);
                let prior_det = calc::half_log_det(&prior_fact);
                let ratio = calc::solve_factor(&post_fact, &prior_fact).norm_squared();
                let (pe, qe) = (post.eta, prior.eta);
                let aux = (d / 2.) * (pe / 2.).ln() - calc::mv_digamma(pe, self.dim) / 2.;
                Ok(div - (pe / 2.) * d + (qe / 2.) * ratio + (qe - pe) * (post_det + aux)
                    - qe * prior_det + pe * post_det
                    + calc::mv_ln_gamma(qe, self.dim) - calc::mv_ln_gamma(pe, self.dim)
                    - d * (qe / 2.) * (qe / 2.).ln() + d * (pe / 2.) * (pe / 2.).ln())
            },
            (false, false) if post.sigma == prior.sigma => Ok(div),
            _ => {
                log::trace!("Singular Wishart factor with distinct dispersions; divergence is infinite");
                Ok(f64::INFINITY)
            }
        }
    }

    /// Scatter matrices are accumulated around the current location, which serves as a
    /// reference point, and corrected for the distance between it and the weighted sample
    /// mean once all evidence is consumed.
    fn stat<'a, I>(&self, evidence : I) -> Result<GaussWishartParam, ConjugateError>
        where I : IntoIterator<Item = Self::Evidence<'a>>
    {
        let reference = &self.param.mu;
        let mut stat = GaussWishartParam::zeros(self.dim);
        for ev in evidence {
            let (weight, dof) = ev.resolve(self.dim)?;
            let obs = ev.obs();
            let resid = calc::center(obs, reference);
            let mut scaled = resid.clone();
            for (mut col, w) in scaled.column_iter_mut().zip(weight.iter()) {
                col *= *w;
            }
            stat.mu += calc::weighted_sum(obs, &weight);
            stat.omega += weight.sum();
            stat.sigma += &resid * scaled.transpose();
            stat.eta += dof;
        }
        let shift = if stat.omega > 0.0 {
            reference - stat.mu.unscale(stat.omega)
        } else {
            reference.clone()
        };
        stat.sigma -= calc::outer(&shift, &shift).scale(stat.omega);
        Ok(stat)
    }

    fn update(&mut self, stat : &GaussWishartParam) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, stat.mu.nrows())?;
        check_dim(self.dim, stat.sigma.nrows())?;
        check_dim(self.dim, stat.sigma.ncols())?;
        let GaussWishartParam { ref mu, omega, ref sigma, eta } = self.param;

        // A singular distribution has nothing left to learn from data.
        if omega.is_infinite() && eta.is_infinite() {
            log::trace!("Gauss-Wishart update skipped (infinite omega and eta)");
            return Ok(self);
        }

        let diff = if stat.omega > 0.0 {
            mu - stat.mu.unscale(stat.omega)
        } else {
            mu.clone()
        };

        let (new_mu, new_omega, weight) = if omega.is_finite() {
            let new_omega = omega + stat.omega;
            let new_mu = (mu.scale(omega) + &stat.mu).unscale(new_omega);
            (new_mu, new_omega, (omega * stat.omega) / new_omega)
        } else {
            (mu.clone(), omega, stat.omega)
        };

        let (new_sigma, new_eta) = if eta.is_finite() {
            let new_eta = eta + stat.eta;
            let new_sigma = (sigma.scale(eta) + &stat.sigma + calc::outer(&diff, &diff).scale(weight))
                .unscale(new_eta);
            (calc::symmetrize(&new_sigma), new_eta)
        } else {
            (sigma.clone(), eta)
        };

        let param = GaussWishartParam::new(new_mu, new_omega, new_sigma, new_eta);
        Self::check_param(self.dim, &param)?;
        self.param = param;
        Ok(self)
    }

}

impl ScaleMixture for GaussWishart {

    fn loglik_mix(&self, obs : &DMatrix<f64>, nu : f64) -> Result<(DVector<f64>, DVector<f64>), ConjugateError> {
        check_nu(nu)?;
        let (sqerr, logdet) = self.expected_error(obs)?;
        Ok(predictive(self.dim, &sqerr, logdet, Some(nu)))
    }

}
