use nalgebra::*;
use super::*;
use crate::calc;
use rand::Rng;
use rand_distr::StandardNormal;
use std::ops::{Add, AddAssign};

/// Hyperparameters of the Gauss-Gamma: location mu, precision scale omega of the
/// conditional Gauss factor over the mean, per-axis dispersion sigma and degrees of
/// freedom eta of the marginal Gamma factors over the precisions. When returned by
/// stat(.), mu holds the weighted sum of observations, omega and eta the total weights,
/// and sigma the weighted sum of squared deviations from the sample mean.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussGammaParam {

    mu : DVector<f64>,

    omega : f64,

    sigma : DVector<f64>,

    eta : f64

}

impl GaussGammaParam {

    /// Builds a record without validation (as sufficient statistics are).
    pub fn new(mu : DVector<f64>, omega : f64, sigma : DVector<f64>, eta : f64) -> Self {
        Self { mu, omega, sigma, eta }
    }

    pub fn zeros(dim : usize) -> Self {
        Self { mu : DVector::zeros(dim), omega : 0.0, sigma : DVector::zeros(dim), eta : 0.0 }
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.mu
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    pub fn sigma(&self) -> &DVector<f64> {
        &self.sigma
    }

    pub fn eta(&self) -> f64 {
        self.eta
    }

}

impl AddAssign<&GaussGammaParam> for GaussGammaParam {

    fn add_assign(&mut self, other : &GaussGammaParam) {
        self.mu += &other.mu;
        self.omega += other.omega;
        self.sigma += &other.sigma;
        self.eta += other.eta;
    }

}

impl Add for GaussGammaParam {

    type Output = GaussGammaParam;

    fn add(mut self, other : GaussGammaParam) -> GaussGammaParam {
        self += &other;
        self
    }

}

/// Gauss-Gamma distribution, the conjugate prior of a multivariate normal with diagonal
/// covariance. Conditional on the per-axis precisions lambda ~ Gamma(eta/2, eta sigma/2) (shape, rate),
/// the mean is normal with location mu and precision omega * lambda. An infinite omega
/// fixes the mean at mu; an infinite eta fixes the precisions at 1/sigma.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussGamma {

    dim : usize,

    param : GaussGammaParam

}

impl GaussGamma {

    /// Creates a Gauss-Gamma of dimension dim. Defaults to a centered location, unit
    /// dispersion and unit precision scale and degrees of freedom.
    pub fn new(
        dim : usize,
        mu : Option<DVector<f64>>,
        omega : Option<f64>,
        sigma : Option<DVector<f64>>,
        eta : Option<f64>
    ) -> Result<Self, ConjugateError> {
        if dim == 0 {
            return Err(ConjugateError::ZeroDimension);
        }
        let param = GaussGammaParam::new(
            mu.unwrap_or_else(|| DVector::zeros(dim) ),
            omega.unwrap_or(1.),
            sigma.unwrap_or_else(|| DVector::from_element(dim, 1.) ),
            eta.unwrap_or(1.)
        );
        Self::check_param(dim, &param)?;
        log::debug!("Created Gauss-Gamma (dim = {}, omega = {}, eta = {})", dim, param.omega, param.eta);
        Ok(Self { dim, param })
    }

    pub fn mu(&self) -> &DVector<f64> {
        &self.param.mu
    }

    pub fn omega(&self) -> f64 {
        self.param.omega
    }

    pub fn sigma(&self) -> &DVector<f64> {
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

    pub fn set_sigma(&mut self, sigma : DVector<f64>) -> Result<(), ConjugateError> {
        Self::check_sigma(self.dim, &sigma)?;
        self.param.sigma = sigma;
        Ok(())
    }

    pub fn set_eta(&mut self, eta : f64) -> Result<(), ConjugateError> {
        check_positive("eta", eta)?;
        self.param.eta = eta;
        Ok(())
    }

    fn check_mu(dim : usize, mu : &DVector<f64>) -> Result<(), ConjugateError> {
        check_dim(dim, mu.nrows())?;
        check_finite("mu", mu.iter())
    }

    fn check_sigma(dim : usize, sigma : &DVector<f64>) -> Result<(), ConjugateError> {
        check_dim(dim, sigma.nrows())?;
        check_finite("sigma", sigma.iter())?;
        sigma.iter().try_for_each(|s| check_positive("sigma", *s) )
    }

    fn check_param(dim : usize, param : &GaussGammaParam) -> Result<(), ConjugateError> {
        Self::check_mu(dim, &param.mu)?;
        check_positive("omega", param.omega)?;
        Self::check_sigma(dim, &param.sigma)?;
        check_positive("eta", param.eta)
    }

    /// Expected squared (standardized) error of each observation, and half of the expected
    /// log-determinant of the covariance.
    fn expected_error(&self, obs : &DMatrix<f64>) -> Result<(DVector<f64>, f64), ConjugateError> {
        check_dim(self.dim, obs.nrows())?;
        let GaussGammaParam { ref mu, omega, ref sigma, eta } = self.param;
        let d = self.dim as f64;
        let resid = calc::center(obs, mu);
        let mut sqerr = DVector::from_iterator(resid.ncols(), resid.column_iter().map(|r| {
            r.iter().zip(sigma.iter()).map(|(e, s)| e.powi(2) / s ).sum::<f64>()
        }));
        if omega.is_finite() {
            sqerr.add_scalar_mut(d / omega);
        }
        let mut logdet = sigma.iter().map(|s| s.ln() ).sum::<f64>() / 2.;
        if eta.is_finite() {
            logdet += (d / 2.) * (eta / 2.).ln() - d * calc::digamma(eta / 2.) / 2.;
        }
        Ok((sqerr, logdet))
    }

}

impl Conjugate for GaussGamma {

    type Param = GaussGammaParam;

    /// Location and per-axis dispersion (variance) draws.
    type Sample = (DVector<f64>, DVector<f64>);

    type Obs = DMatrix<f64>;

    type Evidence<'a> = Evidence<'a>;

    fn dim(&self) -> usize {
        self.dim
    }

    fn param(&self) -> &GaussGammaParam {
        &self.param
    }

    fn copy(&mut self, other : &Self) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, other.dim)?;
        self.param.clone_from(&other.param);
        Ok(self)
    }

    fn rand<R>(&self, rng : &mut R) -> Result<(DVector<f64>, DVector<f64>), ConjugateError>
        where R : Rng + ?Sized
    {
        let GaussGammaParam { ref mu, omega, ref sigma, eta } = self.param;
        let disp = if eta.is_finite() {
            let mut disp = sigma.clone();
            for s in disp.iter_mut() {
                let ln_prec = calc::log_gamma_variate(eta / 2., rng)? - (eta / 2.).ln();
                *s = (s.ln() - ln_prec).exp();
            }
            disp
        } else {
            sigma.clone()
        };
        let loc = if omega.is_finite() {
            let z = DVector::from_iterator(self.dim, (0..self.dim).map(|_| rng.sample::<f64, _>(StandardNormal) ));
            mu + disp.map(|d| d.sqrt() ).component_mul(&z).unscale(omega.sqrt())
        } else {
            mu.clone()
        };
        if disp.iter().chain(loc.iter()).all(|v| v.is_finite() ) {
            Ok((loc, disp))
        } else {
            Err(ConjugateError::Sampling(format!("Precision draw underflows for eta = {}", eta)))
        }
    }

    fn loglik(&self, obs : &DMatrix<f64>) -> Result<DVector<f64>, ConjugateError> {
        let (sqerr, logdet) = self.expected_error(obs)?;
        Ok(predictive(self.dim, &sqerr, logdet, None).0)
    }

    fn div(&self, prior : &Self) -> Result<f64, ConjugateError> {
        check_dim(self.dim, prior.dim)?;
        let (post, prior) = (&self.param, &prior.param);
        let d = self.dim as f64;

        let div = match (post.omega.is_finite(), prior.omega.is_finite()) {
            (true, true) => {
                let ratio = prior.omega / post.omega;
                let quad = post.mu.iter().zip(prior.mu.iter()).zip(post.sigma.iter())
                    .map(|((a, b), s)| (a - b).powi(2) / s )
                    .sum::<f64>();
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
                let post_det = post.sigma.iter().map(|s| s.ln() ).sum::<f64>();
                let prior_det = prior.sigma.iter().map(|s| s.ln() ).sum::<f64>();
                let ratio = prior.sigma.iter().zip(post.sigma.iter()).map(|(q, p)| q / p ).sum::<f64>();
                let (pe, qe) = (post.eta / 2., prior.eta / 2.);
                let aux = pe.ln() - calc::digamma(pe);
                Ok(div - pe * d + qe * ratio + (qe - pe) * (post_det + d * aux)
                    - qe * prior_det + pe * post_det
                    + d * calc::ln_gamma(qe) - d * calc::ln_gamma(pe)
                    - d * qe * qe.ln() + d * pe * pe.ln())
            },
            (false, false) if post.sigma == prior.sigma => Ok(div),
            _ => {
                log::trace!("Singular Gamma factor with distinct dispersions; divergence is infinite");
                Ok(f64::INFINITY)
            }
        }
    }

    /// Squared deviations are accumulated around the current location, which serves as a
    /// reference point, and corrected for the distance between it and the weighted sample
    /// mean once all evidence is consumed.
    fn stat<'a, I>(&self, evidence : I) -> Result<GaussGammaParam, ConjugateError>
        where I : IntoIterator<Item = Self::Evidence<'a>>
    {
        let reference = &self.param.mu;
        let mut stat = GaussGammaParam::zeros(self.dim);
        for ev in evidence {
            let (weight, dof) = ev.resolve(self.dim)?;
            let obs = ev.obs();
            let resid = calc::center(obs, reference);
            stat.mu += calc::weighted_sum(obs, &weight);
            stat.omega += weight.sum();
            stat.sigma += calc::weighted_sum(&resid.component_mul(&resid), &weight);
            stat.eta += dof;
        }
        let shift = if stat.omega > 0.0 {
            reference - stat.mu.unscale(stat.omega)
        } else {
            reference.clone()
        };
        stat.sigma -= shift.component_mul(&shift).scale(stat.omega);
        Ok(stat)
    }

    fn update(&mut self, stat : &GaussGammaParam) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, stat.mu.nrows())?;
        check_dim(self.dim, stat.sigma.nrows())?;
        let GaussGammaParam { ref mu, omega, ref sigma, eta } = self.param;

        // A singular distribution has nothing left to learn from data.
        if omega.is_infinite() && eta.is_infinite() {
            log::trace!("Gauss-Gamma update skipped (infinite omega and eta)");
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
            let new_sigma = (sigma.scale(eta) + &stat.sigma + diff.component_mul(&diff).scale(weight))
                .unscale(new_eta);
            (new_sigma, new_eta)
        } else {
            (sigma.clone(), eta)
        };

        let param = GaussGammaParam::new(new_mu, new_omega, new_sigma, new_eta);
        Self::check_param(self.dim, &param)?;
        self.param = param;
        Ok(self)
    }

}

impl ScaleMixture for GaussGamma {

    fn loglik_mix(&self, obs : &DMatrix<f64>, nu : f64) -> Result<(DVector<f64>, DVector<f64>), ConjugateError> {
        check_nu(nu)?;
        let (sqerr, logdet) = self.expected_error(obs)?;
        Ok(predictive(self.dim, &sqerr, logdet, Some(nu)))
    }

}
