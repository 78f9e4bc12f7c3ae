use nalgebra::*;
use super::*;
use crate::calc::{self, SIMPLEX_TOL};
use rand::Rng;
use std::ops::{Add, AddAssign};

/// Hyperparameters of the Dirichlet: the expected location pi over the simplex and the
/// concentration alpha around it (the total pseudo-count). When returned by stat(.), pi
/// holds expected counts per outcome and alpha their total.
#[derive(Debug, Clone, PartialEq)]
pub struct DirichletParam {

    pi : DVector<f64>,

    alpha : f64

}

impl DirichletParam {

    /// Builds a record without validation (as sufficient statistics are).
    pub fn new(pi : DVector<f64>, alpha : f64) -> Self {
        Self { pi, alpha }
    }

    pub fn zeros(dim : usize) -> Self {
        Self { pi : DVector::zeros(dim), alpha : 0.0 }
    }

    pub fn pi(&self) -> &DVector<f64> {
        &self.pi
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

}

impl AddAssign<&DirichletParam> for DirichletParam {

    fn add_assign(&mut self, other : &DirichletParam) {
        self.pi += &other.pi;
        self.alpha += other.alpha;
    }

}

impl Add for DirichletParam {

    type Output = DirichletParam;

    fn add(mut self, other : DirichletParam) -> DirichletParam {
        self += &other;
        self
    }

}

/// Dirichlet distribution over the probabilities of dim discrete outcomes, the conjugate
/// prior of the categorical likelihood. An infinite alpha represents a fixed
/// (singular) probability vector: sampling returns pi and nothing is learnt from data.
#[derive(Debug, Clone, PartialEq)]
pub struct Dirichlet {

    dim : usize,

    param : DirichletParam

}

impl Dirichlet {

    /// Creates a Dirichlet over dim outcomes. Defaults to the uniform location pi = 1/dim
    /// and unit concentration.
    pub fn new(dim : usize, pi : Option<DVector<f64>>, alpha : Option<f64>) -> Result<Self, ConjugateError> {
        if dim == 0 {
            return Err(ConjugateError::ZeroDimension);
        }
        let mut d = Self { dim, param : DirichletParam::new(DVector::from_element(dim, 1. / dim as f64), 1.) };
        if let Some(pi) = pi {
            d.set_pi(pi)?;
        }
        if let Some(alpha) = alpha {
            d.set_alpha(alpha)?;
        }
        log::debug!("Created Dirichlet (dim = {}, alpha = {})", dim, d.param.alpha);
        Ok(d)
    }

    pub fn pi(&self) -> &DVector<f64> {
        &self.param.pi
    }

    pub fn alpha(&self) -> f64 {
        self.param.alpha
    }

    pub fn set_pi(&mut self, pi : DVector<f64>) -> Result<(), ConjugateError> {
        Self::check_pi(self.dim, &pi)?;
        self.param.pi = pi;
        Ok(())
    }

    pub fn set_alpha(&mut self, alpha : f64) -> Result<(), ConjugateError> {
        check_positive("alpha", alpha)?;
        self.param.alpha = alpha;
        Ok(())
    }

    /// Expected log-probability of every outcome.
    pub fn loglik_all(&self) -> DVector<f64> {
        let obs : Vec<usize> = (0..self.dim).collect();
        self.eval_loglik(&obs)
    }

    fn check_pi(dim : usize, pi : &DVector<f64>) -> Result<(), ConjugateError> {
        check_dim(dim, pi.nrows())?;
        if pi.iter().any(|p| !(*p >= 0.0) ) || (pi.sum() - 1.).abs() > SIMPLEX_TOL {
            return Err(ConjugateError::NotSimplex);
        }
        Ok(())
    }

    fn eval_loglik(&self, obs : &[usize]) -> DVector<f64> {
        let (pi, alpha) = (&self.param.pi, self.param.alpha);
        if alpha.is_infinite() {
            return DVector::from_iterator(obs.len(), obs.iter().map(|i| pi[*i].ln() ));
        }
        let psi_alpha = calc::digamma(alpha);
        DVector::from_iterator(obs.len(), obs.iter().map(|i| {
            if pi[*i] > 0.0 {
                calc::digamma(alpha * pi[*i]) - psi_alpha
            } else {
                f64::NEG_INFINITY
            }
        }))
    }

}

impl Conjugate for Dirichlet {

    type Param = DirichletParam;

    type Sample = DVector<f64>;

    type Obs = [usize];

    type Evidence<'a> = &'a DMatrix<f64>;

    fn dim(&self) -> usize {
        self.dim
    }

    fn param(&self) -> &DirichletParam {
        &self.param
    }

    fn copy(&mut self, other : &Self) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, other.dim)?;
        self.param.clone_from(&other.param);
        Ok(self)
    }

    fn rand<R>(&self, rng : &mut R) -> Result<DVector<f64>, ConjugateError>
        where R : Rng + ?Sized
    {
        let (pi, alpha) = (&self.param.pi, self.param.alpha);
        if alpha.is_infinite() {
            return Ok(pi.clone());
        }

        // Gamma draws are normalized on the log scale; outcomes outside the support stay at zero.
        let mut logs = Vec::with_capacity(self.dim);
        for (i, p) in pi.iter().enumerate().filter(|(_, p)| **p > 0.0 ) {
            logs.push((i, calc::log_gamma_variate(alpha * p, rng)?));
        }
        let max = logs.iter().fold(f64::NEG_INFINITY, |m, (_, l)| m.max(*l) );
        if !max.is_finite() {
            return Err(ConjugateError::Sampling(format!("Dirichlet draw is not representable (alpha = {})", alpha)));
        }
        let mut prop = DVector::zeros(self.dim);
        for (i, l) in logs {
            prop[i] = (l - max).exp();
        }
        let total = prop.sum();
        prop.unscale_mut(total);
        Ok(prop)
    }

    fn loglik(&self, obs : &[usize]) -> Result<DVector<f64>, ConjugateError> {
        if let Some(index) = obs.iter().find(|i| **i >= self.dim ) {
            return Err(ConjugateError::IndexOutOfRange { index : *index, dim : self.dim });
        }
        Ok(self.eval_loglik(obs))
    }

    fn div(&self, prior : &Self) -> Result<f64, ConjugateError> {
        check_dim(self.dim, prior.dim)?;
        let (post, prior) = (&self.param, &prior.param);
        match (post.alpha.is_finite(), prior.alpha.is_finite()) {
            (true, true) => {
                let same_support = post.pi.iter().zip(prior.pi.iter())
                    .all(|(p, q)| (*p > 0.0) == (*q > 0.0) );
                if !same_support {
                    log::trace!("Dirichlet supports differ; divergence is infinite");
                    return Ok(f64::INFINITY);
                }
                let psi_alpha = calc::digamma(post.alpha);
                let mut div = calc::ln_gamma(post.alpha) - calc::ln_gamma(prior.alpha);
                for (p, q) in post.pi.iter().zip(prior.pi.iter()).filter(|(p, _)| **p > 0.0 ) {
                    let (a, b) = (post.alpha * p, prior.alpha * q);
                    div += calc::ln_gamma(b) - calc::ln_gamma(a) + (a - b) * (calc::digamma(a) - psi_alpha);
                }
                Ok(div)
            },
            (false, false) if post.pi == prior.pi => Ok(0.0),
            _ => {
                log::trace!("Singular Dirichlet with distinct parameters; divergence is infinite");
                Ok(f64::INFINITY)
            }
        }
    }

    /// Each evidence record is a dim x n matrix of responsibilities, with outcomes over rows
    /// and independent observations over columns.
    fn stat<'a, I>(&self, evidence : I) -> Result<DirichletParam, ConjugateError>
        where I : IntoIterator<Item = Self::Evidence<'a>>
    {
        let mut stat = DirichletParam::zeros(self.dim);
        for prob in evidence {
            check_dim(self.dim, prob.nrows())?;
            let count = prob.column_sum();
            stat.alpha += count.sum();
            stat.pi += count;
        }
        Ok(stat)
    }

    fn update(&mut self, stat : &DirichletParam) -> Result<&mut Self, ConjugateError> {
        check_dim(self.dim, stat.pi.nrows())?;
        let (pi, alpha) = (&self.param.pi, self.param.alpha);

        // A singular distribution has nothing left to learn from data.
        if alpha.is_infinite() {
            log::trace!("Dirichlet update skipped (infinite concentration)");
            return Ok(self);
        }

        let alpha = alpha + stat.alpha;
        check_positive("alpha", alpha)?;
        let pi = (pi.scale(self.param.alpha) + &stat.pi).unscale(alpha);
        Self::check_pi(self.dim, &pi)?;
        self.param = DirichletParam::new(pi, alpha);
        Ok(self)
    }

}
