use nalgebra::*;
use rand::Rng;
use std::fmt::Debug;
use thiserror::Error;

pub mod dirichlet;

pub use dirichlet::*;

pub mod gaussgamma;

pub use gaussgamma::*;

pub mod gausswishart;

pub use gausswishart::*;

/// Contract shared by the conjugate priors. An instance is created as a prior and, by
/// folding sufficient statistics through update(.), turned into the posterior of the
/// same family. All operations except copy(.) and update(.) are read-only with respect
/// to the stored parameters, so that statistics for independent shards of evidence
/// can be computed through shared references and reduced before a single update.
pub trait Conjugate
    where Self : Debug + Clone + Sized
{

    /// Hyperparameter record of the family. The same type carries the sufficient
    /// statistics returned by stat(.), which are reduced by elementwise addition.
    type Param : Debug + Clone;

    /// Realization of the latent parameter, as returned by rand(.).
    type Sample;

    /// Observations against which loglik(.) is evaluated.
    type Obs : ?Sized;

    /// A single evidence record consumed by stat(.).
    type Evidence<'a>;

    /// Dimensionality fixed at construction.
    fn dim(&self) -> usize;

    /// View of the current hyperparameters.
    fn param(&self) -> &Self::Param;

    /// Overwrites the parameters of self with those of other (usually resetting a
    /// posterior to its prior).
    fn copy(&mut self, other : &Self) -> Result<&mut Self, ConjugateError>;

    /// Draws a realization of the latent parameter. Fails with ConjugateError::Sampling
    /// when the draw falls outside the range of finite floats (which only happens for
    /// degrees of freedom or concentrations close to their lower bound).
    fn rand<R>(&self, rng : &mut R) -> Result<Self::Sample, ConjugateError>
        where R : Rng + ?Sized;

    /// Expected log-likelihood of each observation, integrated over the uncertainty
    /// represented by the current parameters.
    fn loglik(&self, obs : &Self::Obs) -> Result<DVector<f64>, ConjugateError>;

    /// Kullback-Leibler divergence of self (the posterior) from prior. Returns
    /// infinity when the supports of both distributions differ or when either is
    /// singular and their parameters are not exactly the same.
    fn div(&self, prior : &Self) -> Result<f64, ConjugateError>;

    /// Collapses a sequence of evidence records into sufficient statistics.
    fn stat<'a, I>(&self, evidence : I) -> Result<Self::Param, ConjugateError>
        where I : IntoIterator<Item = Self::Evidence<'a>>;

    /// Folds the sufficient statistics into the stored parameters. The new parameters
    /// are validated before they are committed; on error self is left untouched.
    fn update(&mut self, stat : &Self::Param) -> Result<&mut Self, ConjugateError>;

}

/// Gaussian families whose observations might be modelled as a scale mixture, i.e.
/// whose precision is multiplied by a per-observation Gamma(nu/2, nu/2) weight.
pub trait ScaleMixture
    where Self : Conjugate<Obs = DMatrix<f64>>
{

    /// Expected log-likelihood of the observations under the posterior predictive of
    /// the scale mixture, together with the expected value of each mixing weight.
    /// For nu = infinity this reduces to loglik(.) with unit weights; for finite nu,
    /// the predictive is a multivariate Student-t with nu degrees of freedom.
    fn loglik_mix(&self, obs : &DMatrix<f64>, nu : f64) -> Result<(DVector<f64>, DVector<f64>), ConjugateError>;

}

/// Evidence record for the Gaussian families. Each column of the matrix is an
/// observation with as many rows as the distribution dimension.
#[derive(Debug, Clone, Copy)]
pub enum Evidence<'a> {

    /// Observations entering the statistics with unit weight.
    Plain(&'a DMatrix<f64>),

    /// Observations with a per-observation precision scale factor (e.g. expected
    /// mixing weights from ScaleMixture::loglik_mix).
    Scaled(&'a DMatrix<f64>, &'a DVector<f64>),

    /// Observations with per-observation responsibilities.
    Weighted(&'a DMatrix<f64>, &'a DVector<f64>),

    /// Observations with responsibilities (first vector) and scale factors (second vector).
    WeightedScaled(&'a DMatrix<f64>, &'a DVector<f64>, &'a DVector<f64>)

}

impl<'a> Evidence<'a> {

    pub fn obs(&self) -> &'a DMatrix<f64> {
        match *self {
            Evidence::Plain(obs) | Evidence::Scaled(obs, _) |
            Evidence::Weighted(obs, _) | Evidence::WeightedScaled(obs, _, _) => obs
        }
    }

    /// Reduces the record to the weight each observation carries into the location and
    /// dispersion statistics, and the increment to the degrees of freedom. Responsibilities
    /// count towards the degrees of freedom by the number of observations, while scale
    /// factors count by their sum.
    pub(crate) fn resolve(&self, dim : usize) -> Result<(DVector<f64>, f64), ConjugateError> {
        let obs = self.obs();
        check_dim(dim, obs.nrows())?;
        let size = obs.ncols();
        match *self {
            Evidence::Plain(_) => {
                Ok((DVector::from_element(size, 1.), size as f64))
            },
            Evidence::Scaled(_, scale) => {
                check_len(size, scale.nrows())?;
                Ok((scale.clone(), scale.sum()))
            },
            Evidence::Weighted(_, weight) => {
                check_len(size, weight.nrows())?;
                Ok((weight.clone(), size as f64))
            },
            Evidence::WeightedScaled(_, weight, scale) => {
                check_len(size, weight.nrows())?;
                check_len(size, scale.nrows())?;
                Ok((weight.component_mul(scale), scale.sum()))
            }
        }
    }

}

impl<'a> From<&'a DMatrix<f64>> for Evidence<'a> {

    fn from(obs : &'a DMatrix<f64>) -> Self {
        Evidence::Plain(obs)
    }

}

/// Contract violations detected when assigning parameters or receiving inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConjugateError {

    #[error("Distribution dimension must be positive")]
    ZeroDimension,

    #[error("Expected dimension {expected}, but informed value has dimension {found}")]
    DimensionMismatch { expected : usize, found : usize },

    #[error("Expected {expected} per-observation values, but found {found}")]
    LengthMismatch { expected : usize, found : usize },

    #[error("Informed vector does not lie on the unit simplex")]
    NotSimplex,

    #[error("Parameter {name} should be positive (found {value})")]
    NotPositive { name : &'static str, value : f64 },

    #[error("Parameter {name} should have only finite entries")]
    NotFinite { name : &'static str },

    #[error("Informed matrix is not symmetric")]
    NotSymmetric,

    #[error("Informed matrix is not positive-definite")]
    NotPositiveDefinite,

    #[error("Degrees of freedom {eta} should be greater than {min}")]
    DegreesOfFreedom { eta : f64, min : f64 },

    #[error("Outcome index {index} outside distribution dimension {dim}")]
    IndexOutOfRange { index : usize, dim : usize },

    #[error("Sampling error: {0}")]
    Sampling(String)

}

pub(crate) fn check_dim(expected : usize, found : usize) -> Result<(), ConjugateError> {
    if expected == found {
        Ok(())
    } else {
        Err(ConjugateError::DimensionMismatch { expected, found })
    }
}

pub(crate) fn check_len(expected : usize, found : usize) -> Result<(), ConjugateError> {
    if expected == found {
        Ok(())
    } else {
        Err(ConjugateError::LengthMismatch { expected, found })
    }
}

/// Positive scalar which is allowed to be infinite (omega, alpha and eta for the diagonal family).
pub(crate) fn check_positive(name : &'static str, value : f64) -> Result<(), ConjugateError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConjugateError::NotPositive { name, value })
    }
}

pub(crate) fn check_finite<'a>(name : &'static str, mut vals : impl Iterator<Item=&'a f64>) -> Result<(), ConjugateError> {
    if vals.all(|v| v.is_finite() ) {
        Ok(())
    } else {
        Err(ConjugateError::NotFinite { name })
    }
}

/// Likelihood parameter of a scale mixture, which should be positive and is allowed to be infinite.
pub(crate) fn check_nu(nu : f64) -> Result<(), ConjugateError> {
    check_positive("nu", nu)
}

/// Expected log-density of a (possibly Student-t) predictive, given the expected squared error
/// of each observation and half of the expected log-determinant of the covariance.
pub(crate) fn predictive(dim : usize, sqerr : &DVector<f64>, logdet : f64, nu : Option<f64>) -> (DVector<f64>, DVector<f64>) {
    let d = dim as f64;
    match nu {
        Some(nu) if nu.is_finite() => {
            let c = crate::calc::ln_gamma(nu / 2.) - crate::calc::ln_gamma((nu + d) / 2.) +
                (d / 2.) * (std::f64::consts::PI * nu).ln() + logdet;
            let val = sqerr.map(|e| -c - ((nu + d) / 2.) * (e / nu).ln_1p() );
            let weight = sqerr.map(|e| (nu + d) / (nu + e) );
            (val, weight)
        },
        _ => {
            let c = (d / 2.) * (2. * std::f64::consts::PI).ln() + logdet;
            let val = sqerr.map(|e| -c - e / 2. );
            (val, DVector::from_element(sqerr.nrows(), 1.))
        }
    }
}
