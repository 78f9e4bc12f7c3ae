/// Conjugate exponential-family priors (Dirichlet, Gauss-Gamma and Gauss-Wishart) sharing
/// the operations required by variational inference loops: sampling, expected log-likelihood,
/// divergence from a prior and online accumulation of sufficient statistics.
pub mod distr;

/// Special functions and matrix factorization helpers used by the distribution formulas.
pub mod calc;

/// Utilities for the inference loops which consume the distributions.
pub mod fit;

pub use distr::{Conjugate, ConjugateError, Evidence, ScaleMixture};
