/// Helpers shared by inference loops built on top of the conjugate priors:
/// convergence checks over the variational objective and grouping of labels.
pub mod utils;
