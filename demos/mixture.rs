use nalgebra::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use structopt::StructOpt;
use std::str::FromStr;
use conjugate::distr::*;
use conjugate::fit::utils::{is_converged, group_by_value};

#[derive(Debug, Clone, Copy)]
enum Family {
    Diagonal,
    Full
}

impl FromStr for Family {

    type Err = String;

    fn from_str(s : &str) -> Result<Self, String> {
        match s {
            "diagonal" => Ok(Family::Diagonal),
            "full" => Ok(Family::Full),
            other => Err(format!("Unknown covariance family: {} (expected diagonal or full)", other))
        }
    }

}

/// Fits a variational Gaussian (or Student-t) mixture to simulated clusters
#[derive(StructOpt, Debug)]
struct Config {

    /// Number of mixture components, which is also the number of simulated clusters
    #[structopt(short = "k", long, default_value = "3")]
    components : usize,

    /// Observations simulated per cluster
    #[structopt(short = "n", long, default_value = "200")]
    samples : usize,

    #[structopt(short, long, default_value = "2")]
    dim : usize,

    /// Relative tolerance on the lower bound
    #[structopt(long, default_value = "1e-8")]
    tol : f64,

    #[structopt(long, default_value = "200")]
    max_iter : usize,

    #[structopt(long, default_value = "1")]
    seed : u64,

    /// Covariance family of the components (diagonal or full)
    #[structopt(long, default_value = "full")]
    family : Family,

    /// Degrees of freedom of Student-t components. Components are Gaussian if absent.
    #[structopt(long)]
    nu : Option<f64>

}

/// Prior and current posterior of one mixture component.
#[derive(Debug, Clone)]
enum Component {
    Diagonal { prior : GaussGamma, post : GaussGamma },
    Full { prior : GaussWishart, post : GaussWishart }
}

fn refit<'a, C : Conjugate>(prior : &C, post : &mut C, ev : C::Evidence<'a>) -> Result<(), ConjugateError> {
    let stat = prior.stat([ev])?;
    post.copy(prior)?.update(&stat)?;
    Ok(())
}

impl Component {

    fn new(family : Family, mu : DVector<f64>) -> Result<Self, ConjugateError> {
        let dim = mu.nrows();
        let eta = Some(dim as f64 + 1.);
        Ok(match family {
            Family::Diagonal => {
                let prior = GaussGamma::new(dim, Some(mu), Some(1E-2), None, eta)?;
                Component::Diagonal { post : prior.clone(), prior }
            },
            Family::Full => {
                let prior = GaussWishart::new(dim, Some(mu), Some(1E-2), None, eta)?;
                Component::Full { post : prior.clone(), prior }
            }
        })
    }

    fn loglik_mix(&self, obs : &DMatrix<f64>, nu : f64) -> Result<(DVector<f64>, DVector<f64>), ConjugateError> {
        match self {
            Component::Diagonal { post, .. } => post.loglik_mix(obs, nu),
            Component::Full { post, .. } => post.loglik_mix(obs, nu)
        }
    }

    fn div(&self) -> Result<f64, ConjugateError> {
        match self {
            Component::Diagonal { prior, post } => post.div(prior),
            Component::Full { prior, post } => post.div(prior)
        }
    }

    fn refit(&mut self, ev : Evidence) -> Result<(), ConjugateError> {
        match self {
            Component::Diagonal { prior, post } => refit(prior, post, ev),
            Component::Full { prior, post } => refit(prior, post, ev)
        }
    }

    fn mean(&self) -> &DVector<f64> {
        match self {
            Component::Diagonal { post, .. } => post.mu(),
            Component::Full { post, .. } => post.mu()
        }
    }

}

// Clusters are centered at 0, 5, 10 ... along the diagonal.
fn simulate<R : Rng>(cfg : &Config, rng : &mut R) -> DMatrix<f64> {
    let mut data = DMatrix::zeros(cfg.dim, cfg.components * cfg.samples);
    for (i, mut col) in data.column_iter_mut().enumerate() {
        let center = 5. * (i / cfg.samples) as f64;
        for v in col.iter_mut() {
            *v = center + rng.sample::<f64, _>(StandardNormal);
        }
    }
    data
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cfg = Config::from_args();
    anyhow::ensure!(cfg.components > 0 && cfg.samples > 0 && cfg.dim > 0, "Components, samples and dim should be positive");

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let data = simulate(&cfg, &mut rng);
    let n = data.ncols();
    let nu = cfg.nu.unwrap_or(f64::INFINITY);

    let mix_prior = Dirichlet::new(cfg.components, None, Some(cfg.components as f64))?;
    let mut mix = mix_prior.clone();
    let mut comps = (0..cfg.components)
        .map(|_| Component::new(cfg.family, data.column(rng.gen_range(0..n)).into_owned()) )
        .collect::<Result<Vec<_>, _>>()?;

    let mut resp : DMatrix<f64> = DMatrix::zeros(cfg.components, n);
    let mut scales = Vec::with_capacity(cfg.components);
    let mut bounds = Vec::new();
    for iter in 0..cfg.max_iter {
        let mix_ll = mix.loglik_all();
        scales.clear();
        for (j, comp) in comps.iter().enumerate() {
            let (ll, scale) = comp.loglik_mix(&data, nu)?;
            resp.row_mut(j).copy_from(&ll.add_scalar(mix_ll[j]).transpose());
            scales.push(scale);
        }

        // Normalize responsibilities, accumulating the log-evidence of each observation.
        let mut bound = 0.0;
        for mut col in resp.column_iter_mut() {
            let max = col.max();
            let norm = col.map(|v| (v - max).exp() ).sum();
            col.apply(|v| *v = (*v - max).exp() / norm );
            bound += max + norm.ln();
        }
        bound -= mix.div(&mix_prior)?;
        for comp in comps.iter() {
            bound -= comp.div()?;
        }
        bounds.push(bound);
        log::info!("Iteration {}: lower bound = {:.6}", iter, bound);
        if is_converged(cfg.tol, &bounds) {
            log::info!("Converged after {} iterations", iter + 1);
            break;
        }

        let stat = mix_prior.stat([&resp])?;
        mix.copy(&mix_prior)?.update(&stat)?;
        for (j, comp) in comps.iter_mut().enumerate() {
            let weight = resp.row(j).transpose();
            let ev = match cfg.nu {
                Some(_) => Evidence::WeightedScaled(&data, &weight, &scales[j]),
                None => Evidence::Weighted(&data, &weight)
            };
            comp.refit(ev)?;
        }
    }

    let labels : Vec<usize> = resp.column_iter().map(|c| c.argmax().0 ).collect();
    for (label, members) in group_by_value(&labels) {
        log::info!(
            "Component {}: {} observations, weight = {:.3}, mean = {:?}",
            label,
            members.len(),
            mix.pi()[label],
            comps[label].mean().as_slice()
        );
    }
    Ok(())
}
