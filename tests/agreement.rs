use nalgebra::*;
use approx::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use conjugate::distr::*;

// In one dimension the diagonal and full-covariance families describe the same distribution.

const EPS : f64 = 1E-10;

fn pair(mu : f64, omega : f64, sigma : f64, eta : f64) -> (GaussGamma, GaussWishart) {
    let gg = GaussGamma::new(
        1,
        Some(DVector::from_element(1, mu)),
        Some(omega),
        Some(DVector::from_element(1, sigma)),
        Some(eta)
    ).unwrap();
    let gw = GaussWishart::new(
        1,
        Some(DVector::from_element(1, mu)),
        Some(omega),
        Some(DMatrix::from_element(1, 1, sigma)),
        Some(eta)
    ).unwrap();
    (gg, gw)
}

fn assert_same(gg : &GaussGamma, gw : &GaussWishart) {
    assert_relative_eq!(gg.mu()[0], gw.mu()[0], epsilon = EPS);
    assert_relative_eq!(gg.sigma()[0], gw.sigma()[(0, 0)], epsilon = EPS);
    assert_eq!(gg.omega(), gw.omega());
    assert_eq!(gg.eta(), gw.eta());
}

fn obs() -> DMatrix<f64> {
    DMatrix::from_row_slice(1, 5, &[0.3, -1.2, 2.5, 0.8, 1.1])
}

#[test]
fn loglik_agrees() {
    let obs = obs();
    for (omega, eta) in [(1., 1.), (3., f64::INFINITY), (f64::INFINITY, 2.5), (f64::INFINITY, f64::INFINITY)] {
        let (gg, gw) = pair(0.5, omega, 1.7, eta);
        assert_relative_eq!(gg.loglik(&obs).unwrap(), gw.loglik(&obs).unwrap(), epsilon = EPS);
        for nu in [0.5, 4., f64::INFINITY] {
            let (a, wa) = gg.loglik_mix(&obs, nu).unwrap();
            let (b, wb) = gw.loglik_mix(&obs, nu).unwrap();
            assert_relative_eq!(a, b, epsilon = EPS);
            assert_relative_eq!(wa, wb, epsilon = EPS);
        }
    }
}

#[test]
fn divergence_agrees() {
    let (gg_prior, gw_prior) = pair(0., 0.5, 2., 3.);
    let (gg_post, gw_post) = pair(1.2, 4.5, 0.8, 8.);
    assert_relative_eq!(gg_post.div(&gg_prior).unwrap(), gw_post.div(&gw_prior).unwrap(), epsilon = EPS);

    let (gg_fixed, gw_fixed) = pair(0., f64::INFINITY, 2., 5.);
    let (gg_other, gw_other) = pair(0., f64::INFINITY, 1., 2.);
    assert_relative_eq!(gg_fixed.div(&gg_other).unwrap(), gw_fixed.div(&gw_other).unwrap(), epsilon = EPS);
    assert_eq!(gg_fixed.div(&gg_prior).unwrap(), gw_fixed.div(&gw_prior).unwrap());
}

#[test]
fn update_agrees() {
    let obs = obs();
    let weight = DVector::from_column_slice(&[0.1, 0.9, 0.5, 1., 0.3]);
    let scale = DVector::from_column_slice(&[1.2, 0.4, 0.7, 1., 2.]);
    let (mut gg, mut gw) = pair(0.2, 2., 1.5, 3.);
    let evidence = [
        Evidence::Plain(&obs),
        Evidence::Weighted(&obs, &weight),
        Evidence::Scaled(&obs, &scale),
        Evidence::WeightedScaled(&obs, &weight, &scale)
    ];

    let gg_stat = gg.stat(evidence).unwrap();
    let gw_stat = gw.stat(evidence).unwrap();
    assert_relative_eq!(gg_stat.mu()[0], gw_stat.mu()[0], epsilon = EPS);
    assert_relative_eq!(gg_stat.sigma()[0], gw_stat.sigma()[(0, 0)], epsilon = EPS);
    assert_relative_eq!(gg_stat.omega(), gw_stat.omega(), epsilon = EPS);
    assert_relative_eq!(gg_stat.eta(), gw_stat.eta(), epsilon = EPS);

    gg.update(&gg_stat).unwrap();
    gw.update(&gw_stat).unwrap();
    assert_relative_eq!(gg.mu()[0], gw.mu()[0], epsilon = EPS);
    assert_relative_eq!(gg.sigma()[0], gw.sigma()[(0, 0)], epsilon = EPS);
    assert_relative_eq!(gg.omega(), gw.omega(), epsilon = EPS);
    assert_relative_eq!(gg.eta(), gw.eta(), epsilon = EPS);
}

#[test]
fn rand_agrees() {
    for (omega, eta) in [(1., 4.), (f64::INFINITY, 4.), (2., f64::INFINITY)] {
        let (gg, gw) = pair(-0.5, omega, 1.3, eta);
        let mut rng_a = StdRng::seed_from_u64(5);
        let mut rng_b = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let (loc_a, disp_a) = gg.rand(&mut rng_a).unwrap();
            let (loc_b, disp_b) = gw.rand(&mut rng_b).unwrap();
            assert_relative_eq!(loc_a[0], loc_b[0], epsilon = EPS, max_relative = EPS);
            assert_relative_eq!(disp_a[0], disp_b[(0, 0)], epsilon = EPS, max_relative = EPS);
        }
    }
}

#[test]
fn copy_and_reset() {
    let (prior_gg, prior_gw) = pair(0., 1., 1., 2.);
    let (mut gg, mut gw) = (prior_gg.clone(), prior_gw.clone());
    let obs = obs();
    let stat = gg.stat([Evidence::from(&obs)]).unwrap();
    gg.update(&stat).unwrap();
    let stat = gw.stat([Evidence::from(&obs)]).unwrap();
    gw.update(&stat).unwrap();
    assert_same(&gg, &gw);

    gg.copy(&prior_gg).unwrap();
    gw.copy(&prior_gw).unwrap();
    assert_same(&gg, &gw);
    assert_eq!(gg, prior_gg);
    assert_eq!(gw, prior_gw);
}
