use float_eq::assert_float_eq;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use paramap_core::*;

type AMat = Mat<f64>;

const H: f64 = 1e-6;

//

// L = <C, forward(x)> + lambda * regularization_error
fn loss(map: &dyn LinearMap<f64>, x: &AMat, c: &AMat, lambda: f64) -> f64
{
    let y = map.forward(x).unwrap();

    linalg::dot(y.as_slice(), c.as_slice()) + lambda * map.regularization_error()
}

fn check_grad(map: &mut dyn LinearMap<f64>, rng: &mut Xoshiro256StarStar, lambda: f64)
{
    let (nin, nout) = map.size();
    let x = rand_normal(3, nin, 1., rng);
    let c = rand_normal(3, nout, 1., rng);

    map.zero_grad();
    let grad_x = map.backward(&x, &c).unwrap();
    map.regularization_backward(lambda);

    let grads: Vec<Vec<f64>> = map.params().iter()
        .map(|p| p.grad().as_slice().to_vec())
        .collect();

    for (k, g) in grads.iter().enumerate() {
        for e in 0.. g.len() {
            let orig = map.params()[k].value().as_slice()[e];

            map.params_mut()[k].value_mut().as_mut_slice()[e] = orig + H;
            let lp = loss(map, &x, &c, lambda);
            map.params_mut()[k].value_mut().as_mut_slice()[e] = orig - H;
            let lm = loss(map, &x, &c, lambda);
            map.params_mut()[k].value_mut().as_mut_slice()[e] = orig;

            let fd = (lp - lm) / (2. * H);
            let name = map.params()[k].name();
            assert_float_eq!(g[e], fd, abs <= 1e-5 * (1. + fd.abs()), "{}[{}]", name, e);
        }
    }

    for e in 0.. x.as_slice().len() {
        let mut xp = x.clone();
        xp.as_mut_slice()[e] += H;
        let mut xm = x.clone();
        xm.as_mut_slice()[e] -= H;

        let fd = (loss(map, &xp, &c, lambda) - loss(map, &xm, &c, lambda)) / (2. * H);
        assert_float_eq!(grad_x.as_slice()[e], fd, abs <= 1e-5 * (1. + fd.abs()), "x[{}]", e);
    }
}

//

#[test]
fn test_grad_linear()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(100);
    let par = MapParam::default().par(|p| p.bias = true);
    let mut l = Linear::new(3, 2, &par, &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 0.);
}

#[test]
fn test_grad_nonneg()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(101);
    let mut l = NonnegativeLinear::new(3, 4, &MapParam::default(), &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 0.);
}

#[test]
fn test_grad_lasso()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(102);
    let par = MapParam::default().par(|p| p.gamma = 0.3);
    let mut l = LassoLinear::new(4, 3, &par, &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 2.);
}

#[test]
fn test_grad_pf()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(103);
    let par = MapParam::perron_frobenius().par(|p| {
        p.sigma_min = 0.5;
        p.bias = true;
    });
    let mut l = PerronFrobeniusLinear::new(3, 4, &par, &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 0.);
}

#[test]
fn test_grad_svd()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(104);
    let mut l = SvdLinear::new(4, 3, &MapParam::svd(), &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 0.);

    let mut l = SvdLinear::new(2, 5, &MapParam::svd(), &mut rng).unwrap();
    check_grad(&mut l, &mut rng, 0.);
}

#[test]
fn test_grad_svd_spectral_error()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(105);
    let mut l = SvdLinear::<f64>::new(3, 4, &MapParam::svd(), &mut rng).unwrap();

    l.zero_grad();
    l.spectral_backward(1.);
    let grads: Vec<Vec<f64>> = l.params().iter()
        .map(|p| p.grad().as_slice().to_vec())
        .collect();

    // U and V only
    for k in 0.. 2 {
        for e in 0.. grads[k].len() {
            let orig = l.params()[k].value().as_slice()[e];

            l.params_mut()[k].value_mut().as_mut_slice()[e] = orig + H;
            let lp = l.spectral_error();
            l.params_mut()[k].value_mut().as_mut_slice()[e] = orig - H;
            let lm = l.spectral_error();
            l.params_mut()[k].value_mut().as_mut_slice()[e] = orig;

            let fd = (lp - lm) / (2. * H);
            assert_float_eq!(grads[k][e], fd, abs <= 1e-5 * (1. + fd.abs()));
        }
    }
    assert_eq!(grads[2].iter().map(|g| g.abs()).sum::<f64>(), 0.);
}

#[test]
fn test_grad_spectral()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(106);

    for (nin, nout, nu, nv) in [(3, 3, 20, 20), (4, 2, 3, 1), (2, 5, 2, 4)] {
        let par = MapParam::spectral().par(|p| {
            p.n_u_reflectors = nu;
            p.n_v_reflectors = nv;
            p.bias = true;
        });
        let mut l = SpectralLinear::new(nin, nout, &par, &mut rng).unwrap();
        // move logits off zero so that sigmoid slopes differ
        *l.params_mut()[2].value_mut() = rand_normal(nin.min(nout), 1, 1., &mut rng);
        check_grad(&mut l, &mut rng, 0.);
    }
}
