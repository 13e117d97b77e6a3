use float_eq::assert_float_eq;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use paramap_core::*;

type AMat = Mat<f64>;

//

#[test]
fn test_spectral_sigma_bounds()
{
    let _ = env_logger::builder().is_test(true).try_init();

    for seed in 0.. 8 {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let par = MapParam::<f64>::spectral().par(|p| {
            p.sigma_min = 0.3;
            p.sigma_max = 1.7;
        });
        let mut l = SpectralLinear::new(5, 3, &par, &mut rng).unwrap();

        // logits far beyond the sigmoid saturation
        let raw = rand_uniform::<f64, _>(3, 1, -200., 200., &mut rng);
        *l.params_mut()[2].value_mut() = raw;

        for s in l.sigmas() {
            assert!(s >= 0.3 - 1e-12 && s <= 1.7 + 1e-12, "{}", s);
        }
        for s in l.effective_w().singular_values(1e-12) {
            assert!(s >= 0.3 - 1e-9 && s <= 1.7 + 1e-9, "{}", s);
        }
    }
}

#[test]
fn test_spectral_identity()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let par = MapParam::<f64>::spectral().par(|p| {
        p.init = Init::Identity;
        p.sigma_min = 0.8;
        p.sigma_max = 0.8;
    });
    let l = SpectralLinear::new(4, 4, &par, &mut rng).unwrap();

    let w = l.effective_w();
    let ref_w = AMat::eye(4, 4).scale(0.8);
    assert_float_eq!(w.as_slice(), ref_w.as_slice(), abs_all <= 1e-12);

    let zero = MapParam::<f64>::spectral().par(|p| {
        p.init = Init::Identity;
        p.sigma_min = 0.;
        p.sigma_max = 0.;
    });
    let l = SpectralLinear::new(4, 4, &zero, &mut rng).unwrap();
    assert_float_eq!(l.effective_w().abssum(), 0., abs <= 1e-15);
}

#[test]
fn test_spectral_sigma_square()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let l = SpectralLinear::<f64>::new(5, 5, &MapParam::spectral(), &mut rng).unwrap();

    let s = l.sigma();
    let sigmas = l.sigmas();
    assert_eq!(s.size(), (5, 5));
    assert_eq!(sigmas.len(), 5);
    for r in 0.. 5 {
        for c in 0.. 5 {
            let expected = if r == c {sigmas[r]} else {0.};
            assert_eq!(s[(r, c)], expected);
        }
    }
}

#[test]
fn test_spectral_sigma_rect()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(2);

    for (nin, nout) in [(4, 6), (6, 4)] {
        let l = SpectralLinear::<f64>::new(nin, nout, &MapParam::spectral(), &mut rng).unwrap();

        let s = l.sigma();
        let sigmas = l.sigmas();
        assert_eq!(s.size(), (nin, nout));
        assert_eq!(sigmas.len(), 4);
        for r in 0.. nin {
            for c in 0.. nout {
                let expected = if r == c {sigmas[r]} else {0.};
                assert_eq!(s[(r, c)], expected);
            }
        }
    }
}

#[test]
fn test_spectral_materialize()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(4);
    let par = MapParam::<f64>::spectral().par(|p| {
        p.n_u_reflectors = 2;
        p.n_v_reflectors = 3;
    });
    let l = SpectralLinear::new(3, 5, &par, &mut rng).unwrap();
    assert_eq!(l.n_reflectors(), (2, 3));

    let x = rand_normal(4, 3, 1., &mut rng);
    let y_implicit = l.forward(&x).unwrap();
    let y_dense = x.matmul(&l.materialize());
    assert_float_eq!(y_implicit.as_slice(), y_dense.as_slice(), abs_all <= 1e-12);

    let bad = AMat::new(4, 5);
    assert!(matches!(l.u_multiply(&bad), Err(MapError::SizeMismatch {expected: 3, actual: 5, ..})));
    assert!(matches!(l.v_multiply(&x), Err(MapError::SizeMismatch {expected: 5, actual: 3, ..})));
}

// dense reflector on the trailing k elements of u
fn householder(u: &[f64], k: usize) -> AMat
{
    let n = u.len();
    let o = n - k;
    let s: f64 = u[o..].iter().map(|e| e * e).sum();

    let mut h = AMat::eye(n, n);
    for r in o.. n {
        for c in o.. n {
            h[(r, c)] -= 2. * u[r] * u[c] / s;
        }
    }
    h
}

fn reflector_product(u: &AMat, n_refl: usize, ascending: bool) -> AMat
{
    let (n, _) = u.size();
    let order: Vec<usize> = if ascending {(0.. n_refl).collect()} else {(0.. n_refl).rev().collect()};

    let mut m = AMat::eye(n, n);
    for i in order {
        m = m.matmul(&householder(&u.row(i), n - i));
    }
    m
}

fn max_diff(a: &AMat, b: &AMat) -> f64
{
    a.as_slice().iter().zip(b.as_slice()).fold(0., |m, (x, y)| m.max((x - y).abs()))
}

#[test]
fn test_spectral_reflection_order()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(6);

    let square = MapParam::<f64>::spectral();
    let rect = MapParam::<f64>::spectral().par(|p| {
        p.n_u_reflectors = 2;
        p.n_v_reflectors = 3;
    });

    for (nin, nout, par) in [(4, 4, &square), (5, 3, &rect), (3, 5, &rect)] {
        let l = SpectralLinear::new(nin, nout, par, &mut rng).unwrap();
        let (n_u, n_v) = l.n_reflectors();
        let u = l.params()[0].value().clone();
        let v = l.params()[1].value().clone();

        // input side: H_0 H_1 ... H_{n_u - 1}
        let h_u = reflector_product(&u, n_u, true);
        let ref_u = l.u_multiply(&AMat::eye(nin, nin)).unwrap();
        assert_float_eq!(h_u.as_slice(), ref_u.as_slice(), abs_all <= 1e-12);
        assert!(max_diff(&reflector_product(&u, n_u, false), &ref_u) > 1e-6);

        // output side: H_{n_v - 1} ... H_1 H_0
        let h_v = reflector_product(&v, n_v, false);
        let ref_v = l.v_multiply(&AMat::eye(nout, nout)).unwrap();
        assert_float_eq!(h_v.as_slice(), ref_v.as_slice(), abs_all <= 1e-12);
        assert!(max_diff(&reflector_product(&v, n_v, true), &ref_v) > 1e-6);

        let w = h_u.matmul(&l.sigma()).matmul(&h_v);
        assert_float_eq!(w.as_slice(), l.effective_w().as_slice(), abs_all <= 1e-12);
    }
}

#[test]
fn test_spectral_materialize_bias()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let par = MapParam::<f64>::spectral().par(|p| p.bias = true);
    let mut l = SpectralLinear::new(4, 3, &par, &mut rng).unwrap();

    let b = vec![0.5, -1., 2.];
    *l.params_mut()[3].value_mut() = AMat::new(1, 3).by_fn(|_, c| b[c]);

    // forward of the identity carries the bias on every row, W does not
    let y = l.forward(&AMat::eye(4, 4)).unwrap();
    let mut ref_y = l.materialize();
    ref_y.add_row(&b);
    assert_float_eq!(y.as_slice(), ref_y.as_slice(), abs_all <= 1e-12);
    assert_float_eq!(l.effective_w().as_slice(), l.materialize().as_slice(), abs_all <= 0.);
    assert!(max_diff(&y, &l.effective_w()) > 0.1);
}

#[test]
fn test_orthogonal_error()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(5);

    let o = OrthogonalWeight::<f64>::identity(6);
    assert_float_eq!(o.forward(), 0., abs <= 1e-15);

    for n in 1.. 6 {
        let o = OrthogonalWeight::<f64>::new(n, &mut rng);
        let e = o.forward();
        assert!(e >= 0.);
        assert!(e < 1.);
    }
}

#[test]
fn test_pf_row_sums()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(6);
    let par = MapParam::<f64>::perron_frobenius();
    let mut l = PerronFrobeniusLinear::new(4, 7, &par, &mut rng).unwrap();

    *l.params_mut()[0].value_mut() = rand_uniform(4, 7, -30., 30., &mut rng);
    *l.params_mut()[1].value_mut() = rand_uniform(4, 1, -30., 30., &mut rng);

    let w = l.effective_w();
    assert!(w.as_slice().iter().all(|e| *e >= 0.));

    let sums = w.row_sums();
    let scales = l.row_scales();
    assert_float_eq!(sums.as_slice(), scales.as_slice(), abs_all <= 1e-12);
    for s in sums {
        assert!(s >= 0.95 - 1e-12 && s <= 1. + 1e-12);
    }
}

#[test]
fn test_svd_sigma()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(7);
    let l = SvdLinear::<f64>::new(3, 5, &MapParam::svd(), &mut rng).unwrap();

    assert_eq!(l.sigmas().len(), 3);
    for s in l.sigmas() {
        assert!(s >= 0.1 && s <= 1.);
    }
    assert!(l.spectral_error() > 0.);
    assert_eq!(l.effective_w().size(), (3, 5));
}

#[test]
fn test_lasso_reg()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(8);
    let par = MapParam::<f64>::default().par(|p| p.gamma = 0.1);
    let mut l = LassoLinear::new(2, 2, &par, &mut rng).unwrap();

    l.params_mut()[0].value_mut().set_iter_rowmaj(&[1., 0., -1., 2.]);
    l.params_mut()[1].value_mut().set_iter_rowmaj(&[0., 3., 0., 0.5]);
    // W = [1, -3; 0, 1.5]
    assert_float_eq!(l.regularization_error(), 0.55, abs <= 1e-12);
}

#[test]
fn test_build_map_all()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(9);
    let x = AMat::new(2, 3).by_fn(|r, c| (r * 3 + c) as f64 * 0.1);

    for kind in MapKind::ALL {
        let par = MapParam::<f64>::for_kind(kind).par(|p| p.bias = true);
        let mut map = build_map(kind, 3, 4, &par, &mut rng).unwrap();

        assert_eq!(map.size(), (3, 4));
        assert_eq!(map.forward(&x).unwrap().size(), (2, 4));
        assert!(map.regularization_error() >= 0.);
        assert!(map.params().iter().any(|p| p.name() == "bias"));

        let bad = AMat::new(2, 4);
        assert!(matches!(map.forward(&bad), Err(MapError::SizeMismatch {expected: 3, actual: 4, ..})));

        map.backward(&x, &AMat::new(2, 4).by_fn(|_, _| 1.)).unwrap();
        map.zero_grad();
        for p in map.params() {
            assert_eq!(p.grad().abssum(), 0.);
        }
    }

    let no_bias = build_map(MapKind::Linear, 3, 4, &MapParam::<f64>::default(), &mut rng).unwrap();
    assert_eq!(no_bias.num_params(), 12);
}

#[test]
fn test_invalid_param()
{
    let mut rng = Xoshiro256StarStar::seed_from_u64(10);
    let par = MapParam::<f64>::spectral().par(|p| {
        p.sigma_min = 1.;
        p.sigma_max = 0.5;
    });

    for kind in MapKind::ALL {
        assert!(matches!(build_map(kind, 2, 2, &par, &mut rng), Err(MapError::InvalidParam(_))));
    }
}

#[test]
fn test_descend()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let mut rng = Xoshiro256StarStar::seed_from_u64(11);
    let target = AMat::new(2, 2).iter_rowmaj(&[0.5, -1., 2., 0.]);
    let x = rand_normal(16, 2, 1., &mut rng);
    let y_ref = x.matmul(&target);

    let mut l = Linear::new(2, 2, &MapParam::default(), &mut rng).unwrap();
    let mse = |l: &Linear<f64>| {
        let y = l.forward(&x).unwrap();
        let mut d = y.clone();
        d.add_assign(-1., &y_ref);
        d.norm_fro().powi(2) / 16.
    };

    let first = mse(&l);
    for _ in 0.. 200 {
        let mut g = l.forward(&x).unwrap();
        g.add_assign(-1., &y_ref);
        l.zero_grad();
        l.backward(&x, &g.scale(2. / 16.)).unwrap();
        for p in l.params_mut() {
            p.descend(0.1);
        }
    }
    assert!(mse(&l) < first * 1e-3);
}
