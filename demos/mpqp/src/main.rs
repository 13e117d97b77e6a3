use anyhow::Result;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

use paramap::prelude::*;
use paramap::*;
use paramap_core::rand_uniform;

use totsu::prelude::{FloatGeneric, MatType, Solver};
use totsu::{MatBuild, ProbQP};

type La = FloatGeneric<f64>;

type AMatBuild = MatBuild<La>;
type AProbQP = ProbQP<La>;
type ASolver = Solver<La>;

// minimize    x^2 + y^2
// subject to  -x - y + p1 <= 0
//             x + y - p1 - 5 <= 0
//             x - y + p2 - 5 <= 0
//             -x + y - p2 <= 0
const G: [[f64; 2]; 4] = [
    [-1., -1.],
    [1., 1.],
    [1., -1.],
    [-1., 1.],
];

fn vec_h(p1: f64, p2: f64) -> [f64; 4]
{
    [-p1, p1 + 5., 5. - p2, p2]
}

/// Constraint violations \\(\max(G x - h, 0)\\).
fn violations(x: f64, y: f64, p1: f64, p2: f64) -> [f64; 4]
{
    let h = vec_h(p1, p2);
    let mut v = [0.; 4];
    for i in 0.. 4 {
        v[i] = (G[i][0] * x + G[i][1] * y - h[i]).max(0.);
    }
    v
}

/// Samples parameters \\(p_1, p_2 \sim U[1, 11)\\).
fn sample(n: usize, rng: &mut Xoshiro256StarStar) -> Result<DataMap<f64>>
{
    let p = rand_uniform::<f64, _>(n, 2, 1., 11., rng);
    let p1 = Tensor::new(&[n, 1], p.col(0).to_vec())?;
    let p2 = Tensor::new(&[n, 1], p.col(1).to_vec())?;

    Ok(DataMap::from([
        ("p1".to_string(), p1),
        ("p2".to_string(), p2),
    ]))
}

/// Penalty loss \\(Q f(x) + Q_{con} \sum \max(g(x), 0)^2\\), averaged over the batch.
///
/// Returns the loss and its gradient with respect to the solution.
fn penalty_loss(p: &Mat<f64>, x: &Mat<f64>, q: f64, q_con: f64) -> (f64, Mat<f64>)
{
    let (n, _) = x.size();
    let mut loss = 0.;
    let mut grad = Mat::new(n, 2);

    for r in 0.. n {
        let (x0, x1) = (x[(r, 0)], x[(r, 1)]);
        let v = violations(x0, x1, p[(r, 0)], p[(r, 1)]);

        loss += q * (x0 * x0 + x1 * x1);
        grad[(r, 0)] = 2. * q * x0;
        grad[(r, 1)] = 2. * q * x1;

        for i in 0.. 4 {
            loss += q_con * v[i] * v[i];
            grad[(r, 0)] += 2. * q_con * v[i] * G[i][0];
            grad[(r, 1)] += 2. * q_con * v[i] * G[i][1];
        }
    }

    let nf = n as f64;
    (loss / nf, grad.scale(1. / nf))
}

/// Solves one problem instance by the conic solver.
fn solve_qp(p1: f64, p2: f64) -> Result<[f64; 2]>
{
    let n = 2;
    let m = 4;
    let p = 0;

    // (1/2) x^T (2I) x
    let mut sym_p = AMatBuild::new(MatType::SymPack(n));
    sym_p[(0, 0)] = 2.;
    sym_p[(1, 1)] = 2.;

    let vec_q = AMatBuild::new(MatType::General(n, 1));

    let mut mat_g = AMatBuild::new(MatType::General(m, n));
    let mut vec_h_b = AMatBuild::new(MatType::General(m, 1));
    let h = vec_h(p1, p2);
    for i in 0.. m {
        mat_g[(i, 0)] = G[i][0];
        mat_g[(i, 1)] = G[i][1];
        vec_h_b[(i, 0)] = h[i];
    }

    let mat_a = AMatBuild::new(MatType::General(p, n));
    let vec_b = AMatBuild::new(MatType::General(p, 1));

    let s = ASolver::new().par(|p| {p.max_iter = Some(100_000)});
    let mut qp = AProbQP::new(sym_p, vec_q, mat_g, vec_h_b, mat_a, vec_b, s.par.eps_zero);
    let rslt = s.solve(qp.problem())?;

    Ok([rslt.0[0], rslt.0[1]])
}

/// main
fn main() -> Result<()>
{
    env_logger::init();

    let q = 1.;
    let q_con = 100.;
    let n_train = 500;
    let epochs = 5000;
    let lr = 1e-4;
    let log_period = 500;

    //----- training data

    let mut rng = Xoshiro256StarStar::seed_from_u64(0);
    let train = sample(n_train, &mut rng)?;

    //----- solution map p -> x

    let kind: MapKind = match std::env::var("MPQP_MAP_KIND") {
        Ok(k) => k.parse()?,
        Err(_) => MapKind::Linear,
    };
    let mut par = MapParam::for_kind(kind).par(|p| p.bias = true);
    par.set_by_env("MPQP_");
    log::info!("map kind: {}", kind);

    let mut sol = SolutionMap::new("sol", &["p1", "p2"], "x", &[2, 40, 40, 2], kind, &par, &mut rng)?;

    //----- train by penalty method

    let p = sol.input_mat(&train)?;

    for epoch in 0.. epochs {
        let x = sol.forward_mat(&p)?;
        let (loss, grad) = penalty_loss(&p, &x, q, q_con);

        sol.zero_grad();
        sol.backward(&p, &grad)?;
        sol.regularization_backward(1.);
        sol.spectral_backward(1.);
        sol.descend(lr);

        if epoch % log_period == 0 {
            log::info!("{}: loss {:.3e}, reg {:.3e}, spectral {:.3e}", epoch, loss, sol.regularization_error(), sol.spectral_error());
        }
    }

    //----- compare with the solver on a grid

    let grid = 5;
    let mut max_err: f64 = 0.;
    let mut max_viol: f64 = 0.;

    for i1 in 0.. grid {
        for i2 in 0.. grid {
            let p1 = 1. + 10. * i1 as f64 / (grid - 1) as f64;
            let p2 = 1. + 10. * i2 as f64 / (grid - 1) as f64;

            let data = DataMap::from([
                ("p1".to_string(), Tensor::new(&[1, 1], vec![p1])?),
                ("p2".to_string(), Tensor::new(&[1, 1], vec![p2])?),
            ]);
            let out = sol.call(&data)?;
            let x = out["x"].data();

            let x_opt = solve_qp(p1, p2)?;
            let err = ((x[0] - x_opt[0]).powi(2) + (x[1] - x_opt[1]).powi(2)).sqrt();
            let viol = violations(x[0], x[1], p1, p2).iter().cloned().fold(0., f64::max);

            log::debug!("p ({:.2}, {:.2}): map ({:.3}, {:.3}), solver ({:.3}, {:.3})", p1, p2, x[0], x[1], x_opt[0], x_opt[1]);

            max_err = max_err.max(err);
            max_viol = max_viol.max(viol);
        }
    }

    log::info!("max distance to solver: {:.3e}", max_err);
    log::info!("max constraint violation: {:.3e}", max_viol);

    Ok(())
}
