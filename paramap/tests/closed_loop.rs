use float_eq::assert_float_eq;
use paramap::prelude::*;
use paramap::*;

//

const NB: usize = 2;

// Y: (T, B, 1), R: (T, B, 1), D: (T, B, 1)
fn sim_data(nt: usize) -> DataMap<f64>
{
    DataMap::from([
        ("Y".to_string(), Tensor::by_fn(&[nt, NB, 1], |i| (i / NB) as f64)),
        ("R".to_string(), Tensor::by_fn(&[nt, NB, 1], |_| 1.)),
        ("D".to_string(), Tensor::by_fn(&[nt, NB, 1], |i| 0.1 * (i / NB) as f64)),
    ])
}

// x0 is the mean of the observed window
fn estimator(window: usize) -> FnComponent<f64>
{
    FnComponent::new("estim", &["Y"], &["x0", "reg_error_estim"], |d: &DataMap<f64>| {
        let y = required("estim", d, "Y")?;
        let x0 = Tensor::new(&[1, NB, 1], vec![y.mean(); NB])?;
        Ok(DataMap::from([
            ("x0".to_string(), x0),
            ("reg_error_estim".to_string(), Tensor::scalar(0.)),
        ]))
    })
    .window_size(window)
}

// u over a horizon of nsteps, u[t] = R - x0 + t
fn policy(nsteps: usize) -> FnComponent<f64>
{
    FnComponent::new("policy", &["x0", "R"], &["U", "reg_error_policy"], move |d: &DataMap<f64>| {
        let x0 = required("policy", d, "x0")?;
        let r = required("policy", d, "R")?;
        assert_eq!(r.len0(), nsteps);

        let u = Tensor::by_fn(&[nsteps, NB, 1], |i| r.data()[0] - x0.data()[0] + (i / NB) as f64);
        Ok(DataMap::from([
            ("U".to_string(), u),
            ("reg_error_policy".to_string(), Tensor::scalar(0.)),
        ]))
    })
    .nsteps(nsteps)
}

// y+ = x0 + u + d
fn emulator() -> FnComponent<f64>
{
    FnComponent::new("emulator", &["x0", "U", "D"], &["Y_next", "reg_error_dynamics"], |d: &DataMap<f64>| {
        let x0 = required("emulator", d, "x0")?;
        let u = required("emulator", d, "U")?;
        let dist = required("emulator", d, "D")?;
        assert_eq!(u.shape(), &[1, NB, 1]);
        assert_eq!(dist.shape(), &[1, NB, 1]);

        let y = Tensor::by_fn(&[1, NB, 1], |i| x0.data()[i] + u.data()[i] + dist.data()[i]);
        Ok(DataMap::from([
            ("Y_next".to_string(), y),
            ("reg_error_dynamics".to_string(), Tensor::scalar(0.)),
        ]))
    })
}

//

#[test]
fn test_closed_loop_steps()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let sim = ClosedLoopSimulator::new(
        sim_data(8), Box::new(policy(2)), Box::new(emulator()), Some(Box::new(estimator(3))),
    ).unwrap().par(|p| {
        p.nsim = 5;
        p.log_period = 2;
    });
    assert_eq!(sim.start_k(), 3);
    assert_eq!(sim.cl_keys(), vec!["U", "Y_next", "x0"]);

    let out = sim.simulate().unwrap();
    assert_eq!(out.len(), 3);
    for k in ["reg_error_dynamics", "reg_error_policy", "reg_error_estim"] {
        assert!(!out.contains_key(k));
    }
    for (k, t) in &out {
        assert_eq!(t.shape(), &[5, NB, 1], "{}", k);
    }

    // k = 3..7: window mean of Y over k-3..k is k-2, u = 1 - (k-2), y+ = 1 + 0.1 k
    let u = out["U"].data();
    let y = out["Y_next"].data();
    for step in 0.. 5 {
        let k = (step + 3) as f64;
        assert_float_eq!(u[step * NB], 3. - k, abs <= 1e-12);
        assert_float_eq!(y[step * NB], 1. + 0.1 * k, abs <= 1e-12);
    }
}

#[test]
fn test_closed_loop_feedback()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let sim = ClosedLoopSimulator::new(
        sim_data(10), Box::new(policy(1)), Box::new(emulator()), Some(Box::new(estimator(1))),
    ).unwrap().par(|p| {
        p.nsim = 6;
        p.feedback = vec![("Y_next".to_string(), "Y".to_string())];
    });
    assert_eq!(sim.start_k(), 1);

    let out = sim.simulate().unwrap();
    let x0 = out["x0"].data();
    let y = out["Y_next"].data();

    // estimates after the first step read back the emulated outputs
    for step in 1.. 6 {
        assert_float_eq!(x0[step * NB], y[(step - 1) * NB], abs <= 1e-12);
    }
}

#[test]
fn test_closed_loop_feedback_out_of_range()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // Y ends at the last step while the disturbance goes on
    let mut data = sim_data(8);
    data.insert("Y".to_string(), Tensor::by_fn(&[6, NB, 1], |i| (i / NB) as f64));

    let sim = ClosedLoopSimulator::new(
        data, Box::new(policy(1)), Box::new(emulator()), Some(Box::new(estimator(1))),
    ).unwrap().par(|p| {
        p.nsim = 6;
        p.feedback = vec![("Y_next".to_string(), "Y".to_string())];
    });

    match sim.simulate() {
        Err(SimError::OutOfRange {key, start: 6, end: 7, len: 6}) => assert_eq!(key, "Y"),
        _ => panic!("feedback past the end of Y"),
    }

    // without feedback the short Y is only read
    let mut data = sim_data(8);
    data.insert("Y".to_string(), Tensor::by_fn(&[6, NB, 1], |i| (i / NB) as f64));
    let sim = ClosedLoopSimulator::new(
        data, Box::new(policy(1)), Box::new(emulator()), Some(Box::new(estimator(1))),
    ).unwrap().par(|p| p.nsim = 6);
    assert!(sim.simulate().is_ok());
}

#[test]
fn test_closed_loop_no_estimator()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let policy = FnComponent::new("policy", &["R"], &["U", "reg_error_policy"], |d: &DataMap<f64>| {
        let r = required("policy", d, "R")?;
        Ok(DataMap::from([
            ("U".to_string(), r.clone()),
            ("reg_error_policy".to_string(), Tensor::scalar(0.)),
        ]))
    })
    .nsteps(4);
    let emulator = FnComponent::new("emulator", &["U", "W"], &["Y_next"], |d: &DataMap<f64>| {
        let u = required("emulator", d, "U")?;
        Ok(DataMap::from([("Y_next".to_string(), u.clone())]))
    })
    .optional(&["W"]);

    let sim = ClosedLoopSimulator::new(sim_data(6), Box::new(policy), Box::new(emulator), None)
        .unwrap().par(|p| p.nsim = 2);
    assert_eq!(sim.start_k(), 4);

    let out = sim.simulate().unwrap();
    assert_eq!(out["U"].shape(), &[2, NB, 1]);
    assert_eq!(out["Y_next"].shape(), &[2, NB, 1]);
}

#[test]
fn test_closed_loop_errors()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let zero = ClosedLoopSimulator::new(sim_data(8), Box::new(policy(0)), Box::new(emulator()), None);
    assert!(matches!(zero, Err(SimError::InvalidComponent {arg: "policy", ..})));

    let no_out = FnComponent::new("mute", &[], &[], |_: &DataMap<f64>| Ok(DataMap::new()));
    let mute = ClosedLoopSimulator::new(sim_data(8), Box::new(policy(2)), Box::new(no_out), None);
    assert!(matches!(mute, Err(SimError::InvalidComponent {arg: "emulator", ..})));

    let blind = ClosedLoopSimulator::new(
        sim_data(8), Box::new(policy(2)), Box::new(emulator()), Some(Box::new(estimator(0))),
    );
    assert!(matches!(blind, Err(SimError::InvalidComponent {arg: "estimator", ..})));

    // D is required by the emulator
    let mut data = sim_data(8);
    data.remove("D");
    let sim = ClosedLoopSimulator::new(data, Box::new(policy(2)), Box::new(emulator()), Some(Box::new(estimator(2))))
        .unwrap().par(|p| p.nsim = 3);
    assert!(matches!(sim.simulate(), Err(SimError::MissingKey {..})));

    // runs past the end of the data
    let sim = ClosedLoopSimulator::new(sim_data(6), Box::new(policy(2)), Box::new(emulator()), Some(Box::new(estimator(3))))
        .unwrap().par(|p| p.nsim = 5);
    assert!(matches!(sim.simulate(), Err(SimError::OutOfRange {end: 7, len: 6, ..})));
}
