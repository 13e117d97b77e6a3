use float_eq::assert_float_eq;
use paramap::prelude::*;
use paramap::*;

type ATensor = Tensor<f64>;

//

fn scale_model(batch: &Batch<f64>) -> Result<DataMap<f64>, SimError>
{
    let y = required("scale", &batch.data, "Y")?;
    let mut out = DataMap::new();

    let mut y2 = y.clone();
    for e in y2.data_mut() {
        *e *= 2.;
    }
    out.insert(batch.key("Y_pred"), y2);
    out.insert(batch.key("loss"), Tensor::scalar(y.mean()));
    Ok(out)
}

fn batch(name: &str, offset: f64) -> Batch<f64>
{
    Batch::new(name, DataMap::new())
        .with("Y", Tensor::by_fn(&[5, 3], |i| i as f64 + offset))
}

//

#[test]
fn test_agg_mean()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let model = scale_model;
    let sim = MultiSequenceOpenLoopSimulator::new(&model, Partitions::new(vec![], vec![], vec![]));

    let a = DataMap::from([("loss".to_string(), ATensor::scalar(1.))]);
    let b = DataMap::from([("loss".to_string(), ATensor::scalar(3.))]);
    let agg = sim.agg(&[a, b]).unwrap();

    assert_eq!(agg.len(), 1);
    assert_eq!(agg["loss"].rank(), 0);
    assert_float_eq!(agg["loss"].item().unwrap(), 2., abs <= 1e-15);
}

#[test]
fn test_agg_concat_stack()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let model = scale_model;
    let a = DataMap::from([("x".to_string(), ATensor::by_fn(&[5, 3], |i| i as f64))]);
    let b = DataMap::from([("x".to_string(), ATensor::by_fn(&[5, 3], |i| -(i as f64)))]);

    let sim = MultiSequenceOpenLoopSimulator::new(&model, Partitions::new(vec![], vec![], vec![]));
    let cat = sim.agg(&[a.clone(), b.clone()]).unwrap();
    assert_eq!(cat["x"].shape(), &[10, 3]);

    let sim = sim.stack(true);
    let st = sim.agg(&[a.clone(), b]).unwrap();
    assert_eq!(st["x"].shape(), &[2, 5, 3]);
    assert_eq!(st["x"].select0(0).unwrap(), a["x"]);
}

#[test]
fn test_agg_keys()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let model = scale_model;
    let sim = MultiSequenceOpenLoopSimulator::new(&model, Partitions::new(vec![], vec![], vec![]));

    let a = DataMap::from([("loss".to_string(), ATensor::scalar(1.))]);
    let b = DataMap::from([
        ("loss".to_string(), ATensor::scalar(3.)),
        ("extra".to_string(), ATensor::scalar(5.)),
    ]);

    let agg = sim.agg(&[a.clone(), b.clone()]).unwrap();
    assert!(!agg.contains_key("extra"));

    assert_eq!(sim.agg(&[b, a]), Err(SimError::KeyMismatch {key: "extra".to_string()}));
    assert!(sim.agg(&[]).unwrap().is_empty());
}

#[test]
fn test_multi_sequence_simulate()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let model = scale_model;
    let seqs = |name: &str| vec![batch(name, 0.), batch(name, 10.)];
    let sim = MultiSequenceOpenLoopSimulator::new(&model, Partitions::new(seqs("train"), seqs("dev"), seqs("test")));

    let dev = sim.dev_eval().unwrap();
    assert_eq!(dev["dev_Y_pred"].shape(), &[10, 3]);
    // means 7 and 17
    assert_float_eq!(dev["dev_loss"].item().unwrap(), 12., abs <= 1e-12);

    let all = sim.test_eval().unwrap();
    assert_eq!(all.len(), 6);

    let off = MultiSequenceOpenLoopSimulator::new(&model, Partitions::new(seqs("train"), seqs("dev"), seqs("test")))
        .eval_sim(false);
    assert!(off.dev_eval().unwrap().is_empty());
}

#[test]
fn test_open_loop()
{
    let _ = env_logger::builder().is_test(true).try_init();

    let model = scale_model;
    let sim = OpenLoopSimulator::new(&model, Partitions::new(batch("train", 0.), batch("dev", 1.), batch("test", 2.)));

    let out = sim.simulate(&batch("test", 2.)).unwrap();
    assert_eq!(out["test_Y_pred"].data()[0], 4.);

    let all = sim.test_eval().unwrap();
    for k in ["train_Y_pred", "dev_Y_pred", "test_Y_pred", "train_loss", "dev_loss", "test_loss"] {
        assert!(all.contains_key(k), "{}", k);
    }
    assert_eq!(all["dev_Y_pred"].data()[0], 2.);
}

#[test]
fn test_mh_open_loop()
{
    let _ = env_logger::builder().is_test(true).try_init();

    // predicts the next step by the last one plus one, for a (3, 1, 1) window
    let model = |b: &Batch<f64>| -> Result<DataMap<f64>, SimError> {
        let yp = required("mh", &b.data, "Yp")?;
        let last = yp.data()[yp.data().len() - 1];
        Ok(DataMap::from([
            (b.key("Y_pred"), Tensor::new(&[1, 1, 1], vec![last + 1.])?),
            (b.key("loss"), Tensor::scalar(last)),
        ]))
    };

    let series = Batch::new("test", DataMap::new())
        .with("Yp", Tensor::by_fn(&[7, 1, 1], |i| i as f64 * 100.))
        .with("Up", Tensor::by_fn(&[7, 1, 2], |i| i as f64));
    let sim = MhOpenLoopSimulator::new(&model, Partitions::new(series.clone(), series.clone(), series.clone()))
        .par(|p| {
            p.nsteps = 3;
        });

    let out = sim.simulate(&series).unwrap();
    assert_eq!(out["test_Y_pred"].shape(), &[4, 1, 1]);
    // initial window 0, 100, 200 then fed back by predictions
    assert_eq!(out["test_Y_pred"].data(), &[201., 202., 203., 204.]);
    assert_eq!(out["test_loss"].data(), &[200., 201., 202., 203.]);
    assert_eq!(out["Up"], series.data["Up"]);

    let short = MhOpenLoopSimulator::new(&model, Partitions::new(series.clone(), series.clone(), series.clone()))
        .par(|p| p.nsteps = 8);
    assert!(matches!(short.simulate(&series), Err(SimError::OutOfRange {start: 0, end: 8, len: 7, ..})));
}
