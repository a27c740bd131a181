//! The whole pipeline is a pure function of (profile, config, seed).

use anyhow::Result;

use steadysim_core::{
    evaluate, CacheServiceParams, EvaluationSweep, ExecutionModel, HwParameters, InstanceParams,
    ModelKind,
};
use steadysim_tests::{cache_config, generated_workload, hybrid_config};

#[test]
fn generation_repeats_exactly_per_seed() {
    let first = generated_workload(17);
    let second = generated_workload(17);
    assert_eq!(first.queries(), second.queries());

    let different = generated_workload(18);
    assert_ne!(first.queries(), different.queries());
}

#[test]
fn plans_repeat_exactly_per_seed() -> Result<()> {
    for kind in [ModelKind::Eager, ModelKind::Lazy, ModelKind::Hybrid] {
        let workload = generated_workload(9);
        let mut first = kind.build(
            workload.clone(),
            cache_config(),
            hybrid_config(&workload),
        )?;
        let mut second = kind.build(
            workload.clone(),
            cache_config(),
            hybrid_config(&workload),
        )?;
        assert_eq!(first.plan()?, second.plan()?, "{kind:?}");
    }
    Ok(())
}

#[test]
fn costs_repeat_even_with_latency_jitter_enabled() -> Result<()> {
    // jitter bounds wide open; the seed pins the draws
    let hw = HwParameters {
        instance: InstanceParams::c5n_large(),
        cache: CacheServiceParams::s3(),
    };
    let workload = generated_workload(21);

    let mut first = ModelKind::Hybrid.build(
        workload.clone(),
        cache_config(),
        hybrid_config(&workload),
    )?;
    let mut second = ModelKind::Hybrid.build(
        workload.clone(),
        cache_config(),
        hybrid_config(&workload),
    )?;

    let a = evaluate(first.as_mut(), &hw, 99)?;
    let b = evaluate(second.as_mut(), &hw, 99)?;
    assert_eq!(a.total_runtime, b.total_runtime);
    assert_eq!(a.cost, b.cost);

    // a different jitter seed moves the runtime
    let c = evaluate(second.as_mut(), &hw, 100)?;
    assert_ne!(a.total_runtime, c.total_runtime);
    Ok(())
}

#[test]
fn sweeps_repeat_across_runs() -> Result<()> {
    let workload = generated_workload(33);
    let hw = HwParameters {
        instance: InstanceParams::c5n_large(),
        cache: CacheServiceParams::s3().without_latency_jitter(),
    };
    let sweep = EvaluationSweep::new(
        workload.clone(),
        hw,
        cache_config(),
        hybrid_config(&workload),
        0,
    )?;
    let points = EvaluationSweep::points(
        &[ModelKind::OneOff, ModelKind::Lazy, ModelKind::Hybrid],
        &[None, Some(50_000_000), Some(500_000_000)],
    );

    let first = sweep.run(&points)?;
    let second = sweep.run(&points)?;
    assert_eq!(first, second);

    // bounded caches can never cost more capacity than they hold
    for outcome in &first {
        if let Some(capacity) = outcome.point.max_capacity {
            assert!(outcome.evaluation.cache_usage <= capacity);
        }
    }
    Ok(())
}
