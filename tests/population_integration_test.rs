// ==========================================
// 人群运行集成测试
// ==========================================
// 职责: 验证人群级别的可复现性、不变量与取消语义
// ==========================================

mod test_helpers;

use amd_tae_sim::domain::{DiseaseState, PatientTrajectory};
use amd_tae_sim::engine::{
    run, CancellationToken, Parallelism, PopulationRunner, RunRequest, TrajectoryObserver,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_helpers::sample_protocol;

const HORIZON: u32 = 5 * 365;

#[test]
fn test_identical_across_parallelism() {
    amd_tae_sim::logging::init_test();
    let runner = PopulationRunner::new(sample_protocol()).unwrap();
    let base = RunRequest::new(200, HORIZON, 123_456_789);

    let sequential = runner
        .run(&base.with_parallelism(Parallelism::Sequential))
        .unwrap();
    let four = runner
        .run(&base.with_parallelism(Parallelism::Threads(4)))
        .unwrap();
    let available = runner
        .run(&base.with_parallelism(Parallelism::Available))
        .unwrap();

    assert_eq!(sequential.trajectories, four.trajectories);
    assert_eq!(sequential.trajectories, available.trajectories);
}

#[test]
fn test_different_seed_differs() {
    let a = run(sample_protocol(), 20, HORIZON, 1).unwrap();
    let b = run(sample_protocol(), 20, HORIZON, 2).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_patient_stream_independent_of_population_size() {
    let small = run(sample_protocol(), 5, HORIZON, 99).unwrap();
    let large = run(sample_protocol(), 50, HORIZON, 99).unwrap();
    assert_eq!(&large[..5], &small[..]);
}

#[test]
fn test_population_invariants() {
    let protocol = sample_protocol();
    let rules = *protocol.interval();
    let bounds = *protocol.baseline_vision();
    let trajectories = run(protocol, 300, HORIZON, 2024).unwrap();

    for t in &trajectories {
        assert!(t.baseline_vision >= bounds.min && t.baseline_vision <= bounds.max);
        for (i, v) in t.visits.iter().enumerate() {
            assert!(v.vision_after >= bounds.min && v.vision_after <= bounds.max);
            assert_ne!(v.disease_after, DiseaseState::Naive);
            if i > 0 {
                assert_ne!(v.disease_before, DiseaseState::Naive);
            }
            if let Some(d) = v.interval_decision {
                assert!(d.new_interval >= rules.min_interval && d.new_interval <= rules.max_interval);
            }
        }
        // 停药最多发生在每段治疗期一次
        assert!(t.discontinuations().len() as u32 <= t.retreatments + 1);
    }
}

struct CancelAfter {
    limit: usize,
    seen: AtomicUsize,
    token: CancellationToken,
}

impl TrajectoryObserver for CancelAfter {
    fn on_patient_completed(&self, _run_id: &str, _trajectory: &PatientTrajectory) {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.token.cancel();
        }
    }
}

#[test]
fn test_cancelled_parallel_run_returns_valid_partial_results() {
    let token = CancellationToken::new();
    let runner = PopulationRunner::new(sample_protocol())
        .unwrap()
        .with_observer(Arc::new(CancelAfter {
            limit: 10,
            seen: AtomicUsize::new(0),
            token: token.clone(),
        }));
    let request = RunRequest::new(5_000, HORIZON, 7).with_parallelism(Parallelism::Threads(2));

    let partial = runner.run_with_cancel(&request, &token).unwrap();
    assert!(partial.cancelled);
    assert!(partial.completed() >= 10);
    assert!(partial.completed() < 5_000);

    // 已完成轨迹按序号排列,且与完整运行中的同号患者一致
    let ids: Vec<usize> = partial.trajectories.iter().map(|t| t.patient_id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);

    let reference = PopulationRunner::new(sample_protocol()).unwrap();
    for t in partial.trajectories.iter().take(5) {
        let full = reference.driver().simulate(t.patient_id, HORIZON, 7);
        assert_eq!(t, &full);
    }
}
