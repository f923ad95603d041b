// ==========================================
// 轨迹仓储集成测试
// ==========================================
// 职责: 验证人群结果写入磁盘 SQLite 后可完整读回
// ==========================================

mod test_helpers;

use amd_tae_sim::db::{open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use amd_tae_sim::engine::{Parallelism, PopulationRunner, RunRequest};
use amd_tae_sim::repository::TrajectoryRepository;
use test_helpers::{create_test_repo, sample_protocol};

#[test]
fn test_result_roundtrip_on_disk() {
    let (temp_file, repo) = create_test_repo().unwrap();
    let protocol = sample_protocol();
    let result = PopulationRunner::new(protocol.clone())
        .unwrap()
        .run(&RunRequest::new(25, 3 * 365, 42).with_parallelism(Parallelism::Threads(2)))
        .unwrap();

    let rows = repo
        .save_result(&result, &protocol.snapshot_json().unwrap())
        .unwrap();
    assert_eq!(repo.count_visits(&result.run_id).unwrap(), rows as i64);

    // 重新打开同一文件读取
    drop(repo);
    let path = temp_file.path().to_str().unwrap();
    let reopened = TrajectoryRepository::open(path).unwrap();

    let run = reopened.load_run(&result.run_id).unwrap().unwrap();
    assert_eq!(run.protocol_name, protocol.name());
    assert_eq!(run.completed_patients, 25);
    let snapshot: serde_json::Value = serde_json::from_str(&run.protocol_snapshot).unwrap();
    assert_eq!(snapshot["interval"]["min_interval"], 28);

    let patients = reopened.list_patients(&result.run_id).unwrap();
    assert_eq!(patients.len(), 25);

    for (summary, trajectory) in patients.iter().zip(&result.trajectories) {
        assert_eq!(summary.patient_id as usize, trajectory.patient_id);
        assert_eq!(summary.visit_count as usize, trajectory.visits.len());
        assert_eq!(summary.total_injections, i64::from(trajectory.total_injections));

        let visits = reopened
            .list_visits(&result.run_id, trajectory.patient_id)
            .unwrap();
        let restored: Vec<_> = visits.iter().map(|v| v.to_visit().unwrap()).collect();
        assert_eq!(restored, trajectory.visits);
    }

    let conn = open_sqlite_connection(path).unwrap();
    assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
}

#[test]
fn test_discontinuation_tally_matches_trajectories() {
    let (_temp_file, repo) = create_test_repo().unwrap();
    let result = PopulationRunner::new(sample_protocol())
        .unwrap()
        .run(&RunRequest::new(100, 5 * 365, 3))
        .unwrap();
    repo.save_result(&result, "{}").unwrap();

    let stored: i64 = repo
        .count_discontinuations(&result.run_id)
        .unwrap()
        .iter()
        .map(|(_, n)| n)
        .sum();
    let expected: usize = result
        .trajectories
        .iter()
        .map(|t| t.discontinuations().len())
        .sum();
    assert_eq!(stored, expected as i64);
}
