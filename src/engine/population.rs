// ==========================================
// AMD 方案模拟引擎 - 人群运行器
// ==========================================
// 职责: 并行/串行执行多名相互独立的患者轨迹
// 红线:
// - 患者 i 的随机流只由 (seed, i) 决定,结果与并行度无关
// - 输出按患者序号排序
// - 取消时保留已完成轨迹,返回部分结果
// ==========================================

use crate::config::protocol_spec::ProtocolSpec;
use crate::domain::patient::PatientTrajectory;
use crate::engine::error::{SimResult, SimulationError};
use crate::engine::events::{OptionalObserver, RunEventType, RunFinishedEvent, TrajectoryObserver};
use crate::engine::trajectory::PatientTrajectoryDriver;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ==========================================
// 运行参数
// ==========================================

/// 并行度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parallelism {
    /// 当前线程串行执行
    Sequential,
    /// 专用线程池,指定线程数
    Threads(usize),
    /// rayon 全局线程池
    #[default]
    Available,
}

/// 人群运行请求
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub population_size: usize,
    pub horizon_days: u32,
    /// 必填: 不在内部生成默认种子
    pub seed: u64,
    pub parallelism: Parallelism,
}

impl RunRequest {
    pub fn new(population_size: usize, horizon_days: u32, seed: u64) -> Self {
        Self {
            population_size,
            horizon_days,
            seed,
            parallelism: Parallelism::default(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// 校验运行参数
    pub fn validate(&self) -> SimResult<()> {
        if self.population_size == 0 {
            return Err(SimulationError::invalid_request(
                "population_size",
                "人群规模必须 >= 1",
            ));
        }
        if self.horizon_days == 0 {
            return Err(SimulationError::invalid_request(
                "horizon_days",
                "模拟时长必须 > 0",
            ));
        }
        if self.parallelism == Parallelism::Threads(0) {
            return Err(SimulationError::invalid_request(
                "parallelism",
                "线程数必须 >= 1",
            ));
        }
        Ok(())
    }
}

// ==========================================
// 取消令牌
// ==========================================

/// 调用方持有的取消令牌（可跨线程克隆）
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ==========================================
// 运行结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationResult {
    pub run_id: String,
    pub protocol_name: String,
    pub seed: u64,
    pub population_size: usize,
    pub horizon_days: u32,
    pub parallelism: Parallelism,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// 运行被取消且未完成全部患者
    pub cancelled: bool,
    /// 按患者序号排序
    pub trajectories: Vec<PatientTrajectory>,
}

impl PopulationResult {
    pub fn completed(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.trajectories.len() == self.population_size
    }
}

// ==========================================
// PopulationRunner
// ==========================================
#[derive(Clone)]
pub struct PopulationRunner {
    driver: PatientTrajectoryDriver,
    observer: OptionalObserver,
}

impl PopulationRunner {
    pub fn new(protocol: Arc<ProtocolSpec>) -> SimResult<Self> {
        Ok(Self {
            driver: PatientTrajectoryDriver::new(protocol)?,
            observer: OptionalObserver::none(),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn TrajectoryObserver>) -> Self {
        self.observer = OptionalObserver::with_observer(observer);
        self
    }

    pub fn driver(&self) -> &PatientTrajectoryDriver {
        &self.driver
    }

    /// 运行整个人群（不可取消）
    pub fn run(&self, request: &RunRequest) -> SimResult<PopulationResult> {
        self.run_with_cancel(request, &CancellationToken::new())
    }

    /// 运行人群,调用方可通过 token 取消
    ///
    /// # 返回
    /// - 取消时: 已完成轨迹 + cancelled = true
    #[instrument(skip(self, request, token), fields(protocol = %self.driver.protocol().name()))]
    pub fn run_with_cancel(
        &self,
        request: &RunRequest,
        token: &CancellationToken,
    ) -> SimResult<PopulationResult> {
        request.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            patients = request.population_size,
            horizon_days = request.horizon_days,
            seed = request.seed,
            parallelism = ?request.parallelism,
            "开始人群模拟"
        );

        let simulate_one = |patient_id: usize| -> Option<PatientTrajectory> {
            if token.is_cancelled() {
                return None;
            }
            let trajectory =
                self.driver
                    .simulate(patient_id, request.horizon_days, request.seed);
            self.observer.patient_completed(&run_id, &trajectory);
            Some(trajectory)
        };

        let n = request.population_size;
        let trajectories: Vec<PatientTrajectory> = match request.parallelism {
            Parallelism::Sequential => (0..n).filter_map(&simulate_one).collect(),
            Parallelism::Available => (0..n).into_par_iter().filter_map(&simulate_one).collect(),
            Parallelism::Threads(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| SimulationError::ThreadPool(e.to_string()))?;
                pool.install(|| (0..n).into_par_iter().filter_map(&simulate_one).collect())
            }
        };

        let cancelled = token.is_cancelled() && trajectories.len() < n;
        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - started_at).num_milliseconds();

        if cancelled {
            warn!(
                run_id = %run_id,
                completed = trajectories.len(),
                requested = n,
                elapsed_ms,
                "人群模拟已取消,返回部分结果"
            );
        } else {
            info!(
                run_id = %run_id,
                completed = trajectories.len(),
                elapsed_ms,
                "人群模拟完成"
            );
        }

        self.observer.run_finished(&RunFinishedEvent {
            run_id: run_id.clone(),
            event_type: if cancelled {
                RunEventType::Cancelled
            } else {
                RunEventType::Completed
            },
            completed: trajectories.len(),
            requested: n,
        });

        Ok(PopulationResult {
            run_id,
            protocol_name: self.driver.protocol().name().to_string(),
            seed: request.seed,
            population_size: n,
            horizon_days: request.horizon_days,
            parallelism: request.parallelism,
            started_at,
            finished_at,
            cancelled,
            trajectories,
        })
    }
}

/// 便捷入口: 以默认并行度运行并只返回轨迹
pub fn run(
    protocol: Arc<ProtocolSpec>,
    population_size: usize,
    horizon_days: u32,
    seed: u64,
) -> SimResult<Vec<PatientTrajectory>> {
    let runner = PopulationRunner::new(protocol)?;
    let result = runner.run(&RunRequest::new(population_size, horizon_days, seed))?;
    Ok(result.trajectories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_fixtures::sample_protocol;
    use std::sync::atomic::AtomicUsize;

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
    fn test_request_validation() {
        assert!(RunRequest::new(0, 365, 1).validate().is_err());
        assert!(RunRequest::new(10, 0, 1).validate().is_err());
        assert!(RunRequest::new(10, 365, 1)
            .with_parallelism(Parallelism::Threads(0))
            .validate()
            .is_err());
        assert!(RunRequest::new(1, 1, 0).validate().is_ok());
    }

    #[test]
    fn test_invalid_request_field() {
        let runner = PopulationRunner::new(sample_protocol()).unwrap();
        match runner.run(&RunRequest::new(0, 365, 1)) {
            Err(SimulationError::InvalidRequest { field, .. }) => {
                assert_eq!(field, "population_size")
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.completed())),
        }
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let runner = PopulationRunner::new(sample_protocol()).unwrap();
        let base = RunRequest::new(40, 3 * 365, 20240601);

        let sequential = runner
            .run(&base.with_parallelism(Parallelism::Sequential))
            .unwrap();
        let threads = runner
            .run(&base.with_parallelism(Parallelism::Threads(4)))
            .unwrap();

        assert!(sequential.is_complete());
        assert_eq!(sequential.trajectories, threads.trajectories);
        assert_ne!(sequential.run_id, threads.run_id);
        for (i, t) in sequential.trajectories.iter().enumerate() {
            assert_eq!(t.patient_id, i);
        }
    }

    #[test]
    fn test_cancel_before_start_returns_empty() {
        let runner = PopulationRunner::new(sample_protocol()).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let result = runner
            .run_with_cancel(&RunRequest::new(10, 365, 1), &token)
            .unwrap();
        assert!(result.cancelled);
        assert!(result.trajectories.is_empty());
        assert!(!result.is_complete());
    }

    #[test]
    fn test_cancel_midway_keeps_completed() {
        let token = CancellationToken::new();
        let observer = Arc::new(CancelAfter {
            limit: 5,
            seen: AtomicUsize::new(0),
            token: token.clone(),
        });
        let runner = PopulationRunner::new(sample_protocol())
            .unwrap()
            .with_observer(observer);

        let request = RunRequest::new(20, 365, 9).with_parallelism(Parallelism::Sequential);
        let result = runner.run_with_cancel(&request, &token).unwrap();

        assert!(result.cancelled);
        assert_eq!(result.completed(), 5);
        let ids: Vec<usize> = result.trajectories.iter().map(|t| t.patient_id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_run_entry_point() {
        let trajectories = run(sample_protocol(), 5, 365, 42).unwrap();
        assert_eq!(trajectories.len(), 5);
        assert_eq!(trajectories, run(sample_protocol(), 5, 365, 42).unwrap());
    }
}
