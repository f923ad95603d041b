// ==========================================
// AMD 方案模拟引擎 - 运行进度事件
// ==========================================
// 职责: 定义人群运行的观察者 trait,供调用方接收进度通知
// 说明: 引擎只定义 trait,进度条/落库等由调用方实现
// 红线: 观察者可能被多个工作线程并发调用,不保证按患者序号到达
// ==========================================

use crate::domain::patient::PatientTrajectory;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ==========================================
// 运行事件类型
// ==========================================

/// 人群运行结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunEventType {
    /// 全部患者完成
    Completed,
    /// 调用方取消
    Cancelled,
}

impl RunEventType {
    pub fn as_str(&self) -> &str {
        match self {
            RunEventType::Completed => "Completed",
            RunEventType::Cancelled => "Cancelled",
        }
    }
}

/// 运行结束事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFinishedEvent {
    pub run_id: String,
    pub event_type: RunEventType,
    /// 已完成患者数
    pub completed: usize,
    /// 请求的人群规模
    pub requested: usize,
}

// ==========================================
// 观察者 Trait
// ==========================================

/// 轨迹观察者
///
/// # 实现说明
/// - `on_patient_completed` 在工作线程上调用,实现需自行同步
/// - 不得阻塞过久,否则拖慢整个运行
pub trait TrajectoryObserver: Send + Sync {
    /// 单个患者轨迹完成
    fn on_patient_completed(&self, run_id: &str, trajectory: &PatientTrajectory);

    /// 运行结束（完成或取消）
    fn on_run_finished(&self, _event: &RunFinishedEvent) {}
}

/// 空操作观察者
///
/// 用于不需要进度通知的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpObserver;

impl TrajectoryObserver for NoOpObserver {
    fn on_patient_completed(&self, _run_id: &str, _trajectory: &PatientTrajectory) {}

    fn on_run_finished(&self, event: &RunFinishedEvent) {
        tracing::debug!(
            "NoOpObserver: 跳过运行结束通知 - run_id={}, event_type={}",
            event.run_id,
            event.event_type.as_str()
        );
    }
}

/// 可选的观察者包装
///
/// 简化 Option<Arc<dyn TrajectoryObserver>> 的使用
#[derive(Clone, Default)]
pub struct OptionalObserver {
    inner: Option<Arc<dyn TrajectoryObserver>>,
}

impl OptionalObserver {
    pub fn with_observer(observer: Arc<dyn TrajectoryObserver>) -> Self {
        Self {
            inner: Some(observer),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn patient_completed(&self, run_id: &str, trajectory: &PatientTrajectory) {
        if let Some(observer) = &self.inner {
            observer.on_patient_completed(run_id, trajectory);
        }
    }

    pub fn run_finished(&self, event: &RunFinishedEvent) {
        if let Some(observer) = &self.inner {
            observer.on_run_finished(event);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}
