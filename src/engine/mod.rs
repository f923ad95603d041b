// ==========================================
// AMD 方案模拟引擎 - 引擎层
// ==========================================
// 组件(由叶到根):
// - disease:         疾病状态转移
// - vision:          视力结局
// - interval:        按需延长间隔调度
// - discontinuation: 停药/监测/复发
// - trajectory:      单患者轨迹驱动
// - population:      人群运行器
// 红线: 引擎只读 ProtocolSpec,不做 IO
// ==========================================

pub mod discontinuation;
pub mod disease;
pub mod error;
pub mod events;
pub mod interval;
pub mod population;
pub mod rng;
pub mod trajectory;
pub mod vision;

// 重导出核心引擎
pub use discontinuation::{DiscontinuationContext, DiscontinuationDecision, DiscontinuationManager};
pub use disease::DiseaseTransitionModel;
pub use error::{SimResult, SimulationError};
pub use events::{NoOpObserver, OptionalObserver, RunEventType, RunFinishedEvent, TrajectoryObserver};
pub use interval::IntervalScheduler;
pub use population::{
    run, CancellationToken, Parallelism, PopulationResult, PopulationRunner, RunRequest,
};
pub use rng::{patient_rng, PatientRng};
pub use trajectory::{PatientTrajectoryDriver, VisitOutcome};
pub use vision::VisionOutcomeModel;
