// ==========================================
// AMD 方案模拟引擎 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 数值边界(概率舍入/视力越界)在组件内部夹取修正,不经由此类型上报
// ==========================================

use crate::config::error::ConfigError;
use thiserror::Error;

/// 模拟运行错误
#[derive(Error, Debug)]
pub enum SimulationError {
    // ===== 配置错误 =====
    #[error(transparent)]
    Config(#[from] ConfigError),

    // ===== 调用参数错误 =====
    #[error("无效运行参数 (field={field}): {message}")]
    InvalidRequest { field: String, message: String },

    // ===== 执行环境错误 =====
    #[error("线程池创建失败: {0}")]
    ThreadPool(String),

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SimulationError {
    pub fn invalid_request(field: impl Into<String>, message: impl Into<String>) -> Self {
        SimulationError::InvalidRequest {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type SimResult<T> = Result<T, SimulationError>;
