// ==========================================
// AMD 方案模拟引擎 - 配置层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 每个错误必须带出字段路径,缺失字段绝不回落为默认值
// ==========================================

use thiserror::Error;

/// 方案配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    // ===== 结构错误 =====
    #[error("缺少必填字段: {path}")]
    MissingField { path: String },

    #[error("未知疾病状态 (field={path}): {name}")]
    UnknownState { path: String, name: String },

    // ===== 取值错误 =====
    #[error("字段值无效 (field={path}): {message}")]
    InvalidValue { path: String, message: String },

    #[error("转移矩阵行和不为 1 (field={path}): sum={sum}")]
    RowSumMismatch { path: String, sum: f64 },

    // ===== 解析错误 =====
    #[error("方案文档解析失败: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("方案文件读取失败: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn missing(path: impl Into<String>) -> Self {
        ConfigError::MissingField { path: path.into() }
    }

    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 出错字段路径（解析/IO 错误无路径）
    pub fn path(&self) -> Option<&str> {
        match self {
            ConfigError::MissingField { path }
            | ConfigError::UnknownState { path, .. }
            | ConfigError::InvalidValue { path, .. }
            | ConfigError::RowSumMismatch { path, .. } => Some(path.as_str()),
            ConfigError::Parse(_) | ConfigError::Io(_) => None,
        }
    }
}

/// Result 类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
