// ==========================================
// 考试成绩批量对账系统 - 配置层
// ==========================================
// 职责: 系统配置管理（并发、重试、截止时间、默认提交人）
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod reconcile_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use reconcile_config_trait::{ConfigResult, ReconcileConfigReader, ReconcileSettings};
