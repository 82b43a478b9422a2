// ==========================================
// 考试成绩批量对账系统 - 对账配置读取 Trait
// ==========================================
// 职责: 定义成绩导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ReconcileConfigReader Trait
// ==========================================
// 用途: 成绩导入/对账所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ReconcileConfigReader: Send + Sync {
    /// 成绩写入并发上限
    ///
    /// # 默认值
    /// - 8（最小 1）
    async fn get_upsert_concurrency(&self) -> ConfigResult<usize>;

    /// 单条成绩写入失败后的最大重试次数
    ///
    /// # 默认值
    /// - 2
    async fn get_upsert_max_retries(&self) -> ConfigResult<u32>;

    /// 重试退避基数（毫秒，按重试次数线性增长）
    ///
    /// # 默认值
    /// - 200
    async fn get_retry_backoff_ms(&self) -> ConfigResult<u64>;

    /// 单次导入的截止时间（秒）
    ///
    /// # 默认值
    /// - 0（不限时）
    ///
    /// # 说明
    /// - 到期后不再派发新的写入，已在途的写入允许完成
    async fn get_import_timeout_secs(&self) -> ConfigResult<u64>;

    /// 未指定提交人时使用的默认提交人
    ///
    /// # 默认值
    /// - "admin"
    async fn get_default_submitter(&self) -> ConfigResult<String>;
}

// ==========================================
// ReconcileSettings - 单次导入使用的配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileSettings {
    pub upsert_concurrency: usize,
    pub upsert_max_retries: u32,
    pub retry_backoff_ms: u64,
    pub import_timeout_secs: u64,
    pub default_submitter: String,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            upsert_concurrency: 8,
            upsert_max_retries: 2,
            retry_backoff_ms: 200,
            import_timeout_secs: 0,
            default_submitter: "admin".to_string(),
        }
    }
}

impl ReconcileSettings {
    /// 从配置读取器加载（每次导入开始时读取一次）
    pub async fn load<C: ReconcileConfigReader + ?Sized>(config: &C) -> ConfigResult<Self> {
        Ok(Self {
            upsert_concurrency: config.get_upsert_concurrency().await?.max(1),
            upsert_max_retries: config.get_upsert_max_retries().await?,
            retry_backoff_ms: config.get_retry_backoff_ms().await?,
            import_timeout_secs: config.get_import_timeout_secs().await?,
            default_submitter: config.get_default_submitter().await?,
        })
    }
}
