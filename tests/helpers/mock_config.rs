// ==========================================
// Mock 配置实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use marks_reconciler::config::{ConfigResult, ReconcileConfigReader};

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub upsert_concurrency: usize,
    pub upsert_max_retries: u32,
    pub retry_backoff_ms: u64,
    pub import_timeout_secs: u64,
    pub default_submitter: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            upsert_concurrency: 4,
            upsert_max_retries: 1,
            retry_backoff_ms: 1,
            import_timeout_secs: 0,
            default_submitter: "admin".to_string(),
        }
    }
}

impl MockConfig {
    /// 指定并发上限
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            upsert_concurrency: concurrency,
            ..Self::default()
        }
    }

    /// 指定并发上限与截止时间
    pub fn with_deadline(concurrency: usize, timeout_secs: u64) -> Self {
        Self {
            upsert_concurrency: concurrency,
            import_timeout_secs: timeout_secs,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ReconcileConfigReader for MockConfig {
    async fn get_upsert_concurrency(&self) -> ConfigResult<usize> {
        Ok(self.upsert_concurrency)
    }

    async fn get_upsert_max_retries(&self) -> ConfigResult<u32> {
        Ok(self.upsert_max_retries)
    }

    async fn get_retry_backoff_ms(&self) -> ConfigResult<u64> {
        Ok(self.retry_backoff_ms)
    }

    async fn get_import_timeout_secs(&self) -> ConfigResult<u64> {
        Ok(self.import_timeout_secs)
    }

    async fn get_default_submitter(&self) -> ConfigResult<String> {
        Ok(self.default_submitter.clone())
    }
}
