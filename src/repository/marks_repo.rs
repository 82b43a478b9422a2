// ==========================================
// 考试成绩批量对账系统 - 成绩 Repository Trait
// ==========================================
// 职责: 定义成绩记录的写入/查询接口
// 红线: upsert 必须幂等（同键重复提交只保留最后一次的值）
// ==========================================

use crate::domain::marks::{MarksRecord, MarksUpsertRequest};
use crate::domain::types::UpsertDisposition;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// MarksRepository Trait
// ==========================================
// 用途: 成绩落库
// 实现者: MarksRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait MarksRepository: Send + Sync {
    /// 写入或覆盖 (schedule_id, student_id) 的成绩
    ///
    /// # 返回
    /// - Ok(Inserted): 新建记录
    /// - Ok(Updated): 已有记录被覆盖
    /// - Err: 写入失败（调用方可安全重试）
    async fn upsert_marks(&self, request: &MarksUpsertRequest)
        -> RepositoryResult<UpsertDisposition>;

    /// 查询单条成绩
    async fn get_marks(
        &self,
        schedule_id: i64,
        student_id: i64,
    ) -> RepositoryResult<Option<MarksRecord>>;

    /// 查询某排程下的全部成绩（按 student_id 升序）
    async fn list_marks_by_schedule(&self, schedule_id: i64) -> RepositoryResult<Vec<MarksRecord>>;
}
