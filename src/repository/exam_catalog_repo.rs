// ==========================================
// 考试成绩批量对账系统 - 考试目录 Repository Trait
// ==========================================
// 职责: 定义考试场次/科目排程/报名申请的只读访问接口
// 红线: Repository 不含业务规则，只做数据读取
// ==========================================

use crate::domain::exam::{EnrollmentApplication, ExamEvent, SubjectSchedule};
use crate::domain::types::ApplicationStatus;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ExamCatalogRepository Trait
// ==========================================
// 用途: 花名册构建所需的上游读接口
// 实现者: ExamCatalogRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ExamCatalogRepository: Send + Sync {
    /// 查询考试场次
    ///
    /// # 返回
    /// - Ok(Some(event)): 找到
    /// - Ok(None): 不存在
    async fn get_exam_event(&self, exam_event_id: i64) -> RepositoryResult<Option<ExamEvent>>;

    /// 查询场次下的全部科目排程（按 schedule_id 升序）
    async fn list_schedules(&self, exam_event_id: i64) -> RepositoryResult<Vec<SubjectSchedule>>;

    /// 查询场次下指定状态的报名申请
    ///
    /// # 说明
    /// - 调用方仍需自行过滤状态，不能假设上游过滤可靠
    async fn list_applications(
        &self,
        exam_event_id: i64,
        status: ApplicationStatus,
    ) -> RepositoryResult<Vec<EnrollmentApplication>>;
}
