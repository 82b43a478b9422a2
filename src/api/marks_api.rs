// ==========================================
// 考试成绩批量对账系统 - 成绩 API
// ==========================================
// 职责: 封装模板导出、成绩导入、单科查看/录入
// 存储: 单个 SQLite 连接在仓储与配置之间共享
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::marks::ReconciliationReport;
use crate::domain::roster::RosterWarning;
use crate::engine::{MarksImportService, SubjectMarksRow};
use crate::repository::{ExamCatalogRepositoryImpl, MarksRepositoryImpl};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 模板导出响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateExportResponse {
    pub file_name: String,
    pub csv: String,
    /// 数据行数（去重学号数）
    pub rows: usize,
    /// 科目列数
    pub columns: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roster_warnings: Vec<RosterWarning>,
}

/// 成绩API
pub struct MarksApi {
    service: MarksImportService<ConfigManager>,
}

impl MarksApi {
    /// 打开数据库（不存在则建表）并创建 API
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("初始化表结构失败: {}", e)))?;

        info!(db_path, "成绩 API 已初始化");
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        if let Ok(snapshot) = config.get_config_snapshot() {
            debug!(config = %snapshot, "生效配置");
        }

        let catalog = Arc::new(ExamCatalogRepositoryImpl::from_connection(conn.clone()));
        let marks_repo = Arc::new(MarksRepositoryImpl::from_connection(conn));

        Ok(Self {
            service: MarksImportService::new(catalog, marks_repo, config),
        })
    }

    /// 导出成绩模板
    pub async fn export_template(&self, exam_event_id: i64) -> ApiResult<TemplateExportResponse> {
        validate_id("exam_event_id", exam_event_id)?;

        let export = self.service.export_template(exam_event_id).await?;
        Ok(TemplateExportResponse {
            rows: export.template.data_row_count(),
            columns: export.template.subject_column_count(),
            file_name: export.file_name,
            csv: export.csv,
            roster_warnings: export.roster_warnings,
        })
    }

    /// 导出成绩模板到目录，返回文件路径
    pub async fn export_template_to_dir(&self, exam_event_id: i64, dir: &str) -> ApiResult<String> {
        validate_id("exam_event_id", exam_event_id)?;

        let path = self
            .service
            .export_template_to_dir(exam_event_id, Path::new(dir))
            .await?;
        Ok(path.display().to_string())
    }

    /// 导入 CSV 文本
    pub async fn import_marks_csv(
        &self,
        exam_event_id: i64,
        csv_text: &str,
        submitted_by: Option<&str>,
    ) -> ApiResult<ReconciliationReport> {
        validate_id("exam_event_id", exam_event_id)?;
        Ok(self
            .service
            .import_marks_text(exam_event_id, csv_text, submitted_by)
            .await?)
    }

    /// 导入表格文件（.csv / .xlsx）
    pub async fn import_marks_file(
        &self,
        exam_event_id: i64,
        file_path: &str,
        submitted_by: Option<&str>,
    ) -> ApiResult<ReconciliationReport> {
        validate_id("exam_event_id", exam_event_id)?;
        if file_path.trim().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }

        Ok(self
            .service
            .import_marks_file(exam_event_id, file_path, submitted_by)
            .await?)
    }

    /// 单科成绩列表
    pub async fn list_subject_marks(
        &self,
        exam_event_id: i64,
        schedule_id: i64,
    ) -> ApiResult<Vec<SubjectMarksRow>> {
        validate_id("exam_event_id", exam_event_id)?;
        validate_id("schedule_id", schedule_id)?;
        Ok(self
            .service
            .list_subject_marks(exam_event_id, schedule_id)
            .await?)
    }

    /// 单科录入
    pub async fn enter_subject_marks(
        &self,
        exam_event_id: i64,
        schedule_id: i64,
        entries: &[(String, String)],
        submitted_by: Option<&str>,
    ) -> ApiResult<ReconciliationReport> {
        validate_id("exam_event_id", exam_event_id)?;
        validate_id("schedule_id", schedule_id)?;
        Ok(self
            .service
            .enter_subject_marks(exam_event_id, schedule_id, entries, submitted_by)
            .await?)
    }
}

fn validate_id(field: &str, id: i64) -> ApiResult<()> {
    if id <= 0 {
        return Err(ApiError::InvalidInput(format!("{} 必须为正整数: {}", field, id)));
    }
    Ok(())
}
