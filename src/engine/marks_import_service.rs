// ==========================================
// 考试成绩批量对账系统 - 成绩导入/导出服务
// ==========================================
// 导出: 花名册解析 → 模板生成
// 导入: 表格解析 → 花名册解析 → 对账 → 有界并发写入 → 报告
// ==========================================
// 红线: 致命错误（上游不可用/场次不存在/配置失败）在任何写入之前返回 Err
// 红线: 单元格级错误只进入报告，返回 Ok(report)
// ==========================================

use crate::config::{ReconcileConfigReader, ReconcileSettings};
use crate::domain::marks::ReconciliationReport;
use crate::domain::exam::{ExamEvent, SubjectSchedule};
use crate::domain::roster::{Roster, RosterWarning};
use crate::engine::error::{ReconcileError, ReconcileResult};
use crate::engine::marks_reconciler::MarksReconciler;
use crate::engine::roster_resolver::RosterResolver;
use crate::engine::submission_reporter::SubmissionReporter;
use crate::engine::template_generator::{MarksTemplate, TemplateGenerator};
use crate::engine::upsert_dispatcher::{CancelFlag, DispatchOptions, UpsertDispatcher};
use crate::importer::file_parser::{CsvParser, RowGrid, UniversalFileParser};
use crate::importer::template_parser::{ParsedTemplate, TemplateParser};
use crate::repository::{ExamCatalogRepository, MarksRepository};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn, Span};
use uuid::Uuid;

// ==========================================
// TemplateExport - 模板导出结果
// ==========================================
#[derive(Debug, Clone)]
pub struct TemplateExport {
    pub file_name: String,
    pub csv: String,
    pub template: MarksTemplate,
    pub roster_warnings: Vec<RosterWarning>,
}

// ==========================================
// SubjectMarksRow - 单科成绩视图行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectMarksRow {
    pub student_id: i64,
    pub roll_number: String,
    pub student_name: String,
    pub max_marks: i32,
    pub marks_obtained: Option<f64>,
    pub marks_entered_by: Option<String>,
    pub marks_entered_at: Option<DateTime<Utc>>,
}

// ==========================================
// MarksImportService
// ==========================================
pub struct MarksImportService<C>
where
    C: ReconcileConfigReader,
{
    catalog: Arc<dyn ExamCatalogRepository>,
    marks_repo: Arc<dyn MarksRepository>,
    config: C,
    resolver: RosterResolver,
}

impl<C> MarksImportService<C>
where
    C: ReconcileConfigReader,
{
    pub fn new(
        catalog: Arc<dyn ExamCatalogRepository>,
        marks_repo: Arc<dyn MarksRepository>,
        config: C,
    ) -> Self {
        let resolver = RosterResolver::new(catalog.clone());
        Self {
            catalog,
            marks_repo,
            config,
            resolver,
        }
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 生成考试场次的成绩模板
    #[instrument(skip(self))]
    pub async fn export_template(&self, exam_event_id: i64) -> ReconcileResult<TemplateExport> {
        let event = self.load_event(exam_event_id).await?;
        let roster = self.resolver.resolve(exam_event_id).await?;

        let template = TemplateGenerator.generate(&roster);
        let csv = template.to_csv()?;
        let file_name = TemplateGenerator::file_name(&event, Local::now().date_naive());

        info!(
            exam_event_id,
            file_name = %file_name,
            rows = template.data_row_count(),
            columns = template.subject_column_count(),
            "成绩模板导出完成"
        );

        Ok(TemplateExport {
            file_name,
            csv,
            template,
            roster_warnings: roster.warnings,
        })
    }

    /// 生成模板并写入目录
    pub async fn export_template_to_dir(
        &self,
        exam_event_id: i64,
        dir: &Path,
    ) -> ReconcileResult<PathBuf> {
        let export = self.export_template(exam_event_id).await?;
        Ok(TemplateGenerator.write_to_dir(&export.template, dir, &export.file_name)?)
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 导入 CSV 文本
    pub async fn import_marks_text(
        &self,
        exam_event_id: i64,
        text: &str,
        submitted_by: Option<&str>,
    ) -> ReconcileResult<ReconciliationReport> {
        let rows = CsvParser.parse_text(text)?;
        self.import_rows(exam_event_id, &rows, submitted_by, &CancelFlag::new())
            .await
    }

    /// 导入表格文件（.csv / .xlsx）
    pub async fn import_marks_file<P: AsRef<Path>>(
        &self,
        exam_event_id: i64,
        file_path: P,
        submitted_by: Option<&str>,
    ) -> ReconcileResult<ReconciliationReport> {
        let rows = UniversalFileParser.parse(file_path)?;
        self.import_rows(exam_event_id, &rows, submitted_by, &CancelFlag::new())
            .await
    }

    /// 导入行网格
    ///
    /// # 参数
    /// - cancel: 调用方取消标记（断开连接等）。配置的截止时间作用于其子标记，
    ///   从本次调用开始计时，不会改变调用方的标记
    ///
    /// # 返回
    /// - Ok(report): 全部或部分成功（单元格级错误在 report.rejected）
    /// - Err: 致命错误，未发起任何写入
    #[instrument(skip(self, rows, submitted_by, cancel), fields(import_id))]
    pub async fn import_rows(
        &self,
        exam_event_id: i64,
        rows: &RowGrid,
        submitted_by: Option<&str>,
        cancel: &CancelFlag,
    ) -> ReconcileResult<ReconciliationReport> {
        let import_id = Uuid::new_v4().to_string();
        Span::current().record("import_id", import_id.as_str());
        let reporter = SubmissionReporter::new(import_id, exam_event_id);

        info!(exam_event_id, rows = rows.len(), "开始导入成绩");

        let settings = self.load_settings().await?;
        let cancel = cancel.child();
        let deadline = start_deadline(&settings, &cancel);

        let result = self
            .import_parsed_rows(&reporter, exam_event_id, rows, &settings, submitted_by, &cancel)
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    async fn import_parsed_rows(
        &self,
        reporter: &SubmissionReporter,
        exam_event_id: i64,
        rows: &RowGrid,
        settings: &ReconcileSettings,
        submitted_by: Option<&str>,
        cancel: &CancelFlag,
    ) -> ReconcileResult<ReconciliationReport> {
        let parsed = match TemplateParser.parse_rows(rows) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(exam_event_id, error = %reason, "成绩文件为空");
                return Ok(reporter.empty_input(reason));
            }
        };

        self.load_event(exam_event_id).await?;
        let roster = self.resolver.resolve(exam_event_id).await?;

        let report = self
            .reconcile_and_dispatch(reporter, parsed, roster, settings, submitted_by, cancel)
            .await;
        Ok(report)
    }

    // ==========================================
    // 单科视图 / 单科录入
    // ==========================================

    /// 查询单科成绩（花名册 × 已存成绩）
    #[instrument(skip(self))]
    pub async fn list_subject_marks(
        &self,
        exam_event_id: i64,
        schedule_id: i64,
    ) -> ReconcileResult<Vec<SubjectMarksRow>> {
        self.load_event(exam_event_id).await?;
        let roster = self.resolver.resolve(exam_event_id).await?;
        find_schedule(&roster, schedule_id)?;

        let mut stored: HashMap<i64, _> = self
            .marks_repo
            .list_marks_by_schedule(schedule_id)
            .await
            .map_err(|e| ReconcileError::upstream("成绩记录", e))?
            .into_iter()
            .map(|r| (r.student_id, r))
            .collect();

        let rows = roster
            .entries_for_schedule(schedule_id)
            .into_iter()
            .map(|entry| {
                let record = stored.remove(&entry.student_id);
                SubjectMarksRow {
                    student_id: entry.student_id,
                    roll_number: entry.roll_number.clone(),
                    student_name: entry.student_name.clone(),
                    max_marks: entry.max_marks,
                    marks_obtained: record.as_ref().map(|r| r.marks_obtained),
                    marks_entered_by: record.as_ref().and_then(|r| r.marks_entered_by.clone()),
                    marks_entered_at: record.and_then(|r| r.marks_entered_at),
                }
            })
            .collect();

        Ok(rows)
    }

    /// 单科录入（学号, 原始值），规则与模板导入一致
    #[instrument(skip(self, entries, submitted_by), fields(import_id, entries = entries.len()))]
    pub async fn enter_subject_marks(
        &self,
        exam_event_id: i64,
        schedule_id: i64,
        entries: &[(String, String)],
        submitted_by: Option<&str>,
    ) -> ReconcileResult<ReconciliationReport> {
        let import_id = Uuid::new_v4().to_string();
        Span::current().record("import_id", import_id.as_str());
        let reporter = SubmissionReporter::new(import_id, exam_event_id);

        let settings = self.load_settings().await?;
        let cancel = CancelFlag::new();
        let deadline = start_deadline(&settings, &cancel);

        let result = self
            .enter_parsed_entries(
                &reporter,
                exam_event_id,
                schedule_id,
                entries,
                &settings,
                submitted_by,
                &cancel,
            )
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn enter_parsed_entries(
        &self,
        reporter: &SubmissionReporter,
        exam_event_id: i64,
        schedule_id: i64,
        entries: &[(String, String)],
        settings: &ReconcileSettings,
        submitted_by: Option<&str>,
        cancel: &CancelFlag,
    ) -> ReconcileResult<ReconciliationReport> {
        self.load_event(exam_event_id).await?;
        let roster = self.resolver.resolve(exam_event_id).await?;
        let subject_code = find_schedule(&roster, schedule_id)?.subject_code.clone();

        let parsed = TemplateParser.parse_subject_entries(&subject_code, entries);
        let report = self
            .reconcile_and_dispatch(reporter, parsed, roster, settings, submitted_by, cancel)
            .await;
        Ok(report)
    }

    // ==========================================
    // 内部流程
    // ==========================================

    async fn reconcile_and_dispatch(
        &self,
        reporter: &SubmissionReporter,
        mut parsed: ParsedTemplate,
        roster: Roster,
        settings: &ReconcileSettings,
        submitted_by: Option<&str>,
        cancel: &CancelFlag,
    ) -> ReconciliationReport {
        let submitter = match submitted_by.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => settings.default_submitter.clone(),
        };

        let index = roster.index();
        let cells = std::mem::take(&mut parsed.cells);
        let outcome = MarksReconciler.reconcile(&cells, &index, &submitter);

        let dispatcher =
            UpsertDispatcher::new(self.marks_repo.clone(), DispatchOptions::from(settings));
        let dispatched = dispatcher.dispatch(outcome.planned, cancel).await;

        let report = reporter.finish(parsed, outcome.rejected, dispatched, roster.warnings);

        info!(
            import_id = %reporter.import_id(),
            exam_event_id = report.exam_event_id,
            total_cells = report.total_cells,
            skipped = report.skipped_cells,
            accepted = report.accepted,
            rejected = report.rejected_count(),
            not_dispatched = report.not_dispatched,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed_ms,
            "成绩导入完成"
        );

        report
    }

    async fn load_settings(&self) -> ReconcileResult<ReconcileSettings> {
        ReconcileSettings::load(&self.config)
            .await
            .map_err(|e| ReconcileError::Config(e.to_string()))
    }

    async fn load_event(&self, exam_event_id: i64) -> ReconcileResult<ExamEvent> {
        self.catalog
            .get_exam_event(exam_event_id)
            .await
            .map_err(|e| ReconcileError::upstream("考试场次", e))?
            .ok_or(ReconcileError::ExamEventNotFound(exam_event_id))
    }
}

/// 查找排程（被同代码排程遮蔽的视为不存在）
fn find_schedule(roster: &Roster, schedule_id: i64) -> ReconcileResult<&SubjectSchedule> {
    let schedule = roster.schedules.iter().find(|s| s.id == schedule_id);
    let owner = schedule.and_then(|found| {
        roster
            .schedules
            .iter()
            .filter(|s| s.subject_code == found.subject_code)
            .map(|s| s.id)
            .min()
    });

    match schedule {
        Some(schedule) if owner == Some(schedule_id) => Ok(schedule),
        _ => Err(ReconcileError::ScheduleNotFound {
            exam_event_id: roster.exam_event_id,
            schedule_id,
        }),
    }
}

/// 按配置启动截止计时（0 表示不限时），到期只取消传入的标记
fn start_deadline(settings: &ReconcileSettings, cancel: &CancelFlag) -> Option<JoinHandle<()>> {
    (settings.import_timeout_secs > 0)
        .then(|| cancel.cancel_after(Duration::from_secs(settings.import_timeout_secs)))
}
