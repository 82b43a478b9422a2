// ==========================================
// 考试成绩批量对账系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 成绩模板导出 / 回填导入 / 与报名和排程对账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 上游协作方访问
pub mod repository;

// 引擎层 - 对账规则
pub mod engine;

// 导入层 - 表格读取与模板解析
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域实体
pub use domain::{
    ApplicationStatus, CellError, EnrollmentApplication, ExamEvent, MarksCell, MarksRecord,
    MarksUpsertRequest, ReconciliationReport, Rejection, Roster, RosterEntry, RosterWarning,
    SubjectSchedule,
};

// 引擎
pub use engine::{
    CancelFlag, MarksImportService, MarksReconciler, ReconcileError, RosterResolver,
    SubmissionReporter, TemplateGenerator, UpsertDispatcher,
};

// API
pub use api::{ApiError, MarksApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "考试成绩批量对账系统";
