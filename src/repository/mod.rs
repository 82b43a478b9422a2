// ==========================================
// 考试成绩批量对账系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供上游协作方（考试目录/成绩存储）的数据访问接口
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod exam_catalog_repo;
pub mod exam_catalog_repo_impl;
pub mod marks_repo;
pub mod marks_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use exam_catalog_repo::ExamCatalogRepository;
pub use exam_catalog_repo_impl::ExamCatalogRepositoryImpl;
pub use marks_repo::MarksRepository;
pub use marks_repo_impl::MarksRepositoryImpl;
