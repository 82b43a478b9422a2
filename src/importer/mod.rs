// ==========================================
// 考试成绩批量对账系统 - 导入层
// ==========================================
// 职责: 读取回填后的成绩表格，解析为类型化单元格
// 支持: CSV 文本, CSV 文件, Excel (.xlsx)
// ==========================================

// 模块声明
pub mod error;
pub mod file_parser;
pub mod template_parser;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{
    CsvParser, ExcelParser, FileParser, RowGrid, SourceRow, UniversalFileParser,
};
pub use template_parser::{
    classify_value, extract_subject_code, CellValue, ParsedTemplate, TemplateColumn,
    TemplateParser,
};
