// ==========================================
// 考试成绩批量对账系统 - 表格文件读取
// ==========================================
// 支持: CSV 文本 / CSV 文件 / Excel (.xlsx)
// 输出: 行网格 Vec<SourceRow>（保留列顺序，表头同样作为第一行）
// 行号: 每行携带其在源表格中的行号（从 1 开始），空白行被丢弃但不影响后续行号
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Reader, Xlsx};
use csv::{ReaderBuilder, Trim};
use std::path::Path;

/// 源表格中的一行
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceRow {
    /// 源表格行号（从 1 开始）
    pub line: usize,
    pub values: Vec<String>,
}

impl SourceRow {
    pub fn new(line: usize, values: Vec<String>) -> Self {
        Self { line, values }
    }
}

/// 原始行网格
pub type RowGrid = Vec<SourceRow>;

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为行网格（完全空白的行被丢弃，其余行保留源表格行号）
    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<RowGrid>;
}

fn is_blank_row(row: &[String]) -> bool {
    row.iter().all(|v| v.is_empty())
}

fn check_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl CsvParser {
    /// 从任意 reader 读取
    fn read_rows<R: std::io::Read>(reader: R) -> ImportResult<RowGrid> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致
            .trim(Trim::All)
            .from_reader(reader);

        let mut rows: RowGrid = Vec::new();
        let mut last_line = 0;
        for result in reader.records() {
            let record = result?;
            // csv 会静默跳过空行，行号以记录起始位置为准
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(last_line + 1);
            last_line = line;

            let row: Vec<String> = record.iter().map(|v| v.to_string()).collect();

            // 跳过完全空白的行
            if is_blank_row(&row) {
                continue;
            }
            rows.push(SourceRow::new(line, row));
        }

        Ok(rows)
    }

    /// 解析 CSV 文本（上传内容直接以文本形式到达时使用）
    pub fn parse_text(&self, text: &str) -> ImportResult<RowGrid> {
        // 兼容带 BOM 的 UTF-8 文件
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        Self::read_rows(text.as_bytes())
    }
}

impl FileParser for CsvParser {
    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<RowGrid> {
        check_exists(file_path)?;

        // 检查扩展名
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(
                    ext.to_string_lossy().to_string(),
                ));
            }
        }

        let text = std::fs::read_to_string(file_path)?;
        self.parse_text(&text)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_rows(&self, file_path: &Path) -> ImportResult<RowGrid> {
        check_exists(file_path)?;

        let ext = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if ext != "xlsx" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let mut workbook: Xlsx<_> = open_workbook(file_path)?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // range 从第一个非空单元格开始
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

        let mut rows: RowGrid = Vec::new();
        for (idx, data_row) in range.rows().enumerate() {
            let row: Vec<String> = data_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect();

            if is_blank_row(&row) {
                continue;
            }
            rows.push(SourceRow::new(first_row + idx + 1, row));
        }

        Ok(rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<RowGrid> {
        let path = file_path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => CsvParser.parse_to_rows(path),
            "xlsx" => ExcelParser.parse_to_rows(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_csv_parse_text_keeps_column_order() {
        let rows = CsvParser
            .parse_text("Roll Number,Student Name,CS101 - Programming (50)\n21CS001, Asha ,45\n")
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].values[2], "CS101 - Programming (50)");
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[1].values, vec!["21CS001", "Asha", "45"]);
    }

    #[test]
    fn test_csv_parse_text_quoted_and_bom() {
        let rows = CsvParser
            .parse_text("\u{feff}Roll Number,Student Name\n21CS001,\"Rao, Asha\"\n")
            .unwrap();
        assert_eq!(rows[0].values[0], "Roll Number");
        assert_eq!(rows[1].values[1], "Rao, Asha");
    }

    #[test]
    fn test_csv_skip_empty_rows_keeps_line_numbers() {
        let rows = CsvParser
            .parse_text("Roll Number,Student Name\n21CS001,A\n,\n\n21CS002,B\n")
            .unwrap();
        assert_eq!(rows.len(), 3);
        let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
        // 第 3 行全逗号、第 4 行为空，均被丢弃
        assert_eq!(lines, vec![1, 2, 5]);
    }

    #[test]
    fn test_csv_multiline_field_line_number() {
        let rows = CsvParser
            .parse_text("Roll Number,Student Name\n21CS001,\"Asha\nRao\"\n21CS002,B\n")
            .unwrap();
        assert_eq!(rows[1].line, 2);
        assert_eq!(rows[2].line, 4);
    }

    #[test]
    fn test_csv_file_not_found() {
        let result = CsvParser.parse_to_rows(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_universal_parser_csv_file() {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(temp_file, "Roll Number,Student Name,CS101").unwrap();
        writeln!(temp_file, "21CS001,Asha,45").unwrap();

        let rows = UniversalFileParser.parse(temp_file.path()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    fn xlsx_fixture() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/marks_filled.xlsx")
    }

    #[test]
    fn test_universal_parser_xlsx_first_sheet() {
        let rows = UniversalFileParser.parse(xlsx_fixture()).unwrap();

        // 表头 + 3 行数据（第 3 行空白），第二个工作表不读取
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].values[0], "Roll Number");
        assert_eq!(rows[0].values[3], "CS102 - Databases (80)");
        assert!(rows.iter().all(|r| r.values[0] != "Remarks"));

        let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_xlsx_numeric_cells_stringified() {
        let rows = ExcelParser.parse_to_rows(&xlsx_fixture()).unwrap();

        assert_eq!(rows[1].values, vec!["21CS001", "Asha", "45", "70"]);
        // 数值 0 与文本 "0" 一致，按哨兵处理
        assert_eq!(rows[2].values[3], "0");
        assert_eq!(rows[3].values[3], "NA");
    }

    #[test]
    fn test_excel_parser_rejects_csv_extension() {
        let temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        let result = ExcelParser.parse_to_rows(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        let result = UniversalFileParser.parse(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
