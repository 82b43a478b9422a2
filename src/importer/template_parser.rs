// ==========================================
// 考试成绩批量对账系统 - 成绩模板解析器
// ==========================================
// 输入: 行网格（第一行为表头）
// 输出: MarksCell 序列 + 解析错误列表
// ==========================================
// 规则:
// 1. 少于 2 行 → EmptyInput
// 2. 第 3 列起的表头取首段字母数字作为科目代码，取不到则该列记错跳过
// 3. 学号为空 → 整行记错跳过
// 4. 空 / NA / 0 为哨兵值，跳过且不记错（避免未编辑模板覆盖真实 0 分）
// 5. 非数字或负数 → InvalidMarksValue，同行其他列继续
// ==========================================

use crate::domain::marks::{CellError, MarksCell, Rejection};
use crate::importer::file_parser::RowGrid;
use tracing::{debug, warn};

/// 科目列起始下标（0=学号，1=姓名）
pub const FIRST_SUBJECT_COLUMN: usize = 2;

// ==========================================
// 单元格取值分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Sentinel,
    Marks(f64),
    Invalid,
}

/// 判定单元格原始值
pub fn classify_value(raw: &str) -> CellValue {
    let value = raw.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("NA") || value == "0" {
        return CellValue::Sentinel;
    }

    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => CellValue::Marks(v),
        _ => CellValue::Invalid,
    }
}

/// 从装饰过的表头中提取科目代码
///
/// `"CS101 - Data Structures (50)"` → `Some("CS101")`
pub fn extract_subject_code(header: &str) -> Option<String> {
    let code: String = header
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();

    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

// ==========================================
// TemplateColumn - 已识别的科目列
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateColumn {
    pub column: usize,
    pub subject_code: String,
}

// ==========================================
// ParsedTemplate - 解析结果
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ParsedTemplate {
    pub columns: Vec<TemplateColumn>,
    pub cells: Vec<MarksCell>,
    pub errors: Vec<Rejection>,
    pub total_cells: usize,
    pub skipped_cells: usize,
    pub data_rows: usize,
}

impl ParsedTemplate {
    /// 记录一个单元格（统计 + 分类）
    fn push_value(&mut self, row: usize, column: usize, roll_number: &str, subject_code: &str, raw: &str) {
        self.total_cells += 1;

        match classify_value(raw) {
            CellValue::Sentinel => {
                self.skipped_cells += 1;
            }
            CellValue::Marks(marks) => {
                self.cells.push(MarksCell {
                    row,
                    column,
                    roll_number: roll_number.to_string(),
                    subject_code: subject_code.to_string(),
                    raw: raw.trim().to_string(),
                    marks,
                });
            }
            CellValue::Invalid => {
                debug!(row, column, raw, "成绩值非法");
                self.errors.push(Rejection {
                    row,
                    column: Some(column),
                    subject_code: Some(subject_code.to_string()),
                    reason: CellError::InvalidMarksValue {
                        row,
                        column,
                        raw: raw.trim().to_string(),
                    },
                });
            }
        }
    }
}

// ==========================================
// TemplateParser
// ==========================================
pub struct TemplateParser;

impl TemplateParser {
    /// 解析完整模板
    ///
    /// # 返回
    /// - Ok(ParsedTemplate): 解析结果（行/列级错误在 errors 中）
    /// - Err(CellError::EmptyInput): 少于表头 + 1 行数据
    pub fn parse_rows(&self, rows: &RowGrid) -> Result<ParsedTemplate, CellError> {
        if rows.len() < 2 {
            return Err(CellError::EmptyInput);
        }

        let mut parsed = ParsedTemplate::default();

        // === 表头 → 科目代码 ===
        let header_row = rows[0].line;
        for (column, header) in rows[0].values.iter().enumerate().skip(FIRST_SUBJECT_COLUMN) {
            match extract_subject_code(header) {
                Some(code) => parsed.columns.push(TemplateColumn {
                    column,
                    subject_code: code,
                }),
                None => {
                    warn!(column, header = %header, "表头无法识别科目代码，整列跳过");
                    parsed.errors.push(Rejection {
                        row: header_row,
                        column: Some(column),
                        subject_code: None,
                        reason: CellError::MalformedHeader {
                            column,
                            header: header.clone(),
                        },
                    });
                }
            }
        }

        // === 数据行 ===
        let columns = parsed.columns.clone();
        for source in rows.iter().skip(1) {
            // 报告中的行号即源表格行号
            let row = source.line;
            let values = &source.values;
            let roll_number = values.first().map(|v| v.trim()).unwrap_or("");

            if roll_number.is_empty() {
                warn!(row, "学号缺失，整行跳过");
                parsed.errors.push(Rejection {
                    row,
                    column: Some(0),
                    subject_code: None,
                    reason: CellError::MissingRollNumber { row },
                });
                continue;
            }

            parsed.data_rows += 1;
            for col in &columns {
                // 行长度不足时按空值处理
                let raw = values.get(col.column).map(String::as_str).unwrap_or("");
                parsed.push_value(row, col.column, roll_number, &col.subject_code, raw);
            }
        }

        debug!(
            data_rows = parsed.data_rows,
            columns = parsed.columns.len(),
            cells = parsed.cells.len(),
            errors = parsed.errors.len(),
            "模板解析完成"
        );

        Ok(parsed)
    }

    /// 解析单科目录入（学号, 原始值）列表
    ///
    /// 与模板导入使用相同的哨兵/数值规则；行号按录入顺序从 1 开始
    pub fn parse_subject_entries(
        &self,
        subject_code: &str,
        entries: &[(String, String)],
    ) -> ParsedTemplate {
        let mut parsed = ParsedTemplate {
            columns: vec![TemplateColumn {
                column: FIRST_SUBJECT_COLUMN,
                subject_code: subject_code.to_string(),
            }],
            ..Default::default()
        };

        for (idx, (roll_number, raw)) in entries.iter().enumerate() {
            let row = idx + 1;
            let roll_number = roll_number.trim();
            if roll_number.is_empty() {
                parsed.errors.push(Rejection {
                    row,
                    column: Some(0),
                    subject_code: None,
                    reason: CellError::MissingRollNumber { row },
                });
                continue;
            }

            parsed.data_rows += 1;
            parsed.push_value(row, FIRST_SUBJECT_COLUMN, roll_number, subject_code, raw);
        }

        parsed
    }
}
