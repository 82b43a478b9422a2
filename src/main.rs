// ==========================================
// 考试成绩批量对账系统 - 命令行入口
// ==========================================
// 用法:
//   marks-reconciler export <exam_event_id> [out_dir]
//   marks-reconciler import <exam_event_id> <file> [submitted_by]
//   marks-reconciler subject <exam_event_id> <schedule_id>
// 数据库路径: MARKS_RECONCILER_DB_PATH 或用户数据目录
// ==========================================

use anyhow::{anyhow, bail, Context};
use marks_reconciler::{db, logging, MarksApi};

const USAGE: &str = "用法:
  marks-reconciler export <exam_event_id> [out_dir]
  marks-reconciler import <exam_event_id> <file> [submitted_by]
  marks-reconciler subject <exam_event_id> <schedule_id>";

fn parse_id(raw: Option<String>, name: &str) -> anyhow::Result<i64> {
    let raw = raw.ok_or_else(|| anyhow!("缺少参数 {}\n{}", name, USAGE))?;
    raw.trim()
        .parse::<i64>()
        .with_context(|| format!("{} 不是合法整数: {}", name, raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();

    let db_path = db::default_db_path();
    tracing::info!(version = marks_reconciler::VERSION, db_path = %db_path, "{}", marks_reconciler::APP_NAME);

    let api = MarksApi::new(&db_path)?;

    match command.as_str() {
        "export" => {
            let exam_event_id = parse_id(args.next(), "exam_event_id")?;
            match args.next() {
                Some(dir) => {
                    let path = api.export_template_to_dir(exam_event_id, &dir).await?;
                    println!("{}", path);
                }
                None => {
                    let export = api.export_template(exam_event_id).await?;
                    print!("{}", export.csv);
                }
            }
        }
        "import" => {
            let exam_event_id = parse_id(args.next(), "exam_event_id")?;
            let file = args
                .next()
                .ok_or_else(|| anyhow!("缺少参数 file\n{}", USAGE))?;
            let submitted_by = args.next();

            let report = api
                .import_marks_file(exam_event_id, &file, submitted_by.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "subject" => {
            let exam_event_id = parse_id(args.next(), "exam_event_id")?;
            let schedule_id = parse_id(args.next(), "schedule_id")?;

            let rows = api.list_subject_marks(exam_event_id, schedule_id).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        other => bail!("未知命令: {:?}\n{}", other, USAGE),
    }

    Ok(())
}
