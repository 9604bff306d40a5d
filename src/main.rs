use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;

use weread_flomo_lib::exporter::{FlomoExporter, PrintSink};
use weread_flomo_lib::parser::{read_export_file, read_export_stdin};
use weread_flomo_lib::{
    AppError, BookNotes, ExportReport, NoteParser, NoteRefiner, ProcessedNote, ReviewSession, Settings,
    WereadParser,
};

/// weread-flomo - 微信读书笔记处理器
///
/// 把微信读书导出的笔记文本解析为结构化笔记，用 LLM 润色后导出到 Flomo。
///
/// 配置来自环境变量或当前目录下的 `.env`：
/// `LLM_API_ENDPOINT`, `LLM_API_KEY`, `LLM_MODEL`, `FLOMO_API_ENDPOINT`,
/// `MAX_RETRIES`, `RETRY_BASE_DELAY_SECS`, `REQUEST_TIMEOUT_SECS`
#[derive(Parser, Debug)]
#[command(name = "weread-flomo")]
#[command(version)]
#[command(about = "微信读书笔记解析、润色与导出")]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 解析导出文本并显示书籍信息和笔记
    Parse {
        /// 导出文本文件，`-` 表示标准输入
        file: PathBuf,
        /// 以 JSON 输出
        #[arg(long)]
        json: bool,
    },
    /// 解析并润色，输出润色后的笔记 JSON
    Refine {
        /// 导出文本文件，`-` 表示标准输入
        file: PathBuf,
        /// 写入文件而不是标准输出
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// 导出 `refine` 生成的笔记 JSON 到 Flomo
    Export {
        /// 润色后的笔记 JSON 文件
        file: PathBuf,
        /// 只打印格式化后的内容，不发送
        #[arg(long)]
        dry_run: bool,
    },
    /// 解析、润色并导出
    Run {
        /// 导出文本文件，`-` 表示标准输入
        file: PathBuf,
        /// 只打印格式化后的内容，不发送
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), AppError> {
    match command {
        Command::Parse { file, json } => {
            let book = load_book(&file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&book)?);
            } else {
                print_book(&book);
            }
            Ok(())
        }
        Command::Refine { file, output } => {
            let settings = Settings::from_env()?;
            let book = load_book(&file)?;
            let refiner = NoteRefiner::from_settings(&settings.llm()?)?;

            let processed = refiner.refine_book(&book);
            let json = serde_json::to_string_pretty(&processed)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    log::info!("已写入 {} 条润色笔记到 {:?}", processed.len(), path);
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Command::Export { file, dry_run } => {
            let settings = Settings::from_env()?;
            let notes: Vec<ProcessedNote> = serde_json::from_str(&fs::read_to_string(&file)?)?;
            let exporter = build_exporter(&settings, dry_run)?;

            check_report(exporter.export_notes(&notes))
        }
        Command::Run { file, dry_run } => {
            let settings = Settings::from_env()?;
            let book = load_book(&file)?;
            let refiner = NoteRefiner::from_settings(&settings.llm()?)?;
            let exporter = build_exporter(&settings, dry_run)?;

            let mut session = ReviewSession::new(book);
            for i in 0..session.len() {
                log::info!("正在处理第 {}/{} 条笔记", i + 1, session.len());
                session.process_note(i, &refiner)?;
                if let Some(record) = session.status_record(i) {
                    log::debug!("第 {} 条: {:?} @ {}", i + 1, record.status, record.updated_at.to_rfc3339());
                }
            }
            log::info!("《{}》全部润色完成", session.book().title);

            check_report(session.export_all(&exporter))
        }
    }
}

fn load_book(file: &Path) -> Result<BookNotes, AppError> {
    let text = if file == Path::new("-") {
        read_export_stdin()?
    } else {
        read_export_file(file)?
    };

    let parser = WereadParser::new();
    let book = parser.parse(&text);
    log::info!("成功解析 {} 条笔记", book.notes.len());
    if !book.count_matches() {
        log::warn!(
            "声明的笔记数量为 {}，实际解析出 {} 条",
            book.declared_note_count,
            book.notes.len()
        );
    }
    Ok(book)
}

fn build_exporter(settings: &Settings, dry_run: bool) -> Result<FlomoExporter, AppError> {
    if dry_run {
        return Ok(FlomoExporter::new(Box::new(PrintSink), settings.retry));
    }
    Ok(FlomoExporter::from_settings(&settings.flomo()?)?)
}

fn check_report(report: ExportReport) -> Result<(), AppError> {
    if report.is_success() {
        Ok(())
    } else {
        Err(AppError::ExportBelowThreshold {
            succeeded: report.succeeded,
            total: report.total,
        })
    }
}

fn print_book(book: &BookNotes) {
    let or_unknown = |s: &str| if s.is_empty() { "未知".to_string() } else { s.to_string() };

    println!("书名：{}", or_unknown(&book.title));
    println!("作者：{}", or_unknown(&book.author));
    println!("笔记：{} 条（声明 {} 条）", book.notes.len(), book.declared_note_count);

    for (i, note) in book.notes.iter().enumerate() {
        println!();
        println!("[{}] 章节：{}", i + 1, note.chapter);
        println!("{}", note.content);
    }
}
