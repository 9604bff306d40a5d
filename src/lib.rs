pub mod config;
pub mod error;
pub mod exporter;
pub mod parser;
pub mod refiner;
pub mod retry;
pub mod session;


// 重新导出主要类型
pub use config::Settings;
pub use error::AppError;
pub use exporter::{format_note, ExportReport, FlomoExporter};
pub use parser::{BookNotes, Note, NoteParser, WereadParser};
pub use refiner::{NoteRefiner, ProcessedNote};
pub use retry::{retry, retry_if, RetryPolicy};
pub use session::{ProcessingStatus, ReviewSession};

/// 解析导出文本
///
/// 便捷入口，等价于 `WereadParser::new().parse(text)`
pub fn parse_notes(text: &str) -> BookNotes {
    WereadParser::new().parse(text)
}
