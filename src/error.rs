use thiserror::Error;

use crate::config::ConfigError;
use crate::exporter::ExportError;
use crate::refiner::RefineError;
use crate::session::SessionError;

/// 命令行层面的错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Refine(#[from] RefineError),
    #[error("{0}")]
    Export(#[from] ExportError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("导出成功率过低: {succeeded}/{total}")]
    ExportBelowThreshold { succeeded: usize, total: usize },
}
