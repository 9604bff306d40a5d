//! Flomo 导出模块

use reqwest::blocking::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::FlomoSettings;
use crate::refiner::ProcessedNote;
use crate::retry::{retry_if, RetryPolicy};

/// 整批导出视为成功所需的成功率（严格大于）
pub const SUCCESS_THRESHOLD: f64 = 0.8;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("创建 HTTP 客户端失败: {0}")]
    Client(#[from] reqwest::Error),
    #[error("请求 Flomo 失败: {0}")]
    Request(String),
    #[error("Flomo 返回错误 {status}: {body}")]
    Status { status: u16, body: String },
}

impl ExportError {
    /// 网络层错误可以重试；服务端明确拒绝的不重试
    pub fn is_transient(&self) -> bool {
        matches!(self, ExportError::Request(_))
    }
}

/// 把润色后的笔记格式化为 Flomo 内容
///
/// ```text
/// 【小标题】
///
/// 润色后的文本
///
/// 章节：章节名
///
/// #标签1 #标签2
/// ```
///
/// 章节为空时省略章节段落
pub fn format_note(note: &ProcessedNote) -> String {
    let mut content = format!("【{}】\n\n{}", note.sub_title, note.refined_text);
    if !note.chapter.is_empty() {
        content.push_str(&format!(" \n\n章节：{}", note.chapter));
    }

    let tags = note
        .tags
        .iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ");
    content.push_str("\n\n");
    content.push_str(&tags);
    content
}

/// 笔记投递目标
pub trait NoteSink: Send + Sync {
    /// 投递一条已格式化的内容
    fn post(&self, content: &str) -> Result<(), ExportError>;
}

/// Flomo webhook 客户端
pub struct FlomoClient {
    client: Client,
    endpoint: String,
}

impl FlomoClient {
    pub fn new(settings: &FlomoSettings) -> Result<Self, ExportError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
        })
    }
}

impl NoteSink for FlomoClient {
    fn post(&self, content: &str) -> Result<(), ExportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .map_err(|e| ExportError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(ExportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// 只打印不发送，用于 `--dry-run`
pub struct PrintSink;

impl NoteSink for PrintSink {
    fn post(&self, content: &str) -> Result<(), ExportError> {
        println!("{}\n{}", content, "-".repeat(40));
        Ok(())
    }
}

/// 导出结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub succeeded: usize,
    pub total: usize,
}

impl ExportReport {
    /// 成功率；空批次为 0
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }

    /// 成功率超过 80% 视为整体成功
    pub fn is_success(&self) -> bool {
        self.success_rate() > SUCCESS_THRESHOLD
    }
}

/// Flomo 导出器
///
/// 单条失败按重试策略重试，最终失败只计数，不中断整批
pub struct FlomoExporter {
    sink: Box<dyn NoteSink>,
    policy: RetryPolicy,
}

impl FlomoExporter {
    pub fn new(sink: Box<dyn NoteSink>, policy: RetryPolicy) -> Self {
        Self { sink, policy }
    }

    pub fn from_settings(settings: &FlomoSettings) -> Result<Self, ExportError> {
        Ok(Self::new(Box::new(FlomoClient::new(settings)?), settings.retry))
    }

    /// 导出单条笔记
    pub fn export_note(&self, note: &ProcessedNote) -> Result<(), ExportError> {
        let content = format_note(note);
        retry_if(&self.policy, || self.sink.post(&content), ExportError::is_transient)
    }

    /// 导出一批笔记
    ///
    /// # 参数
    /// - `notes`: 润色后的笔记
    ///
    /// # 返回
    /// 成功条数与总条数
    pub fn export_notes(&self, notes: &[ProcessedNote]) -> ExportReport {
        let mut succeeded = 0;

        for (i, note) in notes.iter().enumerate() {
            match self.export_note(note) {
                Ok(()) => succeeded += 1,
                Err(e) => log::error!("导出第 {} 条笔记到Flomo时出错: {}", i + 1, e),
            }
        }

        let report = ExportReport {
            succeeded,
            total: notes.len(),
        };
        if report.total == 0 {
            log::warn!("没有可导出的笔记");
        } else {
            log::info!("成功导出 {}/{} 条笔记到Flomo", report.succeeded, report.total);
        }
        report
    }
}
