use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::exporter::{ExportError, ExportReport, FlomoExporter};
use crate::parser::BookNotes;
use crate::refiner::{NoteRefiner, ProcessedNote};

/// 处理状态枚举
///
/// 表示单条笔记润色任务所处的阶段
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ProcessingStatus {
    /// 正在润色
    Processing,
    /// 完成（包括使用备用笔记的情况）
    Completed,
    /// 失败（包含错误信息）
    Failed(String),
}

/// 状态记录
///
/// 记录最近一次状态变化及其时间
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskRecord {
    pub status: ProcessingStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("笔记序号超出范围: {index} (共 {len} 条)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("第 {0} 条笔记正在处理中")]
    AlreadyProcessing(usize),
    #[error("第 {0} 条笔记尚未润色")]
    NotProcessed(usize),
    #[error("导出失败: {0}")]
    Export(#[from] ExportError),
}

/// 审阅会话
///
/// 保存一次解析结果，以及每条笔记的润色结果和处理状态（按笔记序号索引）。
/// 润色结果可以在导出前逐条修改
pub struct ReviewSession {
    /// 原始解析结果
    book: BookNotes,
    /// 润色结果，与 `book.notes` 一一对应
    processed: Vec<Option<ProcessedNote>>,
    /// 处理状态（序号 -> 状态）
    tasks: HashMap<usize, TaskRecord>,
}

impl ReviewSession {
    /// 创建新的审阅会话
    ///
    /// # 参数
    /// - `book`: 解析得到的书籍笔记
    pub fn new(book: BookNotes) -> Self {
        let processed = vec![None; book.notes.len()];
        Self {
            book,
            processed,
            tasks: HashMap::new(),
        }
    }

    pub fn book(&self) -> &BookNotes {
        &self.book
    }

    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }

    /// 获取处理状态，尚未开始处理时返回 None
    pub fn status(&self, index: usize) -> Option<&ProcessingStatus> {
        self.tasks.get(&index).map(|r| &r.status)
    }

    /// 获取完整的状态记录（包含最近更新时间）
    pub fn status_record(&self, index: usize) -> Option<&TaskRecord> {
        self.tasks.get(&index)
    }

    /// 获取润色结果
    pub fn processed(&self, index: usize) -> Option<&ProcessedNote> {
        self.processed.get(index).and_then(|p| p.as_ref())
    }

    /// 所有已润色的笔记（按序号）
    pub fn processed_notes(&self) -> Vec<ProcessedNote> {
        self.processed.iter().flatten().cloned().collect()
    }

    fn check_index(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.processed.len() {
            return Err(SessionError::IndexOutOfRange {
                index,
                len: self.processed.len(),
            });
        }
        Ok(())
    }

    fn set_status(&mut self, index: usize, status: ProcessingStatus) {
        self.tasks.insert(
            index,
            TaskRecord {
                status,
                updated_at: Utc::now(),
            },
        );
    }

    /// 标记为正在处理
    ///
    /// 同一条笔记正在处理时返回错误
    pub fn begin(&mut self, index: usize) -> Result<(), SessionError> {
        self.check_index(index)?;
        if self.status(index) == Some(&ProcessingStatus::Processing) {
            return Err(SessionError::AlreadyProcessing(index));
        }
        self.set_status(index, ProcessingStatus::Processing);
        Ok(())
    }

    /// 标记为失败
    pub fn mark_failed(&mut self, index: usize, reason: &str) -> Result<(), SessionError> {
        self.check_index(index)?;
        self.set_status(index, ProcessingStatus::Failed(reason.to_string()));
        Ok(())
    }

    /// 润色一条笔记
    ///
    /// 润色器不会失败（出错时给出备用笔记），因此结束后状态总是 Completed
    ///
    /// # 参数
    /// - `index`: 笔记序号
    /// - `refiner`: 润色器
    ///
    /// # 返回
    /// 润色结果
    pub fn process_note(&mut self, index: usize, refiner: &NoteRefiner) -> Result<&ProcessedNote, SessionError> {
        self.begin(index)?;

        let note = &self.book.notes[index];
        let result = refiner.refine_note(&self.book.title, note);
        self.processed[index] = Some(result);
        self.set_status(index, ProcessingStatus::Completed);

        self.processed(index).ok_or(SessionError::NotProcessed(index))
    }

    fn processed_mut(&mut self, index: usize) -> Result<&mut ProcessedNote, SessionError> {
        self.check_index(index)?;
        self.processed[index]
            .as_mut()
            .ok_or(SessionError::NotProcessed(index))
    }

    /// 修改小标题
    pub fn set_sub_title(&mut self, index: usize, sub_title: &str) -> Result<(), SessionError> {
        self.processed_mut(index)?.sub_title = sub_title.to_string();
        Ok(())
    }

    /// 修改润色后文本
    pub fn set_refined_text(&mut self, index: usize, text: &str) -> Result<(), SessionError> {
        self.processed_mut(index)?.refined_text = text.to_string();
        Ok(())
    }

    /// 用逗号分隔的输入替换标签，忽略空标签
    pub fn set_tags_from_input(&mut self, index: usize, input: &str) -> Result<(), SessionError> {
        let tags = input
            .split(',')
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect();
        self.processed_mut(index)?.tags = tags;
        Ok(())
    }

    /// 导出单条已润色的笔记
    pub fn export_note(&self, index: usize, exporter: &FlomoExporter) -> Result<(), SessionError> {
        self.check_index(index)?;
        let note = self.processed(index).ok_or(SessionError::NotProcessed(index))?;
        exporter.export_note(note)?;
        Ok(())
    }

    /// 导出所有已润色的笔记
    pub fn export_all(&self, exporter: &FlomoExporter) -> ExportReport {
        exporter.export_notes(&self.processed_notes())
    }
}
