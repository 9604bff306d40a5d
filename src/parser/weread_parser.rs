use regex::Regex;
use super::*;

/// 书名号
const TITLE_OPEN: char = '《';
const TITLE_CLOSE: char = '》';
/// 划线标记
const HIGHLIGHT_MARKER: char = '◆';
/// 笔记数量行的后缀
const NOTE_COUNT_SUFFIX: &str = "个笔记";
/// 来源标注
const SOURCE_ATTRIBUTION: &str = "来自微信读书";
/// 记录分隔行
const RECORD_SEPARATOR: &str = "-- 来自微信读书";

/// 行类型
///
/// 每个非空行按固定优先级归入其中一类，见 `WereadParser::classify`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// 《书名》
    Title(&'a str),
    /// 书名之后、笔记数量之前的第一行
    Author(&'a str),
    /// "<n>个笔记"
    NoteCount(usize),
    /// 章节标题
    ChapterHeading(&'a str),
    /// ◆ 开头的划线，携带去掉标记后的内容
    HighlightStart(&'a str),
    /// "-- 来自微信读书"
    RecordSeparator,
    /// 续行
    Continuation(&'a str),
}

/// 解析状态
///
/// 单次解析的累加器，解析结束后转换为不可变的 `BookNotes`
#[derive(Debug, Default)]
struct ParseState {
    title: String,
    author: String,
    declared_note_count: usize,
    /// 作者与笔记数量是否已处理完毕
    author_processed: bool,
    current_chapter: String,
    /// 正在构建、尚未闭合的笔记
    current_note: Option<Note>,
    notes: Vec<Note>,
}

impl ParseState {
    /// 根据行类型推进状态
    fn apply(&mut self, kind: LineKind<'_>) {
        match kind {
            LineKind::Title(title) => {
                self.title = title.to_string();
            }
            LineKind::Author(author) => {
                self.author = author.to_string();
            }
            LineKind::NoteCount(count) => {
                self.declared_note_count = count;
                self.author_processed = true;
            }
            LineKind::ChapterHeading(chapter) => {
                self.current_chapter = chapter.to_string();
            }
            LineKind::HighlightStart(content) => {
                self.close_note();
                self.current_note = Some(Note {
                    chapter: self.current_chapter.clone(),
                    content: content.to_string(),
                });
            }
            LineKind::RecordSeparator => {
                self.close_note();
            }
            LineKind::Continuation(text) => {
                if let Some(ref mut note) = self.current_note {
                    note.content.push(' ');
                    note.content.push_str(text);
                }
            }
        }
    }

    /// 闭合当前笔记并追加到结果中；没有正在构建的笔记时什么也不做
    fn close_note(&mut self) {
        if let Some(note) = self.current_note.take() {
            self.notes.push(note);
        }
    }

    fn finish(mut self) -> BookNotes {
        // 末尾没有分隔行的笔记
        self.close_note();

        BookNotes {
            title: self.title,
            author: self.author,
            declared_note_count: self.declared_note_count,
            notes: self.notes,
        }
    }
}

/// 微信读书笔记解析器
///
/// 逐行扫描导出文本，识别书名、作者、笔记数量、章节与划线。
/// 导出格式大致为：
///
/// ```text
/// 《书名》
/// 作者
/// 9个笔记
/// 章节标题
/// ◆ 划线内容
/// -- 来自微信读书
/// ```
#[derive(Clone)]
pub struct WereadParser {
    /// 笔记数量行匹配模式
    note_count_pattern: Regex,
    /// 单个十进制数字（含全角等 Unicode 数字）
    digit_pattern: Regex,
}

impl WereadParser {
    /// 创建新的解析器实例
    pub fn new() -> Self {
        Self {
            note_count_pattern: Regex::new(r"^(\d+)个笔记$").expect("笔记数量正则无效"),
            digit_pattern: Regex::new(r"^\d$").expect("数字正则无效"),
        }
    }

    /// 对一行进行分类
    ///
    /// 规则按以下优先级依次尝试，命中即返回：
    /// 1. 书名行（任何时候都检查）
    /// 2. 作者行（仅在作者、笔记数量尚未处理时）
    /// 3. 笔记数量行（同上）
    /// 4. 章节标题：不以 ◆ 开头且不含来源标注
    /// 5. 划线开始：以 ◆ 开头
    /// 6. 记录分隔行
    /// 7. 其余视为续行
    ///
    /// 书名之后若先出现章节样式的行，会被当作作者，这是导出格式本身的歧义。
    ///
    /// # 参数
    /// - `state`: 当前解析状态
    /// - `line`: 已去除首尾空白的非空行
    fn classify<'a>(&self, state: &ParseState, line: &'a str) -> LineKind<'a> {
        if line.starts_with(TITLE_OPEN) && line.ends_with(TITLE_CLOSE) {
            return LineKind::Title(line.trim_matches(|c: char| c == TITLE_OPEN || c == TITLE_CLOSE));
        }

        if !state.author_processed {
            if state.author.is_empty()
                && !state.title.is_empty()
                && !line.contains(NOTE_COUNT_SUFFIX)
            {
                return LineKind::Author(line);
            }

            if let Some(count) = self.match_note_count(line) {
                return LineKind::NoteCount(count);
            }
        }

        if !line.starts_with(HIGHLIGHT_MARKER) && !line.contains(SOURCE_ATTRIBUTION) {
            return LineKind::ChapterHeading(line);
        }

        if let Some(rest) = line.strip_prefix(HIGHLIGHT_MARKER) {
            return LineKind::HighlightStart(rest.trim());
        }

        if line.contains(RECORD_SEPARATOR) {
            return LineKind::RecordSeparator;
        }

        LineKind::Continuation(line)
    }

    /// 匹配 "<n>个笔记"
    ///
    /// 数字可以是任意 Unicode 十进制数字（如全角 `９`），数值超出 `usize` 时取最大值
    fn match_note_count(&self, line: &str) -> Option<usize> {
        let digits = self.note_count_pattern.captures(line)?.get(1)?.as_str();

        Some(digits.chars().fold(0usize, |acc, c| {
            acc.saturating_mul(10)
                .saturating_add(self.digit_value(c) as usize)
        }))
    }

    /// Unicode 十进制数字的数值
    ///
    /// 每组十进制数字都是从 0 到 9 连续排列的码位，
    /// 因此向前数到这一段连续数字的起点，距离对 10 取余即为数值。
    fn digit_value(&self, c: char) -> u32 {
        if let Some(d) = c.to_digit(10) {
            return d;
        }

        let is_digit = |cp: u32| {
            char::from_u32(cp)
                .map(|ch| self.digit_pattern.is_match(ch.encode_utf8(&mut [0; 4])))
                .unwrap_or(false)
        };

        let mut start = c as u32;
        while start > 0 && is_digit(start - 1) {
            start -= 1;
        }
        (c as u32 - start) % 10
    }
}

impl NoteParser for WereadParser {
    fn parse(&self, text: &str) -> BookNotes {
        let mut state = ParseState::default();

        for line in text.split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let kind = self.classify(&state, line);
            state.apply(kind);
        }

        let book = state.finish();
        log::debug!(
            "解析完成: 《{}》 作者={} 声明 {} 条, 实际 {} 条",
            book.title,
            book.author,
            book.declared_note_count,
            book.notes.len()
        );
        book
    }

    fn name(&self) -> &str {
        "weread"
    }
}

impl Default for WereadParser {
    fn default() -> Self {
        Self::new()
    }
}
