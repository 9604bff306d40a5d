use serde::{Serialize, Deserialize};

// 子模块声明
pub mod weread_parser;
pub mod text_source;

pub use weread_parser::WereadParser;
pub use text_source::{read_export_file, read_export_stdin, decode_export_bytes};

/// 单条划线笔记
///
/// 表示从导出文本中解析出的一条划线记录
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Note {
    /// 记录该划线时生效的章节标题，可能为空
    pub chapter: String,
    /// 划线内容（续行以单个空格拼接）
    pub content: String,
}

/// 书籍笔记
///
/// 一次解析的完整结果：书名、作者、声明的笔记数和按原文顺序排列的笔记
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookNotes {
    /// 书名（去掉书名号）
    pub title: String,
    /// 作者
    pub author: String,
    /// 导出文本中声明的笔记数量，不一定等于实际解析出的条数
    #[serde(rename = "note_count")]
    pub declared_note_count: usize,
    /// 按原文顺序排列的笔记
    pub notes: Vec<Note>,
}

impl BookNotes {
    /// 实际解析出的笔记条数
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// 声明数量与实际数量是否一致
    pub fn count_matches(&self) -> bool {
        self.declared_note_count == self.notes.len()
    }
}

/// Parser trait
///
/// 笔记文本解析器。解析是宽松的：任何文本都能得到一个结果，不会因为格式异常而失败
pub trait NoteParser: Send + Sync {
    /// 解析导出文本
    ///
    /// # 参数
    /// - `text`: 导出的原始文本
    ///
    /// # 返回
    /// 解析得到的书籍笔记
    fn parse(&self, text: &str) -> BookNotes;

    /// 解析器名称，用于日志
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_notes_default_is_empty() {
        let book = BookNotes::default();

        assert_eq!(book.title, "");
        assert_eq!(book.author, "");
        assert_eq!(book.declared_note_count, 0);
        assert!(book.is_empty());
        assert!(book.count_matches());
    }

    #[test]
    fn test_count_matches() {
        let book = BookNotes {
            title: "软能力".to_string(),
            author: "吴军".to_string(),
            declared_note_count: 9,
            notes: vec![Note {
                chapter: "前言".to_string(),
                content: "内容".to_string(),
            }],
        };

        assert_eq!(book.len(), 1);
        assert!(!book.count_matches());
    }

    #[test]
    fn test_serialize_uses_note_count_key() {
        let book = BookNotes {
            title: "软能力".to_string(),
            author: "吴军".to_string(),
            declared_note_count: 2,
            notes: vec![],
        };

        let value = serde_json::to_value(&book).unwrap();
        assert_eq!(value["note_count"], 2);
        assert!(value.get("declared_note_count").is_none());

        let back: BookNotes = serde_json::from_value(value).unwrap();
        assert_eq!(back, book);
    }

    #[test]
    fn test_parser_trait_object() {
        let parser: Box<dyn NoteParser> = Box::new(WereadParser::new());
        let book = parser.parse("《软能力》");

        assert_eq!(parser.name(), "weread");
        assert_eq!(book.title, "软能力");
    }
}
