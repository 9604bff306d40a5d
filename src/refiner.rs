//! LLM 润色模块
//!
//! 调用 OpenAI 兼容的 chat completions 接口，为每条笔记生成润色文本、小标题和标签。
//! 单条笔记失败时用原文生成备用笔记，不影响整批处理

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::LlmSettings;
use crate::parser::{BookNotes, Note};

/// 处理失败时使用的小标题和标签
pub const FALLBACK_SUB_TITLE: &str = "处理失败";

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("LLM 请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("LLM 接口返回错误 {status}: {body}")]
    Api { status: u16, body: String },
    #[error("LLM 响应中没有内容")]
    EmptyResponse,
    #[error("LLM 响应不是有效的 JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("LLM 响应不是 JSON 对象")]
    NotAnObject,
    #[error("LLM 响应缺少字段: {0}")]
    MissingField(&'static str),
}

/// LLM 返回的润色结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedFields {
    pub refined_text: String,
    pub sub_title: String,
    pub tags: Vec<String>,
}

/// 润色后的笔记
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedNote {
    /// 书名
    pub title: String,
    pub chapter: String,
    pub original_content: String,
    pub refined_text: String,
    pub sub_title: String,
    pub tags: Vec<String>,
}

impl ProcessedNote {
    /// 是否为处理失败时生成的备用笔记
    pub fn is_fallback(&self) -> bool {
        self.sub_title == FALLBACK_SUB_TITLE
    }
}

/// 生成备用笔记
///
/// 以原文作为润色文本，小标题为"处理失败"；书名非空时放在标签首位
pub fn fallback_note(note: &Note, book_title: &str) -> ProcessedNote {
    let tags = if book_title.is_empty() {
        vec![FALLBACK_SUB_TITLE.to_string()]
    } else {
        vec![book_title.to_string(), FALLBACK_SUB_TITLE.to_string()]
    };

    ProcessedNote {
        title: book_title.to_string(),
        chapter: note.chapter.clone(),
        original_content: note.content.clone(),
        refined_text: note.content.clone(),
        sub_title: FALLBACK_SUB_TITLE.to_string(),
        tags,
    }
}

/// 构建润色提示词
pub fn build_prompt(content: &str) -> String {
    format!(
        r#"请逐步处理下面这条读书笔记：
1. 润色文本，使其通顺易读。
2. 为这段文本拟一个概括性的小标题，不超过 20 个字。
3. 生成 2-3 个相关标签。

## 要求
1. 不改变原意，尽量保留原文的风格和用词。
2. 不添加原文没有的内容。

## 原始笔记
{content}

## 输出
只返回一个 JSON 对象，包含以下字段：
- refined_text: 润色后的文本
- sub_title: 小标题
- tags: 标签列表"#
    )
}

/// 解析 LLM 返回的文本
///
/// 容忍 ```json 代码块包裹；`tags` 可以是数组、逗号分隔的字符串或其他单个值
///
/// # 参数
/// - `raw`: LLM 返回的消息内容
///
/// # 返回
/// 润色结果，缺少字段或不是 JSON 对象时返回错误
pub fn parse_refined_response(raw: &str) -> Result<RefinedFields, RefineError> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let value: Value = serde_json::from_str(cleaned.trim())?;
    let obj = value.as_object().ok_or(RefineError::NotAnObject)?;

    let field = |name: &'static str| obj.get(name).ok_or(RefineError::MissingField(name));
    let refined_text = value_to_text(field("refined_text")?);
    let sub_title = value_to_text(field("sub_title")?);
    let tags = match field("tags")? {
        Value::String(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        other => vec![value_to_text(other)],
    };

    Ok(RefinedFields {
        refined_text,
        sub_title,
        tags,
    })
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 对话补全后端
///
/// 抽象出 LLM 调用，便于替换模型服务
pub trait ChatBackend: Send + Sync {
    /// 发送一轮对话，返回助手消息内容
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, RefineError>;
}

/// OpenAI 兼容的 chat completions 客户端
pub struct OpenAiChatClient {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiChatClient {
    pub fn new(settings: &LlmSettings) -> Result<Self, RefineError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        let url = format!("{}/chat/completions", settings.endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            url,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }
}

impl ChatBackend for OpenAiChatClient {
    fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, RefineError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_content }
            ],
            "temperature": self.temperature
        });

        let mut req = self.client.post(&self.url).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;

        if !status.is_success() {
            return Err(RefineError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let chat: Value = serde_json::from_str(&text)?;
        chat.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|a| a.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string())
            .ok_or(RefineError::EmptyResponse)
    }
}

/// 笔记润色器
pub struct NoteRefiner {
    backend: Box<dyn ChatBackend>,
}

impl NoteRefiner {
    pub fn new(backend: Box<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// 用配置创建基于 OpenAI 兼容接口的润色器
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, RefineError> {
        Ok(Self::new(Box::new(OpenAiChatClient::new(settings)?)))
    }

    /// 润色单条笔记，出错时直接返回错误
    pub fn try_refine(&self, note: &Note) -> Result<RefinedFields, RefineError> {
        let prompt = build_prompt(&note.content);
        let raw = self.backend.complete(&prompt, &note.content)?;
        parse_refined_response(&raw).map_err(|e| {
            log::error!("无法解析 LLM 响应: {}", e);
            log::debug!("LLM 原始响应: {}", raw);
            e
        })
    }

    /// 润色单条笔记，失败时返回备用笔记
    ///
    /// # 参数
    /// - `book_title`: 书名，非空时作为第一个标签
    /// - `note`: 原始笔记
    pub fn refine_note(&self, book_title: &str, note: &Note) -> ProcessedNote {
        match self.try_refine(note) {
            Ok(fields) => {
                let mut tags = Vec::with_capacity(fields.tags.len() + 1);
                if !book_title.is_empty() {
                    tags.push(book_title.to_string());
                }
                tags.extend(fields.tags);

                ProcessedNote {
                    title: book_title.to_string(),
                    chapter: note.chapter.clone(),
                    original_content: note.content.clone(),
                    refined_text: fields.refined_text,
                    sub_title: fields.sub_title,
                    tags,
                }
            }
            Err(e) => {
                log::error!("润色笔记失败，使用原文: {}", e);
                fallback_note(note, book_title)
            }
        }
    }

    /// 按顺序润色整本书的笔记
    pub fn refine_book(&self, book: &BookNotes) -> Vec<ProcessedNote> {
        let total = book.notes.len();

        book.notes
            .iter()
            .enumerate()
            .map(|(i, note)| {
                log::info!("正在处理第 {}/{} 条笔记", i + 1, total);
                let processed = self.refine_note(&book.title, note);
                if !processed.is_fallback() {
                    log::info!("第 {} 条笔记处理成功", i + 1);
                }
                processed
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// 按顺序返回预设响应的假后端
    struct ScriptedBackend {
        responses: Mutex<Vec<Result<String, RefineError>>>,
        prompts: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<String, RefineError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl ChatBackend for ScriptedBackend {
        fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, RefineError> {
            self.prompts
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_content.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Err(RefineError::EmptyResponse))
        }
    }

    fn note(chapter: &str, content: &str) -> Note {
        Note {
            chapter: chapter.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let fields = parse_refined_response(
            r#"{"refined_text": "润色后", "sub_title": "能力", "tags": ["成长", "职业"]}"#,
        )
        .unwrap();

        assert_eq!(fields.refined_text, "润色后");
        assert_eq!(fields.sub_title, "能力");
        assert_eq!(fields.tags, vec!["成长", "职业"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"refined_text\": \"a\", \"sub_title\": \"b\", \"tags\": []}\n```";
        let fields = parse_refined_response(raw).unwrap();

        assert_eq!(fields.refined_text, "a");
        assert!(fields.tags.is_empty());
    }

    #[test]
    fn test_parse_string_tags() {
        let fields = parse_refined_response(
            r#"{"refined_text": "a", "sub_title": "b", "tags": "成长, 职业 ,思考"}"#,
        )
        .unwrap();

        assert_eq!(fields.tags, vec!["成长", "职业", "思考"]);
    }

    #[test]
    fn test_parse_scalar_tags() {
        let fields =
            parse_refined_response(r#"{"refined_text": "a", "sub_title": "b", "tags": 42}"#).unwrap();

        assert_eq!(fields.tags, vec!["42"]);
    }

    #[test]
    fn test_parse_missing_field() {
        let result = parse_refined_response(r#"{"refined_text": "a", "tags": []}"#);
        assert!(matches!(result, Err(RefineError::MissingField("sub_title"))));
    }

    #[test]
    fn test_parse_not_json() {
        assert!(matches!(
            parse_refined_response("好的，以下是润色结果"),
            Err(RefineError::Json(_))
        ));
        assert!(matches!(
            parse_refined_response("[1, 2]"),
            Err(RefineError::NotAnObject)
        ));
    }

    #[test]
    fn test_prompt_contains_content() {
        let prompt = build_prompt("能力更重要");
        assert!(prompt.contains("能力更重要"));
        assert!(prompt.contains("refined_text"));
        assert!(prompt.contains("sub_title"));
    }

    #[test]
    fn test_fallback_note_with_title() {
        let processed = fallback_note(&note("前言", "原文"), "软能力");

        assert_eq!(processed.refined_text, "原文");
        assert_eq!(processed.original_content, "原文");
        assert_eq!(processed.sub_title, "处理失败");
        assert_eq!(processed.tags, vec!["软能力", "处理失败"]);
        assert!(processed.is_fallback());
    }

    #[test]
    fn test_fallback_note_without_title() {
        let processed = fallback_note(&note("", "原文"), "");
        assert_eq!(processed.tags, vec!["处理失败"]);
    }

    #[test]
    fn test_refine_note_prepends_book_title() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"refined_text": "润色", "sub_title": "标题", "tags": ["人生观"]}"#.to_string(),
        )]);
        let refiner = NoteRefiner::new(Box::new(backend));

        let processed = refiner.refine_note("软能力", &note("前言", "原文"));

        assert_eq!(processed.title, "软能力");
        assert_eq!(processed.chapter, "前言");
        assert_eq!(processed.refined_text, "润色");
        assert_eq!(processed.tags, vec!["软能力", "人生观"]);
        assert!(!processed.is_fallback());
    }

    #[test]
    fn test_refine_note_sends_prompt_and_content() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"refined_text": "x", "sub_title": "y", "tags": []}"#.to_string(),
        )]);
        let prompts = Arc::clone(&backend.prompts);
        let refiner = NoteRefiner::new(Box::new(backend));

        refiner.refine_note("", &note("", "原文内容"));

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.contains("原文内容"));
        assert_eq!(prompts[0].1, "原文内容");
    }

    #[test]
    fn test_try_refine_propagates_backend_error() {
        let refiner = NoteRefiner::new(Box::new(ScriptedBackend::new(vec![])));
        let result = refiner.try_refine(&note("", "原文"));

        assert!(matches!(result, Err(RefineError::EmptyResponse)));
    }

    #[test]
    fn test_refine_book_falls_back_per_note() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"refined_text": "一", "sub_title": "甲", "tags": []}"#.to_string()),
            Err(RefineError::Api {
                status: 500,
                body: "internal".to_string(),
            }),
            Ok("不是 JSON".to_string()),
        ]);
        let refiner = NoteRefiner::new(Box::new(backend));
        let book = BookNotes {
            title: "软能力".to_string(),
            author: "吴军".to_string(),
            declared_note_count: 3,
            notes: vec![note("前言", "a"), note("第一章", "b"), note("第二章", "c")],
        };

        let processed = refiner.refine_book(&book);

        assert_eq!(processed.len(), 3);
        assert_eq!(processed[0].sub_title, "甲");
        assert!(processed[1].is_fallback());
        assert_eq!(processed[1].refined_text, "b");
        assert!(processed[2].is_fallback());
        assert_eq!(processed[2].chapter, "第二章");
    }
}
