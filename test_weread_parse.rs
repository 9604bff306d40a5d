//! 测试微信读书笔记解析
//!
//! 用于人工检查 WereadParser 对真实导出文本的解析结果

use std::path::PathBuf;
use weread_flomo_lib::parser::read_export_file;
use weread_flomo_lib::{NoteParser, WereadParser};

fn main() {
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("samples/soft_skills.txt"));

    if !path.exists() {
        eprintln!("错误: 找不到文件 {:?}", path);
        return;
    }

    println!("正在解析导出文本: {:?}", path);

    let text = match read_export_file(&path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("✗ 读取失败: {}", e);
            return;
        }
    };

    let book = WereadParser::new().parse(&text);
    println!("✓ 解析完成");
    println!("  书名: {}", book.title);
    println!("  作者: {}", book.author);
    println!("  声明笔记数: {}", book.declared_note_count);
    println!("  实际笔记数: {}", book.notes.len());

    for (i, note) in book.notes.iter().enumerate() {
        let preview = note.content.chars().take(40).collect::<String>();
        println!("\n  笔记 {}: [{}]", i + 1, note.chapter);
        println!("  预览: {}...", preview);
    }

    if book.notes.is_empty() {
        println!("\n⚠ 警告: 没有找到任何笔记！");
    } else if !book.count_matches() {
        println!("\n⚠ 注意: 声明数量与实际数量不一致");
    }
}
