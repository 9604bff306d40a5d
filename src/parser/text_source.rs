use encoding_rs::{Encoding, GBK, UTF_8};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// GBK 双字节字符的首字节范围
const GBK_LEAD: std::ops::RangeInclusive<u8> = 0x81..=0xFE;
/// GBK 双字节字符的尾字节范围
const GBK_TRAIL: std::ops::RangeInclusive<u8> = 0x40..=0xFE;

/// 非 ASCII 字节中能组成 GBK 双字节字符的比例
///
/// 纯 ASCII 时返回 `None`
fn gbk_pair_ratio(bytes: &[u8]) -> Option<f32> {
    let (mut matched, mut seen) = (0u32, 0u32);
    let mut rest = bytes;

    while let [lead, tail @ ..] = rest {
        if lead.is_ascii() {
            rest = tail;
            continue;
        }
        seen += 1;
        match tail {
            [trail, after @ ..] if GBK_LEAD.contains(lead) && GBK_TRAIL.contains(trail) => {
                matched += 1;
                rest = after;
            }
            _ => rest = tail,
        }
    }

    (seen > 0).then(|| matched as f32 / seen as f32)
}

/// 选择解码导出文本所用的编码
///
/// 从微信读书复制的文本通常是 UTF-8；在 Windows 上另存的文件可能是 GBK 或带 BOM。
/// 非 UTF-8 且 GBK 特征不明显时仍按 UTF-8 解码，错误字节会被替换。
fn export_encoding(bytes: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    match gbk_pair_ratio(bytes) {
        Some(ratio) if ratio > 0.5 => GBK,
        _ => UTF_8,
    }
}

/// 将导出文件的字节解码为字符串
///
/// BOM 优先于其他判断，由 `Encoding::decode` 负责识别并去除。
/// 解码出错时只记录警告，替换字符会留在文本中，由宽松的解析器处理
pub fn decode_export_bytes(bytes: &[u8]) -> String {
    let (content, encoding_used, had_errors) = export_encoding(bytes).decode(bytes);
    if had_errors {
        log::warn!("文件按 {} 解码时出现错误，可能存在乱码", encoding_used.name());
    } else {
        log::debug!("导出文本编码: {}", encoding_used.name());
    }
    content.into_owned()
}

/// 读取导出文件
///
/// # 参数
/// - `path`: 导出文件路径
///
/// # 返回
/// 解码后的文本
pub fn read_export_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode_export_bytes(&bytes))
}

/// 从标准输入读取导出文本
pub fn read_export_stdin() -> io::Result<String> {
    let mut bytes = Vec::new();
    io::stdin().read_to_end(&mut bytes)?;
    Ok(decode_export_bytes(&bytes))
}
