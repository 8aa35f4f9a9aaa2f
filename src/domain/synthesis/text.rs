//! 服务商文本长度限制

/// 截断到至多 `max_chars` 个字符（按 char 边界，不拆分 UTF-8）
///
/// 超长文本只发送前缀，不分段也不拒绝。
pub fn truncate_for_provider(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
