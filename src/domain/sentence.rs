//! 句子切分器
//!
//! 流式模式下按句子边界切分规范化文本，每句单独送入引擎合成，
//! 降低首音频延迟。过短的句子会被合并，避免对引擎的碎片化调用。

/// 默认最小字符数限制
/// 当句子字符数未达到此限制时，弱分隔符不会触发切分
pub const DEFAULT_MIN_CHARS: usize = 20;

/// 切分配置
#[derive(Debug, Clone)]
pub struct SentenceConfig {
    /// 最小字符数限制（用于合并短句）
    pub min_chars: usize,
}

impl Default for SentenceConfig {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

/// 强分隔符（句末标点，总是切分）
#[inline]
fn is_strong_delimiter(ch: char) -> bool {
    matches!(ch, '.' | '?' | '!' | '…')
}

/// 弱分隔符（达到最小字符数时才切分）
#[inline]
fn is_weak_delimiter(ch: char) -> bool {
    matches!(ch, ',' | ';' | ':')
}

/// 按分隔符切分（不做合并）
fn split_by_delimiters(text: &str, config: &SentenceConfig) -> Vec<String> {
    let mut sentences: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut char_count = 0;

    for ch in text.chars() {
        current.push(ch);
        char_count += 1;

        let should_split = if is_strong_delimiter(ch) {
            true
        } else {
            is_weak_delimiter(ch) && char_count >= config.min_chars
        };

        if should_split {
            let trimmed = current.trim().to_string();
            if !trimmed.is_empty() {
                sentences.push(trimmed);
            }
            current.clear();
            char_count = 0;
        }
    }

    // 剩余内容
    let trimmed = current.trim().to_string();
    if !trimmed.is_empty() {
        sentences.push(trimmed);
    }

    sentences
}

/// 合并短句直到满足 min_chars
fn merge_until_min_chars(sentences: Vec<String>, min_chars: usize) -> Vec<String> {
    if sentences.is_empty() {
        return sentences;
    }

    let mut result: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for sentence in sentences {
        if !buffer.is_empty() {
            buffer.push(' ');
        }
        buffer.push_str(&sentence);

        if buffer.chars().count() >= min_chars {
            result.push(std::mem::take(&mut buffer));
        }
    }

    // 处理剩余 buffer
    if !buffer.is_empty() {
        if let Some(last) = result.last_mut() {
            last.push(' ');
            last.push_str(&buffer);
        } else {
            result.push(buffer);
        }
    }

    result
}

/// 将文本切分为适合逐句合成的句子序列
///
/// 切分策略：
/// 1. 强分隔符（.?!…）总是切分；弱分隔符（,;:）只在满足 min_chars 时切分
/// 2. 短句合并直到满足 min_chars
pub fn split_sentences(text: &str, config: &SentenceConfig) -> Vec<String> {
    let raw = split_by_delimiters(text, config);
    merge_until_min_chars(raw, config.min_chars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_delimiter_splits() {
        let config = SentenceConfig { min_chars: 1 };
        let text = "Первое предложение. Второе предложение! Третье?";
        let sentences = split_sentences(text, &config);

        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "Первое предложение.");
        assert_eq!(sentences[1], "Второе предложение!");
        assert_eq!(sentences[2], "Третье?");
    }

    #[test]
    fn test_short_sentences_merged() {
        let config = SentenceConfig { min_chars: 20 };
        let text = "Да. Нет. Может быть.";
        let sentences = split_sentences(text, &config);

        // 短句合并成一个
        assert_eq!(sentences.len(), 1);
        assert_eq!(sentences[0], "Да. Нет. Может быть.");
    }

    #[test]
    fn test_weak_delimiter_respects_min_chars() {
        let config = SentenceConfig { min_chars: 30 };
        let text = "раз, два, три";
        let sentences = split_sentences(text, &config);

        // 逗号不会在字符数不足时切分
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_weak_delimiter_splits_when_enough_chars() {
        let config = SentenceConfig { min_chars: 10 };
        let text = "довольно длинная часть, и ещё одна часть";
        let sentences = split_sentences(text, &config);

        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0], "довольно длинная часть,");
        assert_eq!(sentences[1], "и ещё одна часть");
    }

    #[test]
    fn test_no_delimiter_single_sentence() {
        let config = SentenceConfig::default();
        let sentences = split_sentences("текст без знаков препинания", &config);
        assert_eq!(sentences.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let config = SentenceConfig::default();
        assert!(split_sentences("", &config).is_empty());
        assert!(split_sentences("   ", &config).is_empty());
    }

    #[test]
    fn test_trailing_fragment_merged_into_last() {
        let config = SentenceConfig { min_chars: 5 };
        let text = "Первое длинное предложение. Ой";
        let sentences = split_sentences(text, &config);

        // 结尾的碎片并入前一句
        assert_eq!(sentences.len(), 1);
        assert!(sentences[0].ends_with("Ой"));
    }
}
