//! 文本规范化管线
//!
//! 将任意输入文本改写为合成引擎可安全消费的形式。引擎对意外字符
//! 非常敏感（遇到不支持的字形会直接失败），因此这里的策略是丢弃或
//! 转写，而不是拒绝整个请求。
//!
//! 处理顺序（顺序不可调换）：
//! 1. 合并多行并折叠空白
//! 2. 数字与常见符号展开为俄语读法
//! 3. 英文字母转写为俄语近似音
//! 4. 过滤引擎字母表之外的字符（重音标记 `+` 在元音前保留）
//! 5. 超出长度上限时在句子/词边界截断
//!
//! 纯函数：相同输入永远得到相同输出，且满足幂等性
//! `normalize(normalize(x)) == normalize(x)`。

use thiserror::Error;

use super::num2words::num_to_words;

/// 重音标记：放在元音前，指示引擎的重读位置
pub const STRESS_MARKER: char = '+';

/// 规范化错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// 规范化之后没有剩下任何可朗读的内容
    #[error("input is empty after normalization")]
    EmptyInput,
}

/// 截断边界策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TruncateBoundary {
    /// 在最后一个完整句子处截断（找不到句界时退化为词边界）
    Sentence,
    /// 在最后一个词边界处截断
    Word,
}

impl Default for TruncateBoundary {
    fn default() -> Self {
        TruncateBoundary::Sentence
    }
}

/// 规范化选项
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// 最大输出字符数（None 表示不限制）
    pub max_chars: Option<usize>,
    /// 截断边界策略
    pub truncate: TruncateBoundary,
}

/// 规范化之后的文本
///
/// 不变式：只包含引擎字母表内的字符（西里尔字母、空白、基本标点、
/// 元音前的重音标记），且不含任何数字字符。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl std::fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// 英文字母 → 俄语近似音转写表
fn transliterate_latin(ch: char) -> Option<&'static str> {
    Some(match ch {
        'a' => "а",
        'b' => "б",
        'c' => "к",
        'd' => "д",
        'e' => "е",
        'f' => "ф",
        'g' => "г",
        'h' => "х",
        'i' => "и",
        'j' => "ж",
        'k' => "к",
        'l' => "л",
        'm' => "м",
        'n' => "н",
        'o' => "о",
        'p' => "п",
        'q' => "к",
        'r' => "р",
        's' => "с",
        't' => "т",
        'u' => "у",
        'v' => "в",
        'w' => "в",
        'x' => "х",
        'y' => "ай",
        'z' => "з",
        _ => return None,
    })
}

/// 常见符号 → 俄语读法
fn expand_symbol(ch: char) -> Option<&'static str> {
    Some(match ch {
        '%' => " процентов ",
        '№' => " номер ",
        '&' => " и ",
        '=' => " равно ",
        _ => return None,
    })
}

fn is_cyrillic_letter(ch: char) -> bool {
    matches!(ch, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

fn is_cyrillic_vowel(ch: char) -> bool {
    matches!(
        ch,
        'а' | 'е' | 'ё' | 'и' | 'о' | 'у' | 'ы' | 'э' | 'ю' | 'я'
            | 'А' | 'Е' | 'Ё' | 'И' | 'О' | 'У' | 'Ы' | 'Э' | 'Ю' | 'Я'
    )
}

/// 引擎接受的标点
fn is_allowed_punct(ch: char) -> bool {
    matches!(ch, '.' | ',' | '!' | '?' | '…' | ':' | ';' | '-')
}

fn is_sentence_end(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?' | '…')
}

/// 折叠空白并合并多行
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 展开数字串；超出 i64 范围时退化为逐位朗读
fn expand_number_run(digits: &str, out: &mut String) {
    match digits.parse::<i64>() {
        Ok(n) => out.push_str(&num_to_words(n)),
        Err(_) => {
            let mut first = true;
            for d in digits.chars() {
                if !first {
                    out.push(' ');
                }
                out.push_str(&num_to_words((d as i64) - ('0' as i64)));
                first = false;
            }
        }
    }
}

/// 展开数字与符号。数字串两侧补空格，避免和相邻词粘连。
fn expand_numbers_and_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut digits = String::new();

    let flush_digits = |digits: &mut String, out: &mut String| {
        if digits.is_empty() {
            return;
        }
        if !out.ends_with(' ') && !out.is_empty() {
            out.push(' ');
        }
        expand_number_run(digits, out);
        out.push(' ');
        digits.clear();
    };

    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        flush_digits(&mut digits, &mut out);
        if let Some(words) = expand_symbol(ch) {
            out.push_str(words);
        } else {
            out.push(ch);
        }
    }
    flush_digits(&mut digits, &mut out);

    out
}

/// 英文单词逐字母转写（先转小写）
fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_ascii_alphabetic() {
            if let Some(ru) = transliterate_latin(ch.to_ascii_lowercase()) {
                out.push_str(ru);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// 过滤引擎字母表之外的字符
///
/// 重音标记只有紧跟元音时才保留；其余位置的 `+` 一律丢弃。
fn filter_alphabet(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == STRESS_MARKER {
            if chars.peek().copied().is_some_and(is_cyrillic_vowel) {
                out.push(ch);
            }
            continue;
        }
        if is_cyrillic_letter(ch) || is_allowed_punct(ch) || ch == ' ' {
            out.push(ch);
        }
        // 其余字符丢弃：引擎见到不支持的字形会失败
    }

    out
}

/// 在边界处截断到 max_chars 个字符以内
fn truncate_at_boundary(text: &str, max_chars: usize, boundary: TruncateBoundary) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let prefix: String = text.chars().take(max_chars).collect();

    if boundary == TruncateBoundary::Sentence {
        if let Some(pos) = prefix.rfind(is_sentence_end) {
            let end = pos + prefix[pos..].chars().next().map_or(1, |c| c.len_utf8());
            return prefix[..end].to_string();
        }
        // 没有完整句子，退化到词边界
    }

    match prefix.rfind(' ') {
        Some(pos) => prefix[..pos].to_string(),
        None => prefix,
    }
}

/// 规范化入口
///
/// 总是返回值而不产生副作用；只有在规范化后内容为空时返回
/// [`NormalizeError::EmptyInput`]。
pub fn normalize(raw: &str, opts: &NormalizeOptions) -> Result<NormalizedText, NormalizeError> {
    let text = collapse_whitespace(raw);
    let text = expand_numbers_and_symbols(&text);
    let text = transliterate(&text);
    let text = filter_alphabet(&text);
    let mut text = collapse_whitespace(&text);

    if let Some(max_chars) = opts.max_chars {
        text = truncate_at_boundary(&text, max_chars, opts.truncate);
        text = text.trim().to_string();
    }

    if text.chars().all(|c| !is_cyrillic_letter(c)) {
        return Err(NormalizeError::EmptyInput);
    }

    Ok(NormalizedText(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(s: &str) -> String {
        normalize(s, &NormalizeOptions::default())
            .unwrap()
            .into_string()
    }

    #[test]
    fn test_digits_fully_expanded() {
        let out = norm("Встреча в 10 часов, зал 42");
        assert!(!out.chars().any(|c| c.is_ascii_digit()), "{}", out);
        assert!(out.contains("десять"));
        assert!(out.contains("сорок два"));
    }

    #[test]
    fn test_spec_scenario() {
        // "Привет, 2 мира!" → 无数字，逗号保留
        let out = norm("Привет, 2 мира!");
        assert_eq!(out, "Привет, два мира!");
    }

    #[test]
    fn test_percent_expanded() {
        let out = norm("скидка 50%");
        assert!(out.contains("пятьдесят процентов"), "{}", out);
    }

    #[test]
    fn test_english_transliterated() {
        let out = norm("сервер linux");
        assert_eq!(out, "сервер линух");
    }

    #[test]
    fn test_unsupported_glyphs_dropped() {
        let out = norm("тест 🎵 @ ~ главный");
        assert_eq!(out, "тест главный");
    }

    #[test]
    fn test_stress_marker_kept_before_vowel() {
        let out = norm("зам+ок");
        assert_eq!(out, "зам+ок");
        // 非元音前的 + 被丢弃
        let out = norm("з+лой");
        assert_eq!(out, "злой");
    }

    #[test]
    fn test_idempotent() {
        for s in [
            "Привет, 2 мира!",
            "скидка 50% на hello world",
            "зам+ок и 1000 рублей",
            "многострочный\nтекст\r\nс переносами",
        ] {
            let once = norm(s);
            let twice = norm(&once);
            assert_eq!(once, twice, "input: {}", s);
        }
    }

    #[test]
    fn test_multiline_joined() {
        let out = norm("первая строка\nвторая   строка");
        assert_eq!(out, "первая строка вторая строка");
    }

    #[test]
    fn test_empty_input_error() {
        let opts = NormalizeOptions::default();
        assert_eq!(normalize("", &opts), Err(NormalizeError::EmptyInput));
        assert_eq!(normalize("   ", &opts), Err(NormalizeError::EmptyInput));
        // 全部被过滤掉也算空
        assert_eq!(normalize("@#$ 🎵", &opts), Err(NormalizeError::EmptyInput));
    }

    #[test]
    fn test_truncate_sentence_boundary() {
        let opts = NormalizeOptions {
            max_chars: Some(30),
            truncate: TruncateBoundary::Sentence,
        };
        let out = normalize("Первое предложение. Второе предложение подлиннее.", &opts).unwrap();
        assert_eq!(out.as_str(), "Первое предложение.");
    }

    #[test]
    fn test_truncate_word_boundary() {
        let opts = NormalizeOptions {
            max_chars: Some(12),
            truncate: TruncateBoundary::Word,
        };
        let out = normalize("слово ещё слово", &opts).unwrap();
        assert!(out.char_len() <= 12);
        // 不会把词切到一半
        assert!(out.as_str() == "слово ещё" || out.as_str() == "слово");
    }

    #[test]
    fn test_truncate_no_boundary_hard_cut() {
        let opts = NormalizeOptions {
            max_chars: Some(5),
            truncate: TruncateBoundary::Sentence,
        };
        let out = normalize("оченьдлинноеслово", &opts).unwrap();
        assert_eq!(out.char_len(), 5);
    }

    #[test]
    fn test_unbounded_when_no_limit() {
        let long = "слово ".repeat(500);
        let out = norm(&long);
        assert!(out.chars().count() > 2000);
    }

    #[test]
    fn test_digit_overflow_per_digit() {
        let out = norm("99999999999999999999");
        assert!(!out.chars().any(|c| c.is_ascii_digit()));
        assert!(out.contains("девять"));
    }
}
