//! 俄语数字转文字
//!
//! 将整数展开为俄语基数词（合成引擎无法朗读阿拉伯数字）。
//! 千位在俄语中为阴性，需要单独的词形处理。

const ONES: [&str; 20] = [
    "",
    "один",
    "два",
    "три",
    "четыре",
    "пять",
    "шесть",
    "семь",
    "восемь",
    "девять",
    "десять",
    "одиннадцать",
    "двенадцать",
    "тринадцать",
    "четырнадцать",
    "пятнадцать",
    "шестнадцать",
    "семнадцать",
    "восемнадцать",
    "девятнадцать",
];

const ONES_FEM: [&str; 3] = ["", "одна", "две"];

const TENS: [&str; 10] = [
    "",
    "",
    "двадцать",
    "тридцать",
    "сорок",
    "пятьдесят",
    "шестьдесят",
    "семьдесят",
    "восемьдесят",
    "девяносто",
];

const HUNDREDS: [&str; 10] = [
    "",
    "сто",
    "двести",
    "триста",
    "четыреста",
    "пятьсот",
    "шестьсот",
    "семьсот",
    "восемьсот",
    "девятьсот",
];

/// 千位量词的复数形式
fn thousands_word(n: i64) -> &'static str {
    let n = n.abs() % 100;
    if (11..=19).contains(&n) {
        return "тысяч";
    }
    match n % 10 {
        1 => "тысяча",
        2..=4 => "тысячи",
        _ => "тысяч",
    }
}

/// 百万量词的复数形式
fn millions_word(n: i64) -> &'static str {
    let n = n.abs() % 100;
    if (11..=19).contains(&n) {
        return "миллионов";
    }
    match n % 10 {
        1 => "миллион",
        2..=4 => "миллиона",
        _ => "миллионов",
    }
}

/// 十亿量词的复数形式
fn billions_word(n: i64) -> &'static str {
    let n = n.abs() % 100;
    if (11..=19).contains(&n) {
        return "миллиардов";
    }
    match n % 10 {
        1 => "миллиард",
        2..=4 => "миллиарда",
        _ => "миллиардов",
    }
}

/// 转换 0-999 区段（千位使用阴性词形）
fn hundreds_to_words(n: i64, feminine: bool) -> String {
    let n = n.unsigned_abs() as usize;
    if n == 0 {
        return String::new();
    }

    let mut parts = Vec::new();

    let h = n / 100;
    if h > 0 {
        parts.push(HUNDREDS[h].to_string());
    }

    let remainder = n % 100;
    if remainder > 0 {
        if remainder < 20 {
            if feminine && remainder <= 2 {
                parts.push(ONES_FEM[remainder].to_string());
            } else {
                parts.push(ONES[remainder].to_string());
            }
        } else {
            let tens = remainder / 10;
            let ones = remainder % 10;
            parts.push(TENS[tens].to_string());
            if ones > 0 {
                if feminine && ones <= 2 {
                    parts.push(ONES_FEM[ones].to_string());
                } else {
                    parts.push(ONES[ones].to_string());
                }
            }
        }
    }

    parts.join(" ")
}

/// 将整数转换为俄语基数词
pub fn num_to_words(num: i64) -> String {
    if num == 0 {
        return "ноль".to_string();
    }

    let mut parts = Vec::new();
    let mut n = num;

    if n < 0 {
        parts.push("минус".to_string());
        n = -n;
    }

    let billions = n / 1_000_000_000;
    if billions > 0 {
        parts.push(hundreds_to_words(billions, false));
        parts.push(billions_word(billions).to_string());
    }
    n %= 1_000_000_000;

    let millions = n / 1_000_000;
    if millions > 0 {
        parts.push(hundreds_to_words(millions, false));
        parts.push(millions_word(millions).to_string());
    }
    n %= 1_000_000;

    // 千位为阴性
    let thousands = n / 1_000;
    if thousands > 0 {
        parts.push(hundreds_to_words(thousands, true));
        parts.push(thousands_word(thousands).to_string());
    }
    n %= 1_000;

    if n > 0 || parts.is_empty() {
        parts.push(hundreds_to_words(n, false));
    }

    parts
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        assert_eq!(num_to_words(0), "ноль");
        assert_eq!(num_to_words(1), "один");
        assert_eq!(num_to_words(2), "два");
        assert_eq!(num_to_words(10), "десять");
        assert_eq!(num_to_words(11), "одиннадцать");
        assert_eq!(num_to_words(19), "девятнадцать");
        assert_eq!(num_to_words(20), "двадцать");
        assert_eq!(num_to_words(21), "двадцать один");
        assert_eq!(num_to_words(100), "сто");
        assert_eq!(num_to_words(101), "сто один");
        assert_eq!(num_to_words(111), "сто одиннадцать");
        assert_eq!(num_to_words(200), "двести");
    }

    #[test]
    fn test_thousands_feminine() {
        assert_eq!(num_to_words(1000), "одна тысяча");
        assert_eq!(num_to_words(2000), "две тысячи");
        assert_eq!(num_to_words(5000), "пять тысяч");
        assert_eq!(num_to_words(11000), "одиннадцать тысяч");
        assert_eq!(num_to_words(21000), "двадцать одна тысяча");
        assert_eq!(num_to_words(1001), "одна тысяча один");
        assert_eq!(num_to_words(2345), "две тысячи триста сорок пять");
    }

    #[test]
    fn test_millions() {
        assert_eq!(num_to_words(1_000_000), "один миллион");
        assert_eq!(num_to_words(2_000_000), "два миллиона");
        assert_eq!(num_to_words(5_000_000), "пять миллионов");
    }

    #[test]
    fn test_negative() {
        assert_eq!(num_to_words(-1), "минус один");
        assert_eq!(num_to_words(-100), "минус сто");
    }

    #[test]
    fn test_no_digits_in_output() {
        for n in [7, 42, 1917, 1_000_000_007] {
            let words = num_to_words(n);
            assert!(!words.chars().any(|c| c.is_ascii_digit()), "{}", words);
        }
    }
}
