//! 文本过滤器模块
//!
//! 提供消息文本的清理和压缩

use std::sync::OnceLock;

use regex::Regex;

use crate::flags::strip_flags;

/// 正则表达式缓存
struct RegexCache {
    hedges: Regex,
    fillers: Regex,
    purpose: Regex,
    cause: Regex,
    whitespace: Regex,
    clock_time: Regex,
    status_glyphs: Regex,
}

fn regexes() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(|| RegexCache {
        hedges: Regex::new(r"(?i)\b(very|really|quite|rather|pretty|somewhat|fairly)\s+")
            .expect("valid hedge regex"),
        fillers: Regex::new(r"(?i)\b(I think that|I believe that|it seems that|it appears that)\s+")
            .expect("valid filler regex"),
        purpose: Regex::new(r"(?i)\b(in order to|so as to)\b").expect("valid purpose regex"),
        cause: Regex::new(r"(?i)\b(due to the fact that|owing to the fact that)\b")
            .expect("valid cause regex"),
        whitespace: Regex::new(r"\s+").expect("valid whitespace regex"),
        clock_time: Regex::new(r"(?i)\b\d{1,2}:\d{2}(\s?[ap]\.?m\.?)?(\b|$)")
            .expect("valid clock regex"),
        status_glyphs: Regex::new(r"[✓✔🕓]").expect("valid glyph regex"),
    })
}

/// 合并连续空白并去掉首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    regexes().whitespace.replace_all(text, " ").trim().to_string()
}

fn compress_once(text: &str) -> String {
    let re = regexes();
    let text = re.hedges.replace_all(text, "");
    let text = re.fillers.replace_all(&text, "");
    let text = re.purpose.replace_all(&text, "to");
    let text = re.cause.replace_all(&text, "because");
    normalize_whitespace(&text)
}

/// 删除常见的冗余修饰词和套话
///
/// 反复执行直到文本不再变化，因此对任何输入都是幂等的。
pub fn compress_text(text: &str) -> String {
    let mut current = compress_once(text);
    loop {
        let next = compress_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

/// 去掉国旗、时间戳和送达状态符号
pub fn strip_noise(text: &str) -> String {
    let re = regexes();
    let text = strip_flags(text);
    let text = re.clock_time.replace_all(&text, " ");
    let text = re.status_glyphs.replace_all(&text, " ");
    normalize_whitespace(&text)
}

/// 文本是否足够长，值得翻译
pub fn is_translatable(text: &str) -> bool {
    text.trim().chars().count() >= crate::translation::config::constants::MIN_MESSAGE_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_hedge_and_filler() {
        assert_eq!(compress_text("I think that this is very good"), "this is good");
    }

    #[test]
    fn test_compress_replacements() {
        assert_eq!(
            compress_text("We left early in order to win, due to the fact that it rained"),
            "We left early to win, because it rained"
        );
        assert_eq!(compress_text("So As To"), "to");
    }

    #[test]
    fn test_compress_is_idempotent() {
        let inputs = [
            "I think that I believe that it is really very quite nice",
            "  it seems that   pretty\tfairly   odd  ",
            "Very",
            "I think that I think that very very good",
            "in order to in order to",
            "",
            "plain text",
        ];

        for input in inputs {
            let once = compress_text(input);
            assert_eq!(compress_text(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_nested_fillers_are_removed() {
        assert_eq!(compress_text("I think that I think that very very good"), "good");
    }

    #[test]
    fn test_strip_noise() {
        assert_eq!(strip_noise("Hola amigo 12:34 ✓✓"), "Hola amigo");
        assert_eq!(strip_noise("See you 🇫🇷 9:05 PM"), "See you");
        assert_eq!(strip_noise("Bonjour\n\n 🕓 10:00 am"), "Bonjour");
    }

    #[test]
    fn test_is_translatable() {
        assert!(!is_translatable(" a "));
        assert!(is_translatable("ok"));
        assert!(!is_translatable(""));
    }
}
