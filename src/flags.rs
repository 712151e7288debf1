//! 国旗表情编解码
//!
//! 国旗表情由两个连续的区域指示符号（U+1F1E6–U+1F1FF）组成，
//! 这里负责把它们映射到翻译目标语言。

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// 国旗到语言代码的映射，允许多个国旗对应同一种语言
pub const FLAG_LANGUAGES: &[(&str, &str)] = &[
    ("🇺🇸", "en-US"),
    ("🇬🇧", "en-GB"),
    ("🇪🇸", "es"),
    ("🇫🇷", "fr"),
    ("🇩🇪", "de"),
    ("🇮🇹", "it"),
    ("🇵🇹", "pt"),
    ("🇷🇺", "ru"),
    ("🇯🇵", "ja"),
    ("🇰🇷", "ko"),
    ("🇨🇳", "zh"),
    ("🇳🇱", "nl"),
    ("🇸🇪", "sv"),
    ("🇳🇴", "no"),
    ("🇩🇰", "da"),
    ("🇫🇮", "fi"),
    ("🇵🇱", "pl"),
    ("🇨🇿", "cs"),
    ("🇸🇰", "sk"),
    ("🇭🇺", "hu"),
    ("🇬🇷", "el"),
    ("🇹🇷", "tr"),
    ("🇧🇷", "pt-BR"),
    ("🇦🇷", "es"),
    ("🇲🇽", "es"),
    ("🇮🇳", "hi"),
    ("🇹🇭", "th"),
    ("🇻🇳", "vi"),
    ("🇮🇩", "id"),
    ("🇲🇾", "ms"),
    ("🇵🇭", "tl"),
    ("🇸🇦", "ar"),
    ("🇦🇪", "ar"),
    ("🇪🇬", "ar"),
    ("🇮🇱", "he"),
    ("🇺🇦", "uk"),
    ("🇷🇴", "ro"),
    ("🇧🇬", "bg"),
    ("🇭🇷", "hr"),
    ("🇸🇮", "sl"),
    ("🇱🇹", "lt"),
    ("🇱🇻", "lv"),
    ("🇪🇪", "et"),
];

fn flag_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| FLAG_LANGUAGES.iter().copied().collect())
}

fn regional_pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\x{1F1E6}-\x{1F1FF}]{2}").expect("valid flag regex"))
}

/// 在文本中查找第一个已知的国旗表情
///
/// 不认识的区域指示符号对直接跳过，不视为错误。
pub fn decode_flag(text: &str) -> Option<&'static str> {
    regional_pair_regex()
        .find_iter(text)
        .find_map(|m| flag_map().get_key_value(m.as_str()).map(|(flag, _)| *flag))
}

/// 文本中所有已知国旗，按出现顺序去重
pub fn decode_all_flags(text: &str) -> Vec<&'static str> {
    let mut flags: Vec<&'static str> = Vec::new();
    for m in regional_pair_regex().find_iter(text) {
        if let Some((flag, _)) = flag_map().get_key_value(m.as_str()) {
            if !flags.contains(flag) {
                flags.push(flag);
            }
        }
    }
    flags
}

/// 国旗对应的语言代码
pub fn flag_to_language(flag: &str) -> Option<&'static str> {
    flag_map().get(flag).copied()
}

/// 是否包含任意区域指示符号对（不管是否已知）
pub fn contains_regional_indicator_pair(text: &str) -> bool {
    regional_pair_regex().is_match(text)
}

/// 删除所有区域指示符号对
pub fn strip_flags(text: &str) -> String {
    regional_pair_regex().replace_all(text, "").into_owned()
}

/// 遍历完整映射表
pub fn flag_languages() -> impl Iterator<Item = (&'static str, &'static str)> {
    FLAG_LANGUAGES.iter().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_flag_decodes_to_itself() {
        for (flag, language) in FLAG_LANGUAGES {
            let text = format!("reaction {} by Maria", flag);
            assert_eq!(decode_flag(&text), Some(*flag));
            assert_eq!(flag_to_language(flag), Some(*language));
        }
    }

    #[test]
    fn test_flag_keys_are_unique() {
        assert_eq!(flag_map().len(), FLAG_LANGUAGES.len());
    }

    #[test]
    fn test_unknown_pair_is_skipped() {
        // 🇦🇶 (南极洲) 不在映射表中
        assert_eq!(decode_flag("🇦🇶"), None);
        assert_eq!(decode_flag("🇦🇶 then 🇫🇷"), Some("🇫🇷"));
        assert!(contains_regional_indicator_pair("🇦🇶"));
    }

    #[test]
    fn test_plain_text_has_no_flag() {
        assert_eq!(decode_flag("Hello there 👍"), None);
        assert_eq!(decode_flag(""), None);
    }

    #[test]
    fn test_many_to_one_languages() {
        assert_eq!(flag_to_language("🇲🇽"), Some("es"));
        assert_eq!(flag_to_language("🇦🇷"), Some("es"));
        assert_eq!(flag_to_language("🇪🇬"), Some("ar"));
        assert_eq!(flag_to_language("🇧🇷"), Some("pt-BR"));
    }

    #[test]
    fn test_decode_all_flags_dedupes() {
        assert_eq!(decode_all_flags("🇫🇷🇩🇪🇫🇷"), vec!["🇫🇷", "🇩🇪"]);
    }

    #[test]
    fn test_strip_flags() {
        assert_eq!(strip_flags("Hello 🇫🇷 world 🇦🇶"), "Hello  world ");
    }
}
