//! 文本净化工具
//!
//! TTS 引擎只接受纯英文输入，页面提取出的 HTML 也需要还原成纯文本，
//! 这里集中放置这两类清洗函数。

use regex::Regex;
use std::sync::OnceLock;

/// 特殊标点替换表：全角/排版符号折叠为 ASCII
const PUNCT_REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{2014}", "-"),   // EM DASH
    ("\u{2013}", "-"),   // EN DASH
    ("\u{2026}", "..."), // HORIZONTAL ELLIPSIS
    ("\u{300c}", "\""),
    ("\u{300d}", "\""),
    ("\u{300e}", "\""),
    ("\u{300f}", "\""),
    ("\u{300a}", "\""),
    ("\u{300b}", "\""),
    ("\u{3008}", "'"),
    ("\u{3009}", "'"),
    ("\u{201c}", "\""),
    ("\u{201d}", "\""),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("`", "'"),
    ("\u{00b4}", "'"),
    ("\u{2032}", "'"),
    ("\u{2033}", "\""),
];

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[^a-zA-Z0-9\s.,?!'"():;-]"#).unwrap())
}

fn whitespace_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn html_tags() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// 为纯英文 TTS 引擎净化文本
///
/// 1. 折叠特殊标点
/// 2. 白名单过滤：只保留英文、数字和常用标点
/// 3. 压缩空白
pub fn clean_for_tts(text: &str) -> String {
    let mut cleaned = text.to_string();
    for (from, to) in PUNCT_REPLACEMENTS {
        if cleaned.contains(from) {
            cleaned = cleaned.replace(from, to);
        }
    }
    let cleaned = disallowed_chars().replace_all(&cleaned, "");
    whitespace_runs().replace_all(&cleaned, " ").trim().to_string()
}

/// 去掉 HTML 标签，保留文本内容
pub fn strip_html_tags(html: &str) -> String {
    let text = html_tags().replace_all(html, "");
    whitespace_runs().replace_all(&text, " ").trim().to_string()
}

/// 还原常见 HTML 实体
pub fn unescape_html(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_for_tts_folds_punctuation() {
        assert_eq!(
            clean_for_tts("It\u{2019}s a \u{201c}test\u{201d} \u{2014} really\u{2026}"),
            "It's a \"test\" - really..."
        );
    }

    #[test]
    fn test_clean_for_tts_drops_non_english() {
        assert_eq!(clean_for_tts("Hello 世界 world"), "Hello world");
    }

    #[test]
    fn test_clean_for_tts_collapses_whitespace() {
        assert_eq!(clean_for_tts("a \n\t b"), "a b");
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(
            strip_html_tags("<p>Hello <b>world</b></p>"),
            "Hello world"
        );
    }

    #[test]
    fn test_unescape_html() {
        assert_eq!(unescape_html("a &amp; b &nbsp;c"), "a & b  c");
    }
}
