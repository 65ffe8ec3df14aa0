//! Small text helpers shared by the generator, scorer and models.

/// Words per minute used for reading-time estimates.
pub const WORDS_PER_MINUTE: usize = 200;

/// Whitespace-delimited word count, ignoring markup-only tokens such as
/// `##`, `-` or `*`.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|w| w.chars().any(|c| c.is_alphanumeric()))
        .count()
}

/// `max(1, ceil(words / 200))`.
pub fn reading_time_minutes(text: &str) -> i32 {
    let words = word_count(text);
    words.div_ceil(WORDS_PER_MINUTE).max(1) as i32
}

/// Truncate to at most `max_chars` characters, cutting on a word boundary
/// and appending `suffix` when anything was removed. The suffix counts
/// toward the limit.
pub fn truncate_on_word(text: &str, max_chars: usize, suffix: &str) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let suffix_len = suffix.chars().count();
    if max_chars <= suffix_len {
        return text.chars().take(max_chars).collect();
    }

    let budget = max_chars - suffix_len;
    let mut cut = String::new();
    for word in text.split_whitespace() {
        let needed = if cut.is_empty() {
            word.chars().count()
        } else {
            cut.chars().count() + 1 + word.chars().count()
        };
        if needed > budget {
            break;
        }
        if !cut.is_empty() {
            cut.push(' ');
        }
        cut.push_str(word);
    }

    if cut.is_empty() {
        // A single word longer than the budget: hard cut.
        cut = text.chars().take(budget).collect();
    }

    let cut = cut.trim_end_matches([',', ';', ':', '.', '-']);
    format!("{}{}", cut, suffix)
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_skips_markup() {
        assert_eq!(word_count("## Heading\n\n- item one\n- item two"), 5);
        assert_eq!(word_count("   "), 0);
    }

    #[test]
    fn reading_time_has_floor_of_one_minute() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes("word"), 1);
        let long = "word ".repeat(401);
        assert_eq!(reading_time_minutes(&long), 3);
    }

    #[test]
    fn truncate_keeps_short_text() {
        assert_eq!(truncate_on_word("short text", 20, "…"), "short text");
    }

    #[test]
    fn truncate_cuts_on_word_boundary() {
        let out = truncate_on_word("Quarterly estimated taxes are due soon", 24, "…");
        assert_eq!(out, "Quarterly estimated…");
        assert!(out.chars().count() <= 24);
    }

    #[test]
    fn truncate_hard_cuts_single_long_word() {
        let out = truncate_on_word("Supercalifragilistic", 10, "");
        assert_eq!(out, "Supercalif");
    }

    #[test]
    fn truncate_never_exceeds_a_limit_smaller_than_the_suffix() {
        assert_eq!(truncate_on_word("Estimated taxes", 0, "..."), "");
        assert_eq!(truncate_on_word("Estimated taxes", 2, "..."), "Es");
        let out = truncate_on_word("Estimated taxes", 4, "...");
        assert!(out.chars().count() <= 4, "{out}");
    }

    #[test]
    fn escapes_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }
}
