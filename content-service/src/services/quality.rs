//! Heuristic content quality scoring and template-based enhancement.
//!
//! Everything here is pure and synchronous. Content may be markdown or
//! HTML; both are recognised when counting headings, paragraphs and lists.

use crate::utils::{reading_time_minutes, word_count};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Sub-scores below this produce a suggestion.
pub const SUGGESTION_THRESHOLD: u8 = 70;

const TARGET_HEADINGS: usize = 3;
const TARGET_PARAGRAPHS: usize = 4;
const TARGET_WORDS: usize = 800;
const IDEAL_SENTENCE_WORDS: f64 = 20.0;
const LONG_SENTENCE_WORDS: usize = 30;
const KEYWORD_DENSITY_MIN: f64 = 0.5;
const KEYWORD_DENSITY_MAX: f64 = 2.5;
/// Second-person density (per cent) that earns the full engagement share.
const FULL_YOU_DENSITY: f64 = 2.0;

static MD_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ {0,3}#{1,6}[ \t]+(.+?)[ \t#]*$").expect("valid regex"));
static HTML_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h[1-6][^>]*>(.*?)</h[1-6]>").expect("valid regex"));
static HTML_PARAGRAPH_END: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</p>").expect("valid regex"));
static MD_LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").expect("valid regex"));
static HTML_LIST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(?:ul|ol)[\s>]").expect("valid regex"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</(?:p|li|div|blockquote)>|<br\s*/?>").expect("valid regex")
});
static MD_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid regex"));
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").expect("valid regex"));
static QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?(?:\s|$)").expect("valid regex"));
static CTA_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:contact us|schedule|book a|call us|get in touch)\b").expect("valid regex")
});
static SECOND_PERSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:you|your|yours|you're|you've|you'll)\b").expect("valid regex"));
static STATISTIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \d+(?:\.\d+)?\s?(?:%|percent\b)
        | [$£€]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:k|m|bn|thousand|million|billion)\b)?
        | \b\d[\d,.]*\s+(?:thousand|million|billion|trillion)\b
        ",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityReport {
    pub overall: u8,
    pub structure: u8,
    pub readability: u8,
    pub engagement: u8,
    pub authority: u8,
    pub word_count: usize,
    pub reading_time_minutes: i32,
    pub heading_count: usize,
    pub paragraph_count: usize,
    pub statistic_count: usize,
    pub suggestions: Vec<String>,
}

/// Score `content` on structure, readability, engagement and authority.
pub fn score_content(content: &str, focus_keyword: Option<&str>) -> QualityReport {
    let headings = heading_texts(content);
    let paragraphs = paragraph_count(content);
    let has_list = has_list(content);
    let text = plain_text(content);
    let words = word_count(&text);
    let sentences = sentences(&text);
    let statistic_count = STATISTIC.find_iter(&text).count();
    let keyword = focus_keyword.map(str::trim).filter(|k| !k.is_empty());

    let structure = structure_score(headings.len(), paragraphs, has_list);
    let readability = readability_score(&sentences);
    let engagement = engagement_score(&text, words);
    let authority = authority_score(&text, words, statistic_count, headings.len(), keyword);

    let overall = ((structure as f64 + readability as f64 + engagement as f64 + authority as f64)
        / 4.0)
        .round() as u8;

    let mut suggestions = Vec::new();
    if structure < SUGGESTION_THRESHOLD {
        if headings.len() < TARGET_HEADINGS {
            suggestions.push(format!(
                "Add {} more section heading(s) so readers can scan the article.",
                TARGET_HEADINGS - headings.len()
            ));
        }
        if paragraphs < TARGET_PARAGRAPHS {
            suggestions.push("Break the text into at least four short paragraphs.".to_string());
        }
        if !has_list {
            suggestions.push("Add a bulleted or numbered list for key steps or deadlines.".to_string());
        }
    }
    if readability < SUGGESTION_THRESHOLD {
        suggestions.push(format!(
            "Shorten sentences: aim for an average of {} words and avoid sentences over {}.",
            IDEAL_SENTENCE_WORDS as usize, LONG_SENTENCE_WORDS
        ));
    }
    if engagement < SUGGESTION_THRESHOLD {
        suggestions.push(
            "Speak to the reader directly, ask a question, and close with a clear call to action \
             such as scheduling a consultation."
                .to_string(),
        );
    }
    if authority < SUGGESTION_THRESHOLD {
        if statistic_count < 2 {
            suggestions.push("Support claims with figures: percentages, dollar amounts or deadlines.".to_string());
        }
        if words < TARGET_WORDS {
            suggestions.push(format!(
                "Expand the article toward {} words (currently {}).",
                TARGET_WORDS, words
            ));
        }
        if let Some(kw) = keyword {
            suggestions.push(format!(
                "Use the focus keyword \"{}\" in the first paragraph and keep its density between {}% and {}%.",
                kw, KEYWORD_DENSITY_MIN, KEYWORD_DENSITY_MAX
            ));
        }
    }

    QualityReport {
        overall,
        structure,
        readability,
        engagement,
        authority,
        word_count: words,
        reading_time_minutes: reading_time_minutes(&text),
        heading_count: headings.len(),
        paragraph_count: paragraphs,
        statistic_count,
        suggestions,
    }
}

fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn structure_score(headings: usize, paragraphs: usize, has_list: bool) -> u8 {
    let heading_pts = 40.0 * headings.min(TARGET_HEADINGS) as f64 / TARGET_HEADINGS as f64;
    let paragraph_pts = 30.0 * paragraphs.min(TARGET_PARAGRAPHS) as f64 / TARGET_PARAGRAPHS as f64;
    let list_pts = if has_list { 30.0 } else { 0.0 };
    clamp_score(heading_pts + paragraph_pts + list_pts)
}

fn readability_score(sentences: &[usize]) -> u8 {
    if sentences.is_empty() {
        return 0;
    }
    let total: usize = sentences.iter().sum();
    let avg = total as f64 / sentences.len() as f64;
    let base = if avg <= IDEAL_SENTENCE_WORDS {
        100.0
    } else {
        100.0 - 4.0 * (avg - IDEAL_SENTENCE_WORDS)
    };
    let long = sentences.iter().filter(|&&w| w > LONG_SENTENCE_WORDS).count();
    let long_penalty = 30.0 * long as f64 / sentences.len() as f64;
    clamp_score(base - long_penalty)
}

fn engagement_score(text: &str, words: usize) -> u8 {
    let questions = QUESTION.find_iter(text).count();
    let question_pts = (questions.min(3) * 10) as f64;
    let cta_pts = if CTA_PHRASE.is_match(text) { 40.0 } else { 0.0 };
    let you_pts = if words == 0 {
        0.0
    } else {
        let density = SECOND_PERSON.find_iter(text).count() as f64 / words as f64 * 100.0;
        (density / FULL_YOU_DENSITY * 30.0).min(30.0)
    };
    clamp_score(question_pts + cta_pts + you_pts)
}

fn authority_score(
    text: &str,
    words: usize,
    statistics: usize,
    headings: usize,
    keyword: Option<&str>,
) -> u8 {
    let stat_pts = (statistics.min(4) * 10) as f64;
    let length_pts = 30.0 * words.min(TARGET_WORDS) as f64 / TARGET_WORDS as f64;
    let seo_pts = match keyword {
        Some(kw) => keyword_points(text, words, kw),
        None if headings > 0 => 30.0,
        None => 15.0,
    };
    clamp_score(stat_pts + length_pts + seo_pts)
}

fn keyword_points(text: &str, words: usize, keyword: &str) -> f64 {
    let Ok(re) = Regex::new(&format!("(?i){}", regex::escape(keyword))) else {
        return 0.0;
    };
    let occurrences = standalone_matches(&re, text);
    if occurrences == 0 || words == 0 {
        return 0.0;
    }

    let in_first_paragraph = text
        .split("\n\n")
        .map(str::trim)
        .find(|block| !block.is_empty())
        .is_some_and(|first| standalone_matches(&re, first) > 0);
    let keyword_words = word_count(keyword).max(1);
    let density = (occurrences * keyword_words) as f64 / words as f64 * 100.0;

    if in_first_paragraph && (KEYWORD_DENSITY_MIN..=KEYWORD_DENSITY_MAX).contains(&density) {
        30.0
    } else {
        15.0
    }
}

/// Matches not glued to a word character on either side. Unlike `\b` this
/// also works for keywords that start or end with punctuation, such as
/// "401(k)" or "C++".
fn standalone_matches(re: &Regex, text: &str) -> usize {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    re.find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(is_word) && !after.is_some_and(is_word)
        })
        .count()
}

fn heading_texts(content: &str) -> Vec<String> {
    let mut headings: Vec<String> = MD_HEADING
        .captures_iter(content)
        .map(|c| c[1].trim().to_string())
        .collect();
    headings.extend(
        HTML_HEADING
            .captures_iter(content)
            .map(|c| HTML_TAG.replace_all(&c[1], "").trim().to_string()),
    );
    headings.retain(|h| !h.is_empty());
    headings
}

fn has_list(content: &str) -> bool {
    HTML_LIST.is_match(content) || content.lines().any(|l| MD_LIST_ITEM.is_match(l))
}

/// A markdown block that is running prose rather than a heading, list,
/// quote or raw HTML.
fn is_prose_block(block: &str) -> bool {
    let first = block.trim_start();
    !first.is_empty()
        && !first.starts_with('#')
        && !first.starts_with('>')
        && !first.starts_with('<')
        && !first.starts_with("```")
        && !MD_LIST_ITEM.is_match(first)
        && word_count(first) > 0
}

/// Byte offsets just past the end of each paragraph, in order.
fn paragraph_ends(content: &str) -> Vec<usize> {
    let mut ends: Vec<usize> = HTML_PARAGRAPH_END.find_iter(content).map(|m| m.end()).collect();

    let mut offset = 0;
    for block in content.split("\n\n") {
        if is_prose_block(block) {
            ends.push(offset + block.trim_end().len());
        }
        offset += block.len() + 2;
    }

    ends.sort_unstable();
    ends.dedup();
    ends
}

fn paragraph_count(content: &str) -> usize {
    paragraph_ends(content).len()
}

/// Strip markup down to prose: headings dropped, list markers and links
/// unwrapped, one block per paragraph or list item.
fn plain_text(content: &str) -> String {
    let without_headings = HTML_HEADING.replace_all(content, "\n\n");
    let block_breaks = BLOCK_BREAK.replace_all(&without_headings, "\n\n");
    let untagged = HTML_TAG.replace_all(&block_breaks, " ");
    let unlinked = MD_LINK.replace_all(&untagged, "$1");

    fn flush(current: &mut Vec<&str>, blocks: &mut Vec<String>) {
        if !current.is_empty() {
            blocks.push(current.join(" "));
            current.clear();
        }
    }

    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in unlinked.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("```") {
            flush(&mut current, &mut blocks);
        } else if MD_HEADING.is_match(trimmed) {
            flush(&mut current, &mut blocks);
        } else if let Some(m) = MD_LIST_ITEM.find(trimmed) {
            flush(&mut current, &mut blocks);
            blocks.push(trimmed[m.end()..].to_string());
        } else {
            current.push(trimmed.trim_start_matches('>').trim());
        }
    }
    flush(&mut current, &mut blocks);

    blocks.join("\n\n")
}

/// Word counts of each sentence in `text`.
fn sentences(text: &str) -> Vec<usize> {
    text.split("\n\n")
        .flat_map(|block| SENTENCE_END.split(block))
        .map(word_count)
        .filter(|&w| w > 0)
        .collect()
}

/// Topic family used to pick call-to-action wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaTopic {
    Tax,
    Bookkeeping,
    Advisory,
    General,
}

impl CtaTopic {
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("tax") {
            Self::Tax
        } else if lower.contains("bookkeeping") || lower.contains("payroll") {
            Self::Bookkeeping
        } else if ["advisory", "cash flow", "business plan", "growth", "strategy"]
            .iter()
            .any(|k| lower.contains(k))
        {
            Self::Advisory
        } else {
            Self::General
        }
    }

    fn pitch(&self) -> &'static str {
        match self {
            Self::Tax => "Tax rules change every year, and the right plan can lower what you owe.",
            Self::Bookkeeping => {
                "Clean books and on-time payroll free you to focus on running the business."
            }
            Self::Advisory => "A second set of eyes on your numbers can sharpen every decision you make.",
            Self::General => "Every business is different, and a short conversation can clarify your next step.",
        }
    }

    fn service(&self) -> &'static str {
        match self {
            Self::Tax => "tax planning",
            Self::Bookkeeping => "bookkeeping and payroll",
            Self::Advisory => "business advisory",
            Self::General => "accounting",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnhanceOptions {
    /// Overrides topic detection from the content itself.
    #[serde(default)]
    pub topic: Option<String>,
    pub firm_name: String,
    pub consultation_url: String,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub add_key_takeaways: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertedKind {
    MidCta,
    ClosingCta,
    KeyTakeaways,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertedBlock {
    pub kind: InsertedKind,
    /// Number of paragraphs preceding the block; `None` when appended at the end.
    pub paragraph_offset: Option<usize>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Enhancement {
    pub content: String,
    pub topic: CtaTopic,
    pub inserted: Vec<InsertedBlock>,
    pub before: QualityReport,
    pub after: QualityReport,
}

fn is_html(content: &str) -> bool {
    HTML_PARAGRAPH_END.is_match(content)
}

fn mid_cta(topic: CtaTopic, opts: &EnhanceOptions, html: bool) -> String {
    let text = format!(
        "Not sure how this applies to you? {} {} can help. Schedule a consultation",
        topic.pitch(),
        opts.firm_name
    );
    if html {
        format!(
            "<blockquote class=\"cta\"><p><strong>{}</strong>: <a href=\"{}\">book a time here</a>.</p></blockquote>",
            text, opts.consultation_url
        )
    } else {
        format!("> **{}**: [book a time here]({}).", text, opts.consultation_url)
    }
}

fn closing_cta(topic: CtaTopic, opts: &EnhanceOptions, html: bool) -> String {
    let phone = opts
        .contact_phone
        .as_deref()
        .map(|p| format!(" or call us at {}", p))
        .unwrap_or_default();
    let body = format!(
        "{} The {} team at {} works with businesses like yours every day.",
        topic.pitch(),
        topic.service(),
        opts.firm_name
    );
    if html {
        format!(
            "<h2>Ready to talk?</h2>\n<p>{} <a href=\"{}\">Book a consultation</a>{}.</p>",
            body, opts.consultation_url, phone
        )
    } else {
        format!(
            "## Ready to talk?\n\n{} [Book a consultation]({}){}.",
            body, opts.consultation_url, phone
        )
    }
}

fn key_takeaways(headings: &[String], html: bool) -> String {
    if html {
        let items: String = headings.iter().map(|h| format!("<li>{}</li>", h)).collect();
        format!("<h2>Key Takeaways</h2>\n<ul>{}</ul>", items)
    } else {
        let items: Vec<String> = headings.iter().map(|h| format!("- {}", h)).collect();
        format!("## Key Takeaways\n\n{}", items.join("\n"))
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Insert call-to-action blocks (and optionally a takeaways list) and
/// report the score before and after.
pub fn auto_enhance(content: &str, opts: &EnhanceOptions) -> Enhancement {
    let keyword = opts.focus_keyword.as_deref();
    let before = score_content(content, keyword);
    let topic = CtaTopic::detect(opts.topic.as_deref().unwrap_or(content));
    let html = is_html(content);
    let separator = if html { "\n" } else { "\n\n" };

    let ends = paragraph_ends(content);
    let mut inserted = Vec::new();

    // The mid-article block goes after the first floor(n / 2) paragraphs.
    let (split, mid_offset) = if ends.len() >= TARGET_PARAGRAPHS {
        let offset = ends.len() / 2;
        (ends[offset - 1], Some(offset))
    } else {
        (floor_char_boundary(content, content.len() / 2), None)
    };
    let (first_half, second_half) = content.split_at(split);

    let mut result = String::with_capacity(content.len() + 1024);
    result.push_str(first_half);

    if let Some(offset) = mid_offset {
        if !CTA_PHRASE.is_match(first_half) {
            let block = mid_cta(topic, opts, html);
            result.push_str(separator);
            result.push_str(&block);
            inserted.push(InsertedBlock {
                kind: InsertedKind::MidCta,
                paragraph_offset: Some(offset),
                text: block,
            });
        }
    }

    result.push_str(second_half);
    let trimmed_len = result.trim_end().len();
    result.truncate(trimmed_len);

    let headings = heading_texts(content);
    let already_has_takeaways = headings.iter().any(|h| h.eq_ignore_ascii_case("key takeaways"));
    if opts.add_key_takeaways && headings.len() >= 2 && !already_has_takeaways {
        let block = key_takeaways(&headings, html);
        result.push_str(separator);
        result.push_str(&block);
        inserted.push(InsertedBlock {
            kind: InsertedKind::KeyTakeaways,
            paragraph_offset: None,
            text: block,
        });
    }

    if !CTA_PHRASE.is_match(second_half) {
        let block = closing_cta(topic, opts, html);
        result.push_str(separator);
        result.push_str(&block);
        inserted.push(InsertedBlock {
            kind: InsertedKind::ClosingCta,
            paragraph_offset: None,
            text: block,
        });
    }

    let after = score_content(&result, keyword);

    tracing::debug!(
        ?topic,
        inserted = inserted.len(),
        before = before.overall,
        after = after.overall,
        "Content enhanced"
    );

    Enhancement {
        content: result,
        topic,
        inserted,
        before,
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE: &str = "\
## Why quarterly taxes matter

If you run a small business, you probably pay estimated taxes four times a year. Missing one can cost you.

## What the penalty looks like

The IRS charges roughly 8% a year on underpayments. On a $40,000 bill that adds up fast.

## How to stay ahead

- Set aside 25% of every invoice
- Calendar the deadlines
- Review your estimate each quarter

Do you know your next due date? Most owners do not.

Planning ahead keeps your cash flow steady and your stress low.";

    fn options() -> EnhanceOptions {
        EnhanceOptions {
            topic: None,
            firm_name: "Ledger & Co".into(),
            consultation_url: "https://firm.example/contact".into(),
            contact_phone: None,
            focus_keyword: None,
            add_key_takeaways: false,
        }
    }

    #[test]
    fn all_scores_are_bounded_and_overall_is_the_mean() {
        for content in [ARTICLE, "", "One.", &"word ".repeat(5000), "<h1>x</h1><p>y</p>"] {
            let r = score_content(content, Some("taxes"));
            for s in [r.structure, r.readability, r.engagement, r.authority, r.overall] {
                assert!(s <= 100);
            }
            let mean = (r.structure as f64 + r.readability as f64 + r.engagement as f64
                + r.authority as f64)
                / 4.0;
            assert_eq!(r.overall, mean.round() as u8);
        }
    }

    #[test]
    fn empty_content_scores_zero_readability() {
        let r = score_content("", None);
        assert_eq!(r.readability, 0);
        assert_eq!(r.word_count, 0);
        assert_eq!(r.reading_time_minutes, 1);
    }

    #[test]
    fn structure_counts_headings_paragraphs_and_lists() {
        let r = score_content(ARTICLE, None);
        assert_eq!(r.heading_count, 3);
        assert_eq!(r.paragraph_count, 4);
        assert_eq!(r.structure, 100);
    }

    #[test]
    fn html_structure_is_recognised() {
        let html = "<h2>One</h2><p>First.</p><h2>Two</h2><p>Second.</p><ul><li>a</li></ul>";
        let r = score_content(html, None);
        assert_eq!(r.heading_count, 2);
        assert_eq!(r.paragraph_count, 2);
        // 40 * 2/3 + 30 * 2/4 + 30
        assert_eq!(r.structure, 72);
    }

    #[test]
    fn long_sentences_lower_readability() {
        let short = "This is short. So is this one. Easy to read.";
        let long = format!("{}.", "word ".repeat(45));
        assert_eq!(score_content(short, None).readability, 100);
        // avg 45 words: 100 - 4 * 25 = 0, minus the long penalty, clamped
        assert_eq!(score_content(&long, None).readability, 0);
    }

    #[test]
    fn engagement_rewards_questions_cta_and_second_person() {
        let flat = score_content("The report was filed. The numbers were final.", None);
        let engaging = score_content(
            "Are you ready for tax season? Your books matter. Contact us today.",
            None,
        );
        assert_eq!(flat.engagement, 0);
        assert!(engaging.engagement >= 80);
    }

    #[test]
    fn statistics_are_detected() {
        let r = score_content("Rates rose 8% while fees hit $1,200 and 3 million filers waited.", None);
        assert_eq!(r.statistic_count, 3);
    }

    #[test]
    fn keyword_in_first_paragraph_at_good_density_scores_full_seo_points() {
        let filler = "plain words here ".repeat(30);
        let content = format!("Payroll basics for owners.\n\n{}", filler);
        // 1 keyword in ~94 words: about 1.06%
        let with = score_content(&content, Some("payroll"));
        let missing = score_content(&content, Some("bookkeeping"));
        assert_eq!(with.authority - missing.authority, 30);
    }

    #[test]
    fn keyword_outside_first_paragraph_gets_partial_credit() {
        let filler = "plain words here ".repeat(30);
        let content = format!("{}\n\nPayroll is covered later.", filler);
        let late = score_content(&content, Some("payroll"));
        let missing = score_content(&content, Some("bookkeeping"));
        assert_eq!(late.authority - missing.authority, 15);
    }

    #[test]
    fn punctuated_keywords_are_found() {
        let filler = "plain words here ".repeat(30);
        for keyword in ["401(k)", "C++"] {
            let content = format!("Review your {} plan.\n\n{}", keyword, filler);
            let with = score_content(&content, Some(keyword));
            let missing = score_content(&content, Some("bookkeeping"));
            assert_eq!(with.authority - missing.authority, 30, "{keyword}");
        }
    }

    #[test]
    fn keyword_inside_a_longer_word_does_not_count() {
        let filler = "plain words here ".repeat(30);
        let content = format!("Payrolls grow.\n\n{}", filler);
        let glued = score_content(&content, Some("payroll"));
        let missing = score_content(&content, Some("bookkeeping"));
        assert_eq!(glued.authority, missing.authority);
    }

    #[test]
    fn low_scores_produce_suggestions() {
        let r = score_content("Short note.", None);
        assert!(r.structure < SUGGESTION_THRESHOLD);
        assert!(!r.suggestions.is_empty());
    }

    #[test]
    fn topic_detection_prefers_tax_then_bookkeeping() {
        assert_eq!(CtaTopic::detect("Tax and payroll deadlines"), CtaTopic::Tax);
        assert_eq!(CtaTopic::detect("Payroll made simple"), CtaTopic::Bookkeeping);
        assert_eq!(CtaTopic::detect("Cash flow forecasting"), CtaTopic::Advisory);
        assert_eq!(CtaTopic::detect("Welcome to our blog"), CtaTopic::General);
    }

    #[test]
    fn inserts_mid_and_closing_cta() {
        let result = auto_enhance(ARTICLE, &options());
        let kinds: Vec<InsertedKind> = result.inserted.iter().map(|b| b.kind).collect();

        assert_eq!(kinds, vec![InsertedKind::MidCta, InsertedKind::ClosingCta]);
        assert_eq!(result.inserted[0].paragraph_offset, Some(2));
        assert_eq!(result.topic, CtaTopic::Tax);
        assert!(result.content.trim_end().ends_with("(https://firm.example/contact)."));
        assert!(result.after.engagement >= result.before.engagement);
    }

    #[test]
    fn mid_cta_follows_the_middle_paragraph() {
        let result = auto_enhance(ARTICLE, &options());
        let mid = result.content.find("> **Not sure").unwrap();
        let third_paragraph = result.content.find("Set aside").unwrap();
        let second_paragraph = result.content.find("adds up fast.").unwrap();
        assert!(second_paragraph < mid && mid < third_paragraph);
    }

    #[test]
    fn existing_closing_cta_is_not_duplicated() {
        let content = format!("{}\n\nGet in touch to review your estimates.", ARTICLE);
        let result = auto_enhance(&content, &options());
        assert!(result.inserted.iter().all(|b| b.kind != InsertedKind::ClosingCta));
    }

    #[test]
    fn short_content_gets_only_a_closing_cta() {
        let result = auto_enhance("A single paragraph about bookkeeping.", &options());
        assert_eq!(result.inserted.len(), 1);
        assert_eq!(result.inserted[0].kind, InsertedKind::ClosingCta);
        assert_eq!(result.topic, CtaTopic::Bookkeeping);
    }

    #[test]
    fn key_takeaways_list_headings() {
        let opts = EnhanceOptions {
            add_key_takeaways: true,
            contact_phone: Some("555-0100".into()),
            ..options()
        };
        let result = auto_enhance(ARTICLE, &opts);
        assert!(result.content.contains("## Key Takeaways\n\n- Why quarterly taxes matter"));
        assert!(result.content.contains("call us at 555-0100"));
        assert!(result
            .inserted
            .iter()
            .any(|b| b.kind == InsertedKind::KeyTakeaways));
    }

    #[test]
    fn html_content_gets_html_blocks() {
        let html = "<p>One about tax.</p><p>Two.</p><p>Three.</p><p>Four.</p>";
        let result = auto_enhance(html, &options());
        assert!(result.content.contains("<blockquote class=\"cta\">"));
        assert!(result.content.contains("<h2>Ready to talk?</h2>"));
    }
}
