//! Feedback extraction.
//!
//! The coaching analysis comes back as one long, loosely formatted text. This
//! module slices it into the four report sections by locating headings, and
//! decorates each section for display. Extraction is best effort: a section
//! that cannot be found yields its fixed placeholder, never an error.
//!
//! The strength/improvement split is positional (first half vs. second half of
//! the items), not a semantic classification of each item.

use regex::{Captures, Regex};
use serde::Serialize;
use std::sync::LazyLock;

/// `<h1>`..`<h6>` elements, capturing the inner markup.
static HEADING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h[1-6]\b[^>]*>(.*?)</h[1-6]\s*>").expect("valid heading tag regex")
});

/// Opening of any heading tag; used to find where a section ends.
static HEADING_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h[1-6]\b").expect("valid heading open regex"));

/// A line that reads as a heading: `## Title`, `**Title**`, `<strong>Title</strong>`
/// or a short plain `Title:` standing alone.
static HEADING_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^[ \t]*(?:#{1,6}[ \t]+(?P<md>[^\n]+?)[ \t#]*|\*\*(?P<bold>[^\n*]+?)\*\*:?|(?:<p>)?<(?:strong|b)>(?P<tag>[^\n<]+?)</(?:strong|b)>:?(?:</p>)?|(?P<plain>[A-Za-z][A-Za-z &/-]{0,60}):)[ \t\r]*$",
    )
    .expect("valid heading line regex")
});

/// A leading ```` ```lang ```` line and a trailing ```` ``` ```` around the whole answer.
static FENCE_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A\s*```[A-Za-z0-9_+-]*[ \t]*\r?\n").expect("valid fence open regex")
});

static FENCE_CLOSE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?[ \t]*```\s*\z").expect("valid fence close regex"));

static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)(\s*/\s*10|\s*out of\s*10)").expect("valid score regex")
});

/// Opening `<li>` and `<p>` tags, capturing the attributes.
static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(li|p)\b([^>]*)>").expect("valid item regex"));

static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bclass\s*=\s*"([^"]*)""#).expect("valid class attribute regex")
});

/// The four report sections, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Metrics,
    KeyMoments,
    Strengths,
    Recommendations,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Metrics,
        Section::KeyMoments,
        Section::Strengths,
        Section::Recommendations,
    ];

    /// Lowercase keyword a heading must contain to open this section.
    pub fn keyword(self) -> &'static str {
        match self {
            Section::Metrics => "metrics",
            Section::KeyMoments => "key moments",
            Section::Strengths => "strengths",
            Section::Recommendations => "recommendations",
        }
    }

    /// Fixed text used when the section cannot be found.
    pub fn placeholder(self) -> &'static str {
        match self {
            Section::Metrics => "<p>No metrics available</p>",
            Section::KeyMoments => "<p>No key moments identified</p>",
            Section::Strengths => "<p>No feedback available</p>",
            Section::Recommendations => "<p>No recommendations available</p>",
        }
    }
}

/// Display class attached to a list or paragraph item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Strength,
    Improvement,
    Recommendation,
}

impl ItemKind {
    pub fn class(self) -> &'static str {
        match self {
            ItemKind::Strength => "strength",
            ItemKind::Improvement => "improvement",
            ItemKind::Recommendation => "recommendation",
        }
    }
}

/// Structured coaching feedback for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    pub transcript: String,
    pub metrics: String,
    pub key_moments: String,
    pub strengths: String,
    pub recommendations: String,
}

impl FeedbackReport {
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = transcript.into();
        self
    }
}

/// Splits a generated analysis into a report. The transcript is left empty.
pub fn extract(raw_text: &str) -> FeedbackReport {
    let section = |s: Section, decorate: fn(&str) -> String| {
        extract_section(raw_text, s)
            .map(|body| decorate(&body))
            .unwrap_or_else(|| s.placeholder().to_string())
    };

    FeedbackReport {
        transcript: String::new(),
        metrics: section(Section::Metrics, highlight_scores),
        key_moments: section(Section::KeyMoments, str::to_string),
        strengths: section(Section::Strengths, tag_strengths),
        recommendations: section(Section::Recommendations, tag_recommendations),
    }
}

/// Returns the trimmed, undecorated body of `section`, if a heading for it is found.
///
/// Explicit heading tags are tried first, then heading-looking lines. The first
/// matching heading wins and the first strategy with a non-empty body wins.
pub fn extract_section(raw_text: &str, section: Section) -> Option<String> {
    let keyword = section.keyword();
    let text = strip_code_fence(raw_text);
    STRATEGIES
        .into_iter()
        .filter_map(|strategy| strategy(text, keyword))
        .map(|body| body.trim().to_string())
        .find(|body| !body.is_empty())
}

/// Removes one Markdown code fence wrapping the answer, if present.
pub fn strip_code_fence(raw_text: &str) -> &str {
    let start = FENCE_OPEN_RE.find(raw_text).map_or(0, |m| m.end());
    let body = &raw_text[start..];
    let end = FENCE_CLOSE_RE.find(body).map_or(body.len(), |m| m.start());
    &body[..end]
}

/// A way of locating a section body given its keyword.
type Strategy = for<'a> fn(&'a str, &str) -> Option<&'a str>;

const STRATEGIES: [Strategy; 2] = [by_heading_tag, by_heading_line];

fn heading_mentions(heading: &str, keyword: &str) -> bool {
    MARKUP_RE
        .replace_all(heading, "")
        .to_lowercase()
        .contains(keyword)
}

fn by_heading_tag<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let heading = HEADING_TAG_RE
        .captures_iter(text)
        .find(|caps| heading_mentions(&caps[1], keyword))?;
    let start = heading.get(0)?.end();
    let end = HEADING_OPEN_RE
        .find_at(text, start)
        .map_or(text.len(), |m| m.start());
    Some(&text[start..end])
}

fn by_heading_line<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let heading = HEADING_LINE_RE.captures_iter(text).find(|caps| {
        ["md", "bold", "tag", "plain"]
            .iter()
            .filter_map(|name| caps.name(name))
            .any(|m| heading_mentions(m.as_str(), keyword))
    })?;
    let start = heading.get(0)?.end();
    let next_line = HEADING_LINE_RE
        .find_at(text, start)
        .map_or(text.len(), |m| m.start());
    let next_tag = HEADING_OPEN_RE
        .find_at(text, start)
        .map_or(text.len(), |m| m.start());
    Some(&text[start..next_line.min(next_tag)])
}

/// Wraps every `n/10` or `n out of 10` score in a `metric-score` span.
pub fn highlight_scores(html: &str) -> String {
    SCORE_RE
        .replace_all(html, r#"<span class="metric-score">${1}/10</span>"#)
        .into_owned()
}

/// Kinds for `count` strength-section items: the first `count / 2` (floor) are
/// strengths, the remainder improvements.
pub fn strength_partition(count: usize) -> Vec<ItemKind> {
    let strengths = count / 2;
    (0..count)
        .map(|i| {
            if i < strengths {
                ItemKind::Strength
            } else {
                ItemKind::Improvement
            }
        })
        .collect()
}

/// Tags `<li>`/`<p>` items positionally as strengths, then improvements.
pub fn tag_strengths(html: &str) -> String {
    let kinds = strength_partition(ITEM_RE.find_iter(html).count());
    tag_items(html, |index| kinds[index])
}

/// Tags every `<li>`/`<p>` item as a recommendation.
pub fn tag_recommendations(html: &str) -> String {
    tag_items(html, |_| ItemKind::Recommendation)
}

fn tag_items(html: &str, kind_of: impl Fn(usize) -> ItemKind) -> String {
    let mut index = 0;
    ITEM_RE
        .replace_all(html, |caps: &Captures| {
            let class = kind_of(index).class();
            index += 1;
            let (tag, attrs) = (&caps[1], &caps[2]);
            if CLASS_ATTR_RE.is_match(attrs) {
                let attrs = CLASS_ATTR_RE.replace(attrs, |c: &Captures| {
                    format!(r#"class="{} {class}""#, &c[1])
                });
                format!("<{tag}{attrs}>")
            } else {
                format!(r#"<{tag}{attrs} class="{class}">"#)
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ANALYSIS: &str = r#"<h3>Performance Metrics</h3>
<p>Rapport: 7/10. Needs discovery: 5 out of 10.</p>
<h3>Key Moments</h3>
<ul><li>Opened with a question about downtime.</li></ul>
<h3>Strengths and Areas for Improvement</h3>
<ul>
<li>Clear value statement</li>
<li>Good listening</li>
<li>Rushed the close</li>
<li>Ignored the budget objection</li>
</ul>
<h3>Recommendations</h3>
<ul><li>Ask for the meeting explicitly.</li><li>Quantify ROI.</li></ul>"#;

    #[test]
    fn test_extracts_all_sections_from_heading_tags() {
        let report = extract(FULL_ANALYSIS);

        assert_eq!(
            report.metrics,
            r#"<p>Rapport: <span class="metric-score">7/10</span>. Needs discovery: <span class="metric-score">5/10</span>.</p>"#
        );
        assert_eq!(
            report.key_moments,
            "<ul><li>Opened with a question about downtime.</li></ul>"
        );
        assert_eq!(
            report.strengths,
            "<ul>\n<li class=\"strength\">Clear value statement</li>\n<li class=\"strength\">Good listening</li>\n<li class=\"improvement\">Rushed the close</li>\n<li class=\"improvement\">Ignored the budget objection</li>\n</ul>"
        );
        assert_eq!(
            report.recommendations,
            r#"<ul><li class="recommendation">Ask for the meeting explicitly.</li><li class="recommendation">Quantify ROI.</li></ul>"#
        );
        assert!(report.transcript.is_empty());
    }

    #[test]
    fn test_metrics_body_is_trimmed_exactly() {
        let text = "## Performance Metrics\n\n  Solid opening, weak close.  \n\n## Key Moments\nNone.";
        assert_eq!(
            extract_section(text, Section::Metrics).as_deref(),
            Some("Solid opening, weak close.")
        );
        assert_eq!(extract(text).metrics, "Solid opening, weak close.");
    }

    #[test]
    fn test_heading_match_is_case_insensitive() {
        let text = "<H2 class=\"title\">PERFORMANCE <em>METRICS</em></H2>\nAll good.";
        assert_eq!(extract_section(text, Section::Metrics).as_deref(), Some("All good."));
    }

    #[test]
    fn test_missing_sections_use_placeholders() {
        let report = extract("The salesperson did fine overall.");
        assert_eq!(report.metrics, "<p>No metrics available</p>");
        assert_eq!(report.key_moments, "<p>No key moments identified</p>");
        assert_eq!(report.strengths, "<p>No feedback available</p>");
        assert_eq!(report.recommendations, "<p>No recommendations available</p>");
    }

    #[test]
    fn test_empty_section_falls_back_to_next_strategy_then_placeholder() {
        // The tag heading has no body; the bold heading line does.
        let text = "<h3>Key Moments</h3>\n<h3>Other</h3>\n**Key Moments**\nThe pricing pivot.";
        assert_eq!(
            extract_section(text, Section::KeyMoments).as_deref(),
            Some("The pricing pivot.")
        );

        let empty = "<h3>Recommendations</h3>   <h3>Done</h3>";
        assert_eq!(extract(empty).recommendations, Section::Recommendations.placeholder());
    }

    #[test]
    fn test_first_heading_wins() {
        let text = "<h3>Key Moments</h3>first<h3>Key Moments</h3>second";
        assert_eq!(extract_section(text, Section::KeyMoments).as_deref(), Some("first"));
    }

    #[test]
    fn test_bold_and_strong_heading_lines() {
        let text = "**Recommendations:**\n- Follow up Friday\n\n<p><strong>Strengths</strong></p>\n<p>Warm tone</p>";
        assert_eq!(
            extract_section(text, Section::Recommendations).as_deref(),
            Some("- Follow up Friday")
        );
        assert_eq!(
            extract_section(text, Section::Strengths).as_deref(),
            Some("<p>Warm tone</p>")
        );
    }

    #[test]
    fn test_highlight_scores_every_occurrence() {
        assert_eq!(
            highlight_scores("Rapport 7/10, closing 7 out of 10, discovery 8 / 10"),
            r#"Rapport <span class="metric-score">7/10</span>, closing <span class="metric-score">7/10</span>, discovery <span class="metric-score">8/10</span>"#
        );
        assert_eq!(highlight_scores("no scores here"), "no scores here");
    }

    #[test]
    fn test_strength_partition_uses_floor() {
        use ItemKind::*;
        assert!(strength_partition(0).is_empty());
        assert_eq!(strength_partition(1), vec![Improvement]);
        assert_eq!(strength_partition(3), vec![Strength, Improvement, Improvement]);
        assert_eq!(strength_partition(4), vec![Strength, Strength, Improvement, Improvement]);
    }

    #[test]
    fn test_tag_strengths_without_items_is_unchanged() {
        assert_eq!(tag_strengths("Nothing to list."), "Nothing to list.");
    }

    #[test]
    fn test_tagging_extends_existing_class_and_skips_pre() {
        let html = r#"<p class="lead">Good</p><pre>code</pre><li id="x">Bad</li>"#;
        assert_eq!(
            tag_strengths(html),
            r#"<p class="lead strength">Good</p><pre>code</pre><li id="x" class="improvement">Bad</li>"#
        );
    }

    #[test]
    fn test_placeholders_are_not_decorated() {
        let report = extract("<h3>Performance Metrics</h3>   ");
        assert_eq!(report.strengths, "<p>No feedback available</p>");
        assert_eq!(report.metrics, "<p>No metrics available</p>");
    }

    #[test]
    fn test_fenced_answer_does_not_leak_into_last_section() {
        let fenced = format!("```html\n{}\n```", FULL_ANALYSIS);
        let report = extract(&fenced);

        assert_eq!(report, extract(FULL_ANALYSIS));
        assert!(!report.recommendations.contains("```"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>\n```"), "<p>x</p>");
        assert_eq!(strip_code_fence("```\r\n<p>x</p>\r\n```\n"), "<p>x</p>");
        assert_eq!(strip_code_fence("<p>x</p>"), "<p>x</p>");
        assert_eq!(
            strip_code_fence("<p>x</p>\n```js\ncode\n```\n<p>y</p>"),
            "<p>x</p>\n```js\ncode\n```\n<p>y</p>"
        );
    }

    #[test]
    fn test_plain_colon_heading_lines() {
        let text = "Performance Metrics:\nRapport: 6/10\n\nKey Moments:\nStrong opener.\n";
        let report = extract(text);

        assert_eq!(report.metrics, r#"Rapport: <span class="metric-score">6/10</span>"#);
        assert_eq!(report.key_moments, "Strong opener.");
        assert_eq!(report.recommendations, Section::Recommendations.placeholder());
    }

    #[test]
    fn test_with_transcript() {
        let report = extract("").with_transcript("User: hi\n\n");
        assert_eq!(report.transcript, "User: hi\n\n");
    }
}
