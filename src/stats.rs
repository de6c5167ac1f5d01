use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}_]+").expect("valid word regex"));
static TEXT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p, h1, h2, h3, h4, h5, h6").expect("valid text selector"));
static HEADING_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid heading selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("valid paragraph selector"));

/// Counts maximal runs of letters, digits and underscores in `text`.
///
/// Combining marks, joiners and connector punctuation other than `_` split
/// a word.
pub fn count_words(text: &str) -> usize {
    WORD_PATTERN.find_iter(text).count()
}

/// Word counts for a single article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordStatistics {
    pub total_words: usize,
    /// Heading text to word count. A repeated heading overwrites the earlier
    /// count but keeps the earlier position.
    pub section_statistics: IndexMap<String, usize>,
    /// 1-based paragraph index to word count, in document order.
    pub paragraph_statistics: IndexMap<String, usize>,
    pub min_words_paragraph: usize,
    pub max_words_paragraph: usize,
    pub min_words_section: usize,
    pub max_words_section: usize,
}

impl WordStatistics {
    /// Scans headings (`h1`..`h6`) and paragraphs of an HTML document.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);

        let article_text = document
            .select(&TEXT_SELECTOR)
            .map(element_text)
            .collect::<Vec<_>>()
            .join(" ");
        let total_words = count_words(&article_text);

        let mut section_statistics = IndexMap::new();
        for heading in document.select(&HEADING_SELECTOR) {
            let text = element_text(heading);
            let count = count_words(&text);
            section_statistics.insert(text, count);
        }
        let (min_words_section, max_words_section) = min_max(section_statistics.values());

        let paragraph_statistics = document
            .select(&PARAGRAPH_SELECTOR)
            .enumerate()
            .map(|(idx, paragraph)| {
                let count = count_words(&element_text(paragraph));
                ((idx + 1).to_string(), count)
            })
            .collect::<IndexMap<_, _>>();
        let (min_words_paragraph, max_words_paragraph) = min_max(paragraph_statistics.values());

        Self {
            total_words,
            section_statistics,
            paragraph_statistics,
            min_words_paragraph,
            max_words_paragraph,
            min_words_section,
            max_words_section,
        }
    }

    pub fn section_series(&self) -> IndexMap<String, f64> {
        as_series(&self.section_statistics)
    }

    pub fn paragraph_series(&self) -> IndexMap<String, f64> {
        as_series(&self.paragraph_statistics)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

fn min_max<'a, I>(values: I) -> (usize, usize)
where
    I: IntoIterator<Item = &'a usize>,
{
    values
        .into_iter()
        .fold(None, |acc: Option<(usize, usize)>, &value| match acc {
            Some((min, max)) => Some((min.min(value), max.max(value))),
            None => Some((value, value)),
        })
        .unwrap_or((0, 0))
}

fn as_series(map: &IndexMap<String, usize>) -> IndexMap<String, f64> {
    map.iter()
        .map(|(label, &count)| (label.clone(), count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intro_with_two_paragraphs() {
        let stats =
            WordStatistics::from_html("<h1>Intro</h1><p>one two three</p><p>four five</p>");
        assert_eq!(stats.total_words, 6);
        assert_eq!(stats.section_statistics.len(), 1);
        assert_eq!(stats.section_statistics["Intro"], 1);
        let paragraphs: Vec<_> = stats
            .paragraph_statistics
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(paragraphs, vec![("1", 3), ("2", 2)]);
        assert_eq!(stats.min_words_paragraph, 2);
        assert_eq!(stats.max_words_paragraph, 3);
        assert_eq!(stats.min_words_section, 1);
        assert_eq!(stats.max_words_section, 1);
    }

    #[test]
    fn document_without_text_elements_is_all_zero() {
        let stats = WordStatistics::from_html(
            "<html><body><div>lots of words here</div><span>more</span></body></html>",
        );
        assert_eq!(stats, WordStatistics::default());

        let empty = WordStatistics::from_html("");
        assert_eq!(empty, WordStatistics::default());
    }

    #[test]
    fn duplicate_heading_collapses_to_one_entry() {
        let stats = WordStatistics::from_html("<h2>X</h2><p>a</p><h2>Y y</h2><h2>X</h2>");
        let sections: Vec<_> = stats
            .section_statistics
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        assert_eq!(sections, vec![("X", 1), ("Y y", 2)]);
        assert_eq!(stats.total_words, 5);
    }

    #[test]
    fn paragraph_keys_follow_document_order() {
        let html = (0..12)
            .map(|i| format!("<p>{}</p>", "w ".repeat(i + 1)))
            .collect::<String>();
        let stats = WordStatistics::from_html(&html);
        let keys: Vec<_> = stats.paragraph_statistics.keys().cloned().collect();
        let expected: Vec<_> = (1..=12).map(|i| i.to_string()).collect();
        assert_eq!(keys, expected);
        assert_eq!(stats.paragraph_statistics["12"], 12);
        assert_eq!(stats.min_words_paragraph, 1);
        assert_eq!(stats.max_words_paragraph, 12);
    }

    #[test]
    fn single_paragraph_has_equal_min_and_max() {
        let stats = WordStatistics::from_html("<p>just four words here</p>");
        assert_eq!(stats.min_words_paragraph, 4);
        assert_eq!(stats.max_words_paragraph, 4);
        assert_eq!(stats.min_words_section, 0);
        assert_eq!(stats.max_words_section, 0);
    }

    #[test]
    fn total_counts_nested_markup_and_all_heading_levels() {
        let html = "<h1>A</h1><h2>B c</h2><h3>d</h3><h4>e</h4><h5>f</h5><h6>g</h6>\
                    <p>Hello <b>bold</b> <a href=\"#\">link</a>.</p>";
        let stats = WordStatistics::from_html(html);
        assert_eq!(stats.section_statistics.len(), 6);
        assert_eq!(stats.total_words, 7 + 3);
        assert_eq!(stats.paragraph_statistics["1"], 3);
        assert_eq!(stats.max_words_section, 2);
        assert_eq!(stats.min_words_section, 1);
    }

    #[test]
    fn word_pattern_splits_on_punctuation() {
        assert_eq!(count_words("one,two;three"), 3);
        assert_eq!(count_words("Rust 2024 edition_name"), 3);
        assert_eq!(count_words("Привет, мир!"), 2);
        assert_eq!(count_words("  -- ... !!"), 0);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn marks_and_joiners_split_words() {
        assert_eq!(count_words("Моско\u{301}вский"), 2);
        assert_eq!(count_words("x\u{203F}y"), 2);
        assert_eq!(count_words("a\u{200D}b"), 2);
        assert_eq!(count_words("snake_case"), 1);

        let stats = WordStatistics::from_html("<p>Моско\u{301}вский университет</p>");
        assert_eq!(stats.paragraph_statistics["1"], 3);
        assert_eq!(stats.total_words, 3);
    }

    #[test]
    fn series_preserve_order() {
        let stats = WordStatistics::from_html("<h2>B b</h2><h2>A</h2>");
        let series = stats.section_series();
        let labels: Vec<_> = series.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["B b", "A"]);
        assert_eq!(series["B b"], 2.0);
    }
}
