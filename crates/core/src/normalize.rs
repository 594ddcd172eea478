use crate::error::IngestError;
use regex::Regex;

/// Boilerplate that recurs across guideline PDFs: page-number footers,
/// recurring title/year headers, URLs, and DOI strings.
const BOILERPLATE_PATTERNS: [&str; 4] = [
    r"Page \d+ of \d+",
    r"ESC Guidelines.*?\d{4}",
    r"https?://\S+",
    r"doi:\s*\S+",
];

pub struct TextNormalizer {
    whitespace: Regex,
    boilerplate: Vec<Regex>,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            whitespace: Regex::new(r"\s+")?,
            boilerplate: BOILERPLATE_PATTERNS
                .iter()
                .map(|pattern| Regex::new(pattern))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    /// Collapses whitespace runs to single spaces, strips boilerplate, and
    /// trims. Always returns a string, possibly empty.
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = self.whitespace.replace_all(raw, " ").into_owned();
        for pattern in &self.boilerplate {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::TextNormalizer;

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        let normalizer = TextNormalizer::new().unwrap();
        assert_eq!(
            normalizer.normalize("A  \t  lot\nof   spacing"),
            "A lot of spacing"
        );
    }

    #[test]
    fn page_footers_are_stripped() {
        let normalizer = TextNormalizer::new().unwrap();
        let cleaned = normalizer.normalize("before Page 12 of 98 after");
        assert_eq!(cleaned, "before  after");
    }

    #[test]
    fn urls_and_dois_are_stripped() {
        let normalizer = TextNormalizer::new().unwrap();
        let cleaned =
            normalizer.normalize("see https://example.org/x and doi: 10.1000/182 for details");
        assert!(!cleaned.contains("https"));
        assert!(!cleaned.contains("10.1000"));
        assert!(cleaned.starts_with("see"));
    }

    #[test]
    fn recurring_title_year_headers_are_stripped() {
        let normalizer = TextNormalizer::new().unwrap();
        let cleaned = normalizer.normalize("ESC Guidelines for hypertension 2024 target values");
        assert_eq!(cleaned, "target values");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let normalizer = TextNormalizer::new().unwrap();
        assert_eq!(normalizer.normalize("   \n\t "), "");
    }
}
