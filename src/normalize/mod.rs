const PUNCTUATION: [char; 5] = ['#', '.', ',', '(', ')'];

pub const BASE_STRIP_TERMS: &[&str] = &[
    "public school district",
    "public schools",
    "public school",
    "school district",
    "schools",
    "school",
    "district",
    "county",
    "municipal",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    terms: Vec<String>,
}

impl Vocabulary {
    pub fn new(terms: &[&str]) -> Self {
        let mut owned = terms
            .iter()
            .map(|term| term.trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .collect::<Vec<_>>();
        owned.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        owned.dedup();
        Self { terms: owned }
    }

    pub fn base() -> Self {
        Self::new(BASE_STRIP_TERMS)
    }

    pub fn with_extras(extras: &[String]) -> Self {
        let mut terms = BASE_STRIP_TERMS.iter().copied().collect::<Vec<_>>();
        terms.extend(extras.iter().map(String::as_str));
        Self::new(&terms)
    }

    pub fn normalize(&self, name: &str) -> String {
        let mut value = name.to_lowercase().trim().to_string();
        for term in &self.terms {
            value = strip_term(&value, term);
        }
        value.retain(|ch| !PUNCTUATION.contains(&ch));
        value.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

// Word-boundary occurrences only: a short token like a postal code must not
// eat the interior of a longer word.
fn strip_term(name: &str, term: &str) -> String {
    let chars = name.chars().collect::<Vec<_>>();
    let term_chars = term.chars().collect::<Vec<_>>();
    if term_chars.is_empty() || chars.len() < term_chars.len() {
        return name.to_string();
    }

    let mut out = String::with_capacity(name.len());
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i..].starts_with(&term_chars) {
            let end = i + term_chars.len();
            let boundary_before = i == 0 || !chars[i - 1].is_alphanumeric();
            let boundary_after = end >= chars.len() || !chars[end].is_alphanumeric();
            if boundary_before && boundary_after {
                out.push(' ');
                i = end;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{BASE_STRIP_TERMS, Vocabulary};

    #[test]
    fn strips_base_vocabulary_and_collapses_whitespace() {
        let vocab = Vocabulary::base();
        assert_eq!(vocab.normalize("Springfield Public Schools"), "springfield");
        assert_eq!(vocab.normalize("Springfield School District"), "springfield");
        assert_eq!(vocab.normalize("  Hinds   County  Schools "), "hinds");
    }

    #[test]
    fn is_case_insensitive() {
        let vocab = Vocabulary::base();
        assert_eq!(
            vocab.normalize("ABC School District"),
            vocab.normalize("abc school district")
        );
    }

    #[test]
    fn is_idempotent() {
        let vocab = Vocabulary::with_extras(&["ssd".to_string(), "ms".to_string()]);
        for name in [
            "Jackson Public Schools",
            "Clinton MS #4 (Consolidated)",
            "Oxford SSD",
            "St. Tammany",
            "",
            "   ",
        ] {
            let once = vocab.normalize(name);
            assert_eq!(vocab.normalize(&once), once, "not idempotent for {name:?}");
        }
    }

    #[test]
    fn blank_input_yields_empty_output() {
        let vocab = Vocabulary::base();
        assert_eq!(vocab.normalize(""), "");
        assert_eq!(vocab.normalize("   "), "");
    }

    #[test]
    fn removes_punctuation_set() {
        let vocab = Vocabulary::base();
        assert_eq!(
            vocab.normalize("Adams Co. Dist. #12 (North), Unit"),
            "adams co dist 12 north unit"
        );
    }

    #[test]
    fn short_tokens_only_strip_at_word_boundaries() {
        let vocab = Vocabulary::with_extras(&["ms".to_string()]);
        assert_eq!(vocab.normalize("Williams MS Academy"), "williams academy");
    }

    #[test]
    fn jurisdiction_extras_extend_the_base_table() {
        let vocab = Vocabulary::with_extras(&["ssd".to_string()]);
        assert_eq!(vocab.normalize("Oxford SSD"), "oxford");
        // the base table still applies
        assert_eq!(vocab.normalize("Oxford Public Schools"), "oxford");
    }

    #[test]
    fn longer_terms_win_over_their_prefixes() {
        let vocab = Vocabulary::new(BASE_STRIP_TERMS);
        // "school district" must be removed as one phrase, not leave "district"
        assert_eq!(vocab.normalize("Delta School District"), "delta");
        assert_eq!(vocab.normalize("Delta School"), "delta");
    }

    #[test]
    fn does_not_strip_inside_words() {
        let vocab = Vocabulary::base();
        assert_eq!(vocab.normalize("Schoolcraft"), "schoolcraft");
        assert_eq!(vocab.normalize("Countyline"), "countyline");
    }
}
