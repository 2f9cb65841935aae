//! Title normalization
//!
//! Two titles name the same work iff their normalized forms are equal, and are
//! related iff one normalized form contains the other.

/// Bracket, punctuation and quote characters replaced by a space
/// (full-width and half-width variants).
const STRIP_CHARS: &[char] = &[
    '【', '】', '［', '］', '[', ']', '(', ')', '（', '）', ',', ':', '：', ';', '・', '-', '–',
    '—', '\'', '’', '"', '“', '”', '!', '！', '?', '？',
];

/// Lower-case, blank out punctuation, collapse whitespace, trim
pub fn normalize(s: &str) -> String {
    let replaced: String = s
        .to_lowercase()
        .chars()
        .map(|c| if STRIP_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Same work: normalized forms are equal
pub fn same_work(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

/// Related: one non-empty normalized form contains the other
pub fn related(a: &str, b: &str) -> bool {
    let (a, b) = (normalize(a), normalize(b));
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

/// ISBN with separators removed, for equality and substring checks
pub fn compact_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_normalization() {
        assert_eq!(normalize("  Clean   Code: A Handbook "), "clean code a handbook");
        assert_eq!(normalize("【新版】ゼロから作る Deep Learning！"), "新版 ゼロから作る deep learning");
        assert_eq!(normalize("“Quoted” (2nd ed.)"), "quoted 2nd ed.");
    }

    #[test]
    fn test_full_width_space_collapses() {
        assert_eq!(normalize("深層学習\u{3000}\u{3000}入門"), "深層学習 入門");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "   ",
            "Deep Learning",
            "【改訂】 Rust ― プログラミング：入門？",
            "Ünïcödé — TITLE!!",
            "a-b–c—d",
            "İstanbul",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "normalize not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_same_work_and_related() {
        assert!(same_work("Clean Code", "clean  code"));
        assert!(!same_work("Clean Code", "Clean Architecture"));
        assert!(related("Deep Learning", "Deep Learning with Python"));
        assert!(related("Deep Learning with Python", "deep learning"));
        assert!(!related("", "anything"));
    }

    #[test]
    fn test_compact_isbn() {
        assert_eq!(compact_isbn("978-4-87311-758-4"), "9784873117584");
        assert_eq!(compact_isbn("4 87311 x"), "487311X");
    }
}
