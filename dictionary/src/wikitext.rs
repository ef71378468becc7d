//! Wikitext to plain text normalization.
//!
//! Covers the markup dictionary pages actually use; it is not a full
//! MediaWiki parser. Nested templates lose only their innermost braces.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Rewrite rules, applied in order.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // HTML comments
        (r"(?s)<!--.*?-->", ""),
        // File and image embeds, before ordinary links would keep their captions
        (r"(?i)\[\[(?:File|Image):[^\]]*\]\]", ""),
        // Templates
        (r"\{\{[^}]*\}\}", ""),
        // [[target|label]] and [[label]]
        (r"\[\[(?:[^\]|]*\|)?([^\]]+)\]\]", "${1}"),
        // Bold, then italic
        (r"'''([^']+)'''", "${1}"),
        (r"''([^']+)''", "${1}"),
        // Headings
        (r"==+[ \t]*([^=\n]+?)[ \t]*==+", "\n${1}\n"),
        // HTML tags
        (r"<[^>]+>", ""),
        (r"\n{3,}", "\n\n"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| {
        Regex::new(pattern).ok().map(|re| (re, replacement))
    })
    .collect()
});

/// Convert raw wikitext to plain text.
pub fn wikitext_to_plain(text: &str) -> String {
    let mut plain = text.to_string();
    for (re, replacement) in RULES.iter() {
        plain = re.replace_all(&plain, *replacement).into_owned();
    }
    plain.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_every_rule_compiles() {
        assert_eq!(RULES.len(), 9);
    }

    #[test]
    fn test_links_keep_their_label() {
        assert_eq!(
            wikitext_to_plain("[[rig pa|awareness]] and [[ye shes]]"),
            "awareness and ye shes"
        );
    }

    #[test]
    fn test_file_links_are_dropped() {
        assert_eq!(wikitext_to_plain("[[File:thangka.jpg|thumb]]text"), "text");
        assert_eq!(wikitext_to_plain("[[image:a.png]]text"), "text");
    }

    #[test]
    fn test_comments_and_templates_are_removed() {
        assert_eq!(
            wikitext_to_plain("a<!-- hidden\nnote -->b{{Tibetan|rig pa}}c"),
            "abc"
        );
    }

    #[test]
    fn test_emphasis_is_stripped() {
        assert_eq!(
            wikitext_to_plain("'''bold''' and ''italic''"),
            "bold and italic"
        );
    }

    #[test]
    fn test_headings_stand_on_their_own_line() {
        assert_eq!(
            wikitext_to_plain("== Definition ==\nPure awareness."),
            "Definition\n\nPure awareness."
        );
        assert_eq!(wikitext_to_plain("==A==\n==B=="), "A\n\nB");
    }

    #[test]
    fn test_html_tags_and_blank_runs() {
        assert_eq!(wikitext_to_plain("<ref>x</ref>y <br/>"), "xy");
        assert_eq!(wikitext_to_plain("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_dictionary_entry() {
        let raw = "{{Header}}\n'''rig pa''' - [[awareness]], [[shes pa|cognizance]]; \
                   intrinsic awareness <ref>RY</ref>\n\n\n\n[[Category:Dzogchen]]";
        assert_eq!(
            wikitext_to_plain(raw),
            "rig pa - awareness, cognizance; intrinsic awareness RY\n\nCategory:Dzogchen"
        );
    }
}
