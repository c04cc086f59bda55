//! Post text composition.
//!
//! The layout is fixed: title, URL, discussions link, hashtags, attribution,
//! each as its own paragraph. Optional sections are left out entirely rather
//! than rendered empty.

/// Titles longer than this many characters are shortened.
pub const MAX_TITLE_CHARS: usize = 50;

const ELLIPSIS: char = '…';

/// Tags that collide with unrelated popular hashtags.
const TAG_REPLACEMENTS: &[(&str, &str)] = &[("c", "cprogramming")];

/// Everything a status is built from. Attribution is an explicit input so each
/// platform's variant is a separate, visible choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusParts<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub discussions_url: Option<&'a str>,
    pub tags: &'a [String],
    pub by_account: Option<&'a str>,
}

/// Keep at most [`MAX_TITLE_CHARS`] characters, marking cuts with `…`.
pub fn truncate_title(title: &str) -> String {
    if title.chars().count() <= MAX_TITLE_CHARS {
        return title.to_string();
    }
    let mut short: String = title.chars().take(MAX_TITLE_CHARS - 2).collect();
    short.push(ELLIPSIS);
    short
}

/// `#`-prefixed, substituted and alphabetically sorted hashtags.
pub fn hashtags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            let t = TAG_REPLACEMENTS
                .iter()
                .find(|(from, _)| *from == t)
                .map_or(t, |(_, to)| *to);
            format!("#{t}")
        })
        .collect();
    out.sort();
    out
}

pub fn build_status(parts: &StatusParts<'_>) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(5);

    let title = truncate_title(parts.title.trim());
    if !title.is_empty() {
        sections.push(title);
    }
    sections.push(parts.url.to_string());
    if let Some(d) = parts.discussions_url.filter(|d| !d.trim().is_empty()) {
        sections.push(format!("Discussions: {d}"));
    }
    let tags = hashtags(parts.tags);
    if !tags.is_empty() {
        sections.push(tags.join(" "));
    }
    if let Some(by) = parts.by_account.filter(|b| !b.trim().is_empty()) {
        sections.push(format!("by @{by}"));
    }

    sections.join("\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn minimal_status() {
        let status = build_status(&StatusParts {
            title: "Example Site",
            url: "https://example.com",
            ..Default::default()
        });
        assert_eq!(status, "Example Site\n\nhttps://example.com");
    }

    #[test]
    fn hashtag_line_follows_the_url() {
        let t = tags(&["c", "rust"]);
        let status = build_status(&StatusParts {
            title: "Example Site",
            url: "https://example.com",
            tags: &t,
            ..Default::default()
        });
        assert_eq!(
            status,
            "Example Site\n\nhttps://example.com\n\n#cprogramming #rust"
        );
    }

    #[test]
    fn every_section_in_order() {
        let t = tags(&["web", "art"]);
        let status = build_status(&StatusParts {
            title: "Tiny",
            url: "https://tiny.example",
            discussions_url: Some("https://discu.eu/?q=tiny"),
            tags: &t,
            by_account: Some("maker"),
        });
        assert_eq!(
            status,
            "Tiny\n\nhttps://tiny.example\n\nDiscussions: https://discu.eu/?q=tiny\n\n#art #web\n\nby @maker"
        );
    }

    #[test]
    fn empty_title_is_left_out() {
        let status = build_status(&StatusParts {
            url: "https://example.com",
            by_account: Some("someone"),
            ..Default::default()
        });
        assert_eq!(status, "https://example.com\n\nby @someone");
    }

    #[test]
    fn hashtags_are_sorted_prefixed_and_substituted() {
        assert_eq!(
            hashtags(&tags(&["rust", "c", "go", "", "  "])),
            vec!["#cprogramming", "#go", "#rust"]
        );
        assert!(hashtags(&[]).is_empty());
        // Only the bare tag is rewritten.
        assert_eq!(hashtags(&tags(&["cpp", "C"])), vec!["#C", "#cpp"]);
    }

    #[test]
    fn long_titles_are_cut_to_48_plus_ellipsis() {
        let exact = "x".repeat(50);
        assert_eq!(truncate_title(&exact), exact);

        let long = "y".repeat(51);
        let cut = truncate_title(&long);
        assert_eq!(cut.chars().count(), 49);
        assert!(cut.starts_with(&"y".repeat(48)));
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let title = "é".repeat(60);
        let cut = truncate_title(&title);
        assert_eq!(cut, format!("{}…", "é".repeat(48)));

        let fits = "日本語".repeat(16);
        assert_eq!(truncate_title(&fits), fits);
    }
}
