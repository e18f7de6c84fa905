//! Media references embedded in markdown prose.
//!
//! Images (`![alt](url)`) are always collected. Plain links (`[text](url)`)
//! count as assets only when their target looks like a media file; ordinary
//! web pages are ignored.

use std::sync::OnceLock;

use regex::Regex;

static IMAGE_RE: OnceLock<Regex> = OnceLock::new();
static LINK_RE: OnceLock<Regex> = OnceLock::new();

/// `![alt](target "title")`
fn image_re() -> &'static Regex {
    IMAGE_RE.get_or_init(|| {
        Regex::new(r#"!\[[^\]]*\]\(\s*<?([^)\s>]+)>?(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#)
            .expect("static regex is valid")
    })
}

/// `[text](target "title")`, where text may itself hold an image.
/// Group 1 is `!` when the match is an image, which callers skip.
fn link_re() -> &'static Regex {
    LINK_RE.get_or_init(|| {
        Regex::new(
            r#"(!?)\[(?:[^\[\]]|!\[[^\]]*\]\([^)]*\))*\]\(\s*<?([^)\s>]+)>?(?:\s+(?:"[^"]*"|'[^']*'))?\s*\)"#,
        )
        .expect("static regex is valid")
    })
}

/// References found in one markdown body, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownRefs {
    pub images: Vec<String>,
    pub assets: Vec<String>,
}

/// Scan markdown for image and media-link targets
pub fn scan(markdown: &str) -> MarkdownRefs {
    let images = image_re()
        .captures_iter(markdown)
        .map(|caps| caps[1].to_string())
        .collect();

    let assets = link_re()
        .captures_iter(markdown)
        .filter(|caps| &caps[1] != "!")
        .map(|caps| caps[2].to_string())
        .filter(|target| is_media_target(target))
        .collect();

    MarkdownRefs { images, assets }
}

/// Whether a link target's apparent type is a non-HTML file
pub fn is_media_target(target: &str) -> bool {
    let Some(path) = target_path(target) else {
        return false;
    };

    match mime_guess::from_path(path).first() {
        Some(mime) => mime.essence_str() != "text/html",
        None => false,
    }
}

/// Path component of a link target: no scheme, host, query or fragment.
/// `None` for non-web schemes like `mailto:`.
fn target_path(target: &str) -> Option<&str> {
    let target = target.split(['?', '#']).next().unwrap_or(target);

    match target.split_once("://") {
        Some((scheme, rest)) => {
            if !matches!(scheme, "http" | "https") {
                return None;
            }
            Some(rest.find('/').map_or("", |slash| &rest[slash..]))
        }
        None if target.starts_with("//") => {
            let rest = &target[2..];
            Some(rest.find('/').map_or("", |slash| &rest[slash..]))
        }
        None if target.contains(':') => None,
        None => Some(target),
    }
}
