use once_cell::sync::Lazy;
use regex::Regex;

static MARKDOWN_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").expect("image pattern is valid"));
static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("link pattern is valid"));
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));
static SEPARATOR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[-=_*]{3,}\s*$").expect("separator pattern is valid"));
static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("blank run pattern is valid"));
static SPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("space run pattern is valid"));

/// Strips markup from relayed user text before it reaches a validator.
pub fn clean_content(content: &str) -> String {
    let content = MARKDOWN_IMAGE.replace_all(content, "");
    let content = MARKDOWN_LINK.replace_all(&content, "$1");
    let content = HTML_TAG.replace_all(&content, "");
    let content = SEPARATOR_LINE.replace_all(&content, "");
    let content = BLANK_RUN.replace_all(&content, "\n\n");
    let content = SPACE_RUN.replace_all(&content, " ");
    content.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::clean_content;

    #[test]
    fn links_reduce_to_their_text() {
        assert_eq!(
            clean_content("This is a [link](http://example.com) to example."),
            "This is a link to example."
        );
    }

    #[test]
    fn images_are_removed() {
        assert_eq!(clean_content("Image: ![alt text](image.jpg) here."), "Image: here.");
    }

    #[test]
    fn blank_line_runs_collapse() {
        assert_eq!(clean_content("Line 1\n\n\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn separator_lines_are_dropped() {
        assert_eq!(clean_content("Header\n===\nText\n---"), "Header\n\nText");
    }

    #[test]
    fn html_tags_are_stripped_and_tables_kept() {
        assert_eq!(clean_content("<b>101</b>"), "101");
        assert_eq!(clean_content("| a | b |\n| 1 | 2 |"), "| a | b |\n| 1 | 2 |");
    }
}
