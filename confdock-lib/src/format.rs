use std::borrow::Cow;

const STORAGE_MARKERS: [&str; 2] = ["ac:structured-macro", "ac:plain-text-body"];

/// Prepares editor content for the storage representation.
///
/// Content that already carries storage-format macros is sent unchanged.
/// Anything else is wrapped in a single paragraph. This is a substring
/// heuristic: plain text that merely mentions a marker passes through too.
pub fn format_for_remote(content: &str) -> Cow<'_, str> {
    if STORAGE_MARKERS.iter().any(|marker| content.contains(marker)) {
        Cow::Borrowed(content)
    } else {
        Cow::Owned(format!("<p>{content}</p>"))
    }
}
