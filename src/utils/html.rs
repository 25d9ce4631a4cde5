use std::collections::HashSet;

use ammonia::Builder;

/// Sanitizes admin-authored text (subject titles, quiz titles, question and
/// option text) before it is stored.
///
/// Whitelist strategy: a small set of inline formatting tags survives,
/// everything else, including `<script>` bodies and event-handler
/// attributes, is stripped. Quiz content never needs block-level markup,
/// so the allowed set is deliberately narrower than ammonia's default.
pub fn clean_html(input: &str) -> String {
    let tags: HashSet<&str> = ["b", "i", "em", "strong", "u", "sub", "sup", "code", "br"]
        .into_iter()
        .collect();

    Builder::default()
        .tags(tags)
        .clean(input)
        .to_string()
}
