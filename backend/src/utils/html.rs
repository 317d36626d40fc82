// src/utils/html.rs

/// Sanitizes user-authored text before it is stored.
///
/// Free-text answers and assignment descriptions end up rendered in another
/// user's browser (the grading view, the student view), so markup goes through
/// ammonia's whitelist: safe formatting tags survive, scripts and event
/// handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
