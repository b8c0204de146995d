//! Filesystem-safe naming for artifacts and per-paper metadata files.

use std::sync::LazyLock;

use regex::Regex;

static FORBIDDEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]"#).expect("static pattern"));

/// Replace every character in `\ / * ? : " < > |` with `_`.
///
/// Only those nine characters are touched, so two names collide after
/// sanitizing exactly when they agree everywhere outside those positions.
pub fn sanitize_filename(name: &str) -> String {
    FORBIDDEN.replace_all(name, "_").into_owned()
}
