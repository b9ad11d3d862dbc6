//! Deterministic object keys for persisted documents and uploads.

use url::Url;

/// Removes every character that is not ASCII alphanumeric.
///
/// `"Jane.Doe+1@x.com"` becomes `"JaneDoe1xcom"`.
#[must_use]
pub fn strip_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Replaces every character other than ASCII alphanumerics and `.` with `-`.
///
/// `"My File!.json"` becomes `"My-File-.json"`.
#[must_use]
pub fn hyphenate(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '-' })
        .collect()
}

/// Storage key of the document a user edits on a given page.
///
/// The key is `{email}/{host+path}.json` with the email stripped and the
/// location hyphenated. A site root is named as `/index.html`, so both
/// requests share one document.
#[must_use]
pub fn document_key(email: &str, location: &Url) -> String {
    let host = host_with_port(location);
    let path = match location.path() {
        "" | "/" => "/index.html",
        path => path,
    };
    format!(
        "{}/{}.json",
        strip_non_alphanumeric(email),
        hyphenate(&format!("{host}{path}"))
    )
}

fn host_with_port(location: &Url) -> String {
    let host = location.host_str().unwrap_or_default();
    match location.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}
