//! Email template rendering (subject, body, unsubscribe links).
//!
//! Templates are operator-authored HTML containing `{{placeholder}}` tokens.
//! Only [`KEY_COMPANY_NAME`] and [`KEY_CEO_NAME`] are recognised; any other
//! token passes through verbatim and is reported in
//! [`RenderedEmail::unresolved_placeholders`].

use std::sync::LazyLock;

use regex::{Captures, Regex};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Subject used when the configured subject is missing or empty.
pub const DEFAULT_SUBJECT: &str = "제안서입니다.";

/// Body used when the configured template is missing or empty.
pub const DEFAULT_BODY: &str = "<p>안녕하세요.</p>";

/// Substituted for `{{ceo_name}}` when the recipient has no contact name.
pub const DEFAULT_HONORIFIC: &str = "대표님";

/// Placeholder key for the recipient's company name.
pub const KEY_COMPANY_NAME: &str = "company_name";

/// Placeholder key for the recipient's contact name.
pub const KEY_CEO_NAME: &str = "ceo_name";

/// Query parameter carrying the recipient address on unsubscribe links.
pub const UNSUBSCRIBE_EMAIL_PARAM: &str = "email";

/// Regex pattern matching `{{placeholder}}` tokens.
pub const PLACEHOLDER_PATTERN: &str = r"\{\{([a-zA-Z_][a-zA-Z0-9_]*)\}\}";

/// Regex pattern matching an `href` attribute whose URL mentions "unsubscribe",
/// in either quote style.
pub const UNSUBSCRIBE_LINK_PATTERN: &str =
    r#"(?i)href\s*=\s*(?:"(?P<dq>[^"]*unsubscribe[^"]*)"|'(?P<sq>[^']*unsubscribe[^']*)')"#;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLACEHOLDER_PATTERN).expect("valid regex"));

static UNSUBSCRIBE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(UNSUBSCRIBE_LINK_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The recipient fields a template can reference.
#[derive(Debug, Clone, Copy)]
pub struct Recipient<'a> {
    pub email: &'a str,
    pub company_name: Option<&'a str>,
    pub ceo_name: Option<&'a str>,
}

/// A fully rendered message ready for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    /// Tokens left verbatim because no value is known for them.
    pub unresolved_placeholders: Vec<String>,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the subject and body for one recipient.
pub fn render(
    subject: Option<&str>,
    template: Option<&str>,
    recipient: &Recipient<'_>,
) -> RenderedEmail {
    let template = non_empty(template).unwrap_or(DEFAULT_BODY);
    let (body, unresolved_placeholders) = substitute_placeholders(template, recipient);

    RenderedEmail {
        subject: render_subject(subject),
        html: personalize_unsubscribe_links(&body, recipient.email),
        unresolved_placeholders,
    }
}

/// The configured subject verbatim, or [`DEFAULT_SUBJECT`] when empty.
pub fn render_subject(subject: Option<&str>) -> String {
    non_empty(subject).unwrap_or(DEFAULT_SUBJECT).to_string()
}

/// Replace every recognised `{{placeholder}}` in `template`.
///
/// Returns the substituted text and the de-duplicated names of tokens that
/// were left in place.
pub fn substitute_placeholders(
    template: &str,
    recipient: &Recipient<'_>,
) -> (String, Vec<String>) {
    let mut unresolved = Vec::new();
    let text = PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match &caps[1] {
            KEY_COMPANY_NAME => recipient.company_name.unwrap_or_default().to_string(),
            KEY_CEO_NAME => non_empty(recipient.ceo_name)
                .unwrap_or(DEFAULT_HONORIFIC)
                .to_string(),
            other => {
                if !unresolved.iter().any(|u| u == other) {
                    unresolved.push(other.to_string());
                }
                caps[0].to_string()
            }
        })
        .into_owned();
    (text, unresolved)
}

/// Point every unsubscribe link in `html` at `email`.
///
/// The link's existing query string is replaced by `?email=<address>`; the
/// path and any fragment are kept.
pub fn personalize_unsubscribe_links(html: &str, email: &str) -> String {
    UNSUBSCRIBE_LINK_RE
        .replace_all(html, |caps: &Captures| {
            let (url, quote) = match (caps.name("dq"), caps.name("sq")) {
                (Some(url), _) => (url.as_str(), '"'),
                (None, Some(url)) => (url.as_str(), '\''),
                (None, None) => return caps[0].to_string(),
            };
            format!("href={quote}{}{quote}", personalize_unsubscribe_url(url, email))
        })
        .into_owned()
}

/// Rewrite a single unsubscribe URL so it identifies `email`.
pub fn personalize_unsubscribe_url(url: &str, email: &str) -> String {
    let (without_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let base = without_fragment
        .split_once('?')
        .map_or(without_fragment, |(base, _)| base);

    let mut out = format!(
        "{base}?{UNSUBSCRIBE_EMAIL_PARAM}={}",
        urlencoding::encode(email)
    );
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
