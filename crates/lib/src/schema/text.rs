//! String checks shared by every entity: control characters, script
//! injection, and the username/email/URL/date formats.

use chrono::NaiveDate;

use super::errors::{FieldIssue, IssueKind};

/// Markup and URI fragments that are never accepted in stored text.
const INJECTION_PATTERNS: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "<iframe",
    "<object",
    "<embed",
    "<svg",
    "<meta",
    "<link",
    "expression(",
    "srcdoc=",
];

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 30;

/// Whether `c` is a control character that text fields may not carry.
///
/// Newline, carriage return and tab are permitted only when `multiline` is set.
pub fn is_forbidden_control(c: char, multiline: bool) -> bool {
    if multiline && matches!(c, '\n' | '\r' | '\t') {
        return false;
    }
    c.is_control()
}

pub fn has_forbidden_controls(text: &str, multiline: bool) -> bool {
    text.chars().any(|c| is_forbidden_control(c, multiline))
}

/// Detects script-injection markup, including inline `on*=` event handlers.
pub fn has_script_injection(text: &str) -> bool {
    let lower = text.to_lowercase();
    INJECTION_PATTERNS.iter().any(|p| lower.contains(p)) || has_inline_handler(&lower)
}

/// Looks for `on<letters>\s*=` that starts a word, e.g. `onerror=` or `" onload =`.
fn has_inline_handler(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    let mut i = 0;
    while i + 2 < bytes.len() {
        let at_word_start = i == 0 || !bytes[i - 1].is_ascii_alphanumeric();
        if at_word_start && bytes[i] == b'o' && bytes[i + 1] == b'n' {
            let mut j = i + 2;
            while j < bytes.len() && bytes[j].is_ascii_alphabetic() {
                j += 1;
            }
            // Event names are at least three letters (oncut, onload, ...)
            if j >= i + 5 {
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'=' {
                    return true;
                }
            }
        }
        i += 1;
    }
    false
}

/// Trim and drop forbidden control characters. Injection patterns are left
/// in place so that validation still rejects them.
pub fn sanitize_text(text: &str, multiline: bool) -> String {
    text.trim()
        .chars()
        .filter(|c| !is_forbidden_control(*c, multiline))
        .collect()
}

/// Content checks applied to every accepted string.
pub fn check_content(field: &str, text: &str, multiline: bool, issues: &mut Vec<FieldIssue>) {
    if has_forbidden_controls(text, multiline) {
        issues.push(FieldIssue::new(
            field,
            IssueKind::ControlCharacters,
            "contains control characters",
        ));
    }
    if has_script_injection(text) {
        issues.push(FieldIssue::new(
            field,
            IssueKind::ScriptInjection,
            "contains script or markup injection",
        ));
    }
}

/// Usernames are 3 to 30 characters of `[A-Za-z0-9_-]`.
pub fn validate_username(username: &str) -> Result<(), FieldIssue> {
    let len = username.chars().count();
    if len < USERNAME_MIN {
        return Err(FieldIssue::new(
            "username",
            IssueKind::OutOfRange,
            format!("must be at least {USERNAME_MIN} characters"),
        ));
    }
    if len > USERNAME_MAX {
        return Err(FieldIssue::new(
            "username",
            IssueKind::TooLong,
            format!("must be at most {USERNAME_MAX} characters"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(FieldIssue::new(
            "username",
            IssueKind::InvalidFormat,
            "may only contain letters, digits, '_' and '-'",
        ));
    }
    Ok(())
}

/// `local@domain.tld` with a conservative character set.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    let domain_ok = domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let tld = labels[labels.len() - 1];
    local_ok && domain_ok && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// `http://` or `https://` followed by a non-empty host and no whitespace.
pub fn is_valid_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or("");
            !host.is_empty()
                && !host.starts_with('.')
                && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}
