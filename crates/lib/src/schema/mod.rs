//! Per-entity field rules and sanitization.
//!
//! Every record that reaches the storage engine is checked against a static
//! field table for its entity kind. Validation is pure: it inspects a
//! `serde_json::Value` and reports [`FieldIssue`]s, it never touches
//! persisted state. [`sanitize`] is the accepting variant for business
//! modules; it cleans text first and then validates.
//!
//! Fields not named in a table are allowed (business modules add their own),
//! but any string found anywhere in a record is still checked for control
//! characters and script injection.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::constants;

pub mod errors;
pub mod password;
pub mod text;
pub mod upload;

pub use errors::{FieldIssue, IssueKind, ValidationError};
pub use password::{PasswordPolicy, PasswordStrength};
pub use text::{is_valid_email, is_valid_url, validate_username};
pub use upload::{UploadKind, resolve_upload_path, sanitize_filename, validate_upload};

/// Check an email address, reporting the issue on the `email` field.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if text::is_valid_email(email) {
        Ok(())
    } else {
        Err(ValidationError::single(
            "email",
            IssueKind::InvalidFormat,
            "must be a valid email address",
        ))
    }
}

/// The kinds of record the layer knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    Task,
    User,
    Comment,
    Invoice,
    Resource,
    Attachment,
}

/// Type and bounds of a single field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Single-line text, non-empty when present, at most `max` characters.
    Text { max: usize },
    /// Multi-line text (newline and tab allowed); may be empty.
    LongText { max: usize },
    /// One of a closed set of strings.
    OneOf(&'static [&'static str]),
    /// ISO `YYYY-MM-DD` date.
    Date,
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64 },
    Bool,
    Email,
    Url,
    Username,
    /// Array of short strings.
    StringList { max_items: usize, max_len: usize },
    /// Relative upload path, see [`resolve_upload_path`].
    UploadPath,
}

/// One row of an entity's field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        required: false,
    }
}

pub const ROLES: &[&str] = &["Admin", "Manager", "User", "Viewer"];
pub const PROJECT_CATEGORIES: &[&str] = &[
    "IT",
    "Marketing",
    "HR",
    "R&D",
    "Privat",
    "Produktion",
    "Vertrieb",
    "Finanzen",
];
pub const PROJECT_PRIORITIES: &[&str] = &["Low", "Med", "High", "Critical"];
pub const PROJECT_STATUSES: &[&str] = &[
    "Idee",
    "Planung",
    "In Arbeit",
    "Review",
    "Abgeschlossen",
    "Pausiert",
    "Abgebrochen",
];
pub const TASK_STATUSES: &[&str] = &["To Do", "In Progress", "Done", "Blocked"];
pub const INVOICE_STATUSES: &[&str] = &["Draft", "Sent", "Paid", "Overdue", "Cancelled"];
pub const CURRENCIES: &[&str] = &["EUR", "USD", "GBP", "CHF"];

const MAX_MONEY: f64 = 1_000_000_000.0;

const PROJECT_FIELDS: &[FieldSpec] = &[
    required("title", FieldKind::Text { max: 200 }),
    optional("description", FieldKind::LongText { max: 5000 }),
    optional("category", FieldKind::OneOf(PROJECT_CATEGORIES)),
    optional("priority", FieldKind::OneOf(PROJECT_PRIORITIES)),
    optional("status", FieldKind::OneOf(PROJECT_STATUSES)),
    optional("progress", FieldKind::Integer { min: 0, max: 100 }),
    optional("deadline", FieldKind::Date),
    optional("start_date", FieldKind::Date),
    optional("end_date", FieldKind::Date),
    optional("git_url", FieldKind::Url),
    optional(
        "tags",
        FieldKind::StringList {
            max_items: 50,
            max_len: 50,
        },
    ),
    optional("is_template", FieldKind::Bool),
    optional("is_archived", FieldKind::Bool),
];

const TASK_FIELDS: &[FieldSpec] = &[
    required("text", FieldKind::Text { max: 500 }),
    optional("status", FieldKind::OneOf(TASK_STATUSES)),
    optional("project_id", FieldKind::Text { max: 100 }),
    optional("assignee", FieldKind::Text { max: 100 }),
    optional("due_date", FieldKind::Date),
    optional(
        "estimate_hours",
        FieldKind::Number {
            min: 0.0,
            max: 10_000.0,
        },
    ),
];

const USER_FIELDS: &[FieldSpec] = &[
    required("username", FieldKind::Username),
    required("role", FieldKind::OneOf(ROLES)),
    optional("display_name", FieldKind::Text { max: 100 }),
    optional("email", FieldKind::Email),
    optional("is_active", FieldKind::Bool),
];

const COMMENT_FIELDS: &[FieldSpec] = &[
    required("body", FieldKind::LongText { max: 5000 }),
    required("author", FieldKind::Text { max: 100 }),
    required("target_id", FieldKind::Text { max: 100 }),
];

const INVOICE_FIELDS: &[FieldSpec] = &[
    required("number", FieldKind::Text { max: 50 }),
    required("client", FieldKind::Text { max: 200 }),
    required(
        "amount",
        FieldKind::Number {
            min: 0.0,
            max: MAX_MONEY,
        },
    ),
    required("issue_date", FieldKind::Date),
    optional("due_date", FieldKind::Date),
    optional("currency", FieldKind::OneOf(CURRENCIES)),
    optional("status", FieldKind::OneOf(INVOICE_STATUSES)),
];

const RESOURCE_FIELDS: &[FieldSpec] = &[
    required("name", FieldKind::Text { max: 200 }),
    optional("kind", FieldKind::Text { max: 50 }),
    optional(
        "capacity",
        FieldKind::Integer {
            min: 0,
            max: 1_000_000,
        },
    ),
    optional(
        "hourly_rate",
        FieldKind::Number {
            min: 0.0,
            max: MAX_MONEY,
        },
    ),
    optional("available_from", FieldKind::Date),
    optional("available_until", FieldKind::Date),
];

const ATTACHMENT_FIELDS: &[FieldSpec] = &[
    required("file_name", FieldKind::Text { max: 255 }),
    required("path", FieldKind::UploadPath),
    optional(
        "size_bytes",
        FieldKind::Integer {
            min: 0,
            max: i64::MAX,
        },
    ),
    optional("content_type", FieldKind::Text { max: 100 }),
    optional("target_id", FieldKind::Text { max: 100 }),
];

impl EntityKind {
    /// The declared field table.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Project => PROJECT_FIELDS,
            EntityKind::Task => TASK_FIELDS,
            EntityKind::User => USER_FIELDS,
            EntityKind::Comment => COMMENT_FIELDS,
            EntityKind::Invoice => INVOICE_FIELDS,
            EntityKind::Resource => RESOURCE_FIELDS,
            EntityKind::Attachment => ATTACHMENT_FIELDS,
        }
    }

    /// Date pairs `(start, end)` where `end` may not precede `start`.
    fn date_ranges(self) -> &'static [(&'static str, &'static str)] {
        match self {
            EntityKind::Project => &[("start_date", "end_date")],
            EntityKind::Invoice => &[("issue_date", "due_date")],
            EntityKind::Resource => &[("available_from", "available_until")],
            _ => &[],
        }
    }

    /// The entity kind stored in a named collection, if the collection is known.
    pub fn for_collection(name: &str) -> Option<Self> {
        match name {
            constants::PROJECTS => Some(EntityKind::Project),
            constants::TASKS => Some(EntityKind::Task),
            constants::USERS => Some(EntityKind::User),
            constants::COMMENTS => Some(EntityKind::Comment),
            constants::INVOICES => Some(EntityKind::Invoice),
            constants::RESOURCES => Some(EntityKind::Resource),
            constants::ATTACHMENTS => Some(EntityKind::Attachment),
            _ => None,
        }
    }
}

/// Validate a record payload for `kind`, collecting every issue.
pub fn validate(kind: EntityKind, payload: &Value) -> Result<(), ValidationError> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationError::single(
            "$",
            IssueKind::Structure,
            "record must be a JSON object",
        ));
    };

    let mut issues = Vec::new();
    let specs = kind.fields();

    for spec in specs {
        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    issues.push(FieldIssue::new(spec.name, IssueKind::Missing, "is required"));
                }
            }
            Some(value) => check_field(spec, value, &mut issues),
        }
    }

    for (start, end) in kind.date_ranges() {
        let start_date = object.get(*start).and_then(Value::as_str).and_then(text::parse_date);
        let end_date = object.get(*end).and_then(Value::as_str).and_then(text::parse_date);
        if let (Some(s), Some(e)) = (start_date, end_date)
            && e < s
        {
            issues.push(FieldIssue::new(
                *end,
                IssueKind::OutOfRange,
                format!("must not be before {start}"),
            ));
        }
    }

    // Undeclared fields still get the content checks.
    for (key, value) in object {
        if !specs.iter().any(|s| s.name == key) {
            scan_strings(key, value, &mut issues);
        }
    }

    ValidationError::from_issues(issues)
}

fn check_field(spec: &FieldSpec, value: &Value, issues: &mut Vec<FieldIssue>) {
    let field = spec.name;
    let wrong_type = |expected: &str| FieldIssue::new(field, IssueKind::WrongType, format!("must be {expected}"));

    match spec.kind {
        FieldKind::Text { max } | FieldKind::LongText { max } => {
            let multiline = matches!(spec.kind, FieldKind::LongText { .. });
            let Some(s) = value.as_str() else {
                issues.push(wrong_type("a string"));
                return;
            };
            if !multiline && s.trim().is_empty() {
                issues.push(FieldIssue::new(field, IssueKind::Empty, "must not be empty"));
            }
            if s.chars().count() > max {
                issues.push(FieldIssue::new(
                    field,
                    IssueKind::TooLong,
                    format!("must be at most {max} characters"),
                ));
            }
            text::check_content(field, s, multiline, issues);
        }
        FieldKind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::NotAllowed,
                format!("must be one of: {}", allowed.join(", ")),
            )),
            None => issues.push(wrong_type("a string")),
        },
        FieldKind::Date => match value.as_str() {
            Some(s) if text::parse_date(s).is_some() => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::InvalidFormat,
                "must be a date in YYYY-MM-DD format",
            )),
            None => issues.push(wrong_type("a date string")),
        },
        FieldKind::Integer { min, max } => match value.as_i64() {
            Some(n) if (min..=max).contains(&n) => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::OutOfRange,
                format!("must be between {min} and {max}"),
            )),
            None => issues.push(wrong_type("an integer")),
        },
        FieldKind::Number { min, max } => match value.as_f64() {
            Some(n) if n.is_finite() && n >= min && n <= max => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::OutOfRange,
                format!("must be between {min} and {max}"),
            )),
            None => issues.push(wrong_type("a number")),
        },
        FieldKind::Bool => {
            if !value.is_boolean() {
                issues.push(wrong_type("a boolean"));
            }
        }
        FieldKind::Email => match value.as_str() {
            // Empty email means "not set".
            Some("") => {}
            Some(s) if text::is_valid_email(s) => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::InvalidFormat,
                "must be a valid email address",
            )),
            None => issues.push(wrong_type("a string")),
        },
        FieldKind::Url => match value.as_str() {
            Some("") => {}
            Some(s) if text::is_valid_url(s) && !text::has_script_injection(s) => {}
            Some(_) => issues.push(FieldIssue::new(
                field,
                IssueKind::InvalidFormat,
                "must be an http(s) URL",
            )),
            None => issues.push(wrong_type("a string")),
        },
        FieldKind::Username => match value.as_str() {
            Some(s) => {
                if let Err(issue) = text::validate_username(s) {
                    issues.push(FieldIssue { field: field.to_string(), ..issue });
                }
            }
            None => issues.push(wrong_type("a string")),
        },
        FieldKind::StringList { max_items, max_len } => {
            let Some(items) = value.as_array() else {
                issues.push(wrong_type("a list of strings"));
                return;
            };
            if items.len() > max_items {
                issues.push(FieldIssue::new(
                    field,
                    IssueKind::TooLong,
                    format!("must have at most {max_items} items"),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let item_field = format!("{field}[{i}]");
                match item.as_str() {
                    Some(s) if s.chars().count() > max_len => issues.push(FieldIssue::new(
                        item_field,
                        IssueKind::TooLong,
                        format!("must be at most {max_len} characters"),
                    )),
                    Some(s) => text::check_content(&item_field, s, false, issues),
                    None => issues.push(FieldIssue::new(
                        item_field,
                        IssueKind::WrongType,
                        "must be a string",
                    )),
                }
            }
        }
        FieldKind::UploadPath => match value.as_str() {
            Some(s) => {
                if let Some(issue) = upload::traversal_issue(field, s) {
                    issues.push(issue);
                }
                text::check_content(field, s, false, issues);
            }
            None => issues.push(wrong_type("a string")),
        },
    }
}

/// Content checks for strings nested anywhere inside `value`.
fn scan_strings(path: &str, value: &Value, issues: &mut Vec<FieldIssue>) {
    match value {
        Value::String(s) => text::check_content(path, s, true, issues),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                scan_strings(&format!("{path}[{i}]"), item, issues);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                scan_strings(&format!("{path}.{key}"), item, issues);
            }
        }
        _ => {}
    }
}

/// Clean every string in the payload, then validate it.
///
/// Declared single-line fields are trimmed and lose all control characters;
/// everything else keeps newlines and tabs. Script-injection content is not
/// rewritten; it is rejected by the validation step.
pub fn sanitize(kind: EntityKind, payload: Value) -> Result<Value, ValidationError> {
    let Value::Object(object) = payload else {
        return Err(ValidationError::single(
            "$",
            IssueKind::Structure,
            "record must be a JSON object",
        ));
    };

    let specs = kind.fields();
    let cleaned: Map<String, Value> = object
        .into_iter()
        .map(|(key, value)| {
            let single_line = specs.iter().any(|s| {
                s.name == key
                    && !matches!(s.kind, FieldKind::LongText { .. })
            });
            let value = clean_strings(value, !single_line);
            (key, value)
        })
        .collect();

    let cleaned = Value::Object(cleaned);
    validate(kind, &cleaned)?;
    Ok(cleaned)
}

fn clean_strings(value: Value, multiline: bool) -> Value {
    match value {
        Value::String(s) => Value::String(text::sanitize_text(&s, multiline)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| clean_strings(v, multiline))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, clean_strings(v, multiline)))
                .collect(),
        ),
        other => other,
    }
}

/// Validate every record of a document's collections.
///
/// Records in known collections are validated against their entity table;
/// records anywhere must be objects whose `id` field (if present) matches
/// their key. Usernames must be unique. Issue paths are
/// `collection/record_id/field`.
pub fn validate_collections(
    collections: &BTreeMap<String, BTreeMap<String, Value>>,
) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    for (name, records) in collections {
        let kind = EntityKind::for_collection(name);
        let mut usernames: HashMap<&str, &str> = HashMap::new();

        for (id, record) in records {
            let prefix = format!("{name}/{id}");
            if id.is_empty() {
                issues.push(FieldIssue::new(prefix.clone(), IssueKind::Structure, "empty record id"));
            }
            let Some(object) = record.as_object() else {
                issues.push(FieldIssue::new(
                    prefix,
                    IssueKind::Structure,
                    "record must be a JSON object",
                ));
                continue;
            };
            if let Some(inner) = object.get("id")
                && inner.as_str() != Some(id.as_str())
            {
                issues.push(FieldIssue::new(
                    format!("{prefix}/id"),
                    IssueKind::Structure,
                    "does not match the record key",
                ));
            }

            match kind {
                Some(kind) => {
                    if let Err(err) = validate(kind, record) {
                        issues.extend(err.issues.into_iter().map(|i| i.prefixed(&prefix)));
                    }
                }
                None => {
                    for (key, value) in object {
                        scan_strings(&format!("{prefix}/{key}"), value, &mut issues);
                    }
                }
            }

            if kind == Some(EntityKind::User)
                && let Some(username) = object.get("username").and_then(Value::as_str)
                && let Some(other) = usernames.insert(username, id)
            {
                issues.push(FieldIssue::new(
                    format!("{prefix}/username"),
                    IssueKind::Duplicate,
                    format!("'{username}' is already used by record {other}"),
                ));
            }
        }
    }

    ValidationError::from_issues(issues)
}
