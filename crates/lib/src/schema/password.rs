//! Password strength policy.

use serde::{Deserialize, Serialize};

use super::errors::{FieldIssue, IssueKind, ValidationError};

/// Characters that satisfy the special-character requirement.
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*(),.?\":{}|<>";

/// Requirements a new password must meet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_number: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_number: true,
            require_special: true,
        }
    }
}

/// Coarse strength rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

impl PasswordPolicy {
    /// A policy that accepts any non-empty password.
    pub fn permissive() -> Self {
        Self {
            min_length: 1,
            require_uppercase: false,
            require_number: false,
            require_special: false,
        }
    }

    /// Check `password` against every requirement, reporting all misses.
    pub fn check(&self, password: &str) -> Result<(), ValidationError> {
        const FIELD: &str = "password";
        let mut issues = Vec::new();

        if password.chars().count() < self.min_length {
            issues.push(FieldIssue::new(
                FIELD,
                IssueKind::WeakPassword,
                format!("must be at least {} characters", self.min_length),
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            issues.push(FieldIssue::new(
                FIELD,
                IssueKind::WeakPassword,
                "must contain an uppercase letter",
            ));
        }
        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            issues.push(FieldIssue::new(
                FIELD,
                IssueKind::WeakPassword,
                "must contain a digit",
            ));
        }
        if self.require_special && !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
            issues.push(FieldIssue::new(
                FIELD,
                IssueKind::WeakPassword,
                "must contain a special character",
            ));
        }
        if password.contains('\0') {
            issues.push(FieldIssue::new(
                FIELD,
                IssueKind::ControlCharacters,
                "must not contain NUL",
            ));
        }

        ValidationError::from_issues(issues)
    }

    /// Score length and character-class variety.
    pub fn strength(password: &str) -> PasswordStrength {
        let len = password.chars().count();
        let score = [
            len >= 8,
            len >= 12,
            len >= 16,
            password.chars().any(|c| c.is_lowercase()),
            password.chars().any(|c| c.is_uppercase()),
            password.chars().any(|c| c.is_ascii_digit()),
            password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)),
        ]
        .into_iter()
        .filter(|hit| *hit)
        .count();

        match score {
            0..=3 => PasswordStrength::Weak,
            4..=5 => PasswordStrength::Medium,
            _ => PasswordStrength::Strong,
        }
    }
}
