//! Typed access to the `users` collection of a store document.

use serde_json::Value;

use super::errors::UserError;
use super::types::{Role, UserRecord};
use crate::Result;
use crate::constants::USERS;
use crate::storage::Document;

fn decode(id: &str, value: &Value) -> Result<UserRecord> {
    serde_json::from_value(value.clone()).map_err(|source| {
        UserError::MalformedRecord {
            id: id.to_string(),
            source,
        }
        .into()
    })
}

/// All user records, in key order.
pub(crate) fn all(document: &Document) -> Result<Vec<UserRecord>> {
    document
        .collection(USERS)
        .into_iter()
        .flatten()
        .map(|(id, value)| decode(id, value))
        .collect()
}

pub(crate) fn get(document: &Document, id: &str) -> Result<Option<UserRecord>> {
    document
        .get(USERS, id)
        .map(|value| decode(id, value))
        .transpose()
}

/// Exact, case-sensitive username match.
pub(crate) fn find_by_username(document: &Document, username: &str) -> Result<Option<UserRecord>> {
    let Some(users) = document.collection(USERS) else {
        return Ok(None);
    };
    users
        .iter()
        .find(|(_, value)| value.get("username").and_then(Value::as_str) == Some(username))
        .map(|(id, value)| decode(id, value))
        .transpose()
}

/// Insert or replace a record under its id.
pub(crate) fn put(document: &mut Document, user: &UserRecord) -> Result<()> {
    let value = serde_json::to_value(user).map_err(|source| UserError::MalformedRecord {
        id: user.id.clone(),
        source,
    })?;
    document.insert(USERS, user.id.clone(), value);
    Ok(())
}

pub(crate) fn remove(document: &mut Document, id: &str) -> Option<Value> {
    document.remove(USERS, id)
}

/// Admins that are enabled, i.e. count toward the last-admin rule.
pub(crate) fn active_admin_count(document: &Document) -> Result<usize> {
    Ok(all(document)?
        .iter()
        .filter(|user| user.role == Role::Admin && user.is_active)
        .count())
}

/// Whether some Admin can currently log in.
pub(crate) fn has_usable_admin(document: &Document) -> Result<bool> {
    Ok(all(document)?.iter().any(|user| {
        user.role == Role::Admin
            && user.is_active
            && !user.must_reset_password
            && user.password_hash.is_some()
    }))
}
