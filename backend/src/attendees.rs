//! Attendee email resolution shared by availability and meeting creation.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::models::user::{normalize_email, User};
use crate::store::UserStore;

/// Lower-cased, de-duplicated emails in request order. Blank entries are dropped.
pub fn distinct_emails(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|e| normalize_email(e))
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

/// Resolve every email to a user, in request order.
///
/// Fails with `InvalidArgument` naming each unregistered email; nothing is
/// silently dropped.
pub async fn resolve_strict(users: &dyn UserStore, emails: &[String]) -> Result<Vec<User>> {
    let wanted = distinct_emails(emails);
    if wanted.is_empty() {
        return Ok(vec![]);
    }

    let mut by_email: HashMap<String, User> = users
        .find_by_emails(&wanted)
        .await?
        .into_iter()
        .map(|u| (u.email.clone(), u))
        .collect();

    let missing: Vec<&str> = wanted
        .iter()
        .filter(|e| !by_email.contains_key(*e))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "These emails are not registered users: {}",
            missing.join(", ")
        )));
    }

    Ok(wanted
        .iter()
        .filter_map(|e| by_email.remove(e))
        .collect())
}
