use url::Url;

use crate::error::{EditorError, EditorResult};

pub const MIN_PASSWORD_LEN: usize = 6;

pub fn item_title(raw: &str) -> EditorResult<String> {
    non_empty(raw, "item title")
}

pub fn list_title(raw: &str) -> EditorResult<String> {
    non_empty(raw, "list title")
}

pub fn tier_name(raw: &str) -> EditorResult<String> {
    non_empty(raw, "tier name")
}

/// Blank input means "no image". Anything else must be an absolute URL.
pub fn image_url(raw: Option<&str>) -> EditorResult<Option<String>> {
    let Some(trimmed) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    Url::parse(trimmed)
        .map_err(|err| EditorError::validation(format!("image url '{trimmed}': {err}")))?;
    Ok(Some(trimmed.to_string()))
}

/// `local@domain.tld`, no whitespace.
pub fn email(raw: &str) -> EditorResult<String> {
    let trimmed = raw.trim();
    let valid = !trimmed.chars().any(char::is_whitespace)
        && trimmed.split_once('@').is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain
                    .rsplit_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        });
    if !valid {
        return Err(EditorError::validation("please enter a valid email address"));
    }
    Ok(trimmed.to_string())
}

pub fn password(raw: &str) -> EditorResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(EditorError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn non_empty(raw: &str, what: &str) -> EditorResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EditorError::validation(format!("{what} must not be empty")));
    }
    Ok(trimmed.to_string())
}
