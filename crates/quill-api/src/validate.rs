use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// `value` must contain something other than whitespace.
pub(crate) fn required(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Like [`required`], for fields that may be omitted entirely.
pub(crate) fn non_empty_if_present(field: &str, value: Option<&str>) -> ApiResult<()> {
    match value {
        Some(v) => required(field, v),
        None => Ok(()),
    }
}

pub(crate) fn id(field: &str, value: &str) -> ApiResult<Uuid> {
    value
        .trim()
        .parse::<Uuid>()
        .map_err(|_| ApiError::validation(format!("{} must be a valid id", field)))
}

pub(crate) fn email(value: &str) -> ApiResult<()> {
    required("email", value)?;
    let (local, domain) = value
        .trim()
        .split_once('@')
        .ok_or_else(|| ApiError::validation("email is invalid"))?;
    if local.is_empty() || domain.is_empty() {
        return Err(ApiError::validation("email is invalid"));
    }
    Ok(())
}

pub(crate) fn positive(field: &str, value: u32) -> ApiResult<u32> {
    if value == 0 {
        return Err(ApiError::validation(format!("{} must be at least 1", field)));
    }
    Ok(value)
}
