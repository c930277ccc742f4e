use std::collections::HashSet;

use thiserror::Error;

use crate::{
    domain::TodoId,
    protocol::{CreateTodoRequest, UpdateTodoRequest},
};

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("title must be at most {TITLE_MAX_CHARS} characters (got {len})")]
    TitleTooLong { len: usize },
    #[error("description must be at most {DESCRIPTION_MAX_CHARS} characters (got {len})")]
    DescriptionTooLong { len: usize },
    #[error("todo {0} appears more than once in reorder request")]
    DuplicateId(TodoId),
}

/// Trims the title and checks its bounds. Lengths count characters, not bytes.
pub fn normalize_title(raw: &str) -> Result<String, ValidationError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(ValidationError::TitleTooLong { len });
    }
    Ok(title.to_string())
}

/// Trims the description; blank collapses to `None`.
pub fn normalize_description(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(description) = raw.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::DescriptionTooLong { len });
    }
    Ok(Some(description.to_string()))
}

pub fn normalize_create(request: &CreateTodoRequest) -> Result<CreateTodoRequest, ValidationError> {
    Ok(CreateTodoRequest {
        title: normalize_title(&request.title)?,
        description: normalize_description(request.description.as_deref())?,
        due_date: request.due_date,
        order: request.order,
    })
}

/// A description that is present but blank is read as a request to clear it.
pub fn normalize_update(request: &UpdateTodoRequest) -> Result<UpdateTodoRequest, ValidationError> {
    let title = request.title.as_deref().map(normalize_title).transpose()?;
    let description = normalize_description(request.description.as_deref())?;
    let clear_description = request.clear_description
        || (request.description.is_some() && description.is_none());

    Ok(UpdateTodoRequest {
        title,
        description,
        due_date: request.due_date,
        completed: request.completed,
        clear_description,
        clear_due_date: request.clear_due_date && request.due_date.is_none(),
    })
}

pub fn ensure_unique_ids(ids: &[TodoId]) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(ValidationError::DuplicateId(*id));
        }
    }
    Ok(())
}
