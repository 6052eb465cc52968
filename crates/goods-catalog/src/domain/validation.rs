//! Input validation. Runs before any store call.

use goods_core::command::{CreateGood, DeleteGood, ListGoods, ReprioritizeGood, UpdateGood};
use goods_core::error::DomainError;

fn bad_request(reason: &str) -> DomainError {
    DomainError::BadRequest(reason.to_owned())
}

fn non_negative(value: i64, reason: &str) -> Result<(), DomainError> {
    if value < 0 {
        return Err(bad_request(reason));
    }
    Ok(())
}

fn non_empty(value: &str, reason: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(bad_request(reason));
    }
    Ok(())
}

/// # Errors
///
/// Returns `DomainError::BadRequest` for a negative project id or empty name.
pub fn validate_create(command: &CreateGood) -> Result<(), DomainError> {
    non_negative(command.project_id, "negative project id")?;
    non_empty(&command.name, "empty name")
}

/// # Errors
///
/// Returns `DomainError::BadRequest` for negative ids or empty name or
/// description.
pub fn validate_update(command: &UpdateGood) -> Result<(), DomainError> {
    non_negative(command.id, "negative id")?;
    non_negative(command.project_id, "negative project id")?;
    non_empty(&command.name, "empty name")?;
    non_empty(&command.description, "empty description")
}

/// # Errors
///
/// Returns `DomainError::BadRequest` for negative ids.
pub fn validate_delete(command: &DeleteGood) -> Result<(), DomainError> {
    non_negative(command.id, "negative id")?;
    non_negative(command.project_id, "negative project id")
}

/// # Errors
///
/// Returns `DomainError::BadRequest` for a negative limit or offset.
pub fn validate_list(query: &ListGoods) -> Result<(), DomainError> {
    non_negative(query.limit, "negative limit")?;
    non_negative(query.offset, "negative offset")
}

/// # Errors
///
/// Returns `DomainError::BadRequest` for negative ids or a priority below 1.
pub fn validate_reprioritize(command: &ReprioritizeGood) -> Result<(), DomainError> {
    non_negative(command.id, "negative id")?;
    non_negative(command.project_id, "negative project id")?;
    if command.new_priority < 1 {
        return Err(bad_request("new priority must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(result: Result<(), DomainError>) -> String {
        match result {
            Err(DomainError::BadRequest(reason)) => reason,
            other => panic!("expected BadRequest, got {other:?}"),
        }
    }

    #[test]
    fn test_create_rejects_negative_project_and_empty_name() {
        assert_eq!(
            reason(validate_create(&CreateGood {
                project_id: -1,
                name: "widget".into()
            })),
            "negative project id"
        );
        assert_eq!(
            reason(validate_create(&CreateGood {
                project_id: 1,
                name: String::new()
            })),
            "empty name"
        );
        assert!(
            validate_create(&CreateGood {
                project_id: 0,
                name: "widget".into()
            })
            .is_ok()
        );
    }

    #[test]
    fn test_update_requires_description() {
        let command = UpdateGood {
            id: 1,
            project_id: 1,
            name: "widget".into(),
            description: String::new(),
        };

        assert_eq!(reason(validate_update(&command)), "empty description");
    }

    #[test]
    fn test_delete_rejects_negative_id() {
        assert_eq!(
            reason(validate_delete(&DeleteGood {
                id: -5,
                project_id: 1
            })),
            "negative id"
        );
    }

    #[test]
    fn test_list_rejects_negative_window() {
        assert_eq!(
            reason(validate_list(&ListGoods {
                limit: -1,
                offset: 0
            })),
            "negative limit"
        );
        assert_eq!(
            reason(validate_list(&ListGoods {
                limit: 10,
                offset: -1
            })),
            "negative offset"
        );
    }

    #[test]
    fn test_reprioritize_rejects_non_positive_priority() {
        for new_priority in [0, -3] {
            let command = ReprioritizeGood {
                id: 1,
                project_id: 1,
                new_priority,
            };
            assert_eq!(
                reason(validate_reprioritize(&command)),
                "new priority must be positive"
            );
        }
        assert!(
            validate_reprioritize(&ReprioritizeGood {
                id: 1,
                project_id: 1,
                new_priority: 1
            })
            .is_ok()
        );
    }
}
