//! Naming rules for Views and Groups
//!
//! Child names must:
//! - Be non-empty
//! - Not contain the path delimiter (`/`)
//!
//! Paths are child names joined by the delimiter. The root Group has an
//! empty name and an empty path.

use thiserror::Error;

/// Delimiter between names in a Group/View path
pub const PATH_DELIMITER: char = '/';

/// Reason a name was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    /// Name is empty
    #[error("name cannot be empty")]
    Empty,
    /// Name contains the path delimiter
    #[error("name cannot contain the path delimiter '{delimiter}' (found at byte {position})")]
    ContainsDelimiter {
        /// The delimiter character
        delimiter: char,
        /// Byte position of the first delimiter
        position: usize,
    },
    /// The root Group keeps its empty name
    #[error("the root group has no name and cannot be renamed")]
    Root,
}

/// Validate a child View/Group name
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if let Some(position) = name.find(PATH_DELIMITER) {
        return Err(NameError::ContainsDelimiter {
            delimiter: PATH_DELIMITER,
            position,
        });
    }
    Ok(())
}

/// Split a path into its first segment and the remainder
///
/// Leading delimiters are ignored. Returns `None` for an empty path.
///
/// ```
/// use meshstore_core::name::split_path;
/// assert_eq!(split_path("a/b/c"), Some(("a", Some("b/c"))));
/// assert_eq!(split_path("leaf"), Some(("leaf", None)));
/// ```
pub fn split_path(path: &str) -> Option<(&str, Option<&str>)> {
    let path = path.trim_start_matches(PATH_DELIMITER);
    if path.is_empty() {
        return None;
    }
    match path.split_once(PATH_DELIMITER) {
        Some((head, rest)) if !rest.is_empty() => Some((head, Some(rest))),
        Some((head, _)) => Some((head, None)),
        None => Some((path, None)),
    }
}

/// Join a parent path and a child name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        let mut out = String::with_capacity(parent.len() + 1 + name.len());
        out.push_str(parent);
        out.push(PATH_DELIMITER);
        out.push_str(name);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_names() {
        assert!(validate_name("x").is_ok());
        assert!(validate_name("coords_x").is_ok());
        assert!(validate_name("with space.and-dash").is_ok());
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
    }

    #[test]
    fn test_delimiter_in_name() {
        assert_eq!(
            validate_name("a/b"),
            Err(NameError::ContainsDelimiter {
                delimiter: '/',
                position: 1
            })
        );
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path(""), None);
        assert_eq!(split_path("/"), None);
        assert_eq!(split_path("/a/b"), Some(("a", Some("b"))));
        assert_eq!(split_path("a/"), Some(("a", None)));
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "a"), "a");
        assert_eq!(join_path("a/b", "c"), "a/b/c");
    }

    proptest! {
        #[test]
        fn prop_names_without_delimiter_are_valid(name in "[a-zA-Z0-9_. -]{1,32}") {
            prop_assert!(validate_name(&name).is_ok());
        }

        #[test]
        fn prop_join_then_split(parent in "[a-z]{1,8}", child in "[a-z]{1,8}") {
            let joined = join_path(&parent, &child);
            prop_assert_eq!(split_path(&joined), Some((parent.as_str(), Some(child.as_str()))));
        }
    }
}
