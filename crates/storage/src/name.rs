//! Content name validation.
//!
//! Content objects live in a flat namespace: a name is exactly one path
//! component below the storage root. This module rejects anything that could
//! escape the root or address something other than a single file.

use std::path::{Component, Path};

use crate::error::{ErrorKind, Result};

/// Validates a content name for security and correctness.
///
/// A valid name is a single, normal path component: non-empty, without
/// separators, without `.`/`..`, and without null bytes.
///
/// # Returns
/// Returns the name unchanged if valid, or [`InvalidName`](crate::error::ErrorKind::InvalidName)
/// if invalid.
///
/// # Examples
///
/// ```
/// use fetchbox_storage::validate_name;
/// // Valid names
/// assert!(validate_name("aB3dE9fGh1").is_ok());
/// assert!(validate_name("cat.png").is_ok());
/// // Invalid names
/// assert!(validate_name("../etc/passwd").is_err());
/// assert!(validate_name("a/b").is_err());
/// assert!(validate_name("..").is_err());
/// assert!(validate_name("a\0b").is_err());
/// ```
pub fn validate(name: &str) -> Result<&str> {
    // Null bytes pass through Path::components() on Unix but truncate the
    // name in C-based syscalls.
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        exn::bail!(ErrorKind::InvalidName(name.to_string()));
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(component)), None) if component == name => Ok(name),
        _ => exn::bail!(ErrorKind::InvalidName(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("simple")]
    #[case("aB3dE9fGh1")]
    #[case("with.extension.png")]
    #[case(".hidden")]
    #[case("name with spaces")]
    fn test_valid_names(#[case] name: &str) {
        assert_eq!(validate(name).unwrap(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/b")]
    #[case("a/")]
    #[case("/root")]
    #[case("a\\b")]
    #[case("a\0b")]
    #[case("\0")]
    fn test_invalid_names(#[case] name: &str) {
        let err = validate(name).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(n) if n == name));
    }
}
