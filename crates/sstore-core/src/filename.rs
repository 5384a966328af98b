//! Filename gate for the artifact store.
//!
//! Every name that reaches the data directory passes through [`validate`]
//! first. Only the literal character classes below are checked; there is no
//! case folding or Unicode normalization.
//!
//! Accepted alphabet: `[A-Za-z0-9_.-]`, excluding `.`, `..` and any name
//! containing the `..` sequence.

use std::fmt;

use thiserror::Error;

/// Why a filename was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilenameError {
    #[error("filename cannot be empty")]
    Empty,

    #[error("filename contains path traversal attempt")]
    Traversal,

    #[error("filename cannot contain path separators")]
    Separator,

    #[error("filename contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("filename cannot be a dot name")]
    DotName,
}

/// Check `name` against the filename gate. Pure; never touches the filesystem.
pub fn validate(name: &str) -> Result<(), FilenameError> {
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }
    if name.contains("..") {
        return Err(FilenameError::Traversal);
    }
    if name.contains(['/', '\\']) {
        return Err(FilenameError::Separator);
    }
    if let Some(bad) = name.chars().find(|c| !is_allowed(*c)) {
        return Err(FilenameError::InvalidChar(bad));
    }
    // ".." is already caught as traversal; kept for the explicit rule.
    if name == "." || name == ".." {
        return Err(FilenameError::DotName);
    }
    Ok(())
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// A filename that has passed [`validate`].
///
/// The artifact store only accepts `SafeName`, so no unchecked string can be
/// joined onto the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SafeName(String);

impl SafeName {
    pub fn parse(name: &str) -> Result<Self, FilenameError> {
        validate(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SafeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["file.txt", "my-file.txt", "my_file.txt", "file123.txt", "my-file_1.txt"] {
            assert_eq!(validate(name), Ok(()), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(validate(""), Err(FilenameError::Empty));
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(validate("../../etc/passwd"), Err(FilenameError::Traversal));
        assert_eq!(validate("..\\windows\\system32"), Err(FilenameError::Traversal));
        assert_eq!(validate(".."), Err(FilenameError::Traversal));
        assert_eq!(validate("a..b"), Err(FilenameError::Traversal));
    }

    #[test]
    fn rejects_separators() {
        assert_eq!(validate("some/file.txt"), Err(FilenameError::Separator));
        assert_eq!(validate("some\\file.txt"), Err(FilenameError::Separator));
        assert_eq!(validate("/etc"), Err(FilenameError::Separator));
    }

    #[test]
    fn rejects_single_dot() {
        assert_eq!(validate("."), Err(FilenameError::DotName));
    }

    #[test]
    fn rejects_special_chars() {
        assert_eq!(validate("file<>.txt"), Err(FilenameError::InvalidChar('<')));
        assert_eq!(validate("with space"), Err(FilenameError::InvalidChar(' ')));
        assert_eq!(validate("naïve.txt"), Err(FilenameError::InvalidChar('ï')));
        assert_eq!(validate("nul\0byte"), Err(FilenameError::InvalidChar('\0')));
    }

    #[test]
    fn safe_name_roundtrips_str() {
        let name = SafeName::parse("report.pdf").unwrap();
        assert_eq!(name.as_str(), "report.pdf");
        assert_eq!(name.to_string(), "report.pdf");
        assert!(SafeName::parse("../report.pdf").is_err());
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn allowed_alphabet_without_double_dot_is_accepted(
                name in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,40}"
            ) {
                prop_assume!(!name.contains(".."));
                prop_assert_eq!(validate(&name), Ok(()));
            }

            #[test]
            fn any_separator_is_rejected(
                prefix in "[a-z]{0,8}",
                sep in prop_oneof![Just('/'), Just('\\')],
                suffix in "[a-z]{0,8}",
            ) {
                let name = format!("{prefix}{sep}{suffix}");
                prop_assert!(validate(&name).is_err());
            }

            #[test]
            fn accepted_names_stay_inside_alphabet(name in "\\PC{0,24}") {
                if validate(&name).is_ok() {
                    prop_assert!(name.chars().all(is_allowed));
                    prop_assert!(!name.contains(".."));
                    prop_assert!(name != ".");
                }
            }
        }
    }
}
