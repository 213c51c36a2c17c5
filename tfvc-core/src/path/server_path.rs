use crate::error::{Result, TfvcError};

pub const ROOT: &str = "$/";
pub const SEPARATOR: char = '/';

/// Normalizes a server path: `\` becomes `/`, duplicate separators and `.`
/// segments are dropped, `..` is resolved and a trailing separator is removed.
///
/// With `validate_dollar` set, no segment below the root may begin with `$`.
pub fn canonicalize(path: &str, validate_dollar: bool) -> Result<String> {
    let normalized = path.trim().replace('\\', "/");
    if normalized.is_empty() {
        return Err(TfvcError::InvalidPath("server path is empty".to_string()));
    }

    let rest = if normalized == "$" {
        ""
    } else if let Some(rest) = normalized.strip_prefix(ROOT) {
        rest
    } else {
        return Err(TfvcError::InvalidPath(format!(
            "server path must start with {ROOT}: {path}"
        )));
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split(SEPARATOR) {
        match segment {
            "" | "." => continue,
            ".." => {
                if segments.pop().is_none() {
                    return Err(TfvcError::InvalidPath(format!(
                        "server path escapes the root: {path}"
                    )));
                }
            }
            segment => {
                if validate_dollar && segment.starts_with('$') {
                    return Err(TfvcError::InvalidPath(format!(
                        "segment '{segment}' may not start with $: {path}"
                    )));
                }
                segments.push(segment);
            }
        }
    }

    Ok(format!("{ROOT}{}", segments.join("/")))
}

pub fn is_server_path(path: &str) -> bool {
    let trimmed = path.trim();
    trimmed == "$" || trimmed.starts_with(ROOT) || trimmed.starts_with("$\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_with_dollar_validation() {
        assert!(canonicalize("$/test/$path", true).is_err());
    }

    #[test]
    fn test_canonicalize_without_dollar_validation() -> anyhow::Result<()> {
        assert_eq!(canonicalize("$/test/$path", false)?, "$/test/$path");
        Ok(())
    }

    #[test]
    fn test_canonicalize_normalizes() -> anyhow::Result<()> {
        assert_eq!(canonicalize("$", false)?, "$/");
        assert_eq!(canonicalize("$/", false)?, "$/");
        assert_eq!(canonicalize("$/proj/", false)?, "$/proj");
        assert_eq!(canonicalize("$\\proj\\src", false)?, "$/proj/src");
        assert_eq!(canonicalize("$/proj//src/./main.rs", false)?, "$/proj/src/main.rs");
        assert_eq!(canonicalize("$/proj/src/../lib", false)?, "$/proj/lib");
        Ok(())
    }

    #[test]
    fn test_canonicalize_rejects() {
        assert!(canonicalize("", false).is_err());
        assert!(canonicalize("proj/src", false).is_err());
        assert!(canonicalize("$/..", false).is_err());
    }

    #[test]
    fn test_is_server_path() {
        assert!(is_server_path("$/proj"));
        assert!(is_server_path("$\\proj"));
        assert!(!is_server_path("/home/user/proj"));
        assert!(!is_server_path("$HOME/proj"));
    }
}
