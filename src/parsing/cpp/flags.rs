//! Compiler flag handling.
//!
//! Only flags that change how a file is read are interpreted; everything else
//! a build system passes along is accepted and ignored.

use crate::parsing::ParseError;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// Value of `-std=`
    pub standard: Option<String>,
    pub include_dirs: Vec<PathBuf>,
}

impl CompileFlags {
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ParseError> {
        let mut flags = Self::default();
        let mut iter = args.iter().map(AsRef::as_ref);

        while let Some(arg) = iter.next() {
            if let Some(standard) = arg.strip_prefix("-std=") {
                if !is_cxx_standard(standard) {
                    return Err(unsupported(arg, "not a C++ language standard"));
                }
                flags.standard = Some(standard.to_string());
            } else if let Some(rest) = arg.strip_prefix("-x") {
                let language = if rest.is_empty() {
                    iter.next().unwrap_or_default()
                } else {
                    rest
                };
                if language != "c++" {
                    return Err(unsupported(arg, "only c++ sources can be parsed"));
                }
            } else if let Some(rest) = arg.strip_prefix("-I") {
                let dir = if rest.is_empty() {
                    iter.next().unwrap_or_default()
                } else {
                    rest
                };
                if !dir.is_empty() {
                    flags.include_dirs.push(PathBuf::from(dir));
                }
            } else {
                tracing::trace!("[parser] ignoring flag {arg}");
            }
        }

        Ok(flags)
    }
}

fn is_cxx_standard(standard: &str) -> bool {
    standard
        .strip_prefix("c++")
        .or_else(|| standard.strip_prefix("gnu++"))
        .is_some_and(|version| !version.is_empty())
}

fn unsupported(flag: &str, reason: &str) -> ParseError {
    ParseError::UnsupportedFlag {
        flag: flag.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::DEFAULT_FLAGS;

    #[test]
    fn test_default_flags_are_accepted() {
        let flags = CompileFlags::from_args(DEFAULT_FLAGS).unwrap();
        assert_eq!(flags.standard.as_deref(), Some("c++17"));
        assert!(flags.include_dirs.is_empty());
    }

    #[test]
    fn test_include_dirs_joined_and_separate() {
        let flags = CompileFlags::from_args(&["-Iinclude", "-I", "third_party", "-DNDEBUG"]).unwrap();
        assert_eq!(
            flags.include_dirs,
            vec![PathBuf::from("include"), PathBuf::from("third_party")]
        );
    }

    #[test]
    fn test_non_cxx_standard_is_rejected() {
        let err = CompileFlags::from_args(&["-std=c11"]).unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedFlag { ref flag, .. } if flag == "-std=c11"));
        assert!(CompileFlags::from_args(&["-std=gnu++20"]).is_ok());
    }

    #[test]
    fn test_non_cxx_language_is_rejected() {
        assert!(CompileFlags::from_args(&["-x", "c"]).is_err());
        assert!(CompileFlags::from_args(&["-xobjective-c++"]).is_err());
        assert!(CompileFlags::from_args(&["-x", "c++"]).is_ok());
    }
}
