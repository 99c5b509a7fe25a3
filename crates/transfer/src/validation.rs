use std::fmt;
use std::str::FromStr;

use crate::{TransferError, UploadFile};

/// One entry of an accept pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AcceptEntry {
    /// `.pdf`
    Extension(String),
    /// `image/png`
    Mime(String),
    /// `image/*`
    MimeGroup(String),
    /// `*/*` or `*`
    Any,
}

/// A comma separated list of accepted types, e.g. `image/*,.pdf`.
///
/// A file matches when any entry matches its MIME type or extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptPattern {
    entries: Vec<AcceptEntry>,
}

impl AcceptPattern {
    /// Returns `true` if the file satisfies at least one entry.
    pub fn matches(&self, file: &UploadFile) -> bool {
        let mime = file.mime_type.to_lowercase();
        let ext = file.extension();

        self.entries.iter().any(|entry| match entry {
            AcceptEntry::Any => true,
            AcceptEntry::Extension(e) => ext.as_deref() == Some(e.as_str()),
            AcceptEntry::Mime(m) => mime == *m,
            AcceptEntry::MimeGroup(group) => mime
                .split_once('/')
                .is_some_and(|(prefix, _)| prefix == group),
        })
    }
}

impl FromStr for AcceptPattern {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut entries = Vec::new();

        for raw in s.split(',') {
            let entry = raw.trim().to_lowercase();
            if entry.is_empty() {
                continue;
            }

            if entry == "*" || entry == "*/*" {
                entries.push(AcceptEntry::Any);
            } else if entry.starts_with('.') && entry.len() > 1 {
                entries.push(AcceptEntry::Extension(entry));
            } else if let Some((group, subtype)) = entry.split_once('/') {
                if group.is_empty() || subtype.is_empty() || group == "*" {
                    return Err(TransferError::InvalidAcceptPattern(raw.trim().to_string()));
                }
                if subtype == "*" {
                    entries.push(AcceptEntry::MimeGroup(group.to_string()));
                } else {
                    entries.push(AcceptEntry::Mime(entry));
                }
            } else {
                return Err(TransferError::InvalidAcceptPattern(raw.trim().to_string()));
            }
        }

        if entries.is_empty() {
            return Err(TransferError::InvalidAcceptPattern(s.to_string()));
        }
        Ok(Self { entries })
    }
}

/// Rules a candidate must satisfy before it becomes an upload task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConstraints {
    pub accept: Option<AcceptPattern>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    /// Whether more than one file is uploaded per drop.
    pub is_multi: bool,
}

impl Default for UploadConstraints {
    fn default() -> Self {
        Self {
            accept: None,
            min_size: None,
            max_size: None,
            is_multi: true,
        }
    }
}

/// Why a candidate was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectCode {
    FileInvalidType,
    FileTooLarge,
    FileTooSmall,
}

impl RejectCode {
    /// Stable code string reported to the presentation layer.
    pub fn as_str(self) -> &'static str {
        match self {
            RejectCode::FileInvalidType => "file-invalid-type",
            RejectCode::FileTooLarge => "file-too-large",
            RejectCode::FileTooSmall => "file-too-small",
        }
    }
}

impl fmt::Display for RejectCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate that failed validation, with every rule it broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file: UploadFile,
    pub errors: Vec<RejectCode>,
}

/// Candidates split by [`validate_candidates`], both in input order.
#[derive(Debug, Clone, Default)]
pub struct Validated {
    pub accepted: Vec<UploadFile>,
    pub rejected: Vec<Rejection>,
}

/// Partitions candidates into accepted files and rejections.
pub fn validate_candidates(files: Vec<UploadFile>, constraints: &UploadConstraints) -> Validated {
    let mut validated = Validated::default();

    for file in files {
        let errors = check_file(&file, constraints);
        if errors.is_empty() {
            validated.accepted.push(file);
        } else {
            validated.rejected.push(Rejection { file, errors });
        }
    }

    validated
}

fn check_file(file: &UploadFile, constraints: &UploadConstraints) -> Vec<RejectCode> {
    let mut errors = Vec::new();

    if constraints
        .accept
        .as_ref()
        .is_some_and(|accept| !accept.matches(file))
    {
        errors.push(RejectCode::FileInvalidType);
    }
    if constraints.max_size.is_some_and(|max| file.size > max) {
        errors.push(RejectCode::FileTooLarge);
    }
    if constraints.min_size.is_some_and(|min| file.size < min) {
        errors.push(RejectCode::FileTooSmall);
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, size: usize) -> UploadFile {
        UploadFile::from_bytes(name, mime, vec![0u8; size])
    }

    #[test]
    fn parses_mixed_pattern() {
        let pattern: AcceptPattern = "image/*, .pdf ,application/json".parse().unwrap();
        assert!(pattern.matches(&file("a.png", "image/png", 1)));
        assert!(pattern.matches(&file("doc.PDF", "application/octet-stream", 1)));
        assert!(pattern.matches(&file("data.bin", "application/json", 1)));
        assert!(!pattern.matches(&file("movie.mp4", "video/mp4", 1)));
    }

    #[test]
    fn wildcard_accepts_everything() {
        let pattern: AcceptPattern = "*/*".parse().unwrap();
        assert!(pattern.matches(&file("x", "", 1)));
    }

    #[test]
    fn mime_match_is_case_insensitive() {
        let pattern: AcceptPattern = "IMAGE/PNG".parse().unwrap();
        assert!(pattern.matches(&file("a.png", "Image/Png", 1)));
    }

    #[test]
    fn rejects_invalid_patterns() {
        assert!("".parse::<AcceptPattern>().is_err());
        assert!(" , ".parse::<AcceptPattern>().is_err());
        assert!("image".parse::<AcceptPattern>().is_err());
        assert!("image/".parse::<AcceptPattern>().is_err());
        assert!("*/png".parse::<AcceptPattern>().is_err());
        assert!(".".parse::<AcceptPattern>().is_err());
    }

    #[test]
    fn default_constraints_accept_all() {
        let out = validate_candidates(
            vec![file("a.png", "image/png", 1), file("b.txt", "text/plain", 0)],
            &UploadConstraints::default(),
        );
        assert_eq!(out.accepted.len(), 2);
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn partitions_by_type_and_size_keeping_order() {
        let constraints = UploadConstraints {
            accept: Some("image/*".parse().unwrap()),
            min_size: Some(2),
            max_size: Some(10),
            is_multi: true,
        };
        let out = validate_candidates(
            vec![
                file("ok1.png", "image/png", 5),
                file("big.png", "image/png", 11),
                file("doc.pdf", "application/pdf", 1),
                file("ok2.gif", "image/gif", 10),
            ],
            &constraints,
        );

        let accepted: Vec<_> = out.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(accepted, vec!["ok1.png", "ok2.gif"]);

        assert_eq!(out.rejected.len(), 2);
        assert_eq!(out.rejected[0].file.name, "big.png");
        assert_eq!(out.rejected[0].errors, vec![RejectCode::FileTooLarge]);
        assert_eq!(out.rejected[1].file.name, "doc.pdf");
        assert_eq!(
            out.rejected[1].errors,
            vec![RejectCode::FileInvalidType, RejectCode::FileTooSmall]
        );
    }

    #[test]
    fn size_bounds_are_inclusive() {
        let constraints = UploadConstraints {
            min_size: Some(3),
            max_size: Some(3),
            ..Default::default()
        };
        let out = validate_candidates(vec![file("a", "text/plain", 3)], &constraints);
        assert_eq!(out.accepted.len(), 1);
    }

    #[test]
    fn reject_codes_use_dropzone_names() {
        assert_eq!(RejectCode::FileInvalidType.to_string(), "file-invalid-type");
        assert_eq!(RejectCode::FileTooLarge.as_str(), "file-too-large");
        assert_eq!(RejectCode::FileTooSmall.as_str(), "file-too-small");
    }
}
