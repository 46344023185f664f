// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Diagnostics and errors.
//!
//! User-caused problems (malformed or incomplete declarations) are *data*:
//! they accumulate into per-injector [`Diagnostic`] lists so a single pass
//! reports everything at once, and one injector's problems never abort its
//! siblings. The [`Error`] type is reserved for defects in the resolver
//! itself, such as touching a registry outside its phase.

use std::borrow::Cow;
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::declarations::SourceRef;

/// The result for fallible operations that use the [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a user-visible diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A declaration is structurally malformed: conflicting single-value
    /// bindings, a builder with no dependencies, a dependency-mode
    /// specification declaring a builder or link, a construction cycle.
    InvalidSpecification,
    /// A required qualified type has no registered provider.
    IncompleteSpecification,
    /// The resolver violated one of its own invariants; never user-caused.
    InternalError,
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InvalidSpecification => "invalid specification",
            Self::IncompleteSpecification => "incomplete specification",
            Self::InternalError => "internal error",
        })
    }
}

/// One user-visible problem, tied to the offending declaration's source
/// reference.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    kind: DiagnosticKind,
    message: String,
    source: SourceRef,
}

impl Diagnostic {
    pub(crate) fn invalid(source: SourceRef, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::InvalidSpecification,
            message: message.into(),
            source,
        }
    }

    pub(crate) fn incomplete(source: SourceRef, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::IncompleteSpecification,
            message: message.into(),
            source,
        }
    }

    pub(crate) fn internal(source: SourceRef, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::InternalError,
            message: message.into(),
            source,
        }
    }

    /// The diagnostic's classification.
    #[must_use]
    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    /// The human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Where the offending declaration came from.
    #[must_use]
    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.message, self.source)
    }
}

/// An error raised when the resolver violates one of its own invariants.
///
/// This is always a defect in the resolver, never a problem with the input;
/// user-caused problems surface as [`Diagnostic`]s instead.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(ErrorKind);

#[derive(Debug, thiserror::Error)]
pub(crate) enum ErrorKind {
    #[error("registry mutated after the registration phase was sealed")]
    RegistryMutatedAfterSeal,

    #[error("resolution attempted before the registration phase was sealed")]
    RegistryNotSealed,

    #[error("{0}")]
    Internal(Cow<'static, str>),
}

impl Error {
    pub(crate) const fn from_kind(kind: ErrorKind) -> Self {
        Self(kind)
    }

    pub(crate) fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::from_kind(ErrorKind::Internal(message.into()))
    }

    #[cfg(test)]
    pub(crate) const fn kind(&self) -> &ErrorKind {
        &self.0
    }
}
