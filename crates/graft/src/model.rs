// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The resolved graph model: providers, builders, and specifications as held
//! by a registry, addressed by arena ids.
//!
//! Provider variants are a tagged sum over their member kinds; everything the
//! resolver needs (provided type, dependencies, fabrication mode) is exposed
//! through shared accessors so resolution never dispatches on the variant.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::declarations::{FactoryMemberKind, InstantiationMode, SourceRef};
use crate::fabrication::FabricationMode;
use crate::qualified::QualifiedType;

/// Index of a provider in its registry's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub(crate) u32);

/// Index of a builder in its registry's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuilderId(pub(crate) u32);

/// Index of a specification in an injector resolution's closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecId(pub(crate) u32);

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl Display for BuilderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// What kind of recipe backs a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderKind {
    /// A specification method invoked with resolved dependencies.
    MethodFactory,
    /// A specification property read; has no dependencies.
    PropertyFactory,
    /// A reference to a value the specification already holds.
    ReferenceFactory,
    /// A factory derived from the provided type's own constructor and
    /// required properties.
    AutoFactory {
        /// Names of properties set after construction, aligned with the tail
        /// of the provider's dependency list.
        required_properties: Vec<Arc<str>>,
    },
}

impl ProviderKind {
    pub(crate) fn from_member_kind(kind: FactoryMemberKind) -> Self {
        match kind {
            FactoryMemberKind::Method => Self::MethodFactory,
            FactoryMemberKind::Property => Self::PropertyFactory,
            FactoryMemberKind::Reference => Self::ReferenceFactory,
        }
    }
}

/// One registered recipe producing a qualified type from its dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    pub(crate) owner: Option<SpecId>,
    pub(crate) kind: ProviderKind,
    pub(crate) member: Arc<str>,
    pub(crate) provided: QualifiedType,
    pub(crate) dependencies: Vec<QualifiedType>,
    pub(crate) fabrication: FabricationMode,
    pub(crate) partial: bool,
    pub(crate) source: SourceRef,
}

impl Provider {
    /// The specification the provider belongs to; `None` for auto factories.
    #[must_use]
    pub fn owner(&self) -> Option<SpecId> {
        self.owner
    }

    /// The recipe variant.
    #[must_use]
    pub fn kind(&self) -> &ProviderKind {
        &self.kind
    }

    /// The specification member (or constructor) name, for emission.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The qualified type the provider produces.
    #[must_use]
    pub fn provided(&self) -> &QualifiedType {
        &self.provided
    }

    /// Qualified types the provider needs, in invocation order.
    #[must_use]
    pub fn dependencies(&self) -> &[QualifiedType] {
        &self.dependencies
    }

    /// Caching behavior of the produced value.
    #[must_use]
    pub fn fabrication(&self) -> FabricationMode {
        self.fabrication
    }

    /// Whether the provider contributes one part of a multi-bind collection.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Where the provider was declared.
    #[must_use]
    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}

/// One registered recipe mutating an already-constructed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    pub(crate) owner: SpecId,
    pub(crate) member: Arc<str>,
    pub(crate) built: QualifiedType,
    pub(crate) dependencies: Vec<QualifiedType>,
    pub(crate) source: SourceRef,
}

impl Builder {
    /// The specification the builder belongs to.
    #[must_use]
    pub fn owner(&self) -> SpecId {
        self.owner
    }

    /// The specification member name, for emission.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The qualified type of the instance being mutated.
    #[must_use]
    pub fn built(&self) -> &QualifiedType {
        &self.built
    }

    /// Dependencies beyond the target instance, in invocation order.
    #[must_use]
    pub fn dependencies(&self) -> &[QualifiedType] {
        &self.dependencies
    }

    /// Where the builder was declared.
    #[must_use]
    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}

/// A specification as seen by one injector's resolution.
#[derive(Debug, Clone)]
pub struct Specification {
    pub(crate) name: Arc<str>,
    pub(crate) mode: InstantiationMode,
    pub(crate) externally_supplied: bool,
    pub(crate) source: SourceRef,
}

impl Specification {
    /// The specification's declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// How members are invoked.
    #[must_use]
    pub fn mode(&self) -> InstantiationMode {
        self.mode
    }

    /// Whether the instance arrives from outside the injector: a dependency
    /// interface, or a constructed specification passed to a child injector.
    #[must_use]
    pub fn is_externally_supplied(&self) -> bool {
        self.externally_supplied
    }

    /// Where the specification was declared.
    #[must_use]
    pub fn source(&self) -> &SourceRef {
        &self.source
    }
}
