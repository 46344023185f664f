// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Boundary input records.
//!
//! The declaration-extraction stage (annotation parsing, symbol walking) is a
//! separate concern; it hands this crate plain records describing
//! specifications, factories, builders, links, and injector contracts. The
//! resolver never inspects annotation syntax, only these fields.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::fabrication::FabricationMode;
use crate::qualified::QualifiedType;

/// A pointer back to the declaration's origin, carried into diagnostics.
///
/// The payload is opaque to the resolver; the extraction stage puts whatever
/// the host tooling needs to locate the declaration (a file path and a member
/// path, typically).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    origin: Arc<str>,
    item: Arc<str>,
}

impl SourceRef {
    /// A reference to `item` declared at `origin`.
    #[must_use]
    pub fn new(origin: impl Into<Arc<str>>, item: impl Into<Arc<str>>) -> Self {
        Self {
            origin: origin.into(),
            item: item.into(),
        }
    }

    /// A placeholder for synthesized declarations with no source location.
    #[must_use]
    pub fn synthesized() -> Self {
        Self::new("<synthesized>", "")
    }

    /// The origin payload, typically a file path.
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// The item payload, typically a member path.
    #[must_use]
    pub fn item(&self) -> &str {
        &self.item
    }
}

impl Display for SourceRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.item.is_empty() {
            f.write_str(&self.origin)
        } else {
            write!(f, "{}::{}", self.origin, self.item)
        }
    }
}

/// How a specification's members are invoked at emission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstantiationMode {
    /// Members are invoked without an instance.
    #[default]
    Static,
    /// One instance is constructed per injector and members invoked on it.
    Instantiated,
    /// The instance is supplied by the injector's caller; such specifications
    /// may contain only factories.
    Dependency,
}

/// Which kind of specification member a factory declaration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryMemberKind {
    /// A method invoked with the resolved dependencies as arguments.
    Method,
    /// A property read; must have no dependencies.
    Property,
    /// A reference to an existing value held by the specification.
    Reference,
}

/// A named group of providers, builders, and links.
#[derive(Debug, Clone)]
pub struct SpecificationDeclaration {
    /// The specification's identity; factory/builder/link declarations refer
    /// to it by this name.
    pub name: Arc<str>,
    /// How members are invoked.
    pub mode: InstantiationMode,
    /// Where the specification was declared.
    pub source: SourceRef,
}

/// A factory member of a specification.
#[derive(Debug, Clone)]
pub struct FactoryDeclaration {
    /// Name of the owning specification.
    pub owner: Arc<str>,
    /// The member's name within the specification.
    pub member: Arc<str>,
    /// What kind of member carries the factory.
    pub kind: FactoryMemberKind,
    /// The qualified type the factory produces.
    pub provided: QualifiedType,
    /// Qualified types the factory needs, in parameter order.
    pub dependencies: Vec<QualifiedType>,
    /// Caching behavior of the produced value.
    pub fabrication: FabricationMode,
    /// Whether this factory contributes one part of a multi-bind collection.
    pub partial: bool,
    /// Where the member was declared.
    pub source: SourceRef,
}

/// A builder member of a specification: mutates an already-constructed
/// instance in place, produces no value.
#[derive(Debug, Clone)]
pub struct BuilderDeclaration {
    /// Name of the owning specification.
    pub owner: Arc<str>,
    /// The member's name within the specification.
    pub member: Arc<str>,
    /// The qualified type of the instance being mutated.
    pub built: QualifiedType,
    /// Additional dependencies, excluding the target instance itself.
    pub dependencies: Vec<QualifiedType>,
    /// Where the member was declared.
    pub source: SourceRef,
}

/// An alias declaration: whatever resolves `input` also resolves `output`.
#[derive(Debug, Clone)]
pub struct LinkDeclaration {
    /// Name of the owning specification.
    pub owner: Arc<str>,
    /// The already-provided side of the alias.
    pub input: QualifiedType,
    /// The additional key the input's providers become reachable under.
    pub output: QualifiedType,
    /// Where the link was declared.
    pub source: SourceRef,
}

/// A factory derived from a type's own constructor and property shape rather
/// than from an explicit specification member.
#[derive(Debug, Clone)]
pub struct AutoFactoryDeclaration {
    /// The qualified type the auto factory produces.
    pub provided: QualifiedType,
    /// Constructor parameters, in declaration order.
    pub constructor_parameters: Vec<QualifiedType>,
    /// Required properties set after construction: `(name, type)` pairs.
    pub required_properties: Vec<(Arc<str>, QualifiedType)>,
    /// Caching behavior of the produced value.
    pub fabrication: FabricationMode,
    /// Where the type was declared.
    pub source: SourceRef,
}

/// A public provider accessor on an injector's contract.
#[derive(Debug, Clone)]
pub struct ProviderMethodDeclaration {
    /// The accessor's name.
    pub member: Arc<str>,
    /// The qualified type the accessor returns.
    pub requested: QualifiedType,
}

/// A public builder method on an injector's contract. The subject instance is
/// supplied by the caller; only the builder's extra dependencies are resolved.
#[derive(Debug, Clone)]
pub struct BuilderMethodDeclaration {
    /// The method's name.
    pub member: Arc<str>,
    /// The qualified type of the instance the caller passes in.
    pub built: QualifiedType,
}

/// A child-injector factory method on an injector's contract.
#[derive(Debug, Clone)]
pub struct ChildInjectorDeclaration {
    /// The method's name.
    pub member: Arc<str>,
    /// Name of the injector the method constructs.
    pub target: Arc<str>,
    /// Names of constructed specifications the method's parameters supply to
    /// the child; threaded into the child's resolution as externally-supplied
    /// instantiated specifications.
    pub passed_specifications: Vec<Arc<str>>,
}

/// An injector contract: the public surface a resolved object graph must
/// expose.
#[derive(Debug, Clone)]
pub struct InjectorDeclaration {
    /// The injector interface's identity.
    pub name: Arc<str>,
    /// Name for the emitted container type, if the default is overridden.
    pub generated_name: Option<Arc<str>>,
    /// Names of the specifications in the injector's closure.
    pub specifications: Vec<Arc<str>>,
    /// Name of the dependency-interface specification supplied by the
    /// injector's caller, if any.
    pub dependency_interface: Option<Arc<str>>,
    /// Public provider accessors.
    pub providers: Vec<ProviderMethodDeclaration>,
    /// Public builder methods.
    pub builders: Vec<BuilderMethodDeclaration>,
    /// Child-injector factory methods.
    pub child_injectors: Vec<ChildInjectorDeclaration>,
    /// Where the injector was declared.
    pub source: SourceRef,
}

/// The complete declaration set handed to the compiler by the extraction
/// stage.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
    /// All declared specifications.
    pub specifications: Vec<SpecificationDeclaration>,
    /// All factory members, across all specifications.
    pub factories: Vec<FactoryDeclaration>,
    /// All builder members, across all specifications.
    pub builders: Vec<BuilderDeclaration>,
    /// All link declarations, across all specifications.
    pub links: Vec<LinkDeclaration>,
    /// All auto factories; in scope for every injector.
    pub auto_factories: Vec<AutoFactoryDeclaration>,
    /// All injector contracts.
    pub injectors: Vec<InjectorDeclaration>,
}

/// Convenience constructors used by the extraction stage and tests; these
/// fill in the common defaults without hiding any field.
impl FactoryDeclaration {
    /// A method factory with the given signature.
    #[must_use]
    pub fn method(
        owner: impl Into<Arc<str>>,
        member: impl Into<Arc<str>>,
        provided: QualifiedType,
        dependencies: impl IntoIterator<Item = QualifiedType>,
    ) -> Self {
        let owner = owner.into();
        let member = member.into();
        let source = SourceRef::new(Arc::clone(&owner), Arc::clone(&member));
        Self {
            owner,
            member,
            kind: FactoryMemberKind::Method,
            provided,
            dependencies: dependencies.into_iter().collect(),
            fabrication: FabricationMode::Recurrent,
            partial: false,
            source,
        }
    }

    /// The same factory with a different fabrication mode.
    #[must_use]
    pub fn fabricated(mut self, fabrication: FabricationMode) -> Self {
        self.fabrication = fabrication;
        self
    }

    /// Marks the factory as one part of a multi-bind collection.
    #[must_use]
    pub fn partial(mut self) -> Self {
        self.partial = true;
        self
    }
}

impl SpecificationDeclaration {
    /// A specification named `name` with the given instantiation mode.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, mode: InstantiationMode) -> Self {
        let name = name.into();
        let source = SourceRef::new(Arc::clone(&name), "");
        Self { name, mode, source }
    }
}

impl LinkDeclaration {
    /// A link owned by `owner` aliasing `input` as `output`.
    #[must_use]
    pub fn new(owner: impl Into<Arc<str>>, input: QualifiedType, output: QualifiedType) -> Self {
        let owner = owner.into();
        let source = SourceRef::new(Arc::clone(&owner), "link");
        Self {
            owner,
            input,
            output,
            source,
        }
    }
}

impl AutoFactoryDeclaration {
    /// An auto factory for `provided` built from its constructor parameters.
    #[must_use]
    pub fn new(provided: QualifiedType, constructor_parameters: impl IntoIterator<Item = QualifiedType>) -> Self {
        let source = SourceRef::new(provided.key().name().to_owned(), "auto");
        Self {
            provided,
            constructor_parameters: constructor_parameters.into_iter().collect(),
            required_properties: Vec::new(),
            fabrication: FabricationMode::Recurrent,
            source,
        }
    }
}

/// Dependencies an auto factory resolves: constructor parameters first, then
/// required property types, mirroring emission order.
impl AutoFactoryDeclaration {
    /// All dependency types in resolution order.
    #[must_use]
    pub fn dependency_types(&self) -> Vec<QualifiedType> {
        self.constructor_parameters
            .iter()
            .cloned()
            .chain(self.required_properties.iter().map(|(_, ty)| ty.clone()))
            .collect()
    }
}
