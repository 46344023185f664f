// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Compile-time dependency injection graph compiler.
//!
//! Given a declarative description of object-construction recipes (factories,
//! builders, qualifiers, links, and injector contracts), this crate resolves,
//! validates, and schedules how a fully wired object graph is constructed,
//! producing one static [`ResolvedInjectorPlan`] per injector for a downstream
//! code emitter. All resolution happens once, ahead of time; nothing here is a
//! runtime container.
//!
//! # Pipeline
//!
//! ```text
//! Declarations → registry → links → validation → invocation plans → emission
//! ```
//!
//! Each injector is resolved independently from its own fresh registry, built
//! over the injector's specification closure. Registration runs to completion
//! before anything reads the registry; links alias existing entries after all
//! direct providers are known, so link resolution never depends on declaration
//! order.
//!
//! # Quick Start
//!
//! ```
//! use graft::{
//!     Declarations, FactoryDeclaration, GraphCompiler, InjectorDeclaration, InstantiationMode,
//!     ProviderMethodDeclaration, QualifiedType, SourceRef, SpecificationDeclaration, TypeKey,
//! };
//!
//! let mut declarations = Declarations::default();
//! declarations
//!     .specifications
//!     .push(SpecificationDeclaration::new("NodeSpec", InstantiationMode::Static));
//! declarations.factories.push(FactoryDeclaration::method(
//!     "NodeSpec",
//!     "ten",
//!     QualifiedType::plain(TypeKey::named("Int")),
//!     [],
//! ));
//! declarations.injectors.push(InjectorDeclaration {
//!     name: "AppInjector".into(),
//!     generated_name: None,
//!     specifications: vec!["NodeSpec".into()],
//!     dependency_interface: None,
//!     providers: vec![ProviderMethodDeclaration {
//!         member: "getInt".into(),
//!         requested: QualifiedType::plain(TypeKey::named("Int")),
//!     }],
//!     builders: vec![],
//!     child_injectors: vec![],
//!     source: SourceRef::new("app", "AppInjector"),
//! });
//!
//! let compilation = GraphCompiler::new(&declarations).compile();
//! assert!(compilation.is_valid());
//! ```
//!
//! # Failure Semantics
//!
//! User-caused problems are collected, not thrown: malformed declarations
//! ([`DiagnosticKind::InvalidSpecification`]) and unresolvable requirements
//! ([`DiagnosticKind::IncompleteSpecification`]) accumulate per injector, and
//! one injector's failure never aborts its siblings. The [`Error`] type only
//! surfaces defects in the resolver itself.
//!
//! # Out of Scope
//!
//! Extracting declarations from source syntax, rendering plans into target
//! language text, and incremental build caching are external collaborators;
//! this crate starts at [`Declarations`] and stops at [`ResolvedInjectorPlan`].

mod container;
mod declarations;
mod diagnostics;
mod fabrication;
mod model;
mod plan;
mod qualified;
mod registry;
mod resolver;
mod validate;

pub use container::{ContainerBinding, SpecificationContainer};
pub use declarations::{
    AutoFactoryDeclaration, BuilderDeclaration, BuilderMethodDeclaration, ChildInjectorDeclaration, Declarations,
    FactoryDeclaration, FactoryMemberKind, InjectorDeclaration, InstantiationMode, LinkDeclaration,
    ProviderMethodDeclaration, SourceRef, SpecificationDeclaration,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, Error, Result};
pub use fabrication::{CacheScope, CacheSlot, FabricationMode};
pub use model::{Builder, BuilderId, Provider, ProviderId, ProviderKind, SpecId, Specification};
pub use plan::{
    BuilderMethodPlan, BuilderStep, ChildInjectorPlan, MergeRule, PlanArena, PlanId, PlanNode, ProviderMethodPlan,
    ResolvedInjectorPlan,
};
pub use qualified::{QualifiedType, Qualifier, TypeKey, TypeShape};
pub use registry::ProviderRegistry;
pub use resolver::{GraphCompilation, GraphCompiler};
pub use validate::{MissingDependency, Requirer, ValidationResult};
