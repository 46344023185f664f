// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Invocation plans: the resolved output handed to the code emitter.
//!
//! A plan is a directed acyclic graph of nodes in an arena, one node per
//! distinct qualified type resolved for an injector. Nodes reference each
//! other by [`PlanId`], so shared dependencies resolve to the *same* node and
//! aliased types reuse the invocation chain of the type they alias.

use std::fmt;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::container::SpecificationContainer;
use crate::diagnostics::{Diagnostic, Error, Result};
use crate::fabrication::{CacheScope, CacheSlot};
use crate::model::{BuilderId, ProviderId};
use crate::qualified::QualifiedType;
use crate::registry::ProviderRegistry;
use crate::validate::ValidationResult;

/// Index of a node in a plan arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlanId(pub(crate) u32);

impl Display for PlanId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a multi-bind aggregate combines its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// List shape: parts are concatenated in registration order.
    Concatenate,
    /// Set shape: parts are unioned.
    Union,
    /// Map shape: parts are merged by key; on a key collision the
    /// last-registered part wins. Collisions are between runtime values, so
    /// they cannot be rejected statically; the policy is deterministic
    /// because parts are ordered by registration.
    LastWriterWins,
}

/// One step of an invocation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanNode {
    /// Invoke a provider with the given resolved arguments.
    Invoke {
        /// The provider to invoke.
        provider: ProviderId,
        /// One resolved plan per declared dependency, in order.
        arguments: Vec<PlanId>,
        /// The cache slot consulted before invocation, for non-recurrent
        /// fabrication modes.
        cache: Option<CacheSlot>,
    },
    /// Combine multi-bind parts into one collection value.
    Aggregate {
        /// Plans of the partial providers, in registration order.
        parts: Vec<PlanId>,
        /// The shape-derived merge rule.
        merge: MergeRule,
    },
    /// Wrap the target plan in a zero-argument callable that performs it
    /// lazily on each invocation.
    Deferred {
        /// The plan the callable performs.
        target: PlanId,
    },
}

/// Arena of plan nodes for one injector.
#[derive(Debug, Default)]
pub struct PlanArena {
    nodes: Vec<Option<PlanNode>>,
}

impl PlanArena {
    /// Reserves a node id before its body is built, so self-referential
    /// deferred plans are well-formed.
    pub(crate) fn alloc(&mut self) -> Result<PlanId> {
        let index =
            u32::try_from(self.nodes.len()).map_err(|_err| Error::internal("plan arena exceeded u32 capacity"))?;
        self.nodes.push(None);
        Ok(PlanId(index))
    }

    pub(crate) fn fill(&mut self, id: PlanId, node: PlanNode) {
        self.nodes[id.0 as usize] = Some(node);
    }

    /// The node stored under `id`; `None` only for a plan that failed partway
    /// through resolution.
    #[must_use]
    pub fn node(&self, id: PlanId) -> Option<&PlanNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// All filled nodes, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (PlanId, &PlanNode)> {
        (0u32..)
            .map(PlanId)
            .zip(self.nodes.iter())
            .filter_map(|(id, node)| node.as_ref().map(|n| (id, n)))
    }

    /// Number of allocated nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// The plan behind one public provider accessor.
#[derive(Debug, Clone)]
pub struct ProviderMethodPlan {
    pub(crate) member: Arc<str>,
    pub(crate) requested: QualifiedType,
    pub(crate) root: PlanId,
}

impl ProviderMethodPlan {
    /// The accessor's name on the injector contract.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The qualified type the accessor returns.
    #[must_use]
    pub fn requested(&self) -> &QualifiedType {
        &self.requested
    }

    /// The root node of the accessor's invocation plan.
    #[must_use]
    pub fn root(&self) -> PlanId {
        self.root
    }
}

/// One builder invocation applied to the caller-supplied subject.
#[derive(Debug, Clone)]
pub struct BuilderStep {
    pub(crate) builder: BuilderId,
    pub(crate) arguments: Vec<PlanId>,
}

impl BuilderStep {
    /// The builder to invoke.
    #[must_use]
    pub fn builder(&self) -> BuilderId {
        self.builder
    }

    /// One resolved plan per extra dependency, in order. The subject instance
    /// is supplied by the caller, not resolved from the registry.
    #[must_use]
    pub fn arguments(&self) -> &[PlanId] {
        &self.arguments
    }
}

/// The plan behind one public builder method: every registered builder for
/// the built type, applied in registration order.
#[derive(Debug, Clone)]
pub struct BuilderMethodPlan {
    pub(crate) member: Arc<str>,
    pub(crate) built: QualifiedType,
    pub(crate) steps: Vec<BuilderStep>,
}

impl BuilderMethodPlan {
    /// The method's name on the injector contract.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// The qualified type of the subject instance.
    #[must_use]
    pub fn built(&self) -> &QualifiedType {
        &self.built
    }

    /// The builder invocations, in registration order.
    #[must_use]
    pub fn steps(&self) -> &[BuilderStep] {
        &self.steps
    }
}

/// The plan behind one child-injector factory method.
///
/// The child's own graph is resolved independently; this records only what
/// the parent threads into it.
#[derive(Debug, Clone)]
pub struct ChildInjectorPlan {
    pub(crate) member: Arc<str>,
    pub(crate) target: Arc<str>,
    pub(crate) passed_specifications: Vec<Arc<str>>,
}

impl ChildInjectorPlan {
    /// The method's name on the injector contract.
    #[must_use]
    pub fn member(&self) -> &str {
        &self.member
    }

    /// Name of the injector the method constructs.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Names of constructed specifications the caller passes in, supplied to
    /// the child as externally-provided instances.
    #[must_use]
    pub fn passed_specifications(&self) -> &[Arc<str>] {
        &self.passed_specifications
    }
}

/// Everything the emitter needs to generate one injector's container.
#[derive(Debug)]
pub struct ResolvedInjectorPlan {
    pub(crate) injector: Arc<str>,
    pub(crate) generated_name: Option<Arc<str>>,
    pub(crate) registry: ProviderRegistry,
    pub(crate) plans: PlanArena,
    pub(crate) containers: Vec<SpecificationContainer>,
    pub(crate) provider_methods: Vec<ProviderMethodPlan>,
    pub(crate) builder_methods: Vec<BuilderMethodPlan>,
    pub(crate) child_injectors: Vec<ChildInjectorPlan>,
    pub(crate) validation: ValidationResult,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) injector_slots: u32,
    pub(crate) activation_slots: u32,
    pub(crate) container_slots: u32,
}

impl ResolvedInjectorPlan {
    /// The injector interface's name.
    #[must_use]
    pub fn injector(&self) -> &str {
        &self.injector
    }

    /// Name for the emitted container type, if overridden.
    #[must_use]
    pub fn generated_name(&self) -> Option<&str> {
        self.generated_name.as_deref()
    }

    /// The sealed registry the plan was resolved against.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// The plan node arena.
    #[must_use]
    pub fn plans(&self) -> &PlanArena {
        &self.plans
    }

    /// Specification containers, in closure order.
    #[must_use]
    pub fn containers(&self) -> &[SpecificationContainer] {
        &self.containers
    }

    /// Plans for public provider accessors, in contract order.
    #[must_use]
    pub fn provider_methods(&self) -> &[ProviderMethodPlan] {
        &self.provider_methods
    }

    /// Plans for public builder methods, in contract order.
    #[must_use]
    pub fn builder_methods(&self) -> &[BuilderMethodPlan] {
        &self.builder_methods
    }

    /// Plans for child-injector factory methods, in contract order.
    #[must_use]
    pub fn child_injectors(&self) -> &[ChildInjectorPlan] {
        &self.child_injectors
    }

    /// The validator's outcome for this injector.
    #[must_use]
    pub fn validation(&self) -> &ValidationResult {
        &self.validation
    }

    /// Every diagnostic collected while resolving this injector.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Whether the injector resolved cleanly and its plans are usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validation.is_valid() && self.diagnostics.is_empty()
    }

    /// Storage cells the emitted container must reserve for `scope`.
    #[must_use]
    pub fn cache_slots(&self, scope: CacheScope) -> u32 {
        match scope {
            CacheScope::Injector => self.injector_slots,
            CacheScope::ContainerActivation => self.activation_slots,
            CacheScope::Container => self.container_slots,
        }
    }
}
