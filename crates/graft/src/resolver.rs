// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The injector resolver: drives one injector's declarations through
//! registration, link resolution, validation, and plan construction.
//!
//! Injectors are independent: each resolution builds its own registry from the
//! injector's specification closure and accumulates its own diagnostics, so
//! one injector's failure never aborts its siblings. Within one resolution the
//! phases form a strict barrier; the registry is sealed before anything reads
//! it.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{Level, event};

use crate::container::compose_containers;
use crate::declarations::{
    Declarations, FactoryMemberKind, InjectorDeclaration, InstantiationMode, SourceRef, SpecificationDeclaration,
};
use crate::diagnostics::{Diagnostic, Error, Result};
use crate::fabrication::{CacheScope, CacheSlot, SlotAllocator};
use crate::model::{Builder, Provider, ProviderId, ProviderKind, SpecId, Specification};
use crate::plan::{
    BuilderMethodPlan, BuilderStep, ChildInjectorPlan, MergeRule, PlanArena, PlanId, PlanNode, ProviderMethodPlan,
    ResolvedInjectorPlan,
};
use crate::qualified::{QualifiedType, TypeShape};
use crate::registry::ProviderRegistry;
use crate::validate::{Requirer, RootRequirements, ValidationResult, find_construction_cycles, validate};

type FoldMap<K, V> = HashMap<K, V, foldhash::fast::RandomState>;

/// Compiles a declaration set into per-injector resolved plans.
#[derive(Debug)]
pub struct GraphCompiler<'a> {
    declarations: &'a Declarations,
    specifications: FoldMap<&'a str, &'a SpecificationDeclaration>,
    injectors: FoldMap<&'a str, &'a InjectorDeclaration>,
}

/// The output of [`GraphCompiler::compile`]: one resolved plan per declared
/// injector, in declaration order.
#[derive(Debug)]
pub struct GraphCompilation {
    injectors: Vec<ResolvedInjectorPlan>,
}

impl GraphCompilation {
    /// All resolved injector plans, in declaration order.
    #[must_use]
    pub fn injectors(&self) -> &[ResolvedInjectorPlan] {
        &self.injectors
    }

    /// The plan for the injector named `name`, if one was declared.
    #[must_use]
    pub fn injector(&self, name: &str) -> Option<&ResolvedInjectorPlan> {
        self.injectors.iter().find(|plan| plan.injector() == name)
    }

    /// Whether every injector resolved cleanly.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.injectors.iter().all(ResolvedInjectorPlan::is_valid)
    }
}

impl<'a> GraphCompiler<'a> {
    /// A compiler over the given declaration set.
    #[must_use]
    pub fn new(declarations: &'a Declarations) -> Self {
        let specifications = declarations
            .specifications
            .iter()
            .map(|spec| (&*spec.name, spec))
            .collect();
        let injectors = declarations
            .injectors
            .iter()
            .map(|injector| (&*injector.name, injector))
            .collect();
        Self {
            declarations,
            specifications,
            injectors,
        }
    }

    /// Resolves every declared injector.
    ///
    /// Specifications passed into an injector through a parent's
    /// child-injector factory method are treated as externally supplied when
    /// that injector is resolved.
    #[must_use]
    pub fn compile(&self) -> GraphCompilation {
        let mut external: FoldMap<&str, Vec<Arc<str>>> = FoldMap::default();
        for injector in &self.declarations.injectors {
            for child in &injector.child_injectors {
                let supplied = external.entry(&*child.target).or_default();
                for name in &child.passed_specifications {
                    if !supplied.contains(name) {
                        supplied.push(Arc::clone(name));
                    }
                }
            }
        }

        let injectors = self
            .declarations
            .injectors
            .iter()
            .map(|declaration| {
                let supplied = external.get(&*declaration.name).map_or(&[][..], Vec::as_slice);
                self.resolve_guarded(declaration, supplied)
            })
            .collect();

        GraphCompilation { injectors }
    }

    /// Resolves one injector, converting internal resolver defects into an
    /// internal-error diagnostic on that injector's plan so siblings proceed.
    fn resolve_guarded(&self, declaration: &InjectorDeclaration, externally_supplied: &[Arc<str>]) -> ResolvedInjectorPlan {
        match self.resolve_injector(declaration, externally_supplied) {
            Ok(plan) => plan,
            Err(error) => {
                event!(Level::ERROR, injector = %declaration.name, %error, "injector resolution failed internally");
                ResolvedInjectorPlan {
                    injector: Arc::clone(&declaration.name),
                    generated_name: declaration.generated_name.clone(),
                    registry: ProviderRegistry::new(),
                    plans: PlanArena::default(),
                    containers: Vec::new(),
                    provider_methods: Vec::new(),
                    builder_methods: Vec::new(),
                    child_injectors: Vec::new(),
                    validation: ValidationResult::Valid,
                    diagnostics: vec![Diagnostic::internal(declaration.source.clone(), error.to_string())],
                    injector_slots: 0,
                    activation_slots: 0,
                    container_slots: 0,
                }
            }
        }
    }

    /// Resolves one injector declaration into a plan.
    ///
    /// `externally_supplied` names constructed specifications whose instances
    /// arrive from outside (a parent injector's child-factory parameters);
    /// they join the closure but are never constructed here.
    pub fn resolve_injector(
        &self,
        declaration: &InjectorDeclaration,
        externally_supplied: &[Arc<str>],
    ) -> Result<ResolvedInjectorPlan> {
        let mut resolution = InjectorResolution {
            compiler: self,
            declaration,
            registry: ProviderRegistry::new(),
            diagnostics: Vec::new(),
            plans: PlanArena::default(),
            memo: FoldMap::default(),
            invoke_memo: FoldMap::default(),
            slots: SlotAllocator::default(),
            slot_map: FoldMap::default(),
        };

        resolution.register_closure(externally_supplied)?;
        resolution.resolve_links()?;
        resolution.registry.seal();
        resolution.sweep_buckets()?;
        resolution.check_child_contracts();

        let validation = validate(
            &resolution.registry,
            RootRequirements {
                provided: &declaration.providers.iter().map(|p| p.requested.clone()).collect::<Vec<_>>(),
                built: &declaration.builders.iter().map(|b| b.built.clone()).collect::<Vec<_>>(),
            },
        )?;

        // The structured result doubles as the user-visible report: every
        // miss gets a diagnostic tied to whoever required the type.
        for miss in validation.missing() {
            let source = match miss.required_by() {
                Requirer::Provider(id) => resolution.registry.provider(id).source().clone(),
                Requirer::Builder(id) => resolution.registry.builder(id).source().clone(),
                Requirer::InjectorRoot => declaration.source.clone(),
            };
            resolution.diagnostics.push(Diagnostic::incomplete(source, miss.to_string()));
        }

        for cycle in find_construction_cycles(&resolution.registry)? {
            let path = cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");
            let source = cycle
                .first()
                .and_then(|key| resolution.registry.lookup(key).first().copied())
                .map_or_else(
                    || declaration.source.clone(),
                    |id| resolution.registry.provider(id).source().clone(),
                );
            resolution
                .diagnostics
                .push(Diagnostic::invalid(source, format!("construction cycle: {path}")));
        }

        let resolvable = validation.is_valid() && resolution.diagnostics.is_empty();
        event!(
            Level::DEBUG,
            injector = %declaration.name,
            valid = resolvable,
            missing = validation.missing().len(),
            diagnostics = resolution.diagnostics.len(),
            "injector validated"
        );

        let mut provider_methods = Vec::new();
        let mut builder_methods = Vec::new();
        let mut child_injectors = Vec::new();
        if resolvable {
            for method in &declaration.providers {
                let root = resolution.resolve_type(&method.requested)?;
                provider_methods.push(ProviderMethodPlan {
                    member: Arc::clone(&method.member),
                    requested: method.requested.clone(),
                    root,
                });
            }
            for method in &declaration.builders {
                let mut steps = Vec::new();
                for id in resolution.registry.lookup_builders(&method.built).to_vec() {
                    let dependencies = resolution.registry.builder(id).dependencies().to_vec();
                    let mut arguments = Vec::with_capacity(dependencies.len());
                    for dependency in &dependencies {
                        arguments.push(resolution.resolve_type(dependency)?);
                    }
                    steps.push(BuilderStep { builder: id, arguments });
                }
                builder_methods.push(BuilderMethodPlan {
                    member: Arc::clone(&method.member),
                    built: method.built.clone(),
                    steps,
                });
            }
            for child in &declaration.child_injectors {
                child_injectors.push(ChildInjectorPlan {
                    member: Arc::clone(&child.member),
                    target: Arc::clone(&child.target),
                    passed_specifications: child.passed_specifications.clone(),
                });
            }
        }

        let containers = if resolvable {
            compose_containers(&resolution.registry, &resolution.slot_map)
        } else {
            Vec::new()
        };

        Ok(ResolvedInjectorPlan {
            injector: Arc::clone(&declaration.name),
            generated_name: declaration.generated_name.clone(),
            injector_slots: resolution.slots.allocated(CacheScope::Injector),
            activation_slots: resolution.slots.allocated(CacheScope::ContainerActivation),
            container_slots: resolution.slots.allocated(CacheScope::Container),
            registry: resolution.registry,
            plans: resolution.plans,
            containers,
            provider_methods,
            builder_methods,
            child_injectors,
            validation,
            diagnostics: resolution.diagnostics,
        })
    }
}

/// Working state for one injector's resolution pass.
struct InjectorResolution<'c, 'a> {
    compiler: &'c GraphCompiler<'a>,
    declaration: &'c InjectorDeclaration,
    registry: ProviderRegistry,
    diagnostics: Vec<Diagnostic>,
    plans: PlanArena,
    memo: FoldMap<QualifiedType, PlanId>,
    invoke_memo: FoldMap<ProviderId, PlanId>,
    slots: SlotAllocator,
    slot_map: FoldMap<ProviderId, CacheSlot>,
}

impl InjectorResolution<'_, '_> {
    /// Phase one: registers every specification in the closure with all of
    /// its factories and builders, plus every auto factory, performing the
    /// per-declaration structural checks. Pure accumulation otherwise.
    fn register_closure(&mut self, externally_supplied: &[Arc<str>]) -> Result<()> {
        let mut closure: Vec<Arc<str>> = Vec::new();
        let push = |name: &Arc<str>, closure: &mut Vec<Arc<str>>| {
            if !closure.iter().any(|existing| existing == name) {
                closure.push(Arc::clone(name));
            }
        };
        for name in &self.declaration.specifications {
            push(name, &mut closure);
        }
        if let Some(dependency_interface) = &self.declaration.dependency_interface {
            push(dependency_interface, &mut closure);
        }
        for name in externally_supplied {
            push(name, &mut closure);
        }

        for name in &closure {
            let external = externally_supplied.contains(name)
                || self.declaration.dependency_interface.as_ref() == Some(name);
            let specification = match self.compiler.specifications.get(&**name) {
                Some(declared) => Specification {
                    name: Arc::clone(&declared.name),
                    mode: declared.mode,
                    externally_supplied: external || declared.mode == InstantiationMode::Dependency,
                    source: declared.source.clone(),
                },
                None if self.declaration.dependency_interface.as_ref() == Some(name) => {
                    // A dependency interface need not be declared as a
                    // specification; it is an externally supplied instance
                    // whose factories are declared against its name.
                    Specification {
                        name: Arc::clone(name),
                        mode: InstantiationMode::Dependency,
                        externally_supplied: true,
                        source: SourceRef::synthesized(),
                    }
                }
                None => {
                    self.diagnostics.push(Diagnostic::invalid(
                        self.declaration.source.clone(),
                        format!("unknown specification `{name}` in injector closure"),
                    ));
                    continue;
                }
            };
            let mode = specification.mode;
            let id = self.registry.add_specification(specification)?;
            self.register_specification_members(name, id, mode)?;
        }

        for auto in &self.compiler.declarations.auto_factories {
            self.registry.register_provider(Provider {
                owner: None,
                kind: ProviderKind::AutoFactory {
                    required_properties: auto.required_properties.iter().map(|(name, _)| Arc::clone(name)).collect(),
                },
                member: Arc::from(auto.provided.key().name()),
                provided: auto.provided.clone(),
                dependencies: auto.dependency_types(),
                fabrication: auto.fabrication,
                partial: false,
                source: auto.source.clone(),
            })?;
        }

        event!(
            Level::DEBUG,
            injector = %self.declaration.name,
            specifications = closure.len(),
            "registered specification closure"
        );
        Ok(())
    }

    fn register_specification_members(&mut self, name: &Arc<str>, id: SpecId, mode: InstantiationMode) -> Result<()> {
        for factory in self.compiler.declarations.factories.iter().filter(|f| f.owner == *name) {
            if factory.kind == FactoryMemberKind::Property && !factory.dependencies.is_empty() {
                self.diagnostics.push(Diagnostic::invalid(
                    factory.source.clone(),
                    format!("property factory `{}` cannot declare dependencies", factory.member),
                ));
            }
            if factory.partial && !factory.provided.shape().is_collection() {
                self.diagnostics.push(Diagnostic::invalid(
                    factory.source.clone(),
                    format!(
                        "multi-bind partial `{}` must provide a list, set, or map shaped type, not {}",
                        factory.member, factory.provided
                    ),
                ));
            }
            self.registry.register_provider(Provider {
                owner: Some(id),
                kind: ProviderKind::from_member_kind(factory.kind),
                member: Arc::clone(&factory.member),
                provided: factory.provided.clone(),
                dependencies: factory.dependencies.clone(),
                fabrication: factory.fabrication,
                partial: factory.partial,
                source: factory.source.clone(),
            })?;
        }

        for builder in self.compiler.declarations.builders.iter().filter(|b| b.owner == *name) {
            if mode == InstantiationMode::Dependency {
                self.diagnostics.push(Diagnostic::invalid(
                    builder.source.clone(),
                    format!("dependency specification `{name}` may not declare builder `{}`", builder.member),
                ));
            }
            if builder.dependencies.is_empty() {
                self.diagnostics.push(Diagnostic::invalid(
                    builder.source.clone(),
                    format!("builder `{}` has no dependencies and would mutate nothing", builder.member),
                ));
            }
            self.registry.register_builder(Builder {
                owner: id,
                member: Arc::clone(&builder.member),
                built: builder.built.clone(),
                dependencies: builder.dependencies.clone(),
                source: builder.source.clone(),
            })?;
        }

        Ok(())
    }

    /// Phase two: aliases link outputs onto their inputs' entries. Runs only
    /// after every direct provider is registered, so link resolution cannot
    /// depend on declaration order.
    fn resolve_links(&mut self) -> Result<()> {
        // Closure order, not map order, so link diagnostics are reproducible.
        let specs: Vec<(Arc<str>, InstantiationMode)> = self
            .registry
            .specifications()
            .map(|(_, spec)| (Arc::clone(&spec.name), spec.mode()))
            .collect();
        for (name, mode) in specs {
            for link in self.compiler.declarations.links.iter().filter(|l| l.owner == name) {
                if mode == InstantiationMode::Dependency {
                    self.diagnostics.push(Diagnostic::invalid(
                        link.source.clone(),
                        format!("dependency specification `{name}` may not declare links"),
                    ));
                    continue;
                }
                if !self.registry.alias(&link.input, &link.output)? {
                    self.diagnostics.push(Diagnostic::incomplete(
                        link.source.clone(),
                        format!("link input {} has no registered provider", link.input),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Post-seal structural sweep over the buckets.
    ///
    /// Conflicts can only be judged once links have run: two providers may
    /// collide under a key neither was directly registered with.
    fn sweep_buckets(&mut self) -> Result<()> {
        self.registry.ensure_sealed()?;

        let mut findings = Vec::new();
        for (key, ids) in self.registry.provider_buckets() {
            let (partials, singles): (Vec<_>, Vec<_>) =
                ids.iter().partition(|&&id| self.registry.provider(id).is_partial());

            if singles.len() > 1 {
                let members = singles
                    .iter()
                    .map(|&&id| self.registry.provider(id).member().to_owned())
                    .collect::<Vec<_>>()
                    .join(", ");
                findings.push(Diagnostic::invalid(
                    self.registry.provider(*singles[0]).source().clone(),
                    format!("conflicting single-value providers for {key}: {members}"),
                ));
            }
            if !singles.is_empty() && !partials.is_empty() {
                findings.push(Diagnostic::invalid(
                    self.registry.provider(*partials[0]).source().clone(),
                    format!("{key} mixes a single-value provider with multi-bind partials"),
                ));
            }
            if singles.is_empty() && !partials.is_empty() && !key.shape().is_collection() {
                findings.push(Diagnostic::invalid(
                    self.registry.provider(*partials[0]).source().clone(),
                    format!("multi-bind partials aggregate under {key}, which is not collection shaped"),
                ));
            }
        }
        self.diagnostics.extend(findings);
        Ok(())
    }

    /// Checks child-injector factory methods against the declaration set.
    fn check_child_contracts(&mut self) {
        for child in &self.declaration.child_injectors {
            if !self.compiler.injectors.contains_key(&*child.target) {
                self.diagnostics.push(Diagnostic::invalid(
                    self.declaration.source.clone(),
                    format!("child injector factory `{}` targets unknown injector `{}`", child.member, child.target),
                ));
            }
            for passed in &child.passed_specifications {
                if !self.compiler.specifications.contains_key(&**passed) {
                    self.diagnostics.push(Diagnostic::invalid(
                        self.declaration.source.clone(),
                        format!(
                            "child injector factory `{}` passes unknown specification `{passed}`",
                            child.member
                        ),
                    ));
                }
            }
        }
    }

    /// Resolves a qualified type to its plan node, memoized so every path
    /// that requests the same type shares one node.
    fn resolve_type(&mut self, key: &QualifiedType) -> Result<PlanId> {
        if let Some(&id) = self.memo.get(key) {
            return Ok(id);
        }

        if key.shape() == TypeShape::Deferred {
            let Some(target) = key.deferred_target() else {
                return Err(Error::internal(format!("deferred type {key} has no inner type argument")));
            };
            // Reserve the wrapper's id before resolving the target so a
            // deferred self-reference lands on an allocated node.
            let id = self.plans.alloc()?;
            self.memo.insert(key.clone(), id);
            let inner = self.resolve_type(&target)?;
            self.plans.fill(id, PlanNode::Deferred { target: inner });
            return Ok(id);
        }

        let ids = self.registry.lookup(key).to_vec();
        let (partials, singles): (Vec<_>, Vec<_>) = ids.iter().partition(|&&id| self.registry.provider(id).is_partial());

        if singles.is_empty() && !partials.is_empty() && key.shape().is_collection() {
            let merge = match key.shape() {
                TypeShape::List => MergeRule::Concatenate,
                TypeShape::Set => MergeRule::Union,
                TypeShape::Map => MergeRule::LastWriterWins,
                TypeShape::Opaque | TypeShape::Deferred => {
                    return Err(Error::internal(format!("aggregation planned for non-collection {key}")));
                }
            };
            let id = self.plans.alloc()?;
            self.memo.insert(key.clone(), id);
            let mut parts = Vec::with_capacity(partials.len());
            for &part in partials {
                parts.push(self.invoke_plan(part)?);
            }
            self.plans.fill(id, PlanNode::Aggregate { parts, merge });
            return Ok(id);
        }

        match singles.as_slice() {
            &[&single] if partials.is_empty() => {
                let id = self.invoke_plan(single)?;
                self.memo.insert(key.clone(), id);
                Ok(id)
            }
            // Validation and the bucket sweep run before planning, so
            // anything else is a phase-ordering defect.
            [] => Err(Error::internal(format!("plan requested for unresolvable type {key}"))),
            _ => Err(Error::internal(format!("plan requested for ambiguous type {key}"))),
        }
    }

    /// The invocation plan for one provider; memoized per provider so aliased
    /// keys share the chain and cache slots are assigned exactly once.
    fn invoke_plan(&mut self, provider: ProviderId) -> Result<PlanId> {
        if let Some(&id) = self.invoke_memo.get(&provider) {
            return Ok(id);
        }

        let id = self.plans.alloc()?;
        self.invoke_memo.insert(provider, id);

        let dependencies = self.registry.provider(provider).dependencies().to_vec();
        let mut arguments = Vec::with_capacity(dependencies.len());
        for dependency in &dependencies {
            arguments.push(self.resolve_type(dependency)?);
        }

        let fabrication = self.registry.provider(provider).fabrication();
        let cache = match self.slot_map.get(&provider) {
            Some(&slot) => Some(slot),
            None => {
                let slot = self.slots.allocate(fabrication);
                if let Some(slot) = slot {
                    self.slot_map.insert(provider, slot);
                }
                slot
            }
        };

        event!(Level::TRACE, plan = %id, %fabrication, "planned provider invocation");
        self.plans.fill(id, PlanNode::Invoke {
            provider,
            arguments,
            cache,
        });
        Ok(id)
    }
}
