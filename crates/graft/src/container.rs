// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Specification container composition.
//!
//! After resolution, providers are grouped by their declaring specification
//! to drive the emitted container structure. The grouping has no effect on
//! resolution correctness; it decides whether members are invoked as free
//! functions, against a constructed instance, or against an instance supplied
//! by the injector's caller, and where cached scoped state is colocated.

use std::collections::HashMap;
use std::sync::Arc;

use crate::declarations::InstantiationMode;
use crate::fabrication::CacheSlot;
use crate::model::{BuilderId, ProviderId, SpecId};
use crate::registry::ProviderRegistry;

/// How the emitted container reaches a specification's members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerBinding {
    /// Members are invoked as free functions; no instance exists.
    Static,
    /// Exactly one instance is constructed per injector and passed to every
    /// member invocation.
    Instantiated,
    /// The instance is supplied from outside: a dependency interface, or a
    /// constructed specification passed into a child injector.
    ExternallySupplied,
}

/// One specification's slice of an injector's emitted container.
#[derive(Debug, Clone)]
pub struct SpecificationContainer {
    specification: Arc<str>,
    spec: Option<SpecId>,
    binding: ContainerBinding,
    providers: Vec<ProviderId>,
    builders: Vec<BuilderId>,
    cached: Vec<(ProviderId, CacheSlot)>,
}

impl SpecificationContainer {
    /// The declaring specification's name; `"<auto>"` for the synthetic
    /// container holding auto factories.
    #[must_use]
    pub fn specification(&self) -> &str {
        &self.specification
    }

    /// The specification's closure id; `None` for the auto-factory container.
    #[must_use]
    pub fn spec(&self) -> Option<SpecId> {
        self.spec
    }

    /// How members are invoked.
    #[must_use]
    pub fn binding(&self) -> ContainerBinding {
        self.binding
    }

    /// Providers declared by this specification, in registration order.
    #[must_use]
    pub fn providers(&self) -> &[ProviderId] {
        &self.providers
    }

    /// Builders declared by this specification, in registration order.
    #[must_use]
    pub fn builders(&self) -> &[BuilderId] {
        &self.builders
    }

    /// Providers whose cached value is colocated with this container, with
    /// their assigned slots.
    #[must_use]
    pub fn cached(&self) -> &[(ProviderId, CacheSlot)] {
        &self.cached
    }
}

/// Groups the registry's entries by declaring specification.
///
/// Containers come out in closure order; a synthetic `"<auto>"` container
/// collects auto factories, which have no declaring specification and behave
/// statically. Only providers that were assigned a cache slot appear in
/// [`SpecificationContainer::cached`].
pub(crate) fn compose_containers(
    registry: &ProviderRegistry,
    slots: &HashMap<ProviderId, CacheSlot, foldhash::fast::RandomState>,
) -> Vec<SpecificationContainer> {
    let mut containers: Vec<SpecificationContainer> = registry
        .specifications()
        .map(|(id, spec)| {
            let binding = if spec.is_externally_supplied() {
                ContainerBinding::ExternallySupplied
            } else {
                match spec.mode() {
                    InstantiationMode::Static => ContainerBinding::Static,
                    InstantiationMode::Instantiated => ContainerBinding::Instantiated,
                    InstantiationMode::Dependency => ContainerBinding::ExternallySupplied,
                }
            };
            SpecificationContainer {
                specification: Arc::from(spec.name()),
                spec: Some(id),
                binding,
                providers: Vec::new(),
                builders: Vec::new(),
                cached: Vec::new(),
            }
        })
        .collect();

    let mut auto = SpecificationContainer {
        specification: Arc::from("<auto>"),
        spec: None,
        binding: ContainerBinding::Static,
        providers: Vec::new(),
        builders: Vec::new(),
        cached: Vec::new(),
    };

    for (id, provider) in registry.providers() {
        let container = match provider.owner() {
            Some(owner) => &mut containers[owner.0 as usize],
            None => &mut auto,
        };
        container.providers.push(id);
        if let Some(&slot) = slots.get(&id) {
            container.cached.push((id, slot));
        }
    }

    for (id, builder) in registry.builders() {
        containers[builder.owner().0 as usize].builders.push(id);
    }

    if !auto.providers.is_empty() {
        containers.push(auto);
    }

    containers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::SourceRef;
    use crate::fabrication::{FabricationMode, SlotAllocator};
    use crate::model::{Provider, ProviderKind, Specification};
    use crate::qualified::{QualifiedType, TypeKey};

    fn spec(name: &str, mode: InstantiationMode, externally_supplied: bool) -> Specification {
        Specification {
            name: name.into(),
            mode,
            externally_supplied,
            source: SourceRef::new(name, ""),
        }
    }

    fn provider(owner: Option<SpecId>, member: &str, provided: &str, fabrication: FabricationMode) -> Provider {
        Provider {
            owner,
            kind: ProviderKind::MethodFactory,
            member: member.into(),
            provided: QualifiedType::plain(TypeKey::named(provided)),
            dependencies: vec![],
            fabrication,
            partial: false,
            source: SourceRef::new("TestSpec", member),
        }
    }

    #[test]
    fn providers_group_by_declaring_specification() {
        let mut registry = ProviderRegistry::new();
        let static_spec = registry
            .add_specification(spec("StaticSpec", InstantiationMode::Static, false))
            .unwrap();
        let dep_spec = registry
            .add_specification(spec("DepSpec", InstantiationMode::Dependency, false))
            .unwrap();

        let a = registry
            .register_provider(provider(Some(static_spec), "a", "A", FabricationMode::Recurrent))
            .unwrap();
        let b = registry
            .register_provider(provider(Some(dep_spec), "b", "B", FabricationMode::Recurrent))
            .unwrap();
        let auto = registry
            .register_provider(provider(None, "Widget", "Widget", FabricationMode::Recurrent))
            .unwrap();
        registry.seal();

        let containers = compose_containers(&registry, &HashMap::default());

        assert_eq!(containers.len(), 3);
        assert_eq!(containers[0].specification(), "StaticSpec");
        assert_eq!(containers[0].binding(), ContainerBinding::Static);
        assert_eq!(containers[0].providers(), &[a]);
        assert_eq!(containers[1].binding(), ContainerBinding::ExternallySupplied);
        assert_eq!(containers[1].providers(), &[b]);
        assert_eq!(containers[2].specification(), "<auto>");
        assert_eq!(containers[2].providers(), &[auto]);
    }

    #[test]
    fn externally_supplied_overrides_instantiated() {
        let mut registry = ProviderRegistry::new();
        registry
            .add_specification(spec("Passed", InstantiationMode::Instantiated, true))
            .unwrap();
        registry.seal();

        let containers = compose_containers(&registry, &HashMap::default());
        assert_eq!(containers[0].binding(), ContainerBinding::ExternallySupplied);
    }

    #[test]
    fn cached_slots_are_colocated_with_the_owner() {
        let mut registry = ProviderRegistry::new();
        let owner = registry
            .add_specification(spec("NodeSpec", InstantiationMode::Instantiated, false))
            .unwrap();
        let cached = registry
            .register_provider(provider(Some(owner), "node", "Node", FabricationMode::Scoped))
            .unwrap();
        let uncached = registry
            .register_provider(provider(Some(owner), "leaf", "Leaf", FabricationMode::Recurrent))
            .unwrap();
        registry.seal();

        let mut allocator = SlotAllocator::default();
        let mut slots: HashMap<ProviderId, CacheSlot, foldhash::fast::RandomState> = HashMap::default();
        if let Some(slot) = allocator.allocate(FabricationMode::Scoped) {
            slots.insert(cached, slot);
        }

        let containers = compose_containers(&registry, &slots);
        assert_eq!(containers[0].providers(), &[cached, uncached]);
        assert_eq!(containers[0].cached().len(), 1);
        assert_eq!(containers[0].cached()[0].0, cached);
    }
}
