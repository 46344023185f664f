// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The per-injector provider registry.
//!
//! A registry is built fresh for each injector resolution from that injector's
//! specification closure, even when specifications are textually shared,
//! because fabrication-mode caching is scoped to one injector instance.
//!
//! Population is strictly two-phase: all direct providers and builders are
//! registered first, then links alias existing entries under additional keys,
//! then the registry is sealed. Lookups feed validation and plan construction
//! only after sealing; the resolver enforces the barrier through
//! [`ProviderRegistry::ensure_sealed`].

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::diagnostics::{Error, ErrorKind, Result};
use crate::model::{Builder, BuilderId, Provider, ProviderId, SpecId, Specification};
use crate::qualified::QualifiedType;

type Buckets<I> = HashMap<QualifiedType, SmallVec<[I; 2]>, foldhash::fast::RandomState>;

/// Multi-map from qualified type to the providers and builders that can
/// produce or mutate it, owned by one injector resolution.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    specifications: Vec<Specification>,
    providers: Vec<Provider>,
    builders: Vec<Builder>,
    provider_buckets: Buckets<ProviderId>,
    builder_buckets: Buckets<BuilderId>,
    provider_key_order: Vec<QualifiedType>,
    sealed: bool,
}

impl ProviderRegistry {
    /// An empty, unsealed registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a specification to the closure and returns its id.
    pub(crate) fn add_specification(&mut self, specification: Specification) -> Result<SpecId> {
        self.ensure_unsealed()?;
        let id = SpecId(arena_index(self.specifications.len())?);
        self.specifications.push(specification);
        Ok(id)
    }

    /// Registers a provider under its provided type.
    ///
    /// Pure accumulation: no validation happens here. Registering a
    /// structurally equal provider twice (shared specifications reach the
    /// same member through two closures) collapses onto the existing entry,
    /// so aggregation never invokes a member twice.
    pub(crate) fn register_provider(&mut self, provider: Provider) -> Result<ProviderId> {
        self.ensure_unsealed()?;

        if let Some(bucket) = self.provider_buckets.get(provider.provided()) {
            for &existing in bucket {
                if self.providers[existing.0 as usize] == provider {
                    return Ok(existing);
                }
            }
        }

        let id = ProviderId(arena_index(self.providers.len())?);
        let key = provider.provided().clone();
        self.providers.push(provider);
        self.push_provider_key(&key, id);
        Ok(id)
    }

    fn push_provider_key(&mut self, key: &QualifiedType, id: ProviderId) {
        let Self {
            provider_buckets,
            provider_key_order,
            ..
        } = self;
        let bucket = provider_buckets.entry(key.clone()).or_insert_with(|| {
            provider_key_order.push(key.clone());
            SmallVec::new()
        });
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    /// Registers a builder under its built type, with the same idempotence
    /// rule as [`Self::register_provider`].
    pub(crate) fn register_builder(&mut self, builder: Builder) -> Result<BuilderId> {
        self.ensure_unsealed()?;

        if let Some(bucket) = self.builder_buckets.get(builder.built()) {
            for &existing in bucket {
                if self.builders[existing.0 as usize] == builder {
                    return Ok(existing);
                }
            }
        }

        let id = BuilderId(arena_index(self.builders.len())?);
        let key = builder.built().clone();
        self.builders.push(builder);
        self.builder_buckets.entry(key).or_default().push(id);
        Ok(id)
    }

    /// Makes every entry registered under `input` also resolvable under
    /// `output`.
    ///
    /// The same arena entries are aliased, not cloned: resolving the output
    /// type produces the same invocation chain as resolving the input type.
    /// Returns `false` when nothing resolves `input`, in which case the
    /// caller records an incomplete-specification diagnostic.
    pub(crate) fn alias(&mut self, input: &QualifiedType, output: &QualifiedType) -> Result<bool> {
        self.ensure_unsealed()?;

        let provider_ids: SmallVec<[ProviderId; 2]> =
            self.provider_buckets.get(input).map(SmallVec::clone).unwrap_or_default();
        let builder_ids: SmallVec<[BuilderId; 2]> =
            self.builder_buckets.get(input).map(SmallVec::clone).unwrap_or_default();

        if provider_ids.is_empty() && builder_ids.is_empty() {
            return Ok(false);
        }

        for id in provider_ids {
            self.push_provider_key(output, id);
        }
        if !builder_ids.is_empty() {
            let bucket = self.builder_buckets.entry(output.clone()).or_default();
            for id in builder_ids {
                if !bucket.contains(&id) {
                    bucket.push(id);
                }
            }
        }
        Ok(true)
    }

    /// Seals the registry; all registration phases are complete.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Verifies the registration barrier has been crossed.
    ///
    /// Reading a partially populated registry is a resolver defect, so the
    /// validation and planning phases call this once on entry.
    pub fn ensure_sealed(&self) -> Result<()> {
        if self.sealed {
            Ok(())
        } else {
            Err(Error::from_kind(ErrorKind::RegistryNotSealed))
        }
    }

    fn ensure_unsealed(&self) -> Result<()> {
        if self.sealed {
            Err(Error::from_kind(ErrorKind::RegistryMutatedAfterSeal))
        } else {
            Ok(())
        }
    }

    /// All providers registered for `key`, in registration order.
    #[must_use]
    pub fn lookup(&self, key: &QualifiedType) -> &[ProviderId] {
        self.provider_buckets.get(key).map_or(&[], SmallVec::as_slice)
    }

    /// All builders registered for `key`, in registration order.
    #[must_use]
    pub fn lookup_builders(&self, key: &QualifiedType) -> &[BuilderId] {
        self.builder_buckets.get(key).map_or(&[], SmallVec::as_slice)
    }

    /// Whether any provider or builder resolves `key`.
    #[must_use]
    pub fn has(&self, key: &QualifiedType) -> bool {
        !self.lookup(key).is_empty() || !self.lookup_builders(key).is_empty()
    }

    /// The provider stored under `id`.
    #[must_use]
    pub fn provider(&self, id: ProviderId) -> &Provider {
        &self.providers[id.0 as usize]
    }

    /// The builder stored under `id`.
    #[must_use]
    pub fn builder(&self, id: BuilderId) -> &Builder {
        &self.builders[id.0 as usize]
    }

    /// The specification stored under `id`.
    #[must_use]
    pub fn specification(&self, id: SpecId) -> &Specification {
        &self.specifications[id.0 as usize]
    }

    /// All provider buckets, keyed in first-registration order so sweeps over
    /// them produce deterministic diagnostics.
    pub(crate) fn provider_buckets(&self) -> impl Iterator<Item = (&QualifiedType, &[ProviderId])> {
        self.provider_key_order
            .iter()
            .map(|key| (key, self.lookup(key)))
    }

    /// All providers in registration order, for deterministic diagnostics.
    pub fn providers(&self) -> impl Iterator<Item = (ProviderId, &Provider)> {
        (0u32..).map(ProviderId).zip(self.providers.iter())
    }

    /// All builders in registration order.
    pub fn builders(&self) -> impl Iterator<Item = (BuilderId, &Builder)> {
        (0u32..).map(BuilderId).zip(self.builders.iter())
    }

    /// All specifications in the closure, in closure order.
    pub fn specifications(&self) -> impl Iterator<Item = (SpecId, &Specification)> {
        (0u32..).map(SpecId).zip(self.specifications.iter())
    }
}

fn arena_index(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_err| Error::internal("registry arena exceeded u32 capacity"))
}
