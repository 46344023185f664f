// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fabrication modes and the cache-slot policy derived from them.
//!
//! A fabrication mode governs caching of a provider's *value*, not of its
//! registration: a `Scoped` provider is still registered once, but the plan
//! emitted for it consults a cache slot so the underlying factory runs at most
//! once per owning scope, no matter how many graph paths request the type.

use std::fmt;
use std::fmt::{Display, Formatter};

/// How the value produced by a provider is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FabricationMode {
    /// Every request invokes the underlying factory afresh.
    #[default]
    Recurrent,
    /// Cached once per owning injector instance.
    Scoped,
    /// Cached within one container activation; a new activation recomputes.
    Container,
    /// Cached for the lifetime of a nested container, across its activations.
    ContainerScoped,
}

impl FabricationMode {
    /// The cache scope implied by this mode, `None` for [`Self::Recurrent`].
    #[must_use]
    pub fn cache_scope(self) -> Option<CacheScope> {
        match self {
            Self::Recurrent => None,
            Self::Scoped => Some(CacheScope::Injector),
            Self::Container => Some(CacheScope::ContainerActivation),
            Self::ContainerScoped => Some(CacheScope::Container),
        }
    }
}

impl Display for FabricationMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recurrent => "recurrent",
            Self::Scoped => "scoped",
            Self::Container => "container",
            Self::ContainerScoped => "container-scoped",
        })
    }
}

/// The lifetime a cached value is keyed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// One owning injector instance.
    Injector,
    /// One container activation; discarded when the activation ends.
    ContainerActivation,
    /// One nested container, persisting across its activations.
    Container,
}

/// A storage slot for one provider's cached value within its scope.
///
/// Slots are assigned deterministically in first-resolution order. The emitter
/// reserves `slot.index()` storage cells per scope kind and consults the cell
/// before invoking the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheSlot {
    scope: CacheScope,
    index: u32,
}

impl CacheSlot {
    /// The scope the slot's storage belongs to.
    #[must_use]
    pub fn scope(self) -> CacheScope {
        self.scope
    }

    /// The slot's index within its scope's storage.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Hands out cache slots per scope kind during plan construction.
#[derive(Debug, Default)]
pub(crate) struct SlotAllocator {
    injector: u32,
    activation: u32,
    container: u32,
}

impl SlotAllocator {
    /// Allocates the next slot for `mode`, or `None` for uncached modes.
    pub(crate) fn allocate(&mut self, mode: FabricationMode) -> Option<CacheSlot> {
        let scope = mode.cache_scope()?;
        let counter = match scope {
            CacheScope::Injector => &mut self.injector,
            CacheScope::ContainerActivation => &mut self.activation,
            CacheScope::Container => &mut self.container,
        };
        let index = *counter;
        *counter += 1;
        Some(CacheSlot { scope, index })
    }

    /// Slots handed out so far for `scope`.
    pub(crate) fn allocated(&self, scope: CacheScope) -> u32 {
        match scope {
            CacheScope::Injector => self.injector,
            CacheScope::ContainerActivation => self.activation,
            CacheScope::Container => self.container,
        }
    }
}
