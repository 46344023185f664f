// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dependency graph validation.
//!
//! Two independent checks run against a sealed registry: every dependency of
//! every registered entry must itself be resolvable, and every type the
//! injector's public contract requests must be resolvable. Misses are
//! collected, not short-circuited, so one pass reports every problem.
//!
//! A third check closes the hole the first two leave open: a provider whose
//! dependency chain loops back onto itself passes both lookups yet can never
//! be constructed. Construction cycles are detected by depth-first traversal
//! with in-progress marking. Deferred-shaped dependencies are not traversed;
//! a lazy wrapper postpones construction, which is exactly what makes such a
//! cycle buildable.

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Display, Formatter};

use crate::diagnostics::Result;
use crate::model::{BuilderId, ProviderId};
use crate::qualified::{QualifiedType, TypeShape};
use crate::registry::ProviderRegistry;

/// Who required a type that turned out to be unresolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirer {
    /// A registered provider's dependency list.
    Provider(ProviderId),
    /// A registered builder's dependency list.
    Builder(BuilderId),
    /// The injector's own public contract.
    InjectorRoot,
}

/// One unresolvable requirement found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    required: QualifiedType,
    required_by: Requirer,
}

impl MissingDependency {
    /// The qualified type nothing resolves.
    #[must_use]
    pub fn required(&self) -> &QualifiedType {
        &self.required
    }

    /// Who asked for it.
    #[must_use]
    pub fn required_by(&self) -> Requirer {
        self.required_by
    }
}

impl Display for MissingDependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.required_by {
            Requirer::Provider(id) => write!(f, "no provider for {} (required by provider {id})", self.required),
            Requirer::Builder(id) => write!(f, "no provider for {} (required by builder {id})", self.required),
            Requirer::InjectorRoot => write!(f, "no provider for {} (required by the injector contract)", self.required),
        }
    }
}

/// The outcome of validating one injector's registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Every requirement has at least one registered provider.
    Valid,
    /// One or more requirements are unresolvable.
    Invalid(Vec<MissingDependency>),
}

impl ValidationResult {
    /// Whether validation passed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The collected misses; empty when valid.
    #[must_use]
    pub fn missing(&self) -> &[MissingDependency] {
        match self {
            Self::Valid => &[],
            Self::Invalid(missing) => missing,
        }
    }

    fn from_missing(missing: Vec<MissingDependency>) -> Self {
        if missing.is_empty() {
            Self::Valid
        } else {
            Self::Invalid(missing)
        }
    }
}

/// The injector contract's direct requirements.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RootRequirements<'a> {
    /// Types requested by public provider accessors.
    pub provided: &'a [QualifiedType],
    /// Built types of public builder methods.
    pub built: &'a [QualifiedType],
}

/// What a dependency entry actually requires from the registry.
///
/// A deferred wrapper requires its inner type; everything else requires
/// itself.
fn requirement_of(dependency: &QualifiedType) -> QualifiedType {
    dependency.deferred_target().unwrap_or_else(|| dependency.clone())
}

/// Runs the provider-closure and root-requirement checks.
///
/// Misses are reported in a deterministic order: providers in registration
/// order, then builders, then the injector's own contract.
pub(crate) fn validate(registry: &ProviderRegistry, roots: RootRequirements<'_>) -> Result<ValidationResult> {
    registry.ensure_sealed()?;

    let mut missing = Vec::new();

    for (id, provider) in registry.providers() {
        for dependency in provider.dependencies() {
            let required = requirement_of(dependency);
            // A builder alone cannot satisfy a dependency: it mutates an
            // instance some provider must first produce.
            if registry.lookup(&required).is_empty() {
                missing.push(MissingDependency {
                    required,
                    required_by: Requirer::Provider(id),
                });
            }
        }
    }

    for (id, builder) in registry.builders() {
        for dependency in builder.dependencies() {
            let required = requirement_of(dependency);
            if registry.lookup(&required).is_empty() {
                missing.push(MissingDependency {
                    required,
                    required_by: Requirer::Builder(id),
                });
            }
        }
    }

    for requested in roots.provided {
        let required = requirement_of(requested);
        if registry.lookup(&required).is_empty() {
            missing.push(MissingDependency {
                required,
                required_by: Requirer::InjectorRoot,
            });
        }
    }

    for built in roots.built {
        if registry.lookup_builders(built).is_empty() {
            missing.push(MissingDependency {
                required: built.clone(),
                required_by: Requirer::InjectorRoot,
            });
        }
    }

    Ok(ValidationResult::from_missing(missing))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Finds construction cycles in the provider dependency graph.
///
/// Nodes are qualified types with at least one provider; an edge runs from a
/// type to each non-deferred dependency of each of its providers. Every cycle
/// is reported once, as the path of types that closes it, in a deterministic
/// order derived from registration order.
pub(crate) fn find_construction_cycles(registry: &ProviderRegistry) -> Result<Vec<Vec<QualifiedType>>> {
    registry.ensure_sealed()?;

    let mut marks: HashMap<QualifiedType, Mark, foldhash::fast::RandomState> = HashMap::default();
    let mut stack = Vec::new();
    let mut cycles = Vec::new();

    for (_, provider) in registry.providers() {
        visit(registry, provider.provided(), &mut marks, &mut stack, &mut cycles);
    }

    Ok(cycles)
}

fn visit(
    registry: &ProviderRegistry,
    node: &QualifiedType,
    marks: &mut HashMap<QualifiedType, Mark, foldhash::fast::RandomState>,
    stack: &mut Vec<QualifiedType>,
    cycles: &mut Vec<Vec<QualifiedType>>,
) {
    match marks.get(node) {
        Some(Mark::Done) => return,
        Some(Mark::InProgress) => {
            // Back edge: the path from the node's position on the stack to
            // the top is the cycle.
            let start = stack.iter().position(|n| n == node).unwrap_or(0);
            cycles.push(stack[start..].to_vec());
            return;
        }
        None => {}
    }

    marks.insert(node.clone(), Mark::InProgress);
    stack.push(node.clone());

    for &id in registry.lookup(node) {
        for dependency in registry.provider(id).dependencies() {
            if dependency.shape() == TypeShape::Deferred {
                continue;
            }
            visit(registry, dependency, marks, stack, cycles);
        }
    }

    stack.pop();
    marks.insert(node.clone(), Mark::Done);
}
