// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use graft::{
    AutoFactoryDeclaration, BuilderDeclaration, BuilderMethodDeclaration, CacheScope, ChildInjectorDeclaration,
    ContainerBinding, Declarations, DiagnosticKind, FabricationMode, FactoryDeclaration, GraphCompiler,
    FactoryMemberKind, InjectorDeclaration, InstantiationMode, LinkDeclaration, MergeRule, PlanId, PlanNode,
    ProviderKind, ProviderMethodDeclaration, QualifiedType, ResolvedInjectorPlan, SourceRef, SpecificationDeclaration,
    TypeKey,
};
use pretty_assertions::assert_eq;

fn ty(name: &str) -> QualifiedType {
    QualifiedType::plain(TypeKey::named(name))
}

fn handler_list() -> QualifiedType {
    QualifiedType::plain(TypeKey::list("List", TypeKey::named("Handler")))
}

fn injector(name: &str, specifications: &[&str], provided: &[(&str, QualifiedType)]) -> InjectorDeclaration {
    InjectorDeclaration {
        name: name.into(),
        generated_name: None,
        specifications: specifications.iter().map(|&s| s.into()).collect(),
        dependency_interface: None,
        providers: provided
            .iter()
            .map(|(member, requested)| ProviderMethodDeclaration {
                member: (*member).into(),
                requested: requested.clone(),
            })
            .collect(),
        builders: vec![],
        child_injectors: vec![],
        source: SourceRef::new("app", name),
    }
}

fn invoked_member<'p>(plan: &'p ResolvedInjectorPlan, id: PlanId) -> &'p str {
    match plan.plans().node(id) {
        Some(PlanNode::Invoke { provider, .. }) => plan.registry().provider(*provider).member(),
        other => panic!("expected an invoke node, got {other:?}"),
    }
}

#[test]
fn labeled_bindings_are_independent() {
    let primary = QualifiedType::labeled(TypeKey::named("Connection"), "primary");
    let replica = QualifiedType::labeled(TypeKey::named("Connection"), "replica");

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("ConnSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("ConnSpec", "primary", primary.clone(), []));
    declarations
        .factories
        .push(FactoryDeclaration::method("ConnSpec", "replica", replica.clone(), []));
    declarations.injectors.push(injector(
        "App",
        &["ConnSpec"],
        &[("getPrimary", primary), ("getReplica", replica)],
    ));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    let first = plan.provider_methods()[0].root();
    let second = plan.provider_methods()[1].root();
    assert_ne!(first, second);
    assert_eq!(invoked_member(plan, first), "primary");
    assert_eq!(invoked_member(plan, second), "replica");
}

#[test]
fn multi_bind_list_concatenates_in_registration_order() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("HandlerSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "first", handler_list(), []).partial());
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "second", handler_list(), []).partial());
    declarations
        .injectors
        .push(injector("App", &["HandlerSpec"], &[("getHandlers", handler_list())]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    let root = plan.provider_methods()[0].root();
    match plan.plans().node(root) {
        Some(PlanNode::Aggregate { parts, merge }) => {
            assert_eq!(*merge, MergeRule::Concatenate);
            let members: Vec<_> = parts.iter().map(|&part| invoked_member(plan, part)).collect();
            assert_eq!(members, ["first", "second"]);
        }
        other => panic!("expected an aggregate node, got {other:?}"),
    }
}

#[test]
fn multi_bind_shapes_pick_their_merge_rule() {
    let handler_set = QualifiedType::plain(TypeKey::set("Set", TypeKey::named("Handler")));
    let handler_map = QualifiedType::plain(TypeKey::map("Map", TypeKey::named("String"), TypeKey::named("Handler")));

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("HandlerSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "setPart", handler_set.clone(), []).partial());
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "mapPart", handler_map.clone(), []).partial());
    declarations.injectors.push(injector(
        "App",
        &["HandlerSpec"],
        &[("getSet", handler_set), ("getMap", handler_map)],
    ));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    match plan.plans().node(plan.provider_methods()[0].root()) {
        Some(PlanNode::Aggregate { merge, .. }) => assert_eq!(*merge, MergeRule::Union),
        other => panic!("expected an aggregate node, got {other:?}"),
    }
    match plan.plans().node(plan.provider_methods()[1].root()) {
        Some(PlanNode::Aggregate { merge, .. }) => assert_eq!(*merge, MergeRule::LastWriterWins),
        other => panic!("expected an aggregate node, got {other:?}"),
    }
}

#[test]
fn mixing_single_and_partial_providers_is_invalid() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("HandlerSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "whole", handler_list(), []));
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "part", handler_list(), []).partial());
    declarations
        .injectors
        .push(injector("App", &["HandlerSpec"], &[("getHandlers", handler_list())]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("mixes")
    }));
}

#[test]
fn partial_provider_of_a_non_collection_type_is_invalid() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("HandlerSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("HandlerSpec", "part", ty("Handler"), []).partial());
    declarations
        .injectors
        .push(injector("App", &["HandlerSpec"], &[]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(
        plan.diagnostics()
            .iter()
            .any(|d| d.kind() == DiagnosticKind::InvalidSpecification)
    );
}

#[test]
fn deferred_dependency_plans_a_lazy_wrapper() {
    let deferred_engine = QualifiedType::plain(TypeKey::deferred("Factory", TypeKey::named("Engine")));

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("CarSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("CarSpec", "engine", ty("Engine"), []));
    declarations
        .factories
        .push(FactoryDeclaration::method("CarSpec", "car", ty("Car"), [deferred_engine]));
    declarations
        .injectors
        .push(injector("App", &["CarSpec"], &[("getCar", ty("Car"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    let root = plan.provider_methods()[0].root();
    let argument = match plan.plans().node(root) {
        Some(PlanNode::Invoke { arguments, .. }) => arguments[0],
        other => panic!("expected an invoke node, got {other:?}"),
    };
    match plan.plans().node(argument) {
        Some(PlanNode::Deferred { target }) => assert_eq!(invoked_member(plan, *target), "engine"),
        other => panic!("expected a deferred node, got {other:?}"),
    }
}

#[test]
fn deferred_self_dependency_is_buildable() {
    let deferred_node = QualifiedType::plain(TypeKey::deferred("Factory", TypeKey::named("Node")));

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("NodeSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("NodeSpec", "node", ty("Node"), [deferred_node]));
    declarations
        .injectors
        .push(injector("App", &["NodeSpec"], &[("getNode", ty("Node"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    // The lazy wrapper points back at the very invocation that consumes it.
    let root = plan.provider_methods()[0].root();
    let argument = match plan.plans().node(root) {
        Some(PlanNode::Invoke { arguments, .. }) => arguments[0],
        other => panic!("expected an invoke node, got {other:?}"),
    };
    match plan.plans().node(argument) {
        Some(PlanNode::Deferred { target }) => assert_eq!(*target, root),
        other => panic!("expected a deferred node, got {other:?}"),
    }
}

#[test]
fn eager_construction_cycle_is_diagnosed() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("CycleSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("CycleSpec", "a", ty("A"), [ty("B")]));
    declarations
        .factories
        .push(FactoryDeclaration::method("CycleSpec", "b", ty("B"), [ty("A")]));
    declarations
        .injectors
        .push(injector("App", &["CycleSpec"], &[("getA", ty("A"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("construction cycle")
    }));
}

#[test]
fn builder_methods_apply_every_registered_builder() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("NodeSpec", InstantiationMode::Instantiated));
    declarations
        .factories
        .push(FactoryDeclaration::method("NodeSpec", "leaf", ty("Leaf"), []));
    declarations.builders.push(BuilderDeclaration {
        owner: "NodeSpec".into(),
        member: "attachLeaf".into(),
        built: ty("Node"),
        dependencies: vec![ty("Leaf")],
        source: SourceRef::new("NodeSpec", "attachLeaf"),
    });
    let mut app = injector("App", &["NodeSpec"], &[]);
    app.builders.push(BuilderMethodDeclaration {
        member: "buildNode".into(),
        built: ty("Node"),
    });
    declarations.injectors.push(app);

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    let method = &plan.builder_methods()[0];
    assert_eq!(method.member(), "buildNode");
    assert_eq!(method.built(), &ty("Node"));
    assert_eq!(method.steps().len(), 1);
    let step = &method.steps()[0];
    assert_eq!(plan.registry().builder(step.builder()).member(), "attachLeaf");
    assert_eq!(step.arguments().len(), 1);
    assert_eq!(invoked_member(plan, step.arguments()[0]), "leaf");

    // The builder lives in its specification's container slice.
    let container = &plan.containers()[0];
    assert_eq!(container.specification(), "NodeSpec");
    assert_eq!(container.binding(), ContainerBinding::Instantiated);
    assert_eq!(container.builders(), &[step.builder()]);
}

#[test]
fn builder_without_dependencies_is_invalid() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("NodeSpec", InstantiationMode::Static));
    declarations.builders.push(BuilderDeclaration {
        owner: "NodeSpec".into(),
        member: "noop".into(),
        built: ty("Node"),
        dependencies: vec![],
        source: SourceRef::new("NodeSpec", "noop"),
    });
    declarations
        .injectors
        .push(injector("App", &["NodeSpec"], &[]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(
        plan.diagnostics()
            .iter()
            .any(|d| d.kind() == DiagnosticKind::InvalidSpecification)
    );
}

#[test]
fn dependency_specification_may_not_declare_builders_or_links() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("HostSpec", InstantiationMode::Dependency));
    declarations
        .factories
        .push(FactoryDeclaration::method("HostSpec", "config", ty("Config"), []));
    declarations.builders.push(BuilderDeclaration {
        owner: "HostSpec".into(),
        member: "tweak".into(),
        built: ty("Config"),
        dependencies: vec![ty("Config")],
        source: SourceRef::new("HostSpec", "tweak"),
    });
    declarations
        .links
        .push(LinkDeclaration::new("HostSpec", ty("Config"), ty("IConfig")));
    declarations
        .injectors
        .push(injector("App", &["HostSpec"], &[("getConfig", ty("Config"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("builder")
    }));
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("links")
    }));
}

#[test]
fn property_factory_with_dependencies_is_invalid() {
    let mut factory = FactoryDeclaration::method("UiSpec", "theme", ty("Theme"), [ty("Palette")]);
    factory.kind = FactoryMemberKind::Property;

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("UiSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("UiSpec", "palette", ty("Palette"), []));
    declarations.factories.push(factory);
    declarations
        .injectors
        .push(injector("App", &["UiSpec"], &[("getTheme", ty("Theme"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("cannot declare dependencies")
    }));
}

#[test]
fn dependency_interface_is_externally_supplied() {
    let mut declarations = Declarations::default();
    declarations
        .factories
        .push(FactoryDeclaration::method("HostDeps", "config", ty("Config"), []));
    let mut app = injector("App", &[], &[("getConfig", ty("Config"))]);
    app.dependency_interface = Some("HostDeps".into());
    declarations.injectors.push(app);

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    assert_eq!(invoked_member(plan, plan.provider_methods()[0].root()), "config");
    let container = &plan.containers()[0];
    assert_eq!(container.specification(), "HostDeps");
    assert_eq!(container.binding(), ContainerBinding::ExternallySupplied);
}

#[test]
fn child_injector_threads_passed_specifications() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("AppSpec", InstantiationMode::Static));
    declarations
        .specifications
        .push(SpecificationDeclaration::new("UserSpec", InstantiationMode::Instantiated));
    declarations
        .factories
        .push(FactoryDeclaration::method("UserSpec", "user", ty("User"), []));
    let mut parent = injector("App", &["AppSpec"], &[]);
    parent.child_injectors.push(ChildInjectorDeclaration {
        member: "makeSession".into(),
        target: "Session".into(),
        passed_specifications: vec!["UserSpec".into()],
    });
    declarations.injectors.push(parent);
    declarations
        .injectors
        .push(injector("Session", &["UserSpec"], &[("getUser", ty("User"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    assert!(plan_set.is_valid());

    let parent = plan_set.injector("App").unwrap();
    assert_eq!(parent.child_injectors().len(), 1);
    assert_eq!(parent.child_injectors()[0].member(), "makeSession");
    assert_eq!(parent.child_injectors()[0].target(), "Session");

    // The child sees the passed specification as supplied from outside, so it
    // never constructs its own instance.
    let child = plan_set.injector("Session").unwrap();
    let container = child
        .containers()
        .iter()
        .find(|c| c.specification() == "UserSpec")
        .unwrap();
    assert_eq!(container.binding(), ContainerBinding::ExternallySupplied);
}

#[test]
fn child_factory_targeting_unknown_injector_is_invalid() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("AppSpec", InstantiationMode::Static));
    let mut parent = injector("App", &["AppSpec"], &[]);
    parent.child_injectors.push(ChildInjectorDeclaration {
        member: "makeSession".into(),
        target: "NoSuchInjector".into(),
        passed_specifications: vec![],
    });
    declarations.injectors.push(parent);

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();

    assert!(!plan.is_valid());
    assert!(plan.diagnostics().iter().any(|d| {
        d.kind() == DiagnosticKind::InvalidSpecification && d.message().contains("unknown injector")
    }));
}

#[test]
fn auto_factories_resolve_constructor_and_property_dependencies() {
    let mut auto = AutoFactoryDeclaration::new(ty("Widget"), [ty("Frame")]);
    auto.required_properties.push(("theme".into(), ty("Theme")));

    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("UiSpec", InstantiationMode::Static));
    declarations
        .factories
        .push(FactoryDeclaration::method("UiSpec", "frame", ty("Frame"), []));
    declarations
        .factories
        .push(FactoryDeclaration::method("UiSpec", "theme", ty("Theme"), []));
    declarations.auto_factories.push(auto);
    declarations
        .injectors
        .push(injector("App", &["UiSpec"], &[("getWidget", ty("Widget"))]));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    let root = plan.provider_methods()[0].root();
    match plan.plans().node(root) {
        Some(PlanNode::Invoke { provider, arguments, .. }) => {
            let provider = plan.registry().provider(*provider);
            assert!(matches!(provider.kind(), ProviderKind::AutoFactory { .. }));
            assert_eq!(arguments.len(), 2);
            let members: Vec<_> = arguments.iter().map(|&arg| invoked_member(plan, arg)).collect();
            assert_eq!(members, ["frame", "theme"]);
        }
        other => panic!("expected an invoke node, got {other:?}"),
    }

    let auto_container = plan
        .containers()
        .iter()
        .find(|c| c.specification() == "<auto>")
        .unwrap();
    assert_eq!(auto_container.binding(), ContainerBinding::Static);
    assert!(auto_container.spec().is_none());
}

#[test]
fn container_scopes_track_their_own_slot_counts() {
    let mut declarations = Declarations::default();
    declarations
        .specifications
        .push(SpecificationDeclaration::new("CacheSpec", InstantiationMode::Static));
    declarations.factories.push(
        FactoryDeclaration::method("CacheSpec", "perActivation", ty("Session"), [])
            .fabricated(FabricationMode::Container),
    );
    declarations.factories.push(
        FactoryDeclaration::method("CacheSpec", "perContainer", ty("Pool"), [])
            .fabricated(FabricationMode::ContainerScoped),
    );
    declarations.injectors.push(injector(
        "App",
        &["CacheSpec"],
        &[("getSession", ty("Session")), ("getPool", ty("Pool"))],
    ));

    let plan_set = GraphCompiler::new(&declarations).compile();
    let plan = plan_set.injector("App").unwrap();
    assert!(plan.is_valid());

    assert_eq!(plan.cache_slots(CacheScope::Injector), 0);
    assert_eq!(plan.cache_slots(CacheScope::ContainerActivation), 1);
    assert_eq!(plan.cache_slots(CacheScope::Container), 1);

    match plan.plans().node(plan.provider_methods()[0].root()) {
        Some(PlanNode::Invoke { cache: Some(slot), .. }) => {
            assert_eq!(slot.scope(), CacheScope::ContainerActivation);
        }
        other => panic!("expected a cached invoke node, got {other:?}"),
    }
}
