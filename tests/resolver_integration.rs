//! End-to-end resolver tests driving a session through a mock loader.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Result};
use semver::Version;

use slipway::{
    DeferralPolicy, Item, ItemType, LoadRequest, Module, ModuleLoader, ModuleProvider,
    ParameterDecl, ProjectDescription, ResolutionState, ResolveError, Session, Symbol, Value,
};

/// Loader over a fixed module table, counting loads per module name.
struct MockLoader {
    modules: HashMap<&'static str, Module>,
    broken: Vec<&'static str>,
    loads: Rc<RefCell<HashMap<String, usize>>>,
}

impl MockLoader {
    fn new() -> Self {
        MockLoader {
            modules: HashMap::new(),
            broken: Vec::new(),
            loads: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    fn with_module(mut self, name: &'static str, module: Module) -> Self {
        self.modules.insert(name, module);
        self
    }

    fn with_broken(mut self, name: &'static str) -> Self {
        self.broken.push(name);
        self
    }

    fn load_counter(&self) -> Rc<RefCell<HashMap<String, usize>>> {
        Rc::clone(&self.loads)
    }
}

impl ModuleLoader for MockLoader {
    fn load_module(&mut self, request: &LoadRequest) -> Result<Option<Module>> {
        *self
            .loads
            .borrow_mut()
            .entry(request.name.as_str().to_string())
            .or_insert(0) += 1;

        if self.broken.contains(&request.name.as_str()) {
            bail!("syntax error in module body");
        }

        match self.modules.get(request.name.as_str()) {
            Some(module) if request.version_req.matches(module.version()) => {
                Ok(Some(module.clone()))
            }
            _ => Ok(None),
        }
    }

    fn parameter_declarations(&self, name: Symbol) -> Option<Vec<ParameterDecl>> {
        self.modules
            .get(name.as_str())
            .map(|m| m.declarations().to_vec())
    }
}

fn cpp_module() -> Module {
    Module::new("cpp", Version::new(1, 2, 0))
        .with_declaration(ParameterDecl::new("warnings").with_default(true))
        .with_declaration(ParameterDecl::new("optimization").with_default("fast"))
}

fn product(name: &str) -> Item {
    Item::new(ItemType::Product, name)
}

fn depends(name: &str) -> Item {
    Item::new(ItemType::Depends, name)
}

#[test]
fn acyclic_project_fully_resolves() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("lib").with_child(depends("cpp")))
        .unwrap();
    session
        .add_product(
            &product("app")
                .with_child(depends("cpp"))
                .with_child(depends("lib")),
        )
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert!(resolution.is_fully_resolved());
    assert_eq!(resolution.len(), 2);

    // Build order: lib before app.
    let order = resolution.topological_order();
    let pos = |name: &str| order.iter().position(|s| s.as_str() == name).unwrap();
    assert!(pos("lib") < pos("app"));
}

#[test]
fn deferred_product_resolves_on_second_pass() {
    // `app` is declared first and depends on `lib`'s export, so pass 1
    // defers it and resolves `lib`; pass 2 resolves `app`.
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("lib")))
        .unwrap();
    session
        .add_product(&product("lib").with_child(depends("cpp")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert!(resolution.is_fully_resolved());
    assert_eq!(
        resolution.deps(Symbol::new("app")),
        vec![Symbol::new("lib")]
    );

    // The export module is attached to the dependent.
    let modules = resolution.modules(Symbol::new("app"));
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].module().name().as_str(), "lib");
}

#[test]
fn product_cycle_fails_every_member() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("a").with_child(depends("b")))
        .unwrap();
    session
        .add_product(&product("b").with_child(depends("a")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(resolution.state(Symbol::new("a")), Some(ResolutionState::Failed));
    assert_eq!(resolution.state(Symbol::new("b")), Some(ResolutionState::Failed));
    assert_eq!(resolution.failures().len(), 2);
    for (_, cause) in resolution.failures() {
        assert!(cause.contains("cyclic dependency"), "cause: {cause}");
        assert!(cause.contains('a') && cause.contains('b'));
    }
}

#[test]
fn module_loaded_once_and_shared_by_reference() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let loads = loader.load_counter();
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("a").with_child(depends("cpp")))
        .unwrap();
    session
        .add_product(&product("b").with_child(depends("cpp")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();
    assert!(resolution.is_fully_resolved());

    let a = &resolution.modules(Symbol::new("a"))[0];
    let b = &resolution.modules(Symbol::new("b"))[0];
    assert!(Rc::ptr_eq(a.module(), b.module()));

    assert_eq!(loads.borrow().get("cpp"), Some(&1));
    assert_eq!(session.module_cache().len(), 1);
}

#[test]
fn distinct_parameters_are_distinct_instances() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let loads = loader.load_counter();
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("a").with_child(depends("cpp").with_property("warnings", false)))
        .unwrap();
    session
        .add_product(&product("b").with_child(depends("cpp")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();
    assert!(resolution.is_fully_resolved());

    let a = &resolution.modules(Symbol::new("a"))[0];
    let b = &resolution.modules(Symbol::new("b"))[0];
    assert!(!Rc::ptr_eq(a.module(), b.module()));
    assert_eq!(a.parameter(Symbol::new("warnings")), Some(&Value::Bool(false)));
    assert_eq!(b.parameter(Symbol::new("warnings")), Some(&Value::Bool(true)));

    assert_eq!(loads.borrow().get("cpp"), Some(&2));
}

#[test]
fn unknown_parameter_fails_before_any_load() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let loads = loader.load_counter();
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("cpp").with_property("warnigns", true)))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(
        resolution.state(Symbol::new("app")),
        Some(ResolutionState::Failed)
    );
    let cause = &resolution.failures()[0].1;
    assert!(cause.contains("declares no parameter `warnigns`"), "cause: {cause}");

    // Validation happened against the metadata query; the loader was
    // never asked to evaluate the module body.
    assert_eq!(loads.borrow().get("cpp"), None);
}

#[test]
fn optional_unknown_dependency_is_skipped() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(
            &product("app")
                .with_child(depends("cpp"))
                .with_child(depends("imaginary").with_property("required", false)),
        )
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert!(resolution.is_fully_resolved());
    let modules = resolution.modules(Symbol::new("app"));
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].module().name().as_str(), "cpp");
}

#[test]
fn missing_dependency_is_isolated_to_its_product() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("broken").with_child(depends("imaginary")))
        .unwrap();
    session
        .add_product(&product("fine").with_child(depends("cpp")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(
        resolution.state(Symbol::new("broken")),
        Some(ResolutionState::Failed)
    );
    assert_eq!(
        resolution.state(Symbol::new("fine")),
        Some(ResolutionState::Resolved)
    );
    let cause = &resolution.failures()[0].1;
    assert!(cause.contains("missing dependency `imaginary`"));
    assert!(cause.contains("`broken`"));
}

#[test]
fn dependent_of_failed_product_fails_with_attribution() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("broken").with_child(depends("imaginary")))
        .unwrap();
    session
        .add_product(&product("app").with_child(depends("broken")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(
        resolution.state(Symbol::new("app")),
        Some(ResolutionState::Failed)
    );
    let cause = resolution
        .failures()
        .iter()
        .find(|(p, _)| p.as_str() == "app")
        .map(|(_, c)| c.as_str())
        .unwrap();
    assert!(cause.contains("depends on failed product `broken`"), "cause: {cause}");
}

#[test]
fn dependent_declared_before_failed_product_gets_same_attribution() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));

    // The dependent comes first, so it defers before `broken` fails and
    // only sees the failure on the next pass.
    session
        .add_product(&product("app").with_child(depends("broken")))
        .unwrap();
    session
        .add_product(&product("broken").with_child(depends("imaginary")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(
        resolution.state(Symbol::new("app")),
        Some(ResolutionState::Failed)
    );
    let cause = resolution
        .failures()
        .iter()
        .find(|(p, _)| p.as_str() == "app")
        .map(|(_, c)| c.as_str())
        .unwrap();
    assert!(cause.contains("depends on failed product `broken`"), "cause: {cause}");
    assert!(!cause.contains("cyclic"), "cause: {cause}");
}

#[test]
fn fail_fast_aborts_the_session() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader)).fail_fast(true);

    session
        .add_product(&product("broken").with_child(depends("imaginary")))
        .unwrap();

    match session.resolve_all() {
        Err(ResolveError::MissingDependency { dependency, product }) => {
            assert_eq!(dependency, "imaginary");
            assert_eq!(product, "broken");
        }
        other => panic!("expected MissingDependency, got {other:?}"),
    }
}

#[test]
fn loader_failure_is_propagated_with_attribution() {
    let loader = MockLoader::new().with_broken("cpp");
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("cpp")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    let cause = &resolution.failures()[0].1;
    assert!(cause.contains("loading module `cpp` for product `app` failed"));
    assert!(cause.contains("syntax error in module body"));
}

#[test]
fn cancellation_aborts_between_products() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("cpp")))
        .unwrap();

    session.cancel_token().cancel();

    match session.resolve_all() {
        Err(ResolveError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
}

#[test]
fn deferral_policy_disallowed_fails_immediately() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("lib")))
        .unwrap();
    session
        .add_product(&product("lib").with_child(depends("cpp")))
        .unwrap();

    // `lib` has not resolved yet: deferral permitted means "try later".
    let done = session
        .resolve_dependencies(Symbol::new("app"), DeferralPolicy::Allowed)
        .unwrap();
    assert!(!done);

    // Without deferral the same situation is a hard failure.
    match session.resolve_dependencies(Symbol::new("app"), DeferralPolicy::Disallowed) {
        Err(ResolveError::MissingDependency { dependency, product }) => {
            assert_eq!(dependency, "lib");
            assert_eq!(product, "app");
        }
        other => panic!("expected MissingDependency, got {other:?}"),
    }
}

#[test]
fn base_module_injection_uses_dummy_when_loader_has_none() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));

    session.add_product(&product("app")).unwrap();

    let base = session.load_base_module(Symbol::new("app")).unwrap();
    assert_eq!(base.name().as_str(), "base");

    let app = session.product(Symbol::new("app")).unwrap();
    assert!(app.module_named(Symbol::new("base")).is_some());
}

#[test]
fn multiplexed_product_expands_into_instances() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    let axis = Value::List(vec![
        Value::Str("x86_64".to_string()),
        Value::Str("arm64".to_string()),
    ]);
    session
        .add_product(
            &product("app")
                .with_property("multiplex.over", axis)
                .with_child(depends("cpp")),
        )
        .unwrap();

    assert_eq!(session.product_count(), 2);

    let resolution = session.resolve_all().unwrap();
    assert!(resolution.is_fully_resolved());
    assert!(resolution.state(Symbol::new("app[x86_64]")).is_some());
    assert!(resolution.state(Symbol::new("app[arm64]")).is_some());
}

#[test]
fn dependency_on_multiplexed_product_needs_permit() {
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));

    let axis = Value::List(vec![
        Value::Str("host".to_string()),
        Value::Str("target".to_string()),
    ]);
    session
        .add_product(&product("tool").with_property("multiplex.over", axis))
        .unwrap();

    // Without the permit the two same-named exports collide.
    session
        .add_product(&product("strict").with_child(depends("tool")))
        .unwrap();
    // With the permit both instances attach.
    session
        .add_product(
            &product("lenient").with_child(depends("tool").with_property("multiplex", true)),
        )
        .unwrap();

    let resolution = session.resolve_all().unwrap();

    assert_eq!(
        resolution.state(Symbol::new("strict")),
        Some(ResolutionState::Failed)
    );
    assert_eq!(
        resolution.state(Symbol::new("lenient")),
        Some(ResolutionState::Resolved)
    );
    assert_eq!(resolution.modules(Symbol::new("lenient")).len(), 2);
}

/// Provider supplying one module, counting invocations.
struct CountingProvider {
    supplies: &'static str,
    invocations: Rc<RefCell<usize>>,
}

impl ModuleProvider for CountingProvider {
    fn name(&self) -> Symbol {
        Symbol::new("counting-provider")
    }

    fn can_provide(&self, module: Symbol) -> bool {
        module.as_str() == self.supplies
    }

    fn provide(&mut self, request: &LoadRequest, scratch: &Path) -> Result<Option<Module>> {
        *self.invocations.borrow_mut() += 1;
        assert!(scratch.is_dir());
        Ok(Some(Module::new(request.name, Version::new(2, 0, 0))))
    }
}

#[test]
fn provider_supplies_module_and_is_invoked_once_per_key() {
    let invocations = Rc::new(RefCell::new(0usize));
    let loader = MockLoader::new();
    let mut session = Session::new(Box::new(loader));
    session.register_provider(Box::new(CountingProvider {
        supplies: "qt.core",
        invocations: Rc::clone(&invocations),
    }));

    session
        .add_product(&product("a").with_child(depends("qt.core")))
        .unwrap();
    session
        .add_product(&product("b").with_child(depends("qt.core")))
        .unwrap();

    let resolution = session.resolve_all().unwrap();
    assert!(resolution.is_fully_resolved());

    // Second request hits the cache, so the provider ran once.
    assert_eq!(*invocations.borrow(), 1);

    let record = session
        .provider_store()
        .lookup(Symbol::new("qt.core"))
        .unwrap();
    assert_eq!(record.provider, "counting-provider");
    assert_eq!(record.version, "2.0.0");

    // The snapshot an external collaborator would persist.
    let json = session.provider_store().to_json().unwrap();
    assert!(json.contains("qt.core"));
}

#[test]
fn description_drives_a_full_resolution() {
    let text = r#"
[project]
name = "demo"

[[product]]
name = "app"
version = "1.0.0"

[[product.depends]]
name = "cpp"
[product.depends.parameters]
optimization = "small"

[[product.depends]]
name = "lib"

[[product]]
name = "lib"
version = "0.3.0"

[[product.depends]]
name = "cpp"
"#;

    let description = ProjectDescription::parse(text).unwrap();
    let project = description.to_item().unwrap();

    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));
    session.add_project(&project).unwrap();

    let resolution = session.resolve_all().unwrap();
    assert!(resolution.is_fully_resolved());

    let app_modules = resolution.modules(Symbol::new("app"));
    assert_eq!(app_modules.len(), 2);
    assert_eq!(
        app_modules[0].parameter(Symbol::new("optimization")),
        Some(&Value::Str("small".to_string()))
    );
}

#[test]
fn profiling_report_covers_the_run() {
    let loader = MockLoader::new().with_module("cpp", cpp_module());
    let mut session = Session::new(Box::new(loader));

    session
        .add_product(&product("app").with_child(depends("cpp")))
        .unwrap();
    session.resolve_all().unwrap();

    let report = session.profiling_report(4);
    assert!(report.contains("    module loads: "));
    assert!(report.contains("    resolution passes: "));
    assert!(report.contains("1 call(s)"));
}
