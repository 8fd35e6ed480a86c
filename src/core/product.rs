//! Product contexts.
//!
//! A product is a buildable target. During resolution it owns its declared
//! dependency references, the modules resolved so far (in declaration
//! order), and its resolution state. Once resolved it publishes an export
//! module that other products can depend on.

use std::fmt;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use semver::Version;

use crate::core::dependency::DependencyRef;
use crate::core::item::{Item, ItemType, Value};
use crate::core::module::{Module, ParameterDecl};
use crate::util::Symbol;

/// Where a product stands in the fixpoint iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    /// Not yet visited in any pass
    Unresolved,
    /// Blocked on another product's export; will be retried
    Deferred,
    /// All dependencies resolved, export published
    Resolved,
    /// Resolution aborted for this product
    Failed,
}

impl fmt::Display for ResolutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionState::Unresolved => "unresolved",
            ResolutionState::Deferred => "deferred",
            ResolutionState::Resolved => "resolved",
            ResolutionState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A module instance attached to a product, with its effective parameter
/// values after merging.
#[derive(Debug, Clone)]
pub struct ResolvedModule {
    module: Rc<Module>,
    parameters: Vec<(Symbol, Value)>,
}

impl ResolvedModule {
    pub fn new(module: Rc<Module>, parameters: Vec<(Symbol, Value)>) -> Self {
        ResolvedModule { module, parameters }
    }

    pub fn module(&self) -> &Rc<Module> {
        &self.module
    }

    pub fn parameters(&self) -> &[(Symbol, Value)] {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut Vec<(Symbol, Value)> {
        &mut self.parameters
    }

    /// Effective value of one parameter.
    pub fn parameter(&self, name: Symbol) -> Option<&Value> {
        self.parameters
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

/// A product being resolved.
#[derive(Debug)]
pub struct Product {
    name: Symbol,
    version: Version,
    multiplex_id: Option<Symbol>,
    dependencies: Vec<DependencyRef>,
    /// References before this index are resolved
    cursor: usize,
    modules: Vec<ResolvedModule>,
    /// Product-to-product edges discovered during resolution
    product_deps: Vec<Symbol>,
    export_item: Option<Item>,
    export: Option<Rc<Module>>,
    state: ResolutionState,
    failure: Option<String>,
}

impl Product {
    /// Build a product context from a `Product` item.
    ///
    /// `Depends` children become dependency references in declaration
    /// order; an `Export` child is kept to publish on success.
    pub fn from_item(item: &Item) -> Result<Product> {
        if item.item_type() != ItemType::Product {
            bail!(
                "expected a Product item, found {} `{}`",
                item.item_type(),
                item.name()
            );
        }
        if item.name().is_empty() {
            bail!("Product item has no name");
        }

        let version = match item.property("version") {
            Some(value) => {
                let raw = value.as_str().with_context(|| {
                    format!(
                        "product `{}`: `version` must be a string, found {}",
                        item.name(),
                        value.type_name()
                    )
                })?;
                raw.parse().with_context(|| {
                    format!("product `{}`: invalid version `{}`", item.name(), raw)
                })?
            }
            None => Version::new(0, 0, 0),
        };

        let multiplex_id = item
            .property("multiplex.id")
            .and_then(|v| v.as_str())
            .map(Symbol::new);

        let dependencies = item
            .children_of_type(ItemType::Depends)
            .map(DependencyRef::from_item)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("product `{}`", item.name()))?;

        let export_item = item.children_of_type(ItemType::Export).next().cloned();

        Ok(Product {
            name: item.name(),
            version,
            multiplex_id,
            dependencies,
            cursor: 0,
            modules: Vec::new(),
            product_deps: Vec::new(),
            export_item,
            export: None,
            state: ResolutionState::Unresolved,
            failure: None,
        })
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn multiplex_id(&self) -> Option<Symbol> {
        self.multiplex_id
    }

    /// Unique key for this product instance.
    ///
    /// Plain products use their name; multiplexed instances append the
    /// multiplex id so instances stay distinguishable downstream.
    pub fn instance_key(&self) -> Symbol {
        match self.multiplex_id {
            Some(id) => Symbol::new(format!("{}[{}]", self.name, id)),
            None => self.name,
        }
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ResolutionState) {
        self.state = state;
    }

    /// Move to Failed, recording the cause.
    pub(crate) fn fail(&mut self, cause: impl Into<String>) {
        self.state = ResolutionState::Failed;
        self.failure = Some(cause.into());
    }

    /// The recorded failure cause, if any.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn dependencies(&self) -> &[DependencyRef] {
        &self.dependencies
    }

    /// The next unresolved dependency reference, if any.
    pub(crate) fn pending_dependency(&self) -> Option<&DependencyRef> {
        self.dependencies.get(self.cursor)
    }

    /// Commit the reference at the cursor as resolved.
    pub(crate) fn advance(&mut self) {
        self.cursor += 1;
    }

    /// Resolved modules in declaration order.
    pub fn modules(&self) -> &[ResolvedModule] {
        &self.modules
    }

    /// Find an attached module by name.
    pub fn module_named(&self, name: Symbol) -> Option<&ResolvedModule> {
        self.modules.iter().find(|m| m.module().name() == name)
    }

    pub(crate) fn module_named_mut(&mut self, name: Symbol) -> Option<&mut ResolvedModule> {
        self.modules.iter_mut().find(|m| m.module().name() == name)
    }

    /// Append a module instance, preserving declaration order.
    pub(crate) fn add_module(&mut self, resolved: ResolvedModule) {
        self.modules.push(resolved);
    }

    pub(crate) fn record_product_edge(&mut self, target: Symbol) {
        if !self.product_deps.contains(&target) {
            self.product_deps.push(target);
        }
    }

    /// Products this product depends on (build-order edges).
    pub fn product_dependencies(&self) -> &[Symbol] {
        &self.product_deps
    }

    /// The export module, available once the product is Resolved.
    pub fn export(&self) -> Option<&Rc<Module>> {
        self.export.as_ref()
    }

    /// Commit to Resolved and publish the export module.
    pub(crate) fn finish_resolved(&mut self) {
        self.export = Some(Rc::new(self.build_export()));
        self.state = ResolutionState::Resolved;
    }

    /// Build the export module from the `Export` child item.
    ///
    /// Properties of `Parameters` children become parameter declarations
    /// with their values as defaults.
    fn build_export(&self) -> Module {
        let mut export = Module::new(self.name, self.version.clone());

        if let Some(item) = &self.export_item {
            for params in item.children_of_type(ItemType::Parameters) {
                for (name, value) in params.properties() {
                    export = export
                        .with_declaration(ParameterDecl::new(*name).with_default(value.clone()));
                }
            }
            export = export.with_item(item.clone());
        }

        export
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.multiplex_id {
            Some(id) => write!(f, "{} [{}]", self.name, id),
            None => write!(f, "{}", self.name),
        }
    }
}
