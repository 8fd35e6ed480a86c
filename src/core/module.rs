//! Loaded modules and their cache identity.
//!
//! A module is a named, versioned unit of build configuration. Once loaded
//! it is shared read-only (behind `Rc`) across every product that requests
//! the same identity: (name, version, parameter set).

use std::fmt;

use semver::Version;

use crate::core::item::{Item, ItemType, Value};
use crate::util::Symbol;

/// A parameter a module declares for its dependents to set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    name: Symbol,
    default: Option<Value>,
    overridable: bool,
}

impl ParameterDecl {
    pub fn new(name: impl Into<Symbol>) -> Self {
        ParameterDecl {
            name: name.into(),
            default: None,
            overridable: true,
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Mark whether dependents further down the chain may override a value
    /// already set for this parameter.
    pub fn overridable(mut self, overridable: bool) -> Self {
        self.overridable = overridable;
        self
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn is_overridable(&self) -> bool {
        self.overridable
    }
}

/// A loaded, evaluated module.
#[derive(Debug, Clone)]
pub struct Module {
    name: Symbol,
    version: Version,
    declarations: Vec<ParameterDecl>,
    item: Item,
    provider: Option<Symbol>,
}

impl Module {
    /// Create a module with an empty body.
    pub fn new(name: impl Into<Symbol>, version: Version) -> Self {
        let name = name.into();
        Module {
            name,
            version,
            declarations: Vec::new(),
            item: Item::new(ItemType::Module, name),
            provider: None,
        }
    }

    /// Add a parameter declaration, chaining.
    pub fn with_declaration(mut self, decl: ParameterDecl) -> Self {
        self.declarations.push(decl);
        self
    }

    /// Set the evaluated body item.
    pub fn with_item(mut self, item: Item) -> Self {
        self.item = item;
        self
    }

    /// Record which module provider produced this module.
    pub fn from_provider(mut self, provider: Symbol) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn declarations(&self) -> &[ParameterDecl] {
        &self.declarations
    }

    /// Look up a parameter declaration by name.
    pub fn declares(&self, name: Symbol) -> Option<&ParameterDecl> {
        self.declarations.iter().find(|d| d.name() == name)
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn provider(&self) -> Option<Symbol> {
        self.provider
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Cache identity of a module instance.
///
/// Parameters are sorted by name so two references that assign the same
/// values in a different order share one instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    name: Symbol,
    version: Version,
    parameters: Vec<(Symbol, Value)>,
}

impl ModuleKey {
    pub fn new(name: Symbol, version: Version, parameters: &[(Symbol, Value)]) -> Self {
        ModuleKey {
            name,
            version,
            parameters: canonical_parameters(parameters),
        }
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn parameters(&self) -> &[(Symbol, Value)] {
        &self.parameters
    }
}

/// Sort parameter assignments by name, keeping the last write for
/// duplicated names.
pub fn canonical_parameters(parameters: &[(Symbol, Value)]) -> Vec<(Symbol, Value)> {
    let mut canonical: Vec<(Symbol, Value)> = Vec::with_capacity(parameters.len());
    for (name, value) in parameters {
        if let Some(slot) = canonical.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.clone();
        } else {
            canonical.push((*name, value.clone()));
        }
    }
    canonical.sort_by(|(a, _), (b, _)| a.cmp(b));
    canonical
}
