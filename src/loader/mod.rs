//! The Module Loader seam.
//!
//! Loading and evaluating a module body is the job of an external
//! collaborator, typically the build tool's item evaluator. The resolver
//! talks to it through the [`ModuleLoader`] trait and never performs I/O
//! itself.

pub mod providers;

use anyhow::Result;
use semver::VersionReq;

use crate::core::item::Value;
use crate::core::module::{Module, ParameterDecl};
use crate::util::Symbol;

pub use providers::{ModuleProvider, ProviderRecord, ProviderRegistry, ProviderStore};

/// A request for one module instance.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Target module name
    pub name: Symbol,

    /// Version constraint from the dependency reference
    pub version_req: VersionReq,

    /// Parameter assignments, already validated against the target's
    /// declarations where those were available up front
    pub parameters: Vec<(Symbol, Value)>,

    /// The product asking, for error attribution
    pub product: Symbol,
}

impl LoadRequest {
    pub fn new(name: Symbol, product: Symbol) -> Self {
        LoadRequest {
            name,
            version_req: VersionReq::STAR,
            parameters: Vec::new(),
            product,
        }
    }
}

/// Loads and evaluates modules on behalf of the resolver.
///
/// `Ok(None)` means "I do not know this module" and lets module providers
/// take over; an `Err` is a real load failure (for example a syntax error
/// in the module body) and is propagated verbatim, attributed to the
/// requesting product.
pub trait ModuleLoader {
    /// Load and evaluate the module matching the request.
    fn load_module(&mut self, request: &LoadRequest) -> Result<Option<Module>>;

    /// Parameter declarations for a module, when known without evaluating
    /// its body. Returning `None` defers validation until after the load.
    fn parameter_declarations(&self, name: Symbol) -> Option<Vec<ParameterDecl>> {
        let _ = name;
        None
    }
}
