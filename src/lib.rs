//! Slipway - a module dependency resolver for declarative build
//! descriptions.
//!
//! Given a project's product items, slipway resolves each product's
//! declared dependencies into a list of shared module instances: modules
//! come from a pluggable loader (with provider fallback), inter-product
//! dependencies are handled by deferral and fixpoint iteration, and
//! dependency parameters are validated and merged along the chain.

pub mod core;
pub mod loader;
pub mod resolver;
pub mod util;

pub use core::{
    dependency::DependencyRef,
    item::{Item, ItemType, Value},
    module::{Module, ModuleKey, ParameterDecl},
    product::{Product, ResolutionState, ResolvedModule},
    ProjectDescription,
};

pub use loader::{LoadRequest, ModuleLoader, ModuleProvider, ProviderRecord, ProviderStore};
pub use resolver::{DeferralPolicy, Resolution, ResolveContext, ResolveError, Session};
pub use util::{CancelToken, Symbol};
