//! Core data model: items, values, modules, products, dependency
//! references, and the TOML description producer.

pub mod dependency;
pub mod description;
pub mod item;
pub mod module;
pub mod product;

pub use dependency::DependencyRef;
pub use description::ProjectDescription;
pub use item::{Item, ItemType, Value};
pub use module::{Module, ModuleKey, ParameterDecl};
pub use product::{Product, ResolutionState, ResolvedModule};
