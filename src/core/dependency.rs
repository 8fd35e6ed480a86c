//! Dependency references.
//!
//! A `DependencyRef` is the resolver-side form of a `Depends` item: the
//! target name, a version constraint, parameter assignments, and flags.
//! References are transient; they only exist while one product resolves.

use std::fmt;

use anyhow::{bail, Context, Result};
use semver::{Version, VersionReq};

use crate::core::item::{Item, ItemType, Value};
use crate::util::Symbol;

/// Properties of a `Depends` item that are not parameter assignments.
const RESERVED_PROPERTIES: [&str; 5] = ["name", "version", "required", "host", "multiplex"];

/// A declared dependency of a product.
#[derive(Debug, Clone)]
pub struct DependencyRef {
    /// Target module or product name
    name: Symbol,

    /// Version constraint
    version_req: VersionReq,

    /// Parameter assignments in declaration order
    parameters: Vec<(Symbol, Value)>,

    /// Whether resolution fails if the target cannot be located
    required: bool,

    /// Whether the dependency targets the host rather than the target platform
    host: bool,

    /// Whether same-named modules from multiplexed instances are permitted
    multiplex_ok: bool,
}

impl DependencyRef {
    /// Create a reference to the given target.
    pub fn new(name: impl Into<Symbol>) -> Self {
        DependencyRef {
            name: name.into(),
            version_req: VersionReq::STAR,
            parameters: Vec::new(),
            required: true,
            host: false,
            multiplex_ok: false,
        }
    }

    /// Set the version constraint.
    pub fn with_version_req(mut self, req: VersionReq) -> Self {
        self.version_req = req;
        self
    }

    /// Append a parameter assignment.
    pub fn with_parameter(mut self, name: impl Into<Symbol>, value: impl Into<Value>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    /// Set whether the dependency is required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Mark as a host dependency.
    pub fn host(mut self, host: bool) -> Self {
        self.host = host;
        self
    }

    /// Permit same-named modules across multiplexed instances.
    pub fn allow_multiplex(mut self, allow: bool) -> Self {
        self.multiplex_ok = allow;
        self
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn version_req(&self) -> &VersionReq {
        &self.version_req
    }

    pub fn parameters(&self) -> &[(Symbol, Value)] {
        &self.parameters
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_host(&self) -> bool {
        self.host
    }

    pub fn allows_multiplex(&self) -> bool {
        self.multiplex_ok
    }

    /// Check a concrete version against the constraint.
    pub fn matches_version(&self, version: &Version) -> bool {
        self.version_req.matches(version)
    }

    /// Build a reference from a `Depends` item.
    ///
    /// The item name is the target; `version`, `required`, `host`, and
    /// `multiplex` properties map to the corresponding fields. Every other
    /// property is a parameter assignment, in declaration order.
    pub fn from_item(item: &Item) -> Result<DependencyRef> {
        if item.item_type() != ItemType::Depends {
            bail!(
                "expected a Depends item, found {} `{}`",
                item.item_type(),
                item.name()
            );
        }
        if item.name().is_empty() {
            bail!("Depends item has no target name");
        }

        let mut dep = DependencyRef::new(item.name());

        for (prop, value) in item.properties() {
            if !is_reserved_property(prop.as_str()) {
                dep.parameters.push((*prop, value.clone()));
                continue;
            }
            match prop.as_str() {
                "version" => {
                    let raw = value.as_str().with_context(|| {
                        format!(
                            "dependency `{}`: `version` must be a string, found {}",
                            item.name(),
                            value.type_name()
                        )
                    })?;
                    dep.version_req = raw.parse().with_context(|| {
                        format!("dependency `{}`: invalid version constraint `{}`", item.name(), raw)
                    })?;
                }
                "required" => {
                    dep.required = expect_bool(item.name(), "required", value)?;
                }
                "host" => {
                    dep.host = expect_bool(item.name(), "host", value)?;
                }
                "multiplex" => {
                    dep.multiplex_ok = expect_bool(item.name(), "multiplex", value)?;
                }
                _ => {} // `name` restates the item's own target name
            }
        }

        Ok(dep)
    }
}

fn expect_bool(target: Symbol, prop: &str, value: &Value) -> Result<bool> {
    value.as_bool().with_context(|| {
        format!(
            "dependency `{}`: `{}` must be a bool, found {}",
            target,
            prop,
            value.type_name()
        )
    })
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.version_req != VersionReq::STAR {
            write!(f, " {}", self.version_req)?;
        }
        Ok(())
    }
}

/// Check whether a `Depends` property name is reserved (not a parameter).
pub fn is_reserved_property(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_item_basic() {
        let item = Item::new(ItemType::Depends, "cpp")
            .with_property("version", "^1.2")
            .with_property("required", false);

        let dep = DependencyRef::from_item(&item).unwrap();
        assert_eq!(dep.name().as_str(), "cpp");
        assert!(!dep.is_required());
        assert!(dep.matches_version(&Version::new(1, 3, 0)));
        assert!(!dep.matches_version(&Version::new(2, 0, 0)));
    }

    #[test]
    fn test_from_item_collects_parameters_in_order() {
        let item = Item::new(ItemType::Depends, "cpp")
            .with_property("warnings", true)
            .with_property("version", "1.0.0")
            .with_property("optimization", "small");

        let dep = DependencyRef::from_item(&item).unwrap();
        let params: Vec<_> = dep.parameters().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(params, vec!["warnings", "optimization"]);
    }

    #[test]
    fn test_from_item_rejects_bad_version_type() {
        let item = Item::new(ItemType::Depends, "cpp").with_property("version", 1i64);
        let err = DependencyRef::from_item(&item).unwrap_err().to_string();
        assert!(err.contains("`version` must be a string"));
    }

    #[test]
    fn test_from_item_rejects_wrong_item_type() {
        let item = Item::new(ItemType::Group, "sources");
        assert!(DependencyRef::from_item(&item).is_err());
    }

    #[test]
    fn test_reserved_properties() {
        assert!(is_reserved_property("version"));
        assert!(!is_reserved_property("warnings"));
    }
}
