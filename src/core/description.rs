//! TOML project descriptions.
//!
//! A convenience producer for the item model: a declarative description of
//! a project and its products, deserialized with serde and lowered into an
//! item tree. The resolver does not care where items come from; this module
//! exists so tests and small tools do not need a full description parser.
//!
//! ```toml
//! [project]
//! name = "hello"
//!
//! [[product]]
//! name = "app"
//! version = "1.0.0"
//!
//! [[product.depends]]
//! name = "cpp"
//! version = "^1"
//! [product.depends.parameters]
//! warnings = true
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::core::dependency::is_reserved_property;
use crate::core::item::{Item, ItemType, Value};

/// A parsed project description.
#[derive(Debug, Deserialize)]
pub struct ProjectDescription {
    pub project: ProjectMeta,

    #[serde(default, rename = "product")]
    pub products: Vec<ProductDesc>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectMeta {
    pub name: String,
}

/// One `[[product]]` table.
#[derive(Debug, Deserialize)]
pub struct ProductDesc {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    /// Multiplex axis values; expansion happens in the resolver.
    #[serde(default)]
    pub multiplex_over: Option<Vec<String>>,

    #[serde(default, rename = "depends")]
    pub depends: Vec<DependsDesc>,

    #[serde(default)]
    pub export: Option<ExportDesc>,
}

/// One `[[product.depends]]` table.
#[derive(Debug, Deserialize)]
pub struct DependsDesc {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub required: Option<bool>,

    #[serde(default)]
    pub host: Option<bool>,

    #[serde(default)]
    pub multiplex: Option<bool>,

    #[serde(default)]
    pub parameters: Option<toml::Table>,
}

/// A `[product.export]` table.
#[derive(Debug, Deserialize)]
pub struct ExportDesc {
    #[serde(default)]
    pub parameters: Option<toml::Table>,
}

impl ProjectDescription {
    /// Parse a description from TOML text.
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse project description")
    }

    /// Read and parse a description file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&text)
    }

    /// Lower the description into a `Project` item tree.
    pub fn to_item(&self) -> Result<Item> {
        let mut project = Item::new(ItemType::Project, self.project.name.as_str());

        for product in &self.products {
            project.push_child(product.to_item()?);
        }

        Ok(project)
    }
}

impl ProductDesc {
    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new(ItemType::Product, self.name.as_str());

        if let Some(version) = &self.version {
            item.set_property("version", version.as_str());
        }

        if let Some(axis) = &self.multiplex_over {
            let values = axis.iter().map(|v| Value::Str(v.clone())).collect();
            item.set_property("multiplex.over", Value::List(values));
        }

        for dep in &self.depends {
            item.push_child(dep.to_item()?);
        }

        if let Some(export) = &self.export {
            let mut export_item = Item::new(ItemType::Export, self.name.as_str());
            if let Some(params) = &export.parameters {
                let mut params_item = Item::new(ItemType::Parameters, self.name.as_str());
                for (name, value) in params {
                    params_item.set_property(name.as_str(), convert_value(value)?);
                }
                export_item.push_child(params_item);
            }
            item.push_child(export_item);
        }

        Ok(item)
    }
}

impl DependsDesc {
    fn to_item(&self) -> Result<Item> {
        let mut item = Item::new(ItemType::Depends, self.name.as_str());

        if let Some(version) = &self.version {
            item.set_property("version", version.as_str());
        }
        if let Some(required) = self.required {
            item.set_property("required", required);
        }
        if let Some(host) = self.host {
            item.set_property("host", host);
        }
        if let Some(multiplex) = self.multiplex {
            item.set_property("multiplex", multiplex);
        }

        if let Some(params) = &self.parameters {
            for (name, value) in params {
                if is_reserved_property(name) {
                    bail!(
                        "dependency `{}`: `{}` is not a parameter name",
                        self.name,
                        name
                    );
                }
                item.set_property(name.as_str(), convert_value(value)?);
            }
        }

        Ok(item)
    }
}

/// Convert a TOML value into an item property value.
///
/// Floats, datetimes, and nested tables have no meaning in dependency
/// parameters and are rejected.
fn convert_value(value: &toml::Value) -> Result<Value> {
    match value {
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::Integer(i) => Ok(Value::Int(*i)),
        toml::Value::String(s) => Ok(Value::Str(s.clone())),
        toml::Value::Array(items) => {
            let converted = items.iter().map(convert_value).collect::<Result<Vec<_>>>()?;
            Ok(Value::List(converted))
        }
        other => bail!("unsupported parameter value type: {}", other.type_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTION: &str = r#"
[project]
name = "hello"

[[product]]
name = "app"
version = "1.0.0"

[[product.depends]]
name = "cpp"
version = "^1"
[product.depends.parameters]
warnings = true

[[product.depends]]
name = "lib"

[[product]]
name = "lib"
version = "0.3.0"
[product.export.parameters]
linkage = "static"
"#;

    #[test]
    fn test_parse_and_lower() {
        let desc = ProjectDescription::parse(DESCRIPTION).unwrap();
        let project = desc.to_item().unwrap();

        assert_eq!(project.item_type(), ItemType::Project);
        assert_eq!(project.name().as_str(), "hello");
        assert_eq!(project.children().len(), 2);

        let app = &project.children()[0];
        assert_eq!(app.item_type(), ItemType::Product);
        let depends: Vec<_> = app
            .children_of_type(ItemType::Depends)
            .map(|d| d.name().as_str())
            .collect();
        assert_eq!(depends, vec!["cpp", "lib"]);

        let cpp = app.children_of_type(ItemType::Depends).next().unwrap();
        assert_eq!(cpp.property("warnings"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_export_parameters_become_items() {
        let desc = ProjectDescription::parse(DESCRIPTION).unwrap();
        let project = desc.to_item().unwrap();

        let lib = &project.children()[1];
        let export = lib.children_of_type(ItemType::Export).next().unwrap();
        let params = export.children_of_type(ItemType::Parameters).next().unwrap();
        assert_eq!(
            params.property("linkage"),
            Some(&Value::Str("static".to_string()))
        );
    }

    #[test]
    fn test_reserved_parameter_name_rejected() {
        let text = r#"
[project]
name = "bad"

[[product]]
name = "app"

[[product.depends]]
name = "cpp"
[product.depends.parameters]
version = "^2"
"#;
        let desc = ProjectDescription::parse(text).unwrap();
        let err = desc.to_item().unwrap_err().to_string();
        assert!(err.contains("`version` is not a parameter name"));
    }

    #[test]
    fn test_float_parameter_rejected() {
        let text = r#"
[project]
name = "bad"

[[product]]
name = "app"

[[product.depends]]
name = "cpp"
[product.depends.parameters]
ratio = 0.5
"#;
        let desc = ProjectDescription::parse(text).unwrap();
        let err = desc.to_item().unwrap_err().to_string();
        assert!(err.contains("unsupported parameter value type"));
    }
}
