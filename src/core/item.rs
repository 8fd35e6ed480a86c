//! The declarative item model.
//!
//! Items are the evaluated form of a build description: a tree of typed
//! nodes with property maps. They are produced by an external
//! parser/evaluator; the resolver only consumes them. See
//! [`crate::core::description`] for one concrete producer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::Symbol;

/// The kind of a declarative item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemType {
    Project,
    Product,
    Module,
    Group,
    Depends,
    Export,
    Parameters,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemType::Project => "Project",
            ItemType::Product => "Product",
            ItemType::Module => "Module",
            ItemType::Group => "Group",
            ItemType::Depends => "Depends",
            ItemType::Export => "Export",
            ItemType::Parameters => "Parameters",
        };
        write!(f, "{}", name)
    }
}

/// A property value.
///
/// No floats: build descriptions only carry booleans, integers, strings,
/// and lists, which keeps `Value` hashable for module identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A node in the evaluated item tree.
///
/// Properties keep declaration order because order drives override
/// precedence during parameter merging.
#[derive(Debug, Clone)]
pub struct Item {
    item_type: ItemType,
    name: Symbol,
    properties: Vec<(Symbol, Value)>,
    children: Vec<Item>,
}

impl Item {
    /// Create an item of the given type and name.
    pub fn new(item_type: ItemType, name: impl Into<Symbol>) -> Self {
        Item {
            item_type,
            name: name.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append a property, chaining.
    pub fn with_property(mut self, name: impl Into<Symbol>, value: impl Into<Value>) -> Self {
        self.set_property(name, value);
        self
    }

    /// Append a child item, chaining.
    pub fn with_child(mut self, child: Item) -> Self {
        self.children.push(child);
        self
    }

    /// Set a property, replacing an earlier value for the same name.
    pub fn set_property(&mut self, name: impl Into<Symbol>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.properties.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.properties.push((name, value));
        }
    }

    /// Append a child item.
    pub fn push_child(&mut self, child: Item) {
        self.children.push(child);
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn name(&self) -> Symbol {
        self.name
    }

    /// Look up a property by name.
    pub fn property(&self, name: impl Into<Symbol>) -> Option<&Value> {
        let name = name.into();
        self.properties
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    /// All properties in declaration order.
    pub fn properties(&self) -> &[(Symbol, Value)] {
        &self.properties
    }

    pub fn children(&self) -> &[Item] {
        &self.children
    }

    /// Children of a specific type, in declaration order.
    pub fn children_of_type(&self, item_type: ItemType) -> impl Iterator<Item = &Item> {
        self.children
            .iter()
            .filter(move |child| child.item_type == item_type)
    }
}
