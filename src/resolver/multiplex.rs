//! Product multiplexing.
//!
//! A product item carrying a `multiplex.over` list expands into one
//! concrete product instance per axis value. Evaluating the axis happens in
//! a temporary product context supplied with a base module through the
//! direct load path; the context is discarded after expansion.

use anyhow::{bail, Context, Result};

use crate::core::item::Item;
use crate::core::product::Product;
use crate::resolver::Session;

/// Property naming the multiplex axis on a product item.
pub const MULTIPLEX_OVER: &str = "multiplex.over";

/// Property carrying the instance id on expanded product items.
pub const MULTIPLEX_ID: &str = "multiplex.id";

/// Read the multiplex axis values from a product item, if any.
pub(crate) fn axis_values(item: &Item) -> Result<Option<Vec<String>>> {
    let value = match item.property(MULTIPLEX_OVER) {
        Some(value) => value,
        None => return Ok(None),
    };

    let list = value.as_list().with_context(|| {
        format!(
            "product `{}`: `{}` must be a list, found {}",
            item.name(),
            MULTIPLEX_OVER,
            value.type_name()
        )
    })?;

    let axis = list
        .iter()
        .map(|v| {
            v.as_str().map(str::to_string).with_context(|| {
                format!(
                    "product `{}`: `{}` entries must be strings",
                    item.name(),
                    MULTIPLEX_OVER
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if axis.is_empty() {
        bail!("product `{}`: `{}` is empty", item.name(), MULTIPLEX_OVER);
    }

    Ok(Some(axis))
}

/// Expand a product item into one item per axis value.
pub(crate) fn expand(item: &Item, axis: &[String]) -> Vec<Item> {
    axis.iter()
        .map(|id| {
            let mut instance = item.clone();
            instance.set_property(MULTIPLEX_ID, id.as_str());
            instance
        })
        .collect()
}

impl Session {
    /// Expand a multiplexed product item, or return `None` for plain
    /// products.
    ///
    /// The axis is evaluated in a temporary product context holding a base
    /// module; the context never enters the retry loop and is dropped
    /// before the concrete instances are created.
    pub(crate) fn multiplexed_instances(&mut self, item: &Item) -> Result<Option<Vec<Item>>> {
        let axis = match axis_values(item)? {
            Some(axis) => axis,
            None => return Ok(None),
        };

        let temp = Product::from_item(item)?;
        let idx = self.products.len();
        self.index.entry(temp.name()).or_default().push(idx);
        self.products.push(temp);

        let loaded = self.load_base_module_at(idx);

        self.products.pop();
        if let Some(indices) = self.index.get_mut(&item.name()) {
            indices.pop();
            if indices.is_empty() {
                self.index.remove(&item.name());
            }
        }

        loaded.with_context(|| {
            format!("product `{}`: multiplex expansion failed", item.name())
        })?;

        Ok(Some(expand(item, &axis)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::{ItemType, Value};

    fn multiplexed_item() -> Item {
        Item::new(ItemType::Product, "app").with_property(
            MULTIPLEX_OVER,
            Value::List(vec![
                Value::Str("x86_64".to_string()),
                Value::Str("arm64".to_string()),
            ]),
        )
    }

    #[test]
    fn test_axis_values() {
        let axis = axis_values(&multiplexed_item()).unwrap().unwrap();
        assert_eq!(axis, vec!["x86_64", "arm64"]);
    }

    #[test]
    fn test_plain_product_has_no_axis() {
        let item = Item::new(ItemType::Product, "app");
        assert!(axis_values(&item).unwrap().is_none());
    }

    #[test]
    fn test_empty_axis_rejected() {
        let item =
            Item::new(ItemType::Product, "app").with_property(MULTIPLEX_OVER, Value::List(vec![]));
        assert!(axis_values(&item).is_err());
    }

    #[test]
    fn test_expand_tags_instances() {
        let item = multiplexed_item();
        let axis = axis_values(&item).unwrap().unwrap();
        let instances = expand(&item, &axis);

        assert_eq!(instances.len(), 2);
        assert_eq!(
            instances[0].property(MULTIPLEX_ID),
            Some(&Value::Str("x86_64".to_string()))
        );
        assert_eq!(
            instances[1].property(MULTIPLEX_ID),
            Some(&Value::Str("arm64".to_string()))
        );
    }
}
