use serde::{Deserialize, Serialize};

/// Attribute names and values that mark editable regions in rendered markup.
///
/// ```html
/// <h1 property="title">Hello</h1>
/// <div property="block" typeof="collection">
///     <div rel="block" typeof="block"><p property="title">First</p></div>
/// </div>
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Vocabulary {
    /// Attribute carrying the field name
    pub field_attribute: String,

    /// Attribute carrying the region type
    pub type_attribute: String,

    /// `type_attribute` value that turns a field into a collection of items
    pub collection_type: String,

    /// Attribute that marks an item of a collection (value is the field name)
    pub item_attribute: String,

    /// `type_attribute` value written on collection items
    pub item_type: String,
}

impl Vocabulary {
    pub fn is_collection(&self, element: &crate::Node) -> bool {
        element.attr(&self.type_attribute) == Some(self.collection_type.as_str())
    }

    pub fn field_name<'a>(&self, element: &'a crate::Node) -> Option<&'a str> {
        element
            .attr(&self.field_attribute)
            .filter(|name| !name.is_empty())
    }

    pub fn is_item_of(&self, element: &crate::Node, field: &str) -> bool {
        element.attr(&self.item_attribute) == Some(field)
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            field_attribute: "property".to_string(),
            type_attribute: "typeof".to_string(),
            collection_type: "collection".to_string(),
            item_attribute: "rel".to_string(),
            item_type: "block".to_string(),
        }
    }
}
