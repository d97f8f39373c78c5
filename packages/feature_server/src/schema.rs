//! Derives a layer's field list from a representative feature.

use feature_server_models::{Attributes, DEFAULT_OID_FIELD, FieldDescriptor, FieldType};

use crate::field_type::field_type;

/// Field list plus the name of the identifier field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// One descriptor per attribute key, in attribute order, followed by the
    /// identifier field.
    pub fields: Vec<FieldDescriptor>,
    /// Name of the identifier field.
    pub oid_field: String,
}

impl Schema {
    /// Looks up a field descriptor by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Builds the field list for a layer from one feature's attributes.
///
/// Every key becomes a field typed by [`field_type`]. The identifier field
/// (`oid_field`, or `"id"` when `None`) is appended as an integer field
/// unless the attributes already carry that key.
#[must_use]
pub fn fields(attributes: &Attributes, oid_field: Option<&str>) -> Schema {
    let oid_field = oid_field.unwrap_or(DEFAULT_OID_FIELD).to_string();

    let mut fields: Vec<FieldDescriptor> = attributes
        .iter()
        .map(|(name, value)| FieldDescriptor::new(name.clone(), field_type(value)))
        .collect();

    if !attributes.contains_key(&oid_field) {
        fields.push(FieldDescriptor::new(oid_field.clone(), FieldType::Integer));
    }

    Schema { fields, oid_field }
}

#[cfg(test)]
mod tests {
    use feature_server_models::AttributeValue;

    use super::*;

    fn sample() -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert("propInt".to_string(), AttributeValue::Integer(10));
        attributes.insert("propFloat".to_string(), AttributeValue::Double(10.1));
        attributes.insert("propString".to_string(), AttributeValue::from("Awesome"));
        attributes.insert(
            "propDate".to_string(),
            AttributeValue::from("Wed Jun 24 2015 08:18:24"),
        );
        attributes
    }

    #[test]
    fn builds_fields_in_attribute_order() {
        let schema = fields(&sample(), None);

        assert_eq!(schema.oid_field, "id");
        let types: Vec<FieldType> = schema.fields.iter().map(|f| f.field_type).collect();
        assert_eq!(
            types,
            vec![
                FieldType::Integer,
                FieldType::Double,
                FieldType::String,
                FieldType::Date,
                FieldType::Integer,
            ]
        );
        for field in &schema.fields {
            assert_eq!(field.alias, field.name);
        }
        assert_eq!(schema.fields.last().unwrap().name, "id");
    }

    #[test]
    fn honors_oid_override() {
        let schema = fields(&sample(), Some("OBJECTID"));
        assert_eq!(schema.oid_field, "OBJECTID");
        assert!(schema.field("OBJECTID").is_some());
        assert!(schema.field("id").is_none());
    }

    #[test]
    fn does_not_duplicate_existing_id_attribute() {
        let mut attributes = sample();
        attributes.insert("id".to_string(), AttributeValue::from("abc"));
        let schema = fields(&attributes, None);

        let ids: Vec<_> = schema.fields.iter().filter(|f| f.name == "id").collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].field_type, FieldType::String);
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(fields(&sample(), None), fields(&sample(), None));
    }
}
