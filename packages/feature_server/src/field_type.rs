//! Maps attribute values to protocol field types.

use feature_server_models::{AttributeValue, FieldType, parse_date};

/// Returns the protocol field type for a single attribute value.
///
/// Numbers without a fractional part are integers, other numbers are
/// doubles. Text that parses as a date is a date; anything else, including
/// booleans and nulls, is a string.
#[must_use]
pub fn field_type(value: &AttributeValue) -> FieldType {
    match value {
        AttributeValue::Integer(_) => FieldType::Integer,
        AttributeValue::Double(d) => {
            if is_whole(*d) {
                FieldType::Integer
            } else {
                FieldType::Double
            }
        }
        AttributeValue::Date(_) => FieldType::Date,
        AttributeValue::String(s) if parse_date(s).is_some() => FieldType::Date,
        AttributeValue::String(_) | AttributeValue::Bool(_) | AttributeValue::Null => {
            FieldType::String
        }
    }
}

#[allow(clippy::float_cmp)]
fn is_whole(value: f64) -> bool {
    value.is_finite() && value.round() == value
}
