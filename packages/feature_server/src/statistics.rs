//! `outStatistics` aggregation.

use feature_server_models::{
    AttributeValue, Attributes, Feature, FieldDescriptor, FieldType, OutputFeature, StatisticSpec,
    StatisticType, StatisticsResult,
};
use indexmap::IndexMap;

use crate::QueryError;
use crate::field_type::field_type;

/// Validates and decodes the `outStatistics` parameter.
///
/// Accepts either a JSON-encoded string (as found in a URL query string) or
/// an already decoded JSON value.
///
/// # Errors
///
/// Returns [`QueryError::InvalidStatistics`] unless the value is a non-empty
/// array of well-formed statistic definitions.
pub fn parse_statistics(value: &serde_json::Value) -> Result<Vec<StatisticSpec>, QueryError> {
    let invalid = |message: String| QueryError::InvalidStatistics { message };

    let decoded = match value {
        serde_json::Value::String(s) => {
            serde_json::from_str(s).map_err(|e| invalid(format!("'{s}' is not JSON: {e}")))?
        }
        other => other.clone(),
    };

    let serde_json::Value::Array(items) = decoded else {
        return Err(invalid(format!("expected an array, got {decoded}")));
    };
    if items.is_empty() {
        return Err(invalid("no statistics requested".to_string()));
    }

    items
        .into_iter()
        .map(|item| serde_json::from_value::<StatisticSpec>(item).map_err(|e| invalid(e.to_string())))
        .collect()
}

/// Running values for one statistic over one group.
#[derive(Debug, Default)]
struct Accumulator {
    features: usize,
    values: Vec<f64>,
}

impl Accumulator {
    fn push(&mut self, value: Option<&AttributeValue>) {
        self.features += 1;
        if let Some(v) = value.and_then(AttributeValue::as_f64)
            && v.is_finite()
        {
            self.values.push(v);
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
    fn finish(&self, statistic_type: StatisticType) -> AttributeValue {
        let n = self.values.len() as f64;
        let sum: f64 = self.values.iter().sum();
        let mean = sum / n;
        let variance = || {
            self.values
                .iter()
                .map(|v| (v - mean).powi(2))
                .sum::<f64>()
                / n
        };

        let value = match statistic_type {
            StatisticType::Count => return AttributeValue::Integer(self.features as i64),
            _ if self.values.is_empty() => return AttributeValue::Null,
            StatisticType::Sum => sum,
            StatisticType::Min => self.values.iter().copied().fold(f64::INFINITY, f64::min),
            StatisticType::Max => self
                .values
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
            StatisticType::Avg => mean,
            StatisticType::Var => variance(),
            StatisticType::Stddev => variance().sqrt(),
        };

        AttributeValue::Double(value)
    }
}

/// Computes the requested statistics over `features`.
///
/// Features are partitioned by the value of `group_by` (features lacking the
/// attribute form a `null` group), or kept as a single group when `group_by`
/// is `None`. That single group is emitted even when `features` is empty, so
/// an ungrouped `count` always reports the number of features filtered in.
/// Groups are emitted in first-seen order and statistics in declaration
/// order. `count` counts features; every other statistic only considers
/// numeric values of its field and is `null` for a group that has none.
///
/// `oid_field` names the identifier field, which resolves to the object ID
/// for features that don't carry it as an attribute.
#[must_use]
pub fn aggregate(
    features: &[&Feature],
    specs: &[StatisticSpec],
    group_by: Option<&str>,
    oid_field: &str,
) -> StatisticsResult {
    let mut groups: IndexMap<String, (AttributeValue, Vec<Accumulator>)> = IndexMap::new();
    if group_by.is_none() {
        groups.insert(String::new(), (AttributeValue::Null, new_accumulators(specs)));
    }

    for feature in features {
        let (key, value) = match group_by {
            Some(field) => {
                let value = feature
                    .value(field, oid_field)
                    .unwrap_or(AttributeValue::Null);
                (group_key(&value), value)
            }
            None => (String::new(), AttributeValue::Null),
        };

        let (_, accumulators) = groups
            .entry(key)
            .or_insert_with(|| (value, new_accumulators(specs)));

        for (spec, accumulator) in specs.iter().zip(accumulators.iter_mut()) {
            accumulator.push(feature.value(&spec.on_statistic_field, oid_field).as_ref());
        }
    }

    log::debug!(
        "Aggregated {} features into {} groups",
        features.len(),
        groups.len()
    );

    let mut fields = Vec::with_capacity(specs.len() + 1);
    if let Some(field) = group_by {
        let group_type = groups
            .values()
            .map(|(value, _)| value)
            .find(|value| !value.is_null())
            .map_or(FieldType::String, field_type);
        fields.push(FieldDescriptor::new(field, group_type));
    }
    fields.extend(specs.iter().map(|spec| {
        let output_type = match spec.statistic_type {
            StatisticType::Count => FieldType::Integer,
            _ => FieldType::Double,
        };
        FieldDescriptor::new(spec.output_name(), output_type)
    }));

    let features = groups
        .into_values()
        .map(|(value, accumulators)| {
            let mut attributes = Attributes::new();
            if let Some(field) = group_by {
                attributes.insert(field.to_string(), value);
            }
            for (spec, accumulator) in specs.iter().zip(&accumulators) {
                attributes.insert(spec.output_name(), accumulator.finish(spec.statistic_type));
            }
            OutputFeature {
                geometry: None,
                attributes,
            }
        })
        .collect();

    StatisticsResult {
        fields,
        features,
        exceeded_transfer_limit: false,
    }
}

fn new_accumulators(specs: &[StatisticSpec]) -> Vec<Accumulator> {
    specs.iter().map(|_| Accumulator::default()).collect()
}

/// Identity of a group-by value. Numbers group by numeric value, so `1` and
/// `1.0` share a group; other values group by variant and content, so the
/// text `"1"` stays apart from the number `1`.
fn group_key(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Null => "null".to_string(),
        AttributeValue::Bool(b) => format!("bool:{b}"),
        AttributeValue::Integer(_) | AttributeValue::Double(_) => {
            format!("number:{}", value.as_f64().unwrap_or(f64::NAN))
        }
        AttributeValue::Date(dt) => format!("date:{}", dt.timestamp_millis()),
        AttributeValue::String(s) => format!("string:{s}"),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn feature(object_id: i64, state: &str, precip: serde_json::Value) -> Feature {
        let mut attributes = Attributes::new();
        attributes.insert("state".to_string(), AttributeValue::from(state));
        attributes.insert("total_precip".to_string(), AttributeValue::from_json(&precip));
        Feature {
            object_id,
            geometry: None,
            attributes,
        }
    }

    fn sample() -> Vec<Feature> {
        vec![
            feature(1, "CO", json!(0)),
            feature(2, "CO", json!(1.5)),
            feature(3, "WY", json!(0.25)),
            feature(4, "CO", json!(2.5)),
            feature(5, "WY", json!(null)),
        ]
    }

    fn spec(statistic_type: StatisticType, out: &str) -> StatisticSpec {
        StatisticSpec {
            statistic_type,
            on_statistic_field: "total_precip".to_string(),
            out_statistic_field_name: Some(out.to_string()),
        }
    }

    fn number(result: &StatisticsResult, group: usize, name: &str) -> f64 {
        result.features[group].attributes[name].as_f64().unwrap()
    }

    #[test]
    fn parses_statistics_from_string_and_value() {
        let raw = r#"[{"statisticType":"min","onStatisticField":"total_precip","outStatisticFieldName":"min_precip"}]"#;
        let from_string = parse_statistics(&json!(raw)).unwrap();
        let from_value = parse_statistics(&serde_json::from_str(raw).unwrap()).unwrap();

        assert_eq!(from_string, from_value);
        assert_eq!(from_string[0].statistic_type, StatisticType::Min);
    }

    #[test]
    fn rejects_malformed_statistics() {
        for raw in [
            json!("{}"),
            json!("xx11xx"),
            json!("[]"),
            json!({}),
            json!([{ "statisticType": "median", "onStatisticField": "x" }]),
        ] {
            assert!(
                matches!(
                    parse_statistics(&raw),
                    Err(QueryError::InvalidStatistics { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn min_equals_true_minimum() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(&refs, &[spec(StatisticType::Min, "min_precip")], None, "id");

        assert_eq!(result.features.len(), 1);
        assert!((number(&result, 0, "min_precip") - 0.0).abs() < f64::EPSILON);
        assert_eq!(result.fields, vec![FieldDescriptor::new("min_precip", FieldType::Double)]);
    }

    #[test]
    fn count_equals_feature_count() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(&refs, &[spec(StatisticType::Count, "n")], None, "id");

        assert_eq!(result.features[0].attributes["n"], AttributeValue::Integer(5));
        assert_eq!(result.fields[0].field_type, FieldType::Integer);
    }

    #[test]
    fn variance_and_standard_deviation_agree() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(
            &refs,
            &[
                spec(StatisticType::Var, "var"),
                spec(StatisticType::Stddev, "sd"),
                spec(StatisticType::Avg, "avg"),
                spec(StatisticType::Sum, "sum"),
                spec(StatisticType::Max, "max"),
            ],
            None,
            "id",
        );

        let var = number(&result, 0, "var");
        let sd = number(&result, 0, "sd");
        assert!(var >= 0.0);
        assert!((sd - var.sqrt()).abs() < 1e-12);
        // 0, 1.5, 0.25, 2.5 (the null is skipped)
        assert!((number(&result, 0, "avg") - 1.0625).abs() < 1e-12);
        assert!((var - 1.011_718_75).abs() < 1e-12);
        assert!((number(&result, 0, "sum") - 4.25).abs() < 1e-12);
        assert!((number(&result, 0, "max") - 2.5).abs() < 1e-12);
    }

    #[test]
    fn groups_in_first_seen_order() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(
            &refs,
            &[spec(StatisticType::Count, "n"), spec(StatisticType::Sum, "total")],
            Some("state"),
            "id",
        );

        assert_eq!(result.features.len(), 2);
        assert_eq!(result.features[0].attributes["state"], AttributeValue::from("CO"));
        assert_eq!(result.features[0].attributes["n"], AttributeValue::Integer(3));
        assert!((number(&result, 0, "total") - 4.0).abs() < 1e-12);
        assert_eq!(result.features[1].attributes["state"], AttributeValue::from("WY"));
        assert_eq!(result.features[1].attributes["n"], AttributeValue::Integer(2));

        let names: Vec<&str> = result.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["state", "n", "total"]);
        assert_eq!(result.fields[0].field_type, FieldType::String);
    }

    #[test]
    fn group_count_equals_distinct_values() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(&refs, &[spec(StatisticType::Count, "n")], Some("total_precip"), "id");
        // 0, 1.5, 0.25, 2.5, null
        assert_eq!(result.features.len(), 5);
    }

    #[test]
    fn group_without_numeric_values_yields_null() {
        let features = [feature(1, "WY", json!(null))];
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(&refs, &[spec(StatisticType::Avg, "avg")], Some("state"), "id");
        assert_eq!(result.features[0].attributes["avg"], AttributeValue::Null);
    }

    #[test]
    fn ungrouped_empty_input_yields_one_group() {
        let result = aggregate(
            &[],
            &[spec(StatisticType::Count, "n"), spec(StatisticType::Avg, "avg")],
            None,
            "id",
        );
        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].attributes["n"], AttributeValue::Integer(0));
        assert_eq!(result.features[0].attributes["avg"], AttributeValue::Null);
        assert_eq!(result.fields.len(), 2);
    }

    #[test]
    fn grouped_empty_input_yields_no_groups() {
        let result = aggregate(&[], &[spec(StatisticType::Count, "n")], Some("state"), "id");
        assert!(result.features.is_empty());
        assert_eq!(result.fields.len(), 2);
    }

    #[test]
    fn integer_and_double_values_share_a_group() {
        let mut features = [
            feature(1, "CO", json!(1)),
            feature(2, "CO", json!(null)),
            feature(3, "CO", json!("1")),
        ];
        features[0].attributes.insert("total_precip".to_string(), AttributeValue::Integer(1));
        features[1].attributes.insert("total_precip".to_string(), AttributeValue::Double(1.0));
        let refs: Vec<&Feature> = features.iter().collect();
        let result = aggregate(&refs, &[spec(StatisticType::Count, "n")], Some("total_precip"), "id");

        assert_eq!(result.features.len(), 2);
        assert_eq!(result.features[0].attributes["n"], AttributeValue::Integer(2));
        assert_eq!(result.features[1].attributes["total_precip"], AttributeValue::from("1"));
        assert_eq!(result.features[1].attributes["n"], AttributeValue::Integer(1));
    }

    #[test]
    fn groups_and_aggregates_on_the_identifier_field() {
        let features = sample();
        let refs: Vec<&Feature> = features.iter().collect();
        let grouped = aggregate(&refs, &[spec(StatisticType::Count, "n")], Some("id"), "id");
        assert_eq!(grouped.features.len(), 5);
        assert_eq!(grouped.features[2].attributes["id"], AttributeValue::Integer(3));
        assert_eq!(grouped.fields[0], FieldDescriptor::new("id", FieldType::Integer));

        let max_id = StatisticSpec {
            statistic_type: StatisticType::Max,
            on_statistic_field: "id".to_string(),
            out_statistic_field_name: Some("max_id".to_string()),
        };
        let result = aggregate(&refs, &[max_id], None, "id");
        assert_eq!(result.features[0].attributes["max_id"], AttributeValue::Double(5.0));
    }
}
