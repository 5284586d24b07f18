// Filter Evaluator - Reference matching of validated filter trees against JSON documents
// Relations are expected inline: arrays for to-many, an object or null for to-one

use std::cmp::Ordering;

use serde_json::Value;

use crate::core::ScalarValue;
use crate::query::{
    parse_date, EmbeddedFilter, FilterNode, ListCondition, ListFilter, QueryMode, ScalarCondition,
    ScalarFilter, ToManyFilter, ToOneCondition, ToOneFilter,
};

impl FilterNode {
    /// `every` on an empty collection holds, `some` does not; comparisons
    /// against a missing or null value are false.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            FilterNode::And(children) => children.iter().all(|c| c.matches(doc)),
            FilterNode::Or(children) => children.iter().any(|c| c.matches(doc)),
            FilterNode::Not(children) => !children.iter().any(|c| c.matches(doc)),
            FilterNode::Scalar { field, filter } => filter.matches(doc.get(field)),
            FilterNode::List { field, filter } => filter.matches(related_list(doc, field)),
            FilterNode::ToMany { field, filter, .. } => filter.matches(related_list(doc, field)),
            FilterNode::ToOne { field, filter, .. } => {
                filter.matches(doc.get(field).filter(|v| !v.is_null()))
            }
            FilterNode::Embedded { field, filter, .. } => filter.matches(related_list(doc, field)),
        }
    }
}

/// Missing or null lists behave as empty
fn related_list<'a>(doc: &'a Value, field: &str) -> &'a [Value] {
    doc.get(field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

impl ScalarFilter {
    /// `value` is `None` when the field is absent from the document
    pub fn matches(&self, value: Option<&Value>) -> bool {
        self.conditions.iter().all(|c| self.holds(c, value))
    }

    fn holds(&self, condition: &ScalarCondition, value: Option<&Value>) -> bool {
        let present = value.filter(|v| !v.is_null());
        let cmp = |expected: &ScalarValue| present.and_then(|v| compare(v, expected, self.mode));

        match condition {
            ScalarCondition::Equals(ScalarValue::Null) => matches!(value, Some(Value::Null)),
            ScalarCondition::Equals(expected) => cmp(expected) == Some(Ordering::Equal),
            ScalarCondition::In(list) => list.iter().any(|e| match e {
                ScalarValue::Null => matches!(value, Some(Value::Null)),
                _ => cmp(e) == Some(Ordering::Equal),
            }),
            ScalarCondition::NotIn(list) => {
                present.is_some() && !list.iter().any(|e| cmp(e) == Some(Ordering::Equal))
            }
            ScalarCondition::Lt(e) => cmp(e) == Some(Ordering::Less),
            ScalarCondition::Lte(e) => matches!(cmp(e), Some(Ordering::Less | Ordering::Equal)),
            ScalarCondition::Gt(e) => cmp(e) == Some(Ordering::Greater),
            ScalarCondition::Gte(e) => matches!(cmp(e), Some(Ordering::Greater | Ordering::Equal)),
            ScalarCondition::Contains(s) => text_matches(present, self.mode, s, |h, n| h.contains(n)),
            ScalarCondition::StartsWith(s) => {
                text_matches(present, self.mode, s, |h, n| h.starts_with(n))
            }
            ScalarCondition::EndsWith(s) => text_matches(present, self.mode, s, |h, n| h.ends_with(n)),
            ScalarCondition::Not(inner) => !inner.matches(value),
            ScalarCondition::IsSet(expected) => value.is_some() == *expected,
        }
    }
}

fn text_matches(
    present: Option<&Value>,
    mode: QueryMode,
    needle: &str,
    test: fn(&str, &str) -> bool,
) -> bool {
    present.and_then(Value::as_str).is_some_and(|hay| match mode {
        QueryMode::Default => test(hay, needle),
        QueryMode::Insensitive => test(&hay.to_lowercase(), &needle.to_lowercase()),
    })
}

/// Compare a stored JSON value with a typed operand; `None` when incomparable
pub fn compare(stored: &Value, expected: &ScalarValue, mode: QueryMode) -> Option<Ordering> {
    match expected {
        ScalarValue::String(e) | ScalarValue::Enum(e) => {
            let s = stored.as_str()?;
            match mode {
                QueryMode::Default => Some(s.cmp(e.as_str())),
                QueryMode::Insensitive => Some(s.to_lowercase().cmp(&e.to_lowercase())),
            }
        }
        ScalarValue::Int(_) | ScalarValue::Float(_) => {
            stored.as_f64()?.partial_cmp(&expected.as_f64()?)
        }
        ScalarValue::Bool(e) => Some(stored.as_bool()?.cmp(e)),
        ScalarValue::Date(e) => Some(parse_date(stored.as_str()?)?.cmp(e)),
        ScalarValue::Null => None,
    }
}

fn contains(list: &[Value], expected: &ScalarValue) -> bool {
    list.iter()
        .any(|v| compare(v, expected, QueryMode::Default) == Some(Ordering::Equal))
}

impl ListFilter {
    pub fn matches(&self, list: &[Value]) -> bool {
        self.conditions.iter().all(|c| match c {
            ListCondition::Has(e) => contains(list, e),
            ListCondition::HasEvery(es) => es.iter().all(|e| contains(list, e)),
            ListCondition::HasSome(es) => es.iter().any(|e| contains(list, e)),
            ListCondition::IsEmpty(expected) => list.is_empty() == *expected,
            ListCondition::Equals(es) => {
                list.len() == es.len()
                    && list
                        .iter()
                        .zip(es)
                        .all(|(v, e)| compare(v, e, QueryMode::Default) == Some(Ordering::Equal))
            }
        })
    }
}

fn quantified(
    every: &Option<Box<FilterNode>>,
    some: &Option<Box<FilterNode>>,
    none: &Option<Box<FilterNode>>,
    related: &[Value],
) -> bool {
    let every = every
        .as_ref()
        .map_or(true, |f| related.iter().all(|r| f.matches(r)));
    let some = some
        .as_ref()
        .map_or(true, |f| related.iter().any(|r| f.matches(r)));
    let none = none
        .as_ref()
        .map_or(true, |f| !related.iter().any(|r| f.matches(r)));
    every && some && none
}

impl ToManyFilter {
    pub fn matches(&self, related: &[Value]) -> bool {
        quantified(&self.every, &self.some, &self.none, related)
    }
}

impl ToOneFilter {
    /// `related` is `None` when the relation is absent
    pub fn matches(&self, related: Option<&Value>) -> bool {
        self.conditions.iter().all(|c| match c {
            ToOneCondition::Is(f) => related.is_some_and(|r| f.matches(r)),
            ToOneCondition::IsNot(f) => related.map_or(true, |r| !f.matches(r)),
            ToOneCondition::IsAbsent => related.is_none(),
            ToOneCondition::IsPresent => related.is_some(),
        })
    }
}

impl EmbeddedFilter {
    pub fn matches(&self, elements: &[Value]) -> bool {
        let empty = self.is_empty.map_or(true, |e| elements.is_empty() == e);
        empty && quantified(&self.every, &self.some, &self.none, elements)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::core::FieldPath;
    use crate::query::{EntityFilter, FilterParser};
    use crate::schemas::create_schema_registry;
    use serde_json::{json, Value};

    fn filter(entity: &str, value: Value) -> EntityFilter {
        let registry = create_schema_registry().unwrap();
        let parser = FilterParser::new(&registry, EngineConfig::default());
        let id = registry.lookup(entity).unwrap().id();
        parser.parse(id, &value, &FieldPath::new("where")).unwrap()
    }

    #[test]
    fn test_every_is_vacuously_true_on_empty_collection() {
        let f = filter("Company", json!({"products": {"every": {"price": {"gt": 0}}}}));
        assert!(f.matches(&json!({"name": "Empty Co", "products": []})));
        assert!(f.matches(&json!({"name": "No key at all"})));
        assert!(f.matches(&json!({"products": [{"price": 3}, {"price": 9}]})));
        assert!(!f.matches(&json!({"products": [{"price": 3}, {"price": 0}]})));
    }

    #[test]
    fn test_some_and_none_on_empty_collection() {
        let some = filter("Company", json!({"products": {"some": {"hot": true}}}));
        let none = filter("Company", json!({"products": {"none": {"hot": true}}}));
        let empty = json!({"products": []});
        assert!(!some.matches(&empty));
        assert!(none.matches(&empty));
    }

    #[test]
    fn test_to_one_absent_relation() {
        let is = filter("Order", json!({"coupon": {"is": {"active": true}}}));
        let is_not = filter("Order", json!({"coupon": {"isNot": {"active": true}}}));
        let absent = filter("Order", json!({"coupon": {"is": null}}));
        let no_coupon = json!({"total": 10.0, "coupon": null});
        assert!(!is.matches(&no_coupon));
        assert!(is_not.matches(&no_coupon));
        assert!(absent.matches(&no_coupon));
        assert!(is.matches(&json!({"coupon": {"active": true}})));
    }

    #[test]
    fn test_list_operators() {
        let doc = json!({"views": ["a", "b"]});
        assert!(filter("Product", json!({"views": {"hasEvery": ["a", "b"]}})).matches(&doc));
        assert!(!filter("Product", json!({"views": {"hasEvery": ["a", "c"]}})).matches(&doc));
        assert!(filter("Product", json!({"views": {"hasSome": ["c", "b"]}})).matches(&doc));
        assert!(filter("Product", json!({"views": {"has": "a"}})).matches(&doc));

        let is_empty = filter("Product", json!({"views": {"isEmpty": true}}));
        assert!(is_empty.matches(&json!({"views": []})));
        assert!(!is_empty.matches(&doc));
    }

    #[test]
    fn test_list_equals_is_order_sensitive() {
        let f = filter("Product", json!({"views": {"equals": ["a", "b"]}}));
        assert!(f.matches(&json!({"views": ["a", "b"]})));
        assert!(!f.matches(&json!({"views": ["b", "a"]})));
    }

    #[test]
    fn test_empty_or_matches_nothing_and_empty_and_matches_everything() {
        let doc = json!({"name": "Soap", "price": 4});
        assert!(!filter("Product", json!({"OR": []})).matches(&doc));
        assert!(filter("Product", json!({"OR": [{"price": 4}]})).matches(&doc));
        assert!(filter("Product", json!({"AND": []})).matches(&doc));
        assert!(filter("Product", json!({"NOT": []})).matches(&doc));
    }

    #[test]
    fn test_null_and_is_set() {
        let null_dec = filter("Product", json!({"dec": null}));
        let dec_set = filter("Product", json!({"dec": {"isSet": true}}));
        assert!(null_dec.matches(&json!({"dec": null})));
        assert!(!null_dec.matches(&json!({})));
        assert!(dec_set.matches(&json!({"dec": null})));
        assert!(!dec_set.matches(&json!({})));
    }

    #[test]
    fn test_string_modes_and_dates() {
        let f = filter("Product", json!({"name": {"startsWith": "soa", "mode": "insensitive"}}));
        assert!(f.matches(&json!({"name": "SOAP"})));
        let not_soap = filter("Product", json!({"name": {"not": "SOAP", "mode": "insensitive"}}));
        assert!(!not_soap.matches(&json!({"name": "soap"})));
        assert!(not_soap.matches(&json!({"name": "shampoo"})));
        let nested = filter("Product", json!({"name": {"mode": "insensitive", "not": {"startsWith": "SO"}}}));
        assert!(!nested.matches(&json!({"name": "soap"})));
        let recent = filter("Product", json!({"createdAt": {"gte": "2024-06-01"}}));
        assert!(recent.matches(&json!({"createdAt": "2024-06-02T08:00:00Z"})));
        assert!(!recent.matches(&json!({"createdAt": "2024-05-31T23:59:59Z"})));
    }
}
