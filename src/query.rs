//! # Query Builder
//!
//! Turns the flat query string of a list endpoint into four things:
//! - a [`Filter`] (membership on categorical fields, bounds on numeric ones)
//! - sort keys
//! - a page window
//! - a [`Projection`] of fields to hide
//!
//! Both collections run through the same builder. What differs between them
//! lives in a [`QuerySchema`]: which fields are categorical, which numeric
//! fields take `minX` / `maxX` bounds, and the default sort key.
//!
//! ## Parameters
//!
//! ```text
//! GET /dog?breed=Labrador,Beagle&size=Medium,Small&minAge=2&maxAge=10&excludeFields=foodList&sortBy=age&page=2&limit=5
//! ```
//!
//! - `breed=Labrador,Beagle`: breed is one of the listed values
//! - `minAge=2&maxAge=10`: 2 <= age <= 10, either bound may be given alone
//! - `excludeFields=foodList`: drop the field from every returned record
//! - `sortBy=age`: ascending by age, `-age` for descending
//! - `page=2&limit=5`: skip 5, take 5
//!
//! An empty parameter (`breed=`) counts as absent.
//!
//! ## Numbers
//!
//! In [`NumberParsing::Lenient`] mode numbers are read the way a browser
//! would read them with `parseInt` / `parseFloat`: the longest numeric
//! prefix wins and a value without one is ignored. [`NumberParsing::Strict`]
//! rejects it instead.
use std::{cmp::Ordering, collections::HashMap};

use serde_json::Value;
use thiserror::Error;

#[cfg(feature = "verbose")]
use tracing::debug;

use crate::{
    models::{
        DOG_AGE, DOG_BREED, DOG_NAME, DOG_SIZE, FOOD_COST, FOOD_FLAVOR, FOOD_TYPE, ID, VERSION,
    },
    store::Document,
    utils::{leading_float, leading_int},
};

pub const EXCLUDE_FIELDS: &str = "excludeFields";
pub const SORT_BY: &str = "sortBy";
pub const PAGE: &str = "page";
pub const LIMIT: &str = "limit";

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

pub const DOG_SCHEMA: QuerySchema = QuerySchema {
    categories: &[DOG_BREED, DOG_SIZE],
    ranges: &[RangeField {
        field: DOG_AGE,
        min_param: "minAge",
        max_param: "maxAge",
        kind: NumberKind::Integer,
    }],
    default_sort: DOG_NAME,
};

pub const FOOD_SCHEMA: QuerySchema = QuerySchema {
    categories: &[FOOD_TYPE, FOOD_FLAVOR],
    ranges: &[RangeField {
        field: FOOD_COST,
        min_param: "minCost",
        max_param: "maxCost",
        kind: NumberKind::Float,
    }],
    default_sort: FOOD_TYPE,
};

#[derive(Debug)]
pub struct QuerySchema {
    pub categories: &'static [&'static str],
    pub ranges: &'static [RangeField],
    pub default_sort: &'static str,
}

#[derive(Debug)]
pub struct RangeField {
    pub field: &'static str,
    pub min_param: &'static str,
    pub max_param: &'static str,
    pub kind: NumberKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberKind {
    Integer,
    Float,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NumberParsing {
    #[default]
    Lenient,
    Strict,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{value}` is not a valid number for `{param}`")]
pub struct QueryError {
    pub param: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    In {
        field: &'static str,
        values: Vec<String>,
    },
    Range {
        field: &'static str,
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Condition {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::In { field, values } => match lookup(document, field) {
                Some(Value::String(value)) => values.iter().any(|candidate| candidate == value),
                _ => false,
            },
            Condition::Range { field, min, max } => {
                let Some(value) = lookup(document, field).and_then(Value::as_f64) else {
                    return false;
                };

                min.is_none_or(|min| value >= min) && max.is_none_or(|max| value <= max)
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.matches(document))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    /// Reads `name`, `-age`, `breed,-age` or `breed -age`.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split([',', ' '])
            .filter(|token| !token.is_empty())
            .filter_map(|token| match token.strip_prefix('-') {
                Some("") => None,
                Some(field) => Some(Self {
                    field: field.to_string(),
                    descending: true,
                }),
                None => Some(Self::ascending(token.strip_prefix('+').unwrap_or(token))),
            })
            .filter(|key| !key.field.is_empty())
            .collect()
    }
}

/// Filter, order and window handed to a [`Store`](crate::store::Store).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Selection {
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut matched: Vec<&Document> = documents
            .into_iter()
            .filter(|document| self.filter.matches(document))
            .collect();

        matched.sort_by(|a, b| self.compare(a, b));

        matched
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ordering = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };

            if ordering != Ordering::Equal {
                return ordering;
            }
        }

        compare_values(a.get(ID), b.get(ID))
    }
}

/// Fields removed from every returned record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    excluded: Vec<String>,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            excluded: vec![VERSION.to_string()],
        }
    }
}

impl Projection {
    pub fn excluding<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn apply(&self, document: &mut Document) {
        for field in &self.excluded {
            let path: Vec<&str> = field.split('.').collect();
            remove_path(document, &path);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub selection: Selection,
    pub projection: Projection,
    pub page: u64,
    pub limit: u64,
}

impl ListQuery {
    pub fn build(
        schema: &QuerySchema,
        params: &HashMap<String, String>,
        parsing: NumberParsing,
    ) -> Result<Self, QueryError> {
        let param = |name: &str| params.get(name).map(String::as_str).filter(|v| !v.is_empty());

        let mut conditions = Vec::new();

        for &field in schema.categories {
            if let Some(raw) = param(field) {
                conditions.push(Condition::In {
                    field,
                    values: raw.split(',').map(str::to_string).collect(),
                });
            }
        }

        for range in schema.ranges {
            let min = bound(range, range.min_param, param(range.min_param), parsing)?;
            let max = bound(range, range.max_param, param(range.max_param), parsing)?;

            if min.is_some() || max.is_some() {
                conditions.push(Condition::Range {
                    field: range.field,
                    min,
                    max,
                });
            }
        }

        let page = window(PAGE, param(PAGE), parsing)?.unwrap_or(DEFAULT_PAGE);
        let limit = window(LIMIT, param(LIMIT), parsing)?.unwrap_or(DEFAULT_LIMIT);

        let skip = usize::try_from((page - 1).saturating_mul(limit)).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        let sort = param(SORT_BY)
            .map(SortKey::parse_list)
            .filter(|keys| !keys.is_empty())
            .unwrap_or_else(|| vec![SortKey::ascending(schema.default_sort)]);

        let projection = param(EXCLUDE_FIELDS)
            .map(|raw| Projection::excluding(raw.split(',').filter(|field| !field.is_empty())))
            .unwrap_or_default();

        let query = Self {
            selection: Selection {
                filter: Filter::new(conditions),
                sort,
                skip,
                limit: Some(take),
            },
            projection,
            page,
            limit,
        };

        #[cfg(feature = "verbose")]
        debug!("Built list query: {:?}", query);

        Ok(query)
    }
}

fn bound(
    range: &RangeField,
    param: &str,
    raw: Option<&str>,
    parsing: NumberParsing,
) -> Result<Option<f64>, QueryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let parsed = match (range.kind, parsing) {
        (NumberKind::Integer, NumberParsing::Lenient) => leading_int(raw).map(|n| n as f64),
        (NumberKind::Float, NumberParsing::Lenient) => leading_float(raw),
        (NumberKind::Integer, NumberParsing::Strict) => {
            raw.trim().parse::<i64>().ok().map(|n| n as f64)
        }
        (NumberKind::Float, NumberParsing::Strict) => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
    };

    match (parsed, parsing) {
        (None, NumberParsing::Strict) => Err(QueryError {
            param: param.to_string(),
            value: raw.to_string(),
        }),
        (parsed, _) => Ok(parsed),
    }
}

/// Page and limit: anything below 1 falls back to the default.
fn window(param: &str, raw: Option<&str>, parsing: NumberParsing) -> Result<Option<u64>, QueryError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let parsed = match parsing {
        NumberParsing::Lenient => leading_int(raw),
        NumberParsing::Strict => raw.trim().parse::<i64>().ok(),
    };

    match (parsed, parsing) {
        (None, NumberParsing::Strict) => Err(QueryError {
            param: param.to_string(),
            value: raw.to_string(),
        }),
        (parsed, _) => Ok(parsed.filter(|n| *n >= 1).map(|n| n as u64)),
    }
}

/// Resolves `a.b.c` through nested objects.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

fn remove_path(document: &mut Document, path: &[&str]) {
    match path {
        [] => {}
        [field] => {
            document.remove(*field);
        }
        [field, rest @ ..] => match document.get_mut(*field) {
            Some(Value::Object(nested)) => remove_path(nested, rest),
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(nested) = item {
                        remove_path(nested, rest);
                    }
                }
            }
            _ => {}
        },
    }
}

// missing/null < numbers < strings < objects < arrays < booleans
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::{Value, json};

    use super::{
        Condition, DOG_SCHEMA, FOOD_SCHEMA, ListQuery, NumberParsing, Projection, Selection,
        SortKey,
    };
    use crate::store::Document;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn dogs() -> Vec<Document> {
        vec![
            doc(json!({"_id": "000000000000000000000001", "name": "Rex", "breed": "Labrador", "size": "Big", "age": 3})),
            doc(json!({"_id": "000000000000000000000002", "name": "Ace", "breed": "Beagle", "size": "Small", "age": 12})),
            doc(json!({"_id": "000000000000000000000003", "name": "Milo", "breed": "Poodle", "size": "Medium", "age": 2})),
            doc(json!({"_id": "000000000000000000000004", "name": "Bo", "breed": "Beagle", "size": "Medium", "age": 10})),
            doc(json!({"_id": "000000000000000000000005", "name": "Zed", "breed": "Labrador", "size": "Large", "age": 1})),
        ]
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_defaults() {
        let query = ListQuery::build(&DOG_SCHEMA, &HashMap::new(), NumberParsing::Lenient).unwrap();

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.selection.skip, 0);
        assert_eq!(query.selection.limit, Some(10));
        assert!(query.selection.filter.conditions().is_empty());
        assert_eq!(query.selection.sort, vec![SortKey::ascending("name")]);
        assert_eq!(query.projection, Projection::default());
        assert_eq!(query.projection.excluded(), ["__v"]);
    }

    #[test]
    fn test_food_defaults_sort_by_foodtype() {
        let query = ListQuery::build(&FOOD_SCHEMA, &HashMap::new(), NumberParsing::Lenient).unwrap();

        assert_eq!(query.selection.sort, vec![SortKey::ascending("foodtype")]);
    }

    #[test]
    fn test_age_range() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("minAge", "2"), ("maxAge", "10")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Bo", "Milo", "Rex"]);
    }

    #[test]
    fn test_single_bound() {
        let query =
            ListQuery::build(&DOG_SCHEMA, &params(&[("minAge", "10")]), NumberParsing::Lenient).unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Ace", "Bo"]);
    }

    #[test]
    fn test_breed_membership() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("breed", "Labrador,Beagle")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Ace", "Bo", "Rex", "Zed"]);
    }

    #[test]
    fn test_combined_filters_sort_and_page() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[
                ("breed", "Labrador,Beagle"),
                ("size", "Medium,Small,Big"),
                ("sortBy", "age"),
                ("page", "2"),
                ("limit", "2"),
            ]),
            NumberParsing::Lenient,
        )
        .unwrap();

        assert_eq!(query.selection.skip, 2);
        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Ace"]);
    }

    #[test]
    fn test_pagination_window() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("page", "2"), ("limit", "2")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(query.page, 2);
        assert_eq!(names(&result), ["Milo", "Rex"]);
    }

    #[test]
    fn test_oversized_page_is_past_the_end() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("page", "99999999999999999999")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        assert_eq!(query.page, i64::MAX as u64);
        assert!(query.selection.apply(&dogs()).is_empty());
    }

    #[test]
    fn test_descending_and_multiple_keys() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("sortBy", "breed,-age")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Ace", "Bo", "Rex", "Zed", "Milo"]);
    }

    #[test]
    fn test_unknown_sort_field_keeps_key_order() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("sortBy", "colour")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&dogs());
        assert_eq!(names(&result), ["Rex", "Ace", "Milo", "Bo", "Zed"]);
    }

    #[test]
    fn test_lenient_numbers() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[
                ("minAge", "abc"),
                ("maxAge", "10years"),
                ("page", "0"),
                ("limit", "-3"),
            ]),
            NumberParsing::Lenient,
        )
        .unwrap();

        assert_eq!(
            query.selection.filter.conditions(),
            [Condition::Range {
                field: "age",
                min: None,
                max: Some(10.0),
            }]
        );
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn test_non_numeric_bounds_are_ignored() {
        let query = ListQuery::build(
            &FOOD_SCHEMA,
            &params(&[("minCost", "cheap"), ("maxCost", "")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        assert!(query.selection.filter.conditions().is_empty());
    }

    #[test]
    fn test_strict_numbers() {
        let error = ListQuery::build(
            &FOOD_SCHEMA,
            &params(&[("minCost", "cheap")]),
            NumberParsing::Strict,
        )
        .unwrap_err();

        assert_eq!(error.param, "minCost");
        assert_eq!(error.value, "cheap");

        assert!(
            ListQuery::build(&DOG_SCHEMA, &params(&[("page", "two")]), NumberParsing::Strict)
                .is_err()
        );
        assert!(
            ListQuery::build(&FOOD_SCHEMA, &params(&[("maxCost", "12.5")]), NumberParsing::Strict)
                .is_ok()
        );
    }

    #[test]
    fn test_float_cost_bounds() {
        let foods = vec![
            doc(json!({"_id": "000000000000000000000001", "foodtype": "wet", "flavor": "beef", "cost": 9.99})),
            doc(json!({"_id": "000000000000000000000002", "foodtype": "dry", "flavor": "chicken", "cost": 10.5})),
            doc(json!({"_id": "000000000000000000000003", "foodtype": "dry", "flavor": "lamb", "cost": 55})),
        ];

        let query = ListQuery::build(
            &FOOD_SCHEMA,
            &params(&[("minCost", "10.25"), ("maxCost", "50")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        let result = query.selection.apply(&foods);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["flavor"], "chicken");
    }

    #[test]
    fn test_projection_with_nested_paths() {
        let mut document = doc(json!({
            "_id": "000000000000000000000001",
            "name": "Rex",
            "__v": 0,
            "foodList": [{"foodtype": "wet", "flavor": "beef", "cost": 3}],
        }));

        Projection::excluding(["name", "foodList.cost"]).apply(&mut document);

        assert_eq!(
            Value::Object(document),
            json!({
                "_id": "000000000000000000000001",
                "__v": 0,
                "foodList": [{"foodtype": "wet", "flavor": "beef"}],
            })
        );
    }

    #[test]
    fn test_excluding_replaces_version_default() {
        let query = ListQuery::build(
            &DOG_SCHEMA,
            &params(&[("excludeFields", "foodList,age")]),
            NumberParsing::Lenient,
        )
        .unwrap();

        assert_eq!(query.projection.excluded(), ["foodList", "age"]);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(
            SortKey::parse_list("-age name"),
            vec![
                SortKey {
                    field: "age".to_string(),
                    descending: true
                },
                SortKey::ascending("name"),
            ]
        );
        assert!(SortKey::parse_list(" , - ").is_empty());
    }

    #[test]
    fn test_missing_values_sort_first() {
        let documents = vec![
            doc(json!({"_id": "000000000000000000000001", "name": "b"})),
            doc(json!({"_id": "000000000000000000000002"})),
            doc(json!({"_id": "000000000000000000000003", "name": 4})),
        ];

        let selection = Selection {
            sort: vec![SortKey::ascending("name")],
            ..Selection::default()
        };

        let sorted = selection.apply(&documents);
        let ids: Vec<&str> = sorted
            .iter()
            .map(|d| d["_id"].as_str().unwrap())
            .collect();

        assert_eq!(
            ids,
            [
                "000000000000000000000002",
                "000000000000000000000003",
                "000000000000000000000001"
            ]
        );
    }
}
