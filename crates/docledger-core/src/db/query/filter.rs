use crate::db::query::QueryError;
use serde_json::{Map, Value as Json};
use std::{cmp::Ordering, fmt};

///
/// Filter
///
/// Parsed Mango-style predicate filter:
/// `{"selector": {...}, "sort": [...], "use_index": ..., "limit": n}`.
///
/// The ledger evaluates it; the record layer only parses and validates so a
/// malformed filter fails before the ledger is asked.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    predicate: Predicate,
    sort: Vec<SortKey>,
    use_index: Vec<String>,
    limit: Option<usize>,
    source: Json,
}

impl Filter {
    /// Parse a filter from its JSON text.
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let json: Json = serde_json::from_str(raw)
            .map_err(|err| QueryError::InvalidFilter(format!("not JSON: {err}")))?;

        Self::from_json(json)
    }

    pub fn from_json(json: Json) -> Result<Self, QueryError> {
        let Json::Object(map) = &json else {
            return Err(invalid("filter must be a JSON object"));
        };

        let mut filter = Self {
            predicate: Predicate::True,
            sort: Vec::new(),
            use_index: Vec::new(),
            limit: None,
            source: Json::Null,
        };
        let mut has_selector = false;

        for (key, value) in map {
            match key.as_str() {
                "selector" => {
                    filter.predicate = parse_selector(value)?;
                    has_selector = true;
                }
                "sort" => filter.sort = parse_sort(value)?,
                "use_index" => filter.use_index = parse_use_index(value)?,
                "limit" => {
                    let limit = value
                        .as_u64()
                        .ok_or_else(|| invalid("limit must be a non-negative integer"))?;
                    filter.limit = Some(usize::try_from(limit).unwrap_or(usize::MAX));
                }
                other => return Err(invalid(format!("unknown filter key '{other}'"))),
            }
        }
        if !has_selector {
            return Err(invalid("filter has no selector"));
        }

        filter.source = json;

        Ok(filter)
    }

    /// Selector matching every document of `kind` whose `field` equals `value`.
    pub fn eq_selector(kind: &str, field: &str, value: Json) -> Result<Self, QueryError> {
        let mut selector = Map::new();
        selector.insert(crate::KIND_FIELD.to_string(), Json::String(kind.to_string()));
        selector.insert(field.to_string(), value);

        let mut filter = Map::new();
        filter.insert("selector".to_string(), Json::Object(selector));

        Self::from_json(Json::Object(filter))
    }

    #[must_use]
    pub fn matches(&self, doc: &Json) -> bool {
        self.predicate.eval(doc)
    }

    #[must_use]
    pub const fn has_sort(&self) -> bool {
        !self.sort.is_empty()
    }

    /// Order two documents by the sort keys; ties compare equal.
    #[must_use]
    pub fn compare(&self, a: &Json, b: &Json) -> Ordering {
        self.sort
            .iter()
            .map(|key| {
                let ord = collate_opt(lookup(a, &key.field), lookup(b, &key.field));
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Index hint; ledgers without named indexes ignore it.
    #[must_use]
    pub fn use_index(&self) -> &[String] {
        &self.use_index
    }

    #[must_use]
    pub const fn to_json(&self) -> &Json {
        &self.source
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
}

impl CompareOp {
    fn from_operator(op: &str) -> Option<Self> {
        let op = match op {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$in" => Self::In,
            "$nin" => Self::NotIn,
            _ => return None,
        };

        Some(op)
    }

    // Missing fields never satisfy a comparison.
    fn eval(self, actual: &Json, expected: &Json) -> bool {
        match self {
            Self::Eq => json_eq(actual, expected),
            Self::Ne => !json_eq(actual, expected),
            Self::Lt => ordered(actual, expected).is_some_and(Ordering::is_lt),
            Self::Lte => ordered(actual, expected).is_some_and(Ordering::is_le),
            Self::Gt => ordered(actual, expected).is_some_and(Ordering::is_gt),
            Self::Gte => ordered(actual, expected).is_some_and(Ordering::is_ge),
            Self::In => members(expected).any(|candidate| json_eq(actual, candidate)),
            Self::NotIn => !members(expected).any(|candidate| json_eq(actual, candidate)),
        }
    }
}

///
/// Predicate
///

#[derive(Clone, Debug, PartialEq)]
enum Predicate {
    True,
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    Compare {
        field: String,
        op: CompareOp,
        value: Json,
    },
    Exists {
        field: String,
        present: bool,
    },
}

impl Predicate {
    fn eval(&self, doc: &Json) -> bool {
        match self {
            Self::True => true,
            Self::And(preds) => preds.iter().all(|pred| pred.eval(doc)),
            Self::Or(preds) => preds.iter().any(|pred| pred.eval(doc)),
            Self::Not(pred) => !pred.eval(doc),
            Self::Compare { field, op, value } => {
                lookup(doc, field).is_some_and(|actual| op.eval(actual, value))
            }
            Self::Exists { field, present } => lookup(doc, field).is_some() == *present,
        }
    }

    fn conjunction(mut preds: Vec<Self>) -> Self {
        match preds.len() {
            0 => Self::True,
            1 => preds.remove(0),
            _ => Self::And(preds),
        }
    }
}

///
/// SortKey
///

#[derive(Clone, Debug, Eq, PartialEq)]
struct SortKey {
    field: String,
    direction: SortDirection,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum SortDirection {
    Asc,
    Desc,
}

fn invalid(message: impl Into<String>) -> QueryError {
    QueryError::InvalidFilter(message.into())
}

fn parse_selector(json: &Json) -> Result<Predicate, QueryError> {
    let Json::Object(map) = json else {
        return Err(invalid("selector must be a JSON object"));
    };

    let mut preds = Vec::with_capacity(map.len());
    for (key, value) in map {
        let pred = match key.as_str() {
            "$and" => Predicate::And(parse_selector_list(key, value)?),
            "$or" => Predicate::Or(parse_selector_list(key, value)?),
            "$not" => Predicate::Not(Box::new(parse_selector(value)?)),
            op if op.starts_with('$') => {
                return Err(invalid(format!("unsupported combinator '{op}'")));
            }
            field => parse_field(field, value)?,
        };
        preds.push(pred);
    }

    Ok(Predicate::conjunction(preds))
}

fn parse_selector_list(op: &str, json: &Json) -> Result<Vec<Predicate>, QueryError> {
    let Json::Array(items) = json else {
        return Err(invalid(format!("{op} takes an array of selectors")));
    };
    if items.is_empty() {
        return Err(invalid(format!("{op} takes at least one selector")));
    }

    items.iter().map(parse_selector).collect()
}

// `{"field": value}` is implicit `$eq`; an object whose keys are all
// operators is a conjunction of those operators.
fn parse_field(field: &str, json: &Json) -> Result<Predicate, QueryError> {
    if field.is_empty() {
        return Err(invalid("empty field name in selector"));
    }

    let operators = match json {
        Json::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        literal => {
            return Ok(Predicate::Compare {
                field: field.to_string(),
                op: CompareOp::Eq,
                value: literal.clone(),
            });
        }
    };

    let mut preds = Vec::with_capacity(operators.len());
    for (op, arg) in operators {
        let pred = match op.as_str() {
            "$exists" => Predicate::Exists {
                field: field.to_string(),
                present: arg
                    .as_bool()
                    .ok_or_else(|| invalid("$exists takes a boolean"))?,
            },
            "$not" => Predicate::Not(Box::new(parse_field(field, arg)?)),
            name => {
                let op = CompareOp::from_operator(name)
                    .ok_or_else(|| invalid(format!("unsupported operator '{name}'")))?;
                if matches!(op, CompareOp::In | CompareOp::NotIn) && !arg.is_array() {
                    return Err(invalid(format!("{name} takes an array")));
                }

                Predicate::Compare {
                    field: field.to_string(),
                    op,
                    value: arg.clone(),
                }
            }
        };
        preds.push(pred);
    }

    Ok(Predicate::conjunction(preds))
}

fn parse_sort(json: &Json) -> Result<Vec<SortKey>, QueryError> {
    let Json::Array(items) = json else {
        return Err(invalid("sort must be an array"));
    };

    items
        .iter()
        .map(|item| match item {
            Json::String(field) => Ok(SortKey {
                field: field.clone(),
                direction: SortDirection::Asc,
            }),
            Json::Object(map) if map.len() == 1 => {
                let (field, dir) = map.iter().next().ok_or_else(|| invalid("empty sort key"))?;
                let direction = match dir.as_str() {
                    Some("asc") => SortDirection::Asc,
                    Some("desc") => SortDirection::Desc,
                    _ => return Err(invalid(format!("sort direction for '{field}' must be asc or desc"))),
                };

                Ok(SortKey {
                    field: field.clone(),
                    direction,
                })
            }
            _ => Err(invalid("sort entries are a field name or {field: direction}")),
        })
        .collect()
}

fn parse_use_index(json: &Json) -> Result<Vec<String>, QueryError> {
    match json {
        Json::String(name) => Ok(vec![name.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| invalid("use_index entries must be strings"))
            })
            .collect(),
        _ => Err(invalid("use_index must be a string or array of strings")),
    }
}

// Dotted paths walk nested objects.
fn lookup<'a>(doc: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.').try_fold(doc, |node, segment| node.get(segment))
}

fn members(json: &Json) -> impl Iterator<Item = &Json> {
    json.as_array().into_iter().flatten()
}

// Numbers compare by value so 100 equals 100.0.
fn json_eq(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

// Range operators only compare numbers with numbers and strings with strings.
fn ordered(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Number(_), Json::Number(_)) | (Json::String(_), Json::String(_)) => {
            Some(collate(a, b))
        }
        _ => None,
    }
}

// Collation order: null, booleans, numbers, strings, arrays, objects.
fn collate(a: &Json, b: &Json) -> Ordering {
    const fn rank(json: &Json) -> u8 {
        match json {
            Json::Null => 0,
            Json::Bool(_) => 1,
            Json::Number(_) => 2,
            Json::String(_) => 3,
            Json::Array(_) => 4,
            Json::Object(_) => 5,
        }
    }

    match (a, b) {
        (Json::Bool(x), Json::Bool(y)) => x.cmp(y),
        (Json::Number(x), Json::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.total_cmp(&y)
        }
        (Json::String(x), Json::String(y)) => x.cmp(y),
        (Json::Array(x), Json::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| collate(l, r))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

// Missing sorts first.
fn collate_opt(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => collate(a, b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn marble(name: &str, color: &str, size: i64, owner: &str) -> Json {
        json!({"docType": "marble", "name": name, "color": color, "size": size, "owner": owner})
    }

    fn hits(filter: &str, docs: &[Json]) -> Vec<String> {
        let filter = Filter::parse(filter).unwrap();
        docs.iter()
            .filter(|doc| filter.matches(doc))
            .map(|doc| doc["name"].as_str().unwrap().to_string())
            .collect()
    }

    fn docs() -> Vec<Json> {
        vec![
            marble("m1", "red", 35, "tom"),
            marble("m2", "blue", 50, "jerry"),
            marble("m3", "red", 10, "jerry"),
        ]
    }

    #[test]
    fn implicit_equality_and_conjunction() {
        assert_eq!(
            hits(r#"{"selector":{"docType":"marble","owner":"jerry"}}"#, &docs()),
            vec!["m2", "m3"]
        );
        assert_eq!(
            hits(r#"{"selector":{"color":"red","owner":"jerry"}}"#, &docs()),
            vec!["m3"]
        );
    }

    #[test]
    fn field_operators() {
        let docs = docs();

        assert_eq!(hits(r#"{"selector":{"size":{"$gt":10}}}"#, &docs), vec!["m1", "m2"]);
        assert_eq!(hits(r#"{"selector":{"size":{"$gte":10,"$lt":50}}}"#, &docs), vec!["m1", "m3"]);
        assert_eq!(hits(r#"{"selector":{"owner":{"$ne":"tom"}}}"#, &docs), vec!["m2", "m3"]);
        assert_eq!(hits(r#"{"selector":{"color":{"$in":["blue","green"]}}}"#, &docs), vec!["m2"]);
        assert_eq!(hits(r#"{"selector":{"color":{"$nin":["blue"]}}}"#, &docs), vec!["m1", "m3"]);
        assert_eq!(hits(r#"{"selector":{"size":{"$not":{"$lt":35}}}}"#, &docs), vec!["m1", "m2"]);
    }

    #[test]
    fn combinators() {
        let docs = docs();

        assert_eq!(
            hits(r#"{"selector":{"$or":[{"owner":"tom"},{"size":50}]}}"#, &docs),
            vec!["m1", "m2"]
        );
        assert_eq!(
            hits(r#"{"selector":{"$and":[{"color":"red"},{"$not":{"owner":"tom"}}]}}"#, &docs),
            vec!["m3"]
        );
    }

    #[test]
    fn missing_fields_fail_comparisons_but_answer_exists() {
        let docs = vec![marble("m1", "red", 1, "tom"), json!({"name": "bare"})];

        assert_eq!(hits(r#"{"selector":{"color":{"$ne":"red"}}}"#, &docs), Vec::<String>::new());
        assert_eq!(hits(r#"{"selector":{"color":{"$exists":false}}}"#, &docs), vec!["bare"]);
        assert_eq!(hits(r#"{"selector":{"color":{"$exists":true}}}"#, &docs), vec!["m1"]);
    }

    #[test]
    fn numbers_compare_by_value_and_never_against_text() {
        let docs = vec![json!({"name": "a", "score": 100.0}), json!({"name": "b", "score": "zzz"})];

        assert_eq!(hits(r#"{"selector":{"score":100}}"#, &docs), vec!["a"]);
        assert_eq!(hits(r#"{"selector":{"score":{"$gt":1}}}"#, &docs), vec!["a"]);
    }

    #[test]
    fn dotted_paths_reach_nested_fields() {
        let docs = vec![json!({"name": "a", "meta": {"tier": 2}})];

        assert_eq!(hits(r#"{"selector":{"meta.tier":{"$lte":2}}}"#, &docs), vec!["a"]);
    }

    #[test]
    fn sort_limit_and_index_hint() {
        let filter = Filter::parse(
            r#"{"selector":{"docType":"marble"},"sort":[{"color":"desc"},"size"],"use_index":["_design/idx","bySize"],"limit":2}"#,
        )
        .unwrap();
        let mut docs = docs();
        docs.sort_by(|a, b| filter.compare(a, b));

        let names: Vec<_> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["m3", "m1", "m2"]);
        assert_eq!(filter.limit(), Some(2));
        assert_eq!(filter.use_index(), ["_design/idx", "bySize"]);
    }

    #[test]
    fn eq_selector_targets_one_kind() {
        let filter = Filter::eq_selector("marble", "owner", json!("jerry")).unwrap();

        assert!(filter.matches(&marble("m2", "blue", 50, "jerry")));
        assert!(!filter.matches(&json!({"docType": "student", "owner": "jerry"})));
        assert_eq!(
            filter.to_json(),
            &json!({"selector": {"docType": "marble", "owner": "jerry"}})
        );
    }

    #[test]
    fn malformed_filters_are_rejected() {
        for raw in [
            "not json",
            "[]",
            r#"{"sort":["size"]}"#,
            r#"{"selector":[]}"#,
            r#"{"selector":{"$nor":[{"a":1}]}}"#,
            r#"{"selector":{"a":{"$regex":"x"}}}"#,
            r#"{"selector":{"a":{"$in":"x"}}}"#,
            r#"{"selector":{"a":{"$exists":"yes"}}}"#,
            r#"{"selector":{"$or":[]}}"#,
            r#"{"selector":{},"sort":[{"a":"up"}]}"#,
            r#"{"selector":{},"limit":-1}"#,
            r#"{"selector":{},"skip":2}"#,
        ] {
            assert!(
                matches!(Filter::parse(raw), Err(QueryError::InvalidFilter(_))),
                "{raw} should be rejected"
            );
        }
    }
}
