//! Typed constructors for OpenSearch query-DSL fragments.
//!
//! The OpenSearch request body is a tree of named JSON maps. Spelling that out
//! by hand with `json!` nesting is the largest source of subtle bugs in this
//! kind of client, so every fragment here is a typed value that serializes
//! itself via `serde::Serialize` rather than a string template.

use serde::Serialize;
use serde_json::{Map, Value, json};

/// A single query clause. Only the variants NetTap actually emits are
/// modeled; anything else can be embedded as `Query::Raw`.
#[derive(Debug, Clone)]
pub enum Query {
    Range(RangeQuery),
    Term(TermQuery),
    Terms(TermsQuery),
    Exists { field: String },
    Bool(BoolQuery),
    Raw(Value),
}

impl Serialize for Query {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let v = match self {
            Query::Range(r) => json!({ "range": { &r.field: r.bounds_json() } }),
            Query::Term(t) => json!({ "term": { &t.field: t.value } }),
            Query::Terms(t) => json!({ "terms": { &t.field: t.values } }),
            Query::Exists { field } => json!({ "exists": { "field": field } }),
            Query::Bool(b) => json!({ "bool": b.as_map() }),
            Query::Raw(v) => v.clone(),
        };
        v.serialize(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RangeQuery {
    pub field: String,
    pub gte: Option<Value>,
    pub lte: Option<Value>,
    pub gt: Option<Value>,
    pub lt: Option<Value>,
}

impl RangeQuery {
    fn bounds_json(&self) -> Value {
        let mut m = Map::new();
        if let Some(v) = &self.gte {
            m.insert("gte".into(), v.clone());
        }
        if let Some(v) = &self.lte {
            m.insert("lte".into(), v.clone());
        }
        if let Some(v) = &self.gt {
            m.insert("gt".into(), v.clone());
        }
        if let Some(v) = &self.lt {
            m.insert("lt".into(), v.clone());
        }
        Value::Object(m)
    }
}

/// `Range(field, gte, lte)` — half-open timestamp range is the common case.
pub fn range_between(field: impl Into<String>, gte: &str, lte: &str) -> Query {
    Query::Range(RangeQuery {
        field: field.into(),
        gte: Some(Value::String(gte.to_string())),
        lte: Some(Value::String(lte.to_string())),
        ..Default::default()
    })
}

#[derive(Debug, Clone)]
pub struct TermQuery {
    pub field: String,
    pub value: Value,
}

pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Query {
    Query::Term(TermQuery {
        field: field.into(),
        value: value.into(),
    })
}

#[derive(Debug, Clone)]
pub struct TermsQuery {
    pub field: String,
    pub values: Vec<Value>,
}

pub fn exists(field: impl Into<String>) -> Query {
    Query::Exists {
        field: field.into(),
    }
}

/// `Bool{filter, must, should}` — the filter clause is scoreless and cached;
/// NetTap only ever needs filter-context queries plus optional negation.
#[derive(Debug, Clone, Default)]
pub struct BoolQuery {
    pub filter: Vec<Query>,
    pub must: Vec<Query>,
    pub should: Vec<Query>,
    pub must_not: Vec<Query>,
    pub minimum_should_match: Option<u32>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, q: Query) -> Self {
        self.filter.push(q);
        self
    }

    pub fn must(mut self, q: Query) -> Self {
        self.must.push(q);
        self
    }

    pub fn should(mut self, q: Query) -> Self {
        self.should.push(q);
        self
    }

    /// Without this, a `bool` query that also has a `filter`/`must` clause
    /// defaults `minimum_should_match` to 0 and the `should` clauses become
    /// scoring-only — they impose no restriction on what matches.
    pub fn minimum_should_match(mut self, n: u32) -> Self {
        self.minimum_should_match = Some(n);
        self
    }

    fn as_map(&self) -> Value {
        let mut m = Map::new();
        if !self.filter.is_empty() {
            m.insert("filter".into(), json!(self.filter));
        }
        if !self.must.is_empty() {
            m.insert("must".into(), json!(self.must));
        }
        if !self.should.is_empty() {
            m.insert("should".into(), json!(self.should));
        }
        if !self.must_not.is_empty() {
            m.insert("must_not".into(), json!(self.must_not));
        }
        if let Some(msm) = self.minimum_should_match {
            m.insert("minimum_should_match".into(), json!(msm));
        }
        Value::Object(m)
    }
}

/// A complete search request body: `{query, size, sort?, aggs?, _source?}`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SearchBody {
    pub query: Option<QueryWrapper>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(rename = "from", skip_serializing_if = "Option::is_none")]
    pub from_offset: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggs: Option<Map<String, Value>>,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct QueryWrapper(pub Query);

impl Serialize for QueryWrapper {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl SearchBody {
    pub fn new(query: Query) -> Self {
        Self {
            query: Some(QueryWrapper(query)),
            ..Default::default()
        }
    }

    pub fn size(mut self, n: u32) -> Self {
        self.size = Some(n);
        self
    }

    /// Page offset, for `page`/`size` pagination — OpenSearch's `from`.
    pub fn from_offset(mut self, n: u32) -> Self {
        self.from_offset = Some(n);
        self
    }

    pub fn sort_desc(mut self, field: &str) -> Self {
        self.sort.push(json!({ field: { "order": "desc" } }));
        self
    }

    pub fn source_fields(mut self, fields: &[&str]) -> Self {
        self.source = Some(json!(fields));
        self
    }

    pub fn agg(mut self, name: &str, body: Value) -> Self {
        self.aggs
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), body);
        self
    }
}

/// `terms` aggregation helper, `{ "terms": { "field": f, "size": n } }`.
pub fn terms_agg(field: &str, size: u32) -> Value {
    json!({ "terms": { "field": field, "size": size } })
}

/// `terms` aggregation with a nested sub-aggregation (used for per-bucket sums).
pub fn terms_agg_with_sub(field: &str, size: u32, sub_name: &str, sub: Value) -> Value {
    json!({
        "terms": { "field": field, "size": size },
        "aggs": { sub_name: sub }
    })
}

/// Painless scripted sum, `orig_bytes + resp_bytes`, guarding against missing
/// fields. The script text is an opaque literal shared with the OpenSearch
/// server — see the traffic classifier's byte-sum aggregation.
pub fn script_sum_bytes_agg() -> Value {
    json!({
        "sum": {
            "script": {
                "lang": "painless",
                "source": "(doc['orig_bytes'].size() > 0 ? doc['orig_bytes'].value : 0) + (doc['resp_bytes'].size() > 0 ? doc['resp_bytes'].value : 0)"
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_filter_serializes_without_stringly_spelling() {
        let q = Query::Bool(
            BoolQuery::new()
                .filter(range_between("ts", "2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z"))
                .filter(term("answers", "10.0.0.1")),
        );
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["bool"]["filter"][0]["range"]["ts"]["gte"], "2026-01-01T00:00:00Z");
        assert_eq!(v["bool"]["filter"][1]["term"]["answers"], "10.0.0.1");
    }

    #[test]
    fn search_body_omits_empty_optional_fields() {
        let body = SearchBody::new(Query::Bool(BoolQuery::new())).size(10);
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("aggs").is_none());
        assert!(v.get("_source").is_none());
        assert_eq!(v["size"], 10);
    }

    #[test]
    fn minimum_should_match_is_emitted_alongside_filter() {
        let q = Query::Bool(
            BoolQuery::new()
                .filter(range_between("ts", "2026-01-01T00:00:00Z", "2026-01-02T00:00:00Z"))
                .should(term("src_ip", "10.0.0.1"))
                .should(term("dest_ip", "10.0.0.1"))
                .minimum_should_match(1),
        );
        let v = serde_json::to_value(&q).unwrap();
        assert_eq!(v["bool"]["minimum_should_match"], 1);
        assert_eq!(v["bool"]["should"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn agg_helper_builds_terms_with_sub_aggregation() {
        let v = terms_agg_with_sub("service", 50, "bytes", script_sum_bytes_agg());
        assert_eq!(v["terms"]["field"], "service");
        assert_eq!(v["aggs"]["bytes"]["sum"]["script"]["lang"], "painless");
    }
}
