//! Backend-neutral document queries.
//!
//! Field names are JSON keys; a dotted name such as `payment.status` walks
//! nested objects.

use std::cmp::Ordering;

use serde_json::Value;

use crate::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    /// Inclusive lower bound. Strings compare lexically, so ISO dates work.
    Gte(Value),
    /// Inclusive upper bound.
    Lte(Value),
    Exists(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        let value = lookup(doc, &self.field);
        match &self.op {
            FilterOp::Eq(expected) => value == Some(expected),
            FilterOp::Ne(expected) => value != Some(expected),
            FilterOp::In(options) => value.is_some_and(|v| options.contains(v)),
            FilterOp::Gte(bound) => value
                .and_then(|v| compare(v, bound))
                .is_some_and(Ordering::is_ge),
            FilterOp::Lte(bound) => value
                .and_then(|v| compare(v, bound))
                .is_some_and(Ordering::is_le),
            FilterOp::Exists(wanted) => value.is_some_and(|v| !v.is_null()) == *wanted,
        }
    }
}

/// Case-insensitive substring search over several fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Search {
    term: String,
    pub fields: Vec<String>,
}

impl Search {
    pub fn new<I, S>(term: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            term: term.trim().to_lowercase(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn matches(&self, doc: &Document) -> bool {
        if self.term.is_empty() {
            return true;
        }
        self.fields
            .iter()
            .filter_map(|f| lookup(doc, f))
            .any(|v| contains_term(v, &self.term))
    }
}

fn contains_term(value: &Value, term: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(term),
        Value::Number(n) => n.to_string().contains(term),
        Value::Array(items) => items.iter().any(|v| contains_term(v, term)),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

/// Filters, optional search, sort and window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub search: Option<Search>,
    pub sort: Option<Sort>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
        });
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq(value.into()))
    }

    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Ne(value.into()))
    }

    pub fn any_of<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.filter(field, FilterOp::In(values.into_iter().map(Into::into).collect()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Gte(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Lte(value.into()))
    }

    /// Add an equality filter when `value` is present.
    pub fn eq_opt<V: Into<Value>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    /// Add an inclusive range on `field`; either end may be open.
    pub fn between<V: Into<Value>>(self, field: &str, from: Option<V>, to: Option<V>) -> Self {
        let query = match from {
            Some(v) => self.gte(field, v),
            None => self,
        };
        match to {
            Some(v) => query.lte(field, v),
            None => query,
        }
    }

    /// Search `term` in `fields`; blank terms are ignored.
    pub fn search<I, S>(mut self, term: Option<&str>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(term) = term.filter(|t| !t.trim().is_empty()) {
            self.search = Some(Search::new(term, fields));
        }
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            descending,
        });
        self
    }

    pub fn newest_first(self) -> Self {
        self.sort_by("createdAt", true)
    }

    pub fn window(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Drop the window, keeping filters and sort.
    pub fn unbounded(mut self) -> Self {
        self.offset = 0;
        self.limit = None;
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
            && self.search.as_ref().is_none_or(|s| s.matches(doc))
    }

    /// Evaluate the query over an in-memory sequence of documents.
    pub fn apply<I>(&self, docs: I) -> FindResult
    where
        I: IntoIterator<Item = Document>,
    {
        let mut matched: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        if let Some(sort) = &self.sort {
            matched.sort_by(|a, b| {
                let ord = sort_key_cmp(lookup(a, &sort.field), lookup(b, &sort.field));
                if sort.descending { ord.reverse() } else { ord }
            });
        }
        let total = matched.len() as u64;
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let documents = match self.limit {
            Some(limit) => matched
                .into_iter()
                .skip(offset)
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => matched.into_iter().skip(offset).collect(),
        };
        FindResult { documents, total }
    }
}

/// A window of matching documents plus the unwindowed match count.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindResult {
    pub documents: Vec<Document>,
    pub total: u64,
}

fn lookup<'a>(doc: &'a Document, field: &str) -> Option<&'a Value> {
    field
        .split('.')
        .try_fold(doc, |current, key| current.get(key))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

fn sort_key_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare(x, y).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b))),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
