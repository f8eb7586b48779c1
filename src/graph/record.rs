//! Result records and query parameters.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::graph::traits::QueryError;

/// Named query parameters, referenced in Cypher as `$name`.
pub type Params = BTreeMap<String, JsonValue>;

/// One result record: column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: BTreeMap<String, JsonValue>,
}

impl Record {
    pub fn new(columns: BTreeMap<String, JsonValue>) -> Self {
        Self { columns }
    }

    /// Typed column access.
    ///
    /// ```ignore
    /// let nodes: i64 = record.get("nodes")?;
    /// ```
    pub fn get<T: DeserializeOwned>(&self, column: &str) -> Result<T, QueryError> {
        let value = self.columns.get(column).ok_or_else(|| QueryError::Decode {
            column: column.to_string(),
            reason: "missing".to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| QueryError::Decode {
            column: column.to_string(),
            reason: e.to_string(),
        })
    }

    /// Like [`get`](Record::get) but treats a missing or null column as `None`.
    pub fn get_opt<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>, QueryError> {
        match self.columns.get(column) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(_) => self.get(column).map(Some),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, JsonValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, JsonValue)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
