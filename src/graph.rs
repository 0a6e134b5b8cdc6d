//! ID-indexed Object Graph
//!
//! Maps every document `@id` to a handle locating the object in document
//! order. Handles are positional (table index, column position, ...), so the
//! same graph resolves references into any builder's output.
//!
//! The first object registered under an ID wins; later duplicates are
//! ignored here and reported by the validator.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::types::FelisType;

/// A resolved column reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub id: String,
    pub name: String,
    pub datatype: FelisType,
    /// Position of the owning table in the schema
    pub table_index: usize,
    pub table_id: String,
    pub table_name: String,
    /// Position of the column in its table
    pub position: usize,
}

/// What an ID refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ObjectHandle {
    Schema {
        name: String,
    },
    Table {
        name: String,
        index: usize,
    },
    Column(ColumnRef),
    Constraint {
        name: Option<String>,
        table_index: usize,
        index: usize,
    },
    Index {
        name: String,
        table_index: usize,
        index: usize,
    },
}

impl ObjectHandle {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "schema",
            Self::Table { .. } => "table",
            Self::Column(_) => "column",
            Self::Constraint { .. } => "constraint",
            Self::Index { .. } => "index",
        }
    }

    pub fn as_column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Column(column) => Some(column),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema { name } => write!(f, "schema {}", name),
            Self::Table { name, .. } => write!(f, "table {}", name),
            Self::Column(c) => write!(f, "column {}.{}", c.table_name, c.name),
            Self::Constraint { name: Some(name), .. } => write!(f, "constraint {}", name),
            Self::Constraint { name: None, index, .. } => write!(f, "constraint #{}", index),
            Self::Index { name, .. } => write!(f, "index {}", name),
        }
    }
}

/// ID map built during traversal
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectGraph {
    entries: HashMap<String, ObjectHandle>,
    /// IDs in registration order
    order: Vec<String>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object; returns false if the ID was already taken
    pub fn insert(&mut self, id: impl Into<String>, handle: ObjectHandle) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            debug!("Keeping first object registered as {}", id);
            return false;
        }
        self.order.push(id.clone());
        self.entries.insert(id, handle);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ObjectHandle> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn column(&self, id: &str) -> Option<&ColumnRef> {
        self.get(id).and_then(ObjectHandle::as_column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// IDs in the order they were registered
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// `(id, handle)` pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectHandle)> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|h| (id.as_str(), h)))
    }

    /// Columns of one table, in table order
    pub fn table_columns(&self, table_index: usize) -> Vec<&ColumnRef> {
        let mut columns: Vec<_> = self
            .iter()
            .filter_map(|(_, h)| h.as_column())
            .filter(|c| c.table_index == table_index)
            .collect();
        columns.sort_by_key(|c| c.position);
        columns
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(id: &str, position: usize) -> ObjectHandle {
        ObjectHandle::Column(ColumnRef {
            id: id.to_string(),
            name: id.trim_start_matches('#').to_string(),
            datatype: FelisType::Int,
            table_index: 0,
            table_id: "#t".to_string(),
            table_name: "t".to_string(),
            position,
        })
    }

    #[test]
    fn test_first_insert_wins() {
        let mut graph = ObjectGraph::new();
        assert!(graph.insert("#t", ObjectHandle::Table { name: "t".into(), index: 0 }));
        assert!(!graph.insert("#t", ObjectHandle::Table { name: "u".into(), index: 1 }));
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.get("#t"),
            Some(&ObjectHandle::Table { name: "t".into(), index: 0 })
        );
    }

    #[test]
    fn test_registration_order_and_columns() {
        let mut graph = ObjectGraph::new();
        graph.insert("#s", ObjectHandle::Schema { name: "s".into() });
        graph.insert("#t", ObjectHandle::Table { name: "t".into(), index: 0 });
        graph.insert("#b", column("#b", 1));
        graph.insert("#a", column("#a", 0));

        assert_eq!(graph.ids().collect::<Vec<_>>(), vec!["#s", "#t", "#b", "#a"]);
        let names: Vec<_> = graph.table_columns(0).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(graph.column("#t").is_none());
        assert_eq!(graph.column("#a").map(|c| c.position), Some(0));
    }
}
