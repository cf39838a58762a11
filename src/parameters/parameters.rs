use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Error deserializing parameters")]
    Deserialize(#[from] toml::de::Error),

    #[error("Parameter toml does not have the right structure (error in '{0}')")]
    BadToml(String),

    #[error("Element '{path}' not found")]
    NotFound { path: String },

    #[error("Cannot cast parameter '{path}' to {dtype}")]
    BadCast { path: String, dtype: String },

    #[error("Element '{path}' is not a parameter")]
    NotAParameter { path: String },

    #[error("Element '{path}' is not a map")]
    NotAMap { path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ParameterValue {
    #[serde(rename = "bool")]
    Bool { val: bool },
    #[serde(rename = "int")]
    Int { val: i64 },
    #[serde(rename = "float")]
    Float { val: f64 },
    #[serde(rename = "str")]
    String { val: String },
}

/// Conversion from a tagged parameter value into a plain Rust type.
pub trait FromParameter: Sized {
    const DTYPE: &'static str;

    fn from_value(value: &ParameterValue) -> Option<Self>;
}

impl FromParameter for bool {
    const DTYPE: &'static str = "bool";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Bool { val } => Some(*val),
            _ => None,
        }
    }
}

impl FromParameter for i64 {
    const DTYPE: &'static str = "int";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Int { val } => Some(*val),
            _ => None,
        }
    }
}

impl FromParameter for f64 {
    const DTYPE: &'static str = "float";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::Float { val } => Some(*val),
            _ => None,
        }
    }
}

impl FromParameter for String {
    const DTYPE: &'static str = "str";

    fn from_value(value: &ParameterValue) -> Option<Self> {
        match value {
            ParameterValue::String { val } => Some(val.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    path: String,
    value: ParameterValue,
}

impl Parameter {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw(&self) -> &ParameterValue {
        &self.value
    }

    pub fn value<T: FromParameter>(&self) -> Result<T, Error> {
        T::from_value(&self.value).ok_or_else(|| Error::BadCast {
            path: self.path.clone(),
            dtype: T::DTYPE.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterMap {
    path: String,
    map: BTreeMap<String, ParameterTree>,
}

impl ParameterMap {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn get(&self, rel_path: &str) -> Result<&ParameterTree, Error> {
        let not_found = || Error::NotFound {
            path: append_path(&self.path, rel_path),
        };

        let mut parts = rel_path.split('.');
        let mut elem = parts
            .next()
            .and_then(|first| self.map.get(first))
            .ok_or_else(not_found)?;

        for part in parts {
            elem = match elem {
                ParameterTree::Node(n) => n.map.get(part).ok_or_else(not_found)?,
                ParameterTree::Leaf(_) => return Err(not_found()),
            };
        }

        Ok(elem)
    }

    pub fn get_param(&self, rel_path: &str) -> Result<&Parameter, Error> {
        self.get(rel_path)?.as_param()
    }

    pub fn get_map(&self, rel_path: &str) -> Result<&ParameterMap, Error> {
        self.get(rel_path)?.as_map()
    }

    pub fn value<T: FromParameter>(&self, rel_path: &str) -> Result<T, Error> {
        self.get_param(rel_path)?.value()
    }

    /// Like [`ParameterMap::value`], but a missing element yields `default`.
    /// An element that exists with the wrong type is still an error.
    pub fn value_or<T: FromParameter>(&self, rel_path: &str, default: T) -> Result<T, Error> {
        match self.get_param(rel_path) {
            Ok(param) => param.value(),
            Err(Error::NotFound { .. }) => Ok(default),
            Err(e) => Err(e),
        }
    }

    pub fn iter(&self) -> ParameterMapIter<'_> {
        ParameterMapIter {
            iter: self.map.iter(),
        }
    }
}

pub struct ParameterMapIter<'a> {
    iter: btree_map::Iter<'a, String, ParameterTree>,
}

impl<'a> Iterator for ParameterMapIter<'a> {
    type Item = (&'a String, &'a ParameterTree);

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterTree {
    Node(ParameterMap),
    Leaf(Parameter),
}

impl Default for ParameterTree {
    fn default() -> Self {
        ParameterTree::Node(ParameterMap::default())
    }
}

impl ParameterTree {
    pub fn as_param(&self) -> Result<&Parameter, Error> {
        match self {
            Self::Leaf(p) => Ok(p),
            Self::Node(m) => Err(Error::NotAParameter {
                path: m.path.clone(),
            }),
        }
    }

    pub fn as_map(&self) -> Result<&ParameterMap, Error> {
        match self {
            Self::Node(m) => Ok(m),
            Self::Leaf(p) => Err(Error::NotAMap {
                path: p.path.clone(),
            }),
        }
    }
}

pub fn parse_string(toml_str: &str) -> Result<ParameterMap, Error> {
    let table = toml::from_str::<Table>(toml_str)?;

    parse_table(table)
}

pub fn parse_table(table: Table) -> Result<ParameterMap, Error> {
    parse_table_recursive(table, String::new())
}

fn parse_table_recursive(table: Table, root: String) -> Result<ParameterMap, Error> {
    let mut nodes = BTreeMap::new();

    for (key, val) in table.into_iter() {
        let path = append_path(&root, &key);
        let Value::Table(val) = val else {
            return Err(Error::BadToml(path));
        };

        // A table carrying a `type` tag is a leaf, anything else is a nested map
        if val.contains_key("type") {
            let value = val
                .try_into::<ParameterValue>()
                .map_err(|_| Error::BadToml(path.clone()))?;
            nodes.insert(key, ParameterTree::Leaf(Parameter { path, value }));
        } else {
            nodes.insert(key, ParameterTree::Node(parse_table_recursive(val, path)?));
        }
    }

    Ok(ParameterMap {
        path: root,
        map: nodes,
    })
}

fn append_path(root: &str, key: &str) -> String {
    if root.is_empty() {
        key.to_string()
    } else {
        format!("{root}.{key}")
    }
}
