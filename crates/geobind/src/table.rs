//! Document-side descriptors for remotely stored tables.
//!
//! These structs mirror the JSON shapes embedded in object documents: a
//! values table holds columnar data, a lookup table maps integer codes to
//! labels for categorical data, and a nan description lists sentinel values
//! that stand in for missing data.

use serde::{Deserialize, Serialize};

/// Reference to a stored columnar table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRef {
    /// Opaque storage identifier assigned by the service.
    pub data: String,
    /// Row count.
    pub length: u64,
    /// Column count.
    pub width: u64,
    /// Storage encoding of the cells, e.g. "float64".
    pub data_type: String,
}

impl TableRef {
    pub fn cells(&self) -> u64 {
        self.length * self.width
    }
}

/// Reference to a stored code-to-label lookup table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRef {
    pub data: String,
    /// Entry count.
    pub length: u64,
    /// Storage encoding of the codes.
    pub data_type: String,
}

impl LookupRef {
    /// Each entry is a code plus a label.
    pub fn cells(&self) -> u64 {
        self.length * 2
    }
}

/// Sentinel values representing missing data, typed to match the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sentinels {
    Integer(Vec<i64>),
    Continuous(Vec<f64>),
}

impl Sentinels {
    pub fn is_empty(&self) -> bool {
        match self {
            Sentinels::Integer(values) => values.is_empty(),
            Sentinels::Continuous(values) => values.is_empty(),
        }
    }
}

impl Default for Sentinels {
    fn default() -> Self {
        Sentinels::Integer(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NanDescription {
    pub values: Sentinels,
}

/// The storage classification of an attribute column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Scalar,
    Integer,
    Bool,
    Category,
    String,
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttributeType::Scalar => "scalar",
            AttributeType::Integer => "integer",
            AttributeType::Bool => "bool",
            AttributeType::Category => "category",
            AttributeType::String => "string",
        };
        f.write_str(name)
    }
}

/// One entry in an object's attribute list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub name: String,
    /// Stable identity, preserved across value updates. Older documents omit
    /// it, in which case the name serves as the key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub attribute_type: AttributeType,
    pub values: TableRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<LookupRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nan_description: Option<NanDescription>,
}

impl AttributeRecord {
    /// The record's identity: its key when present, its name otherwise.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(&self.name)
    }

    pub fn sentinels(&self) -> Option<&Sentinels> {
        self.nan_description
            .as_ref()
            .map(|nan| &nan.values)
            .filter(|values| !values.is_empty())
    }

    /// Combined cell count of the values table and any lookup table, used
    /// for proportional progress reporting.
    pub fn total_cells(&self) -> u64 {
        let lookup = self.table.as_ref().map(LookupRef::cells).unwrap_or(0);
        self.values.cells() + lookup
    }
}
