//! Shared geoscience value types embedded in object documents.

use arrow::array::Float64Array;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An axis-aligned spatial extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

impl BoundingBox {
    /// The extent of the `x`/`y`/`z` columns of a coordinate frame.
    pub fn from_coordinates(batch: &RecordBatch) -> Result<Self> {
        let mut extents = [(f64::INFINITY, f64::NEG_INFINITY); 3];
        for (axis, name) in ["x", "y", "z"].iter().enumerate() {
            let index = batch
                .schema()
                .index_of(name)
                .map_err(|_| Error::MissingColumn {
                    context: "bounding box".to_string(),
                    column: name.to_string(),
                })?;
            let column = batch.column(index);
            let values = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| Error::validation("bounding_box", format!(
                    "coordinate column '{name}' is not float64"
                )))?;
            for value in values.iter().flatten() {
                let (min, max) = &mut extents[axis];
                *min = min.min(value);
                *max = max.max(value);
            }
        }
        let result = Self {
            min_x: extents[0].0,
            max_x: extents[0].1,
            min_y: extents[1].0,
            max_y: extents[1].1,
            min_z: extents[2].0,
            max_z: extents[2].1,
        };
        if !result.is_valid() {
            return Err(Error::validation(
                "bounding_box",
                "coordinate frame has no finite values",
            ));
        }
        Ok(result)
    }

    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y && self.min_z <= self.max_z
    }
}

/// An EPSG coordinate system code, restricted to the registry's valid
/// range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct EpsgCode(i64);

impl EpsgCode {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for EpsgCode {
    type Error = String;

    fn try_from(code: i64) -> std::result::Result<Self, Self::Error> {
        if (1024..=32767).contains(&code) {
            Ok(Self(code))
        } else {
            Err(format!("{code} is outside the EPSG code range 1024..=32767"))
        }
    }
}

impl From<EpsgCode> for i64 {
    fn from(code: EpsgCode) -> i64 {
        code.0
    }
}

impl std::fmt::Display for EpsgCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A coordinate reference system declaration: an EPSG code, a WKT
/// description, or explicitly unspecified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateReferenceSystem {
    Epsg { epsg_code: EpsgCode },
    Wkt { ogc_wkt: String },
    Unspecified(String),
}

impl CoordinateReferenceSystem {
    pub fn unspecified() -> Self {
        CoordinateReferenceSystem::Unspecified("unspecified".to_string())
    }
}
