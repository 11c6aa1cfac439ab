//! Bindings between document locations and stored tables.

mod attributes;
mod dataset;
mod field;

pub use attributes::AttributeSetBinding;
pub use dataset::{BindingConfig, DatasetBinding, FieldSpec};
pub use field::FieldBinding;
