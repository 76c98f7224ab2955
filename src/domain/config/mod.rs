//! Declarative per-table configuration.

pub mod loader;
pub mod model;

pub use loader::{load_config, search_type_supports};
pub use model::{
    CreatableField, DefaultPolicy, DictSource, DictSourceSpec, DisplayField, FieldRules,
    FieldValidation, SearchFieldConfig, SearchType, SortOrder, TableConfig, TableConfigRecord,
    UpdatableField,
};
