pub mod crud_service;
pub mod dictionary;

pub use crud_service::{CreateResult, CrudService, CrudSettings, MutationResult, ResolvedTable};
pub use dictionary::DictItem;
