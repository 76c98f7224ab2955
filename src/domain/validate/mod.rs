pub mod validator;

pub use validator::{is_blank, validate, ValidationError};
