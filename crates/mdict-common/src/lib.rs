mod error;

pub use error::{MdictError, MdictResult};
