pub mod emit;
pub mod error;
pub mod index;
pub mod input;
pub mod logging;
pub mod materialize;
pub mod output;
pub mod parser;
pub mod query;
pub mod template;
pub mod value;

pub use error::{Error, Result};
pub use query::{query, QueryOptions, QueryResult};
