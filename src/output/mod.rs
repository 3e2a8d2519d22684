pub mod pretty;

pub use self::pretty::{format_result, RenderOptions};
