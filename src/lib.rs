pub mod pipeline;
pub mod sqlite_pragma;
