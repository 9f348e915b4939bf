pub mod builder;
pub mod dates;
pub mod schema;
pub mod text;
