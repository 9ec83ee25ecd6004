pub mod extract;
pub mod schema;
