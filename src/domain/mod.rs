pub mod clock;
pub mod form;
pub mod output;
pub mod schema;
pub mod text;
