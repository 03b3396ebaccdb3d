pub mod indices;
pub mod items;
