pub mod models;
pub mod enums;
pub mod tables;

pub use models::*;
pub use enums::*;
pub use tables::*;
