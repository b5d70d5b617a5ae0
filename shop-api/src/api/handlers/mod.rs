pub mod product;
pub mod stats;
pub mod user;

pub use product::*;
pub use stats::*;
pub use user::*;
