pub mod activity;
pub mod enums;
pub mod product;
pub mod user;

pub use activity::*;
pub use enums::*;
pub use product::*;
pub use user::*;
