pub mod product;
pub mod user;

pub use product::ProductService;
pub use user::UserService;
