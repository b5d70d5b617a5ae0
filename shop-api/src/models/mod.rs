pub mod filters;
pub mod requests;
pub mod responses;

pub use filters::*;
pub use requests::*;
pub use responses::*;
