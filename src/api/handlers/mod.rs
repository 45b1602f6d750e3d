mod admin;
mod download;
mod upload;

pub use admin::{health, set_password_cookie};
pub use download::serve_short;
pub use upload::upload;
