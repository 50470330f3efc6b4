pub mod ids;
pub mod interaction;
pub mod post;
pub mod user;
