mod models;
mod principal;
mod role;
mod shape;

pub use models::*;
pub use principal::Principal;
pub use role::Role;
pub use shape::*;
