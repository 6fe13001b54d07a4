mod server;

pub use server::{ServerConfig, load_secret, write_secret};
