pub mod api;
pub mod chat;
pub mod config;
pub mod render;
pub mod state;
pub mod types;
pub mod util;

#[cfg(test)]
pub mod test_support;
