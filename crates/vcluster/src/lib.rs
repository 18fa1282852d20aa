pub mod common;
pub mod exec;
pub mod fabric;
pub mod model;
pub mod server;
pub mod store;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::VcError;
pub type Result<T> = std::result::Result<T, Error>;

pub type Map<K, V> = std::collections::HashMap<K, V>;
pub type Set<T> = std::collections::HashSet<T>;
