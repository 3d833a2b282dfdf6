//! Client connection layer

pub mod connection;

pub use connection::{Connection, ConnectionFactory};
