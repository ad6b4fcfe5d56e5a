// Storage - Couche de persistance (KV ordonné, surcouche cache, RocksDB)
// Principe: Déterminisme, atomicité par bloc

pub mod db;
pub mod kv;

pub use db::*;
pub use kv::*;
