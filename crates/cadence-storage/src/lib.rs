//! File-backed implementation of the `KeyValueStore` contract.

pub mod json_file_store;
