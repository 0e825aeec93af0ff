//! Round-trip synchronization between an Azure DevOps wiki and a local
//! directory tree: export mirrors the remote page hierarchy to disk, import
//! upserts local folders back as pages, and the catalog builder aggregates an
//! exported tree into a classified JSON knowledge base.

pub mod catalog;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod paths;

#[cfg(test)]
mod testing;
