#![doc = include_str!("../README.md")]

pub mod direct;
pub mod factory;
pub mod index;
pub mod indexer;
pub mod models;
pub mod query;
