//! Gainbook - capital gains tax calculator for foreign stock trades
//!
//! Matches sales to purchases first-in first-out, indexes purchase costs by a
//! monthly producer price index, and computes the annual tax on capital gains
//! and dividends under progressive brackets with a foreign tax credit.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod importers;
pub mod models;
pub mod tax;
pub mod utils;
