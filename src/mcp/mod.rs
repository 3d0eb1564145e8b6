//! MCP Server for the product catalog
//!
//! Exposes the three search modes and index status as tools over stdio.

mod server;

pub use server::run_mcp_server;
