//! clickrelay - click id issuing and messenger attribution service
//!
//! Landing pages report messenger clicks and form submissions. Each event
//! gets a click id that is embedded in the returned deep link, the enriched
//! event is logged as one spreadsheet row in the background, and form
//! contacts are forwarded to a CRM webhook. When the messenger bot later
//! relays the user's first message, the id is extracted again and the row
//! is stamped with the confirmed channel.
//!
//! # Architecture
//! - `allocator`: click id issuing (Redis counter, random fallback)
//! - `events`: payload model, row enrichment, deep links
//! - `store`: spreadsheet row store (Google Sheets, in-memory)
//! - `crm`: webhook forwarding with retries
//! - `dispatch`: background jobs off the request path
//! - `reconcile`: id extraction from bot messages
//! - `api`: HTTP services and middleware
//! - `config` / `system` / `runtime`: configuration, logging, lifecycle

pub mod allocator;
pub mod api;
pub mod cli;
pub mod config;
pub mod crm;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod reconcile;
pub mod runtime;
pub mod services;
pub mod store;
pub mod system;
pub mod utils;
