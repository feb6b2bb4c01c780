//! Event model, enrichment and messenger links

mod enricher;
mod links;
mod model;

pub use enricher::{EventEnricher, EventRecord, RequestContext, is_valid_timestamp_format};
pub use links::MessengerLinks;
pub use model::{BotContact, ClientInfo, EventKind, EventPayload, FormData, Utm};
