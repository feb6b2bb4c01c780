pub mod bot;
pub mod events;
pub mod health;

pub use bot::{BotService, bot_routes};
pub use events::{EventService, event_routes};
pub use health::{HealthService, health_routes};
