//! Provider implementations

pub mod duckduckgo;
pub mod brave;
pub mod searxng;
pub mod ticketmaster;
pub mod eventbrite;

pub use brave::BraveProvider;
pub use duckduckgo::DuckDuckGoProvider;
pub use eventbrite::EventbriteProvider;
pub use searxng::SearxngProvider;
pub use ticketmaster::TicketmasterProvider;
