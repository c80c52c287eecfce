//! Application layer: service clients built on the infrastructure adapters.
//!
//! - **`springboard`** – `SpringboardServiceClient`, the home-screen service:
//!   icon layout, icon images, interface orientation and wallpaper.  It owns
//!   one `TransportSession` and enforces the open/closed session rules.

pub mod springboard;

pub use springboard::SpringboardServiceClient;
