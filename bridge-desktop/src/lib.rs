//! # Desktop Bridge Implementations
//!
//! Default implementations of the host-neutral bridge traits for desktop
//! platforms (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`
//! - `SettingsStore` using an SQLite-backed key-value table
//!
//! Audio output and the streaming SDK session are always supplied by the
//! embedding host; there is no portable desktop default for either.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = ReqwestHttpClient::new()?;
//!     let settings = SqliteSettingsStore::in_memory().await?;
//!     // Hand both to the player configuration
//!     Ok(())
//! }
//! ```

mod http;
mod settings;

pub use http::ReqwestHttpClient;
pub use settings::SqliteSettingsStore;
