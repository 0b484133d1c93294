//! Chrome adapter
//!
//! Everything that talks to `headless_chrome` lives here. The rest of the
//! crate only sees the [`Page`](crate::dom::Page) and
//! [`SessionProvider`](crate::engine::SessionProvider) traits.

pub mod config;
pub mod page;
pub mod provider;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use page::ChromePage;
pub use provider::{ChromeProvider, Endpoint};
pub use session::BrowserSession;
