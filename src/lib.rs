//! mdserve - a small local webserver for Markdown directories.
//!
//! Serves a directory tree over HTTP, rendering `.md`/`.markdown` files
//! to styled HTML on the fly and passing everything else through
//! unchanged. Styling, fonts and the page template ship inside the
//! binary under the reserved `assets/` path.

pub mod assets;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logger;
pub mod render;
pub mod resolve;
pub mod server;

pub use config::{Args, ServerConfig};
pub use errors::{ServeError, SetupError};
pub use handlers::AppContext;
pub use render::{DocumentMetadata, QuoteTable, RenderError, RenderOptions};
