use std::fs;
use std::path::PathBuf;

use clap::Parser;

use crate::errors::SetupError;

/// Command line flags.
#[derive(Parser, Debug)]
#[command(name = "mdserve")]
#[command(about = "Serve a directory tree, rendering Markdown files to styled HTML")]
pub struct Args {
    /// Listen address
    #[arg(short = 'a', default_value = "localhost:8080", value_name = "ADDR")]
    pub addr: String,

    /// Directory to serve
    #[arg(short = 'd', default_value = ".", value_name = "DIR")]
    pub dir: PathBuf,

    /// Typographic language
    #[arg(short = 'l', default_value = "de", value_name = "LANG")]
    pub lang: String,

    /// Text with full justification
    #[arg(short = 'j')]
    pub justify: bool,

    /// Be quiet
    #[arg(short = 'q')]
    pub quiet: bool,
}

/// Immutable server configuration, built once at startup and shared
/// read-only by every request handler.
#[derive(Debug)]
pub struct ServerConfig {
    /// Absolute base directory, symlinks resolved.
    pub base_dir: PathBuf,
    pub listen_addr: String,
    /// Language code for the template and quote table, "de" or "en".
    pub lang: String,
    pub justify: bool,
    pub quiet: bool,
}

impl ServerConfig {
    pub fn from_args(args: Args) -> Result<Self, SetupError> {
        // A bare ":port" means localhost on that port.
        let listen_addr = if args.addr.starts_with(':') {
            format!("localhost{}", args.addr)
        } else {
            args.addr
        };

        let meta = fs::metadata(&args.dir)
            .map_err(|e| SetupError::DirectoryAccess(args.dir.clone(), e))?;
        if !meta.is_dir() {
            return Err(SetupError::NotADirectory(args.dir));
        }
        // Resolves symlinks and yields an absolute path, so the prefix
        // guarantee in resolve::join_base holds against the real tree.
        let base_dir = fs::canonicalize(&args.dir)
            .map_err(|e| SetupError::DirectoryAccess(args.dir.clone(), e))?;

        let lang = if args.lang == "de" { "de" } else { "en" }.to_string();

        Ok(ServerConfig {
            base_dir,
            listen_addr,
            lang,
            justify: args.justify,
            quiet: args.quiet,
        })
    }
}
