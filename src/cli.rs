use clap::Parser;
use skycache_config::Overrides;
use std::path::PathBuf;

/// Edge cache and reverse proxy for streamed game assets.
///
/// Every option can also be set in the config file or the environment;
/// flags given here win.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Config file (TOML). Defaults to config.toml in the platform config dir.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Server port
    #[arg(long)]
    pub port: Option<u16>,
    /// HTTP basic auth username
    #[arg(long)]
    pub login: Option<String>,
    /// HTTP basic auth password
    #[arg(long)]
    pub password: Option<String>,
    /// Origin base URL
    #[arg(long, value_name = "URL")]
    pub cdn: Option<String>,
    /// Asset cache directory (defaults to the system temp dir)
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
    /// Download every known asset into the cache, then exit
    #[arg(long)]
    pub download: bool,
    /// Download every known asset into the cache in the background
    #[arg(long)]
    pub download_cache: bool,
    /// Number of parallel download workers
    #[arg(long)]
    pub workers: Option<usize>,
    /// Asset manifest, one path per line, instead of the bundled one
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            login: self.login.clone(),
            password: self.password.clone(),
            cdn: self.cdn.clone(),
            dir: self.dir.clone(),
            workers: self.workers,
            download: self.download,
            download_cache: self.download_cache,
            manifest: self.manifest.clone(),
        }
    }
}
