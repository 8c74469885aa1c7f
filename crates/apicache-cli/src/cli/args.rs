use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "apicache",
    version,
    about = "Cached remote-data client: GET caching with per-call freshness, sandboxed relay"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// SQLite cache database (default: platform cache dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// YAML config file; environment variables are used when absent
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL for relative request URLs
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Relay network I/O through an in-process bridge host
    #[arg(long, global = true)]
    pub sandboxed: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// GET a URL, served from cache while fresh
    Get(GetArgs),
    /// POST a JSON body (never cached)
    Post(BodyArgs),
    /// PUT a JSON body (never cached)
    Put(BodyArgs),
    /// DELETE a URL (never cached)
    Delete(DeleteArgs),
    /// Drop cached responses for a URL, or all of them
    ClearCache(ClearCacheArgs),
    /// List cached entries
    List,
    /// Summarize cache contents
    Stats(StatsArgs),
    /// Write the cache to a JSON file
    Export(FileArgs),
    /// Replace the cache with a JSON export
    Import(FileArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GetArgs {
    pub url: String,

    /// Skip the cache for this call
    #[arg(long)]
    pub no_cache: bool,

    /// Freshness window in minutes
    #[arg(long)]
    pub ttl_minutes: Option<u64>,

    /// Request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct BodyArgs {
    pub url: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    pub url: String,

    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

#[derive(Args, Debug, Clone)]
pub struct ClearCacheArgs {
    /// Only entries for this URL
    pub url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Freshness window used to count fresh/stale entries
    #[arg(long)]
    pub ttl_minutes: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct FileArgs {
    pub file: PathBuf,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in '{}'", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Accept: application/json").unwrap(),
            ("Accept".to_string(), "application/json".to_string())
        );
        assert_eq!(
            parse_header("x-token:a:b").unwrap(),
            ("x-token".to_string(), "a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(" : v").is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "apicache",
            "get",
            "/users",
            "--db",
            "/tmp/x.sqlite3",
            "--sandboxed",
            "-H",
            "a:1",
        ])
        .unwrap();
        assert!(cli.global.sandboxed);
        assert_eq!(cli.global.db, Some(PathBuf::from("/tmp/x.sqlite3")));
        match cli.cmd {
            Command::Get(args) => {
                assert_eq!(args.url, "/users");
                assert_eq!(args.headers, vec![("a".to_string(), "1".to_string())]);
            }
            _ => panic!("expected get"),
        }
    }
}
