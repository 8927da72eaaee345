use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tower_lsp::{LspService, Server};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use ucx_server::{ServerOptions, UcxLanguageServer};

const DEFAULT_LOG_FILTER: &str = "ucx=info";

/// UnrealScript language server speaking LSP over stdio.
#[derive(Debug, Parser)]
#[command(name = "ucx-lsp", version, about)]
struct Args {
    /// Root of the native class library; every `*.uc` file below it is indexed
    #[arg(long)]
    library_path: Option<PathBuf>,

    /// Maximum number of open documents kept in memory
    #[arg(long, value_parser = parse_cache_size)]
    cache_size: Option<usize>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter directive, e.g. `ucx=debug` (defaults to RUST_LOG, then `ucx=info`)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn server_options(&self) -> ServerOptions {
        ServerOptions {
            library_path: self.library_path.clone(),
            cache_size: self.cache_size,
        }
    }
}

fn parse_cache_size(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("cache size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(e) => Err(e.to_string()),
    }
}

/// Install the global subscriber. Stdout carries the protocol, so logs go to
/// stderr or a file. The returned guard flushes the file writer on drop.
fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let filter = match &args.log_level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log level '{directive}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };

    let Some(path) = &args.log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("log file {} has no file name", path.display()))?;
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args)?;

    info!("Starting UCX language server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let options = args.server_options();
    let (service, socket) = LspService::new(|client| UcxLanguageServer::new(client, options));

    Server::new(stdin, stdout, socket).serve(service).await;

    info!("UCX language server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::parse_from([
            "ucx-lsp",
            "--library-path",
            "/opt/ut/Classes",
            "--cache-size",
            "25",
            "--log-level",
            "ucx=debug",
        ]);
        let options = args.server_options();
        assert_eq!(options.library_path, Some(PathBuf::from("/opt/ut/Classes")));
        assert_eq!(options.cache_size, Some(25));
        assert_eq!(args.log_level.as_deref(), Some("ucx=debug"));
        assert!(args.log_file.is_none());
    }

    #[test]
    fn test_zero_cache_size_is_rejected() {
        assert!(Args::try_parse_from(["ucx-lsp", "--cache-size", "0"]).is_err());
        assert!(Args::try_parse_from(["ucx-lsp", "--cache-size", "many"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let options = Args::parse_from(["ucx-lsp"]).server_options();
        assert!(options.library_path.is_none());
        assert!(options.cache_size.is_none());
    }
}
