mod client;
mod error;
mod serve;

use crate::client::Client;
use crate::error::{Error, ErrorKind, Result};
use clap::{Args, Parser, Subcommand};
use exn::ResultExt;
use fetchbox_config::{Config, Overrides};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "fetchbox=info,tower_http=info";

/// Register remote files and keep their content and metadata consistent.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "FETCHBOX_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Remote {
    /// Base URL of a running fetchbox server
    #[arg(id = "server", long = "server", env = "FETCHBOX_URL", default_value = "http://localhost:8080")]
    url: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// Directory downloaded content is stored in
        #[arg(long)]
        root: Option<PathBuf>,
        /// SQLite database file, or ":memory:"
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Ask the server to download and record a remote file
    Register {
        #[command(flatten)]
        remote: Remote,
        url: String,
    },
    /// Download a file's content
    Download {
        #[command(flatten)]
        remote: Remote,
        id: String,
        /// Where to write the content (defaults to the file's name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Set a file's description
    Describe {
        #[command(flatten)]
        remote: Remote,
        id: String,
        text: String,
    },
    /// Show a file's description
    Description {
        #[command(flatten)]
        remote: Remote,
        id: String,
    },
    /// Rename a file's content
    Rename {
        #[command(flatten)]
        remote: Remote,
        id: String,
        new_name: String,
    },
    /// Delete a file's content and record
    Delete {
        #[command(flatten)]
        remote: Remote,
        id: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// The configuration file to use: the one given, or the default one if it exists.
fn config_file(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| fetchbox_config::default_path().filter(|path| path.is_file()))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve { listen, root, database } => {
            let overrides = Overrides { listen, root, database };
            let file = config_file(cli.config);
            let config = Config::load_with(file.as_deref(), &overrides).or_raise(|| ErrorKind::Config)?;
            serve::serve(config).await
        },
        Command::Register { remote, url } => {
            println!("{}", Client::new(&remote.url)?.register(&url).await?);
            Ok(())
        },
        Command::Download { remote, id, output } => {
            let (path, size) = Client::new(&remote.url)?.download(&id, output.as_deref()).await?;
            println!("Wrote {size} bytes to {path}");
            Ok(())
        },
        Command::Describe { remote, id, text } => {
            println!("{}", Client::new(&remote.url)?.describe(&id, &text).await?);
            Ok(())
        },
        Command::Description { remote, id } => {
            println!("{}", Client::new(&remote.url)?.description(&id).await?);
            Ok(())
        },
        Command::Rename { remote, id, new_name } => {
            println!("{}", Client::new(&remote.url)?.rename(&id, &new_name).await?);
            Ok(())
        },
        Command::Delete { remote, id } => {
            println!("{}", Client::new(&remote.url)?.delete(&id).await?);
            Ok(())
        },
    }
}

fn report(err: Error) -> miette::Report {
    // Debug output carries the whole error tree with source locations.
    miette::miette!("{err:?}")
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    run(cli).await.map_err(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["fetchbox", "register", "http://example/a.png"], "http://localhost:8080")]
    #[case(&["fetchbox", "delete", "42", "--server", "http://10.0.0.1:9000"], "http://10.0.0.1:9000")]
    fn test_remote_commands(#[case] args: &[&str], #[case] server: &str) {
        let cli = Cli::try_parse_from(args).unwrap();
        let url = match cli.command {
            Command::Register { remote, .. } | Command::Delete { remote, .. } => remote.url,
            other => panic!("unexpected command {other:?}"),
        };
        assert_eq!(url, server);
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from([
            "fetchbox",
            "--config",
            "/etc/fetchbox.toml",
            "serve",
            "--listen",
            "127.0.0.1:9000",
            "--database",
            ":memory:",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/fetchbox.toml")));
        let Command::Serve { listen, root, database } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(listen, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(root, None);
        assert_eq!(database, Some(PathBuf::from(":memory:")));
    }

    #[test]
    fn test_explicit_config_file_wins() {
        let explicit = PathBuf::from("/somewhere/else.yaml");
        assert_eq!(config_file(Some(explicit.clone())), Some(explicit));
    }
}
