//! query — read a type index built by `indexer`.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;

use cindex::{exit, open_durable, query, stdio, IndexError};

/// Query a semantic type index
#[derive(Parser, Debug)]
#[command(
    name = "query",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_DATE"), ")"),
    about,
    after_long_help = r#"COMMANDS (via -c):
  td|typedecl ID                        declaration site of a type by id
  td|typedecl [struct|union|enum] NAME  declaration site of a type by name
  tn|typename [struct|union|enum] NAME  all matching typenames (LIKE wildcards)
  md|memberdecl (ID | [struct|union|enum] NAME) MEMBER
                                        a member's declaration site

EXAMPLES:
  query -c 'td struct foo' cf.db
  query -c 'tn %_t' cf.db
  query -c 'md list next' cf.db
"#
)]
struct Cli {
    /// Execute one command and exit
    #[arg(short = 'c', long = "command", value_name = "CMD", conflicts_with = "interactive")]
    command: Option<String>,

    /// Interactive mode (reserved)
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,

    /// Path to the index database
    #[arg(value_name = "DB_PATH")]
    db_path: PathBuf,
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    stdio::secure_standard_fds();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    exit::OK
                }
                _ => exit::USAGE,
            };
        }
    };

    if cli.interactive {
        let err = IndexError::Unimplemented("interactive mode");
        eprintln!("query: {err}");
        return err.exit_code();
    }

    let Some(command) = cli.command else {
        eprintln!("query: one of -c or -i is required");
        return exit::USAGE;
    };

    let mut store = match open_durable(&cli.db_path, true) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("query: cannot open {}: {}", cli.db_path.display(), e);
            return e.exit_code();
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let result = query::run_command(&mut *store, &command, &mut out);
    let _ = out.flush();

    match result {
        Ok(()) => exit::OK,
        // Already reported on stdout in the user-facing format.
        Err(e @ (IndexError::NotFound | IndexError::Ambiguous)) => e.exit_code(),
        Err(e) => {
            eprintln!("query: {} (code {})", e, e.exit_code());
            e.exit_code()
        }
    }
}
