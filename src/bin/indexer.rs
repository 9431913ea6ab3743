//! indexer — build a semantic type index for C sources.

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use cindex::{compdb, exit, open_durable, open_nop, stdio, Indexer, DEFAULT_DB_PATH};

/// Build a semantic type index for C sources
#[derive(Parser, Debug)]
#[command(
    name = "indexer",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_DATE"), ")"),
    about,
    group(clap::ArgGroup::new("input").required(true).args(["source", "compdb_dir"])),
    after_long_help = r#"WHAT IT DOES:
  Parses each translation unit (the source file plus its quoted includes),
  records struct/union/enum definitions, the typenames referring to them,
  their members, and type uses, and writes everything into a relational
  database that the 'query' tool reads.

EXAMPLES:
  Single source:        indexer -s module.c
  Compile commands:     indexer -d build/
  Custom output:        indexer -s module.c -o project.db
  Dry run:              indexer -s module.c -n
"#
)]
struct Cli {
    /// Index a single C source file
    #[arg(short = 's', long = "source", value_name = "SRC")]
    source: Option<PathBuf>,

    /// Index every entry of the compile_commands.json in this directory
    #[arg(short = 'd', long = "compdb", value_name = "COMPDB_DIR")]
    compdb_dir: Option<PathBuf>,

    /// Output database path
    #[arg(short = 'o', long = "output", value_name = "OUT", default_value = DEFAULT_DB_PATH)]
    output: PathBuf,

    /// Dry run: walk everything, persist nothing
    #[arg(short = 'n', long = "dry-run")]
    dry_run: bool,
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    stdio::secure_standard_fds();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
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

    let mut store = if cli.dry_run {
        open_nop()
    } else {
        match open_durable(&cli.output, false) {
            Ok(store) => store,
            Err(e) => {
                eprintln!("indexer: cannot open {}: {}", cli.output.display(), e);
                return exit::CANTCREAT;
            }
        }
    };

    let result = (|| {
        let mut indexer = Indexer::new(&mut *store)?;
        if let Some(dir) = &cli.compdb_dir {
            indexer.index_compile_commands(dir)
        } else {
            let source = cli.source.as_deref().expect("clap enforces the input group");
            let args = compdb::default_args();
            let include_dirs = compdb::include_dirs_from(&args, source.parent());
            indexer.index_file(source, &include_dirs)
        }
    })();

    if let Err(e) = result {
        eprintln!("indexer: {e}");
        return e.exit_code();
    }

    if let Err(e) = store.close() {
        eprintln!("indexer: closing {}: {}", cli.output.display(), e);
        return e.exit_code();
    }

    if cli.dry_run {
        info!("dry run complete, nothing persisted");
    } else {
        info!(db = %cli.output.display(), "index written");
    }
    exit::OK
}
