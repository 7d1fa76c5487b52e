use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use scripture_api_backend::logger;
use scripture_api_cli::generate;

#[derive(Parser)]
#[command(name = "scripture-api-cli")]
#[command(about = "Generate a static JSON API tree from USFM / USX scripture files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read input envelope files and write the generated API tree
    Generate {
        /// Directory containing *.json input envelope files
        input_dir: PathBuf,
        /// Directory to write the generated tree into
        output_dir: PathBuf,
        /// Use book common names (spaces as underscores) for URL path segments
        #[arg(long)]
        use_common_name: bool,
        /// Abort on the first failing input file instead of skipping it
        #[arg(long)]
        strict: bool,
    },
}

fn main() {
    dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate {
            input_dir,
            output_dir,
            use_common_name,
            strict,
        } => match generate::run(&input_dir, &output_dir, use_common_name, strict) {
            Ok(summary) => {
                println!(
                    "Processed {} files, parsed {} books, {} errors; wrote {} API files.",
                    summary.stats.files_processed,
                    summary.stats.books_parsed,
                    summary.stats.errors,
                    summary.files_written
                );
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                exit(1);
            }
        },
    }
}
