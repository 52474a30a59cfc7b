use std::path::{Path, PathBuf};

use anyhow::Context;
use bitasm::{AssemblerOutput, bits};
use clap::{Parser, Subcommand, ValueEnum, command};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Assemble a `.s` file")]
    Assemble {
        /// `.s` file to assemble
        file: PathBuf,
        /// Where to write the program; defaults to `<stem>.o` in the current directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Format::Bin)]
        format: Format,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Packed big-endian bytes
    Bin,
    /// One string of `0`s and `1`s per word
    Text,
    /// One hex word per line
    Hex,
    /// The full listing, with labels, defines and warnings
    Json,
}

fn render(output: &AssemblerOutput, format: Format) -> anyhow::Result<Vec<u8>> {
    let lines = |encode: fn(&bits::Bits) -> String| {
        output
            .words
            .iter()
            .map(|word| encode(&word.bits) + "\n")
            .collect::<String>()
            .into_bytes()
    };
    Ok(match format {
        Format::Bin => output.to_bytes(),
        Format::Text => lines(|word: &bits::Bits| bits::to_bin(word)),
        Format::Hex => lines(|word: &bits::Bits| bits::to_hex(word)),
        Format::Json => serde_json::to_vec_pretty(output)?,
    })
}

/// `dir/prog.s` becomes `prog.o`, relative to the working directory.
fn default_output(file: &Path) -> anyhow::Result<PathBuf> {
    let mut name = file
        .file_stem()
        .with_context(|| format!("{} does not name a file", file.display()))?
        .to_owned();
    name.push(".o");
    Ok(PathBuf::from(name))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Assemble {
            file,
            output,
            format,
        } => {
            let src = std::fs::read_to_string(&file)
                .with_context(|| format!("could not read {}", file.display()))?;
            let assembled = bitasm::assemble(&src, Some(&file.display().to_string()))
                .map_err(|err| anyhow::anyhow!("{err}"))?;
            for warning in assembled.warnings() {
                eprintln!("{warning}");
            }

            let output = match output {
                Some(output) => output,
                None => default_output(&file)?,
            };
            std::fs::write(&output, render(&assembled, format)?)
                .with_context(|| format!("could not write {}", output.display()))?;
            log::info!(
                "assembled {} words into {}",
                assembled.words.len(),
                output.display()
            );
            Ok(())
        }
    }
}
