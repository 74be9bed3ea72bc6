use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;

use aurora_compiler_core::driver;

/// Aurora ahead-of-time compiler.
///
/// Compiles one source file to a verified, textual SSA module. Producing a
/// native object from that module is the back-end's job; `aurorac` stops at
/// the IR contract.
#[derive(Debug, Parser)]
#[command(name = "aurorac", author, version, about)]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Output path for the compiled module
    #[arg(short = 'o', value_name = "FILE")]
    output: PathBuf,

    /// Also write the textual IR to this path
    #[arg(long = "emit-ll", value_name = "FILE")]
    emit_ll: Option<PathBuf>,

    /// Log pipeline stages to stderr
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aurora_compiler_core=debug")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let name = cli.input.display().to_string();
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("could not read `{}`", cli.input.display()))?;

    let compiled = match driver::compile(&name, &source) {
        Ok(compiled) => compiled,
        Err(error) => {
            eprintln!("{}", driver::render_error(&name, &source, error));
            process::exit(1);
        }
    };

    let rendered = compiled.module.to_string();
    fs::write(&cli.output, &rendered)
        .with_context(|| format!("could not write `{}`", cli.output.display()))?;
    if let Some(path) = &cli.emit_ll {
        fs::write(path, &rendered)
            .with_context(|| format!("could not write `{}`", path.display()))?;
    }
    Ok(())
}
