//! Composes the bookstore stack and writes its template.
//!
//! ```bash
//! RUST_LOG=info bookstore-stack --region eu-west-1 --asset ./dist
//! bookstore-stack --stdout > bookstore.template.json
//! ```

use anyhow::Context;
use bookstore_stack::lifecycle::{BookstoreStack, StackSettings, DEFAULT_STACK_NAME};
use clap::Parser;
use iaac_framework::env::{ACCOUNT_VAR, REGION_VAR};
use iaac_framework::tracing::setup_tracing;
use iaac_framework::StackEnv;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "bookstore-stack", version, about = "Synthesize the bookstore CRUD API stack")]
struct Cli {
    /// Target account; the deployed stack resolves it when unset.
    #[arg(long, env = ACCOUNT_VAR)]
    account: Option<String>,

    /// Target region; the deployed stack resolves it when unset.
    #[arg(long, env = REGION_VAR)]
    region: Option<String>,

    /// Directory the template is written to.
    #[arg(long, env = "CDK_OUTDIR", default_value = "cdk.out")]
    out: PathBuf,

    #[arg(long, default_value = DEFAULT_STACK_NAME)]
    stack_name: String,

    /// Path of the prebuilt handler package.
    #[arg(long, default_value = ".")]
    asset: PathBuf,

    /// Print the template instead of writing it.
    #[arg(long)]
    stdout: bool,
}

impl Cli {
    fn settings(&self) -> StackSettings {
        let non_empty = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        StackSettings {
            stack_name: self.stack_name.clone(),
            env: StackEnv {
                account: non_empty(&self.account),
                region: non_empty(&self.region),
            },
            asset: self.asset.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let bookstore = BookstoreStack::assemble(cli.settings()).context("Failed to compose the bookstore stack")?;

    if cli.stdout {
        let template = bookstore.synth().context("Failed to synthesize")?;
        println!("{}", template.to_json_pretty()?);
    } else {
        let path = bookstore
            .synth_to(&cli.out)
            .with_context(|| format!("Failed to write template to {}", cli.out.display()))?;
        info!(path = %path.display(), "Done");
    }
    Ok(())
}
