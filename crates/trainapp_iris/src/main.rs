//! `iris` command-line entry point.

use trainapp::App;
use trainapp_iris::IrisApp;

fn main() -> anyhow::Result<()> {
    IrisApp.cli()?.run()?;
    Ok(())
}
