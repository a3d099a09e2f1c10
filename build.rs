//! Build script for generating the `crrunner` man pages.
//!
//! Packaging picks the pages up from the build output directory: one for the
//! top-level command and one per subcommand.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

fn render(man: &Man, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = BufWriter::new(File::create(path)?);
    man.render(&mut file)?;
    file.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir =
        PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
        })?);

    let command = Cli::command();
    for sub in command.get_subcommands() {
        let name = format!("crrunner-{}", sub.get_name());
        let man = Man::new(sub.clone()).title(name.to_uppercase());
        render(&man, &out_dir.join(format!("{name}.1")))?;
    }
    render(&Man::new(command), &out_dir.join("crrunner.1"))?;

    Ok(())
}
