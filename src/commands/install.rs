use crate::ui;
use anyhow::Result;
use brewsmith::{Config, Error, Formula, Installer};
use colored::Colorize;
use std::future::Future;
use std::path::Path;

/// Race a pipeline future against Ctrl-C.
///
/// Dropping the losing future runs its cleanup: the work directory and any
/// partial keg are removed and build subprocesses are killed.
async fn interruptible<T>(
    installer: &Installer,
    work: impl Future<Output = brewsmith::Result<T>>,
) -> brewsmith::Result<T> {
    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Interrupted(installer.current_stage())),
    }
}

fn installer_for(config: Config, formula: &Formula) -> Installer {
    let name = formula.name.clone();
    let version = formula.version.clone();
    Installer::new(config)
        .with_progress(ui::show_progress())
        .on_stage(move |stage| ui::stage_line(stage, &name, &version))
}

pub async fn install(config: Config, recipe: &Path, force: bool) -> Result<()> {
    let formula = Formula::from_path(recipe)?;
    let installer = installer_for(config, &formula);

    let outcome = interruptible(&installer, installer.install(&formula, force)).await?;

    ui::success(&format!(
        "Installed {} {} ({} files, {}) into {}",
        formula.name.bold().green(),
        formula.version.dimmed(),
        outcome.files.to_string().bold(),
        outcome.build_system.name(),
        outcome.prefix.display().to_string().cyan()
    ));
    Ok(())
}

pub async fn test(config: Config, recipe: &Path, verbose: bool) -> Result<()> {
    let formula = Formula::from_path(recipe)?;
    let installer = installer_for(config, &formula);

    let outcome = interruptible(&installer, installer.run_test(&formula)).await?;
    let output = outcome.into_result()?;

    if verbose && !output.trim().is_empty() {
        println!("{}", output.trim_end());
    }
    ui::success(&format!(
        "{} {} passed its test",
        formula.name.bold().green(),
        formula.version.dimmed()
    ));
    Ok(())
}

pub async fn fetch(config: Config, recipe: &Path) -> Result<()> {
    let formula = Formula::from_path(recipe)?;
    let installer = installer_for(config, &formula);

    let bytes = interruptible(&installer, installer.fetch(&formula)).await?;

    ui::success(&format!(
        "Downloaded {} ({} bytes), {}",
        formula.url.to_string().cyan(),
        bytes.len(),
        formula.checksum.to_string().dimmed()
    ));
    Ok(())
}

/// Report a failed command with its stage tag and any captured output
pub fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<Error>() {
        Some(err) => {
            ui::failure(err.stage(), &err.to_string());
            if let Some(output) = err.captured_output()
                && !output.trim().is_empty()
            {
                eprintln!("{}", output.trim_end());
            }
        }
        None => eprintln!("{} {:#}", "Error:".red().bold(), err),
    }
}
