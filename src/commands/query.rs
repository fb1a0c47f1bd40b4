use anyhow::Result;
use brewsmith::{Config, Formula, cellar};
use colored::Colorize;
use std::path::Path;

pub fn info(config: &Config, recipe: &Path) -> Result<()> {
    let formula = Formula::from_path(recipe)?;
    let prefix = std::path::absolute(config.keg_path(&formula.name, &formula.version))?;

    println!(
        "{}",
        format!("==> {} {}", formula.name, formula.version).bold().green()
    );
    if !formula.desc.is_empty() {
        println!("{}", formula.desc);
    }
    if !formula.homepage.is_empty() {
        println!("{}: {}", "Homepage".bold(), formula.homepage);
    }
    println!("{}: {}", "Source".bold(), formula.url);
    println!("{}: {}", "Checksum".bold(), formula.checksum);
    println!("{}: {}", "Build system".bold(), formula.build.system.name());
    if !formula.build.flags.is_empty() {
        println!("{}: {}", "Build flags".bold(), formula.build.flags.join(" "));
    }
    if !formula.build.dependencies.is_empty() {
        println!(
            "{}: {}",
            "Build dependencies".bold(),
            formula.build.dependencies.join(", ")
        );
    }
    if !formula.test_command.is_empty() {
        println!("{}: {}", "Test".bold(), formula.test_command.join(" "));
    }

    let installed = if prefix.is_dir() {
        "installed".green().to_string()
    } else {
        "not installed".dimmed().to_string()
    };
    println!(
        "{}: {} ({})",
        "Prefix".bold(),
        prefix.display().to_string().cyan(),
        installed
    );
    Ok(())
}

pub fn list(config: &Config) -> Result<()> {
    let kegs = cellar::list_installed(&config.prefix_base)?;

    if kegs.is_empty() {
        println!(
            "No kegs installed under {}",
            config.prefix_base.display().to_string().dimmed()
        );
        return Ok(());
    }

    for keg in &kegs {
        let detail = keg
            .receipt
            .as_ref()
            .map(|r| {
                format!(
                    "{} files, {}",
                    r.installed_files.len(),
                    r.installed_at().unwrap_or_default()
                )
            })
            .unwrap_or_else(|| "no receipt".to_string());
        println!(
            "{} {} {}",
            keg.name.bold(),
            keg.version.cyan(),
            format!("({})", detail).dimmed()
        );
    }
    Ok(())
}
