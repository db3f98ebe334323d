//! Config command - print the effective configuration

use anyhow::Result;
use tscl_config::Config;

/// Print the validated configuration; the password is redacted by `Debug`
pub fn run(config: &Config) -> Result<()> {
    println!("connection: {}", config.database.redacted());
    println!("{config:#?}");
    Ok(())
}
