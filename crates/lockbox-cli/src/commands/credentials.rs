//! Credential commands: `init`, `list`, `add`, `get`, `remove`, `describe`.

use lockbox_core::Config;

use crate::session::{self, Opened};

/// Create an empty store if none exists.
pub fn init(config: &Config) -> anyhow::Result<()> {
    let (ctx, opened) = session::open(config, None)?;
    match opened {
        Opened::Created => println!("Initialized empty store."),
        Opened::Loaded(count) => println!("Store already exists ({count} credential(s))."),
    }
    ctx.close();
    Ok(())
}

/// Credential names in byte-wise order.
pub fn names(config: &Config) -> anyhow::Result<Vec<String>> {
    let (mut ctx, _) = session::open(config, None)?;
    ctx.sort()?;

    let mut names = Vec::with_capacity(ctx.count()?);
    ctx.each_credential(|credential| {
        names.push(credential.name().to_string());
        Ok(())
    })?;
    Ok(names)
}

pub fn list(config: &Config) -> anyhow::Result<()> {
    let names = names(config)?;
    if names.is_empty() {
        println!("No credentials stored.");
        return Ok(());
    }

    for name in &names {
        println!("{name}");
    }
    println!("\n{} credential(s) total.", names.len());
    Ok(())
}

pub fn add(
    config: &Config,
    name: &str,
    description: &str,
    value: Option<String>,
) -> anyhow::Result<()> {
    let key = session::resolve_key()?;
    let value = match value {
        Some(v) => v,
        None => rpassword::prompt_password(format!("Enter value for '{name}': "))
            .map_err(|e| anyhow::anyhow!("Failed to read value: {}", e))?,
    };
    if value.is_empty() {
        anyhow::bail!("Credential value must not be empty");
    }

    let (mut ctx, _) = session::open(config, Some(key))?;
    ctx.store(name, description, value.as_bytes())?;
    session::save(&mut ctx)?;

    println!("Credential '{}' stored.", name);
    Ok(())
}

pub fn get(config: &Config, name: &str) -> anyhow::Result<()> {
    let key = session::resolve_key()?;
    let (ctx, _) = session::open(config, Some(key))?;

    let secret = ctx.reveal(name)?;
    println!("{}", secret.expose_secret());
    Ok(())
}

pub fn remove(config: &Config, name: &str) -> anyhow::Result<()> {
    let (mut ctx, _) = session::open(config, None)?;
    ctx.remove(name)?;
    session::save(&mut ctx)?;

    println!("Credential '{}' removed.", name);
    Ok(())
}

pub fn describe(config: &Config, name: &str, description: &str) -> anyhow::Result<()> {
    let (mut ctx, _) = session::open(config, None)?;
    ctx.update_description(name, description)?;
    session::save(&mut ctx)?;

    println!("Updated description of '{}'.", name);
    Ok(())
}
