use crate::error::CliError;
use serde::Serialize;
use std::path::Path;

pub fn to_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", to_json(value)?);
    Ok(())
}

pub async fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), CliError> {
    tokio::fs::write(path, to_json(value)?).await?;
    Ok(())
}
