use std::env;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::SyncError;
use crate::positions::SortKey;

/// Everything the tool reads from the environment, validated up front so a
/// bad value fails before any remote call is made.
#[derive(Debug, Clone)]
pub struct Config {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub sheet_token: String,
    pub domain: String,
    pub api_key: String,
    pub items_order: SortKey,
    pub default_account: i64,
    pub default_tax: Option<i64>,
    pub default_category: i64,
    pub unit_filter: String,
    pub language: String,
    pub due_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, SyncError> {
        Ok(Self {
            spreadsheet_id: required("SPREADSHEET_ID")?,
            sheet_name: optional("GOOGLE_SHEET_NAME", "Rechnungen"),
            sheet_token: required("GOOGLE_ACCESS_TOKEN")?,
            domain: valid_domain(required("CASHCTRL_DOMAINID")?)?,
            api_key: required("CASHCTRL_APIKEY")?,
            items_order: SortKey::parse(&optional(
                "CASHCTRL_ITEMS_ORDER",
                "client",
            ))?,
            default_account: number("CASHCTRL_DEFAULT_ACCOUNT")?,
            default_tax: maybe_number("CASHCTRL_DEFAULT_TAX")?,
            default_category: maybe_number("CASHCTRL_DEFAULT_CATEGORY")?
                .unwrap_or(4),
            unit_filter: optional("CASHCTRL_UNIT_FILTER", "Std"),
            language: optional("LANGUAGE", "de"),
            due_days: maybe_number("CASHCTRL_DUE_DAYS")?.unwrap_or(10),
        })
    }
}

fn required(key: &str) -> Result<String, SyncError> {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SyncError::MissingConfig {
            key: key.to_string(),
        })
}

fn optional(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn number(key: &str) -> Result<i64, SyncError> {
    parse_number(key, required(key)?)
}

fn maybe_number(key: &str) -> Result<Option<i64>, SyncError> {
    match env::var(key).ok().filter(|value| !value.is_empty()) {
        Some(value) => Ok(Some(parse_number(key, value)?)),
        None => Ok(None),
    }
}

fn parse_number(key: &str, value: String) -> Result<i64, SyncError> {
    value.parse().map_err(|_| SyncError::BadConfig {
        key: key.to_string(),
        value,
    })
}

/// The accounting subdomain becomes part of a URL, so it is restricted to
/// alphanumerics.
fn valid_domain(domain: String) -> Result<String, SyncError> {
    if !domain.is_empty() && domain.chars().all(|c| c.is_ascii_alphanumeric())
    {
        Ok(domain)
    } else {
        Err(SyncError::BadConfig {
            key: "CASHCTRL_DOMAINID".to_string(),
            value: domain,
        })
    }
}

/// Loads `KEY=value` lines into the process environment without touching
/// variables that are already set. A missing file is fine.
pub fn load_env_file(path: &Path) -> io::Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return Ok(())
        }
        Err(error) => return Err(error),
    };

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if env::var_os(key).is_none() {
                env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// Rewrites (or appends) one `KEY=value` line of an env file, creating the
/// file when missing. Used to persist answers to first-run prompts.
pub fn update_env_file(
    path: &Path,
    key: &str,
    value: &str,
) -> io::Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            String::new()
        }
        Err(error) => return Err(error),
    };

    let mut lines: Vec<String> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect();
    let entry = format!("{}={}", key, value);
    match lines
        .iter_mut()
        .find(|line| line.starts_with(&format!("{}=", key)))
    {
        Some(line) => *line = entry,
        None => lines.push(entry),
    }

    fs::write(path, lines.join("\n") + "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_restricted_to_alphanumerics() {
        assert!(valid_domain("mycompanyltd".to_string()).is_ok());
        assert!(valid_domain("my.company".to_string()).is_err());
        assert!(valid_domain(String::new()).is_err());
    }

    #[test]
    fn env_file_updates_in_place() -> io::Result<()> {
        let dir = env::temp_dir().join("billsync-config-test");
        fs::create_dir_all(&dir)?;
        let path = dir.join(".env");
        fs::write(&path, "LANGUAGE=de\nCASHCTRL_APIKEY=old\n")?;

        update_env_file(&path, "CASHCTRL_APIKEY", "new")?;
        update_env_file(&path, "SPREADSHEET_ID", "abc")?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(
            content,
            "LANGUAGE=de\nCASHCTRL_APIKEY=new\nSPREADSHEET_ID=abc\n"
        );
        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(matches!(
            parse_number("CASHCTRL_DEFAULT_ACCOUNT", "12x".to_string()),
            Err(SyncError::BadConfig { .. })
        ));
        assert_eq!(
            parse_number("CASHCTRL_DEFAULT_ACCOUNT", "12".to_string())
                .unwrap(),
            12
        );
    }
}
