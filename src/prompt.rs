//! Interactive startup prompts: chatterbot choice and account secrets.

use std::io::{BufRead, IsTerminal};

use dialoguer::{Input, Password, Select};
use serde::Deserialize;

use crate::chatterbot::Provider;

/// Bot id offered by default when Pandorabots is picked interactively.
const DEFAULT_PANDORABOTS_ID: &str = "b0dafd24ee35a477";

/// How a secret is read from the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEntry {
    /// Masked when stdin is a terminal, visible otherwise.
    #[default]
    Auto,
    Masked,
    /// Echoed back. For consoles that cannot hide input.
    Visible,
}

impl SecretEntry {
    /// Settle `Auto` against the current stdin.
    pub fn resolve(self, stdin_is_terminal: bool) -> SecretEntry {
        match self {
            SecretEntry::Auto if stdin_is_terminal => SecretEntry::Masked,
            SecretEntry::Auto => SecretEntry::Visible,
            other => other,
        }
    }
}

/// Ask which chatterbot to use.
pub fn provider() -> dialoguer::Result<Provider> {
    let choice = Select::new()
        .with_prompt("Which chatterbot should answer?")
        .items(&["Cleverbot", "Pandorabots", "Jabberwacky"])
        .default(0)
        .interact()?;

    Ok(match choice {
        1 => {
            let bot_id: String = Input::new()
                .with_prompt("Pandorabots bot id")
                .default(DEFAULT_PANDORABOTS_ID.to_string())
                .interact_text()?;
            Provider::Pandorabots { bot_id }
        }
        2 => Provider::Jabberwacky,
        _ => Provider::Cleverbot,
    })
}

/// Read a secret such as an account token.
pub fn secret(prompt: &str, entry: SecretEntry) -> std::io::Result<String> {
    let stdin = std::io::stdin();
    let is_terminal = stdin.is_terminal();

    match entry.resolve(is_terminal) {
        SecretEntry::Masked => Password::new()
            .with_prompt(prompt)
            .interact()
            .map_err(std::io::Error::other),
        _ => {
            for _ in 0..3 {
                eprintln!("WARNING: {} WILL BE SHOWN ON SCREEN", prompt.to_uppercase());
            }
            if is_terminal {
                Input::<String>::new()
                    .with_prompt(prompt)
                    .interact_text()
                    .map_err(std::io::Error::other)
            } else {
                let mut line = String::new();
                stdin.lock().read_line(&mut line)?;
                Ok(line.trim().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_follows_terminal() {
        assert_eq!(SecretEntry::Auto.resolve(true), SecretEntry::Masked);
        assert_eq!(SecretEntry::Auto.resolve(false), SecretEntry::Visible);
    }

    #[test]
    fn test_explicit_modes_are_kept() {
        assert_eq!(SecretEntry::Visible.resolve(true), SecretEntry::Visible);
        assert_eq!(SecretEntry::Masked.resolve(false), SecretEntry::Masked);
    }

    #[test]
    fn test_config_names() {
        let e: SecretEntry = serde_json::from_str(r#""visible""#).unwrap();
        assert_eq!(e, SecretEntry::Visible);
    }
}
