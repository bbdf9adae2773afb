// src/prompt.rs

//! Interactive credential collection.

use color_eyre::eyre::{Result, WrapErr};
use dialoguer::{Input, Password};

use crate::core::models::Credentials;

pub const PASSWORD_ENV: &str = "NESSUS_PASSWORD";

/// Resolves the username (flag/env, else prompt) and password (env, else no-echo prompt).
pub fn credentials(username: Option<String>) -> Result<Credentials> {
    let username = match given_username(username) {
        Some(u) => u,
        None => Input::<String>::new()
            .with_prompt("Nessus username")
            .validate_with(|input: &String| -> Result<(), &'static str> {
                if input.trim().is_empty() { Err("a username is required") } else { Ok(()) }
            })
            .interact_text()
            .wrap_err("could not read username")?
            .trim()
            .to_string(),
    };

    let password = match given_password(std::env::var(PASSWORD_ENV).ok()) {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Nessus password")
            .interact()
            .wrap_err("could not read password")?,
    };

    Ok(Credentials::new(username, password))
}

fn given_username(username: Option<String>) -> Option<String> {
    username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

// Passwords are taken verbatim; surrounding spaces may be part of them.
fn given_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}
