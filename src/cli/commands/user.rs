//! User management command handlers

use anyhow::Context;
use std::io::{BufRead, Write};

use super::open_store;
use crate::api::validation::validate_username;
use crate::config::Config;
use crate::constants::limits::MIN_PASSWORD_LEN;
use crate::entities::Role;
use crate::state::build_credentials;

fn read_password(password: Option<String>) -> anyhow::Result<String> {
    let password = if let Some(password) = password {
        password
    } else {
        print!("Password: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        line.trim_end_matches(['\r', '\n']).to_string()
    };

    if password.len() < MIN_PASSWORD_LEN {
        anyhow::bail!("Password must be at least {MIN_PASSWORD_LEN} characters");
    }

    Ok(password)
}

pub async fn cmd_user_add(
    config: &Config,
    username: &str,
    role: Role,
    password: Option<String>,
) -> anyhow::Result<()> {
    validate_username(username)?;
    let password = read_password(password)?;

    let credentials = build_credentials(config, open_store(config).await?)?;
    let hash = credentials.hash_password(&password).await?;

    if credentials.create_user(username, &hash, role).await? {
        println!("Created {role} user '{username}'");
    } else {
        anyhow::bail!("User '{username}' already exists");
    }

    Ok(())
}

pub async fn cmd_user_passwd(
    config: &Config,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let credentials = build_credentials(config, open_store(config).await?)?;

    let user = credentials
        .get_user_by_username(username)
        .await?
        .with_context(|| format!("User '{username}' not found"))?;

    let password = read_password(password)?;
    let hash = credentials.hash_password(&password).await?;
    credentials.update_user_password(&user.id, &hash).await?;

    let revoked = credentials.remove_other_sessions(&user.id, None).await?;
    println!("Password updated for '{username}', {revoked} sessions revoked");

    Ok(())
}

pub async fn cmd_user_list(config: &Config) -> anyhow::Result<()> {
    let credentials = build_credentials(config, open_store(config).await?)?;
    let users = credentials.list_users().await?;

    if users.is_empty() {
        println!("No users yet. One administrator is created on first start.");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        let sessions = credentials.active_session_count(&user.id).await?;
        println!(
            "{:<24} {:<6} created {}  {} active sessions",
            user.username,
            user.role,
            user.created_at.format("%Y-%m-%d %H:%M"),
            sessions
        );
    }

    Ok(())
}
