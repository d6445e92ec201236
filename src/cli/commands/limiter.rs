//! Login throttle command handlers

use chrono::Utc;

use super::open_store;
use crate::config::Config;
use crate::entities::login_attempts::Model as LoginAttempt;
use crate::services::{LimiterPolicy, LoginLimiter};

async fn limiter(config: &Config) -> anyhow::Result<LoginLimiter> {
    let store = open_store(config).await?;
    Ok(LoginLimiter::new(
        store.login_attempts().clone(),
        LimiterPolicy::from(&config.security.login_throttle),
    ))
}

fn print_entry(entry: &LoginAttempt) {
    let now = Utc::now();
    let state = match entry.blocked_until {
        Some(until) if until > now => format!("blocked until {}", until.format("%H:%M:%S")),
        Some(_) => "block expired".to_string(),
        None => "tracking".to_string(),
    };

    println!(
        "{:<40} {:>3} failures  last {}  {}",
        entry.address,
        entry.attempts,
        entry.last_attempt.format("%Y-%m-%d %H:%M:%S"),
        state
    );
}

pub async fn cmd_limiter_status(config: &Config, address: Option<&str>) -> anyhow::Result<()> {
    let limiter = limiter(config).await?;

    if let Some(address) = address {
        match limiter.status(address).await? {
            Some(entry) => print_entry(&entry),
            None => println!("{address}: no recorded failures"),
        }
        return Ok(());
    }

    let entries = limiter.list().await?;
    if entries.is_empty() {
        println!("No tracked addresses.");
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }

    Ok(())
}

pub async fn cmd_limiter_clear(config: &Config, address: &str) -> anyhow::Result<()> {
    let limiter = limiter(config).await?;

    if limiter.record_success(address).await? {
        println!("Cleared {address}");
    } else {
        println!("{address} was not tracked");
    }

    Ok(())
}

pub async fn cmd_limiter_cleanup(config: &Config) -> anyhow::Result<()> {
    let removed = limiter(config).await?.cleanup().await?;
    println!("Removed {removed} stale entries");
    Ok(())
}
