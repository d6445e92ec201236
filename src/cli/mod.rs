//! CLI module - Command-line interface for folio
//!
//! This module provides a structured CLI using clap for argument parsing.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::entities::Role;

/// folio - portfolio site server with a small admin area
#[derive(Parser)]
#[command(name = "folio")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the site and admin API (default)
    Serve,

    /// Write a default config.toml with a fresh token secret
    Init,

    /// Manage admin users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Inspect or reset login throttling
    Limiter {
        #[command(subcommand)]
        command: LimiterCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user
    Add {
        username: String,
        #[arg(long, value_enum, default_value = "admin")]
        role: RoleArg,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Set a user's password and revoke their sessions
    Passwd {
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// List users
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand)]
pub enum LimiterCommands {
    /// Show the throttle entry for an address, or all entries
    Status { address: Option<String> },

    /// Forget an address, lifting any block
    Clear { address: String },

    /// Prune stale entries now
    Cleanup,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RoleArg {
    Admin,
    User,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::User => Self::User,
        }
    }
}
