//! Command-line definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldgate_core::PermissionGrant;

use crate::check::CheckMode;

#[derive(Debug, Parser)]
#[command(name = "fieldgate")]
#[command(about = "Inspect and administer dashboard UI permissions")]
#[command(version)]
pub struct Cli {
    /// Path to the client config file
    #[arg(long, global = true, env = "FIELDGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Check codenames (exits 1 when the aggregate is denied)
    Check {
        /// Granted if any codename is granted
        #[arg(long, conflicts_with = "all")]
        any: bool,

        /// Granted only if every codename is granted (the default)
        #[arg(long)]
        all: bool,

        /// Ask the bulk-check endpoint instead of resolving locally
        #[arg(long)]
        remote: bool,

        #[arg(required = true)]
        codenames: Vec<String>,
    },

    /// Print the loaded permission map
    Dump,

    /// Print the permission tree
    Tree {
        /// Show grants for this group
        #[arg(long = "group")]
        group_id: Option<i64>,
    },

    /// Print what a permission depends on and what requires it
    Deps { codename: String },

    /// Update a group's grants, e.g. `grant 4 holidays.approve=true`
    Grant {
        group_id: i64,

        #[arg(required = true, value_parser = parse_grant)]
        grants: Vec<PermissionGrant>,
    },

    /// Copy one group's grants onto another
    Copy { from_group_id: i64, to_group_id: i64 },

    /// Drop the cached session copy
    Clear,
}

impl CheckMode {
    pub fn from_flags(any: bool, all: bool) -> Self {
        if any && !all {
            Self::Any
        } else {
            Self::All
        }
    }
}

fn parse_grant(pair: &str) -> Result<PermissionGrant, String> {
    let (codename, value) = pair
        .rsplit_once('=')
        .ok_or_else(|| format!("expected <codename>=<true|false>, got {:?}", pair))?;
    if codename.is_empty() {
        return Err(format!("missing codename in {:?}", pair));
    }
    let is_granted = value
        .parse::<bool>()
        .map_err(|_| format!("expected true or false after '=', got {:?}", value))?;
    Ok(PermissionGrant::new(codename, is_granted))
}
