//! conduit policy command

use super::load_core;
use clap::{Args, Subcommand};
use conduit::ConduitCore;
use console::style;
use shared::{Address, Permission, Role};
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct PolicyCommand {
    #[command(subcommand)]
    pub command: PolicySubcommand,
}

#[derive(Debug, Subcommand)]
pub enum PolicySubcommand {
    /// Show roles and permissions held by an account
    Check {
        /// Deployment config (YAML or JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Account address (0x-prefixed)
        #[arg(short, long)]
        account: String,
    },
    /// List all roles with their default admin role
    Roles,
}

/// Roles and permissions of one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPolicy {
    pub account: Address,
    pub roles: Vec<Role>,
    pub agent_type: Option<String>,
    pub permissions: Vec<Permission>,
    pub can_manage: bool,
    pub can_execute: bool,
}

impl AccountPolicy {
    pub fn resolve(core: &ConduitCore, account: Address) -> anyhow::Result<Self> {
        let roles = core.access().roles_of(&account)?;
        let agent = core.agents().get_agent(&account).ok();
        let permissions = Permission::ALL
            .iter()
            .copied()
            .filter(|p| core.agents().has_permission(&account, *p))
            .collect();

        Ok(Self {
            account,
            roles,
            agent_type: agent.map(|a| a.agent_type),
            permissions,
            can_manage: core.router().can_manage(&account),
            can_execute: core.router().can_execute(&account),
        })
    }
}

impl PolicyCommand {
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.command {
            PolicySubcommand::Check { config, account } => {
                let account: Address = account.parse()?;
                let (_, core) = load_core(config)?;
                let policy = AccountPolicy::resolve(&core, account)?;
                print_policy(&policy);
            }
            PolicySubcommand::Roles => {
                println!("{}", style("Available roles:").bold());
                for role in Role::ALL {
                    println!(
                        "  {:<16} admin: {:<16} id: {}",
                        style(role.name()).cyan(),
                        role.default_admin().name(),
                        role.id()
                    );
                }
            }
        }
        Ok(())
    }
}

fn print_policy(policy: &AccountPolicy) {
    fn names<T: std::fmt::Display>(items: &[T]) -> String {
        if items.is_empty() {
            return "(none)".to_string();
        }
        items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
    }

    println!("{} {}", style("Account").bold(), policy.account);
    println!("  roles:       {}", names(&policy.roles));
    match &policy.agent_type {
        Some(agent_type) => println!("  agent:       {}", agent_type),
        None => println!("  agent:       {}", style("not registered").dim()),
    }
    println!("  permissions: {}", names(&policy.permissions));
    println!("  manage:      {}", yes_no(policy.can_manage));
    println!("  execute:     {}", yes_no(policy.can_execute));
}

fn yes_no(value: bool) -> console::StyledObject<&'static str> {
    if value {
        style("yes").green()
    } else {
        style("no").red()
    }
}
