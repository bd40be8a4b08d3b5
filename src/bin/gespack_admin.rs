//! Operator tool for schema migrations, sites and user accounts.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use gespack_api::{
    config, db,
    entities::user,
    services::users::{NewSite, NewUser, UserService},
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "gespack-admin", about = "GesPack administration tool", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,
    /// Register a new site (tenant)
    CreateSite(CreateSiteArgs),
    /// List every site
    ListSites,
    /// Create a user account with its site assignments
    CreateUser(CreateUserArgs),
    /// Give a user access to a site
    AssignSite(SiteAssignmentArgs),
    /// Remove a user's access to a site
    RevokeSite(SiteAssignmentArgs),
    /// Replace a user's password
    SetPassword(SetPasswordArgs),
    /// Disable a user account
    Deactivate(UsernameArgs),
    /// Re-enable a user account
    Activate(UsernameArgs),
}

#[derive(Args)]
struct CreateSiteArgs {
    #[arg(long)]
    code: String,
    #[arg(long)]
    name: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    User,
    Admin,
}

impl RoleArg {
    fn as_str(self) -> &'static str {
        match self {
            Self::User => user::ROLE_USER,
            Self::Admin => user::ROLE_ADMIN,
        }
    }
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    display_name: String,
    #[arg(long, env = "GESPACK_ADMIN_PASSWORD")]
    password: String,
    #[arg(long, value_enum, default_value = "user")]
    role: RoleArg,
    /// Site id, repeat for several sites
    #[arg(long = "site", action = ArgAction::Append)]
    sites: Vec<i32>,
}

#[derive(Args)]
struct SiteAssignmentArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    site: i32,
}

#[derive(Args)]
struct SetPasswordArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "GESPACK_ADMIN_PASSWORD")]
    password: String,
}

#[derive(Args)]
struct UsernameArgs {
    #[arg(long)]
    username: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let pool = db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;

    if let Commands::Migrate = cli.command {
        db::run_migrations(&pool).await.context("migrations failed")?;
        println!("Migrations applied");
        return Ok(());
    }

    let users = UserService::new(Arc::new(pool));

    match cli.command {
        Commands::Migrate => {}
        Commands::CreateSite(args) => {
            let site = users
                .create_site(NewSite {
                    code: args.code,
                    name: args.name,
                })
                .await
                .context("failed to create site")?;
            render(cli.json, &site, || {
                format!("Site {} created with id {}", site.code, site.site_id)
            })?;
        }
        Commands::ListSites => {
            let sites = users.list_sites().await.context("failed to list sites")?;
            render(cli.json, &sites, || {
                sites
                    .iter()
                    .map(|s| format!("{:>5}  {:<12} {}", s.site_id, s.code, s.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::CreateUser(args) => {
            let profile = users
                .create_user(NewUser {
                    username: args.username,
                    display_name: args.display_name,
                    password: args.password,
                    role: args.role.as_str().to_string(),
                    site_ids: args.sites,
                })
                .await
                .context("failed to create user")?;
            render(cli.json, &profile, || {
                format!(
                    "User {} created with id {} (sites: {:?})",
                    profile.username, profile.user_id, profile.site_ids
                )
            })?;
        }
        Commands::AssignSite(args) => {
            let user_id = user_id(&users, &args.username).await?;
            users
                .assign_site(user_id, args.site)
                .await
                .context("failed to assign site")?;
            println!("Site {} assigned to {}", args.site, args.username);
        }
        Commands::RevokeSite(args) => {
            let user_id = user_id(&users, &args.username).await?;
            users
                .revoke_site(user_id, args.site)
                .await
                .context("failed to revoke site")?;
            println!("Site {} revoked from {}", args.site, args.username);
        }
        Commands::SetPassword(args) => {
            users
                .set_password(&args.username, &args.password)
                .await
                .context("failed to set password")?;
            println!("Password updated for {}", args.username);
        }
        Commands::Deactivate(args) => {
            users
                .set_active(&args.username, false)
                .await
                .context("failed to deactivate user")?;
            println!("User {} deactivated", args.username);
        }
        Commands::Activate(args) => {
            users
                .set_active(&args.username, true)
                .await
                .context("failed to activate user")?;
            println!("User {} activated", args.username);
        }
    }

    Ok(())
}

async fn user_id(users: &UserService, username: &str) -> Result<i32> {
    users
        .find_by_username(username)
        .await
        .context("failed to look up user")?
        .map(|u| u.user_id)
        .with_context(|| format!("unknown user {username}"))
}

fn render<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}
