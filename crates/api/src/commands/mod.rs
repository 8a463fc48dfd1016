//! CLI commands
//!
//! Each command bootstraps the session from the keychain first, so a token
//! that expired since the last run is refreshed (or cleared) before use.

use anyhow::{bail, Context};
use nima_common::auth::{AuthState, SignInMode};
use nima_infra::AuthContext;

/// Parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Login { mode: SignInMode },
    Status,
    Token { force_refresh: bool },
    Logout,
    Help,
}

impl Command {
    /// Parse the arguments following the program name.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> anyhow::Result<Self> {
        let mut args = args.iter().map(AsRef::as_ref);
        let command = args.next();
        let flags: Vec<&str> = args.collect();

        let parsed = match command {
            Some("login") => match flags.as_slice() {
                [] => Self::Login { mode: SignInMode::SignIn },
                ["--sign-up"] => Self::Login { mode: SignInMode::SignUp },
                _ => bail!("usage: nima login [--sign-up]"),
            },
            Some("token") => match flags.as_slice() {
                [] => Self::Token { force_refresh: false },
                ["--force"] => Self::Token { force_refresh: true },
                _ => bail!("usage: nima token [--force]"),
            },
            Some("status") if flags.is_empty() => Self::Status,
            Some("logout") if flags.is_empty() => Self::Logout,
            Some("help" | "--help" | "-h") | None => Self::Help,
            Some(other) => bail!("unknown command: {other}"),
        };

        Ok(parsed)
    }
}

/// Run `command` against `ctx`.
pub async fn run(ctx: &AuthContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { mode } => login(ctx, mode).await,
        Command::Status => {
            print_state(&ctx.bootstrap().await);
            Ok(())
        }
        Command::Token { force_refresh } => token(ctx, force_refresh).await,
        Command::Logout => {
            ctx.logout().await.context("failed to sign out")?;
            println!("Signed out");
            Ok(())
        }
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

async fn login(ctx: &AuthContext, mode: SignInMode) -> anyhow::Result<()> {
    if let Some(user) = ctx.bootstrap().await.user {
        println!("Already signed in as {}", user.email);
        return Ok(());
    }

    println!("Opening the browser to {mode}...");
    match ctx.login(mode).await.context("sign-in failed")? {
        Some(user) => println!("Signed in as {}", user.email),
        None => println!("Sign-in cancelled"),
    }
    Ok(())
}

async fn token(ctx: &AuthContext, force_refresh: bool) -> anyhow::Result<()> {
    ctx.bootstrap().await;
    let token = ctx.access_token(force_refresh).await.context("no access token available")?;
    println!("{token}");
    Ok(())
}

fn print_state(state: &AuthState) {
    match &state.user {
        Some(user) if state.is_authenticated => {
            let name = [user.first_name.as_deref(), user.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            println!("Signed in as {}", user.email);
            if !name.is_empty() {
                println!("  name:     {name}");
            }
            println!("  user id:  {}", user.id);
            println!("  verified: {}", user.email_verified);
        }
        _ => println!("Not signed in"),
    }
}

pub fn print_help() {
    println!("Nima authentication");
    println!();
    println!("USAGE:");
    println!("    nima <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    login [--sign-up]  Sign in (or sign up) through the browser");
    println!("    status             Show who is signed in");
    println!("    token [--force]    Print a valid access token, refreshing if needed");
    println!("    logout             Sign out and remove stored credentials");
    println!("    help               Show this help message");
}
