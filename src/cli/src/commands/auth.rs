//! Registration, login and session commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use super::config;
use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an identity
    #[command(subcommand)]
    Register(RegisterCommands),

    /// Log in and store the session token
    Login(CredentialArgs),

    /// Forget the stored session token
    Logout,

    /// Show the roles of the current session
    Whoami,

    /// Change the password of the current session's user
    Passwd {
        /// Current password
        #[arg(long)]
        old: String,

        /// New password
        #[arg(long)]
        new: String,
    },
}

#[derive(Subcommand)]
pub enum RegisterCommands {
    /// Plain user with no role
    User(CredentialArgs),

    /// Housing office admin
    Admin {
        #[command(flatten)]
        credentials: CredentialArgs,

        #[arg(long)]
        full_name: String,

        #[arg(long)]
        email: String,

        /// Grant write access
        #[arg(long)]
        write: bool,
    },

    /// Student; the username becomes the student id
    Student {
        #[command(flatten)]
        credentials: CredentialArgs,

        #[arg(long)]
        full_name: String,

        #[arg(long)]
        preferred_name: Option<String>,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        enrollment_type: Option<String>,

        #[arg(long)]
        year_of_enrollment: Option<i32>,

        #[arg(long)]
        sutd_email: Option<String>,
    },
}

#[derive(Args)]
pub struct CredentialArgs {
    /// Username
    username: String,

    /// Password
    #[arg(long, env = "HOUSING_PASSWORD", hide_env_values = true)]
    password: String,
}

// ── API types ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct AdminRegistration<'a> {
    username: &'a str,
    password: &'a str,
    full_name: String,
    email: String,
    read_only_privilege: bool,
}

#[derive(Serialize)]
struct StudentRegistration<'a> {
    username: &'a str,
    password: &'a str,
    full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    preferred_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    enrollment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year_of_enrollment: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sutd_email: Option<String>,
}

#[derive(Serialize)]
struct PasswordChange {
    old_password: String,
    new_password: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct Roles {
    is_student: bool,
    is_student_hg: bool,
    is_admin: bool,
    is_admin_write: bool,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(flatten)]
    roles: Roles,
}

fn print_roles(roles: &Roles) {
    output::print_flag("Student", roles.is_student);
    output::print_flag("House guardian", roles.is_student_hg);
    output::print_flag("Admin", roles.is_admin);
    output::print_flag("Admin (write)", roles.is_admin_write);
}

async fn register(cmd: RegisterCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (username, created): (String, serde_json::Value) = match cmd {
        RegisterCommands::User(c) => {
            let body = Credentials {
                username: &c.username,
                password: &c.password,
            };
            let created = client.post("/api/auth/register/user", &body).await?;
            (c.username, created)
        }
        RegisterCommands::Admin {
            credentials: c,
            full_name,
            email,
            write,
        } => {
            let body = AdminRegistration {
                username: &c.username,
                password: &c.password,
                full_name,
                email,
                read_only_privilege: !write,
            };
            let created = client.post("/api/auth/register/admin", &body).await?;
            (c.username, created)
        }
        RegisterCommands::Student {
            credentials: c,
            full_name,
            preferred_name,
            gender,
            enrollment_type,
            year_of_enrollment,
            sutd_email,
        } => {
            let body = StudentRegistration {
                username: &c.username,
                password: &c.password,
                full_name,
                preferred_name,
                gender,
                enrollment_type,
                year_of_enrollment,
                sutd_email,
            };
            let created = client.post("/api/auth/register/student", &body).await?;
            (c.username, created)
        }
    };

    match format {
        OutputFormat::Table => output::print_success(&format!("Registered {}", username)),
        _ => output::print_item(&created, format)?,
    }
    Ok(())
}

pub async fn execute(cmd: AuthCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AuthCommands::Register(cmd) => register(cmd, client, format).await?,

        AuthCommands::Login(c) => {
            let body = Credentials {
                username: &c.username,
                password: &c.password,
            };
            let login: LoginResponse = client.post("/api/auth/login", &body).await?;
            config::store_session(&c.username, &login.token)
                .context("Logged in, but the session could not be saved")?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Logged in as {}", c.username));
                    print_roles(&login.roles);
                }
                _ => output::print_item(&login.roles, format)?,
            }
        }

        AuthCommands::Logout => match config::clear_session()? {
            Some(username) => output::print_success(&format!("Logged out {}", username)),
            None => output::print_info("No stored session"),
        },

        AuthCommands::Whoami => {
            if !client.has_token() {
                anyhow::bail!("Not logged in. Run `housing auth login <username>` first.");
            }
            let roles: Roles = client.get("/api/auth/access").await?;
            match format {
                OutputFormat::Table => {
                    output::print_header("Current Session");
                    print_roles(&roles);
                }
                _ => output::print_item(&roles, format)?,
            }
        }

        AuthCommands::Passwd { old, new } => {
            let body = PasswordChange {
                old_password: old,
                new_password: new,
            };
            let _: serde_json::Value = client.put("/api/auth/password", Some(&body)).await?;
            output::print_success("Password changed");
        }
    }

    Ok(())
}
