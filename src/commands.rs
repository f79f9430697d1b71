//! CLI commands
//!
//! Each command maps onto one [`SessionManager`] operation.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use storefront_session::api::{AuthError, ProfileImage, ProfileUpdate, SignupRequest};
use storefront_session::http::{ApiRequest, Transport};
use storefront_session::SessionManager;

/// storefront-session - sign in to the storefront API from the terminal
#[derive(Parser, Debug)]
#[command(name = "storefront-session")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a config file (defaults to the per-user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show whether a session is stored
    Status,
    /// Log in (prompts for the password)
    Login { email: String },
    /// Create an account (prompts for the password)
    Signup {
        first_name: String,
        last_name: String,
        email: String,
        /// Profile image (png, jpg, webp or gif)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Verify the emailed code
    Verify {
        email: String,
        code: String,
        /// Log in right after verifying (prompts for the password)
        #[arg(long)]
        login: bool,
    },
    /// Send a new verification code
    Resend { email: String },
    /// Start a password reset
    Forgot { email: String },
    /// Fetch the signed-in user
    Profile,
    /// Change the signed-in user's name and picture
    UpdateProfile {
        first_name: String,
        last_name: String,
        /// New profile image (png, jpg, webp or gif)
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// GET an API path with the session token
    Get { path: String },
    /// End the session
    Logout,
}

/// Runs `command` against a bootstrapped manager
pub async fn execute(manager: &SessionManager, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let snapshot = manager.state().snapshot();
            if snapshot.is_authenticated {
                println!("Signed in");
            } else {
                println!("Signed out");
            }
        }
        Command::Login { email } => {
            let password = read_password()?;
            manager.login(&email, &password).await.map_err(friendly)?;
            match manager.state().current_user() {
                Some(user) => println!("Logged in as {}", user.display_name()),
                None => println!("Logged in"),
            }
        }
        Command::Signup {
            first_name,
            last_name,
            email,
            image,
        } => {
            let password = read_password()?;
            let profile_image = image.as_deref().map(load_image).transpose()?;
            let message = manager
                .signup(&SignupRequest {
                    first_name,
                    last_name,
                    email,
                    password,
                    profile_image,
                })
                .await
                .map_err(friendly)?;
            println!("{}", non_empty(message, "Account created, check your email for a code"));
        }
        Command::Verify { email, code, login } => {
            if login {
                let password = read_password()?;
                manager
                    .verify_and_login(&email, &code, &password)
                    .await
                    .map_err(friendly)?;
                println!("Email verified and logged in");
            } else {
                let message = manager.verify_otp(&email, &code).await.map_err(friendly)?;
                println!("{}", non_empty(message, "Email verified"));
            }
        }
        Command::Resend { email } => {
            let message = manager.resend_otp(&email).await.map_err(friendly)?;
            println!("{}", non_empty(message, "Verification code sent"));
        }
        Command::Forgot { email } => {
            let message = manager.forgot_password(&email).await.map_err(friendly)?;
            println!("{}", non_empty(message, "Password reset email sent"));
        }
        Command::Profile => {
            let profile = manager.refresh_profile().await.map_err(friendly)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::UpdateProfile {
            first_name,
            last_name,
            image,
        } => {
            let profile_image = image.as_deref().map(load_image).transpose()?;
            let profile = manager
                .update_profile(&ProfileUpdate {
                    first_name,
                    last_name,
                    profile_image,
                })
                .await
                .map_err(friendly)?;
            println!("Profile updated for {}", profile.display_name());
        }
        Command::Get { path } => {
            let response = manager
                .transport()
                .send(ApiRequest::get(path))
                .await
                .map_err(|e| friendly(e.into()))?;
            println!("HTTP {}", response.status());
            println!("{}", response.text());
        }
        Command::Logout => {
            manager.logout().await.map_err(friendly)?;
            println!("Logged out");
        }
    }
    Ok(())
}

fn friendly(e: AuthError) -> anyhow::Error {
    anyhow::anyhow!("{} ({})", e.user_message(), e)
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn read_password() -> Result<String> {
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

fn load_image(path: &Path) -> Result<ProfileImage> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let content_type = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        other => bail!("Unsupported image type: {:?}", other),
    };

    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("profile-image")
        .to_string();

    Ok(ProfileImage {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("storefront-session").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&["status"]).unwrap().command, Command::Status);
        assert_eq!(
            parse(&["verify", "a@b.com", "123456", "--login"]).unwrap().command,
            Command::Verify {
                email: "a@b.com".into(),
                code: "123456".into(),
                login: true
            }
        );
        assert_eq!(
            parse(&["signup", "Ada", "Lovelace", "ada@x.com"]).unwrap().command,
            Command::Signup {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@x.com".into(),
                image: None
            }
        );
    }

    #[test]
    fn test_parse_update_profile_and_config() {
        let cli = parse(&[
            "--config",
            "/tmp/sf.json",
            "update-profile",
            "Grace",
            "Hopper",
            "--image",
            "me.png",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sf.json")));
        assert_eq!(
            cli.command,
            Command::UpdateProfile {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                image: Some(PathBuf::from("me.png"))
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["login"]).is_err());
        assert!(parse(&["verify", "a@b.com", "1", "--bogus"]).is_err());
        assert!(parse(&["login", "a@b.com", "hunter2"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("me.PNG");
        std::fs::write(&path, b"img").unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.content_type, "image/png");
        assert_eq!(image.file_name, "me.PNG");
        assert_eq!(image.bytes, b"img");

        assert!(load_image(Path::new("notes.txt")).is_err());
    }
}
