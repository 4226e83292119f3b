use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailwright::config::Settings;
use mailwright::{Composer, Recipient, Recipients, SendOptions};

#[derive(Parser)]
#[command(name = "mailwright", version, about = "Compose and send markdown e-mail templates")]
struct Cli {
    /// Template file or directory (overrides the configured path)
    #[arg(long, global = true)]
    templates: Option<PathBuf>,

    /// Compose messages without delivering them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List discovered templates
    List,

    /// Compose a template and send it
    Send {
        /// Template name
        name: String,

        /// Recipient address, may be repeated
        #[arg(long)]
        to: Vec<String>,

        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        from: Option<String>,

        /// Template data as key=value, may be repeated
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut settings = Settings::new().context("failed to load configuration")?;
    if cli.templates.is_some() {
        settings.templates.path = cli.templates.clone();
    }
    if cli.dry_run {
        settings.mailer.dry_run = true;
    }
    tracing::info!("Configuration loaded");

    if settings.templates.path.is_none() {
        return Err(anyhow!(
            "no template path configured; pass --templates or set MAILWRIGHT__TEMPLATES__PATH"
        ));
    }

    let composer = Composer::from_settings(&settings)?;
    tracing::info!(templates = composer.names().len(), "Templates discovered");

    match cli.command {
        Command::List => {
            for name in composer.names() {
                println!("{}", name);
            }
        }
        Command::Send {
            name,
            to,
            subject,
            from,
            data,
        } => {
            let mut options = SendOptions::new();
            if !to.is_empty() {
                options = options.to(Recipients::Many(to.into_iter().map(Recipient::new).collect()));
            }
            if let Some(subject) = subject {
                options = options.subject(subject);
            }
            if let Some(from) = from {
                options = options.from_email(from);
            }
            for (key, value) in data {
                options = options.data(key, value);
            }

            let record = composer.send(&name, options).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    composer.destroy();
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("name=Ada").unwrap(),
            ("name".to_string(), "Ada".to_string())
        );
        assert_eq!(
            parse_key_value("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("broken").is_err());
    }

    #[test]
    fn test_cli_parses_send() {
        let cli = Cli::try_parse_from([
            "mailwright",
            "--dry-run",
            "send",
            "welcome",
            "--to",
            "a@x.com",
            "--data",
            "name=Ada",
        ])
        .unwrap();

        assert!(cli.dry_run);
        match cli.command {
            Command::Send { name, to, data, .. } => {
                assert_eq!(name, "welcome");
                assert_eq!(to, vec!["a@x.com".to_string()]);
                assert_eq!(data, vec![("name".to_string(), "Ada".to_string())]);
            }
            Command::List => panic!("expected send"),
        }
    }
}
