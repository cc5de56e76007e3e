//! Sends one test message through an SMTP relay and reports how it went.

use anyhow::{Context, Result};
use clap::{builder::NonEmptyStringValueParser, Parser, ValueEnum};
use smtp_connection_helper::{
    transport::smtp::authentication::Authenticator, Address, AuthSpec, ConnectionRequest,
    Envelope, MessageContent, SendRequest,
};
use tracing_subscriber::EnvFilter;

/// Check connectivity to an SMTP relay by sending a single test message
#[derive(Parser, Debug)]
#[command(name = "smtp-connection-helper")]
#[command(version)]
struct Cli {
    /// SMTP host
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    host: String,

    /// SMTP port
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    port: u16,

    /// Email address of the sender
    #[arg(long)]
    from: Address,

    /// Email address of the recipient
    #[arg(long)]
    to: Address,

    /// Email subject
    #[arg(
        long,
        default_value = "Testing SMTP Server Connection",
        value_parser = NonEmptyStringValueParser::new()
    )]
    subject: String,

    /// Message to send to the recipient
    #[arg(
        long,
        default_value = "This is a test email message sent with smtp_connection_helper!",
        value_parser = NonEmptyStringValueParser::new()
    )]
    message: String,

    /// Client hostname sent to the server with HELO or EHLO
    #[arg(
        long,
        default_value = "localhost",
        value_parser = NonEmptyStringValueParser::new()
    )]
    client_hostname: String,

    /// Authentication method
    #[arg(long, value_enum, default_value_t = AuthMethod::Disable)]
    auth: AuthMethod,

    /// Use a TLS wrapped connection instead of STARTTLS
    #[arg(long)]
    implicit_tls: bool,

    /// Skip certificate verification of the implicit TLS connection
    #[arg(long)]
    insecure: bool,

    /// SMTP username
    #[arg(long, default_value = "")]
    username: String,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// SMTP identity, for plain and external authentication
    #[arg(long, default_value = "")]
    identity: String,

    /// OAUTHBEARER token
    #[arg(long, env = "SMTP_TOKEN", default_value = "", hide_env_values = true)]
    token: String,

    /// Trace passed with anonymous authentication
    #[arg(long, default_value = "")]
    trace: String,

    /// Log more, repeat for even more (overridden by RUST_LOG)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMethod {
    Plain,
    Login,
    Anonymous,
    External,
    Oauthbearer,
    Disable,
}

impl Cli {
    fn auth_spec(&self) -> AuthSpec {
        match self.auth {
            AuthMethod::Plain => AuthSpec::Plain {
                identity: self.identity.clone(),
                username: self.username.clone(),
                password: self.password.clone(),
            },
            AuthMethod::Login => AuthSpec::Login {
                username: self.username.clone(),
                password: self.password.clone(),
            },
            AuthMethod::Anonymous => AuthSpec::Anonymous {
                trace: self.trace.clone(),
            },
            AuthMethod::External => AuthSpec::External {
                identity: self.identity.clone(),
            },
            AuthMethod::Oauthbearer => AuthSpec::OAuthBearer {
                username: self.username.clone(),
                token: self.token.clone(),
                host: self.host.clone(),
                port: self.port,
            },
            AuthMethod::Disable => AuthSpec::Disabled,
        }
    }

    /// Builds the request, rejecting missing credentials up front
    fn request(&self) -> Result<SendRequest> {
        let auth = self.auth_spec();
        Authenticator::from_spec(auth.clone())?;

        let connection = ConnectionRequest::new(self.host.as_str(), self.port)?
            .implicit_tls(self.implicit_tls)
            .dangerous_skip_certificate_verification(self.insecure);
        let content =
            MessageContent::new(&*self.subject, &*self.message, &*self.client_hostname)?;

        Ok(SendRequest {
            connection,
            auth,
            envelope: Envelope::new(self.from.clone(), self.to.clone()),
            content,
        })
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.insecure && !cli.implicit_tls {
        tracing::warn!("--insecure only applies to implicit TLS connections, STARTTLS is still verified");
    }

    let request = cli.request()?;
    println!("Sending email with auth method: {}", request.auth.name());
    request.send().context("could not send email")?;

    println!("Successfully sent email!");
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::{error::ErrorKind, CommandFactory};

    use super::*;

    const REQUIRED: [&str; 9] = [
        "smtp-connection-helper",
        "--host",
        "smtp.example.com",
        "--port",
        "587",
        "--from",
        "a@x.com",
        "--to",
        "b@y.com",
    ];

    fn parse(extra: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(REQUIRED.iter().chain(extra))
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.auth, AuthMethod::Disable);
        assert_eq!(cli.subject, "Testing SMTP Server Connection");
        assert_eq!(
            cli.message,
            "This is a test email message sent with smtp_connection_helper!"
        );
        assert_eq!(cli.client_hostname, "localhost");
        assert!(!cli.implicit_tls);
        assert!(matches!(cli.auth_spec(), AuthSpec::Disabled));

        let request = cli.request().unwrap();
        assert_eq!(request.connection.host(), "smtp.example.com");
        assert_eq!(request.connection.port(), 587);
        assert!(!request.connection.is_implicit_tls());
        assert_eq!(request.envelope.to().to_string(), "b@y.com");
    }

    #[test]
    fn missing_or_empty_required_values() {
        let err = Cli::try_parse_from(["smtp-connection-helper", "--host", "smtp.example.com"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        assert!(parse(&["--subject", ""]).is_err());
        assert!(parse(&["--client-hostname", ""]).is_err());
        assert!(Cli::try_parse_from([
            "smtp-connection-helper",
            "--host",
            "",
            "--port",
            "25",
            "--from",
            "a@x.com",
            "--to",
            "b@y.com",
        ])
        .is_err());
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            parse(&["--auth", "cram-md5"]).unwrap_err().kind(),
            ErrorKind::InvalidValue
        );
        assert!(Cli::try_parse_from([
            "smtp-connection-helper",
            "--host",
            "smtp.example.com",
            "--port",
            "0",
            "--from",
            "a@x.com",
            "--to",
            "b@y.com",
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "smtp-connection-helper",
            "--host",
            "smtp.example.com",
            "--port",
            "25",
            "--from",
            "not an address",
            "--to",
            "b@y.com",
        ])
        .is_err());
    }

    #[test]
    fn auth_mapping() {
        let cli = parse(&[
            "--auth",
            "plain",
            "--identity",
            "admin",
            "--username",
            "user",
            "--password",
            "secret",
        ])
        .unwrap();
        match cli.auth_spec() {
            AuthSpec::Plain {
                identity,
                username,
                password,
            } => {
                assert_eq!(identity, "admin");
                assert_eq!(username, "user");
                assert_eq!(password, "secret");
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = parse(&["--auth", "oauthbearer", "--username", "user", "--token", "t"]).unwrap();
        match cli.auth_spec() {
            AuthSpec::OAuthBearer {
                username,
                token,
                host,
                port,
            } => {
                assert_eq!(username, "user");
                assert_eq!(token, "t");
                assert_eq!(host, "smtp.example.com");
                assert_eq!(port, 587);
            }
            other => panic!("unexpected {other:?}"),
        }

        let cli = parse(&["--auth", "anonymous", "--trace", "check"]).unwrap();
        assert_eq!(cli.auth_spec().name(), "anonymous");
        let cli = parse(&["--auth", "external"]).unwrap();
        assert_eq!(cli.auth_spec().name(), "external");
        let cli = parse(&["--auth", "login"]).unwrap();
        assert_eq!(cli.auth_spec().name(), "login");
    }

    #[test]
    fn credentials_checked_before_sending() {
        let cli = parse(&["--auth", "login", "--username", "user", "--password", ""]).unwrap();
        let err = cli.request().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: username and password must not be empty for auth login"
        );

        let cli = parse(&["--auth", "external"]).unwrap();
        assert_eq!(cli.request().unwrap().auth.name(), "external");
    }

    #[test]
    fn tls_switches() {
        let cli = parse(&["--implicit-tls", "--insecure"]).unwrap();
        let request = cli.request().unwrap();
        assert!(request.connection.is_implicit_tls());
        assert!(request.connection.skips_certificate_verification());
    }
}
