//! Command-line interface for ssogate
//!
//! `serve` runs the auth server, `ui` runs the UI service and `dance`
//! exercises a running server the way a relying party would.

use crate::Result;
use crate::client::SsoClient;
use crate::config::Config;
use crate::constants::{
    CONFIG_FILE_NAME, DEFAULT_AUTH_SERVER_URL, DEFAULT_CLIENT_ID, DEFAULT_CLIENT_SECRET,
    ENV_CLIENT_SECRET,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;

/// Main CLI entry point
pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => handle_serve_command(sub_matches).await,
        Some(("ui", sub_matches)) => handle_ui_command(sub_matches).await,
        Some(("dance", sub_matches)) => handle_dance_command(sub_matches).await,
        _ => {
            eprintln!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .value_name("PATH")
        .help("Configuration file (JSON or YAML)")
}

fn host_arg() -> Arg {
    Arg::new("host")
        .long("host")
        .value_name("HOST")
        .help("Host to bind to (overrides config)")
}

fn port_arg() -> Arg {
    Arg::new("port")
        .long("port")
        .short('p')
        .value_name("PORT")
        .value_parser(clap::value_parser!(u16))
        .help("Port to listen on (overrides config)")
}

fn build_cli() -> Command {
    Command::new("ssogate")
        .about("OAuth2 password-grant single sign-on server")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(
            Command::new("serve")
                .about("Start the auth server")
                .arg(config_arg())
                .arg(host_arg())
                .arg(port_arg()),
        )
        .subcommand(
            Command::new("ui")
                .about("Start the UI service that logs in against the auth server")
                .arg(config_arg())
                .arg(host_arg())
                .arg(port_arg())
                .arg(
                    Arg::new("auth-server")
                        .long("auth-server")
                        .value_name("URL")
                        .help("Auth server base URL (overrides config)"),
                ),
        )
        .subcommand(
            Command::new("dance")
                .about("Register, obtain a token and call /whois against a running server")
                .arg(
                    Arg::new("root")
                        .long("root")
                        .value_name("URL")
                        .default_value(DEFAULT_AUTH_SERVER_URL)
                        .help("Auth server base URL, base path included"),
                )
                .arg(
                    Arg::new("username")
                        .long("username")
                        .short('u')
                        .required(true)
                        .help("User to register and log in as"),
                )
                .arg(
                    Arg::new("password")
                        .long("password")
                        .required(true)
                        .help("Password of the user"),
                )
                .arg(
                    Arg::new("client-id")
                        .long("client-id")
                        .default_value(DEFAULT_CLIENT_ID)
                        .help("OAuth client id"),
                )
                .arg(
                    Arg::new("client-secret")
                        .long("client-secret")
                        .env(ENV_CLIENT_SECRET)
                        .default_value(DEFAULT_CLIENT_SECRET)
                        .help("OAuth client secret"),
                )
                .arg(
                    Arg::new("skip-register")
                        .long("skip-register")
                        .action(ArgAction::SetTrue)
                        .help("Skip the /register step for an existing user"),
                ),
        )
}

/// Load the config named by `--config`, or the default file
fn load_config(matches: &ArgMatches) -> Result<Config> {
    let path = matches
        .get_one::<String>("config")
        .map(|s| s.as_str())
        .unwrap_or(CONFIG_FILE_NAME);
    let config = Config::load_from_path(path)?;
    crate::init_logging_with_level(config.log_level());
    Ok(config)
}

async fn handle_serve_command(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    if let Some(host) = matches.get_one::<String>("host") {
        config.http.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.http.port = *port;
    }
    crate::http::start_server(config).await
}

async fn handle_ui_command(matches: &ArgMatches) -> Result<()> {
    let mut config = load_config(matches)?;
    if let Some(host) = matches.get_one::<String>("host") {
        config.ui.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.ui.port = *port;
    }
    if let Some(url) = matches.get_one::<String>("auth-server") {
        config.ui.auth_server_url = url.clone();
    }
    crate::ui::start_ui(&config).await
}

async fn handle_dance_command(matches: &ArgMatches) -> Result<()> {
    crate::init_logging();

    let arg = |name: &str| {
        matches
            .get_one::<String>(name)
            .cloned()
            .unwrap_or_default()
    };
    let client = SsoClient::new(arg("root"), arg("client-id"), arg("client-secret"))?;
    let username = arg("username");
    let password = arg("password");
    let skip_register = matches.get_flag("skip-register");

    let report = client.dance(&username, &password, skip_register).await?;

    if let Some(registration) = &report.registration {
        print_step("register", registration)?;
    }
    print_step("token", &report.token)?;
    print_step("whois", &report.identity)?;
    Ok(())
}

fn print_step<T: Serialize>(step: &str, value: &T) -> Result<()> {
    println!("== {}", step);
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
