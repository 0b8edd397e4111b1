// Samples the app install state reported by the device portal

use std::time::Duration;

use clap::{Arg, Command};
use wdportal::PortalError;
use wdportal::app_deployment::{AppDeploymentClient, InstallStatus};
use wdportal::token::SessionTokens;

mod common;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new("appstate")
        .about("Query the install state of the app deployment in flight")
        .arg(
            Arg::new("address")
                .long("address")
                .value_name("URL")
                .help("Base address of the device portal, e.g. https://192.168.1.42"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .value_name("USER")
                .help("Portal account name"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASS")
                .help("Portal account password"),
        )
        .arg(
            Arg::new("accept_any_cert")
                .long("accept-any-cert")
                .help("Trust whatever certificate the portal presents")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cert_sha256")
                .long("cert-sha256")
                .value_name("HEX")
                .help("Pin the portal certificate to this SHA-256 fingerprint"),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .value_name("SECONDS")
                .help("Poll until the operation completes or fails")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("about")
                .long("about")
                .help("Show about information")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("about") {
        println!("appstate - query the install state of an app deployment");
        return;
    }

    let connection = match common::get_connection(
        matches.get_one::<String>("address"),
        matches.get_one::<String>("username"),
        matches.get_one::<String>("password"),
        matches.get_flag("accept_any_cert"),
        matches.get_one::<String>("cert_sha256"),
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let tokens = SessionTokens::new();
    let client = AppDeploymentClient::new(&connection, &tokens);

    match matches.get_one::<u64>("watch") {
        Some(interval) => loop {
            match client.get_install_status().await {
                Ok(status @ (InstallStatus::InProgress | InstallStatus::None)) => {
                    println!("{status:?}");
                    tracing::debug!("sampling again in {interval}s");
                    tokio::time::sleep(Duration::from_secs(*interval)).await;
                }
                Ok(status) => {
                    println!("{status:?}");
                    break;
                }
                Err(PortalError::Transport(e)) => {
                    eprintln!("Device unreachable: {e}");
                    break;
                }
                Err(e) => {
                    eprintln!("{e}");
                    break;
                }
            }
        },
        None => match client.get_install_status().await {
            Ok(status) => println!("{status:?}"),
            Err(PortalError::Transport(e)) => eprintln!("Device unreachable: {e}"),
            Err(e) => eprintln!("{e}"),
        },
    }
}
