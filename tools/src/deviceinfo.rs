// Prints the identity the device portal reports for a device

use clap::{Arg, Command};
use wdportal::device_info::DeviceInfoClient;
use wdportal::token::SessionTokens;

mod common;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let matches = Command::new("deviceinfo")
        .about("Get name and OS information from the device portal")
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
            Arg::new("about")
                .long("about")
                .help("Show about information")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if matches.get_flag("about") {
        println!("deviceinfo - get name and OS information from the device portal");
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
    let client = DeviceInfoClient::new(&connection, &tokens);

    match client.machine_name().await {
        Ok(name) => println!("{name}"),
        Err(e) => {
            eprintln!("Unable to get machine name: {e}");
            return;
        }
    }

    match client.os_info().await {
        Ok(info) => {
            println!("{} {} ({})", info.platform, info.os_version, info.os_edition);
            if let Some(language) = info.language {
                println!("{language}");
            }
        }
        Err(e) => eprintln!("Unable to get OS information: {e}"),
    }
}
