use clap::Parser;
use std::env;
use std::path::Path;

use nestegg::api::{self, Cli};

#[tokio::main]
async fn main() {
    env_logger::init();

    let raw_args: Vec<String> = env::args().collect();
    match raw_args.get(1).map(|s| s.as_str()) {
        Some("serve") => {
            let port = raw_args
                .get(2)
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(8080);
            let policy = match api::load_tax_policy(raw_args.get(3).map(Path::new)) {
                Ok(policy) => policy,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = api::run_http_server(port, policy).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Some("project") => {
            let cli = Cli::parse_from(raw_args.iter().skip(1));
            match api::run_project_command(&cli) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(1);
                }
            }
        }
        _ => {
            eprintln!("Usage: nestegg serve [port] [tax-policy.json]");
            eprintln!("       nestegg project [--current-age N ...] (see `nestegg project --help`)");
            std::process::exit(1);
        }
    }
}
