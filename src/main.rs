//! ssogate CLI
//!
//! Run with: cargo run -- <command>

#[tokio::main]
async fn main() {
    // Secrets such as SSOGATE_CLIENT_SECRET may come from .env
    let _ = dotenvy::dotenv();

    if let Err(e) = ssogate::cli::run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
