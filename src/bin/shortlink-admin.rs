use anyhow::Result;
use clap::{Parser, Subcommand};
use shortlink::config::Config;
use shortlink::{now_millis, AppState};

#[derive(Parser)]
#[command(name = "shortlink-admin")]
#[command(about = "Shortlink admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the admin account from ADMIN_USERNAME / ADMIN_PASSWORD if not done yet
    Bootstrap,
    /// Set an admin's password, creating the account if needed
    ResetPassword {
        username: String,
        password: String,
    },
    /// Print short links, newest first
    ListLinks {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let state = AppState::from_config(&config).await?;

    match cli.command {
        Commands::Bootstrap => {
            if state.auth.bootstrap().await? {
                println!("✓ Admin '{}' seeded", config.auth.admin_username);
            } else {
                println!("⚠ Admin accounts were already initialized; nothing changed");
            }
        }
        Commands::ResetPassword { username, password } => {
            state.auth.reset_password(&username, &password).await?;
            println!("✓ Password updated for '{}'", username);
        }
        Commands::ListLinks { page, limit } => {
            let result = state.links.list(page.max(1), limit.clamp(1, 1000)).await?;
            if result.links.is_empty() {
                println!("No short links found.");
            } else {
                let now = now_millis();
                println!("{:<34} {:>8} {:<9} {}", "Code", "Clicks", "Status", "Destination");
                println!("{}", "-".repeat(80));
                for view in &result.links {
                    let status = if view.link.is_expired(now) {
                        "expired"
                    } else if view.link.active {
                        "active"
                    } else {
                        "disabled"
                    };
                    println!(
                        "{:<34} {:>8} {:<9} {}",
                        view.short_code, view.link.clicks, status, view.link.url
                    );
                }
                println!(
                    "Page {} of {} ({} links)",
                    result.pagination.page, result.pagination.total_pages, result.pagination.total
                );
            }
        }
    }

    Ok(())
}
