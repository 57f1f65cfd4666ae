//! services/client/src/bin/decipher.rs

use client_lib::{config::Config, error::ClientError, state::ClientState};
use decipher_core::navigation::NavDecision;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: decipher <whoami | login <email> <password> | logout | stories | scenarios | route <path>>";

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.api_url);

    // --- 2. Build the Client & Restore the Session ---
    let state = ClientState::from_config(config)?;
    let snapshot = state.session.restore().await;
    info!(
        "Session restored (authenticated: {})",
        snapshot.is_authenticated()
    );

    // --- 3. Run the Command ---
    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    if let Err(e) = run(&state, &args).await {
        error!("Command failed: {}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(state: &ClientState, args: &[&str]) -> Result<(), ClientError> {
    match args {
        ["whoami"] => match state.session.user().await {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in"),
        },
        ["login", email, password] => {
            let session = state.session.login(email, password, true).await?;
            println!("Logged in as {} <{}>", session.user.name, session.user.email);
        }
        ["logout"] => {
            state.session.logout().await;
            println!("Logged out");
        }
        ["stories"] => {
            let list = state.stories.list_stories().await?;
            println!("{} stories", list.count);
            for story in list.stories {
                println!(
                    "{}\t{}\t{} the {}\t{} chunks",
                    story.id.as_deref().unwrap_or("-"),
                    story.setting,
                    story.character_name,
                    story.character,
                    story.main_story.len()
                );
            }
        }
        ["scenarios"] => {
            let list = state.scenarios.list_scenarios().await?;
            println!("{} scenarios", list.count);
            for scenario in list.scenarios {
                println!(
                    "{}\t{}\t{:?}",
                    scenario.id.as_deref().unwrap_or("-"),
                    scenario.title,
                    scenario.visibility
                );
            }
        }
        ["route", path] => {
            let mut navigator = state.navigator(path);
            let decision = navigator.on_session_change(&state.session.snapshot());
            match decision {
                NavDecision::Wait => println!("{path}: waiting for session"),
                NavDecision::Allow => println!("{path}: allowed"),
                NavDecision::Redirect(target) => println!("{path}: redirect to {target}"),
            }
            println!(
                "page: {} (chrome: {})",
                navigator.current_page(),
                navigator.shows_chrome()
            );
        }
        _ => return Err(ClientError::Internal(USAGE.to_string())),
    }
    Ok(())
}
