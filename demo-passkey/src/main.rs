use std::env;

use sso_passkey::{
    HttpRegistrationServer, PasskeyRegistrar, SoftwareAuthenticator, origin_from_env,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demo_passkey=debug,sso_passkey=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = env::args().skip(1);
    let (Some(user_id), Some(username)) = (args.next(), args.next()) else {
        eprintln!("Usage: demo-passkey <user-id> <username> [display-name]");
        std::process::exit(2);
    };
    let display_name = args.next().unwrap_or_else(|| username.clone());

    let server = HttpRegistrationServer::from_env()?;
    let authenticator = SoftwareAuthenticator::new(origin_from_env()?);
    tracing::info!(
        "Registering a passkey against {} as {}",
        server.config().base_url,
        authenticator.origin()
    );

    let registrar = PasskeyRegistrar::new(server, authenticator);
    match registrar
        .begin_registration(&user_id, &username, &display_name)
        .await
    {
        Ok(record) => {
            println!("Registered passkey {} (credential {})", record.id, record.credential_id);
            Ok(())
        }
        Err(e) => {
            eprintln!("Registration failed [{}]: {}", e.kind(), e);
            if e.is_retryable() {
                eprintln!("The ceremony can be retried.");
            }
            std::process::exit(1);
        }
    }
}
