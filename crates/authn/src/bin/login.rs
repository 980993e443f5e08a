//! `authn-login`: the player login service.

use std::process::ExitCode;

use authn::prelude::*;
use authn::server::LoginServerBuilder;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    authn::init_tracing();

    match run(LoginArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "login service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: LoginArgs) -> Result<(), AuthnError> {
    let config = args.into_config()?;

    let server = LoginServerBuilder::from_config(&config)
        .build(config.service.secret.clone())
        .await?;

    register_service(
        config.service.etcd_endpoint.as_deref(),
        &config.service.advertised_address(),
        "login",
    )
    .await?;

    tracing::info!(
        addr = %config.service.service_addr,
        db = %config.store.path.display(),
        backup = server.backup_url().unwrap_or("disabled"),
        "starting login service"
    );
    server.run().await
}
