//! `authn-guest`: issues guest claims accepted by the login service.

use std::process::ExitCode;

use authn::prelude::*;
use authn::server::GuestServerBuilder;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    authn::init_tracing();

    match run(GuestArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "guest service failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: GuestArgs) -> Result<(), AuthnError> {
    let config = args.into_config()?;

    let server = GuestServerBuilder::from_config(&config)
        .build(config.service.secret.clone())
        .await?;

    register_service(
        config.service.etcd_endpoint.as_deref(),
        &config.service.advertised_address(),
        "guest",
    )
    .await?;

    tracing::info!(addr = %config.service.service_addr, "starting guest service");
    server.run().await
}
