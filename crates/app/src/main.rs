use std::sync::Arc;

use anyhow::Context;

use tenantgate_app::{App, GateConfig, Screen};
use tenantgate_auth::{Credentials, InMemoryIdentityService, Provisioning};
use tenantgate_session::{RecordingNavigator, ResolutionOutcome};

/// Usage: `tenantgate [EMAIL PASSWORD] [PATH...]`
///
/// Credentials fall back to `TENANTGATE_EMAIL` / `TENANTGATE_PASSWORD`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GateConfig::from_env().context("invalid configuration")?;
    tenantgate_observability::init_with(config.log_format);

    let fixture = config.load_fixture().context("failed to load identity fixture")?;
    let service = Arc::new(InMemoryIdentityService::from_fixture(fixture));
    let navigator = Arc::new(RecordingNavigator::new());
    let app = App::new(config, service, navigator.clone());

    app.initialize().await;

    let mut args = std::env::args().skip(1);
    let email = args.next().or_else(|| std::env::var("TENANTGATE_EMAIL").ok());
    let password = args.next().or_else(|| std::env::var("TENANTGATE_PASSWORD").ok());
    let mut paths: Vec<String> = args.collect();

    let (Some(email), Some(password)) = (email, password) else {
        tracing::info!("no credentials given; showing the signed-out view");
        println!("/ -> {}", app.screen("/"));
        return Ok(());
    };

    let identity = app
        .sign_in(&Credentials::new(email, password))
        .await
        .context("sign-in failed")?;
    println!("signed in as {identity}");

    match app.resolve().await {
        ResolutionOutcome::Resolved {
            access,
            destination,
        } => {
            println!("resolved {access}; navigating to {destination}");
            if paths.is_empty() {
                paths.push(app.routes().path(destination).to_string());
            }
        }
        other => println!("resolution ended without navigation: {other:?}"),
    }

    for path in &paths {
        let screen = app.screen(path);
        println!("{path} -> {screen}");

        if let Screen::Dashboard(ctx) = &screen {
            match ctx.organization_id() {
                Some(org) => {
                    let members = app.service().list_members(org).await?;
                    println!("  {} member(s) in {org}", members.len());
                }
                None => {
                    let orgs = app.service().list_organizations().await?;
                    println!("  {} organization(s)", orgs.len());
                }
            }
        }
    }

    app.sign_out().await.context("sign-out failed")?;
    tracing::info!(navigations = navigator.history().len(), "done");
    Ok(())
}
