// Shopdesk admin console

use tracing::{error, info, warn};

use shopdesk_client::{ApiError, ProductFilter};
use shopdesk_common::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .pretty()
        .init();

    info!("Starting Shopdesk admin console");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let console = shopdesk_app::create_console(config).map_err(|e| {
        error!("Failed to create console: {}", e);
        e
    })?;

    let _session_log = console.session.on_change(|authenticated| {
        info!(authenticated, "Session state changed");
    });

    if !console.session.is_authenticated() {
        let Some((username, password)) = console.config.credentials() else {
            anyhow::bail!("Not logged in; set SHOPDESK_USERNAME and SHOPDESK_PASSWORD");
        };
        console.client.auth().login(username, password).await?;
    }

    match console.client.products().list(1, &ProductFilter::default()).await {
        Ok(page) => {
            info!(
                total = page.total,
                pages = page.total_pages(shopdesk_client::PER_PAGE),
                "Products loaded"
            );
            for product in &page.items {
                println!(
                    "{:>6}  {:<40} {:>10.2} {:>6}",
                    product.id, product.name, product.price, product.stock
                );
            }
        }
        Err(ApiError::Unauthorized) => {
            warn!("Session ended by the backend, log in again");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
