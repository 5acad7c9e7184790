use actix::prelude::*;
use affiliate_catalog::options::{Backend, CatalogOptions};
use affiliate_catalog::update::timer::{Activate, Deactivate};
use affiliate_catalog::update::{
    InMemorySemaphoreStore, InMemoryUpdateQueue, SemaphoreStore, SqliteSemaphoreStore,
    SqliteUpdateQueue, UpdateManager, UpdateMediator, UpdateQueue, UpdateQueues,
    UpdateSemaphore, UpdateTimer,
};
use affiliate_catalog::{FileSystemRepository, SqliteProductRepository};
use catalog_amazon::{AmazonUpdateWorker, PaApiClient};
use catalog_types::logger::Logger;
use catalog_types::product::ProductRepository;
use catalog_types::provider::{Provider, ProviderRepository, ProviderType, AMAZON_SLUG};
use catalog_types::shop::{ShopTemplate, ShopTemplateRepository};
use log_error::LogError;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_rusqlite::Connection;

#[actix_rt::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    let options = CatalogOptions::from_env()?;

    if let Some(dir) = options
        .storage
        .database
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
    {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(&options.storage.database).await?;
    let products: Arc<dyn ProductRepository> =
        Arc::new(SqliteProductRepository::init(conn.clone()).await?);
    let shop_templates: Arc<dyn ShopTemplateRepository> = Arc::new(
        FileSystemRepository::<ShopTemplate>::new(&options.storage.shop_template_dir),
    );
    let providers: Arc<dyn ProviderRepository> = Arc::new(
        FileSystemRepository::<Provider>::new(&options.storage.provider_dir),
    );

    if let Some(provider) = options
        .amazon_credentials
        .sync(providers.as_ref())
        .await
        .log_error("Unable to configure Amazon provider")
        .flatten()
    {
        log::info!("Using Amazon provider {}", provider.id);
    }

    let amazon_queue: Arc<dyn UpdateQueue> = match options.update.queue {
        Backend::Sqlite => Arc::new(
            SqliteUpdateQueue::init(
                conn.clone(),
                AMAZON_SLUG,
                Some(ProviderType::Amazon),
                products.clone(),
                providers.clone(),
            )
            .await?,
        ),
        Backend::Memory => Arc::new(InMemoryUpdateQueue::new(
            AMAZON_SLUG,
            Some(ProviderType::Amazon),
        )),
    };
    let semaphore_store: Arc<dyn SemaphoreStore> = match options.update.semaphore {
        Backend::Sqlite => Arc::new(
            SqliteSemaphoreStore::init(conn.clone(), options.update.semaphore_stale_after).await?,
        ),
        Backend::Memory => Arc::new(InMemorySemaphoreStore::default()),
    };

    let client = reqwest::Client::builder()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .timeout(Duration::from_secs(30))
        .build()?;
    let amazon = Arc::new(AmazonUpdateWorker::new(
        products.clone(),
        shop_templates.clone(),
        providers.clone(),
        Arc::new(PaApiClient::new(client)),
        Logger::default(),
        options.amazon.clone(),
    ));

    let mediator = UpdateMediator::new(
        shop_templates,
        providers,
        UpdateQueues::new(vec![amazon_queue]),
    );
    let manager = UpdateManager::new(
        products,
        mediator,
        vec![amazon],
        options.update.batches_per_run,
    );
    let timer = UpdateTimer::new(UpdateSemaphore::new(semaphore_store), Arc::new(manager)).start();
    timer.send(Activate).await?;

    if let Err(err) = signal::ctrl_c().await {
        log::error!("Unable to listen to shutdown: {err}");
    }
    log::info!("Shutting down");
    timer.send(Deactivate).await?;
    Ok(())
}
