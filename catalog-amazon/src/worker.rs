use crate::api::{LookupError, ProductAdvertisingApi};
use crate::response::Item;
use async_trait::async_trait;
use catalog_types::logger::Logger;
use catalog_types::product::{Product, ProductRepository};
use catalog_types::provider::{AmazonProvider, ProviderRepository, AMAZON_SLUG};
use catalog_types::shop::{Shop, ShopTemplateRepository};
use catalog_types::update::{
    should_update, BatchUpdateTask, Cadence, Configuration, SkipReason, UpdateError,
    UpdateInterval, UpdateOutcome, UpdateWorker,
};
use catalog_types::{deserialize_duration_from_string, AffiliateProductId};
use derive_more::Constructor;
use itertools::Itertools;
use log_error::LogError;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, Save};
use typesafe_repository::IdentityOf;

pub const NAME: &str = "amazon";
/// Item ids accepted by a single `ItemLookup` request.
pub const MAX_LOOKUP_IDS: usize = 10;

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FieldIntervals {
    pub thumbnail: Option<UpdateInterval>,
    pub image_gallery: Option<UpdateInterval>,
    pub availability: Option<UpdateInterval>,
    pub affiliate_link: Option<UpdateInterval>,
    pub price: Option<UpdateInterval>,
    pub old_price: Option<UpdateInterval>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AmazonOptions {
    #[serde(default)]
    pub intervals: FieldIntervals,
    #[serde(default = "default_min_tasks")]
    pub min_tasks: i64,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: i64,
    #[serde(
        default = "default_throttle_backoff",
        deserialize_with = "deserialize_duration_from_string"
    )]
    pub throttle_backoff: Duration,
}

impl Default for AmazonOptions {
    fn default() -> Self {
        Self {
            intervals: FieldIntervals::default(),
            min_tasks: default_min_tasks(),
            max_tasks: default_max_tasks(),
            throttle_backoff: default_throttle_backoff(),
        }
    }
}

fn default_min_tasks() -> i64 {
    1
}

fn default_max_tasks() -> i64 {
    MAX_LOOKUP_IDS as i64
}

fn default_throttle_backoff() -> Duration {
    Duration::from_secs(3)
}

#[derive(Constructor)]
pub struct AmazonUpdateWorker {
    products: Arc<dyn ProductRepository>,
    shop_templates: Arc<dyn ShopTemplateRepository>,
    providers: Arc<dyn ProviderRepository>,
    api: Arc<dyn ProductAdvertisingApi>,
    logger: Logger,
    options: AmazonOptions,
}

impl AmazonUpdateWorker {
    /// Collects at most `limit` ids, one per product, in batch order.
    async fn find_affiliate_product_ids(
        &self,
        products: &[Product],
        limit: usize,
    ) -> Vec<(IdentityOf<Product>, AffiliateProductId)> {
        let mut ids = vec![];
        for product in products {
            if ids.len() >= limit {
                break;
            }
            for shop in product.display_shops() {
                if let Some(id) = self.amazon_affiliate_product_id(shop).await {
                    ids.push((product.id, id));
                    break;
                }
            }
        }
        ids
    }

    async fn amazon_affiliate_product_id(&self, shop: &Shop) -> Option<AffiliateProductId> {
        let id = shop.affiliate_product_id()?;
        let template = self
            .shop_templates
            .get_one(&shop.template_id)
            .await
            .log_error("Unable to get shop template")
            .flatten()?;
        let provider = self
            .providers
            .get_one(&template.provider_id?)
            .await
            .log_error("Unable to get provider")
            .flatten()?;
        (provider.slug.as_str() == AMAZON_SLUG).then(|| id.clone())
    }

    async fn lookup(
        &self,
        provider: &AmazonProvider,
        ids: &[AffiliateProductId],
    ) -> Result<Vec<Item>, LookupError> {
        match self.api.item_lookup(provider, ids).await {
            Err(LookupError::Throttled) => {
                let backoff = self.options.throttle_backoff;
                self.logger.alert(
                    &format!(
                        "Amazon throttled the update request, retry after {} seconds",
                        backoff.as_secs()
                    ),
                    NAME,
                );
                tokio::time::sleep(backoff).await;
                self.api.item_lookup(provider, ids).await
            }
            res => res,
        }
    }

    fn apply(&self, product: &mut Product, item: &Item, cadence: Cadence, now: OffsetDateTime) {
        let intervals = &self.options.intervals;
        if should_update(cadence, intervals.thumbnail) {
            product.thumbnail = item.thumbnail();
            product.touch(now);
        }
        if should_update(cadence, intervals.image_gallery) {
            product.image_gallery = item.image_gallery();
            product.touch(now);
        }
        let changed = if product.is_complex() {
            match product.default_variant_mut() {
                Some(variant) => {
                    let changed = self.apply_to_shops(variant.shops_mut(), item, cadence, now);
                    if changed {
                        variant.touch(now);
                    }
                    changed
                }
                None => false,
            }
        } else {
            self.apply_to_shops(product.shops_mut(), item, cadence, now)
        };
        if changed {
            product.touch(now);
        }
    }

    fn apply_to_shops(
        &self,
        shops: &mut [Shop],
        item: &Item,
        cadence: Cadence,
        now: OffsetDateTime,
    ) -> bool {
        let intervals = &self.options.intervals;
        let asin = item.affiliate_product_id();
        let mut changed = false;
        for shop in shops
            .iter_mut()
            .filter(|s| s.affiliate_product_id() == Some(&asin))
        {
            if should_update(cadence, intervals.availability) {
                shop.pricing.availability = item.availability();
                shop.touch(now);
                changed = true;
            }
            if should_update(cadence, intervals.affiliate_link) {
                if let Some(link) = item.affiliate_link() {
                    shop.tracking.affiliate_link = Some(link);
                }
                shop.touch(now);
                changed = true;
            }
            let available = shop.is_available();
            if should_update(cadence, intervals.price) {
                shop.pricing.price = item.price().filter(|_| available);
                shop.touch(now);
                changed = true;
            }
            if should_update(cadence, intervals.old_price) {
                shop.pricing.old_price = item.old_price().filter(|_| available);
                shop.touch(now);
                changed = true;
            }
        }
        changed
    }
}

#[async_trait]
impl UpdateWorker for AmazonUpdateWorker {
    fn name(&self) -> &str {
        NAME
    }

    fn configure(&self, config: &mut Configuration) {
        config
            .set(Configuration::PROVIDER_SLUG, AMAZON_SLUG)
            .set(Configuration::MIN_TASKS, self.options.min_tasks)
            .set(Configuration::MAX_TASKS, self.options.max_tasks);
    }

    async fn execute(
        &self,
        batch: BatchUpdateTask,
        cadence: Cadence,
    ) -> Result<UpdateOutcome, UpdateError> {
        let (provider, products) = batch.into_parts();
        if !provider.is_amazon() {
            return Ok(UpdateOutcome::Skipped(SkipReason::ForeignProvider));
        }
        let amazon = AmazonProvider::try_from(&provider).map_err(UpdateError::Credentials)?;
        if products.is_empty() {
            return Ok(UpdateOutcome::Skipped(SkipReason::NoProducts));
        }
        self.logger.debug(
            &format!(
                "Trying to find Amazon ASINs for products with IDs: {} ({cadence})",
                products.iter().map(|p| p.id).join(", ")
            ),
            NAME,
        );
        let ids = self
            .find_affiliate_product_ids(&products, MAX_LOOKUP_IDS)
            .await;
        if ids.is_empty() {
            return Ok(UpdateOutcome::Skipped(SkipReason::NoAffiliateProductIds));
        }
        let asins = ids.iter().map(|(_, a)| a.clone()).collect::<Vec<_>>();
        self.logger.debug(
            &format!(
                "Doing Amazon update request for products with ASINs: {} ({cadence})",
                asins.iter().join(", ")
            ),
            NAME,
        );
        let items = match self.lookup(&amazon, &asins).await {
            Ok(items) => items,
            Err(err) => {
                self.logger
                    .error(&format!("Amazon update request failed: {err}"), NAME);
                return Err(UpdateError::Lookup(err.into()));
            }
        };
        if items.is_empty() {
            self.logger
                .error(&format!("Amazon returned no items ({cadence})"), NAME);
            return Ok(UpdateOutcome::Skipped(SkipReason::NoItemsReturned));
        }

        let now = OffsetDateTime::now_utc();
        let mut stored = 0;
        for mut product in products {
            let Some(item) = ids
                .iter()
                .find(|(id, _)| *id == product.id)
                .and_then(|(_, asin)| items.iter().find(|i| i.asin == asin.as_str()))
            else {
                continue;
            };
            self.logger.debug(
                &format!(
                    "Applying the new data from the Amazon update request to the product #{} ({}) ({cadence})",
                    product.id, product.name
                ),
                NAME,
            );
            self.apply(&mut product, item, cadence, now);
            let (id, name) = (product.id, product.name.clone());
            match self.products.save(product).await {
                Ok(()) => {
                    self.logger.debug(
                        &format!("Stored the updated product #{id} ({name}) ({cadence})"),
                        NAME,
                    );
                    stored += 1;
                }
                Err(err) => self
                    .logger
                    .error(&format!("Unable to store product #{id}: {err:#}"), NAME),
            }
        }
        Ok(UpdateOutcome::Updated { stored })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::parse_lookup_response;
    use crate::response::test::TWO_ITEMS;
    use catalog_types::logger::{Handler, Level};
    use catalog_types::memory::InMemoryRepository;
    use catalog_types::product::ProductKind;
    use catalog_types::provider::{Provider, ProviderType};
    use catalog_types::shop::{Pricing, ShopTemplate, Tracking};
    use catalog_types::{AffiliateLink, Availability, Currency, Money};
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApi {
        responses: Mutex<VecDeque<Result<Vec<Item>, LookupError>>>,
        calls: Mutex<Vec<Vec<AffiliateProductId>>>,
    }

    impl FakeApi {
        fn respond(&self, res: Result<Vec<Item>, LookupError>) {
            self.responses.lock().unwrap().push_back(res);
        }

        fn calls(&self) -> Vec<Vec<AffiliateProductId>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProductAdvertisingApi for FakeApi {
        async fn item_lookup(
            &self,
            _: &AmazonProvider,
            ids: &[AffiliateProductId],
        ) -> Result<Vec<Item>, LookupError> {
            self.calls.lock().unwrap().push(ids.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(vec![]))
        }
    }

    #[derive(Default)]
    struct Records(Mutex<Vec<(Level, String)>>);

    impl Records {
        fn count(&self, level: Level) -> usize {
            self.0.lock().unwrap().iter().filter(|(l, _)| *l == level).count()
        }
    }

    impl Handler for Records {
        fn name(&self) -> &str {
            "records"
        }

        fn handle(&self, message: &str, level: Level, _: &str, _: OffsetDateTime) {
            self.0.lock().unwrap().push((level, message.to_string()));
        }
    }

    struct Fixture {
        products: Arc<InMemoryRepository<Product>>,
        api: Arc<FakeApi>,
        records: Arc<Records>,
        provider: Provider,
        template: ShopTemplate,
        worker: AmazonUpdateWorker,
    }

    const LONG_AGO: OffsetDateTime = time::macros::datetime!(2020-01-01 00:00 UTC);

    async fn fixture(options: AmazonOptions) -> Fixture {
        let products = Arc::new(InMemoryRepository::<Product>::new());
        let templates = Arc::new(InMemoryRepository::<ShopTemplate>::new());
        let providers = Arc::new(InMemoryRepository::<Provider>::new());
        let api = Arc::new(FakeApi::default());
        let records = Arc::new(Records::default());
        let provider = Provider::amazon(
            [
                ("access_key", "AKIA"),
                ("secret_key", "secret"),
                ("country", "de"),
                ("associate_tag", "tag-21"),
            ]
            .into_iter()
            .collect(),
        )
        .unwrap();
        providers.save(provider.clone()).await.unwrap();
        let template = ShopTemplate::new("Amazon", Some(provider.id));
        templates.save(template.clone()).await.unwrap();
        let worker = AmazonUpdateWorker::new(
            products.clone(),
            templates,
            providers,
            api.clone(),
            Logger::new(vec![records.clone()]),
            options,
        );
        Fixture {
            products,
            api,
            records,
            provider,
            template,
            worker,
        }
    }

    impl Fixture {
        fn shop(&self, asin: &str, availability: Availability) -> Shop {
            let mut shop = Shop::new(
                &self.template,
                Tracking {
                    affiliate_link: Some(AffiliateLink("https://old.example".into())),
                    affiliate_product_id: Some(AffiliateProductId(asin.into())),
                },
                Pricing {
                    availability,
                    price: Some(Money::new(dec!(1), Currency::new("EUR"))),
                    old_price: None,
                },
            );
            shop.updated_at = LONG_AGO;
            shop
        }

        fn product(&self, asin: &str, availability: Availability) -> Product {
            let mut p = Product::simple(asin, vec![self.shop(asin, availability)]);
            p.updated_at = LONG_AGO;
            p
        }

        fn batch(&self, products: Vec<Product>) -> BatchUpdateTask {
            let mut batch = BatchUpdateTask::new(self.provider.clone(), Some(100));
            for p in products {
                batch.add_product(p);
            }
            batch
        }

        async fn stored(&self, id: &IdentityOf<Product>) -> Product {
            self.products.get_one(id).await.unwrap().unwrap()
        }
    }

    fn items() -> Vec<Item> {
        parse_lookup_response(TWO_ITEMS).unwrap()
    }

    fn only(interval: UpdateInterval) -> FieldIntervals {
        FieldIntervals {
            thumbnail: Some(interval),
            image_gallery: Some(interval),
            availability: Some(interval),
            affiliate_link: Some(interval),
            price: Some(interval),
            old_price: Some(interval),
        }
    }

    #[tokio::test]
    async fn skips_foreign_provider_and_empty_batches() {
        let f = fixture(AmazonOptions::default()).await;
        let mut other = f.provider.clone();
        other.kind = ProviderType::Other("ebay".to_string());
        let batch = BatchUpdateTask::new(other, None);
        assert_eq!(
            UpdateOutcome::Skipped(SkipReason::ForeignProvider),
            f.worker.execute(batch, Cadence::Hourly).await.unwrap()
        );
        assert_eq!(
            UpdateOutcome::Skipped(SkipReason::NoProducts),
            f.worker.execute(f.batch(vec![]), Cadence::Hourly).await.unwrap()
        );
        let unrelated = Product::simple("Book", vec![]);
        assert_eq!(
            UpdateOutcome::Skipped(SkipReason::NoAffiliateProductIds),
            f.worker
                .execute(f.batch(vec![unrelated]), Cadence::Hourly)
                .await
                .unwrap()
        );
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test]
    async fn ignores_shops_of_other_providers() {
        let f = fixture(AmazonOptions::default()).await;
        let mut product = f.product("B000000001", Availability::Available);
        product.shops_mut()[0].template_id = uuid::Uuid::new_v4();
        assert_eq!(
            UpdateOutcome::Skipped(SkipReason::NoAffiliateProductIds),
            f.worker
                .execute(f.batch(vec![product]), Cadence::Hourly)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn refreshes_all_fields_hourly_by_default() {
        let f = fixture(AmazonOptions::default()).await;
        f.api.respond(Ok(items()));
        let first = f.product("B000000001", Availability::OutOfStock);
        let second = f.product("B000000002", Availability::Available);
        let (first_id, second_id) = (first.id, second.id);

        let outcome = f
            .worker
            .execute(f.batch(vec![first, second]), Cadence::Hourly)
            .await
            .unwrap();
        assert_eq!(UpdateOutcome::Updated { stored: 2 }, outcome);
        assert_eq!(
            vec![vec![
                AffiliateProductId("B000000001".into()),
                AffiliateProductId("B000000002".into())
            ]],
            f.api.calls()
        );

        let first = f.stored(&first_id).await;
        assert_eq!(
            Some("https://images.example/1-large.jpg"),
            first.thumbnail.as_ref().map(|i| i.url.as_str())
        );
        assert_eq!(2, first.image_gallery.len());
        assert!(first.updated_at > LONG_AGO);
        let shop = &first.shops()[0];
        assert!(shop.is_available());
        assert_eq!(Some(dec!(299.99)), shop.pricing.price.as_ref().map(|p| p.value));
        assert_eq!(Some(dec!(349.99)), shop.pricing.old_price.as_ref().map(|p| p.value));
        assert_eq!(
            Some(AffiliateLink("https://www.amazon.de/dp/B000000001?tag=tag-21".into())),
            shop.tracking.affiliate_link
        );
        assert!(shop.updated_at > LONG_AGO);

        let second = f.stored(&second_id).await;
        let shop = &second.shops()[0];
        assert!(!shop.is_available());
        assert_eq!(None, shop.pricing.price);
        assert_eq!(None, shop.pricing.old_price);
        // no DetailPageURL in the response
        assert_eq!(
            Some(AffiliateLink("https://old.example".into())),
            shop.tracking.affiliate_link
        );
    }

    #[tokio::test]
    async fn respects_field_intervals() {
        let f = fixture(AmazonOptions {
            intervals: FieldIntervals {
                price: Some(UpdateInterval::Daily),
                ..only(UpdateInterval::None)
            },
            ..Default::default()
        })
        .await;
        let product = f.product("B000000001", Availability::Available);
        let id = product.id;

        f.api.respond(Ok(items()));
        f.worker
            .execute(f.batch(vec![product.clone()]), Cadence::Hourly)
            .await
            .unwrap();
        let stored = f.stored(&id).await;
        assert_eq!(LONG_AGO, stored.updated_at);
        assert_eq!(product.shops(), stored.shops());
        assert_eq!(None, stored.thumbnail);

        f.api.respond(Ok(items()));
        f.worker
            .execute(f.batch(vec![product]), Cadence::Daily)
            .await
            .unwrap();
        let stored = f.stored(&id).await;
        assert!(stored.updated_at > LONG_AGO);
        let shop = &stored.shops()[0];
        assert_eq!(Some(dec!(299.99)), shop.pricing.price.as_ref().map(|p| p.value));
        assert_eq!(None, shop.pricing.old_price);
        assert_eq!(
            Some(AffiliateLink("https://old.example".into())),
            shop.tracking.affiliate_link
        );
        assert_eq!(None, stored.thumbnail);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_once_after_throttling() {
        let f = fixture(AmazonOptions::default()).await;
        f.api.respond(Err(LookupError::Throttled));
        f.api.respond(Ok(items()));
        let product = f.product("B000000001", Availability::Available);
        let started = tokio::time::Instant::now();
        let outcome = f
            .worker
            .execute(f.batch(vec![product]), Cadence::Hourly)
            .await
            .unwrap();
        assert_eq!(UpdateOutcome::Updated { stored: 1 }, outcome);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(2, f.api.calls().len());
        assert_eq!(1, f.records.count(Level::Alert));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_second_failure() {
        let f = fixture(AmazonOptions::default()).await;
        f.api.respond(Err(LookupError::Throttled));
        f.api.respond(Err(LookupError::Throttled));
        let product = f.product("B000000001", Availability::Available);
        let res = f
            .worker
            .execute(f.batch(vec![product]), Cadence::Hourly)
            .await;
        assert!(matches!(res, Err(UpdateError::Lookup(_))));
        assert_eq!(2, f.api.calls().len());
        assert_eq!(1, f.records.count(Level::Alert));
        assert_eq!(1, f.records.count(Level::Error));
        assert_eq!(0, f.products.len().await);
    }

    #[tokio::test]
    async fn does_not_retry_other_errors() {
        let f = fixture(AmazonOptions::default()).await;
        f.api.respond(Err(LookupError::Api {
            code: "InvalidClientTokenId".into(),
            message: "bad key".into(),
        }));
        let product = f.product("B000000001", Availability::Available);
        assert!(f
            .worker
            .execute(f.batch(vec![product]), Cadence::Hourly)
            .await
            .is_err());
        assert_eq!(1, f.api.calls().len());
        assert_eq!(0, f.records.count(Level::Alert));
    }

    #[tokio::test]
    async fn reports_empty_lookup() {
        let f = fixture(AmazonOptions::default()).await;
        let product = f.product("B000000001", Availability::Available);
        assert_eq!(
            UpdateOutcome::Skipped(SkipReason::NoItemsReturned),
            f.worker
                .execute(f.batch(vec![product]), Cadence::Hourly)
                .await
                .unwrap()
        );
        assert_eq!(1, f.records.count(Level::Error));
    }

    #[tokio::test]
    async fn caps_lookup_ids() {
        let f = fixture(AmazonOptions::default()).await;
        let products = (0..12)
            .map(|i| f.product(&format!("B0000000{i:02}"), Availability::Available))
            .collect();
        f.worker
            .execute(f.batch(products), Cadence::Hourly)
            .await
            .unwrap();
        let calls = f.api.calls();
        assert_eq!(MAX_LOOKUP_IDS, calls[0].len());
        assert_eq!(AffiliateProductId("B000000000".into()), calls[0][0]);
    }

    #[tokio::test]
    async fn updates_default_variant_of_complex_product() {
        let f = fixture(AmazonOptions::default()).await;
        f.api.respond(Ok(items()));
        let mut shirt = Product::complex("Shirt");
        shirt.updated_at = LONG_AGO;
        shirt.add_variant("S", vec![], vec![f.shop("B000000009", Availability::Available)]);
        let m = shirt
            .add_variant("M", vec![], vec![f.shop("B000000001", Availability::OutOfStock)])
            .unwrap();
        shirt.set_default_variant(&m);
        let id = shirt.id;

        f.worker
            .execute(f.batch(vec![shirt]), Cadence::Hourly)
            .await
            .unwrap();
        let stored = f.stored(&id).await;
        let variant = stored.default_variant().unwrap();
        assert!(variant.shops()[0].is_available());
        assert!(variant.updated_at > LONG_AGO);
        assert!(matches!(stored.kind, ProductKind::Complex { .. }));
        assert_eq!(
            f.shop("B000000009", Availability::Available).pricing,
            stored.variants()[0].shops()[0].pricing
        );
    }
}
