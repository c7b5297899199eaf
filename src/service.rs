//! Batch fan-out of restriction and offer lookups across marketplaces.

use crate::aggregate::{AggregatedResult, Aggregator, Slot};
use crate::config::Config;
use crate::dispatch::{self, TaskOutcome};
use crate::error::{Error, Failure, FailureKind};
use crate::marketplace::client::RemoteRequest;
use crate::marketplace::models::{OfferSummary, RestrictionStatus};
use crate::marketplace::normalize;
use crate::marketplace::regions::Marketplace;
use crate::marketplace::router::RegionRouter;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Body of `POST /batch/scan`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub asins: Vec<String>,
    #[serde(default)]
    pub marketplace_ids: Vec<String>,
    pub condition_type: Option<String>,
    pub item_condition: Option<String>,
    /// Already clamped into the dispatcher's range; `None` means the default.
    #[serde(default, deserialize_with = "lenient_concurrency")]
    pub concurrency: Option<usize>,
}

/// Accepts any JSON value for `concurrency`. Numbers and numeric strings are
/// clamped into `MIN_CONCURRENCY..=MAX_CONCURRENCY`; zero, null and anything
/// non-numeric fall back to the configured default.
fn lenient_concurrency<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    Ok(number.filter(|n| n.is_finite() && *n != 0.0).map(|n| {
        n.clamp(dispatch::MIN_CONCURRENCY as f64, dispatch::MAX_CONCURRENCY as f64) as usize
    }))
}

/// Body of `POST /restrictions` and `POST /offers`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    #[serde(default)]
    pub asin: String,
    #[serde(default)]
    pub marketplace_ids: Vec<String>,
    pub condition_type: Option<String>,
    pub item_condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Restrictions,
    Offers,
}

/// Operation plus its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Restrictions { condition_type: String },
    Offers { item_condition: String },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Restrictions { .. } => OperationKind::Restrictions,
            Operation::Offers { .. } => OperationKind::Offers,
        }
    }
}

/// One independent unit of work: one operation for one ASIN in one marketplace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTask {
    pub asin: String,
    pub marketplace: String,
    pub operation: Operation,
}

/// Normalized payload of a successful task.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Restrictions(RestrictionStatus),
    Offers(OfferSummary),
}

/// Diagnostic entry for a failed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    pub asin: String,
    pub marketplace_id: String,
    pub operation: OperationKind,
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl TaskError {
    fn new(task: &BatchTask, failure: &Failure) -> Self {
        Self {
            asin: task.asin.clone(),
            marketplace_id: task.marketplace.clone(),
            operation: task.operation.kind(),
            kind: failure.kind,
            message: failure.message.clone(),
            status: failure.status,
        }
    }
}

/// Aggregated outcome of a dispatched batch.
#[derive(Debug)]
pub struct BatchReport {
    pub restrictions: AggregatedResult<RestrictionStatus>,
    pub offers: AggregatedResult<OfferSummary>,
    pub errors: Vec<TaskError>,
}

/// Both operations for one ASIN, keyed by marketplace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityResults {
    pub restrictions: BTreeMap<String, Slot<RestrictionStatus>>,
    pub offers: BTreeMap<String, Slot<OfferSummary>>,
}

/// Response of `POST /batch/scan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResponse {
    pub results: BTreeMap<String, EntityResults>,
    pub errors: Vec<TaskError>,
    pub count: usize,
}

/// Response of the single-ASIN lookups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupResponse<T> {
    pub results: BTreeMap<String, Slot<T>>,
    pub errors: Vec<TaskError>,
}

/// Fans catalog lookups out across marketplaces.
pub struct CatalogService {
    router: Arc<RegionRouter>,
    retry: RetryPolicy,
    seller_id: Option<String>,
    concurrency: usize,
    max_batch: usize,
    condition_type: String,
    item_condition: String,
}

impl CatalogService {
    pub fn new(config: &Config, router: Arc<RegionRouter>) -> Self {
        Self {
            router,
            retry: RetryPolicy::from_config(config),
            seller_id: config.seller_id.clone(),
            concurrency: config.concurrency,
            max_batch: config.max_batch,
            condition_type: config.condition_type.clone(),
            item_condition: config.item_condition.clone(),
        }
    }

    /// Listing restrictions for one ASIN across marketplaces.
    pub async fn restrictions(
        &self,
        request: LookupRequest,
    ) -> Result<LookupResponse<RestrictionStatus>, Error> {
        let asins = validate_asins(std::slice::from_ref(&request.asin), 1)?;
        let marketplaces = validate_marketplaces(&request.marketplace_ids)?;
        self.require_seller_id()?;

        let condition_type = request.condition_type.unwrap_or_else(|| self.condition_type.clone());
        let ops = [Operation::Restrictions { condition_type }];
        let mut report = self.dispatch_batch(&asins, &marketplaces, &ops, self.concurrency).await;

        Ok(LookupResponse {
            results: report.restrictions.remove(&asins[0]).unwrap_or_default(),
            errors: report.errors,
        })
    }

    /// Offer summaries for one ASIN across marketplaces.
    pub async fn offers(&self, request: LookupRequest) -> Result<LookupResponse<OfferSummary>, Error> {
        let asins = validate_asins(std::slice::from_ref(&request.asin), 1)?;
        let marketplaces = validate_marketplaces(&request.marketplace_ids)?;

        let item_condition = request.item_condition.unwrap_or_else(|| self.item_condition.clone());
        let ops = [Operation::Offers { item_condition }];
        let mut report = self.dispatch_batch(&asins, &marketplaces, &ops, self.concurrency).await;

        Ok(LookupResponse {
            results: report.offers.remove(&asins[0]).unwrap_or_default(),
            errors: report.errors,
        })
    }

    /// Restrictions and offers for every ASIN × marketplace pair.
    ///
    /// Input is validated before anything is dispatched; after that, task
    /// failures only show up in their own slots and in `errors`.
    pub async fn scan(&self, request: BatchRequest) -> Result<ScanResponse, Error> {
        let asins = validate_asins(&request.asins, self.max_batch)?;
        let marketplaces = validate_marketplaces(&request.marketplace_ids)?;
        self.require_seller_id()?;

        let ops = [
            Operation::Restrictions {
                condition_type: request
                    .condition_type
                    .unwrap_or_else(|| self.condition_type.clone()),
            },
            Operation::Offers {
                item_condition: request.item_condition.unwrap_or_else(|| self.item_condition.clone()),
            },
        ];
        let concurrency = request.concurrency.unwrap_or(self.concurrency);

        info!("Scanning {} ASINs across {} marketplaces", asins.len(), marketplaces.len());
        let report = self.dispatch_batch(&asins, &marketplaces, &ops, concurrency).await;

        let mut offers = report.offers;
        let results = report
            .restrictions
            .into_iter()
            .map(|(asin, restrictions)| {
                let offers = offers.remove(&asin).unwrap_or_default();
                (asin, EntityResults { restrictions, offers })
            })
            .collect();

        Ok(ScanResponse { results, errors: report.errors, count: asins.len() })
    }

    /// Dispatches every (ASIN, marketplace, operation) combination and
    /// aggregates the outcomes. Inputs are taken as already validated.
    ///
    /// Empty inputs return an empty report without dispatching anything.
    pub async fn dispatch_batch(
        &self,
        asins: &[String],
        marketplaces: &[String],
        ops: &[Operation],
        concurrency: usize,
    ) -> BatchReport {
        let wants = |kind: OperationKind| ops.iter().any(|op| op.kind() == kind);
        let none: &[String] = &[];

        let mut restrictions = Aggregator::new(
            if wants(OperationKind::Restrictions) { asins } else { none },
            marketplaces,
        );
        let mut offers =
            Aggregator::new(if wants(OperationKind::Offers) { asins } else { none }, marketplaces);

        let tasks = build_tasks(asins, marketplaces, ops);
        let queued: Vec<&BatchTask> = tasks.iter().collect();
        let outcomes = dispatch::run(queued, concurrency, |task| self.run_task(task)).await;

        let mut errors = Vec::new();
        for (task, outcome) in tasks.iter().zip(outcomes) {
            let (asin, marketplace) = (task.asin.as_str(), task.marketplace.as_str());
            match outcome {
                TaskOutcome::Success { value: Normalized::Restrictions(value) } => {
                    restrictions.settle(asin, marketplace, TaskOutcome::Success { value });
                }
                TaskOutcome::Success { value: Normalized::Offers(value) } => {
                    offers.settle(asin, marketplace, TaskOutcome::Success { value });
                }
                TaskOutcome::Failure { reason } => {
                    debug!("{:?} {}/{} failed: {}", task.operation.kind(), asin, marketplace, reason);
                    errors.push(TaskError::new(task, &reason));
                    match task.operation.kind() {
                        OperationKind::Restrictions => {
                            restrictions.settle(asin, marketplace, TaskOutcome::Failure { reason });
                        }
                        OperationKind::Offers => {
                            offers.settle(asin, marketplace, TaskOutcome::Failure { reason });
                        }
                    }
                }
            }
        }

        let unsettled = restrictions.pending() + offers.pending();
        if unsettled > 0 {
            warn!("{} slots left without an outcome", unsettled);
        }

        BatchReport {
            restrictions: restrictions.into_result(),
            offers: offers.into_result(),
            errors,
        }
    }

    /// Resolves the route, calls the API with retries, and normalizes the body.
    async fn run_task(&self, task: &BatchTask) -> Result<Normalized, Error> {
        let route = self.router.resolve(&task.marketplace).await?;
        let marketplace_id = route.marketplace.id();

        let request = match &task.operation {
            Operation::Restrictions { condition_type } => {
                let seller_id = self.require_seller_id()?;
                RemoteRequest::restrictions(&task.asin, seller_id, marketplace_id, condition_type)
            }
            Operation::Offers { item_condition } => {
                RemoteRequest::offers(&task.asin, marketplace_id, item_condition)
            }
        };

        let body = self.retry.call(request.operation, || route.client.invoke(&request)).await?;

        let normalized = match task.operation {
            Operation::Restrictions { .. } => {
                Normalized::Restrictions(normalize::restrictions(&body, marketplace_id)?)
            }
            Operation::Offers { .. } => Normalized::Offers(normalize::offers(&body)?),
        };
        Ok(normalized)
    }

    fn require_seller_id(&self) -> Result<&str, Error> {
        self.seller_id
            .as_deref()
            .ok_or_else(|| Error::Config("seller id is not configured (FANOUT_SELLER_ID)".to_string()))
    }
}

/// Cross product of ASINs × marketplaces × operations, in that nesting order.
pub fn build_tasks(asins: &[String], marketplaces: &[String], ops: &[Operation]) -> Vec<BatchTask> {
    let mut tasks = Vec::with_capacity(asins.len() * marketplaces.len() * ops.len());
    for asin in asins {
        for marketplace in marketplaces {
            for operation in ops {
                tasks.push(BatchTask {
                    asin: asin.clone(),
                    marketplace: marketplace.clone(),
                    operation: operation.clone(),
                });
            }
        }
    }
    tasks
}

/// Trims, uppercases, de-duplicates and validates ASINs.
pub fn validate_asins(raw: &[String], max_batch: usize) -> Result<Vec<String>, Error> {
    let mut seen = HashSet::new();
    let mut asins = Vec::new();

    for asin in raw {
        let asin = asin.trim().to_uppercase();
        if asin.is_empty() {
            continue;
        }
        if asin.len() != 10 || !asin.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::MalformedInput(format!(
                "Invalid ASIN format: '{}'. ASIN should be 10 alphanumeric characters.",
                asin
            )));
        }
        if seen.insert(asin.clone()) {
            asins.push(asin);
        }
    }

    if asins.is_empty() {
        return Err(Error::MalformedInput("Provide body.asins = [ ... ]".to_string()));
    }
    if asins.len() > max_batch {
        return Err(Error::MalformedInput(format!(
            "At most {} ASINs per batch, got {}",
            max_batch,
            asins.len()
        )));
    }

    Ok(asins)
}

/// Trims and de-duplicates marketplace keys, keeping the first spelling
/// seen. A code and its marketplace id (`us`, `ATVPDKIKX0DER`) count as the
/// same marketplace. Unknown keys pass through and fail per task.
///
/// At most one key per known marketplace is accepted.
pub fn validate_marketplaces(raw: &[String]) -> Result<Vec<String>, Error> {
    let limit = Marketplace::all().len();
    let mut seen = HashSet::new();
    let mut marketplaces = Vec::new();

    for key in raw {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let identity = Marketplace::lookup(key)
            .map(|m| m.id().to_string())
            .unwrap_or_else(|_| key.to_string());
        if !seen.insert(identity) {
            continue;
        }

        if marketplaces.len() == limit {
            return Err(Error::MalformedInput(format!(
                "At most {} marketplaces per batch",
                limit
            )));
        }
        marketplaces.push(key.to_string());
    }

    if marketplaces.is_empty() {
        return Err(Error::MalformedInput("Provide body.marketplaceIds = [ ... ]".to_string()));
    }
    Ok(marketplaces)
}
