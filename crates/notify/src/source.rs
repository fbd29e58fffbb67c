//! Entity data source seam.
//!
//! [`EntitySource`] exposes the business records a render or a campaign
//! expansion reads: customers, insurance policies, quotations, and the
//! settings table. [`PgEntitySource`] backs it with the repository layer;
//! [`MemoryEntitySource`] backs it with in-process maps for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use meridian_core::error::CoreError;
use meridian_core::types::DbId;
use meridian_db::models::customer::Customer;
use meridian_db::models::insurance::Insurance;
use meridian_db::models::quotation::Quotation;
use meridian_db::models::setting::Setting;
use meridian_db::repositories::{CustomerRepo, InsuranceRepo, QuotationRepo, SettingRepo};
use meridian_db::DbPool;
use serde::Deserialize;

use crate::error::{NotifyError, StoreError};

// ---------------------------------------------------------------------------
// Target criteria
// ---------------------------------------------------------------------------

/// Parsed `target_criteria` of a campaign or bulk send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetCriteria {
    /// An explicit list of customer ids.
    ByIds { customer_ids: Vec<DbId> },
    /// A named segment: `all_leads` or `all_customers`.
    Segment { segment: String },
}

impl TargetCriteria {
    /// Parse the stored JSON criteria, rejecting unknown shapes.
    pub fn parse(value: &serde_json::Value) -> Result<Self, CoreError> {
        let criteria: TargetCriteria = serde_json::from_value(value.clone())
            .map_err(|_| CoreError::Validation("Unrecognised target criteria".to_string()))?;
        if let TargetCriteria::Segment { segment } = &criteria {
            if segment != "all_leads" && segment != "all_customers" {
                return Err(CoreError::Validation(format!(
                    "Unknown target segment: {segment}"
                )));
            }
        }
        Ok(criteria)
    }
}

// ---------------------------------------------------------------------------
// EntitySource
// ---------------------------------------------------------------------------

/// Read access to the entities templates and campaigns draw on.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn customer(&self, id: DbId) -> Result<Option<Customer>, StoreError>;

    async fn insurance(&self, id: DbId) -> Result<Option<Insurance>, StoreError>;

    async fn quotation(&self, id: DbId) -> Result<Option<Quotation>, StoreError>;

    /// The customer's most recently started policy, if any.
    async fn latest_insurance(&self, customer_id: DbId) -> Result<Option<Insurance>, StoreError>;

    /// One real customer picked at random (sample previews).
    async fn random_customer(&self) -> Result<Option<Customer>, StoreError>;

    /// The full settings table for a per-render snapshot.
    async fn settings(&self) -> Result<Vec<Setting>, StoreError>;

    /// Expand target criteria into concrete customers, in enumeration
    /// order.
    async fn expand_targets(
        &self,
        criteria: &serde_json::Value,
    ) -> Result<Vec<Customer>, NotifyError>;
}

// ---------------------------------------------------------------------------
// PgEntitySource
// ---------------------------------------------------------------------------

/// [`EntitySource`] implementation over the repository layer.
#[derive(Clone)]
pub struct PgEntitySource {
    pool: DbPool,
}

impl PgEntitySource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntitySource for PgEntitySource {
    async fn customer(&self, id: DbId) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepo::find_by_id(&self.pool, id).await?)
    }

    async fn insurance(&self, id: DbId) -> Result<Option<Insurance>, StoreError> {
        Ok(InsuranceRepo::find_by_id(&self.pool, id).await?)
    }

    async fn quotation(&self, id: DbId) -> Result<Option<Quotation>, StoreError> {
        Ok(QuotationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn latest_insurance(&self, customer_id: DbId) -> Result<Option<Insurance>, StoreError> {
        Ok(InsuranceRepo::latest_for_customer(&self.pool, customer_id).await?)
    }

    async fn random_customer(&self) -> Result<Option<Customer>, StoreError> {
        Ok(CustomerRepo::random(&self.pool).await?)
    }

    async fn settings(&self) -> Result<Vec<Setting>, StoreError> {
        Ok(SettingRepo::list_all(&self.pool).await?)
    }

    async fn expand_targets(
        &self,
        criteria: &serde_json::Value,
    ) -> Result<Vec<Customer>, NotifyError> {
        match TargetCriteria::parse(criteria)? {
            TargetCriteria::ByIds { customer_ids } => {
                Ok(CustomerRepo::list_by_ids(&self.pool, &customer_ids)
                    .await
                    .map_err(StoreError::from)?)
            }
            TargetCriteria::Segment { segment } => {
                let customers = if segment == "all_leads" {
                    CustomerRepo::list_leads(&self.pool).await
                } else {
                    CustomerRepo::list_all(&self.pool).await
                };
                Ok(customers.map_err(StoreError::from)?)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryEntitySource
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryEntities {
    customers: HashMap<DbId, Customer>,
    insurances: HashMap<DbId, Insurance>,
    quotations: HashMap<DbId, Quotation>,
    settings: Vec<Setting>,
}

/// In-memory [`EntitySource`] for tests and local development.
#[derive(Default)]
pub struct MemoryEntitySource {
    inner: Mutex<MemoryEntities>,
}

impl MemoryEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_customer(&self, customer: Customer) {
        self.inner
            .lock()
            .unwrap()
            .customers
            .insert(customer.id, customer);
    }

    pub fn add_insurance(&self, insurance: Insurance) {
        self.inner
            .lock()
            .unwrap()
            .insurances
            .insert(insurance.id, insurance);
    }

    pub fn add_quotation(&self, quotation: Quotation) {
        self.inner
            .lock()
            .unwrap()
            .quotations
            .insert(quotation.id, quotation);
    }

    pub fn add_setting(&self, setting: Setting) {
        self.inner.lock().unwrap().settings.push(setting);
    }
}

#[async_trait]
impl EntitySource for MemoryEntitySource {
    async fn customer(&self, id: DbId) -> Result<Option<Customer>, StoreError> {
        Ok(self.inner.lock().unwrap().customers.get(&id).cloned())
    }

    async fn insurance(&self, id: DbId) -> Result<Option<Insurance>, StoreError> {
        Ok(self.inner.lock().unwrap().insurances.get(&id).cloned())
    }

    async fn quotation(&self, id: DbId) -> Result<Option<Quotation>, StoreError> {
        Ok(self.inner.lock().unwrap().quotations.get(&id).cloned())
    }

    async fn latest_insurance(&self, customer_id: DbId) -> Result<Option<Insurance>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut policies: Vec<_> = inner
            .insurances
            .values()
            .filter(|i| i.customer_id == customer_id)
            .cloned()
            .collect();
        policies.sort_by_key(|i| (i.start_date, i.id));
        Ok(policies.pop())
    }

    async fn random_customer(&self) -> Result<Option<Customer>, StoreError> {
        use rand::seq::IteratorRandom;

        let inner = self.inner.lock().unwrap();
        let mut rng = rand::rng();
        Ok(inner.customers.values().choose(&mut rng).cloned())
    }

    async fn settings(&self) -> Result<Vec<Setting>, StoreError> {
        Ok(self.inner.lock().unwrap().settings.clone())
    }

    async fn expand_targets(
        &self,
        criteria: &serde_json::Value,
    ) -> Result<Vec<Customer>, NotifyError> {
        let parsed = TargetCriteria::parse(criteria)?;
        let inner = self.inner.lock().unwrap();
        let mut customers: Vec<Customer> = match parsed {
            TargetCriteria::ByIds { customer_ids } => customer_ids
                .iter()
                .filter_map(|id| inner.customers.get(id).cloned())
                .collect(),
            TargetCriteria::Segment { segment } => inner
                .customers
                .values()
                .filter(|c| segment == "all_customers" || c.is_lead)
                .cloned()
                .collect(),
        };
        customers.sort_by_key(|c| c.id);
        Ok(customers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_id_list_criteria() {
        let value = serde_json::json!({ "customer_ids": [1, 2, 3] });
        assert!(matches!(
            TargetCriteria::parse(&value).unwrap(),
            TargetCriteria::ByIds { customer_ids } if customer_ids == vec![1, 2, 3]
        ));
    }

    #[test]
    fn parses_segment_criteria() {
        let value = serde_json::json!({ "segment": "all_leads" });
        assert!(matches!(
            TargetCriteria::parse(&value).unwrap(),
            TargetCriteria::Segment { .. }
        ));
    }

    #[test]
    fn rejects_unknown_segment_and_shape() {
        let bad_segment = serde_json::json!({ "segment": "everyone" });
        assert!(matches!(
            TargetCriteria::parse(&bad_segment),
            Err(CoreError::Validation(_))
        ));

        let bad_shape = serde_json::json!({ "filter": "x" });
        assert!(matches!(
            TargetCriteria::parse(&bad_shape),
            Err(CoreError::Validation(_))
        ));
    }
}
