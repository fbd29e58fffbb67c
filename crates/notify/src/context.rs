//! Render context assembly.
//!
//! [`ContextBuilder`] resolves a [`ContextSource`] against an
//! [`EntitySource`] into the pure [`RenderContext`] the renderer consumes.
//! The settings snapshot is loaded once per build and travels inside the
//! context; nothing here is cached across requests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use meridian_core::context::{
    ContextSource, CustomerData, InsuranceData, QuotationData, RenderContext,
};
use meridian_core::error::CoreError;
use meridian_core::types::DbId;
use meridian_db::models::customer::Customer;
use meridian_db::models::insurance::Insurance;
use meridian_db::models::quotation::Quotation;
use meridian_db::models::setting::Setting;

use crate::error::NotifyError;
use crate::source::EntitySource;

/// Builds per-render contexts from live entity data.
#[derive(Clone)]
pub struct ContextBuilder {
    source: Arc<dyn EntitySource>,
}

impl ContextBuilder {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self { source }
    }

    /// Resolve a context source into a ready-to-render context.
    ///
    /// Fails with [`CoreError::NotFound`] when a referenced id does not
    /// exist. Read-only; nothing is persisted.
    pub async fn build(&self, source: ContextSource) -> Result<RenderContext, NotifyError> {
        let mut ctx = self.base_context().await?;

        match source {
            ContextSource::FromCustomer {
                customer_id,
                insurance_id,
            } => {
                let customer = self.require_customer(customer_id).await?;
                ctx.customer = Some(customer_data(&customer));
                if let Some(insurance_id) = insurance_id {
                    let insurance = self.require_insurance(insurance_id).await?;
                    ctx.insurance = Some(insurance_data(&insurance));
                }
            }
            ContextSource::FromInsurance { insurance_id } => {
                let insurance = self.require_insurance(insurance_id).await?;
                let customer = self.require_customer(insurance.customer_id).await?;
                ctx.customer = Some(customer_data(&customer));
                ctx.insurance = Some(insurance_data(&insurance));
            }
            ContextSource::FromQuotation { quotation_id } => {
                let quotation = self.require_quotation(quotation_id).await?;
                let customer = self.require_customer(quotation.customer_id).await?;
                ctx.customer = Some(customer_data(&customer));
                ctx.quotation = Some(quotation_data(&quotation));
            }
            ContextSource::Sample => {
                let customer = self
                    .source
                    .random_customer()
                    .await?
                    .ok_or(CoreError::NotFound {
                        entity: "Customer",
                        id: 0,
                    })?;
                if let Some(insurance) = self.source.latest_insurance(customer.id).await? {
                    ctx.insurance = Some(insurance_data(&insurance));
                }
                ctx.customer = Some(customer_data(&customer));
            }
        }

        Ok(ctx)
    }

    /// Context for one campaign recipient: the lead plus their most
    /// recent policy, so policy variables resolve in campaign templates.
    pub async fn build_for_lead(&self, lead: &Customer) -> Result<RenderContext, NotifyError> {
        let mut ctx = self.base_context().await?;
        ctx.customer = Some(customer_data(lead));
        if let Some(insurance) = self.source.latest_insurance(lead.id).await? {
            ctx.insurance = Some(insurance_data(&insurance));
        }
        Ok(ctx)
    }

    /// Settings snapshot + render date, shared by every build path.
    async fn base_context(&self) -> Result<RenderContext, NotifyError> {
        let settings = self.source.settings().await?;
        Ok(RenderContext {
            settings: flatten_settings(&settings),
            today: Some(Utc::now().date_naive()),
            ..Default::default()
        })
    }

    async fn require_customer(&self, id: DbId) -> Result<Customer, NotifyError> {
        self.source
            .customer(id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Customer",
                    id,
                }
                .into()
            })
    }

    async fn require_insurance(&self, id: DbId) -> Result<Insurance, NotifyError> {
        self.source
            .insurance(id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Insurance",
                    id,
                }
                .into()
            })
    }

    async fn require_quotation(&self, id: DbId) -> Result<Quotation, NotifyError> {
        self.source
            .quotation(id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "Quotation",
                    id,
                }
                .into()
            })
    }
}

/// Flatten settings rows into the `category.key` snapshot map.
///
/// Stored keys carry their category prefix (`company_advisor_name` in
/// category `company`); the prefix is stripped so the snapshot key is
/// `company.advisor_name`.
pub fn flatten_settings(settings: &[Setting]) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for setting in settings {
        let prefix = format!("{}_", setting.category);
        let bare_key = setting
            .key
            .strip_prefix(&prefix)
            .unwrap_or(setting.key.as_str());
        map.insert(
            format!("{}.{}", setting.category, bare_key),
            setting.value.clone(),
        );
    }
    map
}

fn customer_data(customer: &Customer) -> CustomerData {
    CustomerData {
        id: customer.id,
        name: customer.name.clone(),
        email: customer.email.clone(),
        phone: customer.phone.clone(),
    }
}

fn insurance_data(insurance: &Insurance) -> InsuranceData {
    InsuranceData {
        id: insurance.id,
        policy_number: insurance.policy_number.clone(),
        policy_type: insurance.policy_type.clone(),
        company: insurance.company.clone(),
        premium_amount: insurance.premium_amount,
        start_date: insurance.start_date,
        expiry_date: insurance.expiry_date,
    }
}

fn quotation_data(quotation: &Quotation) -> QuotationData {
    QuotationData {
        id: quotation.id,
        quotation_number: quotation.quotation_number.clone(),
        vehicle_model: quotation.vehicle_model.clone(),
        quoted_amount: quotation.quoted_amount,
        valid_until: quotation.valid_until,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::NaiveDate;

    use super::*;
    use crate::source::MemoryEntitySource;

    fn customer(id: DbId, is_lead: bool) -> Customer {
        Customer {
            id,
            name: format!("Customer {id}"),
            email: Some(format!("c{id}@example.com")),
            phone: Some(format!("+3900{id}")),
            is_lead,
            created_at: Utc::now(),
        }
    }

    fn insurance(id: DbId, customer_id: DbId, start: NaiveDate) -> Insurance {
        Insurance {
            id,
            customer_id,
            policy_number: format!("POL-{id}"),
            policy_type: "auto".into(),
            company: "Helvet Mutual".into(),
            premium_amount: 250.0,
            start_date: start,
            expiry_date: start + chrono::Duration::days(365),
            created_at: Utc::now(),
        }
    }

    fn builder(source: MemoryEntitySource) -> ContextBuilder {
        ContextBuilder::new(Arc::new(source))
    }

    #[tokio::test]
    async fn builds_from_customer_with_latest_policy_on_sample() {
        let source = MemoryEntitySource::new();
        source.add_customer(customer(1, false));
        source.add_insurance(insurance(
            10,
            1,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        ));
        source.add_insurance(insurance(
            11,
            1,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        ));

        let ctx = builder(source).build(ContextSource::Sample).await.unwrap();
        assert_eq!(ctx.customer.as_ref().unwrap().id, 1);
        // The most recently started policy wins.
        assert_eq!(ctx.insurance.as_ref().unwrap().policy_number, "POL-11");
    }

    #[tokio::test]
    async fn from_insurance_loads_owning_customer() {
        let source = MemoryEntitySource::new();
        source.add_customer(customer(7, false));
        source.add_insurance(insurance(
            70,
            7,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        ));

        let ctx = builder(source)
            .build(ContextSource::FromInsurance { insurance_id: 70 })
            .await
            .unwrap();
        assert_eq!(ctx.customer.as_ref().unwrap().id, 7);
        assert_eq!(ctx.insurance.as_ref().unwrap().id, 70);
    }

    #[tokio::test]
    async fn unknown_ids_fail_with_not_found() {
        let source = MemoryEntitySource::new();
        let err = builder(source)
            .build(ContextSource::FromCustomer {
                customer_id: 99,
                insurance_id: None,
            })
            .await
            .unwrap_err();
        assert_matches!(
            err,
            NotifyError::Core(CoreError::NotFound { entity: "Customer", .. })
        );
    }

    #[test]
    fn flatten_strips_category_prefix() {
        let settings = vec![
            Setting {
                id: 1,
                category: "company".into(),
                key: "company_advisor_name".into(),
                value: "Marco".into(),
            },
            Setting {
                id: 2,
                category: "general".into(),
                key: "footer".into(),
                value: "Bye".into(),
            },
        ];
        let map = flatten_settings(&settings);
        assert_eq!(map.get("company.advisor_name").map(String::as_str), Some("Marco"));
        assert_eq!(map.get("general.footer").map(String::as_str), Some("Bye"));
    }
}
