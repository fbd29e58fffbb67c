//! The per-render data bundle.
//!
//! A [`RenderContext`] aggregates everything a template may reference:
//! one customer, one insurance policy, one quotation (all optional) and a
//! flattened settings snapshot. It is built once per render, used, and
//! discarded — never persisted, never shared across requests.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::DbId;
use crate::variables;

/// How the context for a render is sourced.
///
/// A closed set dispatched by `match` — entity kinds are never resolved
/// from request-supplied type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ContextSource {
    /// Load one customer, optionally with one of their policies.
    FromCustomer {
        customer_id: DbId,
        insurance_id: Option<DbId>,
    },
    /// Load one policy and its owning customer.
    FromInsurance { insurance_id: DbId },
    /// Load one quotation and its owning customer.
    FromQuotation { quotation_id: DbId },
    /// Pick one real customer at random for previews.
    Sample,
}

/// Customer fields available to templates.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerData {
    pub id: DbId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Insurance policy fields available to templates.
#[derive(Debug, Clone, PartialEq)]
pub struct InsuranceData {
    pub id: DbId,
    pub policy_number: String,
    pub policy_type: String,
    pub company: String,
    pub premium_amount: f64,
    pub start_date: NaiveDate,
    pub expiry_date: NaiveDate,
}

/// Quotation fields available to templates.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotationData {
    pub id: DbId,
    pub quotation_number: String,
    pub vehicle_model: Option<String>,
    pub quoted_amount: f64,
    pub valid_until: NaiveDate,
}

/// Format a date the way templates render it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Format a monetary amount the way templates render it.
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// The resolved bundle of business data available to one render call.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub customer: Option<CustomerData>,
    pub insurance: Option<InsuranceData>,
    pub quotation: Option<QuotationData>,
    /// Settings snapshot keyed `category.key` (category prefix stripped
    /// from the stored key). Loaded once at build time.
    pub settings: BTreeMap<String, String>,
    /// Render date for `{current_date}`; injected so renders are
    /// deterministic.
    pub today: Option<NaiveDate>,
}

impl RenderContext {
    /// Resolve a single token to its rendered value.
    ///
    /// Resolution order: direct catalogue field on a loaded entity, then
    /// dotted path, then settings snapshot (`category.key` exact match,
    /// then bare key searched in category order). `None` means the token
    /// stays in the output untouched.
    ///
    /// Where both a policy and a quotation could answer the same token
    /// (`reference_number`, `amount`), the policy is authoritative.
    pub fn resolve(&self, token: &str) -> Option<String> {
        if let Some(value) = self.resolve_direct(token) {
            return Some(value);
        }
        if let Some(value) = self.resolve_dotted(token) {
            return Some(value);
        }
        self.resolve_setting(token)
    }

    /// Catalogue-named fields plus the policy-over-quotation aliases.
    fn resolve_direct(&self, token: &str) -> Option<String> {
        let customer = self.customer.as_ref();
        let insurance = self.insurance.as_ref();
        let quotation = self.quotation.as_ref();

        match token {
            "customer_name" => customer.map(|c| c.name.clone()),
            "customer_email" => customer.and_then(|c| c.email.clone()),
            "customer_phone" => customer.and_then(|c| c.phone.clone()),

            "policy_number" => insurance.map(|i| i.policy_number.clone()),
            "policy_type" => insurance.map(|i| i.policy_type.clone()),
            "policy_company" => insurance.map(|i| i.company.clone()),
            "premium_amount" => insurance.map(|i| format_amount(i.premium_amount)),
            "policy_start_date" => insurance.map(|i| format_date(i.start_date)),
            "policy_expiry_date" => insurance.map(|i| format_date(i.expiry_date)),

            "quotation_number" => quotation.map(|q| q.quotation_number.clone()),
            "quoted_amount" => quotation.map(|q| format_amount(q.quoted_amount)),
            "vehicle_model" => quotation.and_then(|q| q.vehicle_model.clone()),
            "quotation_valid_until" => quotation.map(|q| format_date(q.valid_until)),

            // Shared aliases: the policy answers when both are loaded.
            "reference_number" => insurance
                .map(|i| i.policy_number.clone())
                .or_else(|| quotation.map(|q| q.quotation_number.clone())),
            "amount" => insurance
                .map(|i| format_amount(i.premium_amount))
                .or_else(|| quotation.map(|q| format_amount(q.quoted_amount))),

            "current_date" => self.today.map(format_date),

            _ => None,
        }
    }

    /// Dotted paths: `customer.name`, `policy.premium_amount`, ...
    fn resolve_dotted(&self, token: &str) -> Option<String> {
        let (entity, field) = token.split_once('.')?;
        match entity {
            "customer" => {
                let c = self.customer.as_ref()?;
                match field {
                    "name" => Some(c.name.clone()),
                    "email" => c.email.clone(),
                    "phone" => c.phone.clone(),
                    _ => None,
                }
            }
            "policy" | "insurance" => {
                let i = self.insurance.as_ref()?;
                match field {
                    "number" | "policy_number" => Some(i.policy_number.clone()),
                    "type" | "policy_type" => Some(i.policy_type.clone()),
                    "company" => Some(i.company.clone()),
                    "premium" | "premium_amount" => Some(format_amount(i.premium_amount)),
                    "start_date" => Some(format_date(i.start_date)),
                    "expiry_date" => Some(format_date(i.expiry_date)),
                    _ => None,
                }
            }
            "quotation" => {
                let q = self.quotation.as_ref()?;
                match field {
                    "number" | "quotation_number" => Some(q.quotation_number.clone()),
                    "amount" | "quoted_amount" => Some(format_amount(q.quoted_amount)),
                    "vehicle_model" => q.vehicle_model.clone(),
                    "valid_until" => Some(format_date(q.valid_until)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Settings snapshot lookup: exact `category.key`, then bare key
    /// searched across categories in listing order.
    fn resolve_setting(&self, token: &str) -> Option<String> {
        if token.contains('.') {
            return self.settings.get(token).cloned();
        }
        for category in variables::all_categories() {
            let key = format!("{category}.{token}");
            if let Some(value) = self.settings.get(&key) {
                return Some(value.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_customer() -> CustomerData {
        CustomerData {
            id: 1,
            name: "Ada Rossi".into(),
            email: Some("ada@example.com".into()),
            phone: Some("+391234567".into()),
        }
    }

    fn sample_insurance() -> InsuranceData {
        InsuranceData {
            id: 10,
            policy_number: "POL-2024-001".into(),
            policy_type: "auto".into(),
            company: "Helvet Mutual".into(),
            premium_amount: 540.5,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        }
    }

    fn sample_quotation() -> QuotationData {
        QuotationData {
            id: 20,
            quotation_number: "Q-77".into(),
            vehicle_model: Some("Fiat Panda".into()),
            quoted_amount: 321.0,
            valid_until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    #[test]
    fn resolves_direct_customer_fields() {
        let ctx = RenderContext {
            customer: Some(sample_customer()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve("customer_name").as_deref(), Some("Ada Rossi"));
        assert_eq!(
            ctx.resolve("customer_email").as_deref(),
            Some("ada@example.com")
        );
        assert_eq!(ctx.resolve("policy_number"), None);
    }

    #[test]
    fn formats_dates_and_amounts() {
        let ctx = RenderContext {
            insurance: Some(sample_insurance()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve("policy_expiry_date").as_deref(), Some("2025-03-01"));
        assert_eq!(ctx.resolve("premium_amount").as_deref(), Some("540.50"));
    }

    #[test]
    fn resolves_dotted_paths() {
        let ctx = RenderContext {
            customer: Some(sample_customer()),
            insurance: Some(sample_insurance()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve("customer.name").as_deref(), Some("Ada Rossi"));
        assert_eq!(ctx.resolve("policy.premium").as_deref(), Some("540.50"));
        assert_eq!(ctx.resolve("insurance.company").as_deref(), Some("Helvet Mutual"));
        assert_eq!(ctx.resolve("policy.nope"), None);
    }

    #[test]
    fn policy_wins_over_quotation_for_shared_aliases() {
        let both = RenderContext {
            insurance: Some(sample_insurance()),
            quotation: Some(sample_quotation()),
            ..Default::default()
        };
        assert_eq!(both.resolve("reference_number").as_deref(), Some("POL-2024-001"));
        assert_eq!(both.resolve("amount").as_deref(), Some("540.50"));

        let quotation_only = RenderContext {
            quotation: Some(sample_quotation()),
            ..Default::default()
        };
        assert_eq!(quotation_only.resolve("reference_number").as_deref(), Some("Q-77"));
        assert_eq!(quotation_only.resolve("amount").as_deref(), Some("321.00"));
    }

    #[test]
    fn settings_resolve_by_exact_key_then_bare_key() {
        let mut settings = BTreeMap::new();
        settings.insert("company.advisor_name".to_string(), "Marco".to_string());
        settings.insert("general.footer".to_string(), "Reply STOP to opt out".to_string());
        let ctx = RenderContext {
            settings,
            ..Default::default()
        };

        assert_eq!(ctx.resolve("company.advisor_name").as_deref(), Some("Marco"));
        assert_eq!(ctx.resolve("advisor_name").as_deref(), Some("Marco"));
        assert_eq!(ctx.resolve("footer").as_deref(), Some("Reply STOP to opt out"));
        assert_eq!(ctx.resolve("missing_setting"), None);
    }

    #[test]
    fn current_date_uses_injected_today() {
        let ctx = RenderContext {
            today: Some(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()),
            ..Default::default()
        };
        assert_eq!(ctx.resolve("current_date").as_deref(), Some("2024-06-15"));
        assert_eq!(RenderContext::default().resolve("current_date"), None);
    }
}
