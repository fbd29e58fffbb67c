//! Static catalogue of template variables.
//!
//! Drives the variable picker in the template editor and validates the
//! `{token}` placeholders of a template body. The catalogue is fixed at
//! compile time; resolution of a variable against live data happens in
//! [`context`](crate::context).

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Variable category for customer identity fields.
pub const CATEGORY_CUSTOMER: &str = "customer";

/// Variable category for policy (insurance) fields.
pub const CATEGORY_POLICY: &str = "policy";

/// Variable category for quotation fields.
pub const CATEGORY_QUOTATION: &str = "quotation";

/// Variable category for company/advisor settings.
pub const CATEGORY_COMPANY: &str = "company";

/// Variable category for generic values (dates etc.).
pub const CATEGORY_GENERAL: &str = "general";

/// A single known template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Variable {
    /// Token name as written inside `{...}`.
    pub name: &'static str,
    /// Human-readable label for the template editor.
    pub label: &'static str,
    /// Grouping category.
    pub category: &'static str,
}

const fn var(name: &'static str, label: &'static str, category: &'static str) -> Variable {
    Variable {
        name,
        label,
        category,
    }
}

/// The full variable catalogue, in display order within each category.
pub const CATALOGUE: &[Variable] = &[
    // Customer
    var("customer_name", "Customer full name", CATEGORY_CUSTOMER),
    var("customer_email", "Customer email address", CATEGORY_CUSTOMER),
    var("customer_phone", "Customer phone number", CATEGORY_CUSTOMER),
    // Policy
    var("policy_number", "Policy number", CATEGORY_POLICY),
    var("policy_type", "Policy type", CATEGORY_POLICY),
    var("policy_company", "Issuing company", CATEGORY_POLICY),
    var("premium_amount", "Premium amount", CATEGORY_POLICY),
    var("policy_start_date", "Policy start date", CATEGORY_POLICY),
    var("policy_expiry_date", "Policy expiry date", CATEGORY_POLICY),
    // Quotation
    var("quotation_number", "Quotation number", CATEGORY_QUOTATION),
    var("quoted_amount", "Quoted amount", CATEGORY_QUOTATION),
    var("vehicle_model", "Vehicle model", CATEGORY_QUOTATION),
    var("quotation_valid_until", "Quotation valid until", CATEGORY_QUOTATION),
    // Company settings
    var("advisor_name", "Advisor name", CATEGORY_COMPANY),
    var("company_name", "Company name", CATEGORY_COMPANY),
    var("company_phone", "Company phone", CATEGORY_COMPANY),
    var("company_email", "Company email", CATEGORY_COMPANY),
    // General
    var("current_date", "Current date", CATEGORY_GENERAL),
];

/// Category listing order (also the bare-key settings search order).
pub const CATEGORIES: &[&str] = &[
    CATEGORY_CUSTOMER,
    CATEGORY_POLICY,
    CATEGORY_QUOTATION,
    CATEGORY_COMPANY,
    CATEGORY_GENERAL,
];

/// Look up a variable by token name.
pub fn find(name: &str) -> Option<&'static Variable> {
    CATALOGUE.iter().find(|v| v.name == name)
}

/// Group the catalogue by category, optionally restricted to one category.
///
/// Unknown filter values yield an empty map rather than an error so the
/// listing endpoint stays total.
pub fn grouped_by_category(filter: Option<&str>) -> BTreeMap<&'static str, Vec<&'static Variable>> {
    let mut grouped: BTreeMap<&'static str, Vec<&'static Variable>> = BTreeMap::new();
    for variable in CATALOGUE {
        if let Some(wanted) = filter {
            if variable.category != wanted {
                continue;
            }
        }
        grouped.entry(variable.category).or_default().push(variable);
    }
    grouped
}

/// All known categories in display order.
pub fn all_categories() -> &'static [&'static str] {
    CATEGORIES
}

/// Regex matching `{token}` placeholders.
///
/// Token names are lowercase identifiers with optional dotted segments
/// (`customer.name`). Anything else inside braces is not a token and is
/// left alone by the renderer.
pub fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([a-z][a-z0-9_]*(?:\.[a-z][a-z0-9_]*)*)\}").unwrap())
}

/// Extract every `{token}` occurrence from a template body, in order,
/// without deduplication.
pub fn extract_tokens(body: &str) -> Vec<String> {
    token_regex()
        .captures_iter(body)
        .map(|c| c[1].to_string())
        .collect()
}

/// Tokens in `body` that are neither catalogue variables nor dotted paths.
///
/// Dotted paths are resolved structurally at render time, so they are not
/// flagged here even though the catalogue does not list them.
pub fn unknown_tokens(body: &str) -> Vec<String> {
    extract_tokens(body)
        .into_iter()
        .filter(|t| !t.contains('.') && find(t).is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grouped_by_category_covers_whole_catalogue() {
        let grouped = grouped_by_category(None);
        let total: usize = grouped.values().map(|v| v.len()).sum();
        assert_eq!(total, CATALOGUE.len());
        assert!(grouped.contains_key(CATEGORY_CUSTOMER));
        assert!(grouped.contains_key(CATEGORY_POLICY));
    }

    #[test]
    fn grouped_by_category_respects_filter() {
        let grouped = grouped_by_category(Some(CATEGORY_POLICY));
        assert_eq!(grouped.len(), 1);
        assert!(grouped[CATEGORY_POLICY]
            .iter()
            .all(|v| v.category == CATEGORY_POLICY));

        assert!(grouped_by_category(Some("nope")).is_empty());
    }

    #[test]
    fn extract_tokens_finds_plain_and_dotted() {
        let body = "Hi {customer_name}, policy {policy.number} ends {policy_expiry_date}.";
        assert_eq!(
            extract_tokens(body),
            vec!["customer_name", "policy.number", "policy_expiry_date"]
        );
    }

    #[test]
    fn extract_tokens_ignores_non_token_braces() {
        assert!(extract_tokens("JSON {\"a\": 1} and {X} and {}").is_empty());
    }

    #[test]
    fn unknown_tokens_flags_only_unlisted_plain_names() {
        let body = "{customer_name} {mystery_var} {customer.name}";
        assert_eq!(unknown_tokens(body), vec!["mystery_var"]);
    }

    #[test]
    fn find_resolves_catalogue_names() {
        assert_eq!(find("advisor_name").unwrap().category, CATEGORY_COMPANY);
        assert!(find("no_such_var").is_none());
    }
}
