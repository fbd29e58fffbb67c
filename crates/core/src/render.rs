//! Template renderer.
//!
//! Substitutes `{token}` placeholders against a [`RenderContext`]. Tokens
//! that do not resolve are passed through unchanged so previews stay
//! legible and a half-configured template never aborts a send. Rendering
//! is pure: same body + same context = same output, and a fully resolved
//! body renders to itself.

use std::borrow::Cow;

use crate::context::RenderContext;
use crate::variables::token_regex;

/// Render a template body against a context.
///
/// Each `{token}` is resolved via [`RenderContext::resolve`]; unresolved
/// tokens remain in the output verbatim.
pub fn render(body: &str, ctx: &RenderContext) -> String {
    token_regex()
        .replace_all(body, |caps: &regex::Captures<'_>| {
            match ctx.resolve(&caps[1]) {
                Some(value) => Cow::Owned(value),
                None => Cow::Owned(caps[0].to_string()),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::context::{CustomerData, InsuranceData};

    fn ctx() -> RenderContext {
        let mut settings = BTreeMap::new();
        settings.insert("company.company_name".to_string(), "Meridian Broker".to_string());
        RenderContext {
            customer: Some(CustomerData {
                id: 1,
                name: "Ada Rossi".into(),
                email: Some("ada@example.com".into()),
                phone: None,
            }),
            insurance: Some(InsuranceData {
                id: 2,
                policy_number: "POL-9".into(),
                policy_type: "auto".into(),
                company: "Helvet Mutual".into(),
                premium_amount: 120.0,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                expiry_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            }),
            quotation: None,
            settings,
            today: Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        }
    }

    #[test]
    fn substitutes_known_tokens() {
        let out = render(
            "Dear {customer_name}, policy {policy_number} expires {policy_expiry_date}.",
            &ctx(),
        );
        assert_eq!(out, "Dear Ada Rossi, policy POL-9 expires 2025-01-01.");
    }

    #[test]
    fn unknown_tokens_pass_through_unchanged() {
        let out = render("Hello {unknown_var}!", &ctx());
        assert_eq!(out, "Hello {unknown_var}!");
    }

    #[test]
    fn missing_entity_leaves_token_in_place() {
        let out = render("Quote {quotation_number}", &ctx());
        assert_eq!(out, "Quote {quotation_number}");
    }

    #[test]
    fn render_is_idempotent_once_fully_resolved() {
        let context = ctx();
        let once = render("Hi {customer_name}, premium {premium_amount}.", &context);
        let twice = render(&once, &context);
        assert_eq!(once, twice);
        assert_eq!(once, "Hi Ada Rossi, premium 120.00.");
    }

    #[test]
    fn settings_and_general_tokens_render() {
        let out = render("{company_name} — {current_date}", &ctx());
        assert_eq!(out, "Meridian Broker — 2024-06-01");
    }

    #[test]
    fn body_without_tokens_is_untouched() {
        let body = "Plain text with no placeholders.";
        assert_eq!(render(body, &ctx()), body);
    }

    #[test]
    fn mixed_resolved_and_unresolved_tokens() {
        let out = render("{customer_name} / {mystery} / {policy_type}", &ctx());
        assert_eq!(out, "Ada Rossi / {mystery} / auto");
    }
}
