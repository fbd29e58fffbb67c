//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument. Status moves and campaign
//! counter changes are single conditional statements whose
//! `rows_affected` result tells the caller whether the transition
//! actually happened.

pub mod campaign_repo;
pub mod campaign_target_repo;
pub mod customer_repo;
pub mod insurance_repo;
pub mod notification_log_repo;
pub mod quotation_repo;
pub mod setting_repo;
pub mod template_repo;

pub use campaign_repo::CampaignRepo;
pub use campaign_target_repo::CampaignTargetRepo;
pub use customer_repo::CustomerRepo;
pub use insurance_repo::InsuranceRepo;
pub use notification_log_repo::NotificationLogRepo;
pub use quotation_repo::QuotationRepo;
pub use setting_repo::SettingRepo;
pub use template_repo::TemplateRepo;
