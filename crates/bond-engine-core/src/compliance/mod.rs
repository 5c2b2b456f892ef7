pub mod regulatory;

pub use regulatory::{
    aggregate_status, assess_compliance, check_compliance, ComplianceReport, ComplianceStatus,
    RegulatoryBounds, RuleEvaluation,
};
