pub mod schedule;

pub use schedule::{
    build_schedule, CostSchedule, PaymentPeriod, PaymentSchedule, PeriodPhase, ScheduleSummary,
};
