pub mod calendar;
pub mod holidays;
pub mod leave_request;
pub mod payroll;
pub mod timesheet;
pub mod users;

use serde::Deserialize;
use utoipa::ToSchema;

/// Body of a reject call; approve takes none.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DecisionBody {
    #[schema(example = "Overlaps the release freeze")]
    pub reason: Option<String>,
}
