mod helpers;
mod rebuild;
mod report;
mod sync;
mod users;

pub(crate) use rebuild::cmd_rebuild;
pub(crate) use report::{cmd_report_nutrition, cmd_report_progress};
pub(crate) use sync::cmd_sync;
pub(crate) use users::cmd_users;
