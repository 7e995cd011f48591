mod caller;
mod license;
mod log_type;
mod models;

pub use caller::Caller;
pub use license::{MAX_LICENSE_LEVEL, get_ll_clock_segments};
pub use log_type::LogType;
pub use models::*;
