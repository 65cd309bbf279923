mod download;
mod home;
mod info;
mod links;
mod providers;
mod queue;
mod search;
mod transfer;

pub use download::cmd_download;
pub use home::cmd_home;
pub use info::cmd_info;
pub use links::cmd_links;
pub use providers::{cmd_providers_list, cmd_providers_use};
pub use queue::{cmd_list, cmd_queue};
pub use search::cmd_search;
pub use transfer::{cmd_cancel, cmd_convert, cmd_delete, cmd_pause, cmd_resume};
