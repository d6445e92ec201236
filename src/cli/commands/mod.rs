mod init;
mod limiter;
mod user;

pub use init::cmd_init;
pub use limiter::{cmd_limiter_cleanup, cmd_limiter_clear, cmd_limiter_status};
pub use user::{cmd_user_add, cmd_user_list, cmd_user_passwd};

use crate::config::Config;
use crate::db::Store;

/// Open the data directory named by `config` for a one-off command.
async fn open_store(config: &Config) -> anyhow::Result<Store> {
    Store::open(&config.general.data_dir).await
}
