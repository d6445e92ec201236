//! Init command handler

use crate::config::Config;

pub fn cmd_init() -> anyhow::Result<()> {
    let path = Config::default_config_path();

    if Config::create_default_if_missing()? {
        println!("Wrote {}", path.display());
        println!("Set bootstrap.password (or FOLIO_ADMIN_PASSWORD) before first start,");
        println!("otherwise a generated password is printed to the log once.");
    } else {
        println!("{} already exists, leaving it untouched", path.display());
    }

    Ok(())
}
