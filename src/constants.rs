/// Cookie carrying the session token for browser clients.
pub const AUTH_COOKIE: &str = "auth-token";

/// Placeholder source address when no peer address is known (non-proxied dev setups).
pub const LOOPBACK_PLACEHOLDER: &str = "127.0.0.1";

pub mod headers {

    pub const FORWARDED_FOR: &str = "x-forwarded-for";

    pub const REAL_IP: &str = "x-real-ip";

    pub const CDN_CLIENT_IP: &str = "cf-connecting-ip";
}

pub mod env {

    pub const TOKEN_SECRET: &str = "FOLIO_TOKEN_SECRET";

    pub const ADMIN_PASSWORD: &str = "FOLIO_ADMIN_PASSWORD";
}

pub mod limits {

    pub const MIN_PASSWORD_LEN: usize = 8;

    pub const MAX_USERNAME_LEN: usize = 64;
}
