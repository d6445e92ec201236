pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, AuthenticatedUser, LoginResult, UserInfo};
pub use auth_service_impl::DefaultAuthService;

pub mod credentials;
pub use credentials::CredentialStore;

pub mod login_limiter;
pub use login_limiter::{BlockStatus, FailureOutcome, LimiterPolicy, LoginLimiter};

pub mod password;
pub use password::PasswordHashing;

pub mod token;
pub use token::{Claims, TokenSigner};
