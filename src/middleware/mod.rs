mod secret_auth;

pub use secret_auth::*;
