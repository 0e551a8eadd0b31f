// Endpoints that require a valid access token but no further guard.

pub mod auth;
