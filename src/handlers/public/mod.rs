// Endpoints reachable without a token: login and refresh only.

pub mod auth;
