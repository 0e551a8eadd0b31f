// Administrative endpoints. Every route here sits behind `authenticate`
// plus a guard from `middleware::guards`; handlers assume both ran.

pub mod denials;
pub mod integrity;
pub mod permissions;
pub mod roles;
pub mod tenants;
pub mod users;
