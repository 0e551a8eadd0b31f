// Tenant-scoped endpoints. Routed behind `authenticate` + `validate_scope`;
// the scope a handler uses always comes from the `ValidatedScope` extension.

pub mod resources;
