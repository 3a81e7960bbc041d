/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules,
/// enforcing a Defense-in-Depth strategy. This structure ensures that
/// access control is applied explicitly at the module level (via Axum layers),
/// preventing accidental exposure of protected endpoints.
///
/// The three modules map directly to the defined access roles.

/// Routes accessible to all callers (anonymous or authenticated).
/// Read handlers resolve an optional identity and enforce visibility
/// server-side through the Access Policy and the repository queries.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware.
/// Requires a validated user session.
pub mod authenticated;

/// Routes restricted exclusively to staff users.
/// The admin check itself is a policy decision inside the service layer.
pub mod admin;
