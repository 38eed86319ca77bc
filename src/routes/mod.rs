/// Router Module Index
///
/// Splits the API by access level. Authentication is applied per module at the router
/// layer; role checks happen inside the handlers through `AuthUser::require_role`.

/// Routes reachable without a token.
pub mod public;

/// Routes behind the authentication middleware, open to any role.
pub mod authenticated;

/// Routes behind the authentication middleware whose handlers require the admin role.
pub mod admin;
