pub mod gate;
mod helpers;
mod middleware;
mod password;
mod token;

pub use gate::{authorize, require_owner};
pub use middleware::{AuthError, RequireAdmin, RequireAuth, RequireRoot, RequireUser};
pub use password::{Credentials, generate_client_credentials};
pub use token::{ApplicationClaims, TokenService, UserClaims, VerifiedToken, encode_claims};
