pub mod refresh_token;
pub mod user;

pub use refresh_token::{generate_token_value, RefreshToken, TOKEN_VALUE_LEN};
pub use user::{Role, User, UserProfile};
