//! User management commands.

use prizey_core::UserId;
use prizey_server::db::PgStore;
use prizey_server::services::auth::AuthService;

use super::{CommandError, connect};

/// Create a credential user, with the same validation as `/api/auth/register`.
pub async fn create(
    email: &str,
    password: &str,
    name: Option<String>,
) -> Result<UserId, CommandError> {
    let store = PgStore::new(connect().await?);

    let user = AuthService::new(&store)
        .register(email, password, name)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}",
        user.id,
        user.email
    );
    Ok(user.id)
}
