use reqwest::Method;
use tracing::{debug, warn};

use shared_database::{Query, SupabaseClient};
use shared_models::auth::{Session, UserRoleRow};
use shared_models::entities::Role;

/// Looks the user up in `user_roles`; falls back to admin only for the
/// configured admin e-mail and to professional for everyone else.
pub async fn resolve_role(supabase: &SupabaseClient, session: &Session, admin_email: &str) -> Role {
    let path = Query::new()
        .select("role")
        .eq("user_id", &session.user.id)
        .limit(1)
        .to_path("user_roles");

    match supabase
        .request::<Vec<UserRoleRow>>(Method::GET, &path, Some(&session.access_token), None)
        .await
    {
        Ok(rows) => {
            if let Some(row) = rows.first() {
                debug!("Role for {} resolved from user_roles: {}", session.user.id, row.role);
                return row.role;
            }
        }
        Err(e) => warn!("Role lookup failed for {}: {}", session.user.id, e),
    }

    fallback_role(session.user.email.as_deref(), admin_email)
}

pub fn fallback_role(email: Option<&str>, admin_email: &str) -> Role {
    match email {
        Some(email) if !admin_email.is_empty() && email.eq_ignore_ascii_case(admin_email) => Role::Admin,
        _ => Role::Professional,
    }
}
