use uuid::Uuid;

/// Authenticated caller, passed explicitly into every access operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub email: Option<String>,
}

impl SessionIdentity {
    pub fn new(user_id: Uuid, email: Option<String>) -> Self {
        Self {
            user_id,
            email: email.filter(|value| !value.trim().is_empty()),
        }
    }
}
