use serde::{Deserialize, Serialize};

/// Body for POST /users. Fields are optional so an incomplete body reaches the
/// handler and gets a 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
}

/// Body for PUT /users/{id}; only supplied fields are written.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
}

impl UpdateUserRequest {
    pub fn has_changes(&self) -> bool {
        self.name.is_some()
            || self.email.is_some()
            || self.password.is_some()
            || self.dob.is_some()
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub message: &'static str,
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
