use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Address, User};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddAddressRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: User,
    pub addresses: Vec<Address>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub count: i64,
    pub items: Vec<User>,
}
