use serde::{Deserialize, Serialize};

use crate::entities::Role;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<crate::services::UserInfo> for UserDto {
    fn from(info: crate::services::UserInfo) -> Self {
        Self {
            id: info.id,
            username: info.username,
            role: info.role,
            created_at: info.created_at,
            updated_at: info.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFileDto {
    pub filename: String,
    pub size: u64,
    pub modified: Option<String>,
}

impl From<crate::library::ContentFile> for ContentFileDto {
    fn from(file: crate::library::ContentFile) -> Self {
        Self {
            filename: file.filename,
            size: file.size,
            modified: file.modified.map(|t| t.to_rfc3339()),
        }
    }
}
