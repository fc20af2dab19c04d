use serde::{Deserialize, Serialize};

use crate::error::AptSearchError;

const NICKNAME_MIN_CHARS: usize = 2;
const NICKNAME_MAX_CHARS: usize = 20;
const PROFILE_IMAGE_URL_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub account_id: i64,
    pub clerk_user_id: String,
    pub email: String,
    pub nickname: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<String>,
    pub created_at: String,
}

/// Body of `PATCH /auth/me`. Absent fields are left unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl ProfileUpdate {
    /// Trims fields and applies the backend's length rules before any request is made.
    pub fn normalized(&self) -> Result<Self, AptSearchError> {
        let nickname = self
            .nickname
            .as_deref()
            .map(str::trim)
            .map(str::to_string);
        let profile_image_url = self
            .profile_image_url
            .as_deref()
            .map(str::trim)
            .map(str::to_string);

        if nickname.is_none() && profile_image_url.is_none() {
            return Err(AptSearchError::InvalidArgument(
                "Profile update needs --nickname and/or --image-url".into(),
            ));
        }

        if let Some(nickname) = nickname.as_deref() {
            let len = nickname.chars().count();
            if !(NICKNAME_MIN_CHARS..=NICKNAME_MAX_CHARS).contains(&len) {
                return Err(AptSearchError::InvalidArgument(format!(
                    "Nickname must be {NICKNAME_MIN_CHARS}-{NICKNAME_MAX_CHARS} chars (got {len})"
                )));
            }
        }

        if let Some(url) = profile_image_url.as_deref()
            && url.chars().count() > PROFILE_IMAGE_URL_MAX_CHARS
        {
            return Err(AptSearchError::InvalidArgument(format!(
                "Profile image URL must be at most {PROFILE_IMAGE_URL_MAX_CHARS} characters"
            )));
        }

        Ok(Self {
            nickname,
            profile_image_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_trims_and_keeps_fields() {
        let update = ProfileUpdate {
            nickname: Some("  홍길동 ".into()),
            profile_image_url: None,
        };
        let out = update.normalized().unwrap();
        assert_eq!(out.nickname.as_deref(), Some("홍길동"));
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            serde_json::json!({"nickname": "홍길동"})
        );
    }

    #[test]
    fn normalized_rejects_empty_update() {
        let err = ProfileUpdate::default().normalized().unwrap_err();
        assert!(matches!(err, AptSearchError::InvalidArgument(_)));
    }

    #[test]
    fn normalized_rejects_short_and_long_nicknames() {
        let short = ProfileUpdate {
            nickname: Some("a".into()),
            ..Default::default()
        };
        assert!(short.normalized().unwrap_err().to_string().contains("2-20"));

        let long = ProfileUpdate {
            nickname: Some("x".repeat(21)),
            ..Default::default()
        };
        assert!(long.normalized().is_err());
    }

    #[test]
    fn normalized_rejects_oversized_image_url() {
        let update = ProfileUpdate {
            profile_image_url: Some(format!("https://example.com/{}", "a".repeat(500))),
            ..Default::default()
        };
        assert!(update.normalized().is_err());
    }
}
