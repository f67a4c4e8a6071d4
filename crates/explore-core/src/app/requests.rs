//! Request / response shapes of the four operations.
//!
//! These mirror the wire contract field for field (camelCase on the wire) so
//! a transport layer can hand them over without further mapping.

use serde::{Deserialize, Serialize};

use crate::domain::{Liker, PageRequest, PageToken, UserId, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLikedYouRequest {
    pub recipient_user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination_limit: Option<u32>,
}

impl ListLikedYouRequest {
    pub fn new(recipient_user_id: impl Into<String>) -> Self {
        Self {
            recipient_user_id: recipient_user_id.into(),
            pagination_token: None,
            pagination_limit: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.pagination_token = Some(token.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.pagination_limit = Some(limit);
        self
    }

    /// Check the request shape and turn it into ledger arguments.
    pub fn validate(&self) -> Result<(UserId, PageRequest), ValidationError> {
        let recipient = UserId::parse(
            self.recipient_user_id.as_str(),
            ValidationError::EmptyRecipientId,
        )?;
        let cursor = PageToken::parse_optional(self.pagination_token.as_deref())?;
        Ok((recipient, PageRequest::new(cursor, self.pagination_limit)))
    }
}

/// Public shape of one liker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikerView {
    pub actor_id: String,

    /// Unix seconds.
    pub updated_at: u64,
}

impl From<Liker> for LikerView {
    fn from(liker: Liker) -> Self {
        Self {
            actor_id: liker.actor_id.into_inner(),
            updated_at: u64::try_from(liker.updated_at.timestamp()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLikedYouResponse {
    pub likers: Vec<LikerView>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pagination_token: Option<String>,
}

impl ListLikedYouResponse {
    /// Shape a ledger page, deriving the continuation token from `page`.
    pub fn from_page(page: &PageRequest, likers: Vec<Liker>) -> Self {
        let next_pagination_token = page.next_token(&likers).map(|token| token.to_string());
        Self {
            likers: likers.into_iter().map(LikerView::from).collect(),
            next_pagination_token,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountLikedYouRequest {
    pub recipient_user_id: String,
}

impl CountLikedYouRequest {
    pub fn new(recipient_user_id: impl Into<String>) -> Self {
        Self {
            recipient_user_id: recipient_user_id.into(),
        }
    }

    pub fn validate(&self) -> Result<UserId, ValidationError> {
        UserId::parse(
            self.recipient_user_id.as_str(),
            ValidationError::EmptyRecipientId,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountLikedYouResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDecisionRequest {
    pub recipient_user_id: String,
    pub actor_user_id: String,
    pub liked_recipient: bool,
}

impl PutDecisionRequest {
    pub fn new(
        recipient_user_id: impl Into<String>,
        actor_user_id: impl Into<String>,
        liked_recipient: bool,
    ) -> Self {
        Self {
            recipient_user_id: recipient_user_id.into(),
            actor_user_id: actor_user_id.into(),
            liked_recipient,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDecisionResponse {
    pub mutual_likes: bool,
}
