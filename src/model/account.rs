use super::*;

/// A registry entry: a tracked username and, once `update` ran, the id the platform knows it by.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, new)]
pub struct Account {
    pub username: Username,
    #[new(default)]
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[new(value = "now()")]
    pub created_at: Timestamp,
    #[new(default)]
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
    #[new(default)]
    #[serde(default)]
    pub fetched_at: Option<Timestamp>,
}
