//! Rows of the backend tables and the client-side types derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── stations ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RadioStation {
    pub id: String,
    pub name: String,
    pub stream_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Older rows store a single category string; newer ones a list.
    #[serde(default, deserialize_with = "one_or_many")]
    pub category: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_featured: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub listeners: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RadioStation {
    /// Every whitespace-separated term must appear in the name or description.
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {}",
            self.name.to_lowercase(),
            self.description.as_deref().unwrap_or_default().to_lowercase()
        );
        query.split_whitespace().all(|term| haystack.contains(term))
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.category.iter().any(|c| c.eq_ignore_ascii_case(category))
    }

    pub fn shares_category_with(&self, other: &RadioStation) -> bool {
        self.category.iter().any(|c| other.has_category(c))
    }

    pub fn primary_category(&self) -> Option<&str> {
        self.category.first().map(String::as_str)
    }
}

/// Write model for creating or editing a station.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StationDraft {
    pub name: String,
    pub stream_url: String,
    pub description: Option<String>,
    pub category: Vec<String>,
    pub is_featured: bool,
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&RadioStation> for StationDraft {
    fn from(s: &RadioStation) -> Self {
        Self {
            name: s.name.clone(),
            stream_url: s.stream_url.clone(),
            description: s.description.clone(),
            category: s.category.clone(),
            is_featured: s.is_featured,
            image_url: s.image_url.clone(),
            updated_at: None,
        }
    }
}

// ── users ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial profile update; `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(v) = &self.name {
            profile.name = Some(v.clone());
        }
        if let Some(v) = &self.avatar_url {
            profile.avatar_url = Some(v.clone());
        }
        if let Some(v) = &self.country {
            profile.country = Some(v.clone());
        }
        if let Some(v) = &self.status {
            profile.status = Some(v.clone());
        }
        if self.updated_at.is_some() {
            profile.updated_at = self.updated_at;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleRow {
    pub user_id: String,
    pub role: Role,
}

/// The signed-in user as the views see it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub country: Option<String>,
    pub status: Option<String>,
    pub role: Role,
}

impl User {
    pub fn from_profile(id: &str, email: &str, profile: Option<Profile>, roles: &[Role]) -> Self {
        let profile = profile.unwrap_or_default();
        let role = if roles.contains(&Role::Admin) {
            Role::Admin
        } else {
            Role::User
        };
        Self {
            id: id.to_string(),
            email: email.to_string(),
            name: profile.name,
            avatar_url: profile.avatar_url,
            country: profile.country,
            status: profile.status,
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => self.email.split('@').next().unwrap_or(&self.email),
        }
    }
}

/// Admin view of a profile together with its admin flag.
#[derive(Debug, Clone, PartialEq)]
pub struct UserWithRole {
    pub profile: Profile,
    pub email: String,
    pub is_admin: bool,
}

impl UserWithRole {
    pub fn new(profile: Profile, is_admin: bool) -> Self {
        let email = profile
            .email
            .clone()
            .unwrap_or_else(|| placeholder_email(&profile.id));
        Self {
            profile,
            email,
            is_admin,
        }
    }

    pub fn label(&self) -> &str {
        match self.profile.name.as_deref() {
            Some(n) if !n.trim().is_empty() => n,
            _ => &self.email,
        }
    }

    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        let name_hit = self
            .profile
            .name
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&query));
        name_hit || self.email.to_lowercase().contains(&query)
    }
}

/// Profiles do not expose auth emails to other users; show a stable stand-in.
fn placeholder_email(id: &str) -> String {
    let short: String = id.chars().take(8).collect();
    format!("user-{short}@example.com")
}

// ── favorites & comments ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FavoriteRow {
    pub user_id: String,
    pub station_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationComment {
    pub id: String,
    pub station_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewComment {
    pub station_id: String,
    pub user_id: String,
    pub content: String,
}

/// A comment with its author's profile joined at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentWithAuthor {
    pub comment: StationComment,
    pub author: Option<Profile>,
}

impl CommentWithAuthor {
    pub fn author_name(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Anonymous User")
    }

    pub fn author_country(&self) -> Option<&str> {
        self.author.as_ref().and_then(|p| p.country.as_deref())
    }

    pub fn author_status(&self) -> Option<&str> {
        self.author.as_ref().and_then(|p| p.status.as_deref())
    }
}

// ── serde helpers ─────────────────────────────────────────────────────────────

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let raw = Option::<OneOrMany>::deserialize(deserializer)?;
    let list = match raw {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    };
    Ok(list
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_accepts_string_or_list() {
        let single: RadioStation = serde_json::from_str(
            r#"{"id":"a","name":"A","stream_url":"http://a","category":"Jazz"}"#,
        )
        .unwrap();
        assert_eq!(single.category, vec!["Jazz"]);

        let list: RadioStation = serde_json::from_str(
            r#"{"id":"b","name":"B","stream_url":"http://b","category":["Jazz"," ","Blues"]}"#,
        )
        .unwrap();
        assert_eq!(list.category, vec!["Jazz", "Blues"]);

        let null: RadioStation = serde_json::from_str(
            r#"{"id":"c","name":"C","stream_url":"http://c","category":null,"listeners":null,"is_featured":null}"#,
        )
        .unwrap();
        assert!(null.category.is_empty());
        assert_eq!(null.listeners, 0);
        assert!(!null.is_featured);
    }

    #[test]
    fn category_serializes_as_list() {
        let s = RadioStation {
            id: "x".into(),
            category: vec!["News".into()],
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["category"], serde_json::json!(["News"]));
    }

    #[test]
    fn query_matches_name_or_description() {
        let s = RadioStation {
            name: "Jazz FM".into(),
            description: Some("Smooth late night grooves".into()),
            ..Default::default()
        };
        assert!(s.matches_query("jazz"));
        assert!(s.matches_query("LATE night"));
        assert!(s.matches_query("  "));
        assert!(!s.matches_query("rock"));
    }

    #[test]
    fn user_role_and_name() {
        let profile = Profile {
            id: "u1".into(),
            name: None,
            ..Default::default()
        };
        let user = User::from_profile("u1", "dj@example.com", Some(profile), &[Role::Admin]);
        assert!(user.is_admin());
        assert_eq!(user.display_name(), "dj");

        let plain = User::from_profile("u2", "x@example.com", None, &[Role::Moderator]);
        assert_eq!(plain.role, Role::User);
    }

    #[test]
    fn user_with_role_falls_back_to_placeholder_email() {
        let u = UserWithRole::new(
            Profile {
                id: "0123456789abcdef".into(),
                ..Default::default()
            },
            false,
        );
        assert_eq!(u.email, "user-01234567@example.com");
        assert_eq!(u.label(), "user-01234567@example.com");
        assert!(u.matches_query("01234"));
    }

    #[test]
    fn anonymous_comment_author() {
        let c = CommentWithAuthor {
            comment: StationComment {
                id: "c".into(),
                station_id: "s".into(),
                user_id: "u".into(),
                content: "hi".into(),
                created_at: Utc::now(),
                updated_at: None,
            },
            author: None,
        };
        assert_eq!(c.author_name(), "Anonymous User");
    }

    #[test]
    fn profile_patch_only_touches_given_fields() {
        let mut p = Profile {
            id: "u".into(),
            name: Some("Old".into()),
            country: Some("NL".into()),
            ..Default::default()
        };
        ProfilePatch {
            name: Some("New".into()),
            ..Default::default()
        }
        .apply(&mut p);
        assert_eq!(p.name.as_deref(), Some("New"));
        assert_eq!(p.country.as_deref(), Some("NL"));
    }
}
