use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A linked repository project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    /// User ids with access to this project
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Soft-delete marker; archived projects keep their rows
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user known to the credit system. The id comes from the identity
/// provider and is opaque to this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub credits: u64,
    pub created_at: DateTime<Utc>,
}

/// One indexed file: raw source, its AI summary, and the summary's
/// embedding vector. Similarity search over these rows is always scoped by
/// `project_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFileEmbedding {
    pub id: Uuid,
    pub project_id: Uuid,
    pub file_path: String,
    pub source_code: String,
    pub summary: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A summarized commit. `commit_hash` is unique within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: Uuid,
    pub project_id: Uuid,
    pub commit_hash: String,
    pub message: String,
    pub author_name: String,
    pub author_avatar: String,
    pub commit_date: DateTime<Utc>,
    /// Empty string when summarization failed (best-effort)
    pub summary: String,
}

/// A saved question/answer pair with the file context captured at answer
/// time. The references are an immutable snapshot, not a live join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub file_references: Vec<FileReference>,
    pub created_at: DateTime<Utc>,
}

/// A file matched by similarity search, cited alongside an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub file_path: String,
    pub source_code: String,
    pub summary: String,
    pub similarity: f32,
}

// ─── Request / response types ────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub user_id: String,
    pub name: String,
    pub repo_url: String,
    /// Used transiently for private repositories, never persisted
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckCreditsRequest {
    pub user_id: String,
    pub repo_url: String,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckCreditsResponse {
    pub file_count: u64,
    pub user_credits: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub project_id: Uuid,
    pub question: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveAnswerRequest {
    pub project_id: Uuid,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub file_references: Vec<FileReference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_round_trips_with_soft_delete() {
        let project = Project {
            id: Uuid::new_v4(),
            name: "demo".to_string(),
            repo_url: "https://github.com/acme/demo".to_string(),
            members: vec!["user-1".to_string()],
            created_at: Utc::now(),
            deleted_at: Some(Utc::now()),
        };
        let json = serde_json::to_string(&project).unwrap();
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, project.id);
        assert!(back.deleted_at.is_some());
    }

    #[test]
    fn test_create_project_request_token_optional() {
        let req: CreateProjectRequest = serde_json::from_str(
            r#"{"user_id":"u1","name":"demo","repo_url":"https://github.com/acme/demo"}"#,
        )
        .unwrap();
        assert!(req.access_token.is_none());
    }

    #[test]
    fn test_file_reference_snapshot_serializes_similarity() {
        let r = FileReference {
            file_path: "src/main.rs".to_string(),
            source_code: "fn main() {}".to_string(),
            summary: "entry point".to_string(),
            similarity: 0.75,
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["file_path"], "src/main.rs");
        assert!(json["similarity"].as_f64().unwrap() > 0.7);
    }
}
