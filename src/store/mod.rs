//! JSON-file-backed persistence for projects, users, commits, and
//! questions. Rows live in memory behind a `parking_lot::RwLock` and every
//! mutation is flushed with an atomic temp-file + rename, in the same
//! manner as the embedding store.

pub mod embeddings;

use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Commit, Project, Question, User};

#[derive(Debug, Default, Serialize, Deserialize)]
struct DbData {
    users: Vec<User>,
    projects: Vec<Project>,
    commits: Vec<Commit>,
    questions: Vec<Question>,
}

/// The relational-store collaborator. Each project's rows are logically
/// partitioned by project id; writes append or update distinct rows, so a
/// single lock suffices and the credit decrement is atomic by construction.
pub struct Database {
    data: RwLock<DbData>,
    persist_path: PathBuf,
}

impl Database {
    pub fn open_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let persist_path = dir.join("db.json");

        let data = if persist_path.exists() {
            let raw = std::fs::read_to_string(&persist_path).context("Failed to read database")?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            DbData::default()
        };

        Ok(Self {
            data: RwLock::new(data),
            persist_path,
        })
    }

    /// Flush to disk (atomic write via temp file + rename). Persistence
    /// trouble is logged, not surfaced; the in-memory state stays
    /// authoritative for the life of the process.
    fn persist(&self, data: &DbData) {
        match serde_json::to_string(data) {
            Ok(raw) => {
                let tmp_path = self.persist_path.with_extension("json.tmp");
                if let Err(e) = std::fs::write(&tmp_path, &raw)
                    .and_then(|_| std::fs::rename(&tmp_path, &self.persist_path))
                {
                    tracing::warn!("Failed to persist database: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize database: {e}"),
        }
    }

    // ─── Users & credits ─────────────────────────────────

    /// Fetch a user, creating the record with the initial balance on first
    /// sight (the identity provider owns the id).
    pub fn ensure_user(&self, user_id: &str, initial_credits: u64) -> User {
        let mut data = self.data.write();
        if let Some(user) = data.users.iter().find(|u| u.id == user_id) {
            return user.clone();
        }
        let user = User {
            id: user_id.to_string(),
            credits: initial_credits,
            created_at: Utc::now(),
        };
        data.users.push(user.clone());
        self.persist(&data);
        user
    }

    pub fn user_credits(&self, user_id: &str) -> Option<u64> {
        self.data
            .read()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.credits)
    }

    /// Atomically subtract `amount` from a user's balance and return the
    /// new balance. One write lock covers the read-modify-write.
    pub fn decrement_credits(&self, user_id: &str, amount: u64) -> Result<u64, Error> {
        let mut data = self.data.write();
        let user = data
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| Error::ExternalService(anyhow::anyhow!("unknown user {user_id}")))?;
        user.credits = user.credits.saturating_sub(amount);
        let balance = user.credits;
        self.persist(&data);
        Ok(balance)
    }

    // ─── Projects ────────────────────────────────────────

    pub fn create_project(&self, name: &str, repo_url: &str, user_id: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            name: name.to_string(),
            repo_url: repo_url.to_string(),
            members: vec![user_id.to_string()],
            created_at: Utc::now(),
            deleted_at: None,
        };
        let mut data = self.data.write();
        data.projects.push(project.clone());
        self.persist(&data);
        project
    }

    pub fn find_project(&self, id: Uuid) -> Option<Project> {
        self.data
            .read()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Non-archived projects the user is a member of.
    pub fn list_projects(&self, user_id: &str) -> Vec<Project> {
        self.data
            .read()
            .projects
            .iter()
            .filter(|p| p.deleted_at.is_none() && p.members.iter().any(|m| m == user_id))
            .cloned()
            .collect()
    }

    /// Soft-delete: the row and its owned commits/embeddings remain.
    pub fn archive_project(&self, id: Uuid) -> Result<Project, Error> {
        let mut data = self.data.write();
        let project = data
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(Error::ProjectNotFound)?;
        project.deleted_at = Some(Utc::now());
        let archived = project.clone();
        self.persist(&data);
        Ok(archived)
    }

    // ─── Commits ─────────────────────────────────────────

    pub fn commit_hashes(&self, project_id: Uuid) -> HashSet<String> {
        self.data
            .read()
            .commits
            .iter()
            .filter(|c| c.project_id == project_id)
            .map(|c| c.commit_hash.clone())
            .collect()
    }

    /// Bulk insert, skipping hashes already present for the same project so
    /// concurrent ingest triggers cannot duplicate. Returns the number of
    /// rows actually inserted; zero rows means no disk write.
    pub fn insert_commits(&self, rows: Vec<Commit>) -> usize {
        if rows.is_empty() {
            return 0;
        }
        let mut data = self.data.write();
        let mut inserted = 0;
        for row in rows {
            let duplicate = data
                .commits
                .iter()
                .any(|c| c.project_id == row.project_id && c.commit_hash == row.commit_hash);
            if !duplicate {
                data.commits.push(row);
                inserted += 1;
            }
        }
        if inserted > 0 {
            self.persist(&data);
        }
        inserted
    }

    /// Commits for a project, newest first.
    pub fn commits_for_project(&self, project_id: Uuid) -> Vec<Commit> {
        let mut commits: Vec<Commit> = self
            .data
            .read()
            .commits
            .iter()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        commits.sort_by(|a, b| b.commit_date.cmp(&a.commit_date));
        commits
    }

    // ─── Questions ───────────────────────────────────────

    pub fn insert_question(&self, question: Question) {
        let mut data = self.data.write();
        data.questions.push(question);
        self.persist(&data);
    }

    /// Saved questions for a project, newest first.
    pub fn questions_for_project(&self, project_id: Uuid) -> Vec<Question> {
        let mut questions: Vec<Question> = self
            .data
            .read()
            .questions
            .iter()
            .filter(|q| q.project_id == project_id)
            .cloned()
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        questions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_or_create(dir.path()).unwrap();
        (db, dir)
    }

    fn commit_row(project_id: Uuid, hash: &str, day: u32) -> Commit {
        Commit {
            id: Uuid::new_v4(),
            project_id,
            commit_hash: hash.to_string(),
            message: format!("commit {hash}"),
            author_name: "Jo".to_string(),
            author_avatar: String::new(),
            commit_date: Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap(),
            summary: String::new(),
        }
    }

    #[test]
    fn test_ensure_user_grants_initial_credits_once() {
        let (db, _dir) = open();
        let user = db.ensure_user("u1", 150);
        assert_eq!(user.credits, 150);
        db.decrement_credits("u1", 50).unwrap();
        // A second ensure must not reset the balance
        let user = db.ensure_user("u1", 150);
        assert_eq!(user.credits, 100);
    }

    #[test]
    fn test_decrement_is_reflected_in_reads() {
        let (db, _dir) = open();
        db.ensure_user("u1", 50);
        let balance = db.decrement_credits("u1", 42).unwrap();
        assert_eq!(balance, 8);
        assert_eq!(db.user_credits("u1"), Some(8));
    }

    #[test]
    fn test_archived_projects_leave_listings_but_keep_rows() {
        let (db, _dir) = open();
        let project = db.create_project("demo", "https://github.com/acme/demo", "u1");
        assert_eq!(db.list_projects("u1").len(), 1);

        db.archive_project(project.id).unwrap();
        assert!(db.list_projects("u1").is_empty());
        // Soft delete: the row is still findable
        let found = db.find_project(project.id).unwrap();
        assert!(found.deleted_at.is_some());
    }

    #[test]
    fn test_archive_unknown_project_is_not_found() {
        let (db, _dir) = open();
        assert!(matches!(
            db.archive_project(Uuid::new_v4()),
            Err(Error::ProjectNotFound)
        ));
    }

    #[test]
    fn test_list_projects_filters_by_membership() {
        let (db, _dir) = open();
        db.create_project("mine", "https://github.com/acme/mine", "u1");
        db.create_project("theirs", "https://github.com/acme/theirs", "u2");
        let mine = db.list_projects("u1");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "mine");
    }

    #[test]
    fn test_insert_commits_skips_duplicates_per_project() {
        let (db, _dir) = open();
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        assert_eq!(db.insert_commits(vec![commit_row(p1, "aaa", 1)]), 1);
        // Same hash, same project: skipped
        assert_eq!(db.insert_commits(vec![commit_row(p1, "aaa", 1)]), 0);
        // Same hash, different project: allowed
        assert_eq!(db.insert_commits(vec![commit_row(p2, "aaa", 1)]), 1);
    }

    #[test]
    fn test_commits_ordered_newest_first() {
        let (db, _dir) = open();
        let p = Uuid::new_v4();
        db.insert_commits(vec![
            commit_row(p, "old", 1),
            commit_row(p, "new", 20),
            commit_row(p, "mid", 10),
        ]);
        let commits = db.commits_for_project(p);
        assert_eq!(commits[0].commit_hash, "new");
        assert_eq!(commits[2].commit_hash, "old");
    }

    #[test]
    fn test_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let project_id = {
            let db = Database::open_or_create(dir.path()).unwrap();
            db.ensure_user("u1", 150);
            db.create_project("demo", "https://github.com/acme/demo", "u1").id
        };
        let db = Database::open_or_create(dir.path()).unwrap();
        assert_eq!(db.user_credits("u1"), Some(150));
        assert!(db.find_project(project_id).is_some());
    }
}
