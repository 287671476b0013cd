//! In-memory forum store with JSON snapshot persistence.
//!
//! All tables sit behind one mutex that is held only for the duration of a
//! single read or commit and never across an `.await`, so a slow judge call
//! never blocks other requests. Each commit validates everything it needs
//! before touching any table, which makes it all-or-nothing.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ForumError;
use crate::ledger;
use crate::lifecycle::Transition;
use crate::model::{
    AnswerId, Category, CategoryId, InstructorAnswer, NewQuestion, Question, QuestionId,
    QuestionStatus, Response, ResponseId, Role, User, UserId,
};
use crate::traits::{AnswerDraft, ForumStore, ResponseDraft};

/// Serialized form of the whole store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForumSnapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub instructor_answers: Vec<InstructorAnswer>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    questions: BTreeMap<QuestionId, Question>,
    responses: BTreeMap<ResponseId, Response>,
    answers: BTreeMap<QuestionId, InstructorAnswer>,
    next_id: u64,
}

impl Tables {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn question_in(
        &self,
        id: QuestionId,
        expected: QuestionStatus,
    ) -> Result<&Question, ForumError> {
        let question = self
            .questions
            .get(&id)
            .ok_or_else(|| ForumError::not_found("question", id))?;
        if question.status != expected {
            return Err(ForumError::invalid_transition(
                id,
                question.status,
                format!("status changed from {expected} concurrently"),
            ));
        }
        Ok(question)
    }

    fn from_snapshot(snapshot: ForumSnapshot) -> Self {
        let mut tables = Tables::default();
        let mut max_id = 0;
        for u in snapshot.users {
            max_id = max_id.max(u.id.0);
            tables.users.insert(u.id, u);
        }
        for c in snapshot.categories {
            max_id = max_id.max(c.id.0);
            tables.categories.insert(c.id, c);
        }
        for q in snapshot.questions {
            max_id = max_id.max(q.id.0);
            tables.questions.insert(q.id, q);
        }
        for r in snapshot.responses {
            max_id = max_id.max(r.id.0);
            tables.responses.insert(r.id, r);
        }
        for a in snapshot.instructor_answers {
            max_id = max_id.max(a.id.0);
            tables.answers.insert(a.question_id, a);
        }
        tables.next_id = max_id;
        tables
    }

    fn to_snapshot(&self) -> ForumSnapshot {
        ForumSnapshot {
            users: self.users.values().cloned().collect(),
            categories: self.categories.values().cloned().collect(),
            questions: self.questions.values().cloned().collect(),
            responses: self.responses.values().cloned().collect(),
            instructor_answers: self.answers.values().cloned().collect(),
        }
    }
}

/// A strongly consistent store kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ForumSnapshot) -> Self {
        Self {
            tables: Mutex::new(Tables::from_snapshot(snapshot)),
        }
    }

    pub fn snapshot(&self) -> ForumSnapshot {
        self.lock().to_snapshot()
    }

    /// Save the store as JSON to a file.
    ///
    /// The snapshot is written to a temporary file next to `path` and renamed
    /// over it, so readers see either the old state or the new one.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(&self.snapshot()).context("failed to serialize state")?;
        let dir = parent_dir(path);
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .with_context(|| format!("failed to write state to {}", path.display()))?;
        Ok(())
    }

    /// Load a store from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state from {}", path.display()))?;
        let snapshot: ForumSnapshot =
            serde_json::from_str(&content).context("failed to parse state JSON")?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load from `path` if it exists, otherwise start empty.
    pub fn open(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::new())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // Commits validate before mutating, so a poisoned lock still guards
        // consistent tables.
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Exclusive claim on a state file for one load, modify, save cycle.
///
/// Every process that edits the same state file must hold this from before
/// it loads until after it saves, otherwise a later save silently replaces
/// an earlier one. The lock sits on a `<state>.lock` file beside the state
/// so it survives the rename in [`MemoryStore::save_json`]. Dropping the
/// claim releases it.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    _lock: File,
}

impl StateFile {
    /// Wait until no other holder has `path`, then claim it.
    pub fn lock(path: &Path) -> Result<Self> {
        let lock = open_lock_file(path)?;
        lock.lock_exclusive()
            .with_context(|| format!("failed to lock {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    /// Claim `path` without waiting. Returns `None` while someone else holds it.
    pub fn try_lock(path: &Path) -> Result<Option<Self>> {
        let lock = open_lock_file(path)?;
        match lock.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                _lock: lock,
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to lock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store as it is on disk now, or an empty one if there is no file yet.
    pub fn load(&self) -> Result<MemoryStore> {
        MemoryStore::open(&self.path)
    }

    pub fn save(&self, store: &MemoryStore) -> Result<()> {
        store.save_json(&self.path)
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "peerhelp-state".into());
    name.push(".lock");
    let lock_path = path.with_file_name(name);
    std::fs::create_dir_all(parent_dir(&lock_path))?;
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file {}", lock_path.display()))
}

fn require_name(kind: &str, name: &str) -> Result<String, ForumError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ForumError::ValidationFailed(format!(
            "{kind} name must not be empty"
        )));
    }
    Ok(name.to_string())
}

#[async_trait]
impl ForumStore for MemoryStore {
    async fn insert_user(
        &self,
        name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User, ForumError> {
        let name = require_name("user", name)?;
        let mut tables = self.lock();
        if tables.users.values().any(|u| u.name == name) {
            return Err(ForumError::ValidationFailed(format!(
                "user '{name}' already exists"
            )));
        }
        let user = User {
            id: UserId(tables.allocate()),
            name,
            role,
            karma: 0,
            created_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user(&self, id: UserId) -> Option<User> {
        self.lock().users.get(&id).cloned()
    }

    async fn users(&self) -> Vec<User> {
        self.lock().users.values().cloned().collect()
    }

    async fn insert_category(&self, name: &str) -> Result<Category, ForumError> {
        let name = require_name("category", name)?;
        let mut tables = self.lock();
        if tables.categories.values().any(|c| c.name == name) {
            return Err(ForumError::ValidationFailed(format!(
                "category '{name}' already exists"
            )));
        }
        let category = Category {
            id: CategoryId(tables.allocate()),
            name,
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn category(&self, id: CategoryId) -> Option<Category> {
        self.lock().categories.get(&id).cloned()
    }

    async fn categories(&self) -> Vec<Category> {
        self.lock().categories.values().cloned().collect()
    }

    async fn insert_question(
        &self,
        student_id: UserId,
        question: NewQuestion,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError> {
        let mut tables = self.lock();
        if !tables.users.contains_key(&student_id) {
            return Err(ForumError::not_found("user", student_id));
        }
        if !tables.categories.contains_key(&question.category_id) {
            return Err(ForumError::not_found("category", question.category_id));
        }
        let question = Question {
            id: QuestionId(tables.allocate()),
            student_id,
            category_id: question.category_id,
            title: question.title,
            description: question.description,
            code_snippet: question.code_snippet,
            status: QuestionStatus::Open,
            created_at: now,
            closed_at: None,
        };
        tables.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn question(&self, id: QuestionId) -> Option<Question> {
        self.lock().questions.get(&id).cloned()
    }

    async fn questions(&self) -> Vec<Question> {
        self.lock().questions.values().cloned().collect()
    }

    async fn transition(
        &self,
        id: QuestionId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError> {
        let mut tables = self.lock();
        let current = tables.question_in(id, transition.from)?;
        if !transition.is_forward() {
            return Err(ForumError::invalid_transition(
                id,
                current.status,
                format!("cannot move from {} to {}", transition.from, transition.to),
            ));
        }
        let Some(question) = tables.questions.get_mut(&id) else {
            return Err(ForumError::not_found("question", id));
        };
        question.status = transition.to;
        if transition.to.is_terminal() {
            question.closed_at = Some(now);
        }
        Ok(question.clone())
    }

    async fn commit_response(&self, draft: ResponseDraft) -> Result<Response, ForumError> {
        let mut tables = self.lock();
        tables.question_in(draft.question_id, draft.expected_status)?;
        let responder = tables
            .users
            .get(&draft.responder_id)
            .ok_or_else(|| ForumError::not_found("user", draft.responder_id))?;
        let new_karma = ledger::checked_apply(responder, draft.outcome.karma_awarded())?;

        let response = Response::new(
            ResponseId(tables.allocate()),
            draft.question_id,
            draft.responder_id,
            draft.guidance,
            draft.outcome,
            draft.created_at,
        );
        tables.responses.insert(response.id, response.clone());
        if let Some(responder) = tables.users.get_mut(&draft.responder_id) {
            responder.karma = new_karma;
        }
        Ok(response)
    }

    async fn commit_instructor_answer(
        &self,
        draft: AnswerDraft,
    ) -> Result<InstructorAnswer, ForumError> {
        let mut tables = self.lock();
        let question = tables.question_in(draft.question_id, draft.transition.from)?;
        if draft.transition.to != QuestionStatus::Closed || !draft.transition.is_forward() {
            return Err(ForumError::invalid_transition(
                draft.question_id,
                question.status,
                "an instructor answer must close the question",
            ));
        }
        if tables.answers.contains_key(&draft.question_id) {
            return Err(ForumError::invalid_transition(
                draft.question_id,
                question.status,
                "question already has an instructor answer",
            ));
        }
        if !tables.users.contains_key(&draft.instructor_id) {
            return Err(ForumError::not_found("user", draft.instructor_id));
        }

        let answer = InstructorAnswer {
            id: AnswerId(tables.allocate()),
            question_id: draft.question_id,
            instructor_id: draft.instructor_id,
            content: draft.content,
            created_at: draft.created_at,
        };
        tables.answers.insert(answer.question_id, answer.clone());
        if let Some(question) = tables.questions.get_mut(&draft.question_id) {
            question.status = QuestionStatus::Closed;
            question.closed_at = Some(draft.created_at);
        }
        Ok(answer)
    }

    async fn apply_karma(&self, user: UserId, delta: i64) -> Result<i64, ForumError> {
        let mut tables = self.lock();
        let record = tables
            .users
            .get_mut(&user)
            .ok_or_else(|| ForumError::not_found("user", user))?;
        record.karma = ledger::checked_apply(record, delta)?;
        Ok(record.karma)
    }

    async fn responses(&self) -> Vec<Response> {
        self.lock().responses.values().cloned().collect()
    }

    async fn responses_for_question(&self, question: QuestionId) -> Vec<Response> {
        self.lock()
            .responses
            .values()
            .filter(|r| r.question_id == question)
            .cloned()
            .collect()
    }

    async fn responses_by(&self, responder: UserId) -> Vec<Response> {
        self.lock()
            .responses
            .values()
            .filter(|r| r.responder_id == responder)
            .cloned()
            .collect()
    }

    async fn instructor_answer(&self, question: QuestionId) -> Option<InstructorAnswer> {
        self.lock().answers.get(&question).cloned()
    }
}
