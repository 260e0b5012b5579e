// In-memory collaborators for service and router tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::async_trait;
use axum::body::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::auth::models::{Role, RoleRecord};
use crate::auth::repository::RoleRepository;
use crate::auth::token::TokenService;
use crate::db::RepositoryError;
use crate::storage::{sanitize_file_name, ImageStore, StorageError};
use crate::users::models::{FileRecord, NewUser, User};
use crate::users::repository::{FileRepository, UserRepository};

pub const TEST_ACCESS_SECRET: &str = "test_access_secret";
pub const TEST_REFRESH_SECRET: &str = "test_refresh_secret";

pub fn test_token_service() -> TokenService {
    TokenService::new(TEST_ACCESS_SECRET, TEST_REFRESH_SECRET, "user_accounts_api", 3600, 604800)
}

#[derive(Default)]
struct StoreState {
    roles: Vec<RoleRecord>,
    users: BTreeMap<i32, User>,
    files: BTreeMap<i32, FileRecord>,
    next_user_id: i32,
    next_file_id: i32,
}

impl StoreState {
    fn role_for(&self, role_id: i32) -> Result<Role, RepositoryError> {
        self.roles
            .iter()
            .find(|r| r.id == role_id)
            .map(|r| r.role)
            .ok_or_else(|| RepositoryError::Corrupt(format!("no role with id {}", role_id)))
    }

    fn insert_user(&mut self, user: NewUser) -> Result<User, RepositoryError> {
        if let Some(email) = &user.email {
            if self.users.values().any(|u| u.email.as_ref() == Some(email)) {
                return Err(RepositoryError::Conflict("users_email_key".to_string()));
            }
        }
        let role = self.role_for(user.role_id)?;
        self.next_user_id += 1;
        let now = Utc::now();
        let created = User {
            id: self.next_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            age: user.age,
            image_name: user.image_name,
            role_id: user.role_id,
            role,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn update_user(&mut self, user: &User) -> Option<User> {
        self.users.get_mut(&user.id).map(|stored| {
            stored.name = user.name.clone();
            stored.age = user.age;
            stored.image_name = user.image_name.clone();
            stored.updated_at = Utc::now();
            stored.clone()
        })
    }

    fn insert_file(&mut self, user_id: i32, file_name: &str) -> Result<FileRecord, RepositoryError> {
        if !self.users.contains_key(&user_id) {
            return Err(RepositoryError::Corrupt(format!("no user with id {}", user_id)));
        }
        if self.files.values().any(|f| f.user_id == user_id) {
            return Err(RepositoryError::Conflict("files_user_id_key".to_string()));
        }
        self.next_file_id += 1;
        let now = Utc::now();
        let file = FileRecord {
            id: self.next_file_id,
            file_name: file_name.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.files.insert(file.id, file.clone());
        Ok(file)
    }
}

fn check_injected(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
    if flag.load(Ordering::SeqCst) {
        return Err(RepositoryError::Database(sqlx::Error::Protocol(format!(
            "injected {} failure",
            what
        ))));
    }
    Ok(())
}

/// Shared in-memory users, roles and files implementing every repository trait
#[derive(Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    fail_file_writes: Arc<AtomicBool>,
    fail_user_updates: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Store seeded with the `admin` (id 1) and `user` (id 2) roles
    pub fn new() -> Self {
        Self::with_roles(vec![
            RoleRecord { id: 1, role: Role::Admin },
            RoleRecord { id: 2, role: Role::User },
        ])
    }

    pub fn without_roles() -> Self {
        Self::with_roles(Vec::new())
    }

    fn with_roles(roles: Vec<RoleRecord>) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState {
                roles,
                ..StoreState::default()
            })),
            fail_file_writes: Arc::new(AtomicBool::new(false)),
            fail_user_updates: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every file record write fail, including the one inside `create_with_file`
    pub fn fail_file_writes(&self, fail: bool) {
        self.fail_file_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every user row update fail, including the one inside `update_with_file`
    pub fn fail_user_updates(&self, fail: bool) {
        self.fail_user_updates.store(fail, Ordering::SeqCst);
    }

    fn check_file_write(&self) -> Result<(), RepositoryError> {
        check_injected(&self.fail_file_writes, "file write")
    }

    fn check_user_update(&self) -> Result<(), RepositoryError> {
        check_injected(&self.fail_user_updates, "user update")
    }

    pub async fn insert_user(
        &self,
        name: &str,
        email: Option<&str>,
        password_hash: Option<&str>,
        role: Role,
    ) -> User {
        let mut state = self.state.write().await;
        let role_id = state
            .roles
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.id)
            .expect("role seeded");
        state
            .insert_user(NewUser {
                name: name.to_string(),
                email: email.map(str::to_string),
                password_hash: password_hash.map(str::to_string),
                age: 0,
                image_name: None,
                role_id,
            })
            .expect("insert test user")
    }

    /// Point a user at another role, as an admin would in the database
    pub async fn set_role(&self, user_id: i32, role: Role) {
        let mut state = self.state.write().await;
        let role_id = state
            .roles
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.id)
            .expect("role seeded");
        let user = state.users.get_mut(&user_id).expect("user exists");
        user.role_id = role_id;
        user.role = role;
    }

    pub async fn user_count(&self) -> usize {
        self.state.read().await.users.len()
    }

    pub async fn file_count(&self) -> usize {
        self.state.read().await.files.len()
    }

    pub async fn files_for(&self, user_id: i32) -> Vec<FileRecord> {
        self.state
            .read()
            .await
            .files
            .values()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        self.state.write().await.insert_user(user)
    }

    async fn create_with_file(
        &self,
        user: NewUser,
        file_name: &str,
    ) -> Result<(User, FileRecord), RepositoryError> {
        let mut state = self.state.write().await;
        let created = state.insert_user(user)?;
        let file = self
            .check_file_write()
            .and_then(|_| state.insert_file(created.id, file_name));
        match file {
            Ok(file) => Ok((created, file)),
            Err(e) => {
                // Roll back the user insert
                state.users.remove(&created.id);
                Err(e)
            }
        }
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = email.to_lowercase();
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.email.as_deref().map(str::to_lowercase).as_deref() == Some(email.as_str()))
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<Option<User>, RepositoryError> {
        self.check_user_update()?;
        let mut state = self.state.write().await;
        Ok(state.update_user(user))
    }

    async fn update_with_file(
        &self,
        user: &User,
        file_name: &str,
    ) -> Result<Option<User>, RepositoryError> {
        // Both checks run before any write, so a failure leaves nothing behind
        self.check_file_write()?;
        self.check_user_update()?;

        let mut state = self.state.write().await;
        if !state.users.contains_key(&user.id) {
            return Ok(None);
        }

        let existing = state.files.values().find(|f| f.user_id == user.id).map(|f| f.id);
        match existing {
            Some(id) => {
                if let Some(file) = state.files.get_mut(&id) {
                    file.file_name = file_name.to_string();
                    file.updated_at = Utc::now();
                }
            }
            None => {
                state.insert_file(user.id, file_name)?;
            }
        }
        Ok(state.update_user(user))
    }

    async fn delete(&self, id: i32) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        if state.files.values().any(|f| f.user_id == id) {
            return Err(RepositoryError::Database(sqlx::Error::Protocol(
                "files_user_id_fkey violated".to_string(),
            )));
        }
        Ok(state.users.remove(&id).is_some())
    }
}

#[async_trait]
impl FileRepository for InMemoryStore {
    async fn find_by_user_id(&self, user_id: i32) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .files
            .values()
            .find(|f| f.user_id == user_id)
            .cloned())
    }

    async fn delete_by_user_id(&self, user_id: i32) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let before = state.files.len();
        state.files.retain(|_, f| f.user_id != user_id);
        Ok((before - state.files.len()) as u64)
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn find_by_role(&self, role: Role) -> Result<Option<RoleRecord>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .iter()
            .find(|r| r.role == role)
            .cloned())
    }
}

/// Image store that keeps uploads in memory and can be told to fail
#[derive(Clone, Default)]
pub struct RecordingImageStore {
    images: Arc<Mutex<HashMap<String, Bytes>>>,
    counter: Arc<AtomicU64>,
    fail_saves: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl RecordingImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.lock().unwrap().contains_key(name)
    }

    /// Names currently stored, sorted
    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.images.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

fn injected_io_failure(what: &str) -> StorageError {
    StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {} failure", what),
    ))
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn save(&self, original_name: &str, body: Bytes) -> Result<String, StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(injected_io_failure("save"));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{}_{}", n, sanitize_file_name(original_name));
        self.images.lock().unwrap().insert(name.clone(), body);
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected_io_failure("delete"));
        }
        match self.images.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                name.to_string(),
            ))),
        }
    }
}
