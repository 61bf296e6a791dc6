//! End-to-end persistence against a Git repository on disk.
//!
//! The repository answers the same calls as the hosted API, so these tests
//! drive the remote code path without a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use folio::content::{BlogPost, PortfolioItem, StarBlock};
use folio::storage::{
    BackendKind, BranchName, ContentBackend, ContentPath, FileChange, GitRepository, Precondition,
    RemoteClient, StorageError, StorageResult, StoredFile, VersionTag, WriteReceipt,
};
use folio::store::{ContentStore, Entity, EntityKind, StoreConfig, StoreError};
use serde_json::json;
use tempfile::TempDir;

fn setup_client() -> (TempDir, GitRepository, RemoteClient) {
    let dir = TempDir::new().unwrap();
    let repo = GitRepository::init(dir.path()).unwrap();
    let client = RemoteClient::new(repo.clone(), BranchName::main());
    (dir, repo, client)
}

fn setup_store() -> (TempDir, GitRepository, ContentStore) {
    let dir = TempDir::new().unwrap();
    let repo_dir = dir.path().join("content.git");
    let repo = GitRepository::init(&repo_dir).unwrap();
    let config = StoreConfig::new(dir.path()).hosted().git_repository(&repo_dir);
    let store = ContentStore::open(config).unwrap();
    (dir, repo, store)
}

fn path(raw: &str) -> ContentPath {
    ContentPath::new(raw).unwrap()
}

fn commit_count(repo: &GitRepository) -> usize {
    repo.history(&BranchName::main(), 1000).unwrap().len()
}

fn latest_message(repo: &GitRepository) -> String {
    repo.history(&BranchName::main(), 1).unwrap()[0].summary().to_string()
}

fn project(slug: &str) -> PortfolioItem {
    PortfolioItem {
        slug: slug.to_string(),
        name: format!("Project {}", slug),
        impact: "Doubled activation".to_string(),
        category: "Product Strategy".to_string(),
        date: "2024-04-01".to_string(),
        description: "d".to_string(),
        tech_stack: vec!["Rust".to_string()],
        github_url: None,
        star: Some(StarBlock::rich("<p>case</p>")),
        extra: Default::default(),
    }
}

// ==================== Remote Client ====================

#[test]
fn test_commit_file_create_then_update() {
    let (_dir, repo, client) = setup_client();
    let target = path("content/resume.json");

    assert_eq!(client.get_current_version(&target).unwrap(), None);

    client.commit_file(&target, "{}", "[resume] save").unwrap();
    let updated = client.commit_file(&target, "{\"a\":1}", "[resume] save").unwrap();

    assert_eq!(
        updated.content_version,
        Some(VersionTag::of_bytes(b"{\"a\":1}").unwrap())
    );
    assert_eq!(client.read_file(&target).unwrap().unwrap().content, "{\"a\":1}");
    assert_eq!(repo.head(&BranchName::main()).unwrap(), updated.sha);
    assert_eq!(commit_count(&repo), 3);
}

#[test]
fn test_commit_file_same_content_twice() {
    let (_dir, _repo, client) = setup_client();
    let target = path("content/blog/same.md");

    client.commit_file(&target, "body", "first").unwrap();
    client.commit_file(&target, "body", "second").unwrap();

    assert_eq!(client.read_file(&target).unwrap().unwrap().content, "body");
}

#[test]
fn test_stale_handle_conflicts() {
    let (_dir, _repo, client_b) = setup_client();
    let target = path("content/portfolio.json");
    client_b.commit_file(&target, "{\"projects\":[]}", "seed").unwrap();

    // client A reads version V
    let stale = client_b.handle(&target).unwrap();

    // client B moves the file to V'
    client_b.commit_file(&target, "{\"projects\":[1]}", "b").unwrap();

    let result = client_b.commit_file_if(&stale, "{\"projects\":[2]}", "a");
    assert!(matches!(result, Err(StorageError::Conflict { .. })));
    assert_eq!(client_b.read_file(&target).unwrap().unwrap().content, "{\"projects\":[1]}");
}

#[test]
fn test_delete_missing_is_not_found() {
    let (_dir, repo, client) = setup_client();
    let before = commit_count(&repo);

    let result = client.delete_file(&path("content/blog/ghost.md"), "delete");
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(commit_count(&repo), before);
}

#[test]
fn test_commit_files_is_one_commit() {
    let (_dir, repo, client) = setup_client();
    client.commit_file(&path("content/blog/keep.md"), "keep", "seed").unwrap();
    client.commit_file(&path("content/blog/old.md"), "old", "seed").unwrap();
    let kept_version = client.get_current_version(&path("content/blog/keep.md")).unwrap();
    let before = commit_count(&repo);

    let changes = vec![
        FileChange::write(path("content/blog/new.md"), "new"),
        FileChange::write(path("content/resume.json"), "{}"),
        FileChange::delete(path("content/blog/old.md")),
    ];
    let commit = client.commit_files(&changes, "[batch] save 3 entries").unwrap();

    assert_eq!(commit_count(&repo), before + 1);
    assert_eq!(repo.head(&BranchName::main()).unwrap(), commit.sha);
    assert_eq!(latest_message(&repo), "[batch] save 3 entries");
    assert_eq!(
        client.list_dir(&path("content/blog")).unwrap(),
        vec!["keep.md", "new.md"]
    );
    assert_eq!(client.get_current_version(&path("content/blog/keep.md")).unwrap(), kept_version);
}

#[test]
fn test_commit_files_stale_expectation_leaves_ref() {
    let (_dir, repo, client) = setup_client();
    client.commit_file(&path("content/resume.json"), "{}", "seed").unwrap();
    let head = repo.head(&BranchName::main()).unwrap();

    let stale = VersionTag::of_bytes(b"{\"old\":true}").unwrap();
    let changes = vec![
        FileChange::write(path("content/blog/a.md"), "a"),
        FileChange::write(path("content/resume.json"), "{\"new\":true}").expecting(Precondition::Expect(Some(stale))),
    ];

    let result = client.commit_files(&changes, "batch");
    assert!(result.unwrap_err().is_conflict());
    assert_eq!(repo.head(&BranchName::main()).unwrap(), head);
    assert!(client.read_file(&path("content/blog/a.md")).unwrap().is_none());
}

#[test]
fn test_commit_files_unchanged_content_skips_commit() {
    let (_dir, repo, client) = setup_client();
    client.commit_file(&path("content/resume.json"), "{}", "seed").unwrap();
    let before = commit_count(&repo);

    let changes = vec![FileChange::write(path("content/resume.json"), "{}")];
    let commit = client.commit_files(&changes, "noop").unwrap();

    assert_eq!(commit_count(&repo), before);
    assert_eq!(commit.sha, repo.head(&BranchName::main()).unwrap());
}

#[test]
fn test_commit_files_delete_missing() {
    let (_dir, _repo, client) = setup_client();
    let changes = vec![FileChange::delete(path("content/blog/ghost.md"))];
    assert!(client.commit_files(&changes, "delete").unwrap_err().is_not_found());
}

// ==================== Content Store ====================

#[test]
fn test_blog_round_trip_over_git() {
    let (_dir, repo, store) = setup_store();
    let post = BlogPost {
        slug: "hello-world".to_string(),
        title: "Say \"Hello\" to C:\\ drives".to_string(),
        date: "2024-01-01".to_string(),
        category: "Growth Leadership".to_string(),
        excerpt: "x".to_string(),
        content: "<p>hi</p>\n\n---\n\nmore".to_string(),
    };

    store.save_blog_post(post.clone()).unwrap();
    assert_eq!(latest_message(&repo), "[blog] save hello-world");
    assert_eq!(store.read_blog_post("hello-world").unwrap(), Some(post));

    store.delete(EntityKind::BlogPost, Some("hello-world")).unwrap();
    assert_eq!(latest_message(&repo), "[blog] delete hello-world");
    assert!(store.read_blog_post("hello-world").unwrap().is_none());
    assert!(store.delete_blog_post("hello-world").unwrap_err().is_not_found());
}

#[test]
fn test_portfolio_delete_keeps_order_over_git() {
    let (_dir, _repo, store) = setup_store();
    for slug in ["first", "acme-project", "last"] {
        store.save_portfolio_item(project(slug)).unwrap();
    }

    store.delete(EntityKind::Portfolio, Some("acme-project")).unwrap();

    let slugs: Vec<_> = store.list_portfolio().unwrap().into_iter().map(|p| p.slug).collect();
    assert_eq!(slugs, vec!["first", "last"]);
}

#[test]
fn test_portfolio_conflict_from_another_writer() {
    let (_dir, repo, store) = setup_store();
    store.save_portfolio_item(project("mine")).unwrap();

    // a second writer holding the version from before the store's next save
    let other = RemoteClient::new(repo.clone(), BranchName::main());
    let stale = other.handle(&path("content/portfolio.json")).unwrap();

    store.save_portfolio_item(project("also-mine")).unwrap();

    let result = other.commit_file_if(&stale, "{\"projects\":[]}", "[portfolio] overwrite");
    assert!(result.unwrap_err().is_conflict());
    assert_eq!(store.list_portfolio().unwrap().len(), 2);
}

/// Commits `external` to the portfolio document right after the store's
/// first read of it, so the store's write carries a stale version.
struct EditedBetweenLoadAndStore {
    inner: RemoteClient,
    other: RemoteClient,
    external: String,
    fired: AtomicBool,
}

impl ContentBackend for EditedBetweenLoadAndStore {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn read(&self, path: &ContentPath) -> StorageResult<Option<StoredFile>> {
        let file = self.inner.read(path)?;
        if *path == path_of_portfolio() && !self.fired.swap(true, Ordering::SeqCst) {
            self.other.commit_file(path, &self.external, "[portfolio] edit elsewhere")?;
        }
        Ok(file)
    }

    fn write(
        &self,
        path: &ContentPath,
        content: &str,
        expected: Precondition,
        message: &str,
    ) -> StorageResult<WriteReceipt> {
        self.inner.write(path, content, expected, message)
    }

    fn delete(&self, path: &ContentPath, expected: Precondition, message: &str) -> StorageResult<()> {
        self.inner.delete(path, expected, message)
    }

    fn list(&self, dir: &ContentPath) -> StorageResult<Vec<String>> {
        self.inner.list(dir)
    }

    fn write_many(&self, changes: &[FileChange], message: &str) -> StorageResult<()> {
        self.inner.write_many(changes, message)
    }
}

fn path_of_portfolio() -> ContentPath {
    path("content/portfolio.json")
}

#[test]
fn test_portfolio_save_conflicts_when_edited_after_load() {
    let (_dir, repo, client) = setup_client();
    client
        .commit_file(&path_of_portfolio(), "{\"projects\":[]}", "[portfolio] seed")
        .unwrap();

    let external = "{\"projects\":[{\"slug\":\"theirs\"}]}".to_string();
    let store = ContentStore::with_backend(EditedBetweenLoadAndStore {
        inner: client,
        other: RemoteClient::new(repo.clone(), BranchName::main()),
        external: external.clone(),
        fired: AtomicBool::new(false),
    });
    let before = commit_count(&repo);

    let err = store.save_portfolio_item(project("mine")).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    // only the outside edit landed
    assert_eq!(commit_count(&repo), before + 1);
    assert_eq!(latest_message(&repo), "[portfolio] edit elsewhere");
    let reader = RemoteClient::new(repo.clone(), BranchName::main());
    assert_eq!(reader.read_file(&path_of_portfolio()).unwrap().unwrap().content, external);
}

#[test]
fn test_batch_over_git_is_one_commit() {
    let (_dir, repo, store) = setup_store();
    let before = commit_count(&repo);

    let entities = vec![
        Entity::from_payload(
            EntityKind::BlogPost,
            None,
            json!({ "title": "Batch Post", "date": "2024-02-02", "category": "AI Adoption",
                    "excerpt": "e", "content": "c" }),
        )
        .unwrap(),
        Entity::Portfolio(project("batched")),
    ];

    assert_eq!(store.save_batch(entities).unwrap(), 2);
    assert_eq!(commit_count(&repo), before + 1);
    assert_eq!(latest_message(&repo), "[batch] save 2 entries");
    assert!(store.read_blog_post("batch-post").unwrap().is_some());
    assert!(store.read_portfolio_item("batched").unwrap().is_some());
}

#[test]
fn test_migrate_portfolio_over_git() {
    let (_dir, repo, store) = setup_store();
    let client = RemoteClient::new(repo.clone(), BranchName::main());
    let legacy = json!({
        "projects": [
            { "slug": "old", "name": "Old", "star": { "situation": "s", "task": "t", "action": "a", "result": "r" } },
            { "slug": "new", "name": "New", "star": { "content": "<p>x</p>" } }
        ]
    });
    client
        .commit_file(&path("content/portfolio.json"), &legacy.to_string(), "seed")
        .unwrap();

    assert_eq!(store.migrate_portfolio().unwrap(), 1);
    assert_eq!(latest_message(&repo), "[portfolio] migrate 1 case studies");

    let items = store.list_portfolio().unwrap();
    assert!(items.iter().all(|p| !p.has_legacy_star()));
    let before = commit_count(&repo);
    assert_eq!(store.migrate_portfolio().unwrap(), 0);
    assert_eq!(commit_count(&repo), before);
}

#[test]
fn test_status_reports_git_target() {
    let (_dir, repo, store) = setup_store();
    let status = store.status();

    assert!(status.writable);
    assert!(status.problem.is_none());
    assert!(status.target.contains(&repo.path().display().to_string()));
    assert!(status.target.ends_with("@main"));
}

#[test]
fn test_concurrent_portfolio_saves() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(ContentStore::open(StoreConfig::new(dir.path())).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.save_portfolio_item(project(&format!("item-{}", i))).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut slugs: Vec<_> = store.list_portfolio().unwrap().into_iter().map(|p| p.slug).collect();
    slugs.sort();
    let expected: Vec<_> = (0..8).map(|i| format!("item-{}", i)).collect();
    assert_eq!(slugs, expected);
}

#[test]
fn test_read_only_deployment_cannot_persist() {
    let dir = TempDir::new().unwrap();
    let store = ContentStore::open(StoreConfig::new(dir.path()).hosted()).unwrap();

    let err = store.save_portfolio_item(project("x")).unwrap_err();
    match err {
        StoreError::CannotPersist { remediation, .. } => assert!(remediation.contains("GITHUB_TOKEN")),
        other => panic!("unexpected {other:?}"),
    }
}
