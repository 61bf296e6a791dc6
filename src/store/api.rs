//! Content store API - the backend-agnostic entry point for the admin panel.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::content::validation::{
    validate_blog_post, validate_portfolio_item, validate_resume, validate_speaking,
};
use crate::content::{
    decode_document, encode_document, generate_slug, BlogPost, Document, PortfolioDocument,
    PortfolioItem, PostFile, ResumeDocument, Slug, SpeakingDocument, StarBlock, ValidationReport,
};
use crate::storage::{
    BackendKind, ContentBackend, ContentPath, FileChange, GitRepository, GithubHost,
    LocalFileStore, Precondition, RemoteClient, VersionTag,
};
use crate::store::config::{Environment, RemoteTarget, StoreConfig};
use crate::store::error::{StoreError, StoreResult};
use crate::store::message::CommitMessage;

// ==================== Entities ====================

/// The kinds of content the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    BlogPost,
    Portfolio,
    Resume,
    Speaking,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::BlogPost,
        EntityKind::Portfolio,
        EntityKind::Resume,
        EntityKind::Speaking,
    ];

    /// Short name used in commit messages and on the command line.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::BlogPost => "blog",
            EntityKind::Portfolio => "portfolio",
            EntityKind::Resume => "resume",
            EntityKind::Speaking => "speaking",
        }
    }

    /// Singletons are whole documents without a slug.
    pub fn is_singleton(self) -> bool {
        matches!(self, EntityKind::Resume | EntityKind::Speaking)
    }
}

impl FromStr for EntityKind {
    type Err = StoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "blog" | "blogpost" | "blog-post" | "post" => Ok(EntityKind::BlogPost),
            "portfolio" | "project" => Ok(EntityKind::Portfolio),
            "resume" => Ok(EntityKind::Resume),
            "speaking" => Ok(EntityKind::Speaking),
            _ => Err(StoreError::UnknownKind(raw.to_string())),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A typed content payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    BlogPost(BlogPost),
    Portfolio(PortfolioItem),
    Resume(ResumeDocument),
    Speaking(SpeakingDocument),
}

impl Entity {
    /// Decode an untyped payload. An explicit `slug` overrides the one in the
    /// payload; singletons ignore it.
    pub fn from_payload(kind: EntityKind, slug: Option<&str>, payload: Value) -> StoreResult<Self> {
        let mut entity = match kind {
            EntityKind::BlogPost => Entity::BlogPost(serde_json::from_value(payload)?),
            EntityKind::Portfolio => Entity::Portfolio(serde_json::from_value(payload)?),
            EntityKind::Resume => Entity::Resume(serde_json::from_value(payload)?),
            EntityKind::Speaking => Entity::Speaking(serde_json::from_value(payload)?),
        };

        if let Some(slug) = slug {
            match &mut entity {
                Entity::BlogPost(post) => post.slug = slug.to_string(),
                Entity::Portfolio(item) => item.slug = slug.to_string(),
                Entity::Resume(_) | Entity::Speaking(_) => {}
            }
        }
        Ok(entity)
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::BlogPost(_) => EntityKind::BlogPost,
            Entity::Portfolio(_) => EntityKind::Portfolio,
            Entity::Resume(_) => EntityKind::Resume,
            Entity::Speaking(_) => EntityKind::Speaking,
        }
    }

    pub fn slug(&self) -> Option<&str> {
        match self {
            Entity::BlogPost(post) => Some(post.slug.as_str()),
            Entity::Portfolio(item) => Some(item.slug.as_str()),
            Entity::Resume(_) | Entity::Speaking(_) => None,
        }
    }

    pub fn to_value(&self) -> StoreResult<Value> {
        let value = match self {
            Entity::BlogPost(post) => serde_json::to_value(post)?,
            Entity::Portfolio(item) => serde_json::to_value(item)?,
            Entity::Resume(resume) => serde_json::to_value(resume)?,
            Entity::Speaking(speaking) => serde_json::to_value(speaking)?,
        };
        Ok(value)
    }

    /// Normalize, fill in a missing slug and validate.
    fn prepare(self) -> StoreResult<Self> {
        Ok(match self {
            Entity::BlogPost(post) => Entity::BlogPost(prepare_blog_post(post)?),
            Entity::Portfolio(item) => Entity::Portfolio(prepare_portfolio_item(item)?),
            Entity::Resume(resume) => Entity::Resume(prepare_resume(resume)?),
            Entity::Speaking(speaking) => Entity::Speaking(prepare_speaking(speaking)?),
        })
    }

    /// How validation messages of this entity are prefixed in a batch.
    fn label(&self, index: usize) -> String {
        match self.slug() {
            Some(slug) if !slug.is_empty() => format!("{} {}", self.kind(), slug),
            _ if self.kind().is_singleton() => self.kind().to_string(),
            _ => format!("{} #{}", self.kind(), index + 1),
        }
    }
}

fn checked(report: ValidationReport) -> StoreResult<()> {
    if report.valid() {
        Ok(())
    } else {
        Err(StoreError::validation(report.errors))
    }
}

fn prepare_blog_post(mut post: BlogPost) -> StoreResult<BlogPost> {
    if post.slug.trim().is_empty() {
        post.slug = generate_slug(&post.title);
    }
    checked(validate_blog_post(&post))?;
    post.slug = Slug::parse(&post.slug)?.into_string();
    Ok(post)
}

fn prepare_portfolio_item(mut item: PortfolioItem) -> StoreResult<PortfolioItem> {
    item.normalize();
    if item.slug.trim().is_empty() {
        item.slug = generate_slug(&item.name);
    }
    checked(validate_portfolio_item(&item))?;
    item.slug = Slug::parse(&item.slug)?.into_string();
    item.star = item.star.take().map(StarBlock::into_canonical);
    Ok(item)
}

fn prepare_resume(resume: ResumeDocument) -> StoreResult<ResumeDocument> {
    checked(validate_resume(&resume))?;
    Ok(resume)
}

fn prepare_speaking(mut speaking: SpeakingDocument) -> StoreResult<SpeakingDocument> {
    speaking.normalize();
    checked(validate_speaking(&speaking))?;
    Ok(speaking)
}

/// Replace any earlier change to the same path.
fn push_change(changes: &mut Vec<FileChange>, change: FileChange) {
    changes.retain(|existing| existing.path != change.path);
    changes.push(change);
}

// ==================== Status ====================

/// What the store persists to and whether it currently can.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    pub backend: BackendKind,
    pub target: String,
    pub writable: bool,
    /// configuration note, e.g. why a hosted store is read-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    /// failed access check, phrased as what to fix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

fn describe_problem(err: &StoreError) -> String {
    match err {
        StoreError::Unauthorized(_) => "the token was rejected; check GITHUB_TOKEN".to_string(),
        StoreError::Forbidden(_) => {
            "the token cannot access the repository; grant it read and write access to contents".to_string()
        }
        StoreError::NotFound(what) => {
            format!("{} not found; check GITHUB_OWNER, GITHUB_REPO and GITHUB_BRANCH", what)
        }
        StoreError::Transport(detail) => format!("could not reach the content host: {}", detail),
        other => other.to_string(),
    }
}

// ==================== Store ====================

/// The content store handle.
///
/// The backend is chosen once in [`ContentStore::open`]. Mutations of shared
/// documents run read-modify-write under an in-process lock, and carry the
/// version they read as the write precondition so a concurrent change made
/// elsewhere fails with [`StoreError::Conflict`] instead of being lost.
pub struct ContentStore {
    backend: Box<dyn ContentBackend>,
    notice: Option<String>,
    documents: Mutex<()>,
}

impl ContentStore {
    /// Open the store described by `config`.
    ///
    /// A hosted environment persists to the configured remote; without one
    /// the local content directory is served read-only.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let missing = config.missing_remote_settings();

        let store = match (config.environment, config.remote) {
            (Environment::Hosted, Some(RemoteTarget::Github(github))) if missing.is_empty() => {
                let host = GithubHost::new(github)?;
                Self::with_backend(RemoteClient::new(host, config.branch))
            }
            (Environment::Hosted, Some(RemoteTarget::GitRepository(path))) => {
                let repo = GitRepository::open_or_init(&path)?;
                Self::with_backend(RemoteClient::new(repo, config.branch))
            }
            (Environment::Hosted, _) => {
                let notice = format!(
                    "remote storage is not configured (missing {}); content is read-only",
                    missing.join(", ")
                );
                warn!(root = %config.content_root.display(), "{}", notice);
                let mut store = Self::with_backend(LocalFileStore::read_only(config.content_root));
                store.notice = Some(notice);
                store
            }
            (Environment::Development, remote) => {
                if remote.is_some() {
                    debug!("development environment; remote settings are ignored");
                }
                Self::with_backend(LocalFileStore::new(config.content_root))
            }
        };

        info!(backend = %store.backend.kind(), target = %store.backend.describe(), "opened content store");
        Ok(store)
    }

    pub fn with_backend(backend: impl ContentBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            notice: None,
            documents: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &dyn ContentBackend {
        self.backend.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn status(&self) -> StoreStatus {
        let problem = self
            .backend
            .check()
            .err()
            .map(|err| describe_problem(&StoreError::from(err)));

        StoreStatus {
            backend: self.backend.kind(),
            target: self.backend.describe(),
            writable: self.backend.writable(),
            notice: self.notice.clone(),
            problem,
        }
    }

    // ==================== Generic Operations ====================

    /// Validate and persist an untyped payload; returns the stored entity.
    pub fn save(&self, kind: EntityKind, slug: Option<&str>, payload: Value) -> StoreResult<Entity> {
        self.save_entity(Entity::from_payload(kind, slug, payload)?)
    }

    pub fn save_entity(&self, entity: Entity) -> StoreResult<Entity> {
        Ok(match entity {
            Entity::BlogPost(post) => Entity::BlogPost(self.save_blog_post(post)?),
            Entity::Portfolio(item) => Entity::Portfolio(self.save_portfolio_item(item)?),
            Entity::Resume(resume) => Entity::Resume(self.save_resume(resume)?),
            Entity::Speaking(speaking) => Entity::Speaking(self.save_speaking(speaking)?),
        })
    }

    /// Delete one entity; singletons ignore `slug`.
    pub fn delete(&self, kind: EntityKind, slug: Option<&str>) -> StoreResult<()> {
        match kind {
            EntityKind::BlogPost => self.delete_blog_post(slug.unwrap_or_default()),
            EntityKind::Portfolio => self.delete_portfolio_item(slug.unwrap_or_default()),
            EntityKind::Resume => self.delete_document(Document::Resume, kind),
            EntityKind::Speaking => self.delete_document(Document::Speaking, kind),
        }
    }

    /// Read one entity, or the whole collection when `slug` is `None`.
    pub fn read(&self, kind: EntityKind, slug: Option<&str>) -> StoreResult<Option<Value>> {
        let value = match (kind, slug) {
            (EntityKind::BlogPost, Some(slug)) => self.read_blog_post(slug)?.map(serde_json::to_value).transpose()?,
            (EntityKind::BlogPost, None) => Some(serde_json::to_value(self.list_blog_posts()?)?),
            (EntityKind::Portfolio, Some(slug)) => {
                self.read_portfolio_item(slug)?.map(serde_json::to_value).transpose()?
            }
            (EntityKind::Portfolio, None) => Some(serde_json::to_value(self.list_portfolio()?)?),
            (EntityKind::Resume, _) => self.read_resume()?.map(serde_json::to_value).transpose()?,
            (EntityKind::Speaking, _) => self.read_speaking()?.map(serde_json::to_value).transpose()?,
        };
        Ok(value)
    }

    // ==================== Blog ====================

    /// Save a post; a missing slug is derived from the title.
    pub fn save_blog_post(&self, post: BlogPost) -> StoreResult<BlogPost> {
        let post = prepare_blog_post(post)?;
        let slug = Slug::parse(&post.slug)?;

        let message = CommitMessage::save(EntityKind::BlogPost, Some(slug.as_str()));
        self.backend.write(
            &ContentPath::blog_post(&slug),
            &post.to_file().encode(),
            Precondition::Any,
            message.as_str(),
        )?;

        info!(slug = %slug, backend = %self.backend.kind(), "saved blog post");
        Ok(post)
    }

    pub fn read_blog_post(&self, slug: &str) -> StoreResult<Option<BlogPost>> {
        let slug = Slug::parse(slug)?;
        let Some(file) = self.backend.read(&ContentPath::blog_post(&slug))? else {
            return Ok(None);
        };
        Ok(Some(BlogPost::from_file(&slug, PostFile::decode(&file.content)?)))
    }

    /// Every post, newest first. Files that are not valid posts are skipped
    /// with a warning so one broken file cannot hide the rest.
    pub fn list_blog_posts(&self) -> StoreResult<Vec<BlogPost>> {
        let mut posts = Vec::new();
        for name in self.backend.list(&ContentPath::blog_dir())? {
            let Some(stem) = name.strip_suffix(".md") else {
                continue;
            };
            let Ok(slug) = Slug::parse(stem) else {
                warn!(file = %name, "skipping blog file with an invalid slug");
                continue;
            };
            if slug.as_str() != stem {
                warn!(file = %name, "skipping blog file with an invalid slug");
                continue;
            }
            let Some(file) = self.backend.read(&ContentPath::blog_post(&slug))? else {
                continue;
            };
            match PostFile::decode(&file.content) {
                Ok(decoded) => posts.push(BlogPost::from_file(&slug, decoded)),
                Err(err) => warn!(file = %name, error = %err, "skipping unreadable blog file"),
            }
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    pub fn delete_blog_post(&self, slug: &str) -> StoreResult<()> {
        let slug = Slug::parse(slug)?;
        let message = CommitMessage::delete(EntityKind::BlogPost, Some(slug.as_str()));
        self.backend
            .delete(&ContentPath::blog_post(&slug), Precondition::Any, message.as_str())?;

        info!(slug = %slug, "deleted blog post");
        Ok(())
    }

    // ==================== Portfolio ====================

    fn load_portfolio(&self) -> StoreResult<(PortfolioDocument, Option<VersionTag>)> {
        match self.backend.read(&ContentPath::document(Document::Portfolio))? {
            Some(file) => Ok((decode_document(&file.content)?, Some(file.version))),
            None => Ok((PortfolioDocument::default(), None)),
        }
    }

    fn store_portfolio(
        &self,
        document: &PortfolioDocument,
        version: Option<VersionTag>,
        message: &CommitMessage,
    ) -> StoreResult<()> {
        self.backend.write(
            &ContentPath::document(Document::Portfolio),
            &encode_document(document)?,
            Precondition::Expect(version),
            message.as_str(),
        )?;
        Ok(())
    }

    /// Insert or replace a project, keeping the position of an existing one.
    pub fn save_portfolio_item(&self, item: PortfolioItem) -> StoreResult<PortfolioItem> {
        let item = prepare_portfolio_item(item)?;
        let message = CommitMessage::save(EntityKind::Portfolio, Some(item.slug.as_str()));

        let _guard = self.documents.lock();
        let (mut document, version) = self.load_portfolio()?;
        let replaced = document.upsert(item.clone());
        self.store_portfolio(&document, version, &message)?;

        info!(slug = %item.slug, replaced, "saved portfolio item");
        Ok(item)
    }

    pub fn read_portfolio_item(&self, slug: &str) -> StoreResult<Option<PortfolioItem>> {
        let slug = Slug::parse(slug)?;
        let (document, _) = self.load_portfolio()?;
        Ok(document.get(slug.as_str()).cloned())
    }

    /// Projects in document order.
    pub fn list_portfolio(&self) -> StoreResult<Vec<PortfolioItem>> {
        Ok(self.load_portfolio()?.0.projects)
    }

    /// Remove exactly the project with `slug`; the others keep their order.
    pub fn delete_portfolio_item(&self, slug: &str) -> StoreResult<()> {
        let slug = Slug::parse(slug)?;
        let message = CommitMessage::delete(EntityKind::Portfolio, Some(slug.as_str()));

        let _guard = self.documents.lock();
        let (mut document, version) = self.load_portfolio()?;
        if document.remove(slug.as_str()).is_none() {
            return Err(StoreError::NotFound(format!("portfolio item {}", slug)));
        }
        self.store_portfolio(&document, version, &message)?;

        info!(slug = %slug, "deleted portfolio item");
        Ok(())
    }

    /// Rewrite every legacy case study in the canonical shape, in one write.
    ///
    /// Returns the number of migrated items; nothing is written when it is zero.
    pub fn migrate_portfolio(&self) -> StoreResult<usize> {
        let _guard = self.documents.lock();
        let (mut document, version) = self.load_portfolio()?;

        let migrated = document.migrate_case_studies();
        if migrated == 0 {
            debug!("no legacy case studies to migrate");
            return Ok(0);
        }

        self.store_portfolio(&document, version, &CommitMessage::migrate_case_studies(migrated))?;
        info!(migrated, "migrated legacy case studies");
        Ok(migrated)
    }

    // ==================== Singleton Documents ====================

    fn read_document<T: DeserializeOwned>(&self, document: Document) -> StoreResult<Option<T>> {
        match self.backend.read(&ContentPath::document(document))? {
            Some(file) => Ok(Some(decode_document(&file.content)?)),
            None => Ok(None),
        }
    }

    fn write_document<T: Serialize>(&self, document: Document, kind: EntityKind, value: &T) -> StoreResult<()> {
        let message = CommitMessage::save(kind, None);
        self.backend.write(
            &ContentPath::document(document),
            &encode_document(value)?,
            Precondition::Any,
            message.as_str(),
        )?;
        info!(document = %document, "saved document");
        Ok(())
    }

    fn delete_document(&self, document: Document, kind: EntityKind) -> StoreResult<()> {
        let message = CommitMessage::delete(kind, None);
        self.backend
            .delete(&ContentPath::document(document), Precondition::Any, message.as_str())?;
        info!(document = %document, "deleted document");
        Ok(())
    }

    pub fn read_resume(&self) -> StoreResult<Option<ResumeDocument>> {
        self.read_document(Document::Resume)
    }

    pub fn save_resume(&self, resume: ResumeDocument) -> StoreResult<ResumeDocument> {
        let resume = prepare_resume(resume)?;
        self.write_document(Document::Resume, EntityKind::Resume, &resume)?;
        Ok(resume)
    }

    pub fn read_speaking(&self) -> StoreResult<Option<SpeakingDocument>> {
        self.read_document(Document::Speaking)
    }

    pub fn save_speaking(&self, speaking: SpeakingDocument) -> StoreResult<SpeakingDocument> {
        let speaking = prepare_speaking(speaking)?;
        self.write_document(Document::Speaking, EntityKind::Speaking, &speaking)?;
        Ok(speaking)
    }

    // ==================== Batch ====================

    /// Save several entities together: one commit on a Git host.
    ///
    /// Every entity is validated first and all violations are reported at
    /// once, prefixed with the entity they belong to. Returns the number of
    /// files written.
    pub fn save_batch(&self, entities: Vec<Entity>) -> StoreResult<usize> {
        let mut errors = Vec::new();
        let mut prepared = Vec::with_capacity(entities.len());
        for (index, entity) in entities.into_iter().enumerate() {
            let label = entity.label(index);
            match entity.prepare() {
                Ok(entity) => prepared.push(entity),
                Err(StoreError::Validation { errors: found }) => {
                    errors.extend(ValidationReport { errors: found }.prefixed(&label).errors);
                }
                Err(other) => return Err(other),
            }
        }
        if !errors.is_empty() {
            return Err(StoreError::validation(errors));
        }

        let _guard = self.documents.lock();
        let mut changes = Vec::new();
        let mut portfolio = None;

        for entity in &prepared {
            match entity {
                Entity::BlogPost(post) => {
                    let path = ContentPath::blog_post(&Slug::parse(&post.slug)?);
                    push_change(&mut changes, FileChange::write(path, post.to_file().encode()));
                }
                Entity::Portfolio(item) => {
                    if portfolio.is_none() {
                        portfolio = Some(self.load_portfolio()?);
                    }
                    if let Some((document, _)) = portfolio.as_mut() {
                        document.upsert(item.clone());
                    }
                }
                Entity::Resume(resume) => {
                    let path = ContentPath::document(Document::Resume);
                    push_change(&mut changes, FileChange::write(path, encode_document(resume)?));
                }
                Entity::Speaking(speaking) => {
                    let path = ContentPath::document(Document::Speaking);
                    push_change(&mut changes, FileChange::write(path, encode_document(speaking)?));
                }
            }
        }

        if let Some((document, version)) = portfolio {
            let change = FileChange::write(ContentPath::document(Document::Portfolio), encode_document(&document)?)
                .expecting(Precondition::Expect(version));
            push_change(&mut changes, change);
        }

        let message = CommitMessage::batch(prepared.len());
        self.backend.write_many(&changes, message.as_str())?;

        info!(entries = prepared.len(), files = changes.len(), "saved batch");
        Ok(changes.len())
    }
}
