//! Single-writer actor owning the portal document
//!
//! Exactly one actor per process holds the document, the credentials and
//! the file backend. Every mutation arrives as a message and runs to
//! completion before the next one:
//! 1. apply the change to a copy of the document (and credentials)
//! 2. lock both files, then check that neither moved past the revision
//!    this process loaded
//! 3. write credentials (if touched), then the document
//! 4. swap the copies in only after both writes succeed
//!
//! A failed step leaves the in-memory state and the files as they were.
//! A revision conflict additionally reloads both files from disk so the
//! next interaction starts from what another process saved.

use crate::credentials::CredentialStore;
use chrono::{NaiveDate, Utc};
use portal_core::{
    ConfigError, DeletedPortal, DeletionPolicy, NewResource, NewSubmission, PortalConfig,
    PortalDocument, PortalId, PortalResult, Resource, ResourceId, ResourceUpdate,
    SubmissionRecord, ValidationError,
};
use portal_persist::{FileBackend, SaveLock};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Messages handled by the actor
#[derive(Debug)]
pub(crate) enum Command {
    /// Apply a mutation and persist it
    Mutate {
        mutation: Mutation,
        reply: oneshot::Sender<PortalResult<Outcome>>,
    },
    /// Current committed document
    Snapshot {
        reply: oneshot::Sender<Arc<PortalDocument>>,
    },
    /// Check a portal password
    Verify {
        portal: PortalId,
        password: String,
        reply: oneshot::Sender<PortalResult<()>>,
    },
    /// Re-read the document and credentials from disk
    Reload {
        reply: oneshot::Sender<PortalResult<u64>>,
    },
    /// Stop the actor
    Shutdown,
}

/// State-changing operations
#[derive(Debug)]
pub(crate) enum Mutation {
    CreatePortal { name: String, password: String },
    DeletePortal { portal: PortalId },
    SetPassword { portal: PortalId, password: String },
    AddResource { portal: PortalId, resource: NewResource },
    UpdateResource { portal: PortalId, resource: ResourceId, update: ResourceUpdate },
    RemoveResource { portal: PortalId, resource: ResourceId },
    SetDeadline { portal: PortalId, resource: ResourceId, deadline: Option<NaiveDate> },
    AddMember { portal: PortalId, name: String },
    RemoveMember { portal: PortalId, name: String },
    SyncMembers { portal: PortalId, names: Vec<String> },
    Append(NewSubmission),
}

impl Mutation {
    fn name(&self) -> &'static str {
        match self {
            Self::CreatePortal { .. } => "create_portal",
            Self::DeletePortal { .. } => "delete_portal",
            Self::SetPassword { .. } => "set_password",
            Self::AddResource { .. } => "add_resource",
            Self::UpdateResource { .. } => "update_resource",
            Self::RemoveResource { .. } => "remove_resource",
            Self::SetDeadline { .. } => "set_deadline",
            Self::AddMember { .. } => "add_member",
            Self::RemoveMember { .. } => "remove_member",
            Self::SyncMembers { .. } => "sync_members",
            Self::Append(_) => "append",
        }
    }
}

/// Results of mutations
#[derive(Debug)]
pub(crate) enum Outcome {
    Portal(PortalId),
    Deleted(DeletedPortal),
    ResourceId(ResourceId),
    Resource(Resource),
    Deadline(NaiveDate),
    Changed(bool),
    Members(Vec<String>),
    Record(SubmissionRecord),
    Done,
}

/// Actor state
#[derive(Debug)]
pub(crate) struct PortalActor {
    document: Arc<PortalDocument>,
    credentials: CredentialStore,
    backend: FileBackend,
    credentials_path: PathBuf,
    deletion_policy: DeletionPolicy,
    admin: PortalId,
}

/// Pending changes produced by one mutation
struct Staged {
    document: Option<PortalDocument>,
    credentials: Option<CredentialStore>,
}

impl PortalActor {
    /// Load state from disk and apply configured seeds
    ///
    /// A missing document is created from the configured portals. An
    /// existing one only gets the admin portal added if it is absent.
    /// Seeded passwords fill in missing credentials; passwords from the
    /// environment always replace stored ones.
    ///
    /// # Errors
    /// - `ConfigError::MissingAdminPassword` if the admin portal ends up
    ///   without a credential
    /// - `PersistenceError` if either file cannot be read or written
    pub(crate) fn open(config: &PortalConfig) -> PortalResult<Self> {
        config.validate()?;
        let admin = config.admin_portal_id()?;
        let backend = FileBackend::new(&config.data_path);
        let now = Utc::now();

        let loaded = backend.load()?;
        let fresh = loaded.is_none();
        let mut document = loaded.unwrap_or_default();
        let mut dirty = fresh;

        if fresh {
            for seed in &config.portals {
                let id = document.create_portal(&seed.id, now)?;
                document.sync_members(&id, &seed.members)?;
                for resource in &seed.resources {
                    document.add_resource(&id, resource.clone())?;
                }
            }
            tracing::info!(
                "initialized {} with {} seeded portals",
                backend.path().display(),
                document.portals.len()
            );
        }
        if document.portal(&admin).is_err() {
            document.create_portal(admin.as_str(), now)?;
            dirty = true;
        }

        let mut credentials = CredentialStore::load(&config.credentials_path)?;
        let mut credentials_dirty = false;
        for seed in &config.portals {
            let (Ok(id), Some(password)) = (PortalId::new(&seed.id), seed.password.as_deref())
            else {
                continue;
            };
            if document.portal(&id).is_err() {
                continue;
            }
            if seed.password_from_env || !credentials.contains(&id) {
                credentials.set(&id, password)?;
                credentials_dirty = true;
            }
        }
        if !credentials.contains(&admin) {
            return Err(ConfigError::MissingAdminPassword(admin.to_string()).into());
        }

        if credentials_dirty {
            credentials.save_checked(&config.credentials_path)?;
        }
        if dirty {
            backend.save_checked(&mut document)?;
        }

        Ok(Self {
            document: Arc::new(document),
            credentials,
            backend,
            credentials_path: config.credentials_path.clone(),
            deletion_policy: config.deletion_policy,
            admin,
        })
    }

    /// Process commands until shutdown or until every handle is dropped
    ///
    /// Runs on a blocking thread since every command does file i/o.
    pub(crate) fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        while let Some(command) = rx.blocking_recv() {
            match command {
                Command::Mutate { mutation, reply } => {
                    let _ = reply.send(self.mutate(mutation));
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(Arc::clone(&self.document));
                }
                Command::Verify {
                    portal,
                    password,
                    reply,
                } => {
                    let _ = reply.send(
                        self.refresh_if_stale()
                            .and_then(|()| self.verify(&portal, &password)),
                    );
                }
                Command::Reload { reply } => {
                    let _ = reply.send(self.reload());
                }
                Command::Shutdown => break,
            }
        }
        tracing::debug!("portal actor stopped");
    }

    fn verify(&self, portal: &PortalId, password: &str) -> PortalResult<()> {
        self.document.portal(portal)?;
        self.credentials.verify(portal, password)?;
        Ok(())
    }

    fn reload(&mut self) -> PortalResult<u64> {
        let document = self.backend.load_or_default()?;
        let credentials = CredentialStore::load(&self.credentials_path)?;
        let revision = document.revision;
        tracing::info!(
            "reloaded document at revision {}, credentials at revision {}",
            revision,
            credentials.revision()
        );
        self.document = Arc::new(document);
        self.credentials = credentials;
        Ok(revision)
    }

    /// Reload when another process saved either file since we last did
    fn refresh_if_stale(&mut self) -> PortalResult<()> {
        let document = self.backend.on_disk_revision()?;
        let credentials = portal_persist::read_revision(&self.credentials_path)?;
        if document != self.document.revision || credentials != self.credentials.revision() {
            self.reload()?;
        }
        Ok(())
    }

    fn mutate(&mut self, mutation: Mutation) -> PortalResult<Outcome> {
        let name = mutation.name();
        let result = self
            .stage(mutation)
            .and_then(|(staged, outcome)| self.commit(staged).map(|()| outcome));
        match &result {
            Ok(_) => tracing::info!("{} committed at revision {}", name, self.document.revision),
            Err(e) if e.is_user_facing() => tracing::debug!("{} rejected: {}", name, e),
            Err(e) => tracing::error!("{} failed: {}", name, e),
        }
        result
    }

    fn stage(&self, mutation: Mutation) -> PortalResult<(Staged, Outcome)> {
        let now = Utc::now();
        let mut doc = (*self.document).clone();

        let outcome = match mutation {
            Mutation::CreatePortal { name, password } => {
                let id = doc.create_portal(&name, now)?;
                let mut credentials = self.credentials.clone();
                credentials.set(&id, &password)?;
                return Ok((
                    Staged {
                        document: Some(doc),
                        credentials: Some(credentials),
                    },
                    Outcome::Portal(id),
                ));
            }
            Mutation::DeletePortal { portal } => {
                if portal == self.admin {
                    return Err(ValidationError::ProtectedPortal(portal.to_string()).into());
                }
                let deleted = doc.delete_portal(&portal, self.deletion_policy)?;
                let mut credentials = self.credentials.clone();
                credentials.remove(&portal);
                return Ok((
                    Staged {
                        document: Some(doc),
                        credentials: Some(credentials),
                    },
                    Outcome::Deleted(deleted),
                ));
            }
            Mutation::SetPassword { portal, password } => {
                self.document.portal(&portal)?;
                let mut credentials = self.credentials.clone();
                credentials.set(&portal, &password)?;
                return Ok((
                    Staged {
                        document: None,
                        credentials: Some(credentials),
                    },
                    Outcome::Done,
                ));
            }
            Mutation::AddResource { portal, resource } => {
                Outcome::ResourceId(doc.add_resource(&portal, resource)?)
            }
            Mutation::UpdateResource {
                portal,
                resource,
                update,
            } => Outcome::Resource(doc.update_resource(&portal, &resource, update)?),
            Mutation::RemoveResource { portal, resource } => {
                Outcome::Resource(doc.remove_resource(&portal, &resource)?)
            }
            Mutation::SetDeadline {
                portal,
                resource,
                deadline,
            } => Outcome::Deadline(doc.set_deadline(&portal, &resource, deadline)?),
            Mutation::AddMember { portal, name } => Outcome::Changed(doc.add_member(&portal, &name)?),
            Mutation::RemoveMember { portal, name } => {
                Outcome::Changed(doc.remove_member(&portal, &name)?)
            }
            Mutation::SyncMembers { portal, names } => {
                Outcome::Members(doc.sync_members(&portal, &names)?)
            }
            Mutation::Append(submission) => Outcome::Record(doc.append(submission, now)?),
        };

        Ok((
            Staged {
                document: Some(doc),
                credentials: None,
            },
            outcome,
        ))
    }

    fn commit(&mut self, staged: Staged) -> PortalResult<()> {
        let result = self.write_staged(staged);
        if let Err(err) = &result {
            if err.is_conflict() {
                if let Err(reload) = self.reload() {
                    tracing::error!("reload after conflict failed: {}", reload);
                }
            }
        }
        result
    }

    /// Write staged files under both save locks
    ///
    /// Locks are always taken document first, then credentials.
    fn write_staged(&mut self, staged: Staged) -> PortalResult<()> {
        let Staged {
            document,
            mut credentials,
        } = staged;

        let _document_lock = match &document {
            Some(_) => Some(SaveLock::acquire(self.backend.path())?),
            None => None,
        };
        let _credentials_lock = match &credentials {
            Some(_) => Some(SaveLock::acquire(&self.credentials_path)?),
            None => None,
        };
        if let Some(document) = &document {
            self.backend.ensure_revision(document.revision)?;
        }
        if let Some(credentials) = &credentials {
            portal_persist::ensure_revision(&self.credentials_path, credentials.revision())?;
        }

        if let Some(credentials) = credentials.as_mut() {
            credentials.save(&self.credentials_path)?;
        }
        if let Some(mut document) = document {
            if let Err(e) = self.backend.save(&mut document) {
                if credentials.is_some() {
                    if let Err(revert) = self.credentials.restore(&self.credentials_path) {
                        tracing::error!("failed to restore credentials: {}", revert);
                    }
                }
                return Err(e.into());
            }
            self.document = Arc::new(document);
        }

        if let Some(credentials) = credentials {
            self.credentials = credentials;
        }
        Ok(())
    }
}
