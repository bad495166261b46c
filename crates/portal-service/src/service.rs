//! Portal service handle
//!
//! [`PortalService`] is a cheap, cloneable handle to the single-writer
//! actor. Every interaction names a session; the session is checked for
//! expiry before anything else happens. Admin operations additionally
//! require a session on the admin portal; queries require the admin portal
//! or a session on the portal being read.

use crate::actor::{Command, Mutation, Outcome, PortalActor};
use crate::session::{Session, SessionId, SessionManager};
use chrono::{NaiveDate, Utc};
use portal_core::{
    AuthError, CompletionStats, DeletedPortal, ItemStatus, MemberProgress, NewResource,
    NewSubmission, PortalConfig, PortalDocument, PortalError, PortalId, PortalResult, Resource,
    ResourceId, ResourceUpdate, SubmissionRecord, SubmissionStatus, ValidationError,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const CHANNEL_CAPACITY: usize = 64;

/// Handle to a running portal service
#[derive(Debug, Clone)]
pub struct PortalService {
    sender: mpsc::Sender<Command>,
    sessions: Arc<SessionManager>,
    admin: PortalId,
    recent_default: usize,
}

impl PortalService {
    /// Open the stores named by `config` and start the actor
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Configuration or persistence failures while loading and seeding
    pub async fn spawn(config: PortalConfig) -> PortalResult<Self> {
        let admin = config.admin_portal_id()?;
        let sessions = Arc::new(SessionManager::new(config.session_timeout()));
        let recent_default = config.recent_default;

        let actor = tokio::task::spawn_blocking(move || PortalActor::open(&config))
            .await
            .map_err(|e| PortalError::ServiceUnavailable(e.to_string()))??;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::task::spawn_blocking(move || actor.run(rx));
        tracing::info!("portal service started (admin portal {})", admin);

        Ok(Self {
            sender: tx,
            sessions,
            admin,
            recent_default,
        })
    }

    /// Admin portal id
    #[inline]
    #[must_use]
    pub fn admin_portal(&self) -> &PortalId {
        &self.admin
    }

    /// Session table
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Authenticate against a portal and open a session
    ///
    /// # Errors
    /// `ValidationError::UnknownPortal` or `AuthError`
    pub async fn login(&self, portal: &str, password: &str) -> PortalResult<Session> {
        let portal = PortalId::new(portal)?;
        let verified = self
            .request(|reply| Command::Verify {
                portal: portal.clone(),
                password: password.to_string(),
                reply,
            })
            .await?;
        if let Err(e) = verified {
            tracing::warn!("login to {} rejected: {}", portal, e);
            return Err(e);
        }

        let session = self.sessions.open(portal, Utc::now());
        tracing::info!("session {} opened for {}", session.id, session.portal);
        Ok(session)
    }

    /// End a session
    pub fn logout(&self, session: &SessionId) -> bool {
        self.sessions.close(session)
    }

    /// Start an interaction on a session
    ///
    /// # Errors
    /// `AuthError::UnknownSession` or `AuthError::SessionExpired`
    pub fn touch(&self, session: &SessionId) -> PortalResult<Session> {
        Ok(self.sessions.touch(session, Utc::now())?)
    }

    /// Pick the member using a session
    ///
    /// The name must be in the portal's current member list.
    ///
    /// # Errors
    /// Session errors, or `ValidationError::UnknownMember`
    pub async fn select_member(&self, session: &SessionId, member: &str) -> PortalResult<Session> {
        let current = self.touch(session)?;
        let doc = self.snapshot().await?;
        let portal = doc.portal(&current.portal)?;
        if !portal.has_member(member.trim()) {
            return Err(ValidationError::UnknownMember {
                portal: current.portal.to_string(),
                member: member.trim().to_string(),
            }
            .into());
        }
        Ok(self.sessions.select_member(session, member, Utc::now())?)
    }

    /// Check that a session is live and on the admin portal
    ///
    /// # Errors
    /// Session errors, or `AuthError::AdminRequired`
    pub fn require_admin(&self, session: &SessionId) -> PortalResult<Session> {
        let current = self.touch(session)?;
        if current.is_admin(&self.admin) {
            Ok(current)
        } else {
            tracing::warn!("session {} on {} attempted an admin operation", current.id, current.portal);
            Err(AuthError::AdminRequired.into())
        }
    }

    /// Check that a session may read `portal`
    ///
    /// The admin portal reads every portal; any other session only its own.
    ///
    /// # Errors
    /// Session errors, or `AuthError::PortalAccessDenied`
    pub fn require_portal_access(
        &self,
        session: &SessionId,
        portal: &PortalId,
    ) -> PortalResult<Session> {
        let current = self.touch(session)?;
        if current.is_admin(&self.admin) || current.portal == *portal {
            Ok(current)
        } else {
            tracing::warn!("session {} on {} attempted to read {}", current.id, current.portal, portal);
            Err(AuthError::PortalAccessDenied(portal.to_string()).into())
        }
    }

    // ------------------------------------------------------------------
    // Portal store (admin)
    // ------------------------------------------------------------------

    /// Create a portal with its password
    ///
    /// # Errors
    /// Admin check, `ValidationError::DuplicatePortal` / `Blank`, persistence
    pub async fn create_portal(
        &self,
        session: &SessionId,
        name: &str,
        password: &str,
    ) -> PortalResult<PortalId> {
        self.require_admin(session)?;
        match self
            .mutate(Mutation::CreatePortal {
                name: name.to_string(),
                password: password.to_string(),
            })
            .await?
        {
            Outcome::Portal(id) => Ok(id),
            other => Err(unexpected(&other)),
        }
    }

    /// Delete a portal and end its sessions
    ///
    /// # Errors
    /// Admin check, `ValidationError::UnknownPortal` / `ProtectedPortal`,
    /// persistence
    pub async fn delete_portal(
        &self,
        session: &SessionId,
        portal: &PortalId,
    ) -> PortalResult<DeletedPortal> {
        self.require_admin(session)?;
        match self
            .mutate(Mutation::DeletePortal {
                portal: portal.clone(),
            })
            .await?
        {
            Outcome::Deleted(deleted) => {
                let closed = self.sessions.close_portal(portal);
                tracing::info!(
                    "deleted portal {} ({} records removed, {} sessions closed)",
                    portal,
                    deleted.removed_records,
                    closed
                );
                Ok(deleted)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Replace a portal's password and end its sessions
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn set_password(
        &self,
        session: &SessionId,
        portal: &PortalId,
        password: &str,
    ) -> PortalResult<()> {
        self.require_admin(session)?;
        self.mutate(Mutation::SetPassword {
            portal: portal.clone(),
            password: password.to_string(),
        })
        .await?;
        let closed = self.sessions.close_portal(portal);
        tracing::info!("password changed for {} ({} sessions closed)", portal, closed);
        Ok(())
    }

    /// Add a resource to a portal
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn add_resource(
        &self,
        session: &SessionId,
        portal: &PortalId,
        resource: NewResource,
    ) -> PortalResult<ResourceId> {
        self.require_admin(session)?;
        match self
            .mutate(Mutation::AddResource {
                portal: portal.clone(),
                resource,
            })
            .await?
        {
            Outcome::ResourceId(id) => Ok(id),
            other => Err(unexpected(&other)),
        }
    }

    /// Edit a resource's fields
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn update_resource(
        &self,
        session: &SessionId,
        portal: &PortalId,
        resource: &ResourceId,
        update: ResourceUpdate,
    ) -> PortalResult<Resource> {
        self.require_admin(session)?;
        self.resource_outcome(Mutation::UpdateResource {
            portal: portal.clone(),
            resource: *resource,
            update,
        })
        .await
    }

    /// Remove a resource; its history stays in the log
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn remove_resource(
        &self,
        session: &SessionId,
        portal: &PortalId,
        resource: &ResourceId,
    ) -> PortalResult<Resource> {
        self.require_admin(session)?;
        self.resource_outcome(Mutation::RemoveResource {
            portal: portal.clone(),
            resource: *resource,
        })
        .await
    }

    /// Override a resource's deadline, or clear the override with `None`
    ///
    /// Returns the effective deadline afterwards.
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn set_deadline(
        &self,
        session: &SessionId,
        portal: &PortalId,
        resource: &ResourceId,
        deadline: Option<NaiveDate>,
    ) -> PortalResult<NaiveDate> {
        self.require_admin(session)?;
        match self
            .mutate(Mutation::SetDeadline {
                portal: portal.clone(),
                resource: *resource,
                deadline,
            })
            .await?
        {
            Outcome::Deadline(date) => Ok(date),
            other => Err(unexpected(&other)),
        }
    }

    /// Add one member; false if already present
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn add_member(
        &self,
        session: &SessionId,
        portal: &PortalId,
        name: &str,
    ) -> PortalResult<bool> {
        self.require_admin(session)?;
        self.changed_outcome(Mutation::AddMember {
            portal: portal.clone(),
            name: name.to_string(),
        })
        .await
    }

    /// Remove one member; false if absent
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn remove_member(
        &self,
        session: &SessionId,
        portal: &PortalId,
        name: &str,
    ) -> PortalResult<bool> {
        self.require_admin(session)?;
        self.changed_outcome(Mutation::RemoveMember {
            portal: portal.clone(),
            name: name.to_string(),
        })
        .await
    }

    /// Replace a portal's member list
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn sync_members<I, S>(
        &self,
        session: &SessionId,
        portal: &PortalId,
        names: I,
    ) -> PortalResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.require_admin(session)?;
        let names = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        match self
            .mutate(Mutation::SyncMembers {
                portal: portal.clone(),
                names,
            })
            .await?
        {
            Outcome::Members(members) => Ok(members),
            other => Err(unexpected(&other)),
        }
    }

    /// Replace a portal's member list from pasted text
    ///
    /// # Errors
    /// As [`PortalService::sync_members`]
    pub async fn sync_members_from_text(
        &self,
        session: &SessionId,
        portal: &PortalId,
        text: &str,
    ) -> PortalResult<Vec<String>> {
        let names = portal_core::parse_member_list(text);
        self.sync_members(session, portal, names).await
    }

    // ------------------------------------------------------------------
    // Activity log
    // ------------------------------------------------------------------

    /// Append a record as the admin (any portal, any member)
    ///
    /// # Errors
    /// Admin check, `ValidationError`, persistence
    pub async fn append(
        &self,
        session: &SessionId,
        submission: NewSubmission,
    ) -> PortalResult<SubmissionRecord> {
        let current = self.require_admin(session)?;
        self.append_record(submission.with_session(current.id.to_string()))
            .await
    }

    /// Record a status update from a member session
    ///
    /// Portal and member come from the session.
    ///
    /// # Errors
    /// Session errors, `AuthError::NoMemberSelected`, `ValidationError`,
    /// persistence
    pub async fn submit(
        &self,
        session: &SessionId,
        item: &ResourceId,
        status: SubmissionStatus,
        notes: &str,
    ) -> PortalResult<SubmissionRecord> {
        let current = self.touch(session)?;
        let member = current.member()?;
        let submission = NewSubmission::new(current.portal.clone(), member, *item, status)
            .with_notes(notes)
            .with_session(current.id.to_string());
        self.append_record(submission).await
    }

    async fn append_record(&self, submission: NewSubmission) -> PortalResult<SubmissionRecord> {
        match self.mutate(Mutation::Append(submission)).await? {
            Outcome::Record(record) => {
                tracing::info!(
                    "{} marked {} as {} in {}",
                    record.member,
                    record.item_name,
                    record.status,
                    record.portal
                );
                Ok(record)
            }
            other => Err(unexpected(&other)),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current committed document
    ///
    /// # Errors
    /// `PortalError::ServiceUnavailable` if the actor stopped
    pub async fn snapshot(&self) -> PortalResult<Arc<PortalDocument>> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Latest status of an item for a member
    ///
    /// # Errors
    /// Session errors, `ValidationError::UnknownItem`,
    /// `AuthError::PortalAccessDenied` for an item of another portal
    pub async fn latest_status(
        &self,
        session: &SessionId,
        member: &str,
        item: &ResourceId,
    ) -> PortalResult<ItemStatus> {
        self.touch(session)?;
        let doc = self.snapshot().await?;
        let (owner, _) = doc
            .find_resource(item)
            .ok_or_else(|| ValidationError::UnknownItem(item.to_string()))?;
        self.require_portal_access(session, &owner.id)?;
        let status = doc.latest_status(member, item)?;
        tracing::debug!("latest status of {} for {}: {}", item, member, status);
        Ok(status)
    }

    /// Most recent records of a portal, newest first
    ///
    /// `None` uses the configured default count.
    ///
    /// # Errors
    /// Session errors, `AuthError::PortalAccessDenied`,
    /// `ValidationError::UnknownPortal`
    pub async fn recent(
        &self,
        session: &SessionId,
        portal: &PortalId,
        n: Option<usize>,
    ) -> PortalResult<Vec<SubmissionRecord>> {
        self.require_portal_access(session, portal)?;
        let doc = self.snapshot().await?;
        let records = doc
            .recent(portal, n.unwrap_or(self.recent_default))?
            .into_iter()
            .cloned()
            .collect();
        Ok(records)
    }

    /// Completion figures for a portal
    ///
    /// # Errors
    /// Session errors, `AuthError::PortalAccessDenied`,
    /// `ValidationError::UnknownPortal`
    pub async fn completion_stats(
        &self,
        session: &SessionId,
        portal: &PortalId,
    ) -> PortalResult<CompletionStats> {
        self.require_portal_access(session, portal)?;
        let doc = self.snapshot().await?;
        doc.completion_stats(portal)
    }

    /// Per-resource progress of one member
    ///
    /// # Errors
    /// Session errors, `AuthError::PortalAccessDenied`,
    /// `ValidationError::UnknownPortal`
    pub async fn member_progress(
        &self,
        session: &SessionId,
        portal: &PortalId,
        member: &str,
    ) -> PortalResult<MemberProgress> {
        self.require_portal_access(session, portal)?;
        let doc = self.snapshot().await?;
        doc.member_progress(portal, member)
    }

    // ------------------------------------------------------------------
    // Export and maintenance (admin)
    // ------------------------------------------------------------------

    /// Member list as CSV, for one portal or all
    ///
    /// # Errors
    /// Admin check, `ValidationError::UnknownPortal`, `ExportError`
    pub async fn members_csv(
        &self,
        session: &SessionId,
        portal: Option<&PortalId>,
    ) -> PortalResult<String> {
        self.require_admin(session)?;
        let doc = self.snapshot().await?;
        portal_core::members_csv(&doc, portal)
    }

    /// Full document as JSON; credentials are not part of it
    ///
    /// # Errors
    /// Admin check, encoding failure
    pub async fn backup_json(&self, session: &SessionId) -> PortalResult<String> {
        self.require_admin(session)?;
        let doc = self.snapshot().await?;
        portal_core::backup_json(&doc)
    }

    /// Re-read the document from disk, returning its revision
    ///
    /// # Errors
    /// Persistence failure
    pub async fn reload(&self) -> PortalResult<u64> {
        self.request(|reply| Command::Reload { reply }).await?
    }

    /// Stop the actor; later calls fail with `ServiceUnavailable`
    pub async fn shutdown(&self) {
        if self.sender.send(Command::Shutdown).await.is_err() {
            tracing::debug!("portal actor already stopped");
        }
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> PortalResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(command(tx))
            .await
            .map_err(|_| PortalError::ServiceUnavailable("channel closed".to_string()))?;
        rx.await
            .map_err(|_| PortalError::ServiceUnavailable("reply dropped".to_string()))
    }

    async fn mutate(&self, mutation: Mutation) -> PortalResult<Outcome> {
        self.request(|reply| Command::Mutate { mutation, reply })
            .await?
    }

    async fn resource_outcome(&self, mutation: Mutation) -> PortalResult<Resource> {
        match self.mutate(mutation).await? {
            Outcome::Resource(resource) => Ok(resource),
            other => Err(unexpected(&other)),
        }
    }

    async fn changed_outcome(&self, mutation: Mutation) -> PortalResult<bool> {
        match self.mutate(mutation).await? {
            Outcome::Changed(changed) => Ok(changed),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(outcome: &Outcome) -> PortalError {
    PortalError::ServiceUnavailable(format!("unexpected reply {outcome:?}"))
}
