use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::{
    domain::{ChannelName, UserId, UserIdentity},
    errors::Error,
    messaging::port::ChatTransport,
    ports::UserDirectory,
    registry::{Change, ChannelRegistry},
    replies,
    settings::ChannelSettings,
    Result,
};

/// Which room a join/leave applies to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipTarget {
    /// An explicit room name (global admins only).
    Named(String),
    /// The caller's own room, resolved from their user id.
    Caller(UserId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined(ChannelName),
    AlreadyActive(ChannelName),
    /// Identity lookup or transport join failed; nothing was kept.
    Failed,
    NotSaved,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left(ChannelName),
    Failed,
    NotSaved,
}

/// One lock per room, held across the registry change and the matching JOIN/PART.
#[derive(Default)]
struct RoomLocks {
    inner: Mutex<HashMap<ChannelName, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    async fn lock(&self, name: &ChannelName) -> OwnedMutexGuard<()> {
        let room = {
            let mut map = self.inner.lock().await;
            map.entry(name.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        room.lock_owned().await
    }
}

/// Join/leave workflows: keeps registry entries and transport membership in step.
///
/// Workflows on the same room run one at a time, even when the join and the
/// leave were issued from different rooms.
pub struct Membership {
    registry: Arc<ChannelRegistry>,
    transport: Arc<dyn ChatTransport>,
    directory: Arc<dyn UserDirectory>,
    locks: RoomLocks,
}

impl Membership {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        transport: Arc<dyn ChatTransport>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            registry,
            transport,
            directory,
            locks: RoomLocks::default(),
        }
    }

    pub async fn join(&self, target: &MembershipTarget) -> JoinOutcome {
        let identity = match self.resolve(target).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(?target, error = %e, "join: identity lookup failed");
                return JoinOutcome::Failed;
            }
        };

        let name = ChannelName::new(&identity.name);
        let _room = self.locks.lock(&name).await;
        let entry = ChannelSettings::new(&name, &identity.id);
        match self.registry.insert_channel(entry).await {
            Ok(Change::Unchanged) => return JoinOutcome::AlreadyActive(name),
            Ok(Change::Applied) => {}
            Err(e) => {
                error!(channel = %name, error = %e, "join: registry update failed");
                return JoinOutcome::NotSaved;
            }
        }

        if let Err(e) = self.transport.join(&name).await {
            error!(channel = %name, error = %e, "join: transport join failed, rolling back");
            if let Err(e) = self.registry.remove_channel(&name).await {
                error!(channel = %name, error = %e, "join: rollback failed");
            }
            return JoinOutcome::Failed;
        }

        info!(channel = %name, broadcaster_id = %identity.id, "joined channel");
        JoinOutcome::Joined(name)
    }

    /// Leave always departs, even when the room was not registered.
    pub async fn leave(&self, target: &MembershipTarget) -> LeaveOutcome {
        let name = match target {
            MembershipTarget::Named(raw) => ChannelName::new(raw),
            MembershipTarget::Caller(_) => match self.resolve(target).await {
                Ok(identity) => ChannelName::new(&identity.name),
                Err(e) => {
                    error!(?target, error = %e, "leave: identity lookup failed");
                    return LeaveOutcome::Failed;
                }
            },
        };
        self.depart(&name).await
    }

    /// Unregister `name`, say goodbye there, and part the room.
    pub async fn depart(&self, name: &ChannelName) -> LeaveOutcome {
        let _room = self.locks.lock(name).await;
        match self.registry.remove_channel(name).await {
            Ok(Some(_)) => {}
            Ok(None) => warn!(channel = %name, "leave: channel was not registered"),
            Err(e) => {
                error!(channel = %name, error = %e, "leave: registry update failed");
                return LeaveOutcome::NotSaved;
            }
        }

        if let Err(e) = self.transport.send(name, replies::GOODBYE).await {
            warn!(channel = %name, error = %e, "leave: farewell not sent");
        }
        if let Err(e) = self.transport.leave(name).await {
            error!(channel = %name, error = %e, "leave: transport part failed");
        }

        info!(channel = %name, "left channel");
        LeaveOutcome::Left(name.clone())
    }

    async fn resolve(&self, target: &MembershipTarget) -> Result<UserIdentity> {
        match target {
            MembershipTarget::Named(raw) => self
                .directory
                .lookup_user_by_name(raw)
                .await?
                .ok_or_else(|| Error::NotFound(format!("user {raw}"))),
            MembershipTarget::Caller(id) => self.directory.lookup_channel_by_id(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::test_support::{
        settings_with_channel, FakeDirectory, FakeTransport, RecordingStore, TransportCall,
    };

    struct Harness {
        membership: Membership,
        registry: Arc<ChannelRegistry>,
        transport: Arc<FakeTransport>,
        store: Arc<RecordingStore>,
    }

    fn harness(store: RecordingStore, directory: FakeDirectory) -> Harness {
        let store = Arc::new(store);
        let registry = Arc::new(ChannelRegistry::new(
            settings_with_channel("existing", "100"),
            store.clone(),
        ));
        let transport = Arc::new(FakeTransport::default());
        let membership = Membership::new(registry.clone(), transport.clone(), Arc::new(directory));
        Harness {
            membership,
            registry,
            transport,
            store,
        }
    }

    #[tokio::test]
    async fn named_join_registers_and_joins() {
        let h = harness(
            RecordingStore::default(),
            FakeDirectory::default().with_user("200", "SomeChannel"),
        );

        let out = h
            .membership
            .join(&MembershipTarget::Named("somechannel".into()))
            .await;

        let name = ChannelName::new("somechannel");
        assert_eq!(out, JoinOutcome::Joined(name.clone()));
        let entry = h.registry.channel(&name).await.unwrap();
        assert_eq!(entry.broadcaster_id, "200");
        assert_eq!(entry.name, "somechannel");
        assert_eq!(h.transport.calls(), vec![TransportCall::Join("somechannel".into())]);
        assert_eq!(h.store.saves(), 1);
    }

    #[tokio::test]
    async fn self_join_resolves_by_id() {
        let h = harness(
            RecordingStore::default(),
            FakeDirectory::default().with_user("300", "Caller"),
        );
        let out = h
            .membership
            .join(&MembershipTarget::Caller(UserId("300".into())))
            .await;
        assert_eq!(out, JoinOutcome::Joined(ChannelName::new("caller")));
    }

    #[tokio::test]
    async fn joining_existing_channel_changes_nothing() {
        let h = harness(
            RecordingStore::default(),
            FakeDirectory::default().with_user("100", "Existing"),
        );
        let out = h
            .membership
            .join(&MembershipTarget::Named("existing".into()))
            .await;
        assert_eq!(out, JoinOutcome::AlreadyActive(ChannelName::new("existing")));
        assert_eq!(h.registry.len().await, 1);
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.store.saves(), 0);
    }

    #[tokio::test]
    async fn lookup_failures_leave_no_state() {
        let h = harness(RecordingStore::default(), FakeDirectory::default().failing());
        let out = h
            .membership
            .join(&MembershipTarget::Named("ghost".into()))
            .await;
        assert_eq!(out, JoinOutcome::Failed);

        let h2 = harness(RecordingStore::default(), FakeDirectory::default());
        let out = h2
            .membership
            .join(&MembershipTarget::Named("ghost".into()))
            .await;
        assert_eq!(out, JoinOutcome::Failed);
        assert_eq!(h2.registry.len().await, 1);
        assert!(h2.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_rolls_back_registration() {
        let h = harness(
            RecordingStore::default(),
            FakeDirectory::default().with_user("200", "somechannel"),
        );
        h.transport.fail_joins();
        let out = h
            .membership
            .join(&MembershipTarget::Named("somechannel".into()))
            .await;
        assert_eq!(out, JoinOutcome::Failed);
        assert!(!h.registry.contains(&ChannelName::new("somechannel")).await);
    }

    #[tokio::test]
    async fn unsaved_join_does_not_touch_transport() {
        let h = harness(
            RecordingStore::failing(),
            FakeDirectory::default().with_user("200", "somechannel"),
        );
        let out = h
            .membership
            .join(&MembershipTarget::Named("somechannel".into()))
            .await;
        assert_eq!(out, JoinOutcome::NotSaved);
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.registry.len().await, 1);
    }

    #[tokio::test]
    async fn leave_removes_says_goodbye_and_parts() {
        let h = harness(RecordingStore::default(), FakeDirectory::default());
        let out = h
            .membership
            .leave(&MembershipTarget::Named("Existing".into()))
            .await;
        assert_eq!(out, LeaveOutcome::Left(ChannelName::new("existing")));
        assert!(h.registry.is_empty().await);
        assert_eq!(
            h.transport.calls(),
            vec![
                TransportCall::Send("existing".into(), replies::GOODBYE.into()),
                TransportCall::Leave("existing".into()),
            ]
        );
    }

    #[tokio::test]
    async fn leaving_unregistered_channel_still_departs() {
        let h = harness(RecordingStore::default(), FakeDirectory::default());
        let out = h
            .membership
            .leave(&MembershipTarget::Named("elsewhere".into()))
            .await;
        assert_eq!(out, LeaveOutcome::Left(ChannelName::new("elsewhere")));
        assert_eq!(h.registry.len().await, 1);
        assert_eq!(h.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn self_leave_lookup_failure_is_reported() {
        let h = harness(RecordingStore::default(), FakeDirectory::default());
        let out = h
            .membership
            .leave(&MembershipTarget::Caller(UserId("404".into())))
            .await;
        assert_eq!(out, LeaveOutcome::Failed);
        assert!(h.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn join_issued_during_a_leave_waits_for_the_part() {
        let h = harness(
            RecordingStore::default(),
            FakeDirectory::default().with_user("100", "Existing"),
        );
        h.transport.slow_sends(Duration::from_millis(50));
        let room = ChannelName::new("existing");

        let (left, joined) = tokio::join!(h.membership.depart(&room), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.membership
                .join(&MembershipTarget::Named("existing".into()))
                .await
        });

        assert_eq!(left, LeaveOutcome::Left(room.clone()));
        assert_eq!(joined, JoinOutcome::Joined(room.clone()));
        assert!(h.registry.contains(&room).await);
        assert_eq!(
            h.transport.calls(),
            vec![
                TransportCall::Send("existing".into(), replies::GOODBYE.into()),
                TransportCall::Leave("existing".into()),
                TransportCall::Join("existing".into()),
            ]
        );
    }
}
