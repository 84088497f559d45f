//! grammers-backed [`RemoteClient`].
//!
//! Peers seen in dialogs or resolutions are remembered by id so later
//! high-level calls (send, history) can reuse them. Destructive actions go
//! through raw TL functions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use grammers_client::types::peer::Peer;
use grammers_client::Client;
use grammers_tl_types as tl;
use tracing::debug;

use crate::error::{Error, Result};
use crate::remote::{EntityKind, EntityRef, RemoteClient, RemoteEntity, RemoteMessage};

pub struct GrammersRemote {
    client: Client,
    peers: Mutex<HashMap<i64, Peer>>,
}

fn user_entity(raw: &tl::enums::User) -> Result<RemoteEntity> {
    match raw {
        tl::enums::User::User(u) => {
            let name = [u.first_name.as_deref(), u.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            Ok(RemoteEntity {
                id: u.id,
                access_hash: u.access_hash,
                username: u.username.clone(),
                name,
                kind: EntityKind::User {
                    bot: u.bot,
                    deleted: u.deleted,
                },
            })
        }
        tl::enums::User::Empty(u) => Err(Error::PeerInvalid(format!("user {} is empty", u.id))),
    }
}

fn chat_entity(raw: &tl::enums::Chat) -> RemoteEntity {
    let (id, access_hash, name, kind) = match raw {
        tl::enums::Chat::Empty(c) => (c.id, None, String::new(), EntityKind::Group),
        tl::enums::Chat::Chat(c) => (c.id, None, c.title.clone(), EntityKind::Group),
        tl::enums::Chat::Forbidden(c) => (c.id, None, c.title.clone(), EntityKind::Group),
        tl::enums::Chat::Channel(c) => (
            c.id,
            c.access_hash,
            c.title.clone(),
            EntityKind::Channel {
                megagroup: c.megagroup,
            },
        ),
        tl::enums::Chat::ChannelForbidden(c) => (
            c.id,
            Some(c.access_hash),
            c.title.clone(),
            EntityKind::Channel {
                megagroup: c.megagroup,
            },
        ),
    };
    RemoteEntity {
        id,
        access_hash,
        username: None,
        name,
        kind,
    }
}

/// Map a grammers peer onto the cleaner's entity model.
pub fn peer_entity(peer: &Peer) -> Result<RemoteEntity> {
    match peer {
        Peer::User(user) => user_entity(&user.raw),
        Peer::Channel(channel) => Ok(RemoteEntity {
            id: channel.raw.id,
            access_hash: channel.raw.access_hash,
            username: channel.raw.username.clone(),
            name: channel.raw.title.clone(),
            kind: EntityKind::Channel {
                megagroup: channel.raw.megagroup,
            },
        }),
        Peer::Group(group) => Ok(RemoteEntity {
            username: group.username().map(str::to_string),
            ..chat_entity(&group.raw)
        }),
    }
}

fn input_peer(entity: &RemoteEntity) -> tl::enums::InputPeer {
    match entity.kind {
        EntityKind::User { .. } => tl::enums::InputPeer::User(tl::types::InputPeerUser {
            user_id: entity.id,
            access_hash: entity.access_hash.unwrap_or(0),
        }),
        EntityKind::Group => {
            tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: entity.id })
        }
        EntityKind::Channel { .. } => {
            tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                channel_id: entity.id,
                access_hash: entity.access_hash.unwrap_or(0),
            })
        }
    }
}

fn input_channel(entity: &RemoteEntity) -> tl::enums::InputChannel {
    tl::enums::InputChannel::Channel(tl::types::InputChannel {
        channel_id: entity.id,
        access_hash: entity.access_hash.unwrap_or(0),
    })
}

impl GrammersRemote {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            peers: Mutex::new(HashMap::new()),
        }
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<i64, Peer>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, peer: Peer) -> Result<RemoteEntity> {
        let entity = peer_entity(&peer)?;
        self.peers().insert(entity.id, peer);
        Ok(entity)
    }

    async fn find_in_dialogs(&self, id: i64) -> Result<Peer> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await? {
            if let Ok(entity) = peer_entity(&dialog.peer) {
                let found = entity.id == id;
                self.peers().insert(entity.id, dialog.peer.clone());
                if found {
                    return Ok(dialog.peer);
                }
            }
        }
        Err(Error::PeerInvalid(format!("{} not found in dialogs", id)))
    }

    /// High-level peer for an entity, looking it up again if unknown.
    async fn peer_for(&self, target: &RemoteEntity) -> Result<Peer> {
        let known = self.peers().get(&target.id).cloned();
        if let Some(peer) = known {
            return Ok(peer);
        }

        debug!(id = target.id, "Peer not remembered, looking it up");
        if let Some(username) = target.username.as_deref() {
            if let Some(peer) = self.client.resolve_username(username).await? {
                self.remember(peer.clone())?;
                return Ok(peer);
            }
        }
        self.find_in_dialogs(target.id).await
    }
}

#[async_trait]
impl RemoteClient for GrammersRemote {
    async fn dialogs(&self) -> Result<Vec<RemoteEntity>> {
        let mut entities = Vec::new();
        let mut dialogs = self.client.iter_dialogs();

        while let Some(dialog) = dialogs.next().await? {
            match self.remember(dialog.peer) {
                Ok(entity) => entities.push(entity),
                Err(err) => debug!("Skipping dialog: {}", err),
            }
        }

        Ok(entities)
    }

    async fn resolve(&self, target: &EntityRef) -> Result<RemoteEntity> {
        match target {
            EntityRef::Username(username) => {
                let peer = self
                    .client
                    .resolve_username(username)
                    .await?
                    .ok_or_else(|| {
                        Error::PeerInvalid(format!("USERNAME_NOT_OCCUPIED: @{}", username))
                    })?;
                self.remember(peer)
            }
            EntityRef::Id(id) => {
                let known = self.peers().get(id).cloned();
                let peer = match known {
                    Some(peer) => peer,
                    None => self.find_in_dialogs(*id).await?,
                };
                peer_entity(&peer)
            }
            EntityRef::User { id, access_hash } => {
                let request = tl::functions::users::GetUsers {
                    id: vec![tl::enums::InputUser::User(tl::types::InputUser {
                        user_id: *id,
                        access_hash: *access_hash,
                    })],
                };
                let users = self.client.invoke(&request).await?;
                let raw = users
                    .first()
                    .ok_or_else(|| Error::PeerInvalid(format!("user {} not returned", id)))?;
                user_entity(raw)
            }
        }
    }

    async fn send_message(&self, target: &RemoteEntity, text: &str) -> Result<()> {
        let peer = self.peer_for(target).await?;
        self.client.send_message(&peer, text).await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        target: &RemoteEntity,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>> {
        let peer = self.peer_for(target).await?;
        let mut iter = self.client.iter_messages(&peer);
        let mut messages = Vec::with_capacity(limit);

        while let Some(msg) = iter.next().await? {
            messages.push(RemoteMessage {
                id: msg.id(),
                text: msg.text().to_string(),
            });
            if messages.len() >= limit {
                break;
            }
        }

        Ok(messages)
    }

    async fn delete_history(&self, target: &RemoteEntity, revoke: bool) -> Result<()> {
        if let EntityKind::Channel { .. } = target.kind {
            self.client
                .invoke(&tl::functions::channels::DeleteHistory {
                    for_everyone: revoke,
                    channel: input_channel(target),
                    max_id: 0,
                })
                .await?;
            return Ok(());
        }

        let request = tl::functions::messages::DeleteHistory {
            just_clear: false,
            revoke,
            peer: input_peer(target),
            max_id: 0,
            min_date: None,
            max_date: None,
        };

        // The server deletes in chunks and reports a non-zero offset until done.
        loop {
            let tl::enums::messages::AffectedHistory::History(affected) =
                self.client.invoke(&request).await?;
            if affected.offset <= 0 {
                break;
            }
        }

        self.peers().remove(&target.id);
        Ok(())
    }

    async fn leave_channel(&self, target: &RemoteEntity) -> Result<()> {
        match target.kind {
            EntityKind::Channel { .. } => {
                self.client
                    .invoke(&tl::functions::channels::LeaveChannel {
                        channel: input_channel(target),
                    })
                    .await?;
            }
            EntityKind::Group => {
                self.client
                    .invoke(&tl::functions::messages::DeleteChatUser {
                        revoke_history: false,
                        chat_id: target.id,
                        user_id: tl::enums::InputUser::UserSelf,
                    })
                    .await?;
            }
            EntityKind::User { .. } => {
                return Err(Error::InvalidArgument(format!(
                    "{} is a user, not a group or channel",
                    target.id
                )));
            }
        }

        self.peers().remove(&target.id);
        Ok(())
    }
}
