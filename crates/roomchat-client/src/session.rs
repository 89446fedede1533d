//! Identity and room data for the current process.

use roomchat_core::messages::{
    BroadcastRequest, ClientCommand, JoinRequest, PrivateMessageRequest,
};

/// Who we are and where we are talking.
///
/// Lives on the consumer thread. `client_id` is only ever written by a
/// server welcome; the rest comes from configuration or the collaborator and
/// survives reconnects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    client_id: Option<String>,
    username: String,
    room_id: String,
    auth_token: String,
}

impl SessionContext {
    pub fn new(
        username: impl Into<String>,
        room_id: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            client_id: None,
            username: username.into(),
            room_id: room_id.into(),
            auth_token: auth_token.into(),
        }
    }

    /// Id assigned by the server's welcome, if one has arrived.
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Store the server-assigned id. Empty ids are ignored.
    pub(crate) fn set_client_id(&mut self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        self.client_id = Some(id.to_string());
        true
    }

    pub(crate) fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    pub(crate) fn set_room_id(&mut self, room_id: impl Into<String>) {
        self.room_id = room_id.into();
    }

    pub fn join_command(&self) -> ClientCommand {
        ClientCommand::Join(JoinRequest {
            room_id: self.room_id.clone(),
            auth_token: self.auth_token.clone(),
            username: self.username.clone(),
        })
    }

    pub fn broadcast_command(&self, message: &str) -> ClientCommand {
        ClientCommand::Broadcast(BroadcastRequest {
            message: message.to_string(),
            auth_token: self.auth_token.clone(),
            room_id: self.room_id.clone(),
        })
    }

    pub fn private_command(&self, target_id: &str, message: &str) -> ClientCommand {
        ClientCommand::PrivateMessage(PrivateMessageRequest {
            target_id: target_id.to_string(),
            message: message.to_string(),
            auth_token: self.auth_token.clone(),
        })
    }
}
