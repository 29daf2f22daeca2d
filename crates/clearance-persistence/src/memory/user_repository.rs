//! Users and access tokens

use async_trait::async_trait;
use chrono::Utc;

use clearance_domain::{
    entities::{AccessToken, NewUser, TokenKind, User},
    errors::DomainResult,
    repositories::{TokenRepository, UserRepository},
};

use super::{next, InMemoryStore};
use crate::error::PersistenceError;

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: NewUser) -> DomainResult<User> {
        let mut state = self.state.write();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(PersistenceError::conflict(
                "username",
                format!("username '{}' is already taken", user.username),
            )
            .into());
        }
        let id = next(&mut state.sequences.user);
        let user = User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> DomainResult<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>> {
        let state = self.state.read();
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<User>> {
        Ok(self.state.read().users.values().cloned().collect())
    }

    /// Removes the user and every token issued to it
    async fn delete(&self, id: i64) -> DomainResult<()> {
        let mut state = self.state.write();
        state
            .users
            .remove(&id)
            .ok_or_else(|| PersistenceError::not_found("User", id))?;
        state.tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }

    async fn set_password_hash(&self, id: i64, password_hash: &str) -> DomainResult<()> {
        let mut state = self.state.write();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::not_found("User", id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

#[async_trait]
impl TokenRepository for InMemoryStore {
    async fn insert(&self, token: AccessToken) -> DomainResult<()> {
        let mut state = self.state.write();
        state.tokens.insert(token.token_hash.clone(), token);
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> DomainResult<Option<AccessToken>> {
        Ok(self.state.read().tokens.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> DomainResult<bool> {
        Ok(self.state.write().tokens.remove(token_hash).is_some())
    }

    async fn revoke_for_user(&self, user_id: i64, kind: Option<TokenKind>) -> DomainResult<u64> {
        let mut state = self.state.write();
        let before = state.tokens.len();
        state
            .tokens
            .retain(|_, t| t.user_id != user_id || kind.is_some_and(|k| t.kind != k));
        Ok((before - state.tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use clearance_domain::{entities::Role, errors::DomainError};

    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    fn token(hash: &str, user_id: i64, kind: TokenKind) -> AccessToken {
        AccessToken {
            token_hash: hash.to_string(),
            user_id,
            kind,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_validation_error() {
        let store = InMemoryStore::new();
        UserRepository::create(&store, new_user("alice")).await.unwrap();
        let err = UserRepository::create(&store, new_user("alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationError { ref field, .. } if field == "username"));
    }

    #[tokio::test]
    async fn test_revoke_by_kind() {
        let store = InMemoryStore::new();
        store.insert(token("s1", 1, TokenKind::Session)).await.unwrap();
        store.insert(token("a1", 1, TokenKind::Api)).await.unwrap();
        store.insert(token("a2", 2, TokenKind::Api)).await.unwrap();

        assert_eq!(store.revoke_for_user(1, Some(TokenKind::Api)).await.unwrap(), 1);
        assert!(TokenRepository::find(&store, "s1").await.unwrap().is_some());
        assert!(TokenRepository::find(&store, "a2").await.unwrap().is_some());
        assert_eq!(store.revoke_for_user(1, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_deleting_user_drops_tokens() {
        let store = InMemoryStore::new();
        let user = UserRepository::create(&store, new_user("bob")).await.unwrap();
        store.insert(token("t", user.id, TokenKind::Session)).await.unwrap();
        UserRepository::delete(&store, user.id).await.unwrap();
        assert!(TokenRepository::find(&store, "t").await.unwrap().is_none());
    }
}
