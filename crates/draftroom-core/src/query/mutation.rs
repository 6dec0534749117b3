//! Mutation executor.
//!
//! A mutation is sent once; only after the service accepts it are the tags it
//! declares invalidated. Subscribed entries under those tags start refetching
//! before [`QueryClient::mutate`] returns, so anything read afterwards
//! reflects the mutation. A failed mutation leaves the cache untouched.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::ApiError;

use super::client::QueryClient;
use super::descriptor::MutationDescriptor;

impl QueryClient {
    pub async fn mutate(&self, descriptor: &MutationDescriptor) -> Result<Value, ApiError> {
        let response = self.transport().send(descriptor.request()).await;
        match response {
            Ok(value) => {
                let affected = self.invalidate_tags(&descriptor.invalidates_tags);
                info!(
                    method = %descriptor.method,
                    path = %descriptor.path(),
                    invalidated = affected,
                    "Mutation succeeded"
                );
                Ok(value)
            }
            Err(error) => {
                warn!(
                    method = %descriptor.method,
                    path = %descriptor.path(),
                    error = %error,
                    "Mutation failed"
                );
                Err(error)
            }
        }
    }

    pub async fn mutate_as<T: DeserializeOwned>(
        &self,
        descriptor: &MutationDescriptor,
    ) -> Result<T, ApiError> {
        let value = self.mutate(descriptor).await?;
        Ok(T::deserialize(value)?)
    }
}
