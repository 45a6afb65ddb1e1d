//! Resource Collection Controller
//!
//! CRUD over a server-side collection. The local list is only ever replaced
//! wholesale by a `refresh`; `create` and `remove` never patch it. Callers
//! refresh after every write to see the server's result, including the id
//! it assigned.
//!
//! Refreshes are not sequenced against each other. Whichever response
//! completes last overwrites the snapshot, so a slow refresh can briefly
//! win over a newer one until the next refresh corrects it.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::Api;
use crate::error::RequestError;
use crate::models::{BlocklistEntry, EntityId, NewBlocklist, NewRedirect, RedirectEntry};

/// A member of a REST collection
pub trait Resource: DeserializeOwned + Clone + Send + Sync + 'static {
    /// Body posted to create one
    type Draft: Serialize + Send + Sync;

    /// Collection path, e.g. `/api/blocklists`
    const PATH: &'static str;

    fn id(&self) -> &EntityId;
}

impl Resource for BlocklistEntry {
    type Draft = NewBlocklist;
    const PATH: &'static str = "/api/blocklists";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Resource for RedirectEntry {
    type Draft = NewRedirect;
    const PATH: &'static str = "/api/redirects";

    fn id(&self) -> &EntityId {
        &self.id
    }
}

pub struct ResourceCollection<T: Resource> {
    api: Api,
    items: RwLock<Arc<Vec<T>>>,
}

pub type Blocklists = ResourceCollection<BlocklistEntry>;
pub type Redirects = ResourceCollection<RedirectEntry>;

impl<T: Resource> ResourceCollection<T> {
    pub fn new(api: Api) -> Self {
        Self {
            api,
            items: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Fetch the collection and replace the local snapshot with it
    pub async fn refresh(&self) -> Result<Arc<Vec<T>>, RequestError> {
        // The backend encodes an empty collection as null
        let fetched: Option<Vec<T>> = self.api.get(T::PATH).await?;
        let items = Arc::new(fetched.unwrap_or_default());
        *self.items.write() = items.clone();
        debug!("{}: {} item(s)", T::PATH, items.len());
        Ok(items)
    }

    /// Ask the server to create an entry. Does not touch the local snapshot.
    pub async fn create(&self, draft: &T::Draft) -> Result<(), RequestError> {
        self.api.post(T::PATH, draft).await?;
        debug!("{}: created", T::PATH);
        Ok(())
    }

    /// Ask the server to delete an entry. Does not touch the local snapshot.
    pub async fn remove(&self, id: &EntityId) -> Result<(), RequestError> {
        let url = self.api.rest().member_url(T::PATH, id.as_str())?;
        self.api.delete_url(url).await?;
        debug!("{}: removed {}", T::PATH, id);
        Ok(())
    }

    /// `create` followed by `refresh`
    pub async fn create_and_refresh(&self, draft: &T::Draft) -> Result<Arc<Vec<T>>, RequestError> {
        self.create(draft).await?;
        self.refresh().await
    }

    /// `remove` followed by `refresh`
    pub async fn remove_and_refresh(&self, id: &EntityId) -> Result<Arc<Vec<T>>, RequestError> {
        self.remove(id).await?;
        self.refresh().await
    }

    /// Last snapshot received from the server
    pub fn items(&self) -> Arc<Vec<T>> {
        self.items.read().clone()
    }

    pub fn get(&self, id: &EntityId) -> Option<T> {
        self.items.read().iter().find(|item| item.id() == id).cloned()
    }

    pub fn path(&self) -> &'static str {
        T::PATH
    }
}
