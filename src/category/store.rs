//! The signed-in identity's categories, kept current by a live subscription.

use std::sync::Arc;

use tokio::sync::watch;

use crate::{
    Error,
    backend::DocumentBackend,
    category::{Category, DEFAULT_CATEGORY_COLOR, NewCategory},
    database_id::CategoryId,
    identity::UserId,
    live_query::LiveCollection,
    session::{SessionState, require_owner},
    transaction::TransactionKind,
};

/// Validates category writes against the loaded categories and mirrors the owner's
/// categories.
///
/// Name uniqueness is only checked against the categories this store has loaded, so two
/// clients writing at the same time can still create duplicates.
pub struct CategoryStore {
    owner: UserId,
    documents: Arc<dyn DocumentBackend>,
    session: watch::Receiver<SessionState>,
    categories: LiveCollection<Category>,
}

impl CategoryStore {
    /// Subscribe to the categories of the identity signed in to `session`.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn] if nobody is signed in, or the backend's error if the
    /// subscription could not be created.
    pub fn mount(
        documents: Arc<dyn DocumentBackend>,
        session: watch::Receiver<SessionState>,
    ) -> Result<Self, Error> {
        let owner = session.borrow().user_id().ok_or(Error::NotLoggedIn)?;
        let categories =
            LiveCollection::subscribe(|listener| documents.watch_categories(owner, listener))?;

        Ok(Self {
            owner,
            documents,
            session,
            categories,
        })
    }

    /// The identity whose categories this store holds.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// All categories in creation order.
    pub fn categories(&self) -> Vec<Category> {
        self.categories.snapshot()
    }

    /// Find a category by ID.
    pub fn get(&self, id: CategoryId) -> Option<Category> {
        self.categories.with(|categories| {
            categories
                .iter()
                .find(|category| category.id == id)
                .cloned()
        })
    }

    /// Create a category, using [DEFAULT_CATEGORY_COLOR] when no color is given.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn], [Error::MissingFields] if the name is blank or the kind
    /// is missing, or [Error::DuplicateCategoryName] if a loaded category of the same kind
    /// already has the name. None of these contact the backend.
    pub fn add(
        &self,
        name: &str,
        kind: Option<TransactionKind>,
        color: Option<&str>,
    ) -> Result<CategoryId, Error> {
        let owner = require_owner(&self.session, self.owner)?;

        let name = name.trim();
        let kind = match kind {
            Some(kind) if !name.is_empty() => kind,
            _ => return Err(Error::MissingFields),
        };
        self.check_unique(name, kind, None)?;

        let color = color
            .map(str::trim)
            .filter(|color| !color.is_empty())
            .unwrap_or(DEFAULT_CATEGORY_COLOR);

        let id = self.documents.add_category(
            owner,
            &NewCategory {
                name: name.to_owned(),
                kind,
                color: color.to_owned(),
            },
        )?;
        tracing::debug!("user {owner} added category {id} \"{name}\"");

        Ok(id)
    }

    /// Rename, recolor or change the kind of a category.
    ///
    /// # Errors
    /// The same precondition errors as [CategoryStore::add], where the category being
    /// updated does not count as a duplicate of itself, plus
    /// [Error::UpdateMissingCategory] from the backend.
    pub fn update(&self, category: &Category) -> Result<(), Error> {
        let owner = require_owner(&self.session, self.owner)?;

        let name = category.name.trim();
        if name.is_empty() {
            return Err(Error::MissingFields);
        }
        self.check_unique(name, category.kind, Some(category.id))?;

        self.documents.update_category(
            owner,
            &Category {
                name: name.to_owned(),
                ..category.clone()
            },
        )
    }

    /// Delete a category. Transactions labelled with it keep their label.
    ///
    /// # Errors
    /// Returns [Error::NotLoggedIn], or [Error::DeleteMissingCategory] if the category does
    /// not exist or belongs to someone else.
    pub fn remove(&self, id: CategoryId) -> Result<(), Error> {
        let owner = require_owner(&self.session, self.owner)?;

        self.documents.delete_category(owner, id)
    }

    /// Cancel the live subscription.
    pub fn unmount(&self) {
        self.categories.unmount();
    }

    fn check_unique(
        &self,
        name: &str,
        kind: TransactionKind,
        exclude: Option<CategoryId>,
    ) -> Result<(), Error> {
        let is_duplicate = self.categories.with(|categories| {
            categories.iter().any(|category| {
                category.kind == kind && Some(category.id) != exclude && category.has_name(name)
            })
        });

        if is_duplicate {
            return Err(Error::DuplicateCategoryName(name.to_owned()));
        }

        Ok(())
    }
}
