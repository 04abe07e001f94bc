//! In-memory book store.
//!
//! An explicit store object handed to the handlers, not process-global state.
//! Records live in creation order and do not survive a restart. The lock is
//! held only for the duration of a single operation, so every operation is an
//! atomic read-then-write; this makes no promises across multiple processes.

use tokio::sync::RwLock;

use super::models::{Book, NewBook, UpdateBook};

/// Why a store mutation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// No record with the requested id
    NotFound,
    /// The record exists but belongs to another subject
    NotOwner,
}

struct Inner {
    books: Vec<Book>,
    next_id: u64,
}

/// Ordered in-memory collection of books with owner-scoped mutation.
pub struct BookStore {
    inner: RwLock<Inner>,
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                books: Vec::new(),
                next_id: 1,
            }),
        }
    }

    /// Books owned by the given subject, in creation order.
    pub async fn list_owned(&self, owner_id: &str) -> Vec<Book> {
        let inner = self.inner.read().await;
        inner
            .books
            .iter()
            .filter(|book| book.owner_id == owner_id)
            .cloned()
            .collect()
    }

    /// Look up a book by id, regardless of owner.
    pub async fn get(&self, id: u64) -> Option<Book> {
        let inner = self.inner.read().await;
        inner.books.iter().find(|book| book.id == id).cloned()
    }

    /// Append a new record owned by `owner_id`.
    ///
    /// Ids come from a monotonically increasing counter and are never reused,
    /// so an id stays unique even after deletions.
    pub async fn create(&self, new: NewBook, owner_id: &str) -> Book {
        let mut inner = self.inner.write().await;

        let book = Book {
            id: inner.next_id,
            title: new.title,
            author: new.author,
            year: new.year,
            owner_id: owner_id.to_string(),
        };
        inner.next_id += 1;
        inner.books.push(book.clone());

        book
    }

    /// Overwrite the mutable fields of an owned record in place.
    pub async fn update(
        &self,
        id: u64,
        owner_id: &str,
        patch: UpdateBook,
    ) -> Result<Book, StoreError> {
        let mut inner = self.inner.write().await;

        let book = inner
            .books
            .iter_mut()
            .find(|book| book.id == id)
            .ok_or(StoreError::NotFound)?;

        if book.owner_id != owner_id {
            return Err(StoreError::NotOwner);
        }

        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        if let Some(year) = patch.year {
            book.year = year;
        }

        Ok(book.clone())
    }

    /// Remove an owned record from the collection.
    pub async fn remove(&self, id: u64, owner_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        let index = inner
            .books
            .iter()
            .position(|book| book.id == id)
            .ok_or(StoreError::NotFound)?;

        if inner.books[index].owner_id != owner_id {
            return Err(StoreError::NotOwner);
        }

        inner.books.remove(index);
        Ok(())
    }

    /// Total number of records across all owners.
    pub async fn len(&self) -> usize {
        self.inner.read().await.books.len()
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}
