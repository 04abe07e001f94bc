use serde::{Deserialize, Serialize};

/// A catalog record owned by the authenticated user who created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier, immutable after creation
    pub id: u64,
    /// Title of the book
    pub title: Option<String>,
    /// Author of the book
    pub author: Option<String>,
    /// Publication year
    pub year: Option<i32>,
    /// Subject identifier of the creating user, immutable after creation
    pub owner_id: String,
}

/// Request body for creating a book.
///
/// Deliberately permissive: absent fields are stored as null rather than
/// rejected. Known weak spot carried over from the original API contract.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBook {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
}

/// Request body for updating a book.
///
/// An omitted key leaves the stored field unchanged; an explicit value,
/// including an explicit `null`, overwrites it. `id` and `ownerId` are never
/// updatable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBook {
    #[serde(default, deserialize_with = "present")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub author: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub year: Option<Option<i32>>,
}

impl UpdateBook {
    /// Whether the patch would change anything at all.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.author.is_none() && self.year.is_none()
    }
}

/// Distinguishes an omitted key (outer `None`) from an explicit `null`
/// (inner `None`).
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_serializes_owner_as_camel_case() {
        let book = Book {
            id: 1,
            title: Some("Dune".to_string()),
            author: Some("Herbert".to_string()),
            year: Some(1965),
            owner_id: "u1".to_string(),
        };

        let value = serde_json::to_value(&book).unwrap();
        assert_eq!(value["ownerId"], "u1");
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_new_book_accepts_missing_fields() {
        let body: NewBook = serde_json::from_str(r#"{"title": "Dune"}"#).unwrap();
        assert_eq!(body.title, Some("Dune".to_string()));
        assert_eq!(body.author, None);
        assert_eq!(body.year, None);
    }

    #[test]
    fn test_update_distinguishes_omitted_from_null() {
        let patch: UpdateBook =
            serde_json::from_str(r#"{"title": "Messiah", "year": null}"#).unwrap();

        assert_eq!(patch.title, Some(Some("Messiah".to_string())));
        assert_eq!(patch.author, None); // omitted: leave unchanged
        assert_eq!(patch.year, Some(None)); // explicit null: clear
        assert!(!patch.is_empty());
    }

    #[test]
    fn test_empty_update() {
        let patch: UpdateBook = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }
}
